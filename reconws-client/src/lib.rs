//! Self-healing WebSocket client
//!
//! This crate provides a WebSocket client that keeps itself connected. Dialing
//! happens in the background with exponential backoff and jitter, every read
//! or write failure triggers a reconnect, and lifecycle transitions are
//! reported to a listener.
//!
//! # Core Features
//!
//! - **Background Dialing**: `dial` returns after one handshake timeout; the
//!   dial loop keeps retrying until it connects
//! - **Backoff**: configurable exponential backoff with jitter, or a custom
//!   [`ReconnectionStrategy`]
//! - **I/O Guard**: reads and writes return `NotConnected` while disconnected
//!   and heal the connection when they fail
//! - **Independent Locks**: writes are serialized, reads are serialized, and
//!   neither blocks the other
//! - **Listener**: connect, disconnect and error events through
//!   [`ConnectionListener`]
//! - **Observability**: `tracing` events and OpenTelemetry metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reconws_client::{ConnectionListener, ClientBuilder, HeaderMap, ReconnectingClient};
//! use reconws_core::MessageKind;
//!
//! struct Resubscribe;
//!
//! impl ConnectionListener for Resubscribe {
//!     fn on_connect(&self, client: &ReconnectingClient) {
//!         let client = client.clone();
//!         tokio::spawn(async move {
//!             let _ = client.write_json(&serde_json::json!({"op": "subscribe"})).await;
//!         });
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new()
//!         .listener(Resubscribe)
//!         .verbose(true)
//!         .build()?;
//!     client.dial("wss://stream.example.com/ws", HeaderMap::new()).await?;
//!
//!     loop {
//!         match client.read_message().await {
//!             Ok((MessageKind::Text, data)) => println!("{}", String::from_utf8_lossy(&data)),
//!             Ok(_) => {}
//!             Err(e) => {
//!                 eprintln!("read failed: {e}");
//!                 tokio::time::sleep(std::time::Duration::from_secs(1)).await;
//!             }
//!         }
//!     }
//! }
//! ```

mod client;
mod client_builder;
mod connection_state;
mod listener;
mod metrics;
mod reconnect;
mod transport;

pub use client::{ReconnectingClient, DEFAULT_HANDSHAKE_TIMEOUT};
pub use client_builder::ClientBuilder;
pub use connection_state::ConnectionState;
pub use listener::{ConnectionListener, NoopListener};
pub use metrics::ClientMetrics;
pub use reconnect::{
    ExponentialBackoff, FixedDelay, ReconnectionStrategy, DEFAULT_MAX_RECONNECT_INTERVAL,
    DEFAULT_MIN_RECONNECT_INTERVAL, DEFAULT_RECONNECT_INTERVAL_FACTOR,
};
pub use transport::{
    Connection, DialFailure, DialTarget, Dialer, DialerOptions, HandshakeResponse, HeaderMap,
    HeaderValue, TlsConnector, TransportReader, TransportWriter, TungsteniteDialer,
};
