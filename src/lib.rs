//! reconws - self-healing WebSocket client
//!
//! This is the main convenience crate that re-exports the reconws sub-crates.
//! Use this crate if you want a single dependency.
//!
//! # Architecture
//!
//! - **reconws-core**: error taxonomy, URL validation, message kinds,
//!   observability setup
//! - **reconws-client**: backoff, connection state, dial loop, I/O guard,
//!   listener, builder, metrics
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use reconws::{ClientBuilder, HeaderMap};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = ClientBuilder::new().verbose(true).build()?;
//!     client.dial("wss://stream.example.com/ws", HeaderMap::new()).await?;
//!
//!     client.write_json(&serde_json::json!({"method": "SUBSCRIBE"})).await?;
//!     let (_kind, payload) = client.read_payload().await?;
//!     println!("{:?}", payload.to_map());
//!
//!     client.close().await;
//!     Ok(())
//! }
//! ```

pub use reconws_client as client;
pub use reconws_core as core;

pub use reconws_client::{ClientBuilder, ConnectionListener, HeaderMap, ReconnectingClient};
pub use reconws_core::{Error, MessageKind, ObservabilityConfig, Payload, Result};
