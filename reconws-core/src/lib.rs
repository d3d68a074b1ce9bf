//! Core types for reconws
//!
//! This crate holds the pieces of the reconnecting WebSocket client that do
//! not depend on a live connection:
//!
//! - **Error handling**: the error taxonomy shared by every reconws crate
//! - **Endpoint validation**: rejects malformed URLs before any network I/O
//! - **Messages**: message kinds and the JSON [`Payload`] helper
//! - **Observability**: tracing subscriber and OpenTelemetry export setup
//!
//! # Example
//!
//! ```rust
//! use reconws_core::{validate_url, ConfigError, MessageKind};
//!
//! assert!(validate_url("ws://localhost:8080/ws").is_ok());
//! assert_eq!(validate_url("http://x").unwrap_err(), ConfigError::WrongScheme { scheme: "http".into() });
//! assert_eq!(MessageKind::Text.code(), 1);
//! ```

pub mod endpoint;
pub mod error;
pub mod message;
pub mod observability;

pub use endpoint::{validate_url, Url};
pub use error::{ConfigError, Error, ErrorKind, Result};
pub use message::{MessageKind, Payload};
pub use observability::{
    init_observability, shutdown_observability, LogFormat, ObservabilityConfig,
};
