//! Error types for reconws
//!
//! This module defines the error taxonomy of the reconnecting client. Every
//! failure falls in one of four kinds:
//!
//! - **Config**: the endpoint URL is unusable (empty, wrong scheme, embedded
//!   credentials). Returned synchronously from `dial` and never retried.
//! - **Connection**: a dial or handshake attempt failed. Never returned to the
//!   caller of `dial`; observed through the listener and `dial_error()`, and
//!   always retried under backoff.
//! - **Io**: a read or write on an established connection failed. Returned once
//!   to the caller of the failing call, which also schedules a reconnect.
//! - **NotConnected**: an I/O call was made while no connection is installed.
//!
//! No error in this crate is fatal to the process.
//!
//! # Examples
//!
//! ```rust
//! use reconws_core::{ConfigError, Error, ErrorKind};
//!
//! let error: Error = ConfigError::EmptyUrl.into();
//! assert_eq!(error.kind(), ErrorKind::Config);
//! assert!(!error.is_retryable());
//! ```

use thiserror::Error;

/// Result type for reconws operations
pub type Result<T> = std::result::Result<T, Error>;

/// Endpoint validation failures
///
/// Produced by [`crate::validate_url`] before any network activity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The URL string was empty
    #[error("url can not be empty")]
    EmptyUrl,

    /// The URL could not be parsed at all
    #[error("invalid websocket url: {0}")]
    InvalidUrl(String),

    /// The URL scheme is neither `ws` nor `wss`
    #[error("websocket uri must start with ws or wss scheme, got {scheme:?}")]
    WrongScheme {
        /// The scheme that was found
        scheme: String,
    },

    /// The URL carries a user name or password
    #[error("user name and password are not allowed in websocket uri")]
    CredentialsNotAllowed,
}

/// Application-level error type for reconws operations
///
/// The type is `Clone` so the last dial failure can be stored on the client
/// and handed out by `dial_error()` any number of times.
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The endpoint configuration was rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Dial or handshake failure
    ///
    /// Includes refused TCP connections, TLS failures, rejected upgrades and
    /// handshake timeouts.
    #[error("connection error: {0}")]
    Connection(String),

    /// Read or write failure on an established connection
    #[error("IO error: {0}")]
    Io(String),

    /// The client has no live connection
    #[error("websocket not connected")]
    NotConnected,

    /// Serialization or deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A payload helper was asked to decode zero bytes
    #[error("payload empty")]
    PayloadEmpty,

    /// Internal error
    ///
    /// Setup failures that are neither configuration nor network related,
    /// such as installing the global tracing subscriber twice.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Endpoint configuration rejected before dialing
    Config,
    /// Dial or handshake failure, retried in the background
    Connection,
    /// Failure on an active connection, or payload handling around it
    Io,
    /// No live connection
    NotConnected,
    /// Anything else
    Other,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_) => ErrorKind::Config,
            Error::Connection(_) => ErrorKind::Connection,
            Error::Io(_) | Error::Serialization(_) | Error::PayloadEmpty => ErrorKind::Io,
            Error::NotConnected => ErrorKind::NotConnected,
            Error::Internal(_) => ErrorKind::Other,
        }
    }

    /// Whether the client retries this failure on its own
    ///
    /// Connection failures are retried by the dial loop and I/O failures
    /// schedule a reconnect; configuration errors and `NotConnected` are final
    /// for the call that produced them.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Connection(_) | Error::Io(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
