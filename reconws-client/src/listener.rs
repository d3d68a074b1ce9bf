//! Lifecycle listener
//!
//! A [`ConnectionListener`] observes the client's lifecycle. Every method has
//! a no-op default, so implementors override only the events they care about.
//!
//! Callbacks run synchronously on whichever task detected the event: the dial
//! loop for connect events, the caller of `read_message`/`write_*` for I/O
//! errors, the caller of `close` for disconnects. They may run concurrently
//! with each other and must not block for long. They are never invoked while
//! the client's state lock is held, so calling `is_connected()` or
//! `dial_error()` from a callback is fine.
//!
//! # Ordering
//!
//! - `on_connect_error` fires before the backoff sleep of every failed dial
//! - `on_connect` fires once per successful connection, after the client is
//!   marked connected
//! - `on_disconnect` / `on_disconnect_error` fire while the handle is closed,
//!   both before a reconnect and on explicit `close()`
//! - an error from `on_pre_reconnect` is logged and never blocks the retry
//!
//! # Examples
//!
//! ```rust
//! use reconws_client::{ConnectionListener, ReconnectingClient};
//! use reconws_core::Error;
//!
//! struct LogListener;
//!
//! impl ConnectionListener for LogListener {
//!     fn on_connect(&self, client: &ReconnectingClient) {
//!         println!("connected to {:?}", client.url());
//!     }
//!
//!     fn on_read_error(&self, _client: &ReconnectingClient, error: &Error) {
//!         eprintln!("read failed: {error}");
//!     }
//! }
//! ```

use crate::ReconnectingClient;
use reconws_core::{Error, Result};

/// Observer of connection lifecycle events
pub trait ConnectionListener: Send + Sync + 'static {
    /// A dial attempt succeeded and the client is connected
    fn on_connect(&self, _client: &ReconnectingClient) {}

    /// The active handle was closed cleanly
    fn on_disconnect(&self, _client: &ReconnectingClient) {}

    /// A dial attempt failed; the loop will sleep and retry
    fn on_connect_error(&self, _client: &ReconnectingClient, _error: &Error) {}

    /// Closing the active handle failed
    fn on_disconnect_error(&self, _client: &ReconnectingClient, _error: &Error) {}

    /// A read on the active connection failed
    fn on_read_error(&self, _client: &ReconnectingClient, _error: &Error) {}

    /// A write on the active connection failed
    fn on_write_error(&self, _client: &ReconnectingClient, _error: &Error) {}

    /// Runs after the failed handle is closed and before redialing
    ///
    /// A returned error is only logged.
    fn on_pre_reconnect(&self, _client: &ReconnectingClient) -> Result<()> {
        Ok(())
    }
}

/// Listener that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopListener;

impl ConnectionListener for NoopListener {}
