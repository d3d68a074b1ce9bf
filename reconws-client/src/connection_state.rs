//! Connection state management
//!
//! This module holds the single source of truth for "am I connected": the
//! lifecycle state, the installed transport handle, and the outcome of the
//! most recent dial attempt. All of it lives behind one lock.
//!
//! # Connection States
//!
//! - **Disconnected**: Initial state, nothing dialed yet
//! - **Connecting**: A dial loop is attempting to establish a connection
//! - **Connected**: A transport handle is installed and usable
//! - **Closed**: `close()` was called; no automatic reconnection from here
//!
//! # State Transitions
//!
//! ```text
//! Disconnected → Connecting ⇄ (retry after backoff)
//!                    ↓  ↑
//!                 Connected ──(I/O failure)──┘
//!
//! any state ──close()──→ Closed ──dial()──→ Connecting
//! ```

use crate::transport::{DialTarget, HandshakeResponse, TransportHandle};
use reconws_core::Error;
use std::fmt;
use std::sync::Arc;

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not connected, never dialed
    Disconnected,
    /// A dial loop is attempting to connect
    Connecting,
    /// Successfully connected
    Connected,
    /// Explicitly closed by the owner
    Closed,
}

impl ConnectionState {
    /// Numeric code used for the connection state gauge
    pub fn as_code(self) -> i64 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Closed => 3,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Everything guarded by the client's state lock
///
/// Invariant: `connected` is true exactly when `handle` is `Some` and the
/// most recent dial attempt succeeded.
pub(crate) struct SharedState {
    pub(crate) state: ConnectionState,
    pub(crate) connected: bool,
    pub(crate) handle: Option<Arc<TransportHandle>>,
    /// Bumped every time a handle is installed
    pub(crate) generation: u64,
    pub(crate) dial_error: Option<Error>,
    pub(crate) handshake_response: Option<HandshakeResponse>,
    pub(crate) target: Option<Arc<DialTarget>>,
}

impl SharedState {
    pub(crate) fn new() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            connected: false,
            handle: None,
            generation: 0,
            dial_error: None,
            handshake_response: None,
            target: None,
        }
    }

    /// The installed handle, if connected
    pub(crate) fn live_handle(&self) -> Option<Arc<TransportHandle>> {
        if self.connected {
            self.handle.clone()
        } else {
            None
        }
    }

    /// Whether `generation` still names the installed, connected handle
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.connected && self.generation == generation
    }

    pub(crate) fn begin_dial(&mut self) {
        self.state = ConnectionState::Connecting;
    }

    /// Install a freshly dialed handle, returning the one it replaces
    pub(crate) fn install(
        &mut self,
        mut handle: TransportHandle,
        response: HandshakeResponse,
    ) -> Option<Arc<TransportHandle>> {
        self.generation += 1;
        handle.generation = self.generation;

        let previous = self.handle.replace(Arc::new(handle));
        self.connected = true;
        self.state = ConnectionState::Connected;
        self.dial_error = None;
        self.handshake_response = Some(response);
        previous
    }

    /// Record a failed dial attempt
    ///
    /// A handle still installed from an earlier connection is released and
    /// returned together with whether the client was connected, so the caller
    /// can close it.
    pub(crate) fn record_dial_failure(
        &mut self,
        error: Error,
        response: Option<HandshakeResponse>,
    ) -> (Option<Arc<TransportHandle>>, bool) {
        self.dial_error = Some(error);
        self.handshake_response = response;
        self.release(ConnectionState::Connecting)
    }

    /// Drop the installed handle and mark the client disconnected
    ///
    /// Returns the released handle and whether the client was connected.
    pub(crate) fn release(&mut self, next: ConnectionState) -> (Option<Arc<TransportHandle>>, bool) {
        let was_connected = self.connected;
        self.connected = false;
        self.state = next;
        (self.handle.take(), was_connected)
    }
}
