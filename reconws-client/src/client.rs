//! Self-healing WebSocket client
//!
//! This module provides [`ReconnectingClient`], a WebSocket client that keeps
//! itself connected. A background dial loop establishes the connection and
//! retries with backoff until it succeeds; any read or write failure tears the
//! connection down and schedules a fresh dial loop.
//!
//! # Client Lifecycle
//!
//! 1. **Dial**: validate the URL, start the dial loop, wait one handshake
//!    timeout, return
//! 2. **Use**: read and write messages; `NotConnected` while disconnected
//! 3. **Heal**: an I/O failure closes the handle and dials again
//! 4. **Close**: release the handle; nothing redials until the next I/O
//!    failure or `dial`
//!
//! # Cloning
//!
//! `ReconnectingClient` is cheaply cloneable using `Arc` internally. All
//! clones share the same connection and state. The dial loop holds only a
//! weak reference, so dropping the last clone stops any retrying.
//!
//! # Locking
//!
//! Connection state lives behind one short-lived lock that is never held
//! across an `.await` or a listener callback. Each connection has separate
//! write and read locks, so a blocked read never delays a write.

use crate::connection_state::{ConnectionState, SharedState};
use crate::listener::ConnectionListener;
use crate::metrics::ClientMetrics;
use crate::reconnect::ReconnectionStrategy;
use crate::transport::{
    DialFailure, DialTarget, Dialer, DialerOptions, HandshakeResponse, HeaderMap,
    TransportHandle,
};
use reconws_core::{validate_url, Error, MessageKind, Payload, Result, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tracing::Instrument;

/// Default bound on the opening handshake, and the time `dial` waits
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);

/// Settings fixed at build time
pub(crate) struct ClientConfig {
    pub(crate) handshake_timeout: Duration,
    pub(crate) verbose: bool,
    pub(crate) dialer_options: DialerOptions,
    pub(crate) id: u64,
    pub(crate) name: String,
    pub(crate) meta: HashMap<String, serde_json::Value>,
}

pub(crate) struct Inner {
    pub(crate) config: ClientConfig,
    pub(crate) shared: Mutex<SharedState>,
    pub(crate) strategy: Mutex<Box<dyn ReconnectionStrategy>>,
    pub(crate) dialer: Arc<dyn Dialer>,
    pub(crate) listener: Arc<dyn ConnectionListener>,
    /// Set while a dial loop is running or about to run
    pub(crate) dialing: AtomicBool,
    pub(crate) metrics: Option<Arc<ClientMetrics>>,
}

/// Reconnecting WebSocket client
///
/// Build one with [`ClientBuilder`](crate::ClientBuilder), then call
/// [`dial`](Self::dial).
///
/// # Examples
///
/// ```rust,no_run
/// use reconws_client::{ClientBuilder, HeaderMap};
/// use reconws_core::MessageKind;
///
/// # async fn example() -> reconws_core::Result<()> {
/// let client = ClientBuilder::new().name("ticker").build()?;
/// client.dial("wss://stream.example.com/ws", HeaderMap::new()).await?;
///
/// client.write_json(&serde_json::json!({"op": "subscribe"})).await?;
/// let (kind, data) = client.read_message().await?;
/// assert_eq!(kind, MessageKind::Text);
/// # let _ = data;
/// client.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ReconnectingClient {
    pub(crate) inner: Arc<Inner>,
}

impl ReconnectingClient {
    /// Client with default settings and the `tokio-tungstenite` dialer
    pub fn new() -> Self {
        crate::ClientBuilder::new().assemble()
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Connect to `url` using the builder's dialer options
    ///
    /// See [`dial_with`](Self::dial_with).
    pub async fn dial(&self, url: &str, headers: HeaderMap) -> Result<()> {
        let options = self.inner.config.dialer_options.clone();
        self.dial_with(url, headers, options).await
    }

    /// Connect to `url` with explicit dialer options
    ///
    /// The URL is validated synchronously; a bad URL fails here and nothing
    /// is dialed. Otherwise the dial loop is started in the background and
    /// this call waits one handshake timeout before returning `Ok(())`,
    /// whether or not the first attempt succeeded. Dial failures surface
    /// through [`dial_error`](Self::dial_error) and the listener.
    #[tracing::instrument(skip(self, headers, options), fields(client = %self.inner.config.name))]
    pub async fn dial_with(&self, url: &str, headers: HeaderMap, options: DialerOptions) -> Result<()> {
        let url = validate_url(url)?;

        let handshake_timeout = options
            .handshake_timeout
            .filter(|timeout| !timeout.is_zero())
            .unwrap_or(self.inner.config.handshake_timeout);

        self.shared().target = Some(Arc::new(DialTarget {
            url,
            headers,
            options,
            handshake_timeout,
        }));

        if self.claim_dial_loop() {
            self.spawn_dial_loop();
        } else {
            tracing::debug!("Dial loop already running, it will pick up the new target");
        }

        tokio::time::sleep(handshake_timeout).await;
        Ok(())
    }

    /// Write one message
    ///
    /// Returns `NotConnected` without touching the network while
    /// disconnected. Text payloads must be valid UTF-8. A transport failure
    /// fires `on_write_error`, schedules a reconnect, and is returned.
    pub async fn write_message(&self, kind: MessageKind, data: impl Into<Vec<u8>>) -> Result<()> {
        let handle = self.shared().live_handle().ok_or(Error::NotConnected)?;

        let data = data.into();
        if kind == MessageKind::Text {
            std::str::from_utf8(&data).map_err(|e| Error::Serialization(e.to_string()))?;
        }

        let result = {
            let mut writer = handle.writer.lock().await;
            writer.write(kind, data).await
        };

        match result {
            Ok(()) => {
                if let Some(ref m) = self.inner.metrics {
                    m.record_message("write");
                }
                Ok(())
            }
            Err(error) => {
                tracing::debug!(error = %error, generation = handle.generation, "Write failed");
                if let Some(ref m) = self.inner.metrics {
                    m.record_io_error("write");
                }
                self.inner.listener.on_write_error(self, &error);
                self.handle_io_failure(handle.generation);
                Err(error)
            }
        }
    }

    /// Serialize `value` as JSON and write it as a text message
    pub async fn write_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let body = serde_json::to_vec(value)?;
        self.write_message(MessageKind::Text, body).await
    }

    /// Wait for the next data message
    ///
    /// Same guard as [`write_message`](Self::write_message); a failure fires
    /// `on_read_error` and schedules a reconnect.
    pub async fn read_message(&self) -> Result<(MessageKind, Vec<u8>)> {
        let handle = self.shared().live_handle().ok_or(Error::NotConnected)?;

        let result = {
            let mut reader = handle.reader.lock().await;
            reader.read().await
        };

        match result {
            Ok(message) => {
                if let Some(ref m) = self.inner.metrics {
                    m.record_message("read");
                }
                Ok(message)
            }
            Err(error) => {
                tracing::debug!(error = %error, generation = handle.generation, "Read failed");
                if let Some(ref m) = self.inner.metrics {
                    m.record_io_error("read");
                }
                self.inner.listener.on_read_error(self, &error);
                self.handle_io_failure(handle.generation);
                Err(error)
            }
        }
    }

    /// Read the next message as a [`Payload`]
    pub async fn read_payload(&self) -> Result<(MessageKind, Payload)> {
        let (kind, data) = self.read_message().await?;
        Ok((kind, Payload::new(data)))
    }

    /// Read the next message and decode it as JSON
    ///
    /// A decode failure is returned as `Serialization` and leaves the
    /// connection alone.
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T> {
        let (_, data) = self.read_message().await?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Close the current connection
    ///
    /// Fires `on_disconnect` when a live connection closed cleanly and
    /// `on_disconnect_error` when closing failed. A dial loop that is already
    /// running is not cancelled and may connect again afterwards.
    pub async fn close(&self) {
        let (handle, was_connected) = self.shared().release(ConnectionState::Closed);
        if let Some(ref m) = self.inner.metrics {
            m.update_connection_state(ConnectionState::Closed);
        }

        if let Some(handle) = handle {
            self.close_handle(&handle, was_connected).await;
        }
    }

    /// Whether a connection is installed and usable
    pub fn is_connected(&self) -> bool {
        self.shared().connected
    }

    /// Current lifecycle state
    pub fn state(&self) -> ConnectionState {
        self.shared().state
    }

    /// Error of the most recent dial attempt, cleared on success
    pub fn dial_error(&self) -> Option<Error> {
        self.shared().dial_error.clone()
    }

    /// Upgrade response of the most recent dial attempt
    pub fn handshake_response(&self) -> Option<HandshakeResponse> {
        self.shared().handshake_response.clone()
    }

    /// Endpoint of the most recent `dial`
    pub fn url(&self) -> Option<Url> {
        self.shared().target.as_ref().map(|target| target.url.clone())
    }

    /// Client identifier
    pub fn id(&self) -> u64 {
        self.inner.config.id
    }

    /// Client name
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Arbitrary metadata attached at build time
    pub fn meta(&self) -> &HashMap<String, serde_json::Value> {
        &self.inner.config.meta
    }

    fn shared(&self) -> MutexGuard<'_, SharedState> {
        self.inner.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn strategy(&self) -> MutexGuard<'_, Box<dyn ReconnectionStrategy>> {
        self.inner.strategy.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true if the caller now owns the single dial loop
    fn claim_dial_loop(&self) -> bool {
        !self.inner.dialing.swap(true, Ordering::AcqRel)
    }

    fn span(&self) -> tracing::Span {
        tracing::info_span!(
            "reconws",
            client_id = self.inner.config.id,
            client = %self.inner.config.name
        )
    }

    fn spawn_dial_loop(&self) {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(dial_loop(weak).instrument(self.span()));
    }

    /// Tear down the failed connection and start healing
    ///
    /// Only the failure of the installed handle triggers this; a stale handle
    /// (already replaced or closed) is ignored so concurrent read and write
    /// failures on one socket start a single dial loop.
    fn handle_io_failure(&self, generation: u64) {
        let (handle, was_connected) = {
            let mut shared = self.shared();
            if !shared.is_current(generation) {
                tracing::debug!(generation, "Ignoring failure of a stale connection");
                return;
            }
            shared.release(ConnectionState::Connecting)
        };

        if let Some(ref m) = self.inner.metrics {
            m.update_connection_state(ConnectionState::Connecting);
        }

        let owns_loop = self.claim_dial_loop();
        let client = self.clone();
        let task = async move {
            if let Some(handle) = handle {
                client.close_handle(&handle, was_connected).await;
            }

            if let Err(e) = client.inner.listener.on_pre_reconnect(&client) {
                tracing::error!(error = %e, url = ?client.url(), "Pre-reconnect hook failed");
            }

            if owns_loop {
                let weak = Arc::downgrade(&client.inner);
                drop(client);
                dial_loop(weak).await;
            }
        };
        tokio::spawn(task.instrument(self.span()));
    }

    async fn close_handle(&self, handle: &TransportHandle, was_connected: bool) {
        let result = handle.writer.lock().await.close().await;
        match result {
            Ok(()) => {
                if was_connected {
                    self.inner.listener.on_disconnect(self);
                }
            }
            Err(error) => {
                if self.inner.config.verbose {
                    tracing::error!(error = %error, "Failed to close connection");
                }
                self.inner.listener.on_disconnect_error(self, &error);
            }
        }
    }

    /// One dial attempt; returns the backoff delay when it failed
    async fn dial_attempt(&self) -> Option<Duration> {
        let target = {
            let mut shared = self.shared();
            shared.begin_dial();
            shared.target.clone()
        };
        let Some(target) = target else {
            self.inner.dialing.store(false, Ordering::Release);
            return None;
        };

        if let Some(ref m) = self.inner.metrics {
            m.update_connection_state(ConnectionState::Connecting);
        }

        let outcome = tokio::time::timeout(target.handshake_timeout, self.inner.dialer.dial(&target))
            .await
            .unwrap_or_else(|_| {
                Err(DialFailure::from(Error::Connection(format!(
                    "handshake timed out after {:?}",
                    target.handshake_timeout
                ))))
            });

        match outcome {
            Ok(connection) => {
                let handle = TransportHandle::new(connection.writer, connection.reader);
                let previous = {
                    let mut shared = self.shared();
                    let previous = shared.install(handle, connection.response);
                    // Released under the state lock, so a failure of the new
                    // handle can always claim the next loop.
                    self.inner.dialing.store(false, Ordering::Release);
                    previous
                };
                self.strategy().reset();

                if let Some(previous) = previous {
                    tokio::spawn(async move {
                        let _ = previous.writer.lock().await.close().await;
                    });
                }

                if let Some(ref m) = self.inner.metrics {
                    m.record_dial(true);
                    m.update_connection_state(ConnectionState::Connected);
                }
                if self.inner.config.verbose {
                    tracing::info!(url = %target.url, "Connection established");
                }
                self.inner.listener.on_connect(self);
                None
            }
            Err(DialFailure { error, response }) => {
                let (delay, attempt) = {
                    let mut strategy = self.strategy();
                    let delay = strategy.next_interval();
                    (delay, strategy.attempt())
                };
                let (dropped, was_connected) =
                    self.shared().record_dial_failure(error.clone(), response);
                if let Some(handle) = dropped {
                    let client = self.clone();
                    let task = async move { client.close_handle(&handle, was_connected).await };
                    tokio::spawn(task.instrument(self.span()));
                }

                if let Some(ref m) = self.inner.metrics {
                    m.record_dial(false);
                }
                if self.inner.config.verbose {
                    tracing::error!(
                        url = %target.url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Dial failed, retrying"
                    );
                }
                self.inner.listener.on_connect_error(self, &error);
                Some(delay)
            }
        }
    }
}

/// Dial until connected, or until the client is gone
async fn dial_loop(client: Weak<Inner>) {
    loop {
        let Some(inner) = client.upgrade() else {
            tracing::debug!("Client dropped, stopping dial loop");
            return;
        };
        let delay = ReconnectingClient { inner }.dial_attempt().await;

        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => return,
        }
    }
}

impl Default for ReconnectingClient {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ReconnectingClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shared = self.shared();
        f.debug_struct("ReconnectingClient")
            .field("id", &self.inner.config.id)
            .field("name", &self.inner.config.name)
            .field("state", &shared.state)
            .field("url", &shared.target.as_ref().map(|t| t.url.as_str()))
            .finish()
    }
}
