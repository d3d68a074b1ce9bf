//! Common test utilities for reconws-client integration tests
//!
//! This module provides a mock WebSocket server, a scriptable in-memory
//! dialer and a listener that records every lifecycle event.

#![allow(dead_code)]

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use reconws_client::{
    Connection, ConnectionListener, DialFailure, DialTarget, Dialer, HandshakeResponse, HeaderMap,
    ReconnectingClient, TransportReader, TransportWriter,
};
use reconws_core::{Error, MessageKind, Result};
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

/// Install a test log writer once per test binary
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("reconws_client=debug")
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds, for up to five seconds
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// Mock WebSocket echo server for client testing
pub struct MockWsServer {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    accepted: Arc<AtomicUsize>,
}

impl MockWsServer {
    /// Start a server that echoes text and binary messages
    pub async fn new() -> Self {
        Self::bind("127.0.0.1:0").await
    }

    /// Start a server on a specific address, e.g. to restart on a known port
    pub async fn bind(addr: &str) -> Self {
        let listener = TcpListener::bind(addr).await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let (kill_tx, _) = tokio::sync::broadcast::channel::<()>(1);

        let counter = accepted.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        let _ = kill_tx.send(());
                        break;
                    }
                    accept_result = listener.accept() => {
                        let Ok((stream, _)) = accept_result else { continue };
                        counter.fetch_add(1, Ordering::SeqCst);
                        let mut kill_rx = kill_tx.subscribe();

                        tokio::spawn(async move {
                            let Ok(ws_stream) = accept_async(stream).await else { return };
                            let (mut write, mut read) = ws_stream.split();

                            loop {
                                tokio::select! {
                                    _ = kill_rx.recv() => break,
                                    msg = read.next() => match msg {
                                        Some(Ok(msg @ (Message::Text(_) | Message::Binary(_)))) => {
                                            if write.send(msg).await.is_err() {
                                                break;
                                            }
                                        }
                                        Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                                        Some(Ok(_)) => {}
                                    }
                                }
                            }
                        });
                    }
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            accepted,
        }
    }

    /// Get the WebSocket URL for connecting to this server
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Get the bound socket address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Number of TCP connections accepted so far
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop accepting and drop every open connection
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Outcome of one scripted dial attempt
#[derive(Debug, Clone)]
pub enum DialStep {
    /// Connect to a fresh in-memory peer
    Connect,
    /// Fail before the handshake
    Fail(String),
    /// Reject the upgrade with an HTTP status
    Reject(u16),
    /// Never complete
    Hang,
}

/// Test-side end of an in-memory connection
#[derive(Clone)]
pub struct MemoryPeer {
    inbound: mpsc::UnboundedSender<Result<(MessageKind, Vec<u8>)>>,
    written: Arc<Mutex<Vec<(MessageKind, Vec<u8>)>>>,
    wire: Arc<Mutex<Vec<u8>>>,
    fail_writes: Arc<AtomicBool>,
    fail_close: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl MemoryPeer {
    fn new() -> (Self, MemoryWriter, MemoryReader) {
        let (inbound, rx) = mpsc::unbounded_channel();
        let peer = Self {
            inbound,
            written: Arc::new(Mutex::new(Vec::new())),
            wire: Arc::new(Mutex::new(Vec::new())),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_close: Arc::new(AtomicBool::new(false)),
            closed: Arc::new(AtomicBool::new(false)),
        };
        let writer = MemoryWriter { peer: peer.clone() };
        let reader = MemoryReader { rx };
        (peer, writer, reader)
    }

    /// Deliver a message to the client's reader
    pub fn send(&self, kind: MessageKind, data: impl Into<Vec<u8>>) {
        let _ = self.inbound.send(Ok((kind, data.into())));
    }

    /// Make the client's next read fail
    pub fn break_reads(&self) {
        let _ = self.inbound.send(Err(Error::Io("connection reset by peer".to_string())));
    }

    /// Make every following write fail
    pub fn break_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Make closing the connection fail
    pub fn break_close(&self) {
        self.fail_close.store(true, Ordering::SeqCst);
    }

    /// Messages the client wrote, in order
    pub fn written(&self) -> Vec<(MessageKind, Vec<u8>)> {
        self.written.lock().unwrap().clone()
    }

    /// Raw bytes as they hit the wire, one line per message
    pub fn wire(&self) -> Vec<u8> {
        self.wire.lock().unwrap().clone()
    }

    /// Whether the client closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

struct MemoryWriter {
    peer: MemoryPeer,
}

#[async_trait]
impl TransportWriter for MemoryWriter {
    async fn write(&mut self, kind: MessageKind, data: Vec<u8>) -> Result<()> {
        if self.peer.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Io("broken pipe".to_string()));
        }

        // Hit the wire in two halves so unserialized writers would interleave.
        let (head, tail) = data.split_at(data.len() / 2);
        self.peer.wire.lock().unwrap().extend_from_slice(head);
        tokio::task::yield_now().await;
        {
            let mut wire = self.peer.wire.lock().unwrap();
            wire.extend_from_slice(tail);
            wire.push(b'\n');
        }

        self.peer.written.lock().unwrap().push((kind, data));
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.peer.closed.store(true, Ordering::SeqCst);
        if self.peer.fail_close.load(Ordering::SeqCst) {
            return Err(Error::Io("close failed".to_string()));
        }
        Ok(())
    }
}

struct MemoryReader {
    rx: mpsc::UnboundedReceiver<Result<(MessageKind, Vec<u8>)>>,
}

#[async_trait]
impl TransportReader for MemoryReader {
    async fn read(&mut self) -> Result<(MessageKind, Vec<u8>)> {
        match self.rx.recv().await {
            Some(message) => message,
            None => Err(Error::Io("connection closed".to_string())),
        }
    }
}

/// In-memory dialer following a script of outcomes
///
/// Once the script runs out every attempt uses the fallback step.
pub struct ScriptedDialer {
    script: Mutex<VecDeque<DialStep>>,
    fallback: DialStep,
    probe: DialerProbe,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Test-side view of a [`ScriptedDialer`]
#[derive(Clone)]
pub struct DialerProbe {
    calls: Arc<AtomicUsize>,
    attempts: Arc<Mutex<Vec<Instant>>>,
    peers: Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<MemoryPeer>>>,
}

impl ScriptedDialer {
    pub fn new(script: impl IntoIterator<Item = DialStep>, fallback: DialStep) -> (Self, DialerProbe) {
        let (tx, rx) = mpsc::unbounded_channel();
        let probe = DialerProbe {
            calls: Arc::new(AtomicUsize::new(0)),
            attempts: Arc::new(Mutex::new(Vec::new())),
            peers: Arc::new(tokio::sync::Mutex::new(rx)),
        };
        let dialer = Self {
            script: Mutex::new(script.into_iter().collect()),
            fallback,
            probe: probe.clone(),
            peers: tx,
        };
        (dialer, probe)
    }

    /// Every attempt connects
    pub fn connecting() -> (Self, DialerProbe) {
        Self::new([], DialStep::Connect)
    }

    /// Every attempt fails
    pub fn failing() -> (Self, DialerProbe) {
        Self::new([], DialStep::Fail("connection refused".to_string()))
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    async fn dial(&self, _target: &DialTarget) -> std::result::Result<Connection, DialFailure> {
        self.probe.calls.fetch_add(1, Ordering::SeqCst);
        self.probe.attempts.lock().unwrap().push(Instant::now());

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            DialStep::Connect => {
                let (peer, writer, reader) = MemoryPeer::new();
                let _ = self.peers.send(peer);
                Ok(Connection {
                    writer: Box::new(writer),
                    reader: Box::new(reader),
                    response: HandshakeResponse::new(101, HeaderMap::new()),
                })
            }
            DialStep::Fail(reason) => Err(Error::Connection(reason).into()),
            DialStep::Reject(status) => Err(DialFailure {
                error: Error::Connection(format!("handshake rejected with status {status}")),
                response: Some(HandshakeResponse::new(status, HeaderMap::new())),
            }),
            DialStep::Hang => std::future::pending().await,
        }
    }
}

impl DialerProbe {
    /// Number of dial attempts so far
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Time of every dial attempt
    pub fn attempts(&self) -> Vec<Instant> {
        self.attempts.lock().unwrap().clone()
    }

    /// Wait for the peer of the next successful dial
    pub async fn next_peer(&self) -> MemoryPeer {
        tokio::time::timeout(Duration::from_secs(30), self.peers.lock().await.recv())
            .await
            .expect("no connection was dialed")
            .expect("dialer dropped")
    }
}

/// Listener event, recorded in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Connect,
    Disconnect,
    ConnectError(String),
    DisconnectError(String),
    ReadError(String),
    WriteError(String),
    PreReconnect,
}

/// Listener that records every event
#[derive(Clone, Default)]
pub struct RecordingListener {
    events: Arc<Mutex<Vec<Event>>>,
    fail_pre_reconnect: Arc<AtomicBool>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `on_pre_reconnect` return an error
    pub fn failing_pre_reconnect() -> Self {
        let listener = Self::default();
        listener.fail_pre_reconnect.store(true, Ordering::SeqCst);
        listener
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    /// Number of recorded events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.lock().unwrap().iter().filter(|e| predicate(e)).count()
    }

    pub fn connects(&self) -> usize {
        self.count(|e| *e == Event::Connect)
    }

    pub fn disconnects(&self) -> usize {
        self.count(|e| *e == Event::Disconnect)
    }

    pub fn connect_errors(&self) -> usize {
        self.count(|e| matches!(e, Event::ConnectError(_)))
    }

    pub fn read_errors(&self) -> usize {
        self.count(|e| matches!(e, Event::ReadError(_)))
    }

    pub fn write_errors(&self) -> usize {
        self.count(|e| matches!(e, Event::WriteError(_)))
    }

    pub fn pre_reconnects(&self) -> usize {
        self.count(|e| *e == Event::PreReconnect)
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl ConnectionListener for RecordingListener {
    fn on_connect(&self, client: &ReconnectingClient) {
        assert!(client.is_connected(), "on_connect fired before connected");
        self.push(Event::Connect);
    }

    fn on_disconnect(&self, _client: &ReconnectingClient) {
        self.push(Event::Disconnect);
    }

    fn on_connect_error(&self, client: &ReconnectingClient, error: &Error) {
        assert!(client.dial_error().is_some(), "dial error not recorded");
        self.push(Event::ConnectError(error.to_string()));
    }

    fn on_disconnect_error(&self, _client: &ReconnectingClient, error: &Error) {
        self.push(Event::DisconnectError(error.to_string()));
    }

    fn on_read_error(&self, _client: &ReconnectingClient, error: &Error) {
        self.push(Event::ReadError(error.to_string()));
    }

    fn on_write_error(&self, _client: &ReconnectingClient, error: &Error) {
        self.push(Event::WriteError(error.to_string()));
    }

    fn on_pre_reconnect(&self, _client: &ReconnectingClient) -> Result<()> {
        self.push(Event::PreReconnect);
        if self.fail_pre_reconnect.load(Ordering::SeqCst) {
            return Err(Error::Internal("not ready".to_string()));
        }
        Ok(())
    }
}
