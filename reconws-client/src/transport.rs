//! Transport abstraction
//!
//! The client never speaks the WebSocket protocol itself. A [`Dialer`]
//! produces a connected pair of halves, a [`TransportWriter`] and a
//! [`TransportReader`], plus the handshake metadata. Keeping the halves apart
//! lets reads and writes use independent locks.
//!
//! [`TungsteniteDialer`] is the production implementation on top of
//! `tokio-tungstenite`. Tests plug in in-memory dialers through the same
//! traits.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use reconws_core::{Error, MessageKind, Result, Url};
use std::borrow::Cow;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, WebSocketConfig};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

pub use tokio_tungstenite::tungstenite::http::{HeaderMap, HeaderValue};
pub use tokio_tungstenite::Connector as TlsConnector;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Upper bound on a proxy's CONNECT response head
const MAX_PROXY_RESPONSE_BYTES: usize = 8 * 1024;

/// Write half of a connected transport
#[async_trait]
pub trait TransportWriter: Send {
    /// Write one complete message
    async fn write(&mut self, kind: MessageKind, data: Vec<u8>) -> Result<()>;

    /// Close the connection
    async fn close(&mut self) -> Result<()>;
}

/// Read half of a connected transport
#[async_trait]
pub trait TransportReader: Send {
    /// Block until the next data message arrives
    ///
    /// Returns an error when the connection fails or the peer closes it.
    async fn read(&mut self) -> Result<(MessageKind, Vec<u8>)>;
}

/// Metadata of the HTTP upgrade response
#[derive(Debug, Clone, PartialEq)]
pub struct HandshakeResponse {
    /// HTTP status code, 101 on success
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body, only present on rejected handshakes
    pub body: Option<Vec<u8>>,
}

impl HandshakeResponse {
    /// Build a response record from a status code and headers
    pub fn new(status: u16, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: None,
        }
    }

    fn from_http<T>(response: &tungstenite::http::Response<T>) -> Self {
        Self::new(response.status().as_u16(), response.headers().clone())
    }
}

/// A freshly established connection
pub struct Connection {
    /// Write half
    pub writer: Box<dyn TransportWriter>,
    /// Read half
    pub reader: Box<dyn TransportReader>,
    /// Upgrade response
    pub response: HandshakeResponse,
}

/// A failed dial attempt
///
/// Carries the server's response when the upgrade itself was rejected.
#[derive(Debug, Clone)]
pub struct DialFailure {
    /// What went wrong
    pub error: Error,
    /// The server's response, if one was received
    pub response: Option<HandshakeResponse>,
}

impl From<Error> for DialFailure {
    fn from(error: Error) -> Self {
        Self {
            error,
            response: None,
        }
    }
}

/// Dialer settings
///
/// # Examples
///
/// ```rust
/// use reconws_client::DialerOptions;
/// use std::time::Duration;
///
/// let options = DialerOptions::new()
///     .with_handshake_timeout(Duration::from_secs(5))
///     .with_subprotocol("graphql-ws")
///     .with_max_message_size(16 << 20);
/// ```
#[derive(Clone, Default)]
pub struct DialerOptions {
    /// Overrides the client's handshake timeout when set
    pub handshake_timeout: Option<Duration>,
    /// HTTP proxy to tunnel through with CONNECT
    pub proxy: Option<Url>,
    /// TLS configuration for `wss` endpoints
    pub tls: Option<TlsConnector>,
    /// Offered subprotocols, in preference order
    pub subprotocols: Vec<String>,
    /// Largest accepted message, in bytes
    pub max_message_size: Option<usize>,
    /// Largest accepted frame, in bytes
    pub max_frame_size: Option<usize>,
}

impl DialerOptions {
    /// Options with library defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Bound the opening handshake
    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Tunnel through an HTTP proxy
    pub fn with_proxy(mut self, proxy: Url) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Use a custom TLS connector
    pub fn with_tls(mut self, connector: TlsConnector) -> Self {
        self.tls = Some(connector);
        self
    }

    /// Offer a subprotocol
    pub fn with_subprotocol(mut self, protocol: impl Into<String>) -> Self {
        self.subprotocols.push(protocol.into());
        self
    }

    /// Limit incoming message size
    pub fn with_max_message_size(mut self, bytes: usize) -> Self {
        self.max_message_size = Some(bytes);
        self
    }

    /// Limit incoming frame size
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = Some(bytes);
        self
    }
}

impl fmt::Debug for DialerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DialerOptions")
            .field("handshake_timeout", &self.handshake_timeout)
            .field("proxy", &self.proxy.as_ref().map(Url::as_str))
            .field("tls", &self.tls.is_some())
            .field("subprotocols", &self.subprotocols)
            .field("max_message_size", &self.max_message_size)
            .field("max_frame_size", &self.max_frame_size)
            .finish()
    }
}

/// Everything a dialer needs to reach the endpoint
#[derive(Debug, Clone)]
pub struct DialTarget {
    /// Validated endpoint
    pub url: Url,
    /// Extra request headers for the upgrade request
    pub headers: HeaderMap,
    /// Dialer settings
    pub options: DialerOptions,
    /// Effective handshake timeout
    pub handshake_timeout: Duration,
}

/// Produces connected transports
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Establish a new connection to `target`
    ///
    /// Called once per dial attempt, on the initial dial and on every retry.
    async fn dial(&self, target: &DialTarget) -> std::result::Result<Connection, DialFailure>;
}

/// A dialed connection installed in the client
pub(crate) struct TransportHandle {
    pub(crate) generation: u64,
    pub(crate) writer: Mutex<Box<dyn TransportWriter>>,
    pub(crate) reader: Mutex<Box<dyn TransportReader>>,
}

impl TransportHandle {
    pub(crate) fn new(writer: Box<dyn TransportWriter>, reader: Box<dyn TransportReader>) -> Self {
        Self {
            generation: 0,
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        }
    }
}

/// `tokio-tungstenite` backed dialer
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteDialer;

#[async_trait]
impl Dialer for TungsteniteDialer {
    async fn dial(&self, target: &DialTarget) -> std::result::Result<Connection, DialFailure> {
        let request = build_request(target)?;

        let host = target
            .url
            .host_str()
            .ok_or_else(|| Error::Connection(format!("{} has no host", target.url)))?;
        let port = target
            .url
            .port_or_known_default()
            .ok_or_else(|| Error::Connection(format!("{} has no port", target.url)))?;

        let stream = match &target.options.proxy {
            Some(proxy) => connect_via_proxy(proxy, host, port).await?,
            None => TcpStream::connect((host, port))
                .await
                .map_err(|e| Error::Connection(e.to_string()))?,
        };

        let mut config = WebSocketConfig::default();
        config.max_message_size = target.options.max_message_size.or(config.max_message_size);
        config.max_frame_size = target.options.max_frame_size.or(config.max_frame_size);

        let (ws_stream, response) = tokio_tungstenite::client_async_tls_with_config(
            request,
            stream,
            Some(config),
            target.options.tls.clone(),
        )
        .await
        .map_err(handshake_failure)?;

        let (sink, stream) = ws_stream.split();
        Ok(Connection {
            writer: Box::new(TungsteniteWriter { sink }),
            reader: Box::new(TungsteniteReader { stream }),
            response: HandshakeResponse::from_http(&response),
        })
    }
}

fn build_request(
    target: &DialTarget,
) -> Result<tungstenite::handshake::client::Request> {
    let mut request = target
        .url
        .as_str()
        .into_client_request()
        .map_err(|e| Error::Connection(e.to_string()))?;

    for (name, value) in &target.headers {
        request.headers_mut().append(name, value.clone());
    }

    if !target.options.subprotocols.is_empty() {
        let offered = HeaderValue::from_str(&target.options.subprotocols.join(", "))
            .map_err(|e| Error::Connection(format!("invalid subprotocol: {e}")))?;
        request
            .headers_mut()
            .insert("sec-websocket-protocol", offered);
    }

    Ok(request)
}

fn handshake_failure(error: tungstenite::Error) -> DialFailure {
    match error {
        tungstenite::Error::Http(response) => {
            let mut metadata = HandshakeResponse::from_http(&response);
            metadata.body = response.body().clone();
            DialFailure {
                error: Error::Connection(format!(
                    "handshake rejected with status {}",
                    metadata.status
                )),
                response: Some(metadata),
            }
        }
        other => Error::Connection(other.to_string()).into(),
    }
}

async fn connect_via_proxy(proxy: &Url, host: &str, port: u16) -> Result<TcpStream> {
    let proxy_host = proxy
        .host_str()
        .ok_or_else(|| Error::Connection(format!("proxy {proxy} has no host")))?;
    let proxy_port = proxy.port_or_known_default().unwrap_or(80);

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| Error::Connection(format!("proxy connect failed: {e}")))?;

    let authority = format!("{host}:{port}");
    let connect = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n\r\n");
    stream
        .write_all(connect.as_bytes())
        .await
        .map_err(|e| Error::Connection(format!("proxy write failed: {e}")))?;

    let mut head = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| Error::Connection(format!("proxy read failed: {e}")))?;
        if n == 0 {
            return Err(Error::Connection("proxy closed the tunnel".to_string()));
        }
        head.extend_from_slice(&chunk[..n]);
        if head.len() > MAX_PROXY_RESPONSE_BYTES {
            return Err(Error::Connection("proxy response too large".to_string()));
        }
    }

    let status = parse_proxy_status(&head)
        .ok_or_else(|| Error::Connection("malformed proxy response".to_string()))?;
    if status != 200 {
        return Err(Error::Connection(format!(
            "proxy refused tunnel with status {status}"
        )));
    }

    Ok(stream)
}

fn parse_proxy_status(head: &[u8]) -> Option<u16> {
    let text = std::str::from_utf8(head).ok()?;
    let status_line = text.lines().next()?;
    let mut parts = status_line.split_whitespace();
    if !parts.next()?.starts_with("HTTP/") {
        return None;
    }
    parts.next()?.parse().ok()
}

struct TungsteniteWriter {
    sink: SplitSink<WsStream, Message>,
}

#[async_trait]
impl TransportWriter for TungsteniteWriter {
    async fn write(&mut self, kind: MessageKind, data: Vec<u8>) -> Result<()> {
        let message = to_message(kind, data)?;
        self.sink
            .send(message)
            .await
            .map_err(|e| Error::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        match self.sink.close().await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed) | Err(tungstenite::Error::AlreadyClosed) => {
                Ok(())
            }
            Err(e) => Err(Error::Io(e.to_string())),
        }
    }
}

struct TungsteniteReader {
    stream: SplitStream<WsStream>,
}

#[async_trait]
impl TransportReader for TungsteniteReader {
    async fn read(&mut self) -> Result<(MessageKind, Vec<u8>)> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok((MessageKind::Text, text.into_bytes())),
                Some(Ok(Message::Binary(data))) => return Ok((MessageKind::Binary, data)),
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| format!("{} {}", u16::from(f.code), f.reason))
                        .unwrap_or_else(|| "no status".to_string());
                    return Err(Error::Io(format!("connection closed by peer: {reason}")));
                }
                // Control frames are answered by tungstenite itself.
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) | Some(Ok(Message::Frame(_))) => {
                    continue
                }
                Some(Err(e)) => return Err(Error::Io(e.to_string())),
                None => return Err(Error::Io("connection closed".to_string())),
            }
        }
    }
}

fn to_message(kind: MessageKind, data: Vec<u8>) -> Result<Message> {
    Ok(match kind {
        MessageKind::Text => Message::Text(
            String::from_utf8(data).map_err(|e| Error::Serialization(e.to_string()))?,
        ),
        MessageKind::Binary => Message::Binary(data),
        MessageKind::Ping => Message::Ping(data),
        MessageKind::Pong => Message::Pong(data),
        MessageKind::Close => Message::Close(close_frame(&data)),
    })
}

/// Decode a close payload: a big-endian status code followed by a reason
fn close_frame(data: &[u8]) -> Option<CloseFrame<'static>> {
    if data.len() < 2 {
        return None;
    }
    let code = u16::from_be_bytes([data[0], data[1]]);
    Some(CloseFrame {
        code: CloseCode::from(code),
        reason: Cow::Owned(String::from_utf8_lossy(&data[2..]).into_owned()),
    })
}
