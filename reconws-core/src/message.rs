//! Message kinds and payload helpers
//!
//! The client moves opaque byte payloads tagged with a [`MessageKind`]; the
//! framing itself belongs to the transport. [`Payload`] adds a thin JSON
//! convenience layer for consumers that receive JSON text frames.

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;
use std::fmt;
use std::ops::Deref;

/// WebSocket message kind
///
/// The numeric codes follow the RFC 6455 opcodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// UTF-8 text frame
    Text,
    /// Binary frame
    Binary,
    /// Close control frame
    Close,
    /// Ping control frame
    Ping,
    /// Pong control frame
    Pong,
}

impl MessageKind {
    /// RFC 6455 opcode for this kind
    pub fn code(self) -> u8 {
        match self {
            MessageKind::Text => 1,
            MessageKind::Binary => 2,
            MessageKind::Close => 8,
            MessageKind::Ping => 9,
            MessageKind::Pong => 10,
        }
    }

    /// Look up a kind by opcode
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(MessageKind::Text),
            2 => Some(MessageKind::Binary),
            8 => Some(MessageKind::Close),
            9 => Some(MessageKind::Ping),
            10 => Some(MessageKind::Pong),
            _ => None,
        }
    }

    /// Whether this is a control frame
    pub fn is_control(self) -> bool {
        matches!(
            self,
            MessageKind::Close | MessageKind::Ping | MessageKind::Pong
        )
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Text => "text",
            MessageKind::Binary => "binary",
            MessageKind::Close => "close",
            MessageKind::Ping => "ping",
            MessageKind::Pong => "pong",
        };
        f.write_str(name)
    }
}

/// Raw message body with JSON helpers
///
/// # Examples
///
/// ```rust
/// use reconws_core::Payload;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Trade {
///     symbol: String,
///     qty: u32,
/// }
///
/// let payload = Payload::from(br#"{"symbol":"BTCUSDT","qty":3}"#.to_vec());
/// let trade: Trade = payload.unpack().unwrap();
/// assert_eq!(trade.symbol, "BTCUSDT");
/// assert_eq!(trade.qty, 3);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload(Vec<u8>);

impl Payload {
    /// Wrap raw bytes
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Decode the payload as JSON into `T`
    ///
    /// Fails with [`Error::PayloadEmpty`] when there are no bytes, and with
    /// [`Error::Serialization`] when the JSON does not match `T`.
    pub fn unpack<T: DeserializeOwned>(&self) -> Result<T> {
        if self.0.is_empty() {
            return Err(Error::PayloadEmpty);
        }

        Ok(serde_json::from_slice(&self.0)?)
    }

    /// Decode the payload as a JSON object
    ///
    /// Returns an empty map when the payload is not a JSON object.
    pub fn to_map(&self) -> serde_json::Map<String, serde_json::Value> {
        serde_json::from_slice(&self.0).unwrap_or_default()
    }

    /// Consume the payload and return the raw bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Deref for Payload {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct ExecutionReport {
        #[serde(rename = "e")]
        event_type: String,
        #[serde(rename = "L")]
        last_exec_price: String,
        #[serde(rename = "l")]
        last_exec_qty: String,
        #[serde(rename = "m")]
        is_maker: bool,
    }

    #[test]
    fn test_kind_codes() {
        for kind in [
            MessageKind::Text,
            MessageKind::Binary,
            MessageKind::Close,
            MessageKind::Ping,
            MessageKind::Pong,
        ] {
            assert_eq!(MessageKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(MessageKind::from_code(3), None);
        assert!(MessageKind::Ping.is_control());
        assert!(!MessageKind::Text.is_control());
    }

    #[test]
    fn test_unpack_execution_report() {
        let raw = br#"{"e":"executionReport","E":1729844837277,"s":"FDUSDUSDT","S":"BUY","L":"0.99960000","l":"893.00000000","m":false,"M":true}"#;
        let payload = Payload::new(raw.to_vec());

        let report: ExecutionReport = payload.unpack().unwrap();
        assert_eq!(report.event_type, "executionReport");
        assert_eq!(report.last_exec_price, "0.99960000");
        assert_eq!(report.last_exec_qty, "893.00000000");
        assert!(!report.is_maker);
    }

    #[test]
    fn test_unpack_empty_payload() {
        let payload = Payload::default();
        let result = payload.unpack::<serde_json::Value>();
        assert!(matches!(result, Err(Error::PayloadEmpty)));
    }

    #[test]
    fn test_unpack_mismatched_json() {
        let payload = Payload::new(b"[1,2,3]".to_vec());
        let result = payload.unpack::<ExecutionReport>();
        assert!(matches!(result, Err(Error::Serialization(_))));
    }

    #[test]
    fn test_to_map() {
        let payload = Payload::new(br#"{"name":"trading","n":2}"#.to_vec());
        let map = payload.to_map();
        assert_eq!(map.get("name"), Some(&serde_json::json!("trading")));
        assert_eq!(map.len(), 2);

        assert!(Payload::new(b"not json".to_vec()).to_map().is_empty());
    }
}
