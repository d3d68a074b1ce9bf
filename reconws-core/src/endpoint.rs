//! Endpoint URL validation
//!
//! Runs once per `dial`, before any network activity.

use crate::error::ConfigError;
pub use ::url::Url;

/// Parse and validate a WebSocket endpoint
///
/// Accepts only absolute `ws://` or `wss://` URLs without embedded
/// credentials.
///
/// # Examples
///
/// ```rust
/// use reconws_core::{validate_url, ConfigError};
///
/// let url = validate_url("wss://stream.example.com/ws").unwrap();
/// assert_eq!(url.scheme(), "wss");
///
/// assert_eq!(validate_url(""), Err(ConfigError::EmptyUrl));
/// assert_eq!(
///     validate_url("ws://user:pass@host"),
///     Err(ConfigError::CredentialsNotAllowed)
/// );
/// ```
pub fn validate_url(candidate: &str) -> Result<Url, ConfigError> {
    if candidate.is_empty() {
        return Err(ConfigError::EmptyUrl);
    }

    let url = Url::parse(candidate).map_err(|e| ConfigError::InvalidUrl(e.to_string()))?;

    if url.scheme() != "ws" && url.scheme() != "wss" {
        return Err(ConfigError::WrongScheme {
            scheme: url.scheme().to_string(),
        });
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(ConfigError::CredentialsNotAllowed);
    }

    Ok(url)
}
