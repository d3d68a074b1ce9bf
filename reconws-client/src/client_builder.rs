//! Client builder for configuring reconnection and other options
//!
//! The `ClientBuilder` provides a fluent API for configuring client behavior
//! before dialing. It allows you to:
//! - Tune the reconnect backoff or plug in a custom strategy
//! - Bound the opening handshake
//! - Observe the lifecycle with a [`ConnectionListener`]
//! - Configure observability (logging, OpenTelemetry)
//!
//! Unset or zero values fall back to the defaults: reconnect interval 2s to
//! 30s, factor 1.5, jitter on, handshake timeout 2s.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reconws_client::{ClientBuilder, FixedDelay, HeaderMap};
//! use std::time::Duration;
//!
//! # async fn example() -> reconws_core::Result<()> {
//! // Tuned exponential backoff
//! let client = ClientBuilder::new()
//!     .reconnect_interval_min(Duration::from_millis(500))
//!     .reconnect_interval_max(Duration::from_secs(10))
//!     .verbose(true)
//!     .build()?;
//! client.dial("ws://localhost:8080", HeaderMap::new()).await?;
//!
//! // Custom strategy and metrics
//! let client2 = ClientBuilder::new()
//!     .with_reconnect(Box::new(FixedDelay::new(Duration::from_secs(1))))
//!     .with_metrics()
//!     .name("feed")
//!     .build()?;
//! # let _ = client2;
//! # Ok(())
//! # }
//! ```

use crate::client::{ClientConfig, Inner, DEFAULT_HANDSHAKE_TIMEOUT};
use crate::connection_state::SharedState;
use crate::listener::{ConnectionListener, NoopListener};
use crate::metrics::ClientMetrics;
use crate::reconnect::{
    ExponentialBackoff, ReconnectionStrategy, DEFAULT_MAX_RECONNECT_INTERVAL,
    DEFAULT_MIN_RECONNECT_INTERVAL, DEFAULT_RECONNECT_INTERVAL_FACTOR,
};
use crate::transport::{Dialer, DialerOptions, TungsteniteDialer};
use crate::ReconnectingClient;
use reconws_core::{Error, ObservabilityConfig, Result};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Builder for configuring and creating a ReconnectingClient
pub struct ClientBuilder {
    reconnect_interval_min: Option<Duration>,
    reconnect_interval_max: Option<Duration>,
    reconnect_interval_factor: Option<f64>,
    jitter: bool,
    handshake_timeout: Option<Duration>,
    reconnect_strategy: Option<Box<dyn ReconnectionStrategy>>,
    verbose: bool,
    listener: Option<Arc<dyn ConnectionListener>>,
    dialer: Option<Arc<dyn Dialer>>,
    dialer_options: DialerOptions,
    observability_config: Option<ObservabilityConfig>,
    enable_metrics: bool,
    id: u64,
    name: Option<String>,
    meta: HashMap<String, serde_json::Value>,
}

impl ClientBuilder {
    /// Create a new client builder
    pub fn new() -> Self {
        Self {
            reconnect_interval_min: None,
            reconnect_interval_max: None,
            reconnect_interval_factor: None,
            jitter: true,
            handshake_timeout: None,
            reconnect_strategy: None,
            verbose: false,
            listener: None,
            dialer: None,
            dialer_options: DialerOptions::default(),
            observability_config: None,
            enable_metrics: false,
            id: 0,
            name: None,
            meta: HashMap::new(),
        }
    }

    /// Lower bound of the reconnect interval
    pub fn reconnect_interval_min(mut self, interval: Duration) -> Self {
        self.reconnect_interval_min = Some(interval);
        self
    }

    /// Upper bound of the reconnect interval
    pub fn reconnect_interval_max(mut self, interval: Duration) -> Self {
        self.reconnect_interval_max = Some(interval);
        self
    }

    /// Growth factor of the reconnect interval
    pub fn reconnect_interval_factor(mut self, factor: f64) -> Self {
        self.reconnect_interval_factor = Some(factor);
        self
    }

    /// Randomize reconnect intervals (default on)
    pub fn jitter(mut self, enable: bool) -> Self {
        self.jitter = enable;
        self
    }

    /// Bound on the opening handshake, also the time `dial` waits
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    /// Use a custom reconnection strategy
    ///
    /// Overrides the interval, factor and jitter settings.
    pub fn with_reconnect(mut self, strategy: Box<dyn ReconnectionStrategy>) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    /// Log dial loop successes and failures (default off)
    pub fn verbose(mut self, enable: bool) -> Self {
        self.verbose = enable;
        self
    }

    /// Observe lifecycle events
    pub fn listener(mut self, listener: impl ConnectionListener) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    /// Replace the `tokio-tungstenite` dialer
    pub fn dialer(mut self, dialer: impl Dialer) -> Self {
        self.dialer = Some(Arc::new(dialer));
        self
    }

    /// Dialer options used by `dial`
    pub fn dialer_options(mut self, options: DialerOptions) -> Self {
        self.dialer_options = options;
        self
    }

    /// Install logging and OpenTelemetry export when the client is built
    pub fn with_observability(mut self, config: ObservabilityConfig) -> Self {
        self.observability_config = Some(config);
        self
    }

    /// Record client metrics on the global meter
    pub fn with_metrics(mut self) -> Self {
        self.enable_metrics = true;
        self
    }

    /// Client identifier
    pub fn id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Client name, used in log spans and metric attributes
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach a metadata entry
    pub fn meta(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    /// Build the client
    ///
    /// Fails only when observability was requested and could not be
    /// installed.
    pub fn build(self) -> Result<ReconnectingClient> {
        if let Some(ref config) = self.observability_config {
            reconws_core::init_observability(config).map_err(|e| {
                Error::Internal(format!("Failed to initialize observability: {}", e))
            })?;
        }
        Ok(self.assemble())
    }

    pub(crate) fn assemble(self) -> ReconnectingClient {
        let name = self.name.unwrap_or_else(|| "reconws".to_string());

        let metrics_enabled = self.enable_metrics
            || self
                .observability_config
                .as_ref()
                .is_some_and(ObservabilityConfig::exports_metrics);
        let metrics = metrics_enabled.then(|| Arc::new(ClientMetrics::new(name.clone())));

        let strategy: Box<dyn ReconnectionStrategy> = match self.reconnect_strategy {
            Some(strategy) => strategy,
            None => {
                let backoff = ExponentialBackoff::new(
                    non_zero(self.reconnect_interval_min).unwrap_or(DEFAULT_MIN_RECONNECT_INTERVAL),
                    non_zero(self.reconnect_interval_max).unwrap_or(DEFAULT_MAX_RECONNECT_INTERVAL),
                )
                .with_factor(
                    self.reconnect_interval_factor
                        .filter(|factor| *factor != 0.0)
                        .unwrap_or(DEFAULT_RECONNECT_INTERVAL_FACTOR),
                );
                if self.jitter {
                    Box::new(backoff.with_jitter())
                } else {
                    Box::new(backoff)
                }
            }
        };
        let dialer: Arc<dyn Dialer> = match self.dialer {
            Some(dialer) => dialer,
            None => Arc::new(TungsteniteDialer),
        };
        let listener: Arc<dyn ConnectionListener> = match self.listener {
            Some(listener) => listener,
            None => Arc::new(NoopListener),
        };

        ReconnectingClient::from_inner(Inner {
            config: ClientConfig {
                handshake_timeout: non_zero(self.handshake_timeout)
                    .unwrap_or(DEFAULT_HANDSHAKE_TIMEOUT),
                verbose: self.verbose,
                dialer_options: self.dialer_options,
                id: self.id,
                name,
                meta: self.meta,
            },
            shared: Mutex::new(SharedState::new()),
            strategy: Mutex::new(strategy),
            dialer,
            listener,
            dialing: AtomicBool::new(false),
            metrics,
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn non_zero(value: Option<Duration>) -> Option<Duration> {
    value.filter(|d| !d.is_zero())
}
