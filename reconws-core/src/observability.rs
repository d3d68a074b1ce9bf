//! Logging and OpenTelemetry setup
//!
//! The client emits its lifecycle events through `tracing`. This module
//! installs the process-wide subscriber that turns those events into log
//! lines and, when an OTLP collector is configured, exports traces and
//! metrics to it.
//!
//! Configuration is an explicit value. [`ObservabilityConfig::default`] never
//! looks at the environment; call [`ObservabilityConfig::from_env`] once at
//! process startup if you want `RUST_LOG` and `OTEL_EXPORTER_OTLP_ENDPOINT`
//! to be honoured.
//!
//! ```rust,no_run
//! use reconws_core::ObservabilityConfig;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ObservabilityConfig::from_env().with_service_name("price-feed");
//!     reconws_core::init_observability(&config).expect("Failed to init observability");
//!
//!     // ... run the application ...
//!
//!     reconws_core::shutdown_observability();
//! }
//! ```

use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::metrics::SdkMeterProvider;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Interval between metric exports to the collector
const METRICS_EXPORT_INTERVAL: Duration = Duration::from_secs(30);

/// Providers handed to the global registry, kept for shutdown
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();
static METER_PROVIDER: OnceLock<SdkMeterProvider> = OnceLock::new();

/// Output format of the local log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event, with target, thread id and line number
    #[default]
    Json,
    /// Single-line human readable output
    Compact,
}

/// Observability configuration
///
/// # Defaults
///
/// - Service name: "reconws"
/// - Service version: the crate version
/// - OTLP endpoint: none (local logging only)
/// - Traces and metrics export enabled when an endpoint is set
/// - Log level: "info", JSON format
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// Service name attached to exported telemetry
    pub service_name: String,

    /// Service version attached to exported telemetry
    pub service_version: String,

    /// OTLP/gRPC collector endpoint, e.g. "http://localhost:4317"
    ///
    /// `None` disables export entirely.
    pub otlp_endpoint: Option<String>,

    /// Export spans to the collector
    pub enable_traces: bool,

    /// Export metrics to the collector
    pub enable_metrics: bool,

    /// `EnvFilter` directive, e.g. "info" or "reconws_client=debug"
    pub log_level: String,

    /// Local log output format
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "reconws".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            otlp_endpoint: None,
            enable_traces: true,
            enable_metrics: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}

impl ObservabilityConfig {
    /// Create a configuration with a custom service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from the process environment
    ///
    /// Reads `RUST_LOG` for the log level and `OTEL_EXPORTER_OTLP_ENDPOINT`
    /// for the collector. Intended to be called once, at startup.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = level;
        }
        if let Ok(endpoint) = std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT") {
            if !endpoint.is_empty() {
                config.otlp_endpoint = Some(endpoint);
            }
        }
        config
    }

    /// Set the service name
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Set the OTLP collector endpoint
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.otlp_endpoint = Some(endpoint.into());
        self
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the local log format
    pub fn with_log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    /// Set the service version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.service_version = version.into();
        self
    }

    /// Enable or disable span export
    pub fn with_traces(mut self, enable: bool) -> Self {
        self.enable_traces = enable;
        self
    }

    /// Enable or disable metric export
    pub fn with_metrics(mut self, enable: bool) -> Self {
        self.enable_metrics = enable;
        self
    }

    /// Whether spans will be exported
    pub fn exports_traces(&self) -> bool {
        self.enable_traces && self.otlp_endpoint.is_some()
    }

    /// Whether metrics will be exported
    pub fn exports_metrics(&self) -> bool {
        self.enable_metrics && self.otlp_endpoint.is_some()
    }

    fn resource(&self) -> opentelemetry_sdk::Resource {
        opentelemetry_sdk::Resource::builder_empty()
            .with_attributes(vec![
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                    self.service_name.clone(),
                ),
                KeyValue::new(
                    opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                    self.service_version.clone(),
                ),
            ])
            .build()
    }
}

/// Install the global tracing subscriber and, if configured, OTLP export
///
/// Call once per process. A second call fails because the global subscriber
/// is already set.
pub fn init_observability(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let tracer = if config.exports_traces() {
        Some(init_tracer(config)?)
    } else {
        None
    };

    if config.exports_metrics() {
        init_metrics(config)?;
    }

    init_tracing_subscriber(config, tracer)?;

    tracing::info!(
        service_name = %config.service_name,
        otlp_endpoint = ?config.otlp_endpoint,
        traces = config.exports_traces(),
        metrics = config.exports_metrics(),
        "Observability initialized"
    );

    Ok(())
}

fn init_tracer(
    config: &ObservabilityConfig,
) -> Result<opentelemetry_sdk::trace::Tracer, Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler};

    let endpoint = config.otlp_endpoint.clone().unwrap_or_default();
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(config.resource())
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let tracer = provider.tracer(config.service_name.clone());
    let _ = TRACER_PROVIDER.set(provider.clone());
    global::set_tracer_provider(provider);

    Ok(tracer)
}

fn init_metrics(
    config: &ObservabilityConfig,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    use opentelemetry_otlp::WithExportConfig;

    let endpoint = config.otlp_endpoint.clone().unwrap_or_default();
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let reader = opentelemetry_sdk::metrics::PeriodicReader::builder(exporter)
        .with_interval(METRICS_EXPORT_INTERVAL)
        .build();

    let provider = SdkMeterProvider::builder()
        .with_reader(reader)
        .with_resource(config.resource())
        .build();

    let _ = METER_PROVIDER.set(provider.clone());
    global::set_meter_provider(provider);
    Ok(())
}

fn init_tracing_subscriber(
    config: &ObservabilityConfig,
    tracer: Option<opentelemetry_sdk::trace::Tracer>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = EnvFilter::try_new(&config.log_level)?;

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_line_number(true)
            .json()
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .with_target(true)
            .compact()
            .boxed(),
    };

    let telemetry_layer = tracer.map(|tracer| tracing_opentelemetry::layer().with_tracer(tracer));

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(telemetry_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Flush and stop telemetry export
///
/// Drains the batch span exporter and pushes a final metrics export. Does
/// nothing when no OTLP endpoint was configured. Safe to call more than once.
pub fn shutdown_observability() {
    tracing::info!("Shutting down observability");
    shutdown_providers(TRACER_PROVIDER.get(), METER_PROVIDER.get());
}

fn shutdown_providers(tracer: Option<&SdkTracerProvider>, meter: Option<&SdkMeterProvider>) {
    if let Some(provider) = tracer {
        if let Err(e) = provider.shutdown() {
            tracing::debug!(error = %e, "Tracer provider shutdown failed");
        }
    }
    if let Some(provider) = meter {
        if let Err(e) = provider.shutdown() {
            tracing::debug!(error = %e, "Meter provider shutdown failed");
        }
    }
}
