//! Logging and Span Export
//!
//! Installs the global `tracing` subscriber: a fmt layer filtered by
//! `RUST_LOG`, plus an optional OpenTelemetry layer that ships spans to an
//! OTLP collector over gRPC.
//!
//! Poll activity is recorded under a `poll` span carrying `session`, `tick`
//! and `source` fields, and every tick loop runs inside a `poll_timer`
//! span for its session. With export on, each fetch-and-merge shows up as
//! one trace span.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Base filter (default: info)
//! - `OTEL_ENABLED`: true | 1 | yes to export spans (default: off)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: gRPC collector (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name on exported spans (default: quote-streamer)

use opentelemetry::KeyValue;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::Resource;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "quote-streamer";

/// OTLP gRPC port.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4317";

const DEFAULT_LOG_FILTER: &str = "info";

/// Always appended to the base filter. HTTP client internals log every
/// poll at debug, which drowns the stream's own output at a 100ms cadence.
const QUIET_DIRECTIVES: &[&str] = &["reqwest=warn", "hyper=warn", "hyper_util=warn", "h2=warn"];

/// Telemetry setup errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The log filter could not be parsed.
    #[error("invalid log filter '{filter}': {reason}")]
    InvalidFilter {
        /// Offending filter text.
        filter: String,
        /// Parser message.
        reason: String,
    },

    /// The OTLP exporter could not be built.
    #[error("failed to build OTLP exporter for {endpoint}: {reason}")]
    Exporter {
        /// Configured collector endpoint.
        endpoint: String,
        /// Builder message.
        reason: String,
    },

    /// A global subscriber was already installed.
    #[error("tracing subscriber already installed: {0}")]
    AlreadyInstalled(String),
}

/// Flushes and shuts down span export when dropped.
#[derive(Debug)]
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        let Some(provider) = self.tracer_provider.take() else {
            return;
        };
        if let Err(e) = provider.force_flush() {
            eprintln!("Failed to flush pending spans: {e}");
        }
        if let Err(e) = provider.shutdown() {
            eprintln!("Failed to shut down span export: {e}");
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Base filter directives, `RUST_LOG` syntax.
    pub log_filter: String,
    /// Whether spans are exported over OTLP.
    pub otlp_enabled: bool,
    /// Collector endpoint.
    pub otlp_endpoint: String,
    /// `service.name` resource attribute.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            otlp_enabled: false,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings from an arbitrary key lookup. Blank values count as
    /// unset.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            log_filter: read("RUST_LOG").unwrap_or(defaults.log_filter),
            otlp_enabled: read("OTEL_ENABLED").is_some_and(|v| parse_enabled(&v)),
            otlp_endpoint: read("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),
            service_name: read("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }
}

fn parse_enabled(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Build the subscriber filter: the configured base plus the quiet
/// directives for HTTP internals.
///
/// # Errors
///
/// Returns [`TelemetryError::InvalidFilter`] when the base filter or a
/// directive does not parse.
pub fn build_filter(base: &str) -> Result<EnvFilter, TelemetryError> {
    let invalid = |filter: &str, reason: String| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        reason,
    };

    let mut filter = EnvFilter::try_new(base).map_err(|e| invalid(base, e.to_string()))?;
    for raw in QUIET_DIRECTIVES {
        let directive: Directive = raw.parse().map_err(|e| invalid(raw, format!("{e}")))?;
        filter = filter.add_directive(directive);
    }
    Ok(filter)
}

fn service_resource(config: &TelemetryConfig) -> Resource {
    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attribute(KeyValue::new("service.version", env!("CARGO_PKG_VERSION")))
        .build()
}

fn build_tracer_provider(config: &TelemetryConfig) -> Result<SdkTracerProvider, TelemetryError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
        .map_err(|e| TelemetryError::Exporter {
            endpoint: config.otlp_endpoint.clone(),
            reason: e.to_string(),
        })?;

    Ok(SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(service_resource(config))
        .build())
}

/// Install the global subscriber from environment settings.
///
/// Keep the returned guard alive for the life of the process.
///
/// # Errors
///
/// See [`init_with_config`].
pub fn init() -> Result<TelemetryGuard, TelemetryError> {
    init_with_config(&TelemetryConfig::from_env())
}

/// Install the global subscriber.
///
/// # Errors
///
/// Returns an error when the filter does not parse, when span export is
/// enabled but the exporter cannot be built, or when a subscriber is
/// already installed.
pub fn init_with_config(config: &TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let filter = build_filter(&config.log_filter)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let tracer_provider = if config.otlp_enabled {
        Some(build_tracer_provider(config)?)
    } else {
        None
    };
    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .with(otel_layer)
        .try_init()
        .map_err(|e| TelemetryError::AlreadyInstalled(e.to_string()))?;

    if config.otlp_enabled {
        tracing::info!(endpoint = %config.otlp_endpoint, "Exporting spans over OTLP");
    }

    Ok(TelemetryGuard { tracer_provider })
}
