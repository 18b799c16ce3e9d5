//! Quote Streamer Binary
//!
//! Starts polling the configured quote source and logs each new dataset.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin quote-streamer
//! ```
//!
//! # Environment Variables
//!
//! - `QUOTE_STREAM_CADENCE_MS`: Poll cadence (default: 100)
//! - `QUOTE_STREAM_SOURCE`: http | simulated (default: http)
//! - `QUOTE_STREAM_SOURCE_URL`: Quote endpoint (default: <http://localhost:8080/query?id=1>)
//! - `QUOTE_STREAM_HTTP_TIMEOUT_MS`: Request timeout (default: 1000)
//! - `QUOTE_STREAM_SYMBOLS`: Simulated instruments (default: ABC,DEF)
//! - `QUOTE_STREAM_SIM_SEED`: Seed for a reproducible simulated feed
//! - `QUOTE_STREAM_CONTROL_PORT`: Control/health HTTP port (default: 8082)
//! - `QUOTE_STREAM_SNAPSHOT_CAPACITY`: Stream event channel capacity (default: 256)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP gRPC endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: quote-streamer)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;
use std::time::Duration;

use quote_streamer::infrastructure::control::{ControlServer, ControlServerState};
use quote_streamer::infrastructure::{source, telemetry};
use quote_streamer::{StreamEvent, StreamerConfig, TracingSink, ViewBinder, init_metrics};
use tokio::signal;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Quote Streamer");

    // Initialize Prometheus metrics
    let _metrics_handle = init_metrics();

    let config = StreamerConfig::from_env()?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    let record_source = source::from_settings(&config.source)?;
    let binder = Arc::new(ViewBinder::activate(
        config.binder_config(),
        record_source,
        Arc::new(TracingSink::new()),
    )?);

    // Log stream events until shutdown
    let events = binder.events();
    let events_shutdown = shutdown_token.clone();
    tokio::spawn(async move {
        log_stream_events(events, events_shutdown).await;
    });

    // Spawn control server
    let control_state = Arc::new(ControlServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&binder),
    ));
    let control_server = ControlServer::new(
        config.server.control_port,
        control_state,
        shutdown_token.clone(),
    );
    let control_task = tokio::spawn(async move {
        if let Err(e) = control_server.run().await {
            tracing::error!(error = %e, "Control server error");
        }
    });

    tracing::info!("Quote streamer ready");

    await_shutdown(shutdown_token).await;

    binder.deactivate().await;
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, control_task)
        .await
        .is_err()
    {
        tracing::warn!("Control server did not drain before timeout");
    }

    tracing::info!(records = binder.snapshot().len(), "Quote streamer stopped");
    Ok(())
}

/// Log stream events as they arrive.
async fn log_stream_events(
    mut rx: broadcast::Receiver<StreamEvent>,
    shutdown_token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            () = shutdown_token.cancelled() => break,
            event = rx.recv() => event,
        };

        match event {
            Ok(StreamEvent::Merged {
                session,
                accepted,
                dataset_len,
                ..
            }) => {
                tracing::trace!(session, accepted, dataset_len, "Stream event: merged");
            }
            // Logged where they are raised
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &StreamerConfig) {
    tracing::info!(
        cadence_ms = u64::try_from(config.cadence.as_millis()).unwrap_or(u64::MAX),
        source = config.source.kind.as_str(),
        control_port = config.server.control_port,
        "Configuration loaded"
    );
    tracing::debug!(
        url = %config.source.url,
        symbols = ?config.source.symbols,
        seed = ?config.source.sim_seed,
        "Source settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
