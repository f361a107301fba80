//! Reviewflow Notification Worker
//!
//! Delivers workflow notifications from the outbox:
//! 1. Claims due rows from `notification_outbox`
//! 2. Sends each through the configured provider
//! 3. Marks rows sent, or schedules a retry with backoff
//! 4. Parks rows that exhaust their attempt budget

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;
use reviewflow_common::{
    config::AppConfig,
    db::{DbPool, Repository},
    metrics,
    notify::{create_notifier, DispatcherSettings, OutboxDispatcher},
    telemetry, VERSION,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// How the worker was asked to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    /// Poll until shutdown
    Service,
    /// Drain a single batch and exit
    Once,
}

impl Mode {
    fn from_args(args: &[String]) -> anyhow::Result<Self> {
        match args.get(1).map(String::as_str) {
            None | Some("run") => Ok(Mode::Service),
            Some("once") => Ok(Mode::Once),
            Some(other) => anyhow::bail!("Unknown command '{}', expected 'run' or 'once'", other),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args: Vec<String> = std::env::args().collect();
    let mode = Mode::from_args(&args)?;

    // Load configuration
    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    telemetry::init_tracing(&config.observability)?;
    info!("Starting Reviewflow Notification Worker v{}", VERSION);

    if mode == Mode::Service && config.observability.metrics_port != 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!(%addr, "Metrics exporter listening");
    }
    metrics::register_metrics();

    // Initialize database connection
    let db = DbPool::new(&config.database).await?;
    if config.database.auto_migrate {
        db.ensure_schema().await?;
    }
    let repository = Arc::new(Repository::new(db));

    let notifier = create_notifier(&config.notify)?;
    info!(provider = %notifier.provider_name(), "Notifier initialized");

    let dispatcher = OutboxDispatcher::new(
        repository,
        notifier,
        DispatcherSettings::from(&config.notify),
    );

    if mode == Mode::Once {
        let stats = dispatcher.drain_once().await?;
        info!(
            claimed = stats.claimed,
            sent = stats.sent,
            retried = stats.retried,
            parked = stats.parked,
            "Single drain complete"
        );
        return Ok(());
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(e) => error!(error = %e, "Failed to listen for shutdown signal"),
        }
        let _ = shutdown_tx.send(true);
    });

    dispatcher.run(shutdown_rx).await;

    info!("Notification worker shutting down");
    Ok(())
}
