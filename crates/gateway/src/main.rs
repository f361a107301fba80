//! Reviewflow API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Identity verification
//! - Rate limiting
//! - Request routing into the workflow engine
//! - Observability (logging, metrics, request ids)

mod handlers;
mod middleware;

use anyhow::Context;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use reviewflow_common::{
    auth::{IdentityProvider, JwtIdentityProvider},
    config::AppConfig,
    db::{DbPool, Repository},
    errors::AppError,
    metrics,
    notify::{create_notifier, DispatcherSettings, OutboxDispatcher},
    storage::create_artifact_store,
    telemetry,
    workflow::{Workflow, WorkflowSettings},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub workflow: Arc<Workflow>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl FromRef<AppState> for Arc<dyn IdentityProvider> {
    fn from_ref(state: &AppState) -> Self {
        state.identity.clone()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Arc::new(AppConfig::load().context("Failed to load configuration")?);

    telemetry::init_tracing(&config.observability)?;
    info!("Starting Reviewflow API Gateway v{}", reviewflow_common::VERSION);

    // Initialize metrics
    if config.observability.metrics_port != 0 {
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

    let artifacts = create_artifact_store(&config.storage).await?;

    let secret = config
        .auth
        .jwt_secret
        .as_deref()
        .ok_or_else(|| AppError::Configuration {
            message: "auth.jwt_secret must be set".to_string(),
        })?;
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(JwtIdentityProvider::new(secret, config.auth.leeway_secs));

    let workflow = Arc::new(Workflow::new(
        repository.clone(),
        artifacts,
        WorkflowSettings {
            admin_address: config.notify.admin_address.clone(),
        },
    ));

    // Optional in-process outbox dispatcher
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let dispatcher = if config.notify.embedded_dispatcher {
        let notifier = create_notifier(&config.notify)?;
        let dispatcher = OutboxDispatcher::new(
            repository.clone(),
            notifier,
            DispatcherSettings::from(&config.notify),
        );
        info!(provider = %config.notify.provider, "Running embedded outbox dispatcher");
        Some(tokio::spawn(async move { dispatcher.run(shutdown_rx).await }))
    } else {
        None
    };

    // Create app state
    let state = AppState {
        config: config.clone(),
        workflow,
        identity,
    };

    let app = create_router(state);

    // Start the server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = dispatcher {
        let _ = shutdown_tx.send(true);
        if tokio::time::timeout(config.shutdown_timeout(), handle)
            .await
            .is_err()
        {
            warn!("Outbox dispatcher did not stop within the shutdown timeout");
        }
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // API routes
    let api_routes = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Paper endpoints
        .route(
            "/papers",
            post(handlers::papers::submit_paper).get(handlers::papers::list_papers),
        )
        .route("/papers/{id}/history", get(handlers::papers::paper_history))
        .route("/papers/{id}/resubmit", post(handlers::papers::resubmit))

        // Review endpoints
        .route(
            "/reviews/{paper_id}",
            post(handlers::reviews::submit_review).get(handlers::reviews::list_reviews),
        )

        // Payment endpoints
        .route("/payments", get(handlers::payments::list_payments))
        .route("/payments/mine", get(handlers::payments::my_payments))
        .route("/payments/submit", post(handlers::payments::submit_payment))
        .route(
            "/payments/update-status/{id}",
            put(handlers::payments::update_status),
        )

        // Production endpoints
        .route(
            "/production/upload-final/{paper_id}",
            post(handlers::production::upload_final),
        )
        .route(
            "/production/update-status",
            put(handlers::production::update_status),
        )

        // Admin endpoints
        .route("/admin/assign-editor", post(handlers::admin::assign_editor))
        .route("/admin/reassign-editor", post(handlers::admin::reassign_editor))
        .route("/admin/users", get(handlers::admin::search_users))
        .route("/admin/notifications", get(handlers::admin::notification_log))

        // Editor endpoints
        .route("/editor/assign-reviewers", post(handlers::editor::assign_reviewers))
        .route(
            "/editor/make-final-decision",
            post(handlers::editor::record_decision),
        )
        .route("/editor/reviewers", get(handlers::editor::search_reviewers))

        // Artifact downloads
        .route("/files/{paper_id}/download", get(handlers::files::download))
        .route_layer(axum::middleware::from_fn(middleware::metrics::track_metrics));

    let mut app = Router::new().nest("/api", api_routes);

    if config.rate_limit.enabled {
        let limit = middleware::rate_limit::RateLimit::new(
            config.rate_limit.requests_per_second,
            config.rate_limit.burst,
        );
        app = app.layer(axum::middleware::from_fn_with_state(
            limit,
            middleware::rate_limit::rate_limit_middleware,
        ));
    }

    // Compose the app
    app.layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
        .layer(TimeoutLayer::new(config.request_timeout()))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(propagate_id)
        .layer(request_id)
        .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
