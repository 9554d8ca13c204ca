//! HTTP surface
//!
//! Wires the feature routers, the health endpoint, middleware and the
//! optional static progress page into one axum application.

pub mod response;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::{net::SocketAddr, sync::Arc, time::Duration, time::Instant};
use tokio::signal;
use tower_http::services::ServeDir;
use tracing::info;

use crate::{
    config::Config,
    features::{self, FeatureState},
    middleware,
    runner::JobRunner,
    store::StateStore,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<StateStore>,
    pub runner: Arc<JobRunner>,
    pub booted_at: Instant,
}

impl AppState {
    /// Build the store and runner described by `config`
    pub fn from_config(config: &Config) -> Self {
        let store = Arc::new(StateStore::open(&config.state.path));
        let runner = Arc::new(JobRunner::new(config.job.clone(), store.clone()));
        Self {
            store,
            runner,
            booted_at: Instant::now(),
        }
    }

    fn features(&self) -> FeatureState {
        FeatureState {
            store: self.store.clone(),
            runner: self.runner.clone(),
        }
    }
}

/// Health payload of `GET /api/health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    /// Seconds since the server started
    pub uptime: f64,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .with_state(state.clone())
        .merge(features::router(state.features()));

    let mut app = Router::new().nest("/api", api);

    if let Some(ref dir) = config.server.static_dir {
        info!(dir = %dir.display(), "Serving static files");
        app = app.fallback_service(ServeDir::new(dir));
    }

    app.layer(middleware::compression_layer())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Liveness
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        ok: true,
        uptime: state.booted_at.elapsed().as_secs_f64(),
        timestamp: Utc::now(),
    })
}

/// Run the server until a shutdown signal arrives
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config);
    info!(path = %state.store.path().display(), "Using run state file");

    if let Err(e) = state.runner.reconcile_after_restart().await {
        tracing::error!(error = %e, "Failed to reconcile run state after restart");
    }

    let app = create_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting graceful shutdown"),
        _ = terminate => info!("Received terminate signal, starting graceful shutdown"),
    }

    // A running fetch job is left alone; only in-flight requests are drained.
    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
