//! Run routes
//!
//! - `POST /start-calls` - reset progress and launch the fetch job
//! - `GET /counter` - progress of the current run

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use super::{
    commands::{start_run, StartRunCommand, StartRunError},
    queries::{get_counter, GetCounterQuery},
};
use crate::{error::AppError, features::FeatureState};

/// Create run routes
pub fn runs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/start-calls", post(start_calls))
        .route("/counter", get(counter))
}

/// Start a run
///
/// # Response
///
/// - `200 OK` - `{ started: true, pid, runId, startedAt }`
/// - `409 Conflict` - a run is still in progress
/// - `500 Internal Server Error` - the job could not be launched
#[tracing::instrument(skip(state))]
async fn start_calls(State(state): State<FeatureState>) -> Result<Response, AppError> {
    let response = start_run::handle(&state.store, &state.runner, StartRunCommand::default()).await?;

    tracing::info!(run_id = %response.run_id, pid = ?response.pid, "Run started via API");

    Ok((StatusCode::OK, Json(response)).into_response())
}

/// Current progress
///
/// `GET /counter` -> `{ total, success, lastRun, lastUpdate, running, runId }`
async fn counter(State(state): State<FeatureState>) -> impl IntoResponse {
    Json(get_counter::handle(&state.store, GetCounterQuery::default()).await)
}

impl From<StartRunError> for AppError {
    fn from(err: StartRunError) -> Self {
        match err {
            StartRunError::AlreadyRunning { run_id, pid } => AppError::RunInProgress { run_id, pid },
            StartRunError::Store(e) => AppError::Store(e),
            StartRunError::Launch(e) => AppError::Runner(e),
        }
    }
}
