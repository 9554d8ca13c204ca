//! Server error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use uuid::Uuid;

use crate::{api::response::ErrorResponse, runner::RunnerError, store::StoreError};

/// Result type alias for handlers
pub type AppResult<T> = std::result::Result<T, AppError>;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("A run is already in progress")]
    RunInProgress { run_id: Option<Uuid>, pid: Option<u32> },

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Job runner error: {0}")]
    Runner(#[from] RunnerError),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::RunInProgress { .. } => StatusCode::CONFLICT,
            AppError::Store(_) | AppError::Runner(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            AppError::BadRequest(message) => ErrorResponse::new(message),
            AppError::RunInProgress { run_id, pid } => ErrorResponse::new("A run is already in progress")
                .with_run(run_id)
                .with_pid(pid),
            AppError::Store(ref e) => {
                tracing::error!(error = %e, "State store error");
                ErrorResponse::new("Failed to persist run state")
            },
            AppError::Runner(ref e) => {
                tracing::error!(error = %e, "Job runner error");
                ErrorResponse::new("Failed to start the fetch job")
            },
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AppError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::RunInProgress { run_id: None, pid: None }.status(), StatusCode::CONFLICT);
        let spawn = RunnerError::Spawn {
            program: "missing".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert_eq!(AppError::from(spawn).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
