//! Callback routes
//!
//! `POST /n8n/callback` accepts loosely shaped JSON from the automation
//! workflow. The body is parsed by hand so that malformed JSON gets the same
//! `{ ok: false, message }` reply as an unrecognised payload.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::Value;

use super::commands::{record_callback, RecordCallbackCommand, RecordCallbackError};
use crate::{error::AppError, features::FeatureState};

/// Header that may carry an idempotency key
pub const IDEMPOTENCY_HEADER: &str = "idempotency-key";

/// Create callback routes
pub fn callbacks_routes() -> Router<FeatureState> {
    Router::new().route("/n8n/callback", post(n8n_callback))
}

/// Record one success signal
///
/// # Response
///
/// - `200 OK` - `{ ok: true, counter }`, plus `duplicate: true` for a replayed key
/// - `400 Bad Request` - `{ ok: false, message }`; state unchanged
#[tracing::instrument(skip_all)]
async fn n8n_callback(
    State(state): State<FeatureState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let payload = parse_payload(&body)?;
    let header_key = headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let command = RecordCallbackCommand::new(payload).with_header_key(header_key);
    let response = record_callback::handle(&state.store, command).await?;

    Ok((StatusCode::OK, Json(response)).into_response())
}

fn parse_payload(body: &[u8]) -> Result<Value, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "Callback body is not JSON");
        AppError::BadRequest(format!("Callback body is not valid JSON: {}", e))
    })
}

impl From<RecordCallbackError> for AppError {
    fn from(err: RecordCallbackError) -> Self {
        match err {
            e @ RecordCallbackError::NotSuccess => AppError::BadRequest(e.to_string()),
            RecordCallbackError::Store(e) => AppError::Store(e),
        }
    }
}
