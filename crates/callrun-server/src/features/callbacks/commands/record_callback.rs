//! Record callback command
//!
//! One accepted callback is one unit of progress, whatever counts the
//! payload might carry. Callbacks that bring an idempotency key are counted
//! once per key and run; callbacks without one are never deduplicated.

use chrono::Utc;
use mediator::Request;
use serde::Serialize;
use serde_json::Value;

use crate::{
    features::callbacks::acceptance::{self, SuccessIndicator},
    models::CounterView,
    store::{StateStore, StoreError},
};

/// Body field that may carry an idempotency key
pub const IDEMPOTENCY_FIELD: &str = "idempotencyKey";

/// Command to record one callback
#[derive(Debug, Clone)]
pub struct RecordCallbackCommand {
    pub payload: Value,
    /// Key from the `Idempotency-Key` header; takes precedence over the body
    pub header_key: Option<String>,
}

impl RecordCallbackCommand {
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            header_key: None,
        }
    }

    pub fn with_header_key(mut self, key: Option<String>) -> Self {
        self.header_key = key;
        self
    }

    /// Effective idempotency key, blank values ignored
    pub fn idempotency_key(&self) -> Option<&str> {
        non_blank(self.header_key.as_deref())
            .or_else(|| non_blank(self.payload.get(IDEMPOTENCY_FIELD).and_then(Value::as_str)))
    }
}

fn non_blank(key: Option<&str>) -> Option<&str> {
    key.map(str::trim).filter(|key| !key.is_empty())
}

/// Response for an accepted callback
#[derive(Debug, Clone, Serialize)]
pub struct RecordCallbackResponse {
    pub ok: bool,
    pub counter: CounterView,
    /// The key was already counted in this run
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub duplicate: bool,
}

/// Errors that can occur when recording a callback
#[derive(Debug, thiserror::Error)]
pub enum RecordCallbackError {
    #[error("Callback does not signal success (expected one of: success=true, status=\"ok\", flag=\"success\", result=\"success\")")]
    NotSuccess,

    #[error("State store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<RecordCallbackResponse, RecordCallbackError>> for RecordCallbackCommand {}

/// Handler for callbacks
#[tracing::instrument(skip_all, fields(key = ?command.idempotency_key()))]
pub async fn handle(
    store: &StateStore,
    command: RecordCallbackCommand,
) -> Result<RecordCallbackResponse, RecordCallbackError> {
    let Some(indicator) = acceptance::recognize(&command.payload) else {
        tracing::debug!("Callback rejected: no success indicator");
        return Err(RecordCallbackError::NotSuccess);
    };

    let key = command.idempotency_key();
    let (counted, state) = store
        .update(|state| state.record_success(key, Utc::now()))
        .await?;

    log_outcome(indicator, counted, state.completed);

    Ok(RecordCallbackResponse {
        ok: true,
        counter: state.view(),
        duplicate: !counted,
    })
}

fn log_outcome(indicator: SuccessIndicator, counted: bool, completed: u64) {
    if counted {
        tracing::debug!(indicator = ?indicator, completed, "Callback counted");
    } else {
        tracing::info!(indicator = ?indicator, completed, "Duplicate callback ignored");
    }
}
