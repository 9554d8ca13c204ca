//! API response types
//!
//! Every non-2xx body has the same `{ ok: false, message }` shape so the
//! progress page and the automation workflow can read failures uniformly.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Error body
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub ok: bool,
    pub message: String,
    /// Run that caused a conflict, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<Uuid>,
    /// Process id of the job holding the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
            run_id: None,
            pid: None,
        }
    }

    pub fn with_run(mut self, run_id: Option<Uuid>) -> Self {
        self.run_id = run_id;
        self
    }

    pub fn with_pid(mut self, pid: Option<u32>) -> Self {
        self.pid = pid;
        self
    }
}
