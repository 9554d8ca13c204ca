//! Batch notification to the dialing workflow

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::JobConfig;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchNotification<'a> {
    records: &'a [Value],
    count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    run_id: Option<&'a str>,
}

/// POST `records` to the notification endpoint.
///
/// Failures are logged and reported as `false`; they never fail the job.
pub async fn send_batch(client: &reqwest::Client, config: &JobConfig, records: &[Value]) -> bool {
    let body = BatchNotification {
        records,
        count: records.len(),
        run_id: config.run_id.as_deref(),
    };

    let result = client
        .post(&config.notify_url)
        .json(&body)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status);

    match result {
        Ok(response) => {
            info!(status = %response.status(), count = records.len(), "Batch handed to workflow");
            true
        },
        Err(e) => {
            warn!(url = %config.notify_url, error = %e, "Batch notification failed");
            false
        },
    }
}
