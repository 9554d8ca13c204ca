//! Record source

use callrun_common::{artifact, CallrunError, Result};
use serde_json::Value;
use tracing::{debug, info};

use crate::JobConfig;

/// Fetch the record list from the configured source.
///
/// The body may be a bare array or an object wrapping one under `records`
/// or `data`.
pub async fn fetch_records(client: &reqwest::Client, config: &JobConfig) -> Result<Vec<Value>> {
    info!(url = %config.source_url, "Fetching records");

    let mut request = client.get(&config.source_url);
    if let Some(ref token) = config.source_token {
        request = request.bearer_auth(token);
    }

    let response = request
        .send()
        .await
        .map_err(|e| CallrunError::Network(format!("source request failed: {}", e)))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CallrunError::Network(format!("source returned {}", status)));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| CallrunError::Network(format!("source body is not JSON: {}", e)))?;

    let records = artifact::into_records(body)?;
    debug!(count = records.len(), "Source response parsed");
    Ok(records)
}
