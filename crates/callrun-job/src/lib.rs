//! Callrun Job - fetch records and hand them to the dialing workflow
//!
//! One invocation performs one run:
//!
//! 1. GET the record list from the configured source
//! 2. write it to the artifact file the server counts on exit
//! 3. POST the batch to the notification endpoint
//!
//! A failure in steps 1 or 2 fails the job and leaves no artifact behind.
//! Step 3 is best-effort.

pub mod config;
pub mod notify;
pub mod source;

use callrun_common::{artifact, Result};
use tracing::info;

pub use config::JobConfig;

/// Summary of a finished job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobReport {
    /// Records fetched and written to the artifact
    pub records: usize,
    /// Whether the notification endpoint accepted the batch
    pub notified: bool,
}

/// Run the fetch-and-notify pipeline described by `config`
pub async fn run(config: &JobConfig) -> Result<JobReport> {
    config.validate()?;
    let client = config.http_client()?;

    let records = source::fetch_records(&client, config).await?;
    artifact::write_records(&config.artifact_path, &records).await?;
    info!(
        count = records.len(),
        artifact = %config.artifact_path.display(),
        "Records written"
    );

    let notified = notify::send_batch(&client, config, &records).await;

    Ok(JobReport {
        records: records.len(),
        notified,
    })
}
