//! Callrun Job - fetch-and-notify binary started by the server

use anyhow::Result;
use callrun_common::{
    artifact::{ARTIFACT_ENV, RUN_ID_ENV},
    logging::{init_logging, LogConfig, LogLevel},
};
use callrun_job::{config, JobConfig};
use clap::Parser;
use std::{path::PathBuf, time::Duration};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "callrun-job")]
#[command(author, version, about = "Fetch call records and hand them to the dialing workflow")]
struct Cli {
    /// URL returning the record list
    #[arg(long, env = "CALLRUN_SOURCE_URL")]
    source_url: String,

    /// Bearer token for the source
    #[arg(long, env = "CALLRUN_SOURCE_TOKEN", hide_env_values = true)]
    source_token: Option<String>,

    /// Endpoint receiving the fetched batch
    #[arg(long, env = "CALLRUN_NOTIFY_URL")]
    notify_url: String,

    /// Where the record list is written
    #[arg(long, env = ARTIFACT_ENV, default_value = config::DEFAULT_ARTIFACT_FILE)]
    artifact: PathBuf,

    /// Timeout for each HTTP request in seconds
    #[arg(long, env = "CALLRUN_HTTP_TIMEOUT_SECS", default_value_t = config::DEFAULT_HTTP_TIMEOUT_SECS)]
    timeout: u64,

    /// Run id assigned by the server
    #[arg(long, env = RUN_ID_ENV)]
    run_id: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl From<Cli> for JobConfig {
    fn from(cli: Cli) -> Self {
        JobConfig {
            source_url: cli.source_url,
            source_token: cli.source_token.filter(|t| !t.is_empty()),
            notify_url: cli.notify_url,
            artifact_path: cli.artifact,
            http_timeout: Duration::from_secs(cli.timeout),
            run_id: cli.run_id,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("callrun-job")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = JobConfig::from(cli);
    let report = callrun_job::run(&config).await?;

    info!(
        records = report.records,
        notified = report.notified,
        "Job complete"
    );
    Ok(())
}
