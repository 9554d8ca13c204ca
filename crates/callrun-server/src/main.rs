//! Callrun Server - Main entry point

use anyhow::Result;
use callrun_common::logging::{init_logging, LogConfig};
use callrun_server::{api, config::Config};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("callrun-server")
        .filter_directives("callrun_server=debug,callrun::job=info,tower_http=debug")
        .build()
        .merge_env()?;

    let _log_guard = init_logging(&log_config)?;

    info!("Starting callrun server");

    let config = Config::load()?;
    info!(
        host = %config.server.host,
        port = config.server.port,
        job = %config.job.program,
        "Configuration loaded"
    );

    api::serve(config).await
}
