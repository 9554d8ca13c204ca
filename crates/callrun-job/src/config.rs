//! Job configuration

use callrun_common::{CallrunError, Result};
use std::{path::PathBuf, time::Duration};

/// Default artifact location, shared with the server's default.
pub const DEFAULT_ARTIFACT_FILE: &str = "./data/records.json";

/// Default timeout for source and notification requests in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Settings for a single fetch-and-notify run
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub source_url: String,
    /// Sent as a bearer token on the source request
    pub source_token: Option<String>,
    pub notify_url: String,
    pub artifact_path: PathBuf,
    pub http_timeout: Duration,
    /// Run this job belongs to, echoed in the notification when set
    pub run_id: Option<String>,
}

impl JobConfig {
    pub fn new(source_url: impl Into<String>, notify_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            source_token: None,
            notify_url: notify_url.into(),
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_FILE),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            run_id: None,
        }
    }

    /// Reject settings the job cannot run with
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [("source URL", &self.source_url), ("notify URL", &self.notify_url)] {
            if url.trim().is_empty() {
                return Err(CallrunError::Config(format!("{} is empty", name)));
            }
            reqwest::Url::parse(url)
                .map_err(|e| CallrunError::Config(format!("invalid {} '{}': {}", name, url, e)))?;
        }

        if self.http_timeout.is_zero() {
            return Err(CallrunError::Config("HTTP timeout must be greater than 0".to_string()));
        }

        Ok(())
    }

    pub(crate) fn http_client(&self) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| CallrunError::Network(format!("failed to build HTTP client: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        let config = JobConfig::new("http://localhost:9000/records", "http://localhost:5678/hook");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_notify_url_rejected() {
        let config = JobConfig::new("http://localhost:9000/records", "  ");
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("notify URL"));
    }

    #[test]
    fn test_relative_source_url_rejected() {
        let config = JobConfig::new("/records", "http://localhost:5678/hook");
        assert!(matches!(config.validate(), Err(CallrunError::Config(_))));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = JobConfig::new("http://a.test/", "http://b.test/");
        config.http_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
