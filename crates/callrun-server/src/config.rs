//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default location of the persisted run counter.
pub const DEFAULT_STATE_FILE: &str = "./data/counter.json";

/// Default location of the record artifact written by the fetch job.
pub const DEFAULT_ARTIFACT_FILE: &str = "./data/records.json";

/// Default fetch-and-notify program, resolved through `PATH`.
pub const DEFAULT_JOB_PROGRAM: &str = "callrun-job";

/// Default CORS allowed origin.
pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "*";

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub state: StateConfig,
    pub job: JobConfig,
    pub cors: CorsConfig,
}

/// Server-specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
    /// Directory with the progress page, served as the router fallback
    pub static_dir: Option<PathBuf>,
}

/// Run state persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    pub path: PathBuf,
}

/// External fetch-and-notify job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Handed to the job as `CALLRUN_ARTIFACT_FILE` and read back on exit
    pub artifact_path: PathBuf,
}

/// CORS configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Config {
            server: ServerConfig {
                host: env_or("CALLRUN_HOST", DEFAULT_SERVER_HOST),
                port: env_parse("CALLRUN_PORT").unwrap_or(DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_parse("CALLRUN_SHUTDOWN_TIMEOUT")
                    .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
                static_dir: std::env::var("CALLRUN_STATIC_DIR")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(PathBuf::from),
            },
            state: StateConfig {
                path: PathBuf::from(env_or("CALLRUN_STATE_FILE", DEFAULT_STATE_FILE)),
            },
            job: JobConfig {
                program: env_or("CALLRUN_JOB_PROGRAM", DEFAULT_JOB_PROGRAM),
                args: std::env::var("CALLRUN_JOB_ARGS")
                    .map(|s| s.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default(),
                artifact_path: PathBuf::from(env_or("CALLRUN_ARTIFACT_FILE", DEFAULT_ARTIFACT_FILE)),
            },
            cors: CorsConfig {
                allowed_origins: env_or("CORS_ALLOWED_ORIGINS", DEFAULT_CORS_ALLOWED_ORIGIN)
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_parse("CORS_ALLOW_CREDENTIALS").unwrap_or(false),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.job.program.trim().is_empty() {
            anyhow::bail!("Job program cannot be empty");
        }

        if self.state.path == self.job.artifact_path {
            anyhow::bail!(
                "State file and artifact file must differ (both are {})",
                self.state.path.display()
            );
        }

        if self.cors.allow_credentials && self.cors.allows_any_origin() {
            anyhow::bail!("CORS credentials cannot be combined with a wildcard origin");
        }

        if let Some(ref dir) = self.server.static_dir {
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "Static directory does not exist");
            }
        }

        Ok(())
    }
}

impl CorsConfig {
    /// Whether any origin is accepted
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                static_dir: None,
            },
            state: StateConfig {
                path: PathBuf::from(DEFAULT_STATE_FILE),
            },
            job: JobConfig {
                program: DEFAULT_JOB_PROGRAM.to_string(),
                args: Vec::new(),
                artifact_path: PathBuf::from(DEFAULT_ARTIFACT_FILE),
            },
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_port() {
        let mut config = Config::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_shared_state_and_artifact_path() {
        let mut config = Config::default();
        config.job.artifact_path = config.state.path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_credentials_with_wildcard_origin() {
        let mut config = Config::default();
        config.cors.allow_credentials = true;
        assert!(config.validate().is_err());

        config.cors.allowed_origins = vec!["http://localhost:5173".to_string()];
        assert!(config.validate().is_ok());
    }
}
