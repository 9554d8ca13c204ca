//! Start run command
//!
//! Resets the run state and launches the fetch job. The reset and the
//! overlap check happen in one store update, so two concurrent triggers can
//! never both start a job.

use chrono::{DateTime, Utc};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    models::RunState,
    runner::{JobRunner, RunnerError},
    store::{StateStore, StoreError},
};

/// Command to start a new run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartRunCommand {}

/// Response from starting a run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRunResponse {
    pub started: bool,
    /// Process id of the job
    pub pid: Option<u32>,
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
}

/// Errors that can occur when starting a run
#[derive(Debug, thiserror::Error)]
pub enum StartRunError {
    #[error("Run {} is still in progress", display_run(.run_id))]
    AlreadyRunning { run_id: Option<Uuid>, pid: Option<u32> },

    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to launch job: {0}")]
    Launch(#[from] RunnerError),
}

fn display_run(run_id: &Option<Uuid>) -> String {
    run_id.map_or_else(|| "<unknown>".to_string(), |id| id.to_string())
}

impl Request<Result<StartRunResponse, StartRunError>> for StartRunCommand {}

/// Handler for starting runs
///
/// The job is spawned but not awaited; its total arrives later through the
/// runner's completion task.
#[tracing::instrument(skip_all)]
pub async fn handle(
    store: &StateStore,
    runner: &JobRunner,
    _command: StartRunCommand,
) -> Result<StartRunResponse, StartRunError> {
    let run_id = Uuid::new_v4();
    let started_at = Utc::now();

    store
        .try_update(|state| {
            if state.running {
                return Err(StartRunError::AlreadyRunning {
                    run_id: state.run_id,
                    pid: state.pid,
                });
            }
            *state = RunState::started(run_id, started_at);
            Ok(())
        })
        .await?;

    tracing::info!(run_id = %run_id, "Run state reset");

    let handle = match runner.start(run_id).await {
        Ok(handle) => handle,
        Err(e) => {
            release_guard(store, run_id).await;
            return Err(e.into());
        },
    };

    attach_pid(store, run_id, handle.pid()).await;

    Ok(StartRunResponse {
        started: true,
        pid: handle.pid(),
        run_id,
        started_at,
    })
}

/// Record the job's pid so a blocked trigger can name the process.
async fn attach_pid(store: &StateStore, run_id: Uuid, pid: Option<u32>) {
    if let Err(e) = store.update(|state| state.attach_pid(run_id, pid)).await {
        tracing::warn!(run_id = %run_id, error = %e, "Failed to record job pid");
    }
}

/// Clear the running flag of a run whose job never started.
async fn release_guard(store: &StateStore, run_id: Uuid) {
    let released = store
        .update(|state| {
            if state.is_run(run_id) {
                state.finish_without_total(Utc::now());
            }
        })
        .await;

    if let Err(e) = released {
        tracing::error!(run_id = %run_id, error = %e, "Failed to release run guard after launch failure");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JobConfig;
    use std::sync::Arc;

    fn setup(program: &str, args: &[&str]) -> (tempfile::TempDir, Arc<StateStore>, JobRunner) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("counter.json")));
        let config = JobConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            artifact_path: dir.path().join("records.json"),
        };
        let runner = JobRunner::new(config, store.clone());
        (dir, store, runner)
    }

    #[tokio::test]
    async fn test_start_resets_counters() {
        let (_dir, store, runner) = setup("sh", &["-c", "sleep 0.2"]);
        store
            .update(|state| {
                state.total = 10;
                state.completed = 8;
            })
            .await
            .unwrap();

        let response = handle(&store, &runner, StartRunCommand::default()).await.unwrap();

        assert!(response.started);
        assert!(response.pid.is_some());
        let state = store.read().await;
        assert_eq!(state.total, 0);
        assert_eq!(state.completed, 0);
        assert!(state.running);
        assert!(state.is_run(response.run_id));
        assert_eq!(state.started_at, Some(response.started_at));
        assert_eq!(state.pid, response.pid);
    }

    #[tokio::test]
    async fn test_second_start_is_rejected_while_running() {
        let (_dir, store, runner) = setup("sh", &["-c", "sleep 0.5"]);
        let first = handle(&store, &runner, StartRunCommand::default()).await.unwrap();
        store
            .update(|state| state.record_success(None, Utc::now()))
            .await
            .unwrap();

        let err = handle(&store, &runner, StartRunCommand::default())
            .await
            .unwrap_err();

        match err {
            StartRunError::AlreadyRunning { run_id, pid } => {
                assert_eq!(run_id, Some(first.run_id));
                assert_eq!(pid, first.pid);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.read().await.completed, 1);
    }

    #[tokio::test]
    async fn test_launch_failure_releases_guard() {
        let (_dir, store, runner) = setup("callrun-job-that-does-not-exist", &[]);

        let err = handle(&store, &runner, StartRunCommand::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StartRunError::Launch(_)));
        assert!(!store.read().await.running);
    }
}
