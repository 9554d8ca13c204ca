//! Fetch job runner
//!
//! Launches the external fetch-and-notify program as a child process and
//! watches it until it exits. The job reports back only through the record
//! artifact it leaves on disk; once the exit has been observed the runner
//! counts that artifact and folds the total into the current run state.

use callrun_common::{
    artifact::{self, ARTIFACT_ENV, RUN_ID_ENV},
    fs::remove_if_exists,
    CallrunError,
};
use chrono::Utc;
use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::Arc,
    time::Duration,
};
use tokio::{
    io::{AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    task::JoinHandle,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    config::JobConfig,
    store::{StateStore, StoreError, StoreResult},
};

/// How long job output may keep flowing after the job has exited before its
/// outcome is recorded anyway. A background process the job left behind
/// holds the pipes open until it exits.
const OUTPUT_DRAIN_TIMEOUT: Duration = Duration::from_millis(250);

/// Errors raised while launching a job
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("Failed to spawn job '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to clear previous artifact {path}: {source}")]
    StaleArtifact {
        path: PathBuf,
        #[source]
        source: CallrunError,
    },
}

/// How a job's termination was folded into the run state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The artifact was read and its record count recorded as the total
    Counted { total: u64, exit_code: Option<i32> },
    /// The job left no readable artifact; the total was left as it was
    NoArtifact { exit_code: Option<i32> },
    /// Another run owns the state now, so the result was discarded
    Superseded { exit_code: Option<i32> },
    /// The state could not be written
    Unrecorded { exit_code: Option<i32> },
    /// The watcher task itself died
    Aborted,
}

/// Reference to a launched job
#[derive(Debug)]
pub struct RunHandle {
    run_id: Uuid,
    pid: Option<u32>,
    completion: JoinHandle<JobOutcome>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// OS process id, if the child was still alive when spawned
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Resolve once the job has exited and its outcome has been recorded.
    pub async fn wait(self) -> JobOutcome {
        match self.completion.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(run_id = %self.run_id, error = %e, "Job watcher task failed");
                JobOutcome::Aborted
            },
        }
    }
}

/// Launches fetch jobs and records their results
#[derive(Debug)]
pub struct JobRunner {
    config: JobConfig,
    store: Arc<StateStore>,
}

impl JobRunner {
    pub fn new(config: JobConfig, store: Arc<StateStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &JobConfig {
        &self.config
    }

    /// Spawn the job for `run_id` and return without waiting for it.
    #[tracing::instrument(skip(self), fields(program = %self.config.program))]
    pub async fn start(&self, run_id: Uuid) -> Result<RunHandle, RunnerError> {
        let artifact_path = self.config.artifact_path.clone();

        // An artifact from an earlier run must never be counted for this one.
        remove_if_exists(&artifact_path)
            .await
            .map_err(|source| RunnerError::StaleArtifact {
                path: artifact_path.clone(),
                source,
            })?;

        let mut child = Command::new(&self.config.program)
            .args(&self.config.args)
            .env(ARTIFACT_ENV, &artifact_path)
            .env(RUN_ID_ENV, run_id.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(false)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: self.config.program.clone(),
                source,
            })?;

        let pid = child.id();
        info!(run_id = %run_id, pid = ?pid, "Job started");

        let stdout = child
            .stdout
            .take()
            .map(|out| tokio::spawn(forward_lines(out, run_id, OutputStream::Stdout)));
        let stderr = child
            .stderr
            .take()
            .map(|err| tokio::spawn(forward_lines(err, run_id, OutputStream::Stderr)));

        let store = self.store.clone();
        let completion = tokio::spawn(async move {
            let status = child.wait().await;

            // Let the job's last lines reach the log before its outcome.
            let drain = async {
                for forwarder in [stdout, stderr].into_iter().flatten() {
                    let _ = forwarder.await;
                }
            };
            if tokio::time::timeout(OUTPUT_DRAIN_TIMEOUT, drain).await.is_err() {
                warn!(run_id = %run_id, "Job output still open after exit; recording outcome without it");
            }

            record_exit(&store, &artifact_path, run_id, status).await
        });

        Ok(RunHandle {
            run_id,
            pid,
            completion,
        })
    }

    /// Clear a `running` flag left behind by a previous service process.
    ///
    /// The child of that run cannot be observed any more, so without this the
    /// overlap guard would refuse every later trigger.
    pub async fn reconcile_after_restart(&self) -> StoreResult<Option<Uuid>> {
        let (interrupted, _) = self
            .store
            .update(|state| {
                if !state.running {
                    return None;
                }
                state.finish_without_total(Utc::now());
                Some(state.run_id)
            })
            .await?;

        if let Some(run_id) = interrupted {
            warn!(run_id = ?run_id, "Previous run was interrupted by a restart; its total will not be recorded");
        }

        Ok(interrupted.flatten())
    }
}

#[derive(Debug, Clone, Copy)]
enum OutputStream {
    Stdout,
    Stderr,
}

async fn forward_lines<R>(reader: R, run_id: Uuid, stream: OutputStream)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match stream {
                OutputStream::Stdout => info!(target: "callrun::job", run_id = %run_id, "{}", line),
                OutputStream::Stderr => warn!(target: "callrun::job", run_id = %run_id, "{}", line),
            },
            Ok(None) => break,
            Err(e) => {
                warn!(run_id = %run_id, stream = ?stream, error = %e, "Stopped reading job output");
                break;
            },
        }
    }
}

/// Reasons the exit write is skipped
enum ExitWrite {
    Superseded,
    Store(StoreError),
}

impl From<StoreError> for ExitWrite {
    fn from(err: StoreError) -> Self {
        ExitWrite::Store(err)
    }
}

async fn record_exit(
    store: &StateStore,
    artifact_path: &Path,
    run_id: Uuid,
    status: std::io::Result<ExitStatus>,
) -> JobOutcome {
    let exit_code = match status {
        Ok(status) if status.success() => {
            info!(run_id = %run_id, "Job exited successfully");
            status.code()
        },
        Ok(status) => {
            warn!(run_id = %run_id, status = %status, "Job exited with failure");
            status.code()
        },
        Err(e) => {
            error!(run_id = %run_id, error = %e, "Failed to wait for job");
            None
        },
    };

    let total = match artifact::read_record_count(artifact_path).await {
        Ok(count) => Some(count as u64),
        Err(e) if e.is_io() => {
            warn!(
                run_id = %run_id,
                path = %artifact_path.display(),
                error = %e,
                "Job left no artifact; total left unchanged"
            );
            None
        },
        Err(e) => {
            error!(
                run_id = %run_id,
                path = %artifact_path.display(),
                error = %e,
                "Job artifact is unreadable; total left unchanged"
            );
            None
        },
    };

    let written = store
        .try_update(|state| {
            if !state.is_run(run_id) {
                return Err(ExitWrite::Superseded);
            }
            match total {
                Some(total) => state.record_total(total, Utc::now()),
                None => state.finish_without_total(Utc::now()),
            }
            Ok(())
        })
        .await;

    match (written, total) {
        (Ok(_), Some(total)) => {
            info!(run_id = %run_id, total, "Run total recorded");
            JobOutcome::Counted { total, exit_code }
        },
        (Ok(_), None) => JobOutcome::NoArtifact { exit_code },
        (Err(ExitWrite::Superseded), _) => {
            warn!(run_id = %run_id, "Run was superseded; discarding its result");
            JobOutcome::Superseded { exit_code }
        },
        (Err(ExitWrite::Store(e)), _) => {
            error!(run_id = %run_id, error = %e, "Failed to record job result");
            JobOutcome::Unrecorded { exit_code }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunState;

    fn shell_job(dir: &Path, script: &str) -> JobConfig {
        JobConfig {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            artifact_path: dir.join("records.json"),
        }
    }

    async fn runner_with(script: &str) -> (tempfile::TempDir, Arc<StateStore>, JobRunner) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("counter.json")));
        let runner = JobRunner::new(shell_job(dir.path(), script), store.clone());
        (dir, store, runner)
    }

    async fn begin_run(store: &StateStore) -> Uuid {
        let run_id = Uuid::new_v4();
        store
            .write(&RunState::started(run_id, Utc::now()))
            .await
            .unwrap();
        run_id
    }

    #[tokio::test]
    async fn test_artifact_count_becomes_total() {
        let (_dir, store, runner) =
            runner_with(r#"printf '[{"id":1},{"id":2},{"id":3}]' > "$CALLRUN_ARTIFACT_FILE""#).await;
        let run_id = begin_run(&store).await;

        let handle = runner.start(run_id).await.unwrap();
        assert_eq!(handle.run_id(), run_id);
        let outcome = handle.wait().await;

        assert_eq!(outcome, JobOutcome::Counted { total: 3, exit_code: Some(0) });
        let state = store.read().await;
        assert_eq!(state.total, 3);
        assert!(!state.running);
    }

    #[tokio::test]
    async fn test_total_update_preserves_concurrent_successes() {
        let (_dir, store, runner) = runner_with(
            r#"while [ ! -f "$CALLRUN_ARTIFACT_FILE.go" ]; do sleep 0.02; done; printf '[1,2]' > "$CALLRUN_ARTIFACT_FILE""#,
        )
        .await;
        let run_id = begin_run(&store).await;
        let handle = runner.start(run_id).await.unwrap();

        for _ in 0..5 {
            store
                .update(|state| state.record_success(None, Utc::now()))
                .await
                .unwrap();
        }
        let gate = format!("{}.go", runner.config().artifact_path.display());
        tokio::fs::write(&gate, b"").await.unwrap();

        handle.wait().await;
        let state = store.read().await;
        assert_eq!(state.total, 2);
        assert_eq!(state.completed, 5);
    }

    #[tokio::test]
    async fn test_exit_is_recorded_while_background_child_holds_output() {
        let (_dir, store, runner) =
            runner_with(r#"sleep 5 & printf '[1,2]' > "$CALLRUN_ARTIFACT_FILE"; exit 0"#).await;
        let run_id = begin_run(&store).await;

        let handle = runner.start(run_id).await.unwrap();
        let outcome = tokio::time::timeout(Duration::from_secs(3), handle.wait())
            .await
            .expect("outcome waited for the background child");

        assert_eq!(outcome, JobOutcome::Counted { total: 2, exit_code: Some(0) });
        let state = store.read().await;
        assert_eq!(state.total, 2);
        assert!(!state.running);
    }

    #[tokio::test]
    async fn test_unwritable_state_leaves_outcome_unrecorded() {
        let dir = tempfile::tempdir().unwrap();
        let state_path = dir.path().join("counter.json");
        let store = Arc::new(StateStore::open(&state_path));
        let runner = JobRunner::new(shell_job(dir.path(), "printf '[1]' > \"$CALLRUN_ARTIFACT_FILE\""), store);
        tokio::fs::create_dir(&state_path).await.unwrap();

        let outcome = runner.start(Uuid::new_v4()).await.unwrap().wait().await;

        assert_eq!(outcome, JobOutcome::Unrecorded { exit_code: Some(0) });
    }

    #[tokio::test]
    async fn test_crash_without_artifact_keeps_total() {
        let (_dir, store, runner) = runner_with("echo 'missing credentials' >&2; exit 3").await;
        let run_id = begin_run(&store).await;
        store.update(|state| state.total = 4).await.unwrap();

        let outcome = runner.start(run_id).await.unwrap().wait().await;

        assert_eq!(outcome, JobOutcome::NoArtifact { exit_code: Some(3) });
        let state = store.read().await;
        assert_eq!(state.total, 4);
        assert!(!state.running);
    }

    #[tokio::test]
    async fn test_stale_artifact_is_not_counted() {
        let (_dir, store, runner) = runner_with("exit 1").await;
        tokio::fs::write(&runner.config().artifact_path, b"[1,2,3,4,5,6]")
            .await
            .unwrap();
        let run_id = begin_run(&store).await;

        let outcome = runner.start(run_id).await.unwrap().wait().await;

        assert_eq!(outcome, JobOutcome::NoArtifact { exit_code: Some(1) });
        assert_eq!(store.read().await.total, 0);
    }

    #[tokio::test]
    async fn test_superseded_run_does_not_write() {
        let (_dir, store, runner) = runner_with(
            r#"while [ ! -f "$CALLRUN_ARTIFACT_FILE.go" ]; do sleep 0.02; done; printf '[1]' > "$CALLRUN_ARTIFACT_FILE""#,
        )
        .await;
        let old_run = begin_run(&store).await;
        let handle = runner.start(old_run).await.unwrap();
        let new_run = begin_run(&store).await;
        let gate = format!("{}.go", runner.config().artifact_path.display());
        tokio::fs::write(&gate, b"").await.unwrap();

        let outcome = handle.wait().await;

        assert_eq!(outcome, JobOutcome::Superseded { exit_code: Some(0) });
        let state = store.read().await;
        assert!(state.is_run(new_run));
        assert_eq!(state.total, 0);
        assert!(state.running);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StateStore::open(dir.path().join("counter.json")));
        let config = JobConfig {
            program: "callrun-job-that-does-not-exist".to_string(),
            args: Vec::new(),
            artifact_path: dir.path().join("records.json"),
        };
        let runner = JobRunner::new(config, store);

        let err = runner.start(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RunnerError::Spawn { .. }));
    }

    #[tokio::test]
    async fn test_reconcile_clears_interrupted_run() {
        let (_dir, store, runner) = runner_with("true").await;
        let run_id = begin_run(&store).await;

        assert_eq!(runner.reconcile_after_restart().await.unwrap(), Some(run_id));
        assert!(!store.read().await.running);
        assert_eq!(runner.reconcile_after_restart().await.unwrap(), None);
    }
}
