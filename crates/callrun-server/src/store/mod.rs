//! Durable run state
//!
//! [`StateStore`] owns the persisted [`RunState`] file. Every access goes
//! through one async mutex, so read-modify-write sequences coming from the
//! trigger, the job runner and the callback receiver never interleave and
//! readers never see a partially written document.
//!
//! Callers mutate through [`StateStore::update`] or
//! [`StateStore::try_update`], which run the whole read, change and write
//! under the lock. Plain reads fall back to defaults when the file cannot be
//! read; updates fail instead, so an unreadable file is never overwritten.

use callrun_common::{fs::write_atomic, CallrunError};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::models::RunState;

/// Result type alias for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by the store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read run state from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist run state to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: CallrunError,
    },

    #[error("Failed to encode run state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// File-backed, mutex-guarded run state
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl StateStore {
    /// Open the store at `path`. The file is created on the first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state; defaults when nothing usable is persisted.
    pub async fn read(&self) -> RunState {
        let _guard = self.lock.lock().await;
        match self.load().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(error = %e, "Using default run state");
                RunState::default()
            },
        }
    }

    /// Replace the persisted state wholesale.
    pub async fn write(&self, state: &RunState) -> StoreResult<()> {
        let _guard = self.lock.lock().await;
        self.persist(state).await
    }

    /// Atomically apply `f` to the current state and persist the result.
    pub async fn update<T, F>(&self, f: F) -> StoreResult<(T, RunState)>
    where
        F: FnOnce(&mut RunState) -> T,
    {
        self.try_update(|state| Ok::<_, StoreError>(f(state))).await
    }

    /// Like [`update`](Self::update), but nothing is written when `f` fails.
    pub async fn try_update<T, E, F>(&self, f: F) -> Result<(T, RunState), E>
    where
        F: FnOnce(&mut RunState) -> Result<T, E>,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock().await;
        let mut state = self.load().await?;
        let out = f(&mut state)?;
        self.persist(&state).await?;
        Ok((out, state))
    }

    /// Missing or corrupt content yields defaults; I/O failures are errors.
    async fn load(&self) -> StoreResult<RunState> {
        let bytes = match read_with_retry(&self.path).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::debug!(path = %self.path.display(), "No run state persisted yet");
                return Ok(RunState::default());
            },
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            },
        };

        match serde_json::from_slice(&bytes) {
            Ok(state) => Ok(state),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Run state is corrupt, using defaults");
                Ok(RunState::default())
            },
        }
    }

    async fn persist(&self, state: &RunState) -> StoreResult<()> {
        let bytes = serde_json::to_vec_pretty(state)?;

        if let Err(first) = write_atomic(&self.path, &bytes).await {
            tracing::warn!(path = %self.path.display(), error = %first, "Run state write failed, retrying once");
            write_atomic(&self.path, &bytes)
                .await
                .map_err(|source| StoreError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }

        Ok(())
    }
}

/// `Ok(None)` when the file does not exist; other I/O errors get one retry.
async fn read_with_retry(path: &Path) -> std::io::Result<Option<Vec<u8>>> {
    let mut retried = false;
    loop {
        match tokio::fs::read(path).await {
            Ok(bytes) => return Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) if !retried => {
                tracing::warn!(path = %path.display(), error = %e, "Run state read failed, retrying once");
                retried = true;
            },
            Err(e) => return Err(e),
        }
    }
}
