//! Feature slices of the callrun API
//!
//! Each feature is a vertical slice with its own commands, queries and
//! routes:
//!
//! - **runs**: trigger a fetch run and read its progress counter
//! - **callbacks**: success signals posted by the n8n workflow
//!
//! Commands mutate the run state, queries only read it. Both are plain data
//! types implementing `mediator::Request`, handled by standalone async
//! functions next to them.

pub mod callbacks;
pub mod runs;

use axum::Router;
use std::sync::Arc;

use crate::{runner::JobRunner, store::StateStore};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    /// Persisted run progress
    pub store: Arc<StateStore>,
    /// Launches the fetch-and-notify job
    pub runner: Arc<JobRunner>,
}

/// Creates the API router with all feature routes mounted
///
/// - `POST /start-calls` - start a run
/// - `GET /counter` - progress of the current run
/// - `POST /n8n/callback` - one unit of progress from the automation
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .merge(runs::runs_routes())
        .merge(callbacks::callbacks_routes())
        .with_state(state)
}
