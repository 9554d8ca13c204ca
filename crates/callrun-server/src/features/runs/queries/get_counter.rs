//! Get counter query
//!
//! Snapshot of the current run's progress for polling clients.

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::{models::CounterView, store::StateStore};

/// Query for the current progress counter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GetCounterQuery {}

impl Request<CounterView> for GetCounterQuery {}

/// Read-only; falls back to zeroed defaults when no run has happened yet.
pub async fn handle(store: &StateStore, _query: GetCounterQuery) -> CounterView {
    store.read().await.view()
}
