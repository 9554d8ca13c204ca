//! Run progress model
//!
//! [`RunState`] is the single durable record of the current run. Field names
//! on disk and on the wire (`total`, `success`, `lastRun`, `lastUpdate`) are
//! fixed for compatibility with existing progress pages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Progress of the current (or most recent) run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunState {
    /// Records the job reported; 0 until it exits with an artifact
    pub total: u64,

    /// Accepted success callbacks
    #[serde(rename = "success")]
    pub completed: u64,

    #[serde(rename = "lastRun")]
    pub started_at: Option<DateTime<Utc>>,

    #[serde(rename = "lastUpdate")]
    pub last_updated_at: Option<DateTime<Utc>>,

    pub run_id: Option<Uuid>,

    /// Set by the trigger, cleared once the job's exit has been observed
    pub running: bool,

    /// Process id of the job while the run is in progress
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,

    /// Idempotency keys already counted in this run
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub seen_callback_keys: BTreeSet<String>,
}

impl RunState {
    /// State of a run that has just been triggered
    pub fn started(run_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            total: 0,
            completed: 0,
            started_at: Some(now),
            last_updated_at: Some(now),
            run_id: Some(run_id),
            running: true,
            pid: None,
            seen_callback_keys: BTreeSet::new(),
        }
    }

    /// Remember the job's pid, unless the run has already finished
    pub fn attach_pid(&mut self, run_id: Uuid, pid: Option<u32>) -> bool {
        if !self.running || !self.is_run(run_id) {
            return false;
        }
        self.pid = pid;
        true
    }

    /// Whether `run_id` is the run this state describes
    pub fn is_run(&self, run_id: Uuid) -> bool {
        self.run_id == Some(run_id)
    }

    /// Record one unit of progress.
    ///
    /// With a key, a repeat of an already counted key is ignored; returns
    /// whether the counter moved.
    pub fn record_success(&mut self, key: Option<&str>, now: DateTime<Utc>) -> bool {
        if let Some(key) = key {
            if !self.seen_callback_keys.insert(key.to_string()) {
                return false;
            }
        }
        self.completed = self.completed.saturating_add(1);
        self.last_updated_at = Some(now);
        true
    }

    /// Apply the job's reported record count and close the run
    pub fn record_total(&mut self, total: u64, now: DateTime<Utc>) {
        self.total = total;
        self.running = false;
        self.pid = None;
        self.last_updated_at = Some(now);
    }

    /// Close the run without touching the counters
    pub fn finish_without_total(&mut self, now: DateTime<Utc>) {
        self.running = false;
        self.pid = None;
        self.last_updated_at = Some(now);
    }

    /// Read-only projection served to polling clients
    pub fn view(&self) -> CounterView {
        CounterView {
            total: self.total,
            success: self.completed,
            last_run: self.started_at,
            last_update: self.last_updated_at,
            running: self.running,
            run_id: self.run_id,
        }
    }
}

/// Status payload of `GET /api/counter`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterView {
    pub total: u64,
    pub success: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_update: Option<DateTime<Utc>>,
    pub running: bool,
    pub run_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_state_serializes_fixed_fields() {
        let value = serde_json::to_value(RunState::default()).unwrap();

        assert_eq!(value["total"], 0);
        assert_eq!(value["success"], 0);
        assert!(value["lastRun"].is_null());
        assert!(value["lastUpdate"].is_null());
        assert!(value.get("seenCallbackKeys").is_none());
    }

    #[test]
    fn test_legacy_record_deserializes_with_defaults() {
        let state: RunState = serde_json::from_value(json!({
            "total": 12,
            "success": 4,
            "lastRun": "2026-03-01T10:00:00Z",
            "lastUpdate": null
        }))
        .unwrap();

        assert_eq!(state.total, 12);
        assert_eq!(state.completed, 4);
        assert!(state.started_at.is_some());
        assert!(!state.running);
        assert!(state.run_id.is_none());
    }

    #[test]
    fn test_record_success_dedupes_keys_only() {
        let now = Utc::now();
        let mut state = RunState::started(Uuid::new_v4(), now);

        assert!(state.record_success(None, now));
        assert!(state.record_success(None, now));
        assert!(state.record_success(Some("row-1"), now));
        assert!(!state.record_success(Some("row-1"), now));

        assert_eq!(state.completed, 3);
    }

    #[test]
    fn test_started_clears_previous_run() {
        let now = Utc::now();
        let mut state = RunState::started(Uuid::new_v4(), now);
        state.record_success(Some("a"), now);
        state.record_total(5, now);

        let next = RunState::started(Uuid::new_v4(), now);
        assert_eq!(next.completed, 0);
        assert_eq!(next.total, 0);
        assert!(next.running);
        assert!(next.seen_callback_keys.is_empty());
        assert_ne!(next.run_id, state.run_id);
    }

    #[test]
    fn test_pid_only_attaches_to_running_run() {
        let now = Utc::now();
        let run_id = Uuid::new_v4();
        let mut state = RunState::started(run_id, now);

        assert!(!state.attach_pid(Uuid::new_v4(), Some(7)));
        assert!(state.attach_pid(run_id, Some(42)));
        assert_eq!(state.pid, Some(42));

        state.record_total(3, now);
        assert_eq!(state.pid, None);
        assert!(!state.attach_pid(run_id, Some(42)));
        assert_eq!(state.pid, None);
    }
}
