//! Test helpers for callrun server integration tests
//!
//! - [`TestApp`]: an in-process router backed by a temp directory
//! - shell job scripts standing in for the real fetch job
//! - request helpers returning status + decoded JSON

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use callrun_server::{
    api::{create_router, AppState},
    config::{Config, JobConfig},
};
use serde_json::{json, Value};
use std::{
    path::PathBuf,
    time::{Duration, Instant},
};
use tempfile::TempDir;
use tower::ServiceExt;

/// How long polling helpers wait before giving up
const POLL_TIMEOUT: Duration = Duration::from_secs(10);

/// Shell snippet writing `count` records to the artifact location
pub fn records_job(count: usize) -> String {
    let records: Vec<Value> = (0..count)
        .map(|i| json!({ "id": i, "phone": format!("+1555000{:04}", i) }))
        .collect();
    format!(
        r#"echo "fetched {count} records"; printf '%s' '{}' > "$CALLRUN_ARTIFACT_FILE""#,
        Value::Array(records)
    )
}

/// Like [`records_job`], but blocks until [`TestApp::open_gate`] is called
pub fn gated_records_job(count: usize) -> String {
    format!(
        r#"while [ ! -f "$CALLRUN_ARTIFACT_FILE.go" ]; do sleep 0.02; done; {}"#,
        records_job(count)
    )
}

/// Router plus the temp directory holding its state and artifact
pub struct TestApp {
    pub dir: TempDir,
    pub config: Config,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    /// App whose fetch job is `sh -c <script>`
    pub fn with_script(script: &str) -> Self {
        Self::with_job("sh", &["-c", script])
    }

    pub fn with_job(program: &str, args: &[&str]) -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let mut config = Config::default();
        config.state.path = dir.path().join("data").join("counter.json");
        config.job = JobConfig {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            artifact_path: dir.path().join("data").join("records.json"),
        };

        let state = AppState::from_config(&config);
        let router = create_router(state.clone(), &config);

        Self {
            dir,
            config,
            state,
            router,
        }
    }

    /// Fresh state and router over the same files, as after a process restart
    pub fn restart(&self) -> (AppState, Router) {
        let state = AppState::from_config(&self.config);
        let router = create_router(state.clone(), &self.config);
        (state, router)
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.config.job.artifact_path.clone()
    }

    /// Make every state write fail by occupying the store's temp file path
    pub fn block_state_writes(&self) {
        let mut tmp = self.config.state.path.clone().into_os_string();
        tmp.push(".tmp");
        std::fs::create_dir_all(tmp).expect("Failed to block state writes");
    }

    /// Release a job started from [`gated_records_job`]
    pub fn open_gate(&self) {
        let mut gate = self.artifact_path().into_os_string();
        gate.push(".go");
        std::fs::create_dir_all(self.dir.path().join("data")).expect("Failed to create data dir");
        std::fs::write(gate, b"").expect("Failed to open gate");
    }

    pub async fn trigger(&self) -> (StatusCode, Value) {
        send(&self.router, "POST", "/api/start-calls", None, &[]).await
    }

    pub async fn callback(&self, body: Value) -> (StatusCode, Value) {
        send(&self.router, "POST", "/api/n8n/callback", Some(body.to_string()), &[]).await
    }

    pub async fn counter(&self) -> Value {
        let (status, body) = send(&self.router, "GET", "/api/counter", None, &[]).await;
        assert_eq!(status, StatusCode::OK);
        body
    }

    /// Poll the counter until the run is no longer marked running
    pub async fn wait_until_idle(&self) -> Value {
        let deadline = Instant::now() + POLL_TIMEOUT;
        loop {
            let counter = self.counter().await;
            if counter["running"] == false {
                return counter;
            }
            assert!(Instant::now() < deadline, "run did not finish: {counter}");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Send one request through `router` and decode the JSON reply
pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    body: Option<String>,
    headers: &[(&str, &str)],
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body)),
        None => builder.body(Body::empty()),
    }
    .expect("Failed to build request");

    let response = router
        .clone()
        .oneshot(request)
        .await
        .expect("Router failed");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("Response is not JSON")
    };

    (status, value)
}
