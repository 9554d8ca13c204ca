//! Record artifact exchanged between the fetch job and the server
//!
//! The job writes the records it fetched to a JSON file before it exits; the
//! server's runner counts them once the job has terminated. The canonical
//! form is a bare JSON array, but a few envelope shapes are tolerated so
//! that a hand-written or third-party job can report too:
//!
//! - `[ ... ]`
//! - `{ "records": [ ... ] }` or `{ "data": [ ... ] }`
//! - `{ "count": 42 }`

use serde_json::Value;
use std::path::Path;

use crate::{fs::write_atomic, CallrunError, Result};

/// Environment variable through which the server tells the job where to
/// write its artifact.
pub const ARTIFACT_ENV: &str = "CALLRUN_ARTIFACT_FILE";

/// Environment variable carrying the id of the run the job belongs to.
pub const RUN_ID_ENV: &str = "CALLRUN_RUN_ID";

/// Object keys that may wrap the record array.
const ENVELOPE_KEYS: [&str; 2] = ["records", "data"];

/// Persist `records` as the artifact at `path`.
pub async fn write_records(path: impl AsRef<Path>, records: &[Value]) -> Result<()> {
    let bytes = serde_json::to_vec(records)?;
    write_atomic(path.as_ref(), &bytes).await?;
    tracing::debug!(path = %path.as_ref().display(), count = records.len(), "Record artifact written");
    Ok(())
}

/// Read the artifact at `path` and return how many records it holds.
pub async fn read_record_count(path: impl AsRef<Path>) -> Result<usize> {
    let bytes = tokio::fs::read(path.as_ref()).await?;
    let value: Value = serde_json::from_slice(&bytes)?;
    count_records(&value)
}

/// Count the records in an already-parsed artifact.
pub fn count_records(value: &Value) -> Result<usize> {
    if let Some(count) = value.get("count") {
        return count
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| CallrunError::InvalidArtifact(format!("count is not a non-negative integer: {}", count)));
    }

    record_slice(value).map(<[Value]>::len)
}

/// Take the record list out of a source response or artifact.
///
/// `{ "count": n }` carries no records and is rejected here.
pub fn into_records(value: Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| match map.remove(*key) {
                Some(Value::Array(items)) => Some(items),
                _ => None,
            })
            .ok_or_else(|| CallrunError::InvalidArtifact("object has no record array".to_string())),
        other => Err(CallrunError::InvalidArtifact(format!("expected a record list, got {}", kind(&other)))),
    }
}

fn record_slice(value: &Value) -> Result<&[Value]> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => ENVELOPE_KEYS
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_array))
            .map(Vec::as_slice)
            .ok_or_else(|| CallrunError::InvalidArtifact("object has no record array".to_string())),
        other => Err(CallrunError::InvalidArtifact(format!("expected a record list, got {}", kind(other)))),
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
