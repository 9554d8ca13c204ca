//! Whole-file replacement helpers
//!
//! Readers of a file written through [`write_atomic`] observe either the old
//! contents or the new contents, never a prefix of the new ones.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::Result;

/// Replace `path` with `bytes` via a sibling temp file and a rename.
///
/// Missing parent directories are created. Concurrent calls for the same
/// path must be serialized by the caller since they share the temp name.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp = temp_path(path);
    let mut file = tokio::fs::File::create(&tmp).await?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    Ok(())
}

/// Remove `path`, treating an already-missing file as success.
pub async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
