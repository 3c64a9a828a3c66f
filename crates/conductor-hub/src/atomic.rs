//! Atomic JSON persistence: serialize with stable 2-space indentation,
//! write to `<path>.tmp`, rename into place. Rename is atomic on POSIX, so
//! concurrent readers only ever observe complete documents.

use conductor_core::{ConductorError, ConductorResult};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Writes `value` to `path` via the tmp-then-rename protocol.
pub async fn write_json<T: Serialize>(path: &Path, value: &T) -> ConductorResult<()> {
    let parent = path
        .parent()
        .ok_or_else(|| ConductorError::Hub(format!("{} has no parent", path.display())))?;
    tokio::fs::create_dir_all(parent).await?;

    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');

    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Reads and deserializes `path`; an absent file is the `not_found` signal.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> ConductorResult<T> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ConductorError::NotFound(path.display().to_string()));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(serde_json::from_str(&data)?)
}
