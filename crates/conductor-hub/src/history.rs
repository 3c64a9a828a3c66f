//! The append-only history ledger (`history.jsonl`).
//!
//! One JSON object per line, newest last, bounded by a maximum item count.
//! Single-writer assumption: one orchestrator process per session appends;
//! observers only read.

use chrono::{DateTime, Utc};
use conductor_core::ConductorResult;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// One ledger line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// What happened: `prompt`, `plan`, `handoff`, `gate_check`,
    /// `evidence`, `phase_advance`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Id of the artifact or phase involved.
    pub id: String,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Appends one entry and enforces the item bound (oldest lines truncated).
pub async fn append(path: &Path, entry: &HistoryEntry, max_items: usize) -> ConductorResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut line = serde_json::to_string(entry)?;
    line.push('\n');
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.flush().await?;
    drop(file);

    enforce_bound(path, max_items).await
}

/// Reads every parseable entry, oldest first. Corrupt lines are skipped
/// with a warning, never fatal.
pub async fn read(path: &Path) -> ConductorResult<Vec<HistoryEntry>> {
    let data = match tokio::fs::read_to_string(path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = Vec::new();
    for line in data.lines().filter(|l| !l.trim().is_empty()) {
        match serde_json::from_str::<HistoryEntry>(line) {
            Ok(entry) => entries.push(entry),
            Err(e) => warn!(path = %path.display(), error = %e, "skipping corrupt history line"),
        }
    }
    Ok(entries)
}

async fn enforce_bound(path: &Path, max_items: usize) -> ConductorResult<()> {
    let data = tokio::fs::read_to_string(path).await?;
    let lines: Vec<&str> = data.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() <= max_items {
        return Ok(());
    }

    let keep = &lines[lines.len() - max_items..];
    let mut out = keep.join("\n");
    out.push('\n');

    let tmp = path.with_extension("jsonl.tmp");
    tokio::fs::write(&tmp, out.as_bytes()).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_read_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.jsonl");

        append(&path, &HistoryEntry::now("prompt", "p-1"), 100)
            .await
            .unwrap();
        append(&path, &HistoryEntry::now("plan", "pl-1"), 100)
            .await
            .unwrap();

        let entries = read(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, "prompt");
        assert_eq!(entries[1].kind, "plan");
    }

    #[tokio::test]
    async fn test_bound_truncates_oldest() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.jsonl");

        for i in 0..5 {
            append(&path, &HistoryEntry::now("handoff", format!("h-{i}")), 3)
                .await
                .unwrap();
        }

        let entries = read(&path).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "h-2");
        assert_eq!(entries[2].id, "h-4");
    }

    #[tokio::test]
    async fn test_corrupt_lines_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("history.jsonl");

        append(&path, &HistoryEntry::now("prompt", "p-1"), 100)
            .await
            .unwrap();
        // Simulate a torn write from a crashed process.
        let mut existing = tokio::fs::read_to_string(&path).await.unwrap();
        existing.push_str("{not json\n");
        tokio::fs::write(&path, existing).await.unwrap();
        append(&path, &HistoryEntry::now("plan", "pl-1"), 100)
            .await
            .unwrap();

        let entries = read(&path).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, "p-1");
        assert_eq!(entries[1].id, "pl-1");
    }

    #[tokio::test]
    async fn test_missing_ledger_reads_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let entries = read(&tmp.path().join("history.jsonl")).await.unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn test_entry_serializes_type_key() {
        let entry = HistoryEntry::now("gate_check", "p1");
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "gate_check");
        assert_eq!(json["id"], "p1");
    }
}
