//! File-backed snapshot log.
//!
//! A bundled `SnapshotSink` that writes each post-phase snapshot as a pretty
//! JSON file under `<dir>/<run_id>/`. The orchestrator treats any sink as
//! best-effort; a write failure here is logged by the caller and the run
//! carries on.

use crate::orchestrator::state::RunSnapshot;
use crate::providers::SnapshotSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

pub struct SnapshotLogger {
    snapshot_dir: PathBuf,
}

impl SnapshotLogger {
    pub fn new(snapshot_dir: &Path) -> Self {
        Self {
            snapshot_dir: snapshot_dir.to_path_buf(),
        }
    }

    /// Write one snapshot to disk, creating the run directory as needed.
    /// Returns the path written.
    pub fn record(&self, snapshot: &RunSnapshot) -> Result<PathBuf> {
        let run_dir = self.snapshot_dir.join(snapshot.run_id.to_string());
        fs::create_dir_all(&run_dir).context("Failed to create snapshot run directory")?;

        // Phase labels contain ':' (e.g. "probe:2"); keep filenames tame.
        let filename = format!(
            "{}_{}.json",
            snapshot.taken_at.format("%Y-%m-%dT%H-%M-%S%.3f"),
            snapshot.phase.replace(':', "-")
        );
        let path = run_dir.join(filename);

        let json =
            serde_json::to_string_pretty(snapshot).context("Failed to serialize snapshot")?;
        fs::write(&path, json).context("Failed to write snapshot file")?;
        Ok(path)
    }

    /// All snapshot files for a run, oldest first.
    pub fn list_snapshots(&self, run_id: Uuid) -> Result<Vec<PathBuf>> {
        let run_dir = self.snapshot_dir.join(run_id.to_string());
        if !run_dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&run_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|e| e == "json").unwrap_or(false))
            .collect();

        paths.sort();
        Ok(paths)
    }

    pub fn load_snapshot(&self, path: &Path) -> Result<RunSnapshot> {
        let content = fs::read_to_string(path).context("Failed to read snapshot file")?;
        let snapshot: RunSnapshot =
            serde_json::from_str(&content).context("Failed to parse snapshot file")?;
        Ok(snapshot)
    }
}

#[async_trait]
impl SnapshotSink for SnapshotLogger {
    async fn persist(&self, snapshot: &RunSnapshot) -> Result<()> {
        self.record(snapshot).map(|_| ())
    }
}
