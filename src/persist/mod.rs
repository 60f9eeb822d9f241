//! Durable storage for recorded history.
//!
//! The recorder keeps its logs in memory; a [`HistorySink`] attached with
//! `EditRecorder::add_sink` receives every edit and snapshot as it is
//! recorded. [`FileSink`] writes edits to an [`EditLogFile`] and snapshot
//! states to a [`SnapshotBlobStore`] under one directory, and can load the
//! whole history back as a [`HistoryExport`].

mod blobs;
mod log;

pub use blobs::{ManifestEntry, SnapshotBlobStore};
pub use log::{EditLogFile, EditLogIter};

use crate::error::Result;
use crate::export::HistoryExport;
use crate::types::{Snapshot, Timestamp, VersionedEdit};
use std::path::{Path, PathBuf};

/// Receives history as it is recorded.
///
/// Called synchronously on the recording thread. Errors are logged by the
/// recorder and do not stop recording.
pub trait HistorySink: Send + Sync {
    fn append_edit(&self, edit: &VersionedEdit) -> Result<()>;

    fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Make everything received so far durable.
    fn flush(&self) -> Result<()>;
}

/// Options for [`FileSink`].
#[derive(Clone, Debug)]
pub struct FileSinkConfig {
    /// Sync the edit log every N appends.
    /// Default: 100
    pub sync_interval: u64,

    /// Snapshot states kept in the read cache.
    /// Default: 64
    pub cache_size: usize,
}

impl Default for FileSinkConfig {
    fn default() -> Self {
        Self {
            sync_interval: 100,
            cache_size: 64,
        }
    }
}

/// Edit log plus snapshot store under one directory:
///
/// ```text
/// <dir>/edits.log
/// <dir>/snapshots/manifest.jsonl
/// <dir>/snapshots/blobs/<shard>/<hash>
/// ```
pub struct FileSink {
    path: PathBuf,
    edits: EditLogFile,
    snapshots: SnapshotBlobStore,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, FileSinkConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: FileSinkConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;

        let edits = EditLogFile::open_with_sync_interval(path.join("edits.log"), config.sync_interval)?;
        let snapshots = SnapshotBlobStore::open(path.join("snapshots"), config.cache_size)?;

        tracing::info!(path = %path.display(), edits = edits.len(), "opened history directory");

        Ok(Self {
            path,
            edits,
            snapshots,
        })
    }

    /// Read back everything stored so far.
    pub fn load(&self) -> Result<HistoryExport> {
        Ok(HistoryExport {
            edits: self.edits.read_all()?,
            snapshots: self.snapshots.load_snapshots()?,
            export_time: Timestamp::now(),
        })
    }

    pub fn edit_log(&self) -> &EditLogFile {
        &self.edits
    }

    pub fn snapshot_store(&self) -> &SnapshotBlobStore {
        &self.snapshots
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HistorySink for FileSink {
    fn append_edit(&self, edit: &VersionedEdit) -> Result<()> {
        self.edits.append(edit)?;
        Ok(())
    }

    fn store_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.snapshots.store_snapshot(snapshot)?;
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        self.edits.sync()?;
        self.snapshots.sync()
    }
}
