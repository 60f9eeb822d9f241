//! In-memory snapshot store.

use crate::document::Document;
use crate::error::{HistoryError, Result};
use crate::types::{Snapshot, SnapshotId, Timestamp};
use std::sync::Arc;

/// Ordered list of snapshots, ascending by timestamp and edit index.
///
/// The list is shared copy-on-write so observers can hold on to it
/// without blocking further captures.
#[derive(Clone, Debug, Default)]
pub struct SnapshotStore {
    snapshots: Arc<Vec<Snapshot>>,
    next_id: u64,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the full state of `document`, which reflects the first
    /// `edit_count` edits of the log.
    ///
    /// `timestamp` is raised to the latest snapshot's if it is older.
    pub fn capture<D: Document>(
        &mut self,
        document: &D,
        edit_count: usize,
        timestamp: Timestamp,
    ) -> Snapshot {
        let mut timestamp = timestamp;
        if let Some(last) = self.snapshots.last() {
            timestamp = timestamp.max(last.timestamp);
        }

        let snapshot = Snapshot {
            id: SnapshotId(format!("snapshot-{}-{}", timestamp.0, self.next_id)),
            timestamp,
            state: document.encode_full_state(),
            edit_index: edit_count as i64 - 1,
            doc_length: document.len(),
        };
        self.next_id += 1;

        tracing::debug!(
            id = %snapshot.id,
            edit_index = snapshot.edit_index,
            doc_length = snapshot.doc_length,
            bytes = snapshot.state.len(),
            "captured snapshot"
        );

        Arc::make_mut(&mut self.snapshots).push(snapshot.clone());
        snapshot
    }

    /// Append an existing snapshot, e.g. from an import.
    pub fn push(&mut self, snapshot: Snapshot) -> Result<()> {
        if let Some(last) = self.snapshots.last() {
            if snapshot.timestamp < last.timestamp || snapshot.edit_index < last.edit_index {
                return Err(HistoryError::InvalidOperation(format!(
                    "snapshot {} (edit index {}) is older than the latest snapshot (edit index {})",
                    snapshot.id, snapshot.edit_index, last.edit_index
                )));
            }
        }
        Arc::make_mut(&mut self.snapshots).push(snapshot);
        self.next_id += 1;
        Ok(())
    }

    /// Latest snapshot whose timestamp does not exceed `target`.
    pub fn find_nearest_at_or_before(&self, target: Timestamp) -> Option<&Snapshot> {
        nearest_at_or_before(&self.snapshots, target)
    }

    /// Latest snapshot reflecting no more than the first `count` edits.
    pub fn find_nearest_for_count(&self, count: usize) -> Option<&Snapshot> {
        nearest_for_count(&self.snapshots, count)
    }

    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn as_slice(&self) -> &[Snapshot] {
        &self.snapshots
    }

    /// Shared handle to the current list.
    pub fn shared(&self) -> Arc<Vec<Snapshot>> {
        Arc::clone(&self.snapshots)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots = Arc::default();
        self.next_id = 0;
    }
}

/// Linear scan for the latest snapshot with `timestamp <= target`.
///
/// Snapshots sharing a timestamp resolve to the later capture.
pub fn nearest_at_or_before(snapshots: &[Snapshot], target: Timestamp) -> Option<&Snapshot> {
    let mut best: Option<&Snapshot> = None;
    for snapshot in snapshots {
        if snapshot.timestamp > target {
            continue;
        }
        match best {
            Some(current) if current.timestamp > snapshot.timestamp => {}
            _ => best = Some(snapshot),
        }
    }
    best
}

/// Linear scan for the latest snapshot covering at most `count` edits.
pub fn nearest_for_count(snapshots: &[Snapshot], count: usize) -> Option<&Snapshot> {
    let mut best: Option<&Snapshot> = None;
    for snapshot in snapshots {
        if snapshot.edits_covered() > count {
            continue;
        }
        match best {
            Some(current) if current.edit_index > snapshot.edit_index => {}
            _ => best = Some(snapshot),
        }
    }
    best
}
