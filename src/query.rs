//! Read-only queries over an edit log.
//!
//! All functions take the log as a slice and never mutate it, so they work
//! equally on `EditRecorder::edits()` and on an imported or reloaded log.

use crate::types::{OperationKind, Snapshot, Timestamp, VersionedEdit};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Edits attributed to `actor_id`.
pub fn edits_by_actor(edits: &[VersionedEdit], actor_id: u64) -> Vec<&VersionedEdit> {
    edits.iter().filter(|e| e.actor_id == actor_id).collect()
}

/// Edits whose display name is `name`.
pub fn edits_by_actor_name<'a>(edits: &'a [VersionedEdit], name: &str) -> Vec<&'a VersionedEdit> {
    edits.iter().filter(|e| e.actor_name == name).collect()
}

/// Edits with `start <= timestamp <= end`.
pub fn edits_in_range(
    edits: &[VersionedEdit],
    start: Timestamp,
    end: Timestamp,
) -> Vec<&VersionedEdit> {
    // The log is ordered by timestamp
    let from = edits.partition_point(|e| e.timestamp < start);
    let to = edits.partition_point(|e| e.timestamp <= end);
    if from >= to {
        return Vec::new();
    }
    edits[from..to].iter().collect()
}

/// Edits falling into one fixed-width time bucket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineGroup {
    /// Inclusive start of the bucket.
    pub start: Timestamp,
    /// Exclusive end of the bucket.
    pub end: Timestamp,
    pub edit_count: usize,
    pub by_operation: BTreeMap<OperationKind, usize>,
    pub actors: BTreeSet<String>,
    /// Range of edit indices in the bucket.
    pub first_index: usize,
    pub last_index: usize,
}

/// Group edits into buckets of `bucket` width, aligned to the first edit.
/// Empty buckets are skipped. A zero width is treated as one millisecond.
pub fn timeline(edits: &[VersionedEdit], bucket: Duration) -> Vec<TimelineGroup> {
    let Some(first) = edits.first() else {
        return Vec::new();
    };
    let width = (bucket.as_millis() as i64).max(1);
    let origin = first.timestamp.0;

    let mut groups: Vec<TimelineGroup> = Vec::new();
    for (index, edit) in edits.iter().enumerate() {
        let slot = (edit.timestamp.0 - origin).max(0) / width;
        let start = Timestamp(origin + slot * width);

        let needs_new = groups.last().map_or(true, |g| g.start != start);
        if needs_new {
            groups.push(TimelineGroup {
                start,
                end: Timestamp(start.0 + width),
                edit_count: 0,
                by_operation: BTreeMap::new(),
                actors: BTreeSet::new(),
                first_index: index,
                last_index: index,
            });
        }

        if let Some(group) = groups.last_mut() {
            group.edit_count += 1;
            *group.by_operation.entry(edit.operation).or_insert(0) += 1;
            group.actors.insert(edit.actor_name.clone());
            group.last_index = index;
        }
    }

    groups
}

/// Aggregate figures for a history.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStats {
    pub total_edits: usize,
    pub snapshot_count: usize,
    pub by_operation: BTreeMap<OperationKind, usize>,
    pub by_actor: BTreeMap<String, usize>,
    pub first_timestamp: Option<Timestamp>,
    pub last_timestamp: Option<Timestamp>,
    /// Milliseconds between the first and last edit.
    pub duration_ms: u64,
    pub chars_inserted: usize,
    pub chars_deleted: usize,
}

pub fn statistics(edits: &[VersionedEdit], snapshots: &[Snapshot]) -> HistoryStats {
    let mut stats = HistoryStats {
        total_edits: edits.len(),
        snapshot_count: snapshots.len(),
        first_timestamp: edits.first().map(|e| e.timestamp),
        last_timestamp: edits.last().map(|e| e.timestamp),
        ..Default::default()
    };

    if let (Some(first), Some(last)) = (stats.first_timestamp, stats.last_timestamp) {
        stats.duration_ms = last.millis_since(first);
    }

    for edit in edits {
        *stats.by_operation.entry(edit.operation).or_insert(0) += 1;
        *stats.by_actor.entry(edit.actor_name.clone()).or_insert(0) += 1;

        let length = edit.content_length.unwrap_or(0);
        match edit.operation {
            OperationKind::Insert => stats.chars_inserted += length,
            OperationKind::Delete => stats.chars_deleted += length,
            _ => {}
        }
    }

    stats
}
