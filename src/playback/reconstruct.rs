//! Deterministic document reconstruction from snapshots and edits.

use crate::document::Document;
use crate::error::{HistoryError, Result};
use crate::snapshots::{nearest_at_or_before, nearest_for_count};
use crate::types::{Snapshot, Timestamp, VersionedEdit};
use std::time::Duration;

/// Materialize the document as of `target`.
///
/// Loads the latest snapshot at or before `target` (or an empty document)
/// and replays the following edits up to the first one later than
/// `target`. Returns the document and the number of edits it reflects.
pub fn reconstruct_at_timestamp<D: Document>(
    target: Timestamp,
    edits: &[VersionedEdit],
    snapshots: &[Snapshot],
) -> Result<(D, usize)> {
    let (mut document, start) = match nearest_at_or_before(snapshots, target) {
        Some(snapshot) => (D::from_state(&snapshot.state)?, snapshot.edits_covered()),
        None => (D::empty(), 0),
    };

    let mut index = start.min(edits.len());
    while let Some(edit) = edits.get(index) {
        if edit.timestamp > target {
            break;
        }
        document.apply_delta(&edit.delta)?;
        index += 1;
    }

    tracing::debug!(
        target = target.0,
        from_snapshot = start,
        replayed = index - start.min(edits.len()),
        index,
        "reconstructed at timestamp"
    );

    Ok((document, index))
}

/// Materialize the document with exactly the first `count` edits applied.
pub fn reconstruct_count<D: Document>(
    count: usize,
    edits: &[VersionedEdit],
    snapshots: &[Snapshot],
) -> Result<D> {
    if count > edits.len() {
        return Err(HistoryError::InvalidIndex {
            index: count,
            len: edits.len(),
        });
    }

    let (mut document, start) = match nearest_for_count(snapshots, count) {
        Some(snapshot) => (D::from_state(&snapshot.state)?, snapshot.edits_covered()),
        None => (D::empty(), 0),
    };

    for edit in &edits[start..count] {
        document.apply_delta(&edit.delta)?;
    }

    tracing::debug!(count, from_snapshot = start, "reconstructed by count");

    Ok(document)
}

/// Wait between two consecutive edits during auto-play.
///
/// The recorded gap divided by `speed`, capped at `max_delay`. Gaps that
/// run backwards wait nothing.
pub fn pacing_delay(from: Timestamp, to: Timestamp, speed: f64, max_delay: Duration) -> Duration {
    let scaled_nanos = (to.millis_since(from) as f64 * 1_000_000.0 / speed).round();
    if scaled_nanos >= max_delay.as_nanos() as f64 {
        return max_delay;
    }
    Duration::from_nanos(scaled_nanos as u64)
}
