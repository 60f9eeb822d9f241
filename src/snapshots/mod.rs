//! Ordered full-state captures.
//!
//! A snapshot bounds the replay cost of reconstruction: to materialize the
//! document after `n` edits, load the latest snapshot covering at most `n`
//! edits and replay only the remainder. Snapshot count scales with
//! edit count divided by the capture interval, so lookups are linear.

mod store;

pub use store::{nearest_at_or_before, nearest_for_count, SnapshotStore};
