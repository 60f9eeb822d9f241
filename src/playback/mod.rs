//! Historical reconstruction and timed playback.
//!
//! [`reconstruct_at_timestamp`] and [`reconstruct_count`] are pure
//! functions over the caller's edit and snapshot logs.
//! [`PlaybackEngine`] keeps a cursor into those logs and walks it one edit
//! at a time, either manually (`step_*`) or on a blocking paced loop
//! (`play_*`), announcing every move to its observers.

mod engine;
mod reconstruct;
mod types;

pub use engine::PlaybackEngine;
pub use reconstruct::{pacing_delay, reconstruct_at_timestamp, reconstruct_count};
pub use types::{
    Direction, PlaybackConfig, PlaybackEvent, PlaybackOutcome, PlaybackState, StopReason,
};
