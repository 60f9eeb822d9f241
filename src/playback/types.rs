//! Playback configuration, state and events.

use crate::types::{Timestamp, VersionedEdit};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Playback configuration.
#[derive(Clone, Debug)]
pub struct PlaybackConfig {
    /// Upper bound on the wait between two edits during auto-play.
    /// Default: 2s
    pub max_delay: Duration,

    /// Speed the engine starts with.
    /// Default: 1.0
    pub initial_speed: f64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            max_delay: Duration::from_millis(2000),
            initial_speed: 1.0,
        }
    }
}

/// Where the engine is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackState {
    /// No document materialized.
    Idle,
    /// Document materialized at some edit index.
    Seeked,
    PlayingForward,
    PlayingBackward,
}

/// Direction of a play loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// Why a play loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Reached the end (forward) or the start (backward) of the log.
    Boundary,
    /// `pause` was called.
    Paused,
}

/// Summary of a finished play loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaybackOutcome {
    pub direction: Direction,
    pub reason: StopReason,
    /// Edit index when the loop stopped.
    pub final_index: usize,
    /// Steps taken by this loop.
    pub steps: usize,
}

/// Events emitted by the playback engine.
///
/// `index` is the number of edits reflected in `document`; `timestamp` is
/// the timestamp of the last of them (`None` at index 0).
pub enum PlaybackEvent<D> {
    /// The engine jumped to a new position.
    Seek {
        index: usize,
        total: usize,
        timestamp: Option<Timestamp>,
        document: Arc<D>,
    },

    /// One step of playback. `edit` is the edit applied (forward) or
    /// rolled back (backward).
    Playback {
        direction: Direction,
        index: usize,
        total: usize,
        timestamp: Option<Timestamp>,
        edit: VersionedEdit,
        document: Arc<D>,
    },

    /// A play loop ended.
    Stop {
        reason: StopReason,
        index: usize,
        total: usize,
        timestamp: Option<Timestamp>,
        document: Option<Arc<D>>,
    },

    /// Playback speed changed.
    SpeedChange { speed: f64 },
}

impl<D> PlaybackEvent<D> {
    /// Edit index carried by the event, if any.
    pub fn index(&self) -> Option<usize> {
        match self {
            PlaybackEvent::Seek { index, .. }
            | PlaybackEvent::Playback { index, .. }
            | PlaybackEvent::Stop { index, .. } => Some(*index),
            PlaybackEvent::SpeedChange { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlaybackEvent::Seek { .. } => "seek",
            PlaybackEvent::Playback { .. } => "playback",
            PlaybackEvent::Stop { .. } => "stop",
            PlaybackEvent::SpeedChange { .. } => "speed-change",
        }
    }
}

impl<D> Clone for PlaybackEvent<D> {
    fn clone(&self) -> Self {
        match self {
            PlaybackEvent::Seek {
                index,
                total,
                timestamp,
                document,
            } => PlaybackEvent::Seek {
                index: *index,
                total: *total,
                timestamp: *timestamp,
                document: Arc::clone(document),
            },
            PlaybackEvent::Playback {
                direction,
                index,
                total,
                timestamp,
                edit,
                document,
            } => PlaybackEvent::Playback {
                direction: *direction,
                index: *index,
                total: *total,
                timestamp: *timestamp,
                edit: edit.clone(),
                document: Arc::clone(document),
            },
            PlaybackEvent::Stop {
                reason,
                index,
                total,
                timestamp,
                document,
            } => PlaybackEvent::Stop {
                reason: *reason,
                index: *index,
                total: *total,
                timestamp: *timestamp,
                document: document.clone(),
            },
            PlaybackEvent::SpeedChange { speed } => PlaybackEvent::SpeedChange { speed: *speed },
        }
    }
}

impl<D> fmt::Debug for PlaybackEvent<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackEvent::SpeedChange { speed } => {
                f.debug_struct("SpeedChange").field("speed", speed).finish()
            }
            PlaybackEvent::Playback {
                direction, index, edit, ..
            } => f
                .debug_struct("Playback")
                .field("direction", direction)
                .field("index", index)
                .field("edit", &edit.id)
                .finish(),
            other => f
                .debug_struct(other.kind())
                .field("index", &other.index())
                .finish(),
        }
    }
}
