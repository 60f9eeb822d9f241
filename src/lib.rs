//! # Edit Chronicle
//!
//! Records every change made to a collaborative text document as an
//! immutable, timestamped, attributed edit, and reconstructs or replays the
//! document at any point of that history.
//!
//! ## Core Concepts
//!
//! - **Edits**: One [`VersionedEdit`] per delta, classified as insert,
//!   delete, format or unknown, carrying the raw delta for replay
//! - **Snapshots**: Full document state every N edits, bounding replay cost
//! - **Playback**: Seek to a timestamp or edit index, step, or auto-play
//!   paced by the recorded gaps between edits
//! - **Sinks**: Optional durable storage for edits and snapshots
//!
//! ## Example
//!
//! ```ignore
//! use edit_chronicle::{EditRecorder, PlaybackEngine, RecorderConfig, StaticPresence, TextDocument};
//! use std::sync::Arc;
//!
//! let recorder = Arc::new(EditRecorder::<TextDocument>::new(RecorderConfig::default())?);
//! let mut doc = TextDocument::new(1);
//! let tracking = recorder.initialize(&doc, Arc::new(StaticPresence::new("ada", "#f00")))?;
//!
//! doc.insert(0, "Hello")?;
//! doc.insert(5, ", world")?;
//!
//! let engine = PlaybackEngine::<TextDocument>::new();
//! let edits = recorder.edits();
//! let snapshots = recorder.snapshots();
//! engine.seek_to_edit_index(0, &edits, &snapshots)?;
//! assert_eq!(engine.content().as_deref(), Some("Hello"));
//!
//! tracking.stop();
//! ```

pub mod document;
pub mod error;
pub mod export;
pub mod persist;
pub mod playback;
pub mod query;
pub mod recorder;
pub mod snapshots;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use document::{
    Document, DocumentUpdate, PresenceSource, PresenceState, PresenceUser, StaticPresence,
    TextDocument, TextOperation, TextState, UpdateStream, UpdateSubscription,
};
pub use error::{HistoryError, Result};
pub use export::HistoryExport;
pub use persist::{EditLogFile, FileSink, FileSinkConfig, HistorySink, SnapshotBlobStore};
pub use playback::{
    pacing_delay, reconstruct_at_timestamp, reconstruct_count, Direction, PlaybackConfig,
    PlaybackEngine, PlaybackEvent, PlaybackOutcome, PlaybackState, StopReason,
};
pub use query::{HistoryStats, TimelineGroup};
pub use recorder::{classify, Classification, EditRecorder, RecorderConfig, RecorderEvent, Tracking};
pub use snapshots::SnapshotStore;
pub use subscriptions::{EventReceiver, ObserverRegistry, SubscriptionId};
pub use types::*;
