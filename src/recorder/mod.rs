//! Edit recording.
//!
//! The recorder subscribes to a document's delta stream. For every delta
//! it renders the text before and after (on a private shadow copy of the
//! document), classifies the change, appends an immutable
//! [`VersionedEdit`](crate::types::VersionedEdit), captures a snapshot every
//! `snapshot_interval` edits, and synchronously notifies subscribers.
//!
//! Deltas are processed one at a time on the thread that delivers them,
//! without batching or backpressure. Classification costs two renders and
//! a diff, so it is linear in document length per delta.
//!
//! # Example
//!
//! ```ignore
//! let recorder = Arc::new(EditRecorder::new(RecorderConfig::default())?);
//! let presence = Arc::new(StaticPresence::new("ada", "#ff0000"));
//!
//! let mut doc = TextDocument::new(1);
//! let tracking = recorder.initialize(&doc, presence)?;
//!
//! doc.insert(0, "hello")?;
//! assert_eq!(recorder.edits()[0].content.as_deref(), Some("hello"));
//!
//! tracking.stop();
//! ```

mod classify;
mod tracker;

pub use classify::{classify, Classification};
pub use tracker::{EditRecorder, RecorderConfig, RecorderEvent, Tracking};
