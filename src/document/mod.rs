//! The document collaborator.
//!
//! The recorder and the playback engine only need a handful of
//! capabilities from the underlying document model: encode the full
//! state, apply an opaque delta, render the shared text container as a
//! plain string, and (for recording) observe the stream of deltas. Those
//! capabilities are the [`Document`] and [`UpdateStream`] traits.
//!
//! [`TextDocument`] is a sequential reference implementation. Its deltas
//! are MessagePack-encoded operation batches. It does not merge concurrent
//! edits.

mod presence;
mod text;

pub use presence::{PresenceSource, PresenceState, PresenceUser, StaticPresence};
pub use text::{FormatMark, TextDocument, TextOperation, TextState};

use crate::error::Result;
use std::fmt;

/// A delta delivered by a document's update stream.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentUpdate {
    /// Opaque encoded delta.
    pub delta: Vec<u8>,
    /// Transaction origin, if the producer set one.
    pub origin: Option<String>,
}

/// Minimal document capability set.
///
/// `apply_delta` must be deterministic: applying the same deltas in the
/// same order to equal states yields equal states. Applying the output of
/// `encode_full_state` to an empty document reproduces the document.
pub trait Document: Clone + Send + Sync + 'static {
    /// A fresh, empty document.
    fn empty() -> Self;

    /// Identifier of the local actor.
    fn client_id(&self) -> u64;

    /// Encode the full document state as a delta.
    fn encode_full_state(&self) -> Vec<u8>;

    /// Apply an encoded delta in place.
    fn apply_delta(&mut self, delta: &[u8]) -> Result<()>;

    /// Plain string rendering of the shared text container.
    fn text(&self) -> String;

    /// Length of the shared text container in chars.
    fn len(&self) -> usize {
        self.text().chars().count()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Build a document from an encoded full state.
    fn from_state(state: &[u8]) -> Result<Self> {
        let mut document = Self::empty();
        document.apply_delta(state)?;
        Ok(document)
    }
}

/// A document that publishes every delta applied to it.
pub trait UpdateStream {
    /// Register a callback for every subsequent delta. The callback stays
    /// registered until the returned subscription is cancelled or dropped.
    fn observe_updates<F>(&self, callback: F) -> UpdateSubscription
    where
        F: Fn(&DocumentUpdate) + Send + Sync + 'static;
}

/// Registration on an [`UpdateStream`]; dropping it unsubscribes.
pub struct UpdateSubscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl UpdateSubscription {
    pub fn new<F>(cancel: F) -> Self
    where
        F: FnOnce() + Send + Sync + 'static,
    {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Unsubscribe now.
    pub fn cancel(mut self) {
        self.run_cancel();
    }

    fn run_cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for UpdateSubscription {
    fn drop(&mut self) {
        self.run_cancel();
    }
}

impl fmt::Debug for UpdateSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateSubscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}
