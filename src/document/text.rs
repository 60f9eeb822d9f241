//! Sequential text document with formatting marks.

use crate::error::{HistoryError, Result};
use crate::subscriptions::ObserverRegistry;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Weak};

use super::{Document, DocumentUpdate, UpdateStream, UpdateSubscription};

/// A formatting attribute over the char range `start..end`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatMark {
    pub start: usize,
    pub end: usize,
    pub key: String,
    pub value: String,
}

/// Full document state.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextState {
    pub text: String,
    pub marks: Vec<FormatMark>,
}

/// Operation carried by a delta. Indices are char offsets.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TextOperation {
    /// Insert text at index (clamped to the text length).
    Insert { index: usize, text: String },

    /// Remove `len` chars from index.
    Delete { index: usize, len: usize },

    /// Set (`Some`) or clear (`None`) an attribute over a range.
    Format {
        index: usize,
        len: usize,
        key: String,
        value: Option<String>,
    },

    /// Replace the whole state.
    Load(TextState),
}

/// Wire form of a delta.
#[derive(Clone, Debug, Serialize, Deserialize)]
struct TextDelta {
    client: u64,
    ops: Vec<TextOperation>,
}

/// Reference document: a single shared text container with marks.
///
/// Every applied delta (local or remote) is published to update
/// observers. Clones share no observers.
pub struct TextDocument {
    client_id: u64,
    chars: Vec<char>,
    marks: Vec<FormatMark>,
    updates: Arc<ObserverRegistry<DocumentUpdate>>,
}

impl TextDocument {
    pub fn new(client_id: u64) -> Self {
        Self {
            client_id,
            chars: Vec::new(),
            marks: Vec::new(),
            updates: Arc::new(ObserverRegistry::new()),
        }
    }

    /// Insert text at a char index. Returns the emitted delta.
    pub fn insert(&mut self, index: usize, text: &str) -> Result<Vec<u8>> {
        self.transact(
            vec![TextOperation::Insert {
                index,
                text: text.to_string(),
            }],
            None,
        )
    }

    /// Delete `len` chars starting at a char index.
    pub fn delete(&mut self, index: usize, len: usize) -> Result<Vec<u8>> {
        self.transact(vec![TextOperation::Delete { index, len }], None)
    }

    /// Replace `len` chars at index with `text`, as one delta.
    pub fn replace(&mut self, index: usize, len: usize, text: &str) -> Result<Vec<u8>> {
        self.transact(
            vec![
                TextOperation::Delete { index, len },
                TextOperation::Insert {
                    index,
                    text: text.to_string(),
                },
            ],
            None,
        )
    }

    /// Set or clear a formatting attribute over a range.
    pub fn format(
        &mut self,
        index: usize,
        len: usize,
        key: &str,
        value: Option<&str>,
    ) -> Result<Vec<u8>> {
        self.transact(
            vec![TextOperation::Format {
                index,
                len,
                key: key.to_string(),
                value: value.map(str::to_string),
            }],
            None,
        )
    }

    /// Apply a batch of operations as one delta and publish it.
    pub fn transact(
        &mut self,
        ops: Vec<TextOperation>,
        origin: Option<&str>,
    ) -> Result<Vec<u8>> {
        let delta = encode_delta(self.client_id, ops)?;
        self.apply_delta_with_origin(&delta, origin)?;
        Ok(delta)
    }

    /// Apply a remote delta, tagging the published update with an origin.
    pub fn apply_delta_with_origin(&mut self, delta: &[u8], origin: Option<&str>) -> Result<()> {
        let decoded: TextDelta = rmp_serde::from_slice(delta)?;
        for op in decoded.ops {
            self.apply_operation(op);
        }

        if !self.updates.is_empty() {
            self.updates.notify(&DocumentUpdate {
                delta: delta.to_vec(),
                origin: origin.map(str::to_string),
            });
        }
        Ok(())
    }

    /// Current state (text and marks).
    pub fn state(&self) -> TextState {
        TextState {
            text: self.chars.iter().collect(),
            marks: self.marks.clone(),
        }
    }

    pub fn marks(&self) -> &[FormatMark] {
        &self.marks
    }

    fn apply_operation(&mut self, op: TextOperation) {
        match op {
            TextOperation::Insert { index, text } => {
                let index = index.min(self.chars.len());
                let inserted: Vec<char> = text.chars().collect();
                let n = inserted.len();
                if n == 0 {
                    return;
                }
                self.chars.splice(index..index, inserted);

                for mark in &mut self.marks {
                    if mark.start >= index {
                        mark.start += n;
                        mark.end += n;
                    } else if mark.end > index {
                        mark.end += n;
                    }
                }
            }

            TextOperation::Delete { index, len } => {
                let start = index.min(self.chars.len());
                let end = index.saturating_add(len).min(self.chars.len());
                if start >= end {
                    return;
                }
                self.chars.drain(start..end);

                let removed = end - start;
                let shift = |p: usize| {
                    if p <= start {
                        p
                    } else if p >= end {
                        p - removed
                    } else {
                        start
                    }
                };
                for mark in &mut self.marks {
                    mark.start = shift(mark.start);
                    mark.end = shift(mark.end);
                }
                self.marks.retain(|m| m.start < m.end);
            }

            TextOperation::Format {
                index,
                len,
                key,
                value,
            } => {
                let start = index.min(self.chars.len());
                let end = index.saturating_add(len).min(self.chars.len());
                if start >= end {
                    return;
                }

                // Cut the range out of existing marks with the same key
                let mut kept = Vec::with_capacity(self.marks.len() + 1);
                for mark in self.marks.drain(..) {
                    if mark.key != key || mark.end <= start || mark.start >= end {
                        kept.push(mark);
                        continue;
                    }
                    if mark.start < start {
                        kept.push(FormatMark {
                            start: mark.start,
                            end: start,
                            key: mark.key.clone(),
                            value: mark.value.clone(),
                        });
                    }
                    if mark.end > end {
                        kept.push(FormatMark {
                            start: end,
                            end: mark.end,
                            key: mark.key,
                            value: mark.value,
                        });
                    }
                }
                if let Some(value) = value {
                    kept.push(FormatMark {
                        start,
                        end,
                        key,
                        value,
                    });
                }
                kept.sort_by(|a, b| (a.start, &a.key).cmp(&(b.start, &b.key)));
                self.marks = kept;
            }

            TextOperation::Load(state) => {
                self.chars = state.text.chars().collect();
                let len = self.chars.len();
                self.marks = state
                    .marks
                    .into_iter()
                    .filter(|m| m.start < m.end && m.end <= len)
                    .collect();
            }
        }
    }
}

fn encode_delta(client: u64, ops: Vec<TextOperation>) -> Result<Vec<u8>> {
    rmp_serde::to_vec_named(&TextDelta { client, ops }).map_err(HistoryError::from)
}

impl Clone for TextDocument {
    fn clone(&self) -> Self {
        Self {
            client_id: self.client_id,
            chars: self.chars.clone(),
            marks: self.marks.clone(),
            updates: Arc::new(ObserverRegistry::new()),
        }
    }
}

impl fmt::Debug for TextDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextDocument")
            .field("client_id", &self.client_id)
            .field("len", &self.chars.len())
            .field("marks", &self.marks.len())
            .field("observers", &self.updates.len())
            .finish()
    }
}

impl Default for TextDocument {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Document for TextDocument {
    fn empty() -> Self {
        Self::default()
    }

    fn client_id(&self) -> u64 {
        self.client_id
    }

    fn encode_full_state(&self) -> Vec<u8> {
        // Encoding a plain struct into a Vec cannot fail
        encode_delta(self.client_id, vec![TextOperation::Load(self.state())]).unwrap_or_default()
    }

    fn apply_delta(&mut self, delta: &[u8]) -> Result<()> {
        self.apply_delta_with_origin(delta, None)
    }

    fn text(&self) -> String {
        self.chars.iter().collect()
    }

    fn len(&self) -> usize {
        self.chars.len()
    }
}

impl UpdateStream for TextDocument {
    fn observe_updates<F>(&self, callback: F) -> UpdateSubscription
    where
        F: Fn(&DocumentUpdate) + Send + Sync + 'static,
    {
        let id = self.updates.subscribe(callback);
        let registry: Weak<ObserverRegistry<DocumentUpdate>> = Arc::downgrade(&self.updates);
        UpdateSubscription::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.unsubscribe(id);
            }
        })
    }
}
