//! The edit recorder.

use crate::document::{Document, PresenceSource, UpdateStream, UpdateSubscription};
use crate::error::{HistoryError, Result};
use crate::export::HistoryExport;
use crate::persist::HistorySink;
use crate::playback::reconstruct_count;
use crate::snapshots::SnapshotStore;
use crate::subscriptions::{EventReceiver, ObserverRegistry, SubscriptionId};
use crate::types::{EditId, PositionHint, Snapshot, Timestamp, VersionedEdit};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::{Arc, Weak};

use super::classify::classify;

/// Display name used when the presence source has no local state.
const ANONYMOUS: &str = "Anonymous";

/// Recorder configuration. Fixed at construction.
#[derive(Clone, Debug)]
pub struct RecorderConfig {
    /// Capture a snapshot every N edits.
    /// Default: 100
    pub snapshot_interval: usize,

    /// Key of the shared text container, reported in position hints.
    /// Default: "content"
    pub container_key: String,

    /// Chars captured for an insert whose text could not be isolated.
    /// Default: 50
    pub fallback_capture_chars: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: 100,
            container_key: "content".to_string(),
            fallback_capture_chars: 50,
        }
    }
}

impl RecorderConfig {
    pub fn with_snapshot_interval(snapshot_interval: usize) -> Self {
        Self {
            snapshot_interval,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.snapshot_interval == 0 {
            return Err(HistoryError::InvalidConfig(
                "snapshot_interval must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

/// Delivered to recorder subscribers after every change to the logs.
#[derive(Clone, Debug)]
pub struct RecorderEvent {
    pub edits: Arc<Vec<VersionedEdit>>,
    pub snapshots: Arc<Vec<Snapshot>>,
}

/// Mutable recorder state, guarded by one lock.
struct RecorderState<D> {
    /// Document as of the last recorded delta.
    shadow: D,
    edits: Arc<Vec<VersionedEdit>>,
    snapshots: SnapshotStore,
    /// Monotonic counter folded into edit ids.
    counter: u64,
    actor_id: u64,
    last_timestamp: Timestamp,
    tracking: bool,
    /// Bumped by every `initialize`; stale handles leave newer sessions alone.
    session: u64,
}

/// Records the edit history of one document.
pub struct EditRecorder<D: Document> {
    config: RecorderConfig,
    state: Mutex<RecorderState<D>>,
    presence: RwLock<Option<Arc<dyn PresenceSource>>>,
    sinks: RwLock<Vec<Arc<dyn HistorySink>>>,
    observers: ObserverRegistry<RecorderEvent>,
}

impl<D: Document> EditRecorder<D> {
    /// Create a recorder. Fails if the configuration is invalid.
    pub fn new(config: RecorderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            state: Mutex::new(RecorderState {
                shadow: D::empty(),
                edits: Arc::new(Vec::new()),
                snapshots: SnapshotStore::new(),
                counter: 0,
                actor_id: 0,
                last_timestamp: Timestamp(0),
                tracking: false,
                session: 0,
            }),
            presence: RwLock::new(None),
            sinks: RwLock::new(Vec::new()),
            observers: ObserverRegistry::new(),
        })
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    /// Start tracking `document`.
    ///
    /// Seeds the shadow copy from the document's current state, captures
    /// the initial snapshot and subscribes to the document's updates.
    /// Tracking ends when the returned handle is stopped or dropped.
    /// Initializing again replaces the previous session; its handle then
    /// no longer affects the recorder.
    pub fn initialize<S>(self: &Arc<Self>, document: &S, presence: Arc<dyn PresenceSource>) -> Result<Tracking<D>>
    where
        S: UpdateStream + Document,
    {
        let shadow = D::from_state(&document.encode_full_state())?;

        let (snapshot, event, session) = {
            let mut state = self.state.lock();
            state.shadow = shadow;
            state.actor_id = document.client_id();
            state.tracking = true;
            state.session += 1;

            let count = state.edits.len();
            let st = &mut *state;
            let at = Timestamp::now().max(st.last_timestamp);
            let snapshot = st.snapshots.capture(&st.shadow, count, at);
            // Later edits must not predate the base they replay onto
            st.last_timestamp = snapshot.timestamp;
            *self.presence.write() = Some(presence);
            (snapshot, Self::event_from(st), st.session)
        };

        tracing::info!(
            actor_id = document.client_id(),
            doc_length = snapshot.doc_length,
            snapshot_interval = self.config.snapshot_interval,
            "edit tracking started"
        );

        self.forward_snapshot(&snapshot);
        self.observers.notify(&event);

        let weak: Weak<Self> = Arc::downgrade(self);
        let subscription = document.observe_updates(move |update| {
            let Some(recorder) = weak.upgrade() else {
                return;
            };
            if !recorder.is_session(session) {
                return;
            }
            if let Err(e) = recorder.record_delta(&update.delta, update.origin.as_deref()) {
                tracing::warn!(error = %e, "failed to record delta");
            }
        });

        Ok(Tracking {
            recorder: Arc::downgrade(self),
            subscription: Some(subscription),
            session,
        })
    }

    /// Record one delta.
    ///
    /// Called by the update subscription; may also be called directly to
    /// feed deltas that arrive by other means. A delta that the shadow
    /// document rejects is not recorded.
    pub fn record_delta(&self, delta: &[u8], origin: Option<&str>) -> Result<VersionedEdit> {
        let actor_name = self
            .presence
            .read()
            .as_ref()
            .and_then(|p| p.local_state())
            .map(|s| s.user.name)
            .unwrap_or_else(|| ANONYMOUS.to_string());

        let (edit, snapshot, event) = {
            let mut state = self.state.lock();

            let before = state.shadow.text();
            state.shadow.apply_delta(delta)?;
            let after = state.shadow.text();

            let classification = classify(&before, &after, self.config.fallback_capture_chars);

            // Keep the log in non-decreasing time order even if the clock steps back
            let timestamp = Timestamp::now().max(state.last_timestamp);
            state.last_timestamp = timestamp;
            state.counter += 1;

            let edit = VersionedEdit {
                id: EditId::compose(state.actor_id, timestamp, state.counter),
                timestamp,
                actor_id: state.actor_id,
                actor_name,
                operation: classification.operation,
                position: PositionHint {
                    container: self.config.container_key.clone(),
                    offset: classification.offset,
                },
                content: classification.content,
                content_length: classification.content_length,
                delta: delta.to_vec(),
            };

            Arc::make_mut(&mut state.edits).push(edit.clone());
            let count = state.edits.len();

            let snapshot = if count % self.config.snapshot_interval == 0 {
                let st = &mut *state;
                // Stamped with the edit it follows
                Some(st.snapshots.capture(&st.shadow, count, timestamp))
            } else {
                None
            };

            tracing::debug!(
                id = %edit.id,
                operation = %edit.operation,
                offset = edit.position.offset,
                origin = origin.unwrap_or(""),
                count,
                "recorded edit"
            );

            (edit, snapshot, Self::event_from(&state))
        };

        self.forward_edit(&edit);
        if let Some(snapshot) = &snapshot {
            self.forward_snapshot(snapshot);
        }
        self.observers.notify(&event);

        Ok(edit)
    }

    /// All recorded edits, oldest first.
    pub fn edits(&self) -> Arc<Vec<VersionedEdit>> {
        Arc::clone(&self.state.lock().edits)
    }

    /// All snapshots, oldest first.
    pub fn snapshots(&self) -> Arc<Vec<Snapshot>> {
        self.state.lock().snapshots.shared()
    }

    pub fn edit_count(&self) -> usize {
        self.state.lock().edits.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.state.lock().snapshots.len()
    }

    /// Whether a document is currently being tracked.
    pub fn is_tracking(&self) -> bool {
        self.state.lock().tracking
    }

    /// Current text of the shadow document.
    pub fn current_text(&self) -> String {
        self.state.lock().shadow.text()
    }

    /// Drop both logs and reset counters.
    ///
    /// While tracking, a fresh base snapshot of the current document is
    /// captured so later reconstructions start from it.
    pub fn clear(&self) {
        let (snapshot, event) = {
            let mut state = self.state.lock();
            state.edits = Arc::new(Vec::new());
            state.snapshots.clear();
            state.counter = 0;
            state.last_timestamp = Timestamp(0);

            let snapshot = if state.tracking {
                let st = &mut *state;
                let snapshot = st.snapshots.capture(&st.shadow, 0, Timestamp::now());
                st.last_timestamp = snapshot.timestamp;
                Some(snapshot)
            } else {
                None
            };
            (snapshot, Self::event_from(&state))
        };

        tracing::info!("edit history cleared");

        if let Some(snapshot) = &snapshot {
            self.forward_snapshot(snapshot);
        }
        self.observers.notify(&event);
    }

    /// Export both logs.
    pub fn export(&self) -> HistoryExport {
        let state = self.state.lock();
        HistoryExport {
            edits: state.edits.as_ref().clone(),
            snapshots: state.snapshots.as_slice().to_vec(),
            export_time: Timestamp::now(),
        }
    }

    /// Replace both logs with an export.
    ///
    /// The shadow document is rebuilt from the imported history so that
    /// subsequently recorded deltas classify against it.
    pub fn import(&self, export: HistoryExport) -> Result<()> {
        let mut snapshots = SnapshotStore::new();
        for snapshot in export.snapshots.iter().cloned() {
            snapshots.push(snapshot)?;
        }
        for pair in export.edits.windows(2) {
            if pair[1].timestamp < pair[0].timestamp {
                return Err(HistoryError::InvalidOperation(format!(
                    "edit {} is older than its predecessor {}",
                    pair[1].id, pair[0].id
                )));
            }
        }

        let shadow: D = reconstruct_count(export.edits.len(), &export.edits, snapshots.as_slice())?;

        let event = {
            let mut state = self.state.lock();
            state.shadow = shadow;
            state.counter = export.edits.len() as u64;
            let last_edit = export.edits.last().map(|e| e.timestamp);
            let last_snapshot = snapshots.latest().map(|s| s.timestamp);
            state.last_timestamp = last_edit.max(last_snapshot).unwrap_or(Timestamp(0));
            state.edits = Arc::new(export.edits);
            state.snapshots = snapshots;
            Self::event_from(&state)
        };

        tracing::info!(
            edits = event.edits.len(),
            snapshots = event.snapshots.len(),
            "edit history imported"
        );

        self.observers.notify(&event);
        Ok(())
    }

    // --- Subscriptions ---

    /// Register a callback invoked after every change to the logs.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&RecorderEvent) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Receive recorder events over a bounded channel.
    pub fn channel(&self, buffer_size: usize) -> EventReceiver<RecorderEvent> {
        self.observers.subscribe_channel(buffer_size)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.observers.len()
    }

    // --- Persistence ---

    /// Forward every subsequent edit and snapshot to a sink.
    pub fn add_sink(&self, sink: Arc<dyn HistorySink>) {
        self.sinks.write().push(sink);
    }

    /// Flush every sink.
    pub fn flush_sinks(&self) -> Result<()> {
        for sink in self.sinks.read().iter() {
            sink.flush()?;
        }
        Ok(())
    }

    fn forward_edit(&self, edit: &VersionedEdit) {
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.append_edit(edit) {
                tracing::warn!(id = %edit.id, error = %e, "history sink rejected edit");
            }
        }
    }

    fn forward_snapshot(&self, snapshot: &Snapshot) {
        for sink in self.sinks.read().iter() {
            if let Err(e) = sink.store_snapshot(snapshot) {
                tracing::warn!(id = %snapshot.id, error = %e, "history sink rejected snapshot");
            }
        }
    }

    fn is_session(&self, session: u64) -> bool {
        let state = self.state.lock();
        state.tracking && state.session == session
    }

    fn stop_tracking(&self, session: u64) {
        {
            let mut state = self.state.lock();
            if state.session != session {
                tracing::debug!(session, current = state.session, "stale tracking handle released");
                return;
            }
            state.tracking = false;
            *self.presence.write() = None;
        }
        tracing::info!("edit tracking stopped");
    }

    fn event_from(state: &RecorderState<D>) -> RecorderEvent {
        RecorderEvent {
            edits: Arc::clone(&state.edits),
            snapshots: state.snapshots.shared(),
        }
    }
}

impl<D: Document> fmt::Debug for EditRecorder<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("EditRecorder")
            .field("edits", &state.edits.len())
            .field("snapshots", &state.snapshots.len())
            .field("tracking", &state.tracking)
            .field("subscribers", &self.observers.len())
            .finish()
    }
}

/// Teardown handle returned by [`EditRecorder::initialize`].
///
/// Dropping it unsubscribes from the document.
pub struct Tracking<D: Document> {
    recorder: Weak<EditRecorder<D>>,
    subscription: Option<UpdateSubscription>,
    session: u64,
}

impl<D: Document> Tracking<D> {
    /// Stop recording deltas from the document.
    pub fn stop(mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            if let Some(recorder) = self.recorder.upgrade() {
                recorder.stop_tracking(self.session);
            }
        }
    }
}

impl<D: Document> Drop for Tracking<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{StaticPresence, TextDocument};
    use crate::types::OperationKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn recorder(interval: usize) -> Arc<EditRecorder<TextDocument>> {
        Arc::new(EditRecorder::new(RecorderConfig::with_snapshot_interval(interval)).unwrap())
    }

    fn presence(name: &str) -> Arc<dyn PresenceSource> {
        Arc::new(StaticPresence::new(name, "#123456"))
    }

    #[test]
    fn test_zero_interval_rejected() {
        let result = EditRecorder::<TextDocument>::new(RecorderConfig::with_snapshot_interval(0));
        assert!(matches!(result, Err(HistoryError::InvalidConfig(_))));
    }

    #[test]
    fn test_single_insert() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(7);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "hello").unwrap();

        let edits = recorder.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].operation, OperationKind::Insert);
        assert_eq!(edits[0].content.as_deref(), Some("hello"));
        assert_eq!(edits[0].actor_id, 7);
        assert_eq!(edits[0].actor_name, "ada");
        assert_eq!(edits[0].position.container, "content");
    }

    #[test]
    fn test_initial_snapshot_captured() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        doc.insert(0, "existing").unwrap();

        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        let snapshots = recorder.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].edit_index, -1);
        assert_eq!(snapshots[0].doc_length, 8);
    }

    #[test]
    fn test_classifies_delete_and_withholds_content() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "secret text").unwrap();
        doc.delete(0, 7).unwrap();

        let edits = recorder.edits();
        assert_eq!(edits[1].operation, OperationKind::Delete);
        assert_eq!(edits[1].content, None);
        assert_eq!(edits[1].content_length, Some(7));
    }

    #[test]
    fn test_pure_formatting_records_unknown() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "plain").unwrap();
        doc.format(0, 5, "bold", Some("true")).unwrap();
        doc.replace(0, 1, "P").unwrap();

        let kinds: Vec<_> = recorder.edits().iter().map(|e| e.operation).collect();
        assert_eq!(
            kinds,
            vec![OperationKind::Insert, OperationKind::Unknown, OperationKind::Format]
        );
    }

    #[test]
    fn test_snapshot_cadence() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        for i in 0..100 {
            doc.insert(i, "x").unwrap();
        }

        let snapshots = recorder.snapshots();
        assert!(snapshots.len() >= 1);
        assert_eq!(snapshots.last().unwrap().edit_index, 99);
        assert_eq!(snapshots.last().unwrap().doc_length, 100);
    }

    #[test]
    fn test_ids_unique_within_same_millisecond() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        for _ in 0..50 {
            doc.insert(0, "a").unwrap();
        }

        let edits = recorder.edits();
        let mut ids: Vec<_> = edits.iter().map(|e| e.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 50);
        assert!(edits.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn test_subscribers_notified_synchronously() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        recorder.subscribe(move |event| {
            counter.store(event.edits.len(), Ordering::SeqCst);
        });

        doc.insert(0, "a").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        doc.insert(0, "b").unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_stop_tracking() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "a").unwrap();
        tracking.stop();
        doc.insert(0, "b").unwrap();

        assert_eq!(recorder.edit_count(), 1);
        assert!(!recorder.is_tracking());
    }

    #[test]
    fn test_stale_handle_leaves_newer_session() {
        let recorder = recorder(100);
        let mut first = TextDocument::new(1);
        let mut second = TextDocument::new(2);

        let old = recorder.initialize(&first, presence("ada")).unwrap();
        let _current = recorder.initialize(&second, presence("grace")).unwrap();

        // The replaced session no longer records
        first.insert(0, "x").unwrap();
        assert_eq!(recorder.edit_count(), 0);

        drop(old);
        assert!(recorder.is_tracking());

        second.insert(0, "y").unwrap();
        let edits = recorder.edits();
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].actor_id, 2);
        assert_eq!(edits[0].actor_name, "grace");
    }

    #[test]
    fn test_edits_never_predate_base_snapshot() {
        let recorder = recorder(100);
        let ahead = Timestamp(Timestamp::now().0 + 3_600_000);
        recorder
            .import(HistoryExport {
                edits: Vec::new(),
                snapshots: vec![Snapshot {
                    id: crate::types::SnapshotId("snapshot-ahead".into()),
                    timestamp: ahead,
                    state: TextDocument::empty().encode_full_state(),
                    edit_index: -1,
                    doc_length: 0,
                }],
                export_time: ahead,
            })
            .unwrap();

        let mut doc = TextDocument::new(1);
        doc.insert(0, "draft").unwrap();
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();
        doc.insert(5, " two").unwrap();

        let edits = recorder.edits();
        let snapshots = recorder.snapshots();
        let base = snapshots.last().unwrap();
        assert_eq!(base.doc_length, 5);
        assert!(edits[0].timestamp >= base.timestamp);

        let (at, index) = crate::playback::reconstruct_at_timestamp::<TextDocument>(
            edits[0].timestamp,
            &edits,
            &snapshots,
        )
        .unwrap();
        assert_eq!(index, 1);
        assert_eq!(at.text(), "draft two");
    }

    #[test]
    fn test_clear_while_tracking_rebases() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "kept").unwrap();
        recorder.clear();
        doc.insert(4, "!").unwrap();

        let edits = recorder.edits();
        let snapshots = recorder.snapshots();
        assert_eq!(edits.len(), 1);
        assert_eq!(snapshots.len(), 1);
        assert!(edits[0].timestamp >= snapshots[0].timestamp);

        let replayed: TextDocument = reconstruct_count(1, &edits, &snapshots).unwrap();
        assert_eq!(replayed.text(), "kept!");
    }

    #[test]
    fn test_absent_presence_is_anonymous() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder
            .initialize(&doc, Arc::new(StaticPresence::absent()))
            .unwrap();

        doc.insert(0, "a").unwrap();
        assert_eq!(recorder.edits()[0].actor_name, ANONYMOUS);
    }

    #[test]
    fn test_presence_read_at_delivery() {
        let recorder = recorder(100);
        let mut doc = TextDocument::new(1);
        let presence = Arc::new(StaticPresence::new("ada", "#000"));
        let _tracking = recorder.initialize(&doc, presence.clone()).unwrap();

        doc.insert(0, "a").unwrap();
        presence.set_name("grace");
        doc.insert(1, "b").unwrap();

        let names: Vec<_> = recorder.edits().iter().map(|e| e.actor_name.clone()).collect();
        assert_eq!(names, vec!["ada", "grace"]);
    }

    #[test]
    fn test_clear_resets_and_rebases() {
        let recorder = recorder(2);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        doc.insert(0, "ab").unwrap();
        doc.insert(2, "cd").unwrap();
        assert_eq!(recorder.snapshot_count(), 2);

        recorder.clear();
        assert_eq!(recorder.edit_count(), 0);
        assert_eq!(recorder.snapshot_count(), 1);
        assert_eq!(recorder.snapshots()[0].edit_index, -1);
        assert_eq!(recorder.snapshots()[0].doc_length, 4);

        doc.insert(4, "e").unwrap();
        assert!(recorder.edits()[0].id.0.ends_with("-1"));
    }

    #[test]
    fn test_bad_delta_not_recorded() {
        let recorder = recorder(100);
        let doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();

        assert!(recorder.record_delta(&[0xc1], None).is_err());
        assert_eq!(recorder.edit_count(), 0);
    }

    #[test]
    fn test_export_import() {
        let recorder = recorder(2);
        let mut doc = TextDocument::new(1);
        let _tracking = recorder.initialize(&doc, presence("ada")).unwrap();
        doc.insert(0, "hello").unwrap();
        doc.insert(5, " world").unwrap();
        doc.delete(0, 1).unwrap();

        let export = recorder.export();
        assert_eq!(export.edits.len(), 3);

        let restored = self::recorder(2);
        restored.import(export).unwrap();
        assert_eq!(restored.edit_count(), 3);
        assert_eq!(restored.current_text(), "ello world");
    }
}
