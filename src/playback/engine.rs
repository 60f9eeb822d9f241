//! The playback engine.

use crate::document::Document;
use crate::error::{HistoryError, Result};
use crate::subscriptions::{EventReceiver, ObserverRegistry, SubscriptionId};
use crate::types::{Snapshot, Timestamp, VersionedEdit};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::reconstruct::{pacing_delay, reconstruct_at_timestamp, reconstruct_count};
use super::types::{
    Direction, PlaybackConfig, PlaybackEvent, PlaybackOutcome, PlaybackState, StopReason,
};

/// Position of the engine in the log.
struct Cursor<D> {
    /// Number of edits reflected in `document`.
    index: usize,
    /// Materialized document, shared copy-on-write with event receivers.
    document: Option<Arc<D>>,
    state: PlaybackState,
    /// Direction of the last play loop, used by `resume`.
    direction: Direction,
}

/// Releases the single-flight flag on drop.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Reconstructs historical document states and plays through them.
///
/// The engine never keeps the edit or snapshot log between calls: every
/// operation takes the caller's current log. Its own state is the cursor
/// (index, document, lifecycle state), the speed and the play flags.
///
/// Operations that move the cursor are single-flight: while one runs
/// (including a play loop), the others fail with
/// [`HistoryError::PlaybackBusy`]. `pause`, speed changes, subscriptions
/// and accessors never block on a running loop.
pub struct PlaybackEngine<D: Document> {
    config: PlaybackConfig,
    cursor: Mutex<Cursor<D>>,
    speed: RwLock<f64>,
    /// Cleared by `pause`; checked between steps.
    should_continue: AtomicBool,
    playing: AtomicBool,
    busy: AtomicBool,
    /// Wakes a loop sleeping between edits.
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    observers: ObserverRegistry<PlaybackEvent<D>>,
}

impl<D: Document> PlaybackEngine<D> {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    /// Create an engine. Non-positive initial speeds fall back to 1.0.
    pub fn with_config(config: PlaybackConfig) -> Self {
        let speed = if config.initial_speed.is_finite() && config.initial_speed > 0.0 {
            config.initial_speed
        } else {
            1.0
        };
        let (wake_tx, wake_rx) = bounded(1);

        Self {
            config,
            cursor: Mutex::new(Cursor {
                index: 0,
                document: None,
                state: PlaybackState::Idle,
                direction: Direction::Forward,
            }),
            speed: RwLock::new(speed),
            should_continue: AtomicBool::new(false),
            playing: AtomicBool::new(false),
            busy: AtomicBool::new(false),
            wake_tx,
            wake_rx,
            observers: ObserverRegistry::new(),
        }
    }

    // --- Seeking ---

    /// Materialize the document as of `target`. Returns the new index.
    pub fn seek_to_timestamp(
        &self,
        target: Timestamp,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<usize> {
        let _busy = self.acquire()?;
        let (document, index) = reconstruct_at_timestamp::<D>(target, edits, snapshots)?;
        self.settle(index, document, edits);
        Ok(index)
    }

    /// Materialize the document with edits `0..=index` applied.
    /// The resulting cursor index is `index + 1`.
    pub fn seek_to_edit_index(
        &self,
        index: usize,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<usize> {
        if index >= edits.len() {
            return Err(HistoryError::InvalidIndex {
                index,
                len: edits.len(),
            });
        }
        let _busy = self.acquire()?;
        let document = reconstruct_count::<D>(index + 1, edits, snapshots)?;
        self.settle(index + 1, document, edits);
        Ok(index + 1)
    }

    /// Jump to index 0: the base snapshot if one covers no edits, else an
    /// empty document.
    pub fn seek_to_start(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<usize> {
        let _busy = self.acquire()?;
        let document = reconstruct_count::<D>(0, edits, snapshots)?;
        self.settle(0, document, edits);
        Ok(0)
    }

    /// Jump to the timestamp of the last edit.
    pub fn seek_to_end(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<usize> {
        match edits.last() {
            Some(last) => self.seek_to_timestamp(last.timestamp, edits, snapshots),
            None => self.seek_to_start(edits, snapshots),
        }
    }

    // --- Stepping ---

    /// Apply the next edit. A no-op at the end of the log.
    pub fn step_forward(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<usize> {
        let _busy = self.acquire()?;
        self.forward_one(edits, snapshots)?;
        let mut cursor = self.cursor.lock();
        cursor.state = PlaybackState::Seeked;
        Ok(cursor.index)
    }

    /// Roll back the last applied edit by rebuilding from the nearest
    /// snapshot. A no-op at index 0.
    pub fn step_backward(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<usize> {
        let _busy = self.acquire()?;
        self.backward_one(edits, snapshots)?;
        let mut cursor = self.cursor.lock();
        if cursor.document.is_none() {
            let document = reconstruct_count::<D>(cursor.index, edits, snapshots)?;
            cursor.document = Some(Arc::new(document));
        }
        cursor.state = PlaybackState::Seeked;
        Ok(cursor.index)
    }

    // --- Auto-play ---

    /// Play forward from the current index until the end of the log or
    /// `pause`. Blocks the calling thread for the duration of the loop.
    pub fn play_forward(
        &self,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<PlaybackOutcome> {
        self.run(Direction::Forward, edits, snapshots)
    }

    /// Play backward from the current index until the start of the log or
    /// `pause`. Blocks the calling thread for the duration of the loop.
    pub fn play_backward(
        &self,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<PlaybackOutcome> {
        self.run(Direction::Backward, edits, snapshots)
    }

    /// Continue playing in the direction of the last play loop (forward if
    /// there was none) from the current index.
    pub fn resume(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<PlaybackOutcome> {
        let direction = self.cursor.lock().direction;
        self.run(direction, edits, snapshots)
    }

    /// Ask a running play loop to stop at its next check.
    pub fn pause(&self) {
        self.should_continue.store(false, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        let _ = self.wake_tx.try_send(());
    }

    // --- Speed ---

    /// Set the pacing divisor for subsequent waits.
    pub fn set_playback_speed(&self, speed: f64) -> Result<()> {
        if !speed.is_finite() || speed <= 0.0 {
            return Err(HistoryError::InvalidSpeed(speed));
        }
        *self.speed.write() = speed;
        tracing::debug!(speed, "playback speed changed");
        self.observers.notify(&PlaybackEvent::SpeedChange { speed });
        Ok(())
    }

    pub fn playback_speed(&self) -> f64 {
        *self.speed.read()
    }

    // --- State ---

    /// Return to Idle, dropping the materialized document.
    pub fn reset(&self) -> Result<()> {
        let _busy = self.acquire()?;
        let mut cursor = self.cursor.lock();
        cursor.index = 0;
        cursor.document = None;
        cursor.state = PlaybackState::Idle;
        cursor.direction = Direction::Forward;
        Ok(())
    }

    pub fn current_index(&self) -> usize {
        self.cursor.lock().index
    }

    pub fn state(&self) -> PlaybackState {
        self.cursor.lock().state
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// The materialized document, if any.
    pub fn document(&self) -> Option<Arc<D>> {
        self.cursor.lock().document.clone()
    }

    /// Text of the materialized document, if any.
    pub fn content(&self) -> Option<String> {
        self.document().map(|d| d.text())
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    // --- Subscriptions ---

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&PlaybackEvent<D>) + Send + Sync + 'static,
    {
        self.observers.subscribe(callback)
    }

    /// Receive playback events over a bounded channel.
    pub fn channel(&self, buffer_size: usize) -> EventReceiver<PlaybackEvent<D>> {
        self.observers.subscribe_channel(buffer_size)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.observers.unsubscribe(id)
    }

    // --- Internals ---

    fn acquire(&self) -> Result<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| HistoryError::PlaybackBusy)?;
        Ok(BusyGuard(&self.busy))
    }

    /// Install a freshly materialized document and announce it.
    fn settle(&self, index: usize, document: D, edits: &[VersionedEdit]) {
        let document = Arc::new(document);
        {
            let mut cursor = self.cursor.lock();
            cursor.index = index;
            cursor.document = Some(Arc::clone(&document));
            cursor.state = PlaybackState::Seeked;
        }

        tracing::debug!(index, total = edits.len(), "seeked");

        self.observers.notify(&PlaybackEvent::Seek {
            index,
            total: edits.len(),
            timestamp: timestamp_at(edits, index),
            document,
        });
    }

    /// Make sure the cursor holds a document consistent with `edits`.
    fn materialize(
        &self,
        cursor: &mut Cursor<D>,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<()> {
        if cursor.index > edits.len() {
            // The caller's log shrank underneath us
            cursor.index = edits.len();
            cursor.document = None;
        }
        if cursor.document.is_none() {
            let document = reconstruct_count::<D>(cursor.index, edits, snapshots)?;
            cursor.document = Some(Arc::new(document));
        }
        Ok(())
    }

    /// Apply one edit. Returns false at the end of the log.
    fn forward_one(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<bool> {
        let event = {
            let mut cursor = self.cursor.lock();
            self.materialize(&mut cursor, edits, snapshots)?;

            let Some(edit) = edits.get(cursor.index) else {
                return Ok(false);
            };
            if let Some(document) = cursor.document.as_mut() {
                Arc::make_mut(document).apply_delta(&edit.delta)?;
            }
            cursor.index += 1;

            PlaybackEvent::Playback {
                direction: Direction::Forward,
                index: cursor.index,
                total: edits.len(),
                timestamp: Some(edit.timestamp),
                edit: edit.clone(),
                document: cursor
                    .document
                    .clone()
                    .unwrap_or_else(|| Arc::new(D::empty())),
            }
        };

        self.observers.notify(&event);
        Ok(true)
    }

    /// Roll back one edit. Returns false at index 0.
    fn backward_one(&self, edits: &[VersionedEdit], snapshots: &[Snapshot]) -> Result<bool> {
        let event = {
            let mut cursor = self.cursor.lock();
            if cursor.index > edits.len() {
                cursor.index = edits.len();
                cursor.document = None;
            }
            if cursor.index == 0 {
                return Ok(false);
            }

            let undone = &edits[cursor.index - 1];
            let target = cursor.index - 1;
            // Deltas cannot be inverted; rebuild up to the lower index
            let document = Arc::new(reconstruct_count::<D>(target, edits, snapshots)?);
            cursor.index = target;
            cursor.document = Some(Arc::clone(&document));

            PlaybackEvent::Playback {
                direction: Direction::Backward,
                index: target,
                total: edits.len(),
                timestamp: timestamp_at(edits, target),
                edit: undone.clone(),
                document,
            }
        };

        self.observers.notify(&event);
        Ok(true)
    }

    fn run(
        &self,
        direction: Direction,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<PlaybackOutcome> {
        let _busy = self.acquire()?;

        // Discard wake-ups left over from an earlier pause
        while self.wake_rx.try_recv().is_ok() {}
        self.should_continue.store(true, Ordering::SeqCst);
        self.playing.store(true, Ordering::SeqCst);

        let start_index = {
            let mut cursor = self.cursor.lock();
            cursor.direction = direction;
            cursor.state = match direction {
                Direction::Forward => PlaybackState::PlayingForward,
                Direction::Backward => PlaybackState::PlayingBackward,
            };
            cursor.index
        };

        tracing::info!(?direction, start_index, total = edits.len(), "playback started");

        let result = match direction {
            Direction::Forward => self.forward_loop(edits, snapshots),
            Direction::Backward => self.backward_loop(edits, snapshots),
        };

        self.playing.store(false, Ordering::SeqCst);
        self.should_continue.store(false, Ordering::SeqCst);

        let (index, document) = {
            let mut cursor = self.cursor.lock();
            cursor.state = if cursor.document.is_some() {
                PlaybackState::Seeked
            } else {
                PlaybackState::Idle
            };
            (cursor.index, cursor.document.clone())
        };

        let reason = match &result {
            Ok((reason, _)) => *reason,
            Err(_) => StopReason::Paused,
        };

        tracing::info!(?direction, ?reason, index, "playback stopped");

        self.observers.notify(&PlaybackEvent::Stop {
            reason,
            index,
            total: edits.len(),
            timestamp: timestamp_at(edits, index.min(edits.len())),
            document,
        });

        let (reason, steps) = result?;
        Ok(PlaybackOutcome {
            direction,
            reason,
            final_index: index,
            steps,
        })
    }

    fn forward_loop(
        &self,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<(StopReason, usize)> {
        let mut steps = 0;
        loop {
            if !self.should_continue.load(Ordering::SeqCst) {
                return Ok((StopReason::Paused, steps));
            }
            if !self.forward_one(edits, snapshots)? {
                return Ok((StopReason::Boundary, steps));
            }
            steps += 1;

            let index = self.current_index();
            if index >= edits.len() {
                return Ok((StopReason::Boundary, steps));
            }

            let delay = pacing_delay(
                edits[index - 1].timestamp,
                edits[index].timestamp,
                self.playback_speed(),
                self.config.max_delay,
            );
            if !self.wait(delay) {
                return Ok((StopReason::Paused, steps));
            }
        }
    }

    fn backward_loop(
        &self,
        edits: &[VersionedEdit],
        snapshots: &[Snapshot],
    ) -> Result<(StopReason, usize)> {
        let mut steps = 0;
        loop {
            if !self.should_continue.load(Ordering::SeqCst) {
                return Ok((StopReason::Paused, steps));
            }
            if !self.backward_one(edits, snapshots)? {
                return Ok((StopReason::Boundary, steps));
            }
            steps += 1;

            let index = self.current_index();
            if index == 0 {
                return Ok((StopReason::Boundary, steps));
            }

            // Gap between the edit now on top and the one just rolled back
            let delay = pacing_delay(
                edits[index - 1].timestamp,
                edits[index].timestamp,
                self.playback_speed(),
                self.config.max_delay,
            );
            if !self.wait(delay) {
                return Ok((StopReason::Paused, steps));
            }
        }
    }

    /// Sleep for `delay` unless paused first. Returns whether to continue.
    fn wait(&self, delay: Duration) -> bool {
        tracing::trace!(delay_ms = delay.as_millis() as u64, "waiting before next edit");

        let deadline = Instant::now() + delay;
        loop {
            if !self.should_continue.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            match self.wake_rx.recv_timeout(deadline - now) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return self.should_continue.load(Ordering::SeqCst)
                }
            }
        }
    }
}

/// Timestamp of the last edit reflected at `index`.
fn timestamp_at(edits: &[VersionedEdit], index: usize) -> Option<Timestamp> {
    index.checked_sub(1).and_then(|i| edits.get(i)).map(|e| e.timestamp)
}

impl<D: Document> Default for PlaybackEngine<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Document> fmt::Debug for PlaybackEngine<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cursor = self.cursor.lock();
        f.debug_struct("PlaybackEngine")
            .field("index", &cursor.index)
            .field("state", &cursor.state)
            .field("speed", &*self.speed.read())
            .field("playing", &self.is_playing())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::TextDocument;
    use crate::types::{EditId, OperationKind, PositionHint};

    /// Edits appending one char each, `gap_ms` apart.
    fn letters(n: usize, gap_ms: i64) -> Vec<VersionedEdit> {
        let mut doc = TextDocument::new(1);
        (0..n)
            .map(|i| {
                let letter = ((b'a' + (i % 26) as u8) as char).to_string();
                let delta = doc.insert(i, &letter).unwrap();
                VersionedEdit {
                    id: EditId(format!("e{}", i)),
                    timestamp: Timestamp(gap_ms * i as i64),
                    actor_id: 1,
                    actor_name: "ada".into(),
                    operation: OperationKind::Insert,
                    position: PositionHint {
                        container: "content".into(),
                        offset: i,
                    },
                    content: Some(letter),
                    content_length: Some(1),
                    delta,
                }
            })
            .collect()
    }

    #[test]
    fn test_starts_idle() {
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.document().is_none());
    }

    #[test]
    fn test_seek_to_start_on_empty_log() {
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        assert_eq!(engine.seek_to_start(&[], &[]).unwrap(), 0);
        assert_eq!(engine.content().as_deref(), Some(""));
        assert_eq!(engine.state(), PlaybackState::Seeked);
    }

    #[test]
    fn test_seek_to_end_on_empty_log() {
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        assert_eq!(engine.seek_to_end(&[], &[]).unwrap(), 0);
        assert_eq!(engine.content().as_deref(), Some(""));
    }

    #[test]
    fn test_seek_to_edit_index() {
        let edits = letters(5, 10);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        assert_eq!(engine.seek_to_edit_index(2, &edits, &[]).unwrap(), 3);
        assert_eq!(engine.content().as_deref(), Some("abc"));

        assert!(matches!(
            engine.seek_to_edit_index(5, &edits, &[]),
            Err(HistoryError::InvalidIndex { index: 5, len: 5 })
        ));
        assert!(matches!(
            engine.seek_to_edit_index(0, &[], &[]),
            Err(HistoryError::InvalidIndex { index: 0, len: 0 })
        ));
    }

    #[test]
    fn test_seek_to_edit_index_with_shared_timestamps() {
        // Every edit in the same millisecond
        let edits = letters(4, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        assert_eq!(engine.seek_to_edit_index(1, &edits, &[]).unwrap(), 2);
        assert_eq!(engine.content().as_deref(), Some("ab"));
    }

    #[test]
    fn test_step_after_seek() {
        let edits = letters(60, 10);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        engine.seek_to_edit_index(50, &edits, &[]).unwrap();
        assert_eq!(engine.current_index(), 51);

        assert_eq!(engine.step_forward(&edits, &[]).unwrap(), 52);
        assert_eq!(engine.content().unwrap().chars().count(), 52);

        assert_eq!(engine.step_backward(&edits, &[]).unwrap(), 51);
        assert_eq!(engine.step_backward(&edits, &[]).unwrap(), 50);
        assert_eq!(engine.content().unwrap().chars().count(), 50);
    }

    #[test]
    fn test_step_boundaries_are_noops() {
        let edits = letters(2, 10);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        assert_eq!(engine.step_backward(&edits, &[]).unwrap(), 0);
        assert_eq!(engine.content().as_deref(), Some(""));

        engine.seek_to_end(&edits, &[]).unwrap();
        assert_eq!(engine.step_forward(&edits, &[]).unwrap(), 2);
        assert_eq!(engine.content().as_deref(), Some("ab"));
    }

    #[test]
    fn test_step_forward_from_idle() {
        let edits = letters(3, 10);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        assert_eq!(engine.step_forward(&edits, &[]).unwrap(), 1);
        assert_eq!(engine.content().as_deref(), Some("a"));
        assert_eq!(engine.state(), PlaybackState::Seeked);
    }

    #[test]
    fn test_speed_validation() {
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        assert!(matches!(engine.set_playback_speed(0.0), Err(HistoryError::InvalidSpeed(_))));
        assert!(matches!(engine.set_playback_speed(-1.0), Err(HistoryError::InvalidSpeed(_))));
        assert!(matches!(
            engine.set_playback_speed(f64::NAN),
            Err(HistoryError::InvalidSpeed(_))
        ));

        engine.set_playback_speed(2.0).unwrap();
        assert_eq!(engine.playback_speed(), 2.0);
    }

    #[test]
    fn test_play_forward_without_gaps_reaches_end() {
        let edits = letters(5, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        let receiver = engine.channel(64);

        let outcome = engine.play_forward(&edits, &[]).unwrap();
        assert_eq!(outcome.reason, StopReason::Boundary);
        assert_eq!(outcome.final_index, 5);
        assert_eq!(outcome.steps, 5);
        assert_eq!(engine.content().as_deref(), Some("abcde"));
        assert_eq!(engine.state(), PlaybackState::Seeked);
        assert!(!engine.is_playing());

        let kinds: Vec<_> = receiver.drain().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), 6);
        assert!(kinds[..5].iter().all(|k| *k == "playback"));
        assert_eq!(kinds[5], "stop");
    }

    #[test]
    fn test_play_backward_rebuilds_to_start() {
        let edits = letters(4, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_end(&edits, &[]).unwrap();

        let outcome = engine.play_backward(&edits, &[]).unwrap();
        assert_eq!(outcome.direction, Direction::Backward);
        assert_eq!(outcome.final_index, 0);
        assert_eq!(outcome.steps, 4);
        assert_eq!(engine.content().as_deref(), Some(""));
    }

    #[test]
    fn test_play_at_end_stops_immediately() {
        let edits = letters(2, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_end(&edits, &[]).unwrap();

        let events = engine.channel(8);
        let outcome = engine.play_forward(&edits, &[]).unwrap();
        assert_eq!(outcome.steps, 0);
        assert_eq!(outcome.final_index, 2);

        let drained = events.drain();
        assert_eq!(drained.len(), 1);
        assert!(matches!(drained[0], PlaybackEvent::Stop { index: 2, .. }));
    }

    #[test]
    fn test_speed_change_event() {
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        let events = engine.channel(8);

        engine.set_playback_speed(4.0).unwrap();
        match events.try_recv().unwrap() {
            PlaybackEvent::SpeedChange { speed } => assert_eq!(speed, 4.0),
            other => panic!("Expected SpeedChange, got {:?}", other),
        }
    }

    #[test]
    fn test_events_hold_their_own_document() {
        let edits = letters(3, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        let events = engine.channel(8);

        engine.step_forward(&edits, &[]).unwrap();
        engine.step_forward(&edits, &[]).unwrap();

        let drained = events.drain();
        let texts: Vec<String> = drained
            .iter()
            .filter_map(|e| match e {
                PlaybackEvent::Playback { document, .. } => Some(document.text()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["a", "ab"]);
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let edits = letters(3, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_end(&edits, &[]).unwrap();

        engine.reset().unwrap();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.current_index(), 0);
        assert!(engine.content().is_none());
    }

    #[test]
    fn test_shrunken_log_is_handled() {
        let edits = letters(5, 0);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_end(&edits, &[]).unwrap();

        let shorter = &edits[..2];
        assert_eq!(engine.step_forward(shorter, &[]).unwrap(), 2);
        assert_eq!(engine.content().as_deref(), Some("ab"));
    }
}
