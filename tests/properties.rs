//! Property tests for reconstruction.

use edit_chronicle::{
    reconstruct_at_timestamp, reconstruct_count, Document, EditRecorder, PlaybackEngine,
    RecorderConfig, StaticPresence, TextDocument, VersionedEdit, Snapshot,
};
use proptest::prelude::*;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Action {
    Insert { at: usize, text: String },
    Delete { at: usize, len: usize },
    Format { at: usize, len: usize, bold: bool },
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => (0usize..64, "[a-z ]{1,6}").prop_map(|(at, text)| Action::Insert { at, text }),
        1 => (0usize..64, 1usize..5).prop_map(|(at, len)| Action::Delete { at, len }),
        1 => (0usize..64, 1usize..5, any::<bool>())
            .prop_map(|(at, len, bold)| Action::Format { at, len, bold }),
    ]
}

/// Record a session of actions and return its logs and final text.
fn record(actions: &[Action], interval: usize) -> (Vec<VersionedEdit>, Vec<Snapshot>, String) {
    record_onto("", actions, interval)
}

/// Like `record`, but the document already holds `seed` when tracking starts.
fn record_onto(
    seed: &str,
    actions: &[Action],
    interval: usize,
) -> (Vec<VersionedEdit>, Vec<Snapshot>, String) {
    let recorder = Arc::new(
        EditRecorder::<TextDocument>::new(RecorderConfig::with_snapshot_interval(interval)).unwrap(),
    );
    let mut doc = TextDocument::new(1);
    if !seed.is_empty() {
        doc.insert(0, seed).unwrap();
    }
    let tracking = recorder
        .initialize(&doc, Arc::new(StaticPresence::new("ada", "#000")))
        .unwrap();

    for action in actions {
        match action {
            Action::Insert { at, text } => {
                let at = (*at).min(doc.len());
                doc.insert(at, text).unwrap();
            }
            Action::Delete { at, len } => {
                let at = (*at).min(doc.len());
                doc.delete(at, *len).unwrap();
            }
            Action::Format { at, len, bold } => {
                let value = if *bold { Some("true") } else { None };
                doc.format(*at, *len, "bold", value).unwrap();
            }
        }
    }
    tracking.stop();

    (
        recorder.edits().as_ref().clone(),
        recorder.snapshots().as_ref().clone(),
        doc.text(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_delta_is_recorded(actions in prop::collection::vec(action(), 0..40)) {
        let (edits, _, _) = record(&actions, 5);
        prop_assert_eq!(edits.len(), actions.len());
    }

    #[test]
    fn prop_full_replay_matches_live_document(
        seed in "[a-z]{0,8}",
        actions in prop::collection::vec(action(), 1..40),
    ) {
        let (edits, snapshots, live) = record_onto(&seed, &actions, 4);

        let replayed: TextDocument = reconstruct_count(edits.len(), &edits, &snapshots).unwrap();
        prop_assert_eq!(replayed.text(), live.clone());

        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_end(&edits, &snapshots).unwrap();
        prop_assert_eq!(engine.content(), Some(live));
    }

    #[test]
    fn prop_snapshots_do_not_change_results(
        actions in prop::collection::vec(action(), 1..40),
        interval in 1usize..8,
    ) {
        let (edits, snapshots, _) = record(&actions, interval);

        for count in 0..=edits.len() {
            let with: TextDocument = reconstruct_count(count, &edits, &snapshots).unwrap();
            let without: TextDocument = reconstruct_count(count, &edits, &[]).unwrap();
            prop_assert_eq!(with.state(), without.state());
        }

        if let Some(last) = edits.last() {
            let (with, i) =
                reconstruct_at_timestamp::<TextDocument>(last.timestamp, &edits, &snapshots).unwrap();
            let (without, j) =
                reconstruct_at_timestamp::<TextDocument>(last.timestamp, &edits, &[]).unwrap();
            prop_assert_eq!(i, j);
            prop_assert_eq!(with.text(), without.text());
        }
    }

    #[test]
    fn prop_reconstruction_is_deterministic(actions in prop::collection::vec(action(), 1..30)) {
        let (edits, snapshots, _) = record(&actions, 3);
        let count = edits.len() / 2;

        let a: TextDocument = reconstruct_count(count, &edits, &snapshots).unwrap();
        let b: TextDocument = reconstruct_count(count, &edits, &snapshots).unwrap();
        prop_assert_eq!(a.encode_full_state(), b.encode_full_state());
    }

    #[test]
    fn prop_every_path_to_an_index_agrees(
        seed in "[a-z]{1,8}",
        actions in prop::collection::vec(action(), 1..20),
        interval in 1usize..6,
    ) {
        let (edits, snapshots, _) = record_onto(&seed, &actions, interval);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();

        // Walk up from the start
        engine.seek_to_start(&edits, &snapshots).unwrap();
        prop_assert_eq!(engine.content(), Some(seed.clone()));
        let mut upward = vec![engine.content()];
        while engine.current_index() < edits.len() {
            engine.step_forward(&edits, &snapshots).unwrap();
            upward.push(engine.content());
        }

        // Walk down from the end
        let mut downward = vec![engine.content()];
        while engine.current_index() > 0 {
            engine.step_backward(&edits, &snapshots).unwrap();
            downward.push(engine.content());
        }
        downward.reverse();
        prop_assert_eq!(&upward, &downward);

        for i in 0..edits.len() {
            engine.seek_to_edit_index(i, &edits, &snapshots).unwrap();
            prop_assert_eq!(engine.content(), upward[i + 1].clone());
        }
    }

    #[test]
    fn prop_steps_move_index_by_one(
        seed in "[a-z]{0,8}",
        actions in prop::collection::vec(action(), 1..25),
        moves in prop::collection::vec(any::<bool>(), 1..40),
    ) {
        let (edits, snapshots, _) = record_onto(&seed, &actions, 3);
        let engine: PlaybackEngine<TextDocument> = PlaybackEngine::new();
        engine.seek_to_start(&edits, &snapshots).unwrap();

        for forward in moves {
            let before = engine.current_index();
            let after = if forward {
                engine.step_forward(&edits, &snapshots).unwrap()
            } else {
                engine.step_backward(&edits, &snapshots).unwrap()
            };

            let expected = match (forward, before) {
                (true, b) if b == edits.len() => b,
                (true, b) => b + 1,
                (false, 0) => 0,
                (false, b) => b - 1,
            };
            prop_assert_eq!(after, expected);

            let direct: TextDocument = reconstruct_count(after, &edits, &snapshots[..1]).unwrap();
            prop_assert_eq!(engine.content(), Some(direct.text()));
        }
    }
}
