//! Integration tests for journaled edits shared between tree replicas.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use montage_core::{FrameRange, MediaType};
use montage_timeline::{Item, ItemAction, Journal, Marker};

use crate::fixtures::{frames, gap, reference_edit, Reference, FPS};

// ── Helpers ────────────────────────────────────────────────────

/// A batch of edits on the main track followed by a refresh.
fn edit_session(edit: &mut Reference) -> Journal {
    let mut journal = Journal::new();
    let track = edit.timeline.find_item_mut(edit.main_track).unwrap();
    journal.append(track.insert(2, gap("Gap-003", 2)).unwrap());
    journal.append(track.splice(0, 4, 5).unwrap());
    journal.append(track.set_name("Picture"));

    let clip = edit.timeline.find_item_mut(edit.c001).unwrap();
    let marker = Marker::new(FrameRange::from_frames(4, 1, FPS)).with_name("sync");
    journal.append(clip.add_marker(marker));
    journal.append(clip.set_flag("#ff0000"));

    journal.append(edit.timeline.refresh(usize::MAX));
    journal
}

/// Journals travel between replicas as JSON text.
fn over_the_wire(journal: &Journal) -> Journal {
    let text = serde_json::to_string(&journal.to_json().unwrap()).unwrap();
    Journal::from_json(&serde_json::from_str(&text).unwrap()).unwrap()
}

fn resolved_names(item: &Item) -> Vec<Option<String>> {
    (0..item.trimmed_frame_duration().frames())
        .map(|f| {
            item.resolve_time(frames(f), MediaType::Image, &HashSet::new(), false)
                .map(|(leaf, _)| leaf.name().to_string())
        })
        .collect()
}

// ── Local edits ────────────────────────────────────────────────

#[test]
fn session_changes_track_layout_and_duration() {
    let mut edit = reference_edit();
    edit_session(&mut edit);

    let track = edit.timeline.find_item(edit.main_track).unwrap();
    let names: Vec<&str> = track.children().iter().map(Item::name).collect();
    assert_eq!(names, ["Clip-004", "Clip-001", "Nested Stack-002", "Gap-003", "Gap-001"]);
    assert_eq!(track.name(), "Picture");
    assert_eq!(edit.timeline.trimmed_duration(), frames(21));
    assert_eq!(edit.timeline.find_item(edit.c001).unwrap().markers().len(), 1);
}

#[test]
fn undo_restores_and_redo_reapplies() {
    let mut edit = reference_edit();
    let before = edit.timeline.clone();
    let journal = edit_session(&mut edit);
    let after = edit.timeline.clone();

    edit.timeline.undo(&journal);
    assert_eq!(edit.timeline, before);
    assert_eq!(resolved_names(&edit.timeline), resolved_names(&before));

    edit.timeline.redo(&journal);
    assert_eq!(edit.timeline, after);
}

#[test]
fn inverted_journal_replays_as_undo() {
    let mut edit = reference_edit();
    let before = edit.timeline.clone();
    let journal = edit_session(&mut edit);

    edit.timeline.redo(&journal.inverted());
    assert_eq!(edit.timeline, before);
}

#[test]
fn structural_edits_mark_items_dirty() {
    let mut edit = reference_edit();
    let track = edit.timeline.find_item_mut(edit.main_track).unwrap();
    let journal = track.insert(0, gap("Lead", 1)).unwrap();

    assert!(track.is_dirty());
    assert!(journal.iter().any(|e| e.redo.action() == ItemAction::MarkDirty));
    edit.timeline.refresh(usize::MAX);
    assert!(!edit.timeline.find_item(edit.main_track).unwrap().is_dirty());
}

// ── Replicas ───────────────────────────────────────────────────

#[test]
fn replica_converges_after_update() {
    let mut edit = reference_edit();
    let mut replica = edit.timeline.clone();
    let journal = edit_session(&mut edit);

    let result = replica.update(&over_the_wire(&journal));
    assert!(result.is_complete());
    assert_eq!(result.applied, journal.event_ids());
    assert_eq!(replica, edit.timeline);
    assert_eq!(resolved_names(&replica), resolved_names(&edit.timeline));
}

#[test]
fn replica_refresh_after_update_is_a_no_op() {
    let mut edit = reference_edit();
    let mut replica = edit.timeline.clone();
    let journal = edit_session(&mut edit);

    replica.update(&journal);
    assert!(replica.find_item(edit.main_track).unwrap().is_dirty());
    assert!(replica.refresh(usize::MAX).is_empty());
}

#[test]
fn foreign_journal_is_reported_unapplied() {
    let mut edit = reference_edit();
    let journal = edit_session(&mut edit);

    let mut unrelated = reference_edit().timeline;
    let before = unrelated.clone();
    let result = unrelated.update(&journal);

    assert!(!result.is_complete());
    assert!(result.applied.is_empty());
    assert_eq!(result.unapplied.len(), journal.len());
    assert_eq!(unrelated, before);
}

#[test]
fn replica_callbacks_fire_per_applied_event() {
    let mut edit = reference_edit();
    let mut replica = edit.timeline.clone();
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    replica.bind_event_callback(
        move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        },
        true,
    );

    let journal = edit_session(&mut edit);
    replica.update(&journal);
    assert_eq!(seen.load(Ordering::SeqCst), journal.len());

    replica.unbind_event_callback();
    replica.update(&edit.timeline.find_item_mut(edit.c004).unwrap().set_enabled(false));
    assert_eq!(seen.load(Ordering::SeqCst), journal.len());
}
