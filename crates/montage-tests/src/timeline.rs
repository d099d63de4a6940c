//! Integration tests for the timeline model.
//!
//! Exercises refresh, resolution, layout and persistence on a nested edit
//! built from montage-core time types.

use std::collections::HashSet;

use montage_core::{MediaType, TickDuration};
use montage_timeline::{Item, ItemType, TimelineFile};
use uuid::Uuid;

use crate::fixtures::{frames, reference_edit, Reference};

// ── Helpers ────────────────────────────────────────────────────

fn find(reference: &Reference, uuid: Uuid) -> &Item {
    reference.timeline.find_item(uuid).unwrap()
}

fn resolve(item: &Item, frame: i64) -> Option<(Uuid, TickDuration)> {
    item.resolve_time(frames(frame), MediaType::Image, &HashSet::new(), false)
        .map(|(leaf, time)| (leaf.uuid(), time))
}

// ── Refresh ────────────────────────────────────────────────────

#[test]
fn nested_track_keeps_active_range_over_refreshed_span() {
    let edit = reference_edit();
    let t003 = find(&edit, edit.nested_track_003);
    assert_eq!(t003.active_duration(), Some(frames(10)));
    assert_eq!(t003.available_duration(), Some(frames(12)));
}

#[test]
fn track_duration_is_sum_of_children() {
    let edit = reference_edit();
    let t002 = find(&edit, edit.nested_track_002);
    assert_eq!(t002.trimmed_duration(), frames(16));
    assert_eq!(t002.available_duration(), Some(frames(16)));
}

#[test]
fn stack_duration_is_longest_child() {
    let edit = reference_edit();
    let s002 = find(&edit, edit.nested_stack);
    assert_eq!(s002.active_duration(), Some(frames(6)));
    assert_eq!(s002.available_duration(), Some(frames(16)));
}

#[test]
fn timeline_duration_is_19_frames() {
    let edit = reference_edit();
    assert_eq!(find(&edit, edit.main_track).trimmed_duration(), frames(19));
    assert_eq!(find(&edit, edit.stack).trimmed_duration(), frames(19));
    assert_eq!(edit.timeline.trimmed_duration(), frames(19));
    assert_eq!(edit.timeline.available_duration(), Some(frames(19)));
    assert_eq!(edit.timeline.trimmed_frame_duration().frames(), 19);
}

#[test]
fn refresh_is_idempotent() {
    let mut edit = reference_edit();
    assert!(edit.timeline.refresh(usize::MAX).is_empty());
    assert!(!edit.timeline.is_dirty());
}

#[test]
fn reference_edit_is_valid() {
    let edit = reference_edit();
    assert!(edit.timeline.valid());
    assert_eq!(edit.timeline.find_all_items(ItemType::Clip, None).len(), 5);
    assert_eq!(edit.timeline.find_all_items(ItemType::Gap, None).len(), 2);
}

// ── Resolution ─────────────────────────────────────────────────

#[test]
fn clip_maps_parent_time_into_media() {
    let edit = reference_edit();
    let c003 = find(&edit, edit.c003);
    assert_eq!(resolve(c003, 0), Some((edit.c003, frames(100))));
}

#[test]
fn offset_track_resolves_through_active_range() {
    let edit = reference_edit();
    let t003 = find(&edit, edit.nested_track_003);
    assert_eq!(resolve(t003, 0), Some((edit.c005, frames(101))));
    assert_eq!(resolve(t003, 8), Some((edit.c006, frames(3))));
    assert_eq!(resolve(t003, 10), None);
}

#[test]
fn leading_gap_resolves_to_nothing() {
    let edit = reference_edit();
    let t002 = find(&edit, edit.nested_track_002);
    assert_eq!(resolve(t002, 0), None);
    assert_eq!(resolve(t002, 7), Some((edit.c003, frames(100))));
}

#[test]
fn nested_stack_falls_through_to_lower_track() {
    let edit = reference_edit();
    let s002 = find(&edit, edit.nested_stack);
    assert_eq!(resolve(s002, 0), Some((edit.c005, frames(103))));
    assert_eq!(resolve(s002, 5), Some((edit.c003, frames(100))));
    assert_eq!(resolve(s002, 6), None);
}

#[test]
fn timeline_resolves_every_frame() {
    let edit = reference_edit();
    let tl = &edit.timeline;

    assert_eq!(resolve(tl, 0), Some((edit.c001, frames(3))));
    assert_eq!(resolve(tl, 3), Some((edit.c005, frames(103))));
    assert_eq!(resolve(tl, 8), Some((edit.c003, frames(100))));
    assert_eq!(resolve(tl, 9), None);
    assert_eq!(resolve(tl, 12), None);
    assert_eq!(resolve(tl, 13), Some((edit.c004, frames(100))));
    assert_eq!(resolve(tl, 18), Some((edit.c004, frames(105))));
    assert_eq!(resolve(tl, 19), None);
}

#[test]
fn focus_on_nested_track_reaches_under_upper_track() {
    let edit = reference_edit();
    let focus = HashSet::from([edit.nested_track_003]);

    // Frame 8 is Clip-003 on the upper nested track without focus.
    let (leaf, time) = edit
        .timeline
        .resolve_time(frames(8), MediaType::Image, &focus, false)
        .unwrap();
    assert_eq!(leaf.uuid(), edit.c005);
    assert_eq!(time, frames(108));

    // Frames outside the focused track fall back to whatever is visible.
    let (leaf, _) = edit
        .timeline
        .resolve_time(frames(0), MediaType::Image, &focus, false)
        .unwrap();
    assert_eq!(leaf.uuid(), edit.c001);
}

#[test]
fn raw_resolution_lists_occluded_layers() {
    let edit = reference_edit();
    let layers = edit
        .timeline
        .resolve_time_raw(frames(8), MediaType::Image, &HashSet::new());
    let uuids: Vec<Uuid> = layers.iter().map(|(leaf, _)| leaf.uuid()).collect();
    assert_eq!(uuids, [edit.c003, edit.c005]);
}

#[test]
fn audio_resolution_ignores_video_tracks() {
    let edit = reference_edit();
    assert_eq!(
        edit.timeline
            .resolve_time(frames(0), MediaType::Audio, &HashSet::new(), false),
        None
    );
}

// ── Indexing & layout ──────────────────────────────────────────

#[test]
fn track_frame_lookup() {
    let edit = reference_edit();
    let track = find(&edit, edit.main_track);
    assert_eq!(track.frame_at_index(1), 3);
    assert_eq!(track.frame_at_index(3), 13);
    assert_eq!(track.item_at_frame(14), Some((3, 101)));
}

#[test]
fn layout_places_nested_stack_beside_first_clip() {
    let edit = reference_edit();
    let tl = &edit.timeline;
    assert_eq!(tl.height(), 2);
    assert_eq!(tl.layout_box(edit.nested_stack), Some(((3, 0), (9, 2))));
    assert_eq!(tl.top_left(edit.c004), Some((13, 0)));
    assert_eq!(tl.top_left(edit.c006), Some((12, 1)));
}

// ── Persistence ────────────────────────────────────────────────

#[test]
fn timeline_file_roundtrip_preserves_resolution() {
    let edit = reference_edit();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reference.json");

    TimelineFile::new(edit.timeline.clone())
        .save_to_file(&path)
        .unwrap();
    let loaded = TimelineFile::load_from_file(&path).unwrap().timeline;

    assert_eq!(loaded, edit.timeline);
    for frame in 0..19 {
        assert_eq!(resolve(&loaded, frame), resolve(&edit.timeline, frame));
    }
}

#[test]
fn shallow_serialisation_drops_grandchildren() {
    let edit = reference_edit();
    let doc = edit.timeline.serialise(1);
    let stacks = doc["children"].as_array().unwrap();
    assert_eq!(stacks.len(), 1);
    assert!(stacks[0]["children"].as_array().map_or(true, |c| c.is_empty()));
}
