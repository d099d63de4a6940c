//! The 19 frame reference edit.
//!
//! ```text
//! Timeline
//! └─ Stack-001
//!    └─ Track-001: Clip-001 | Nested Stack-002 | Gap-001 | Clip-004
//!                            ├─ Nested Track-002: Gap-002 | Clip-003
//!                            └─ Nested Track-003: Clip-005 | Clip-006
//! ```

use montage_core::{FrameRange, FrameRate, FrameRateDuration, TickDuration};
use montage_timeline::Item;
use uuid::Uuid;

pub const FPS: FrameRate = FrameRate::FPS_24;

pub fn frames(n: i64) -> TickDuration {
    FPS.frames_to_ticks(n)
}

pub fn clip(name: &str, start: i64, duration: i64) -> Item {
    Item::clip(name, Some(Uuid::new_v4()))
        .with_available_range(FrameRange::from_frames(start, duration, FPS))
}

pub fn gap(name: &str, duration: i64) -> Item {
    Item::gap(name, FrameRateDuration::from_frames(duration, FPS))
}

/// Uuids of the interesting items in [`reference_edit`].
pub struct Reference {
    pub timeline: Item,
    pub stack: Uuid,
    pub main_track: Uuid,
    pub nested_stack: Uuid,
    pub nested_track_002: Uuid,
    pub nested_track_003: Uuid,
    pub c001: Uuid,
    pub c003: Uuid,
    pub c004: Uuid,
    pub c005: Uuid,
    pub c006: Uuid,
}

pub fn reference_edit() -> Reference {
    let c001 = clip("Clip-001", 3, 3);
    let c003 = clip("Clip-003", 100, 9);
    let c004 = clip("Clip-004", 100, 6);
    let c005 = clip("Clip-005", 100, 9);
    let c006 = clip("Clip-006", 3, 3);

    let t003 = Item::video_track("Nested Track-003")
        .with_active_range(FrameRange::from_frames(1, 10, FPS))
        .with_available_range(FrameRange::from_frames(1, 10, FPS));
    let t002 = Item::video_track("Nested Track-002");
    let s002 = Item::stack("Nested Stack-002")
        .with_active_range(FrameRange::from_frames(2, 6, FPS));
    let t001 = Item::video_track("Track-001");
    let s001 = Item::stack("Stack-001");

    let reference = Reference {
        timeline: Item::timeline("Timeline"),
        stack: s001.uuid(),
        main_track: t001.uuid(),
        nested_stack: s002.uuid(),
        nested_track_002: t002.uuid(),
        nested_track_003: t003.uuid(),
        c001: c001.uuid(),
        c003: c003.uuid(),
        c004: c004.uuid(),
        c005: c005.uuid(),
        c006: c006.uuid(),
    };

    let t003 = t003.with_child(c005).with_child(c006);
    let t002 = t002.with_child(gap("Gap-002", 7)).with_child(c003);
    let s002 = s002.with_child(t002).with_child(t003);
    let t001 = t001
        .with_child(c001)
        .with_child(s002)
        .with_child(gap("Gap-001", 4))
        .with_child(c004);

    let mut timeline = reference.timeline.with_child(s001.with_child(t001));
    timeline.refresh(usize::MAX);

    Reference {
        timeline,
        ..reference
    }
}
