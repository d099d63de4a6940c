//! Integration tests for frame baking against registered clip sources.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use montage_core::{FrameId, FrameRate, MediaType, Result, TickDuration};
use montage_timeline::{
    BakeOptions, ClipRegistry, ClipSource, FrameMap, Item, ItemType, MediaClipSource,
};
use parking_lot::Mutex;
use uuid::Uuid;

use crate::fixtures::reference_edit;

// ── Helpers ────────────────────────────────────────────────────

/// Answers after a delay and records how many frames each request asked for.
struct Recording {
    inner: MediaClipSource,
    delay: Duration,
    requests: Arc<Mutex<Vec<usize>>>,
}

#[async_trait]
impl ClipSource for Recording {
    async fn frame_ids(
        &self,
        media_type: MediaType,
        timepoints: Vec<TickDuration>,
        rate: FrameRate,
    ) -> Result<Vec<FrameId>> {
        self.requests.lock().push(timepoints.len());
        tokio::time::sleep(self.delay).await;
        self.inner.frame_ids(media_type, timepoints, rate).await
    }
}

/// Register a source for every clip, named after the clip. `delay` picks
/// the response latency per clip.
fn bind_sources(
    timeline: &mut Item,
    registry: &ClipRegistry,
    delay: impl Fn(&str) -> Duration,
) -> Arc<Mutex<Vec<usize>>> {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let clips: Vec<(Uuid, Uuid, String, FrameRate)> = timeline
        .find_all_items(ItemType::Clip, None)
        .into_iter()
        .map(|c| (c.uuid(), c.media_uuid().unwrap(), c.name().to_string(), c.rate()))
        .collect();

    for (uuid, media, name, rate) in clips {
        let source = Recording {
            delay: delay(&name),
            inner: MediaClipSource::new(media, name, rate).with_clip(uuid),
            requests: requests.clone(),
        };
        let handle = registry.register(Arc::new(source));
        timeline.find_item_mut(uuid).unwrap().set_handle(Some(handle));
    }
    requests
}

fn keys(map: &FrameMap) -> Vec<String> {
    map.iter().map(FrameId::key).collect()
}

fn run(uri: &str, frames: std::ops::Range<i64>) -> Vec<String> {
    frames.map(|f| format!("{}@{}", uri, f)).collect()
}

// ── Reference edit ─────────────────────────────────────────────

#[tokio::test]
async fn reference_edit_bakes_top_layer_per_frame() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    bind_sources(&mut edit.timeline, &registry, |_| Duration::ZERO);

    let map = edit
        .timeline
        .bake(registry, &BakeOptions::default())
        .await
        .unwrap();

    assert_eq!(map.len(), 19);
    assert_eq!(map.rate, FrameRate::FPS_24);
    let mut want = run("Clip-001", 3..6);
    want.extend(run("Clip-005", 103..108));
    want.extend(run("Clip-003", 100..101));
    want.extend(vec!["blank".to_string(); 4]);
    want.extend(run("Clip-004", 100..106));
    assert_eq!(keys(&map), want);
    assert_eq!(map.resolved_count(), 15);
    assert_eq!(map.get(0).unwrap().clip_uuid, Some(edit.c001));
}

#[tokio::test]
async fn baked_frames_agree_with_resolution() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    bind_sources(&mut edit.timeline, &registry, |_| Duration::ZERO);

    let options = BakeOptions::default();
    let map = edit.timeline.bake(registry, &options).await.unwrap();

    let rate = edit.timeline.rate();
    for (frame, id) in map.iter().enumerate() {
        let resolved = edit.timeline.resolve_time(
            rate.frames_to_ticks(frame as i64),
            options.media_type,
            &options.focus,
            false,
        );
        match resolved {
            Some((clip, local)) => {
                assert_eq!(id.clip_uuid, Some(clip.uuid()), "frame {}", frame);
                assert_eq!(id.frame, rate.frames_in(local), "frame {}", frame);
            }
            None => assert!(id.is_blank(), "frame {}", frame),
        }
    }
}

#[tokio::test]
async fn slow_upper_layer_still_wins() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    bind_sources(&mut edit.timeline, &registry, |name| match name {
        "Clip-003" => Duration::from_millis(80),
        _ => Duration::ZERO,
    });

    let map = edit
        .timeline
        .bake(registry, &BakeOptions::default())
        .await
        .unwrap();
    assert_eq!(map.get(8).unwrap().key(), "Clip-003@100");
    assert_eq!(map.get(7).unwrap().key(), "Clip-005@107");
}

#[tokio::test]
async fn occluded_frames_are_never_requested() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    let requests = bind_sources(&mut edit.timeline, &registry, |_| Duration::ZERO);

    edit.timeline
        .bake(registry, &BakeOptions::default())
        .await
        .unwrap();

    // One request per visible run: Clip-001, Clip-003, Clip-005, Clip-004.
    let mut sizes = requests.lock().clone();
    sizes.sort_unstable();
    assert_eq!(sizes, [1, 3, 5, 6]);
}

#[tokio::test]
async fn focused_track_is_baked_first() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    bind_sources(&mut edit.timeline, &registry, |_| Duration::ZERO);

    let options = BakeOptions::default().with_focus([edit.nested_track_003]);
    let map = edit.timeline.bake(registry, &options).await.unwrap();

    assert_eq!(map.get(8).unwrap().key(), "Clip-005@108");
    assert_eq!(map.get(0).unwrap().key(), "Clip-001@3");
    assert_eq!(map.get(13).unwrap().key(), "Clip-004@100");
}

#[tokio::test]
async fn unbound_clips_bake_blank() {
    let edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());

    let map = edit
        .timeline
        .bake(registry, &BakeOptions::default())
        .await
        .unwrap();
    assert_eq!(map.len(), 19);
    assert_eq!(map.resolved_count(), 0);
}

#[tokio::test]
async fn pending_map_resolves_after_sources_answer() {
    let mut edit = reference_edit();
    let registry = Arc::new(ClipRegistry::new());
    bind_sources(&mut edit.timeline, &registry, |_| Duration::from_millis(20));

    let pending = edit
        .timeline
        .get_all_frame_ids(registry, &BakeOptions::default())
        .unwrap();
    // The tree is free to change once slots are claimed.
    edit.timeline
        .find_item_mut(edit.c004)
        .unwrap()
        .set_enabled(false);

    let map = pending.wait().await.unwrap();
    assert_eq!(map.get(18).unwrap().key(), "Clip-004@105");
}
