//! Frame baking: flatten a timeline into one frame identity per frame.
//!
//! The tree walk is synchronous and decides which clip owns each frame
//! before any request leaves: the first clip to claim a frame keeps it, so
//! upper tracks occlude lower ones regardless of response order. Claimed
//! runs are sent to an aggregator task that fans them out to the clip
//! sources and writes the answers into the frame map. The map is delivered
//! once every sender is gone and every request has finished.

use std::collections::HashSet;
use std::sync::Arc;

use montage_core::{
    FrameId, FrameRate, MediaType, MontageError, Result, TickDuration, TimeSourceMode,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::handle::{ActorHandle, ClipRegistry};
use crate::item::{Item, ItemType};

// ── Options and results ─────────────────────────────────────────

/// Parameters of one baking pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BakeOptions {
    pub media_type: MediaType,
    pub time_source: TimeSourceMode,
    /// Step rate used in [`TimeSourceMode::Fixed`].
    pub override_rate: Option<FrameRate>,
    /// Items whose content wins over everything else.
    pub focus: HashSet<Uuid>,
}

impl BakeOptions {
    pub fn new(media_type: MediaType) -> Self {
        Self {
            media_type,
            ..Self::default()
        }
    }

    pub fn with_time_source(mut self, mode: TimeSourceMode) -> Self {
        self.time_source = mode;
        self
    }

    pub fn with_override_rate(mut self, rate: FrameRate) -> Self {
        self.override_rate = Some(rate);
        self
    }

    pub fn with_focus(mut self, focus: impl IntoIterator<Item = Uuid>) -> Self {
        self.focus = focus.into_iter().collect();
        self
    }
}

/// Zero-based table of frame identities, one per frame.
#[derive(Debug, Clone)]
pub struct FrameMap {
    /// Rate the map steps at.
    pub rate: FrameRate,
    /// Frame of the baked item's own timeline that slot zero corresponds to.
    pub start_frame: i64,
    frames: Vec<Arc<FrameId>>,
}

impl FrameMap {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<&FrameId> {
        self.frames.get(frame).map(Arc::as_ref)
    }

    pub fn frames(&self) -> &[Arc<FrameId>] {
        &self.frames
    }

    pub fn iter(&self) -> impl Iterator<Item = &FrameId> {
        self.frames.iter().map(Arc::as_ref)
    }

    /// Frames holding real media.
    pub fn resolved_count(&self) -> usize {
        self.frames.iter().filter(|f| !f.is_blank()).count()
    }
}

/// A frame map still being filled in.
///
/// Dropping it abandons the result; requests already in flight finish and
/// their answers are discarded.
#[derive(Debug)]
pub struct PendingFrameMap {
    receiver: oneshot::Receiver<FrameMap>,
}

impl PendingFrameMap {
    /// Wait for every clip request to finish.
    pub async fn wait(self) -> Result<FrameMap> {
        self.receiver
            .await
            .map_err(|_| MontageError::Internal("frame map aggregator stopped".into()))
    }
}

// ── Aggregator ──────────────────────────────────────────────────

/// A contiguous run of claimed frames owned by one clip.
#[derive(Debug)]
struct ClipRequest {
    handle: ActorHandle,
    clip_uuid: Uuid,
    timepoints: Vec<TickDuration>,
    first_slot: usize,
    rate: FrameRate,
}

type ClipResponse = (usize, usize, Uuid, Result<Vec<FrameId>>);

async fn aggregate(
    mut frames: Vec<Arc<FrameId>>,
    mut requests: mpsc::UnboundedReceiver<ClipRequest>,
    registry: Arc<ClipRegistry>,
    media_type: MediaType,
) -> Vec<Arc<FrameId>> {
    let mut in_flight: JoinSet<ClipResponse> = JoinSet::new();
    let mut accepting = true;
    let mut dispatched = 0usize;

    loop {
        tokio::select! {
            message = requests.recv(), if accepting => match message {
                Some(request) => match registry.get(&request.handle) {
                    Some(source) => {
                        dispatched += 1;
                        in_flight.spawn(async move {
                            let count = request.timepoints.len();
                            let result = source
                                .frame_ids(media_type, request.timepoints, request.rate)
                                .await;
                            (request.first_slot, count, request.clip_uuid, result)
                        });
                    }
                    None => warn!(
                        handle = %request.handle,
                        clip = %request.clip_uuid,
                        frames = request.timepoints.len(),
                        "No clip source registered, frames left blank"
                    ),
                },
                None => accepting = false,
            },
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok(response) => write_response(&mut frames, response),
                    Err(e) => warn!(error = %e, "Clip request task failed"),
                }
            }
            else => break,
        }
    }

    debug!(requests = dispatched, frames = frames.len(), "Frame map complete");
    frames
}

fn write_response(frames: &mut [Arc<FrameId>], response: ClipResponse) {
    let (first_slot, count, clip_uuid, result) = response;
    let ids = match result {
        Ok(ids) => ids,
        Err(e) => {
            warn!(
                clip = %clip_uuid,
                frames = count,
                error = %e,
                "Clip request failed, frames left blank"
            );
            return;
        }
    };
    if ids.len() != count {
        warn!(
            clip = %clip_uuid,
            expected = count,
            received = ids.len(),
            "Clip source returned wrong number of frames"
        );
    }
    for (offset, mut id) in ids.into_iter().take(count).enumerate() {
        if id.clip_uuid.is_none() {
            id.clip_uuid = Some(clip_uuid);
        }
        if let Some(slot) = frames.get_mut(first_slot + offset) {
            *slot = Arc::new(id);
        }
    }
}

// ── Tree walk ───────────────────────────────────────────────────

/// Claims frames for clips and queues their requests.
struct Walk<'a> {
    options: &'a BakeOptions,
    step: FrameRate,
    focus_only: bool,
    resolved: &'a mut [bool],
    sender: &'a mpsc::UnboundedSender<ClipRequest>,
}

impl Walk<'_> {
    /// `base` is the map time at which `item` sees local input zero;
    /// `[lo, hi)` is the part of map time still visible from above.
    fn visit(
        &mut self,
        item: &Item,
        base: TickDuration,
        lo: TickDuration,
        hi: TickDuration,
        focused: bool,
    ) {
        if item.is_transparent() {
            return;
        }
        let lo = lo.max(base);
        let hi = hi.min(base + item.trimmed_duration());
        if lo >= hi {
            return;
        }
        let focused = focused || self.options.focus.contains(&item.uuid());
        let child_base = base - item.trimmed_start();

        match item.item_type() {
            ItemType::Timeline => {
                if let Some(stack) = item.children().first() {
                    self.visit(stack, child_base, lo, hi, focused);
                }
            }
            ItemType::Stack => {
                let media_type = self.options.media_type;
                for child in item.children() {
                    if !stacks_for(child, media_type) {
                        continue;
                    }
                    self.visit(child, child_base, lo, hi, focused);
                }
            }
            ItemType::VideoTrack | ItemType::AudioTrack => {
                let mut offset = TickDuration::ZERO;
                for child in item.children() {
                    self.visit(child, child_base + offset, lo, hi, focused);
                    offset += child.trimmed_duration();
                }
            }
            ItemType::Clip => {
                if self.focus_only && !focused {
                    return;
                }
                self.claim(item, base, lo, hi);
            }
            ItemType::Gap | ItemType::None => {}
        }
    }

    fn claim(&mut self, clip: &Item, base: TickDuration, lo: TickDuration, hi: TickDuration) {
        let period = self.step.period().ticks();
        let first = ceil_div(lo.ticks(), period).max(0) as usize;
        let last = (ceil_div(hi.ticks(), period).max(0) as usize).min(self.resolved.len());
        if first >= last {
            return;
        }

        let remapped = self.options.time_source == TimeSourceMode::Remapped;
        let rate = if remapped { clip.rate() } else { self.step };
        let start = clip.trimmed_start();

        // (first slot, clip-local timepoints) of the run being collected
        let mut run: Option<(usize, Vec<TickDuration>)> = None;
        for slot in first..last {
            if self.resolved[slot] {
                self.flush(clip, rate, run.take());
                continue;
            }
            self.resolved[slot] = true;

            let into_clip = self.step.frames_to_ticks(slot as i64) - base;
            let timepoint = if remapped {
                start + rate.frames_to_ticks(self.step.frames_in(into_clip))
            } else {
                start + into_clip
            };
            run.get_or_insert_with(|| (slot, Vec::new())).1.push(timepoint);
        }
        self.flush(clip, rate, run);
    }

    fn flush(&self, clip: &Item, rate: FrameRate, run: Option<(usize, Vec<TickDuration>)>) {
        let Some((first_slot, timepoints)) = run else {
            return;
        };
        let Some(handle) = clip.handle() else {
            warn!(
                clip = %clip.uuid(),
                name = clip.name(),
                frames = timepoints.len(),
                "Clip has no source handle, frames left blank"
            );
            return;
        };
        let request = ClipRequest {
            handle,
            clip_uuid: clip.uuid(),
            timepoints,
            first_slot,
            rate,
        };
        if self.sender.send(request).is_err() {
            warn!(clip = %clip.uuid(), "Frame map aggregator gone, request dropped");
        }
    }
}

/// Whether a stack child contributes to `media_type`.
fn stacks_for(child: &Item, media_type: MediaType) -> bool {
    match child.item_type().media_type() {
        Some(track_media) => track_media == media_type,
        None => true,
    }
}

fn ceil_div(value: i64, divisor: i64) -> i64 {
    let quotient = value / divisor;
    if value % divisor > 0 {
        quotient + 1
    } else {
        quotient
    }
}

impl Item {
    /// Start baking this item into a frame map.
    ///
    /// Slots are claimed before this returns; the identities arrive as
    /// each clip source answers. Must be called from inside a tokio runtime.
    pub fn get_all_frame_ids(
        &self,
        registry: Arc<ClipRegistry>,
        options: &BakeOptions,
    ) -> Result<PendingFrameMap> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| {
                MontageError::Runtime(format!("Frame baking needs a tokio runtime: {}", e))
            })?;

        let step = match options.time_source {
            TimeSourceMode::Fixed => options.override_rate.unwrap_or_else(|| self.rate()),
            TimeSourceMode::Dynamic | TimeSourceMode::Remapped => self.rate(),
        };
        if step.is_zero() {
            return Err(MontageError::InvalidParameter(
                "Cannot bake at a zero frame rate".into(),
            ));
        }

        let duration = self.trimmed_duration();
        let frame_count = step.frames_in(duration).max(0) as usize;
        let start_frame = step.frames_in(self.trimmed_start());
        debug!(
            uuid = %self.uuid,
            frames = frame_count,
            media_type = %options.media_type,
            mode = ?options.time_source,
            focus = options.focus.len(),
            "Baking frame map"
        );

        let blank = Arc::new(FrameId::blank(options.media_type));
        let frames = vec![blank; frame_count];
        let mut resolved = vec![false; frame_count];

        let (sender, requests) = mpsc::unbounded_channel();
        let (deliver, receiver) = oneshot::channel();
        let media_type = options.media_type;
        runtime.spawn(async move {
            let frames = aggregate(frames, requests, registry, media_type).await;
            let map = FrameMap {
                rate: step,
                start_frame,
                frames,
            };
            if deliver.send(map).is_err() {
                debug!("Frame map abandoned before completion");
            }
        });

        let mut walk = Walk {
            options,
            step,
            focus_only: !options.focus.is_empty(),
            resolved: &mut resolved,
            sender: &sender,
        };
        if walk.focus_only {
            walk.visit(self, TickDuration::ZERO, TickDuration::ZERO, duration, false);
            walk.focus_only = false;
        }
        walk.visit(self, TickDuration::ZERO, TickDuration::ZERO, duration, false);

        Ok(PendingFrameMap { receiver })
    }

    /// Bake and wait for the finished map.
    pub async fn bake(
        &self,
        registry: Arc<ClipRegistry>,
        options: &BakeOptions,
    ) -> Result<FrameMap> {
        self.get_all_frame_ids(registry, options)?.wait().await
    }
}
