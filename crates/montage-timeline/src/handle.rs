//! Weak handles from tree nodes to runtime-owned clip sources.
//!
//! An [`Item`](crate::Item) never owns the object that serves its frames. It
//! stores an [`ActorHandle`], and whoever bakes the timeline passes in the
//! [`ClipRegistry`] that maps handles to live [`ClipSource`]s.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use montage_core::{FrameId, FrameRate, MediaType, Result, TickDuration};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of a clip source living outside the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorHandle(Uuid);

impl ActorHandle {
    /// Allocate a fresh handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub const fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ActorHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor:{}", self.0)
    }
}

// ── Clip sources ────────────────────────────────────────────────

/// Something that can name the frames a clip shows.
///
/// `timepoints` are clip-local times. The returned list must hold exactly one
/// identity per timepoint, in the same order.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn frame_ids(
        &self,
        media_type: MediaType,
        timepoints: Vec<TickDuration>,
        rate: FrameRate,
    ) -> Result<Vec<FrameId>>;
}

/// Clip source backed by a single piece of media at a fixed native rate.
#[derive(Debug, Clone)]
pub struct MediaClipSource {
    pub media_uuid: Uuid,
    pub clip_uuid: Option<Uuid>,
    pub uri: String,
    /// Native rate of the media.
    pub rate: FrameRate,
}

impl MediaClipSource {
    pub fn new(media_uuid: Uuid, uri: impl Into<String>, rate: FrameRate) -> Self {
        Self {
            media_uuid,
            clip_uuid: None,
            uri: uri.into(),
            rate,
        }
    }

    pub fn with_clip(mut self, clip_uuid: Uuid) -> Self {
        self.clip_uuid = Some(clip_uuid);
        self
    }

    /// Media frame shown at a clip-local time.
    pub fn media_frame(&self, time: TickDuration) -> i64 {
        self.rate.frames_in(time)
    }
}

#[async_trait]
impl ClipSource for MediaClipSource {
    async fn frame_ids(
        &self,
        media_type: MediaType,
        timepoints: Vec<TickDuration>,
        rate: FrameRate,
    ) -> Result<Vec<FrameId>> {
        Ok(timepoints
            .into_iter()
            .map(|time| {
                let frame = self.media_frame(time);
                let mut id = FrameId::new(media_type, self.uri.clone(), frame, rate)
                    .with_media(self.media_uuid);
                id.clip_uuid = self.clip_uuid;
                id
            })
            .collect())
    }
}

// ── Registry ────────────────────────────────────────────────────

/// Runtime-owned lookup from handles to live clip sources.
#[derive(Default)]
pub struct ClipRegistry {
    sources: RwLock<HashMap<ActorHandle, Arc<dyn ClipSource>>>,
}

impl ClipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under a freshly allocated handle.
    pub fn register(&self, source: Arc<dyn ClipSource>) -> ActorHandle {
        let handle = ActorHandle::new();
        self.sources.write().insert(handle, source);
        handle
    }

    /// Bind a source to an existing handle, returning the one it replaces.
    pub fn insert(
        &self,
        handle: ActorHandle,
        source: Arc<dyn ClipSource>,
    ) -> Option<Arc<dyn ClipSource>> {
        self.sources.write().insert(handle, source)
    }

    pub fn unregister(&self, handle: &ActorHandle) -> Option<Arc<dyn ClipSource>> {
        self.sources.write().remove(handle)
    }

    pub fn get(&self, handle: &ActorHandle) -> Option<Arc<dyn ClipSource>> {
        self.sources.read().get(handle).cloned()
    }

    pub fn contains(&self, handle: &ActorHandle) -> bool {
        self.sources.read().contains_key(handle)
    }

    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}

impl fmt::Debug for ClipRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClipRegistry")
            .field("sources", &self.len())
            .finish()
    }
}
