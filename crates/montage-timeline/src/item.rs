//! The timeline tree.
//!
//! Every node is an [`Item`]: a gap, clip, track, stack or timeline. Items own
//! their children outright; nothing is shared between parents. Mutation goes
//! through the journaled setters in [`crate::journal`], structural queries
//! live here.

use std::fmt;
use std::sync::Arc;

use montage_core::{
    FrameRange, FrameRate, FrameRateDuration, MediaType, MontageError, Result, TickDuration,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::handle::ActorHandle;
use crate::journal::ItemEvent;
use crate::marker::Marker;

/// Property bag key holding a clip's media reference.
pub const MEDIA_UUID_KEY: &str = "media_uuid";

// ── Item types ──────────────────────────────────────────────────

/// Variant tag of a tree node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    #[default]
    None,
    Gap,
    Clip,
    VideoTrack,
    AudioTrack,
    Stack,
    Timeline,
}

impl ItemType {
    pub const ALL: [ItemType; 7] = [
        Self::None,
        Self::Gap,
        Self::Clip,
        Self::VideoTrack,
        Self::AudioTrack,
        Self::Stack,
        Self::Timeline,
    ];

    /// Whether a node of this type may hold a child of type `child`.
    pub fn accepts(self, child: ItemType) -> bool {
        match self {
            Self::Timeline => matches!(child, Self::Stack),
            Self::Stack => matches!(
                child,
                Self::Gap | Self::Clip | Self::Stack | Self::VideoTrack | Self::AudioTrack
            ),
            Self::VideoTrack | Self::AudioTrack => {
                matches!(child, Self::Gap | Self::Clip | Self::Stack)
            }
            Self::Gap | Self::Clip | Self::None => false,
        }
    }

    #[inline]
    pub fn is_track(self) -> bool {
        matches!(self, Self::VideoTrack | Self::AudioTrack)
    }

    /// Gap and Clip never have children.
    #[inline]
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Gap | Self::Clip)
    }

    /// Track type carrying `media_type`.
    pub fn track_for(media_type: MediaType) -> Self {
        match media_type {
            MediaType::Image => Self::VideoTrack,
            MediaType::Audio => Self::AudioTrack,
        }
    }

    /// Media carried by a track type.
    pub fn media_type(self) -> Option<MediaType> {
        match self {
            Self::VideoTrack => Some(MediaType::Image),
            Self::AudioTrack => Some(MediaType::Audio),
            _ => None,
        }
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "None",
            Self::Gap => "Gap",
            Self::Clip => "Clip",
            Self::VideoTrack => "Video Track",
            Self::AudioTrack => "Audio Track",
            Self::Stack => "Stack",
            Self::Timeline => "Timeline",
        };
        write!(f, "{}", name)
    }
}

/// Callback fired after a replayed event is applied to an item.
pub type EventCallback = Arc<dyn Fn(&ItemEvent, &Item) + Send + Sync>;

// ── Item ────────────────────────────────────────────────────────

/// A node in the timeline tree.
#[derive(Serialize, Deserialize)]
pub struct Item {
    pub(crate) uuid: Uuid,
    #[serde(rename = "type")]
    pub(crate) item_type: ItemType,
    pub(crate) enabled: bool,
    #[serde(default)]
    pub(crate) locked: bool,
    #[serde(default)]
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) flag: String,
    #[serde(default)]
    pub(crate) prop: Value,
    #[serde(default)]
    pub(crate) markers: Vec<Marker>,
    #[serde(default)]
    pub(crate) active_range: Option<FrameRange>,
    #[serde(default)]
    pub(crate) available_range: Option<FrameRange>,
    #[serde(rename = "actor_addr", default, skip_serializing_if = "Option::is_none")]
    pub(crate) handle: Option<ActorHandle>,
    #[serde(default)]
    pub(crate) children: Vec<Item>,

    #[serde(skip)]
    pub(crate) event_callback: Option<EventCallback>,
    #[serde(skip)]
    pub(crate) recursive_bind: bool,
    #[serde(skip)]
    pub(crate) dirty: bool,
}

impl Item {
    /// Create an empty, enabled item of the given type.
    pub fn new(item_type: ItemType) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            item_type,
            enabled: true,
            locked: false,
            name: String::new(),
            flag: String::new(),
            prop: Value::Object(serde_json::Map::new()),
            markers: Vec::new(),
            active_range: None,
            available_range: None,
            handle: None,
            children: Vec::new(),
            event_callback: None,
            recursive_bind: false,
            dirty: false,
        }
    }

    fn named(item_type: ItemType, name: impl Into<String>) -> Self {
        let mut item = Self::new(item_type);
        item.name = name.into();
        item
    }

    /// A gap of `duration`, starting at zero.
    pub fn gap(name: impl Into<String>, duration: FrameRateDuration) -> Self {
        Self::named(ItemType::Gap, name).with_available_range(FrameRange::new(
            duration.rate,
            TickDuration::ZERO,
            duration.duration,
        ))
    }

    /// A clip, optionally referencing media.
    pub fn clip(name: impl Into<String>, media_uuid: Option<Uuid>) -> Self {
        let mut item = Self::named(ItemType::Clip, name);
        if let Some(media) = media_uuid {
            item.prop[MEDIA_UUID_KEY] = Value::String(media.to_string());
        }
        item
    }

    /// A track carrying `media_type`.
    pub fn track(name: impl Into<String>, media_type: MediaType) -> Self {
        Self::named(ItemType::track_for(media_type), name)
    }

    pub fn video_track(name: impl Into<String>) -> Self {
        Self::track(name, MediaType::Image)
    }

    pub fn audio_track(name: impl Into<String>) -> Self {
        Self::track(name, MediaType::Audio)
    }

    pub fn stack(name: impl Into<String>) -> Self {
        Self::named(ItemType::Stack, name)
    }

    pub fn timeline(name: impl Into<String>) -> Self {
        Self::named(ItemType::Timeline, name)
    }

    // Builders. These bypass the journal and are meant for assembling trees.

    pub fn with_available_range(mut self, range: FrameRange) -> Self {
        self.available_range = Some(range);
        self
    }

    pub fn with_active_range(mut self, range: FrameRange) -> Self {
        self.active_range = Some(range);
        self
    }

    pub fn with_handle(mut self, handle: ActorHandle) -> Self {
        self.handle = Some(handle);
        self
    }

    pub fn with_child(mut self, child: Item) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Item>) -> Self {
        self.children.extend(children);
        self
    }

    /// Deserialize an item tree.
    ///
    /// `uuid`, `type` and `enabled` are required at every level; a missing
    /// field fails the whole document.
    pub fn from_json(value: &Value) -> Result<Self> {
        Item::deserialize(value).map_err(|e| MontageError::MalformedItem(e.to_string()))
    }

    /// Serialize to JSON, including children down to `depth` levels.
    pub fn serialise(&self, depth: usize) -> Value {
        let mut doc = serde_json::to_value(self).unwrap_or_default();
        prune_children(&mut doc, depth);
        doc
    }

    // ── Accessors ───────────────────────────────────────────────

    #[inline]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    #[inline]
    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    #[inline]
    pub fn handle(&self) -> Option<ActorHandle> {
        self.handle
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn locked(&self) -> bool {
        self.locked
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn flag(&self) -> &str {
        &self.flag
    }

    pub fn prop(&self) -> &Value {
        &self.prop
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn children(&self) -> &[Item] {
        &self.children
    }

    #[inline]
    pub fn active_range(&self) -> Option<FrameRange> {
        self.active_range
    }

    #[inline]
    pub fn available_range(&self) -> Option<FrameRange> {
        self.available_range
    }

    /// Whether a structural edit has happened since the last refresh.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn has_event_callback(&self) -> bool {
        self.event_callback.is_some()
    }

    /// Media referenced by a clip, read from the property bag.
    pub fn media_uuid(&self) -> Option<Uuid> {
        self.prop
            .get(MEDIA_UUID_KEY)
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }

    // ── Derived ranges ──────────────────────────────────────────

    /// Active range if set, else available range, else empty.
    pub fn trimmed_range(&self) -> FrameRange {
        self.active_range
            .or(self.available_range)
            .unwrap_or_else(|| FrameRange::empty(FrameRate::default()))
    }

    #[inline]
    pub fn trimmed_duration(&self) -> TickDuration {
        self.trimmed_range().duration
    }

    #[inline]
    pub fn trimmed_start(&self) -> TickDuration {
        self.trimmed_range().start
    }

    #[inline]
    pub fn trimmed_frame_duration(&self) -> FrameRateDuration {
        self.trimmed_range().frame_duration()
    }

    #[inline]
    pub fn trimmed_frame_start(&self) -> FrameRateDuration {
        self.trimmed_range().frame_start()
    }

    /// Rate of the trimmed range.
    #[inline]
    pub fn rate(&self) -> FrameRate {
        self.trimmed_range().rate
    }

    pub fn available_duration(&self) -> Option<TickDuration> {
        self.available_range.map(|r| r.duration)
    }

    pub fn active_duration(&self) -> Option<TickDuration> {
        self.active_range.map(|r| r.duration)
    }

    // ── Structure ───────────────────────────────────────────────

    /// Ignored during resolution and compositing.
    pub fn is_transparent(&self) -> bool {
        match self.item_type {
            _ if !self.enabled => true,
            ItemType::Gap => true,
            ItemType::Clip => self.media_uuid().is_none(),
            _ => false,
        }
    }

    /// Whether `child` may be placed under this item.
    pub fn valid_child(&self, child: &Item) -> bool {
        self.item_type.accepts(child.item_type)
    }

    /// Whether every parent/child pair in the tree is allowed.
    pub fn valid(&self) -> bool {
        self.children
            .iter()
            .all(|child| self.valid_child(child) && child.valid())
    }

    /// Children are laid end to end rather than composited.
    #[inline]
    pub fn is_sequential(&self) -> bool {
        self.item_type.is_track()
    }

    pub fn find_item(&self, uuid: Uuid) -> Option<&Item> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find_item(uuid))
    }

    pub fn find_item_mut(&mut self, uuid: Uuid) -> Option<&mut Item> {
        if self.uuid == uuid {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|child| child.find_item_mut(uuid))
    }

    /// This item and every descendant of `item_type`, in depth-first order.
    ///
    /// With `track_type` set, tracks of the other media type are skipped
    /// along with everything under them.
    pub fn find_all_items(&self, item_type: ItemType, track_type: Option<ItemType>) -> Vec<&Item> {
        let mut found = Vec::new();
        self.collect_items(item_type, track_type, &mut found);
        found
    }

    fn collect_items<'a>(
        &'a self,
        item_type: ItemType,
        track_type: Option<ItemType>,
        found: &mut Vec<&'a Item>,
    ) {
        if self.item_type == item_type {
            found.push(self);
        }
        for child in &self.children {
            if let Some(track) = track_type {
                if child.item_type.is_track() && child.item_type != track {
                    continue;
                }
            }
            child.collect_items(item_type, track_type, found);
        }
    }

    /// `(uuid, handle)` for every item of `item_type` bound to a source.
    pub fn find_all_handles(&self, item_type: ItemType) -> Vec<(Uuid, ActorHandle)> {
        self.find_all_items(item_type, None)
            .into_iter()
            .filter_map(|item| item.handle.map(|h| (item.uuid, h)))
            .collect()
    }

    /// Swap in a fresh copy of a direct child, matched by UUID.
    pub fn replace_child(&mut self, mut child: Item) -> bool {
        let Some(index) = self.index_of_child(child.uuid) else {
            return false;
        };
        if self.recursive_bind {
            if let Some(callback) = &self.event_callback {
                child.bind_callback_arc(callback.clone(), true);
            }
        }
        self.children[index] = child;
        true
    }

    // ── Index helpers ───────────────────────────────────────────

    pub fn item_at_index(&self, index: usize) -> Option<&Item> {
        self.children.get(index)
    }

    pub fn index_of_child(&self, uuid: Uuid) -> Option<usize> {
        self.children.iter().position(|c| c.uuid == uuid)
    }

    /// Local start of child `index`. Zero for composited containers.
    pub fn child_offset(&self, index: usize) -> TickDuration {
        if !self.is_sequential() {
            return TickDuration::ZERO;
        }
        self.children
            .iter()
            .take(index)
            .map(Item::trimmed_duration)
            .sum()
    }

    /// Span child `index` covers in this item's local time.
    pub fn range_at_index(&self, index: usize) -> Option<FrameRange> {
        let child = self.children.get(index)?;
        Some(FrameRange::new(
            child.rate(),
            self.child_offset(index),
            child.trimmed_duration(),
        ))
    }

    /// Frame at which child `index` starts. Indices past the end give the
    /// end frame.
    pub fn frame_at_index(&self, index: usize) -> i64 {
        let start = self.trimmed_frame_start().frames();
        if !self.is_sequential() {
            return start;
        }
        start
            + self
                .children
                .iter()
                .take(index)
                .map(|c| c.trimmed_frame_duration().frames())
                .sum::<i64>()
    }

    /// Frame `item_frame` frames into child `index`, clamped to our length.
    pub fn frame_at_index_offset(&self, index: usize, item_frame: i64) -> i64 {
        let end = self.trimmed_frame_start().frames() + self.total_child_frames();
        (self.frame_at_index(index) + item_frame).min(end)
    }

    fn total_child_frames(&self) -> i64 {
        let frames = self.children.iter().map(|c| c.trimmed_frame_duration().frames());
        if self.is_sequential() {
            frames.sum()
        } else {
            frames.max().unwrap_or(0)
        }
    }

    /// Child covering local `frame`, and that frame in the child's own
    /// frame space.
    pub fn item_at_frame(&self, frame: i64) -> Option<(usize, i64)> {
        if frame < 0 {
            return None;
        }
        let mut start = 0i64;
        for (index, child) in self.children.iter().enumerate() {
            let count = child.trimmed_frame_duration().frames();
            if frame >= start && frame < start + count {
                return Some((index, frame - start + child.trimmed_frame_start().frames()));
            }
            if self.is_sequential() {
                start += count;
            }
        }
        None
    }

    // ── Callbacks ───────────────────────────────────────────────

    /// Fire `callback` after every replayed event applied to this item, and
    /// to its descendants when `recursive` is set.
    pub fn bind_event_callback<F>(&mut self, callback: F, recursive: bool)
    where
        F: Fn(&ItemEvent, &Item) + Send + Sync + 'static,
    {
        self.bind_callback_arc(Arc::new(callback), recursive);
    }

    pub(crate) fn bind_callback_arc(&mut self, callback: EventCallback, recursive: bool) {
        self.recursive_bind = recursive;
        if recursive {
            for child in &mut self.children {
                child.bind_callback_arc(callback.clone(), true);
            }
        }
        self.event_callback = Some(callback);
    }

    pub fn unbind_event_callback(&mut self) {
        if self.recursive_bind {
            for child in &mut self.children {
                child.unbind_event_callback();
            }
        }
        self.event_callback = None;
        self.recursive_bind = false;
    }
}

fn prune_children(doc: &mut Value, depth: usize) {
    let Some(children) = doc.get_mut("children").and_then(Value::as_array_mut) else {
        return;
    };
    if depth == 0 {
        children.clear();
        return;
    }
    for child in children {
        prune_children(child, depth - 1);
    }
}

// Clones are independent trees: the callback stays with the original.
impl Clone for Item {
    fn clone(&self) -> Self {
        Self {
            uuid: self.uuid,
            item_type: self.item_type,
            enabled: self.enabled,
            locked: self.locked,
            name: self.name.clone(),
            flag: self.flag.clone(),
            prop: self.prop.clone(),
            markers: self.markers.clone(),
            active_range: self.active_range,
            available_range: self.available_range,
            handle: self.handle,
            children: self.children.clone(),
            event_callback: None,
            recursive_bind: false,
            dirty: self.dirty,
        }
    }
}

impl PartialEq for Item {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
            && self.item_type == other.item_type
            && self.enabled == other.enabled
            && self.locked == other.locked
            && self.name == other.name
            && self.flag == other.flag
            && self.prop == other.prop
            && self.markers == other.markers
            && self.active_range == other.active_range
            && self.available_range == other.available_range
            && self.handle == other.handle
            && self.children == other.children
    }
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("uuid", &self.uuid)
            .field("item_type", &self.item_type)
            .field("name", &self.name)
            .field("enabled", &self.enabled)
            .field("locked", &self.locked)
            .field("flag", &self.flag)
            .field("prop", &self.prop)
            .field("markers", &self.markers)
            .field("active_range", &self.active_range)
            .field("available_range", &self.available_range)
            .field("handle", &self.handle)
            .field("bound", &self.event_callback.is_some())
            .field("children", &self.children)
            .finish()
    }
}
