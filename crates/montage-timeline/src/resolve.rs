//! Time resolution: which leaf shows at a given time.
//!
//! Stacks composite their children (first match wins), tracks play theirs
//! end to end. A focus set lets callers pull specific items or containers
//! to the front for compare and overlay views.

use std::collections::HashSet;

use montage_core::{MediaType, TickDuration};
use smallvec::SmallVec;
use uuid::Uuid;

use crate::item::{Item, ItemType};

/// A leaf item and the time inside it.
pub type Resolved<'a> = (&'a Item, TickDuration);

/// Every leaf visible at one time, top layer first.
pub type ResolvedLayers<'a> = SmallVec<[Resolved<'a>; 4]>;

impl Item {
    /// Find the leaf that shows at local time `time` and the time within it.
    ///
    /// Out of range times and transparent items resolve to `None`. With an
    /// empty `focus` set the first match in child order wins. Otherwise a
    /// focused container or focused leaf wins immediately, and the first
    /// clip found is kept as a fallback unless `must_have_focus` is set.
    pub fn resolve_time(
        &self,
        time: TickDuration,
        media_type: MediaType,
        focus: &HashSet<Uuid>,
        must_have_focus: bool,
    ) -> Option<Resolved<'_>> {
        if self.is_transparent() || time.is_negative() || time >= self.trimmed_duration() {
            return None;
        }
        let local = time + self.trimmed_start();

        match self.item_type {
            ItemType::Timeline => {
                self.children
                    .first()?
                    .resolve_time(local, media_type, focus, must_have_focus)
            }
            ItemType::Stack => {
                let mut pick = FocusPick::new(self, focus, must_have_focus);
                for child in self.children.iter().filter(|c| composites(c, media_type)) {
                    let Some(found) =
                        child.resolve_time(local, media_type, focus, pick.child_must_have_focus())
                    else {
                        continue;
                    };
                    if let Some(hit) = pick.offer(child, found) {
                        return Some(hit);
                    }
                }
                pick.finish()
            }
            ItemType::VideoTrack | ItemType::AudioTrack => {
                let mut pick = FocusPick::new(self, focus, must_have_focus);
                let (index, offset) = self.child_at_time(local)?;
                let child = &self.children[index];
                let found = child.resolve_time(
                    offset,
                    media_type,
                    focus,
                    pick.child_must_have_focus(),
                )?;
                if let Some(hit) = pick.offer(child, found) {
                    return Some(hit);
                }
                pick.finish()
            }
            ItemType::Gap | ItemType::Clip => Some((self, local)),
            ItemType::None => None,
        }
    }

    /// Every clip visible at `time`, top layer first.
    ///
    /// When any candidate is focused, directly or through a focused
    /// container, only focused candidates are returned.
    pub fn resolve_time_raw(
        &self,
        time: TickDuration,
        media_type: MediaType,
        focus: &HashSet<Uuid>,
    ) -> ResolvedLayers<'_> {
        let mut layers: SmallVec<[(Resolved<'_>, bool); 4]> = SmallVec::new();
        self.gather_layers(time, media_type, focus, false, &mut layers);

        let any_focused = layers.iter().any(|(_, focused)| *focused);
        layers
            .into_iter()
            .filter(|(_, focused)| !any_focused || *focused)
            .map(|(resolved, _)| resolved)
            .collect()
    }

    fn gather_layers<'a>(
        &'a self,
        time: TickDuration,
        media_type: MediaType,
        focus: &HashSet<Uuid>,
        ancestor_focused: bool,
        layers: &mut SmallVec<[(Resolved<'a>, bool); 4]>,
    ) {
        if self.is_transparent() || time.is_negative() || time >= self.trimmed_duration() {
            return;
        }
        let local = time + self.trimmed_start();
        let focused = ancestor_focused || focus.contains(&self.uuid);

        match self.item_type {
            ItemType::Timeline => {
                if let Some(stack) = self.children.first() {
                    stack.gather_layers(local, media_type, focus, focused, layers);
                }
            }
            ItemType::Stack => {
                for child in self.children.iter().filter(|c| composites(c, media_type)) {
                    child.gather_layers(local, media_type, focus, focused, layers);
                }
            }
            ItemType::VideoTrack | ItemType::AudioTrack => {
                if let Some((index, offset)) = self.child_at_time(local) {
                    self.children[index].gather_layers(offset, media_type, focus, focused, layers);
                }
            }
            ItemType::Clip => layers.push(((self, local), focused)),
            ItemType::Gap | ItemType::None => {}
        }
    }

    /// Sequential child covering local `time`, and the time relative to
    /// that child's start.
    fn child_at_time(&self, time: TickDuration) -> Option<(usize, TickDuration)> {
        let mut remaining = time;
        for (index, child) in self.children.iter().enumerate() {
            let duration = child.trimmed_duration();
            if remaining < duration {
                return Some((index, remaining));
            }
            remaining -= duration;
        }
        None
    }
}

/// Whether a stack child takes part in compositing `media_type`.
fn composites(child: &Item, media_type: MediaType) -> bool {
    if child.is_transparent() {
        return false;
    }
    match media_type {
        MediaType::Image => child.item_type != ItemType::AudioTrack,
        MediaType::Audio => child.item_type != ItemType::VideoTrack,
    }
}

/// Tie-break state for one container during resolution.
struct FocusPick<'a, 'f> {
    focus: &'f HashSet<Uuid>,
    container_focused: bool,
    must_have_focus: bool,
    fallback: Option<Resolved<'a>>,
}

impl<'a, 'f> FocusPick<'a, 'f> {
    fn new(container: &Item, focus: &'f HashSet<Uuid>, must_have_focus: bool) -> Self {
        Self {
            focus,
            container_focused: focus.contains(&container.uuid),
            must_have_focus,
            fallback: None,
        }
    }

    // Everything under a focused container counts as focused.
    fn child_must_have_focus(&self) -> bool {
        self.must_have_focus && !self.container_focused
    }

    fn offer(&mut self, child: &Item, found: Resolved<'a>) -> Option<Resolved<'a>> {
        if self.focus.is_empty() {
            return Some(found);
        }
        let leaf = found.0;
        let is_clip = leaf.item_type == ItemType::Clip;

        if is_clip && (self.container_focused || self.focus.contains(&child.uuid)) {
            return Some(found);
        }
        if self.focus.contains(&leaf.uuid) {
            return Some(found);
        }
        if is_clip && self.fallback.is_none() {
            self.fallback = Some(found);
        }
        None
    }

    fn finish(self) -> Option<Resolved<'a>> {
        if self.must_have_focus {
            None
        } else {
            self.fallback
        }
    }
}
