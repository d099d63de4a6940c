//! Undoable mutation of the item tree.
//!
//! Every mutating accessor on [`Item`] compares the old and new value, applies
//! the change in place and hands back a [`Journal`] fragment holding both
//! directions. Unchanged values produce an empty journal. Journals can be
//! replayed backwards ([`Item::undo`]), forwards ([`Item::redo`]), or against
//! another replica of the same tree ([`Item::update`]).

use montage_core::{FrameRange, MontageError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::handle::ActorHandle;
use crate::item::{Item, MEDIA_UUID_KEY};
use crate::marker::Marker;

// ── Events ──────────────────────────────────────────────────────

/// Action code of an event, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemAction {
    SetEnabled,
    SetLocked,
    SetName,
    SetFlag,
    SetProperty,
    SetMarkers,
    SetActiveRange,
    SetAvailableRange,
    SetBothRanges,
    InsertChild,
    RemoveChild,
    SpliceChildren,
    SetBackReference,
    MarkDirty,
}

/// The state an event writes into its target item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ItemChange {
    SetEnabled { value: bool },
    SetLocked { value: bool },
    SetName { value: String },
    SetFlag { value: String },
    SetProperty { value: Value },
    SetMarkers { value: Vec<Marker> },
    SetActiveRange { value: Option<FrameRange> },
    SetAvailableRange { value: Option<FrameRange> },
    SetBothRanges {
        active: Option<FrameRange>,
        available: Option<FrameRange>,
    },
    /// `item` is the serialized child.
    InsertChild { index: usize, item: Value },
    RemoveChild { index: usize, item_uuid: Uuid },
    /// Move children `[first, last)` to sit before index `dst`.
    SpliceChildren { dst: usize, first: usize, last: usize },
    SetBackReference { value: Option<ActorHandle> },
    MarkDirty,
}

impl ItemChange {
    pub fn action(&self) -> ItemAction {
        match self {
            Self::SetEnabled { .. } => ItemAction::SetEnabled,
            Self::SetLocked { .. } => ItemAction::SetLocked,
            Self::SetName { .. } => ItemAction::SetName,
            Self::SetFlag { .. } => ItemAction::SetFlag,
            Self::SetProperty { .. } => ItemAction::SetProperty,
            Self::SetMarkers { .. } => ItemAction::SetMarkers,
            Self::SetActiveRange { .. } => ItemAction::SetActiveRange,
            Self::SetAvailableRange { .. } => ItemAction::SetAvailableRange,
            Self::SetBothRanges { .. } => ItemAction::SetBothRanges,
            Self::InsertChild { .. } => ItemAction::InsertChild,
            Self::RemoveChild { .. } => ItemAction::RemoveChild,
            Self::SpliceChildren { .. } => ItemAction::SpliceChildren,
            Self::SetBackReference { .. } => ItemAction::SetBackReference,
            Self::MarkDirty => ItemAction::MarkDirty,
        }
    }
}

/// One half of a journal entry, addressed to an item by UUID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemEvent {
    /// Shared by the undo and redo half of the same entry.
    pub event_id: Uuid,
    /// Target item.
    pub uuid: Uuid,
    #[serde(flatten)]
    pub change: ItemChange,
}

impl ItemEvent {
    #[inline]
    pub fn action(&self) -> ItemAction {
        self.change.action()
    }
}

/// Paired undo/redo records of a single change.
///
/// Broadcast-only entries carry no undo half.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub undo: Option<ItemEvent>,
    pub redo: ItemEvent,
}

impl JournalEntry {
    pub fn new(uuid: Uuid, undo: ItemChange, redo: ItemChange) -> Self {
        let event_id = Uuid::new_v4();
        Self {
            undo: Some(ItemEvent {
                event_id,
                uuid,
                change: undo,
            }),
            redo: ItemEvent {
                event_id,
                uuid,
                change: redo,
            },
        }
    }

    /// An entry that can be replayed forwards but not undone.
    pub fn redo_only(uuid: Uuid, redo: ItemChange) -> Self {
        Self {
            undo: None,
            redo: ItemEvent {
                event_id: Uuid::new_v4(),
                uuid,
                change: redo,
            },
        }
    }

    #[inline]
    pub fn event_id(&self) -> Uuid {
        self.redo.event_id
    }
}

// ── Journal ─────────────────────────────────────────────────────

/// Ordered list of journal entries produced by one or more edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Journal(Vec<JournalEntry>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn entries(&self) -> &[JournalEntry] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, JournalEntry> {
        self.0.iter()
    }

    pub fn push(&mut self, entry: JournalEntry) {
        self.0.push(entry);
    }

    /// Append every entry of `other`, keeping order.
    pub fn append(&mut self, other: Journal) {
        self.0.extend(other.0);
    }

    /// The journal that reverses this one. Broadcast-only entries are dropped.
    pub fn inverted(&self) -> Journal {
        Journal(
            self.0
                .iter()
                .rev()
                .filter_map(|entry| {
                    entry.undo.clone().map(|undo| JournalEntry {
                        undo: Some(entry.redo.clone()),
                        redo: undo,
                    })
                })
                .collect(),
        )
    }

    pub fn event_ids(&self) -> Vec<Uuid> {
        self.0.iter().map(JournalEntry::event_id).collect()
    }

    pub fn to_json(&self) -> Result<Value> {
        serde_json::to_value(self)
            .map_err(|e| MontageError::Serialization(format!("Failed to serialize journal: {}", e)))
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        Journal::deserialize(value)
            .map_err(|e| MontageError::Serialization(format!("Invalid journal: {}", e)))
    }
}

impl From<JournalEntry> for Journal {
    fn from(entry: JournalEntry) -> Self {
        Self(vec![entry])
    }
}

impl Extend<JournalEntry> for Journal {
    fn extend<T: IntoIterator<Item = JournalEntry>>(&mut self, iter: T) {
        self.0.extend(iter);
    }
}

impl<'a> IntoIterator for &'a Journal {
    type Item = &'a JournalEntry;
    type IntoIter = std::slice::Iter<'a, JournalEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl IntoIterator for Journal {
    type Item = JournalEntry;
    type IntoIter = std::vec::IntoIter<JournalEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Outcome of applying another replica's journal.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// Event ids applied to this tree.
    pub applied: Vec<Uuid>,
    /// Event ids that matched no item or failed to apply.
    pub unapplied: Vec<Uuid>,
}

impl Reconciliation {
    pub fn is_complete(&self) -> bool {
        self.unapplied.is_empty()
    }
}

// ── Journaled setters ───────────────────────────────────────────

impl Item {
    fn entry(&self, undo: ItemChange, redo: ItemChange) -> JournalEntry {
        JournalEntry::new(self.uuid, undo, redo)
    }

    fn dirty_entry(&mut self) -> JournalEntry {
        self.dirty = true;
        self.entry(ItemChange::MarkDirty, ItemChange::MarkDirty)
    }

    pub fn set_enabled(&mut self, value: bool) -> Journal {
        if self.enabled == value {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetEnabled { value: self.enabled },
            ItemChange::SetEnabled { value },
        );
        self.enabled = value;
        entry.into()
    }

    pub fn set_locked(&mut self, value: bool) -> Journal {
        if self.locked == value {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetLocked { value: self.locked },
            ItemChange::SetLocked { value },
        );
        self.locked = value;
        entry.into()
    }

    pub fn set_name(&mut self, value: impl Into<String>) -> Journal {
        let value = value.into();
        if self.name == value {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetName {
                value: self.name.clone(),
            },
            ItemChange::SetName {
                value: value.clone(),
            },
        );
        self.name = value;
        entry.into()
    }

    pub fn set_flag(&mut self, value: impl Into<String>) -> Journal {
        let value = value.into();
        if self.flag == value {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetFlag {
                value: self.flag.clone(),
            },
            ItemChange::SetFlag {
                value: value.clone(),
            },
        );
        self.flag = value;
        entry.into()
    }

    /// Replace the whole property bag.
    pub fn set_prop(&mut self, value: Value) -> Journal {
        if self.prop == value {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetProperty {
                value: self.prop.clone(),
            },
            ItemChange::SetProperty {
                value: value.clone(),
            },
        );
        self.prop = value;
        entry.into()
    }

    /// Point a clip at different media, or detach it.
    pub fn set_media_uuid(&mut self, media_uuid: Option<Uuid>) -> Journal {
        let mut prop = match &self.prop {
            Value::Object(map) => map.clone(),
            _ => serde_json::Map::new(),
        };
        match media_uuid {
            Some(uuid) => {
                prop.insert(MEDIA_UUID_KEY.to_string(), Value::String(uuid.to_string()));
            }
            None => {
                prop.remove(MEDIA_UUID_KEY);
            }
        }
        self.set_prop(Value::Object(prop))
    }

    pub fn set_markers(&mut self, markers: Vec<Marker>) -> Journal {
        if self.markers == markers {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetMarkers {
                value: self.markers.clone(),
            },
            ItemChange::SetMarkers {
                value: markers.clone(),
            },
        );
        self.markers = markers;
        entry.into()
    }

    pub fn add_marker(&mut self, marker: Marker) -> Journal {
        let mut markers = self.markers.clone();
        markers.push(marker);
        self.set_markers(markers)
    }

    pub fn remove_marker(&mut self, uuid: Uuid) -> Journal {
        let markers: Vec<Marker> = self
            .markers
            .iter()
            .filter(|m| m.uuid != uuid)
            .cloned()
            .collect();
        self.set_markers(markers)
    }

    pub fn set_active_range(&mut self, range: FrameRange) -> Journal {
        self.change_active_range(Some(range))
    }

    /// Drop the active range so the item falls back to its available range.
    pub fn reset_active_range(&mut self) -> Journal {
        self.change_active_range(None)
    }

    pub fn set_available_range(&mut self, range: FrameRange) -> Journal {
        self.change_available_range(Some(range))
    }

    pub fn reset_available_range(&mut self) -> Journal {
        self.change_available_range(None)
    }

    fn change_active_range(&mut self, value: Option<FrameRange>) -> Journal {
        if self.active_range == value {
            return Journal::new();
        }
        let mut journal = Journal::from(self.entry(
            ItemChange::SetActiveRange {
                value: self.active_range,
            },
            ItemChange::SetActiveRange { value },
        ));
        self.active_range = value;
        journal.push(self.dirty_entry());
        journal
    }

    fn change_available_range(&mut self, value: Option<FrameRange>) -> Journal {
        if self.available_range == value {
            return Journal::new();
        }
        let mut journal = Journal::from(self.write_available_range(value));
        journal.push(self.dirty_entry());
        journal
    }

    /// Store a derived available range. Leaves the dirty flag alone.
    pub(crate) fn write_available_range(&mut self, value: Option<FrameRange>) -> JournalEntry {
        let entry = self.entry(
            ItemChange::SetAvailableRange {
                value: self.available_range,
            },
            ItemChange::SetAvailableRange { value },
        );
        self.available_range = value;
        entry
    }

    /// Set both ranges as a single entry.
    pub fn set_range(&mut self, available: FrameRange, active: FrameRange) -> Journal {
        let (available, active) = (Some(available), Some(active));
        if self.available_range == available && self.active_range == active {
            return Journal::new();
        }
        let mut journal = Journal::from(self.entry(
            ItemChange::SetBothRanges {
                active: self.active_range,
                available: self.available_range,
            },
            ItemChange::SetBothRanges { active, available },
        ));
        self.available_range = available;
        self.active_range = active;
        journal.push(self.dirty_entry());
        journal
    }

    /// Bind or clear the external source handle.
    pub fn set_handle(&mut self, handle: Option<ActorHandle>) -> Journal {
        if self.handle == handle {
            return Journal::new();
        }
        let entry = self.entry(
            ItemChange::SetBackReference { value: self.handle },
            ItemChange::SetBackReference { value: handle },
        );
        self.handle = handle;
        entry.into()
    }

    /// Broadcast the current handle binding to replicas.
    pub fn make_handle_update(&self) -> Journal {
        JournalEntry::redo_only(
            self.uuid,
            ItemChange::SetBackReference { value: self.handle },
        )
        .into()
    }

    // ── Structural edits ────────────────────────────────────────

    /// Insert `child` before `index`. `index == len` appends.
    pub fn insert(&mut self, index: usize, child: Item) -> Result<Journal> {
        let len = self.children.len();
        if index > len {
            return Err(MontageError::IndexOutOfRange { index, len });
        }
        let mut journal = Journal::from(self.entry(
            ItemChange::RemoveChild {
                index,
                item_uuid: child.uuid,
            },
            ItemChange::InsertChild {
                index,
                item: child.serialise(usize::MAX),
            },
        ));
        self.insert_direct(index, child);
        journal.push(self.dirty_entry());
        Ok(journal)
    }

    /// Remove the child at `index`.
    pub fn erase(&mut self, index: usize) -> Result<Journal> {
        let len = self.children.len();
        let Some(child) = self.children.get(index) else {
            return Err(MontageError::IndexOutOfRange { index, len });
        };
        let mut journal = Journal::from(self.entry(
            ItemChange::InsertChild {
                index,
                item: child.serialise(usize::MAX),
            },
            ItemChange::RemoveChild {
                index,
                item_uuid: child.uuid,
            },
        ));
        self.children.remove(index);
        journal.push(self.dirty_entry());
        Ok(journal)
    }

    /// Move children `[first, last)` so they sit before the child currently
    /// at `dst`. A destination inside the moved block is pushed one past its
    /// end, and the journal records the adjusted destination.
    pub fn splice(&mut self, dst: usize, first: usize, last: usize) -> Result<Journal> {
        let len = self.children.len();
        check_splice(dst, first, last, len)?;
        let dst = splice_target(dst, first, last, len);
        if first == last || (dst >= first && dst <= last) {
            return Ok(Journal::new());
        }

        let count = last - first;
        let undo = if dst < first {
            ItemChange::SpliceChildren {
                dst: first + count,
                first: dst,
                last: dst + count,
            }
        } else {
            ItemChange::SpliceChildren {
                dst: first,
                first: dst - count,
                last: dst,
            }
        };
        let mut journal = Journal::from(self.entry(
            undo,
            ItemChange::SpliceChildren { dst, first, last },
        ));
        self.splice_direct(dst, first, last)?;
        journal.push(self.dirty_entry());
        Ok(journal)
    }

    fn insert_direct(&mut self, index: usize, mut child: Item) {
        if self.recursive_bind {
            if let Some(callback) = &self.event_callback {
                child.bind_callback_arc(callback.clone(), true);
            }
        }
        self.children.insert(index, child);
    }

    fn splice_direct(&mut self, dst: usize, first: usize, last: usize) -> Result<()> {
        let len = self.children.len();
        check_splice(dst, first, last, len)?;
        let dst = splice_target(dst, first, last, len);
        if first == last || (dst >= first && dst <= last) {
            return Ok(());
        }
        let moved: Vec<Item> = self.children.drain(first..last).collect();
        let position = if dst > last { dst - moved.len() } else { dst };
        let tail = self.children.split_off(position);
        self.children.extend(moved);
        self.children.extend(tail);
        Ok(())
    }

    // ── Replay ──────────────────────────────────────────────────

    /// Replay the undo half of every entry, newest first.
    ///
    /// Entries that no longer fit the tree are logged and skipped.
    pub fn undo(&mut self, journal: &Journal) {
        for entry in journal.iter().rev() {
            if let Some(event) = &entry.undo {
                self.replay(event);
            }
        }
    }

    /// Replay the redo half of every entry, oldest first.
    pub fn redo(&mut self, journal: &Journal) {
        for entry in journal {
            self.replay(&entry.redo);
        }
    }

    /// Apply a journal produced by another copy of this tree.
    pub fn update(&mut self, journal: &Journal) -> Reconciliation {
        let mut result = Reconciliation::default();
        for entry in journal {
            let event = &entry.redo;
            match self.process_event(event) {
                Ok(true) => result.applied.push(event.event_id),
                Ok(false) => {
                    warn!(
                        event_id = %event.event_id,
                        uuid = %event.uuid,
                        action = ?event.action(),
                        "No item matches event"
                    );
                    result.unapplied.push(event.event_id);
                }
                Err(e) => {
                    error!(
                        event_id = %event.event_id,
                        uuid = %event.uuid,
                        error = %e,
                        "Skipping journal entry"
                    );
                    result.unapplied.push(event.event_id);
                }
            }
        }
        result
    }

    fn replay(&mut self, event: &ItemEvent) -> bool {
        match self.process_event(event) {
            Ok(true) => true,
            Ok(false) => {
                warn!(event_id = %event.event_id, uuid = %event.uuid, "No item matches event");
                false
            }
            Err(e) => {
                error!(
                    event_id = %event.event_id,
                    uuid = %event.uuid,
                    error = %e,
                    "Skipping journal entry"
                );
                false
            }
        }
    }

    /// Route `event` to the item it addresses. Returns whether it was found.
    pub fn process_event(&mut self, event: &ItemEvent) -> Result<bool> {
        if event.uuid == self.uuid {
            self.apply_change(&event.change)?;
            if let Some(callback) = self.event_callback.clone() {
                callback(event, self);
            }
            return Ok(true);
        }
        for child in &mut self.children {
            if child.process_event(event)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn apply_change(&mut self, change: &ItemChange) -> Result<()> {
        match change {
            ItemChange::SetEnabled { value } => self.enabled = *value,
            ItemChange::SetLocked { value } => self.locked = *value,
            ItemChange::SetName { value } => self.name = value.clone(),
            ItemChange::SetFlag { value } => self.flag = value.clone(),
            ItemChange::SetProperty { value } => self.prop = value.clone(),
            ItemChange::SetMarkers { value } => self.markers = value.clone(),
            ItemChange::SetActiveRange { value } => self.active_range = *value,
            ItemChange::SetAvailableRange { value } => self.available_range = *value,
            ItemChange::SetBothRanges { active, available } => {
                self.active_range = *active;
                self.available_range = *available;
            }
            ItemChange::InsertChild { index, item } => {
                let len = self.children.len();
                if *index > len {
                    return Err(MontageError::IndexOutOfRange { index: *index, len });
                }
                let child = Item::from_json(item)?;
                self.insert_direct(*index, child);
            }
            ItemChange::RemoveChild { index, item_uuid } => {
                let len = self.children.len();
                let position = match self.children.get(*index) {
                    Some(child) if child.uuid == *item_uuid => *index,
                    _ => {
                        let found = self.index_of_child(*item_uuid).ok_or(
                            MontageError::IndexOutOfRange { index: *index, len },
                        )?;
                        debug!(
                            expected = *index,
                            found,
                            item_uuid = %item_uuid,
                            "Child moved, removing by uuid"
                        );
                        found
                    }
                };
                self.children.remove(position);
            }
            ItemChange::SpliceChildren { dst, first, last } => {
                self.splice_direct(*dst, *first, *last)?;
            }
            ItemChange::SetBackReference { value } => self.handle = *value,
            ItemChange::MarkDirty => self.dirty = true,
        }
        Ok(())
    }
}

fn check_splice(dst: usize, first: usize, last: usize, len: usize) -> Result<()> {
    if first > last || last > len {
        return Err(MontageError::IndexOutOfRange { index: last, len });
    }
    if dst > len {
        return Err(MontageError::IndexOutOfRange { index: dst, len });
    }
    Ok(())
}

/// A block cannot be moved into itself; such destinations land just past it.
fn splice_target(dst: usize, first: usize, last: usize, len: usize) -> usize {
    if dst >= first && dst <= last {
        (last + 1).min(len)
    } else {
        dst
    }
}
