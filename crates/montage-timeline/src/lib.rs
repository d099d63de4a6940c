//! Montage Timeline - Timeline data model and frame baking
//!
//! Implements the editable timeline tree and the engines built on it:
//! - Items (gaps, clips, tracks, stacks, timelines) with markers
//! - Journaled mutation with undo/redo and replica updates
//! - Range refresh, time resolution and layout
//! - Concurrent baking of a timeline into a per-frame map

pub mod bake;
pub mod config;
pub mod handle;
pub mod item;
pub mod journal;
pub mod layout;
pub mod marker;
pub mod refresh;
pub mod resolve;
pub mod serialization;

pub use bake::{BakeOptions, FrameMap, PendingFrameMap};
pub use config::TimelineConfig;
pub use handle::{ActorHandle, ClipRegistry, ClipSource, MediaClipSource};
pub use item::{EventCallback, Item, ItemType, MEDIA_UUID_KEY};
pub use journal::{ItemAction, ItemChange, ItemEvent, Journal, JournalEntry, Reconciliation};
pub use layout::LayoutPoint;
pub use marker::Marker;
pub use resolve::{Resolved, ResolvedLayers};
pub use serialization::{TimelineFile, FILE_VERSION};
