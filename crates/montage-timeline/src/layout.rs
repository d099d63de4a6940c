//! 2-D placement of items for timeline views.
//!
//! x is time in frames from the start of the queried item, y is compositing
//! depth in rows. Tracks lay children out along x, stacks along y.

use uuid::Uuid;

use crate::item::{Item, ItemType};

/// A point in (frame, row) space.
pub type LayoutPoint = (i64, i64);

impl Item {
    /// Rows this item occupies. An empty track is still one row; an empty
    /// stack has none.
    pub fn height(&self) -> i64 {
        match self.item_type {
            ItemType::VideoTrack | ItemType::AudioTrack => {
                self.children.iter().map(Item::height).max().unwrap_or(1)
            }
            ItemType::Stack | ItemType::Timeline => {
                self.children.iter().map(Item::height).sum()
            }
            ItemType::Gap | ItemType::Clip | ItemType::None => 1,
        }
    }

    /// Top-left and bottom-right corners of the descendant `uuid`.
    pub fn layout_box(&self, uuid: Uuid) -> Option<(LayoutPoint, LayoutPoint)> {
        self.locate(uuid, 0, 0)
    }

    pub fn top_left(&self, uuid: Uuid) -> Option<LayoutPoint> {
        self.layout_box(uuid).map(|(tl, _)| tl)
    }

    pub fn bottom_right(&self, uuid: Uuid) -> Option<LayoutPoint> {
        self.layout_box(uuid).map(|(_, br)| br)
    }

    fn locate(&self, uuid: Uuid, x: i64, y: i64) -> Option<(LayoutPoint, LayoutPoint)> {
        if self.uuid == uuid {
            let width = self.trimmed_frame_duration().frames();
            return Some(((x, y), (x + width, y + self.height())));
        }

        match self.item_type {
            ItemType::VideoTrack | ItemType::AudioTrack => {
                let mut cx = x;
                for child in &self.children {
                    if let Some(found) = child.locate(uuid, cx, y) {
                        return Some(found);
                    }
                    cx += child.trimmed_frame_duration().frames();
                }
                None
            }
            ItemType::Stack => {
                let mut cy = y;
                for child in &self.children {
                    if let Some(found) = child.locate(uuid, x, cy) {
                        return Some(found);
                    }
                    cy += child.height();
                }
                None
            }
            ItemType::Timeline => self
                .children
                .iter()
                .find_map(|child| child.locate(uuid, x, y)),
            ItemType::Gap | ItemType::Clip | ItemType::None => None,
        }
    }
}
