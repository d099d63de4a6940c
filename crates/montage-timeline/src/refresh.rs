//! Bottom-up recomputation of container ranges.

use montage_core::{FrameRange, TickDuration};

use crate::item::{Item, ItemType};
use crate::journal::Journal;

impl Item {
    /// Recompute the available range of every container down to `depth`
    /// levels, children first.
    ///
    /// Tracks take the sum of their children, stacks the longest child and
    /// timelines the sum of their stacks. Leaves are left alone. Only ranges
    /// that actually changed show up in the returned journal. Clears the
    /// dirty flag of every refreshed item.
    pub fn refresh(&mut self, depth: usize) -> Journal {
        if depth == 0 {
            return Journal::new();
        }

        let mut journal = Journal::new();
        for child in &mut self.children {
            journal.append(child.refresh(depth - 1));
        }

        let existing_start = self
            .available_range
            .map(|r| r.start)
            .unwrap_or(TickDuration::ZERO);

        let computed = match self.item_type {
            ItemType::Timeline => Some((existing_start, self.sum_child_durations())),
            ItemType::Stack => Some((existing_start, self.max_child_duration())),
            ItemType::VideoTrack | ItemType::AudioTrack => {
                Some((TickDuration::ZERO, self.sum_child_durations()))
            }
            ItemType::Gap | ItemType::Clip | ItemType::None => None,
        };

        if let Some((start, duration)) = computed {
            if self.available_duration() != Some(duration) {
                let range = FrameRange::new(self.rate(), start, duration);
                journal.push(self.write_available_range(Some(range)));
            }
        }

        self.dirty = false;
        journal
    }

    fn sum_child_durations(&self) -> TickDuration {
        self.children.iter().map(Item::trimmed_duration).sum()
    }

    fn max_child_duration(&self) -> TickDuration {
        self.children
            .iter()
            .map(Item::trimmed_duration)
            .max()
            .unwrap_or(TickDuration::ZERO)
    }
}
