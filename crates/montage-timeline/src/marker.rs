//! Range annotations attached to timeline items.

use montage_core::{FrameRange, TickDuration};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A labeled sub-range of an item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    /// Unique marker ID
    pub uuid: Uuid,
    /// Span covered, in the owning item's local time
    pub range: FrameRange,
    /// Label shown in the UI
    #[serde(default)]
    pub name: String,
    /// Color tag
    #[serde(default)]
    pub flag: String,
    /// Free-form properties
    #[serde(default)]
    pub prop: serde_json::Value,
}

impl Marker {
    /// Create an unnamed marker over `range`.
    pub fn new(range: FrameRange) -> Self {
        Self {
            uuid: Uuid::new_v4(),
            range,
            name: String::new(),
            flag: String::new(),
            prop: serde_json::Value::Null,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = flag.into();
        self
    }

    pub fn with_prop(mut self, prop: serde_json::Value) -> Self {
        self.prop = prop;
        self
    }

    #[inline]
    pub fn start(&self) -> TickDuration {
        self.range.start
    }

    #[inline]
    pub fn duration(&self) -> TickDuration {
        self.range.duration
    }

    /// Whether `time` falls inside the marked span.
    #[inline]
    pub fn contains(&self, time: TickDuration) -> bool {
        self.range.contains(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use montage_core::FrameRate;

    #[test]
    fn test_marker_contains() {
        let marker =
            Marker::new(FrameRange::from_frames(10, 5, FrameRate::FPS_24)).with_name("note");
        assert!(marker.contains(FrameRate::FPS_24.frames_to_ticks(10)));
        assert!(marker.contains(FrameRate::FPS_24.frames_to_ticks(14)));
        assert!(!marker.contains(FrameRate::FPS_24.frames_to_ticks(15)));
        assert_eq!(marker.name, "note");
    }

    #[test]
    fn test_marker_json_defaults() {
        let uuid = Uuid::new_v4();
        let marker: Marker = serde_json::from_value(serde_json::json!({
            "uuid": uuid,
            "range": {"rate": 29_400_000, "start": 0, "duration": 29_400_000},
        }))
        .unwrap();
        assert_eq!(marker.uuid, uuid);
        assert!(marker.name.is_empty());
        assert!(marker.prop.is_null());
        assert_eq!(marker.duration(), TickDuration::from_ticks(29_400_000));
    }
}
