//! Media identity types shared between the timeline and playback.
//!
//! A [`FrameId`] names one frame of source media. It carries no pixel data;
//! decoding and caching are handled downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::time::FrameRate;

/// Kind of media a track or request carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    #[default]
    Image,
    Audio,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// How playback time advances when a timeline is baked to frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeSourceMode {
    /// Step at a caller supplied rate.
    Fixed,
    /// Step at the timeline's own rate.
    #[default]
    Dynamic,
    /// Step at the timeline's rate, but read each clip at its own rate.
    Remapped,
}

/// Identity of a single frame of source media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId {
    pub media_type: MediaType,
    /// Location of the media. Empty for blank frames.
    pub uri: String,
    /// Frame number within the media.
    pub frame: i64,
    pub rate: FrameRate,
    pub media_uuid: Option<Uuid>,
    /// Timeline clip that produced this frame, if any.
    pub clip_uuid: Option<Uuid>,
}

impl FrameId {
    pub fn new(media_type: MediaType, uri: impl Into<String>, frame: i64, rate: FrameRate) -> Self {
        Self {
            media_type,
            uri: uri.into(),
            frame,
            rate,
            media_uuid: None,
            clip_uuid: None,
        }
    }

    /// Placeholder used wherever no media contributes.
    pub fn blank(media_type: MediaType) -> Self {
        Self {
            media_type,
            uri: String::new(),
            frame: i64::MIN,
            rate: FrameRate::default(),
            media_uuid: None,
            clip_uuid: None,
        }
    }

    pub fn with_media(mut self, media_uuid: Uuid) -> Self {
        self.media_uuid = Some(media_uuid);
        self
    }

    pub fn with_clip(mut self, clip_uuid: Uuid) -> Self {
        self.clip_uuid = Some(clip_uuid);
        self
    }

    #[inline]
    pub fn is_blank(&self) -> bool {
        self.uri.is_empty()
    }

    /// Cache key in the form `uri@frame`.
    pub fn key(&self) -> String {
        if self.is_blank() {
            return String::from("blank");
        }
        format!("{}@{}", self.uri, self.frame)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}
