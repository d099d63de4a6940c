//! Montage Core - Foundation types for the timeline engine
//!
//! This crate provides the fundamental types used throughout Montage:
//! - Time representation (TickDuration, FrameRate, FrameRateDuration, FrameRange)
//! - Media identity (MediaType, TimeSourceMode, FrameId)
//! - The shared error type

pub mod error;
pub mod media;
pub mod time;

pub use error::{MontageError, Result};
pub use media::{FrameId, MediaType, TimeSourceMode};
pub use time::{timebase, FrameRange, FrameRate, FrameRateDuration, TickDuration};
