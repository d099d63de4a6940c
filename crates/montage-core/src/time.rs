//! Time representation for frame-accurate editing.
//!
//! Every time value is an integer count of ticks at a fixed, very fine
//! resolution (705,600,000 per second). The tick rate divides evenly into all
//! common film, video and audio frame rates, so arithmetic across mixed frame
//! rates never accumulates error.

use num_rational::Rational64;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Tick resolution constants.
pub mod timebase {
    /// Ticks in one second.
    pub const TICKS_PER_SECOND: i64 = 705_600_000;

    pub const TICKS_23_976FPS: i64 = 29_429_400;
    pub const TICKS_24FPS: i64 = 29_400_000;
    pub const TICKS_25FPS: i64 = 28_224_000;
    pub const TICKS_29_97FPS: i64 = 23_543_520;
    pub const TICKS_30FPS: i64 = 23_520_000;
    pub const TICKS_50FPS: i64 = 14_112_000;
    pub const TICKS_59_94FPS: i64 = 11_771_760;
    pub const TICKS_60FPS: i64 = 11_760_000;
}

// ── TickDuration ────────────────────────────────────────────────

/// A signed duration measured in ticks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TickDuration(i64);

impl TickDuration {
    /// Zero duration.
    pub const ZERO: Self = Self(0);

    /// Create a duration from a raw tick count.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(ticks)
    }

    /// Raw tick count.
    #[inline]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Create a duration from seconds. Rounds to the nearest tick.
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * timebase::TICKS_PER_SECOND as f64).round() as i64)
    }

    /// Convert to seconds as f64.
    #[inline]
    pub fn to_seconds(self) -> f64 {
        self.0 as f64 / timebase::TICKS_PER_SECOND as f64
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Rescale by `numerator / denominator` without intermediate overflow.
    /// Truncates toward zero.
    pub fn rescale(self, numerator: i64, denominator: i64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        Self(((self.0 as i128 * numerator as i128) / denominator as i128) as i64)
    }
}

impl Add for TickDuration {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for TickDuration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for TickDuration {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self(self.0 - rhs.0)
    }
}

impl SubAssign for TickDuration {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

impl Mul<i64> for TickDuration {
    type Output = Self;
    fn mul(self, rhs: i64) -> Self {
        Self(self.0 * rhs)
    }
}

impl Neg for TickDuration {
    type Output = Self;
    fn neg(self) -> Self {
        Self(-self.0)
    }
}

impl Sum for TickDuration {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, d| acc + d)
    }
}

impl fmt::Display for TickDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}s", self.to_seconds())
    }
}

// ── FrameRate ───────────────────────────────────────────────────

/// A frame rate, stored as the period of one frame in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrameRate(TickDuration);

impl FrameRate {
    /// Create a frame rate from a frame period.
    #[inline]
    pub const fn new(period: TickDuration) -> Self {
        Self(period)
    }

    /// Create a frame rate from a frame period in raw ticks.
    #[inline]
    pub const fn from_ticks(ticks: i64) -> Self {
        Self(TickDuration::from_ticks(ticks))
    }

    /// Create a frame rate from frames per second.
    pub fn from_fps(fps: f64) -> Self {
        if fps <= 0.0 {
            return Self(TickDuration::ZERO);
        }
        Self(TickDuration::from_seconds(1.0 / fps))
    }

    /// Create a frame rate from a rational fps (e.g. 24000/1001).
    pub fn from_rational(numerator: i64, denominator: i64) -> Self {
        if numerator <= 0 || denominator <= 0 {
            return Self(TickDuration::ZERO);
        }
        let period = Rational64::new(timebase::TICKS_PER_SECOND * denominator, numerator);
        Self(TickDuration::from_ticks(period.to_integer()))
    }

    /// Period of one frame.
    #[inline]
    pub const fn period(self) -> TickDuration {
        self.0
    }

    /// Frames per second as f64. Zero for a zero period.
    pub fn to_fps(self) -> f64 {
        if self.0.is_zero() {
            return 0.0;
        }
        timebase::TICKS_PER_SECOND as f64 / self.0.ticks() as f64
    }

    /// Frames per second as an exact rational. Zero for a zero period.
    pub fn to_fps_rational(self) -> Rational64 {
        if self.0.is_zero() {
            return Rational64::from_integer(0);
        }
        Rational64::new(timebase::TICKS_PER_SECOND, self.0.ticks())
    }

    /// Length of one frame in seconds.
    #[inline]
    pub fn to_seconds(self) -> f64 {
        self.0.to_seconds()
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Whole frames contained in `duration`, truncating toward zero.
    pub fn frames_in(self, duration: TickDuration) -> i64 {
        if self.0.is_zero() {
            return 0;
        }
        duration.ticks() / self.0.ticks()
    }

    /// Duration of `frames` frames at this rate.
    #[inline]
    pub fn frames_to_ticks(self, frames: i64) -> TickDuration {
        self.0 * frames
    }

    pub const FPS_23_976: Self = Self::from_ticks(timebase::TICKS_23_976FPS);
    pub const FPS_24: Self = Self::from_ticks(timebase::TICKS_24FPS);
    pub const FPS_25: Self = Self::from_ticks(timebase::TICKS_25FPS);
    pub const FPS_29_97: Self = Self::from_ticks(timebase::TICKS_29_97FPS);
    pub const FPS_30: Self = Self::from_ticks(timebase::TICKS_30FPS);
    pub const FPS_50: Self = Self::from_ticks(timebase::TICKS_50FPS);
    pub const FPS_59_94: Self = Self::from_ticks(timebase::TICKS_59_94FPS);
    pub const FPS_60: Self = Self::from_ticks(timebase::TICKS_60FPS);
}

impl Default for FrameRate {
    fn default() -> Self {
        Self::FPS_24
    }
}

impl fmt::Display for FrameRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fps = self.to_fps();
        if (fps - fps.round()).abs() < 0.001 {
            write!(f, "{} fps", fps.round() as u32)
        } else {
            write!(f, "{:.3} fps", fps)
        }
    }
}

// ── FrameRateDuration ───────────────────────────────────────────

/// An elapsed duration paired with the frame rate it was recorded at.
///
/// The `remap` flag on the arithmetic helpers controls how the right hand
/// operand is read when the two rates differ: remapping carries the other
/// operand's frame count over onto this rate, instead of carrying its
/// wall-clock time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRateDuration {
    pub rate: FrameRate,
    pub duration: TickDuration,
}

impl FrameRateDuration {
    #[inline]
    pub const fn new(rate: FrameRate, duration: TickDuration) -> Self {
        Self { rate, duration }
    }

    /// `frames` whole frames at `rate`.
    #[inline]
    pub fn from_frames(frames: i64, rate: FrameRate) -> Self {
        Self::new(rate, rate.frames_to_ticks(frames))
    }

    pub fn from_seconds(seconds: f64, rate: FrameRate) -> Self {
        Self::new(rate, TickDuration::from_seconds(seconds))
    }

    /// Whole frames elapsed at our own rate. Never rounds up.
    #[inline]
    pub fn frames(&self) -> i64 {
        self.rate.frames_in(self.duration)
    }

    /// Whole frames elapsed when measured at another rate.
    #[inline]
    pub fn frames_at(&self, rate: FrameRate) -> i64 {
        rate.frames_in(self.duration)
    }

    /// Frame index containing `time`, measured from zero at our rate.
    #[inline]
    pub fn frame(&self, time: TickDuration) -> i64 {
        self.rate.frames_in(time)
    }

    #[inline]
    pub fn seconds(&self) -> f64 {
        self.duration.to_seconds()
    }

    pub fn set_frames(&mut self, frames: i64) {
        self.duration = self.rate.frames_to_ticks(frames);
    }

    pub fn set_seconds(&mut self, seconds: f64) {
        self.duration = TickDuration::from_seconds(seconds);
    }

    /// Change the rate, keeping either the elapsed time or the frame count.
    pub fn set_rate(&mut self, rate: FrameRate, maintain_duration: bool) {
        if !maintain_duration {
            let frames = self.frames();
            self.rate = rate;
            self.set_frames(frames);
        } else {
            self.rate = rate;
        }
    }

    /// Add whole frames of `other`.
    pub fn add_frames(&self, other: &Self, remap: bool) -> Self {
        let frames = self.other_frames(other, remap);
        Self::new(self.rate, self.duration + self.rate.frames_to_ticks(frames))
    }

    /// Subtract whole frames of `other`.
    pub fn subtract_frames(&self, other: &Self, remap: bool) -> Self {
        let frames = self.other_frames(other, remap);
        Self::new(self.rate, self.duration - self.rate.frames_to_ticks(frames))
    }

    /// Add the exact elapsed time of `other`.
    pub fn add_seconds(&self, other: &Self, remap: bool) -> Self {
        Self::new(self.rate, self.duration + self.other_ticks(other, remap))
    }

    /// Subtract the exact elapsed time of `other`.
    pub fn subtract_seconds(&self, other: &Self, remap: bool) -> Self {
        Self::new(self.rate, self.duration - self.other_ticks(other, remap))
    }

    fn other_frames(&self, other: &Self, remap: bool) -> i64 {
        if remap {
            other.frames()
        } else {
            other.frames_at(self.rate)
        }
    }

    /// Remapped operands contribute their real elapsed time; otherwise
    /// their frame count is replayed at our rate.
    fn other_ticks(&self, other: &Self, remap: bool) -> TickDuration {
        if remap || other.rate.is_zero() || other.rate == self.rate {
            other.duration
        } else {
            other
                .duration
                .rescale(self.rate.period().ticks(), other.rate.period().ticks())
        }
    }
}

impl Add for FrameRateDuration {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.rate, self.duration + rhs.duration)
    }
}

impl Sub for FrameRateDuration {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.rate, self.duration - rhs.duration)
    }
}

impl fmt::Display for FrameRateDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} frames @ {}", self.frames(), self.rate)
    }
}

// ── FrameRange ──────────────────────────────────────────────────

/// A half-open span `[start, start + duration)` tagged with a frame rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameRange {
    pub rate: FrameRate,
    pub start: TickDuration,
    pub duration: TickDuration,
}

impl FrameRange {
    #[inline]
    pub const fn new(rate: FrameRate, start: TickDuration, duration: TickDuration) -> Self {
        Self {
            rate,
            start,
            duration,
        }
    }

    /// Build a range from frame counts at `rate`.
    pub fn from_frames(start: i64, duration: i64, rate: FrameRate) -> Self {
        Self::new(
            rate,
            rate.frames_to_ticks(start),
            rate.frames_to_ticks(duration),
        )
    }

    /// Build a range from a start and a duration. The duration's rate wins.
    pub fn from_durations(start: FrameRateDuration, duration: FrameRateDuration) -> Self {
        Self::new(duration.rate, start.duration, duration.duration)
    }

    /// Zero-length range at the origin.
    pub fn empty(rate: FrameRate) -> Self {
        Self::new(rate, TickDuration::ZERO, TickDuration::ZERO)
    }

    #[inline]
    pub fn end(&self) -> TickDuration {
        self.start + self.duration
    }

    #[inline]
    pub fn frame_start(&self) -> FrameRateDuration {
        FrameRateDuration::new(self.rate, self.start)
    }

    #[inline]
    pub fn frame_duration(&self) -> FrameRateDuration {
        FrameRateDuration::new(self.rate, self.duration)
    }

    #[inline]
    pub fn frame_end(&self) -> FrameRateDuration {
        FrameRateDuration::new(self.rate, self.end())
    }

    pub fn set_start(&mut self, start: TickDuration) {
        self.start = start;
    }

    pub fn set_duration(&mut self, duration: TickDuration) {
        self.duration = duration;
    }

    pub fn set_rate(&mut self, rate: FrameRate) {
        self.rate = rate;
    }

    #[inline]
    pub fn contains(&self, time: TickDuration) -> bool {
        time >= self.start && time < self.end()
    }

    /// Clip `other` to this range.
    ///
    /// A range entirely after us collapses to zero length at our end; one
    /// entirely before us collapses to zero length at our start. The result
    /// keeps `other`'s rate.
    pub fn intersect(&self, other: &Self) -> Self {
        if other.start >= self.end() {
            return Self::new(other.rate, self.end(), TickDuration::ZERO);
        }
        if other.end() <= self.start {
            return Self::new(other.rate, self.start, TickDuration::ZERO);
        }
        let start = self.start.max(other.start);
        let end = self.end().min(other.end());
        Self::new(other.rate, start, end - start)
    }
}

impl fmt::Display for FrameRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, +{}) @ {}",
            self.frame_start().frames(),
            self.frame_duration().frames(),
            self.rate
        )
    }
}
