//! Integration test crate for Montage.
//!
//! This crate exists solely to hold cross-crate integration tests.
//! It depends on montage-core and montage-timeline to verify they work
//! together.

#[cfg(test)]
mod timeline;

#[cfg(test)]
mod bake;

#[cfg(test)]
mod journal;

/// Shared construction of the reference edit used across test modules.
#[cfg(test)]
mod fixtures;
