//! Verso Versions
//!
//! The ordered history of an interface.
//!
//! # Core Concepts
//!
//! - [`VersionGraph`]: Validated, strictly descending list of versions
//! - [`Hop`]: One step between adjacent versions with the changes it crosses
//! - [`Direction`]: Backward (responses) or forward (requests)
//!
//! Changes attached to a version describe the move from that version to its
//! predecessor, so the oldest version never carries changes.

#![warn(unreachable_pub)]

mod error;
mod graph;

pub use error::{Result, VersionGraphError};
pub use graph::{Direction, Hop, VersionGraph};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
