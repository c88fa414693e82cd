//! Shared types for the overlay pipeline: entity identity, kind tags,
//! per-kind tables, colors and screen-space geometry.
//!
//! # Invariants
//! - `EntityId` is owned by the host; the overlay only ever holds copies.
//! - `PerKind` is a fixed table indexed by `EntityKind`, never a type walk.

mod types;

pub use types::{CameraPose, EntityId, EntityKind, KindSet, PerKind, Rect, Rgba, ScreenProjection};

pub fn crate_info() -> &'static str {
    "waymark-common v0.1.0"
}
