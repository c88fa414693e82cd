//! Visibility: turn tracked entity ids into per-frame screen-space records.
//!
//! # Invariants
//! - Every candidate is re-validated against the host before it is read.
//! - A record exists only for entities within range, in front of the
//!   camera, on screen, and (when enabled) inside the FOV cone.
//! - An unavailable camera yields an empty frame, never an error.

mod lod;
mod resolver;
mod screen_cache;
mod settings;

pub use lod::{BoxGeometry, LodTier, box_geometry, opacity_at};
pub use resolver::{ResolveStats, VisibilityRecord, VisibilityResolver};
pub use screen_cache::{CachedProjection, ScreenCache};
pub use settings::{BoxSizing, KindProfile, LodThresholds, VisibilitySettings};

pub fn crate_info() -> &'static str {
    "waymark-visibility v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("visibility"));
    }
}
