//! Spatial partitioning for proximity queries around the observer.
//!
//! # Invariants
//! - An entity occupies at most one cell at a time.
//! - Range queries never miss an entity inside the radius; callers filter
//!   the boundary false positives with an exact distance check.
//! - Non-finite positions are rejected without touching the grid.
//!
//! Cell membership is a cache of the entity tracker, rebuilt once per scan
//! refresh and nudged incrementally between scans.

mod grid;

pub use grid::{CellCoord, RebuildStats, SpatialError, SpatialIndex, DEFAULT_CELL_SIZE};

pub fn crate_info() -> &'static str {
    "waymark-spatial v0.1.0"
}
