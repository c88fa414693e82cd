//! Entity tracking: one tracked set per kind, fed by host lifecycle hooks
//! and backstopped by periodic full enumeration.
//!
//! # Invariants
//! - Both update paths funnel through idempotent `upsert`/`evict`, so each
//!   kind has exactly one source of truth.
//! - An enumeration failure never clears tracked state.
//! - Dead entries leave the set within one cleanup cycle.

mod schedule;
mod tracker;

pub use schedule::ScanSchedule;
pub use tracker::{
    CacheError, EntityCache, KindDiff, RefreshReport, TrackedEntity, TrackedSet, UpsertOutcome,
};

pub fn crate_info() -> &'static str {
    "waymark-cache v0.1.0"
}
