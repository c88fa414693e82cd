//! Drawing: pooled box/line/text primitives, batching by visual state, and
//! the backend interface the batches are flushed to.
//!
//! # Invariants
//! - Pooled primitives live for the lifetime of their pool; checkout and
//!   release never free memory.
//! - A `Handle` is move-only and consumed on release, so a primitive cannot
//!   be returned twice or touched after return.
//! - Batching changes draw-call count and order only, never the drawn set.

mod backend;
mod batch;
mod pool;
mod primitives;

pub use backend::{DebugTextBackend, DrawBackend, DrawCall, RecordingBackend};
pub use batch::{BatchCompositor, BatchKey, FlushStats};
pub use pool::{Handle, Pool, PoolStats, Reset, SlotKey};
pub use primitives::{
    BoxHandle, BoxPrimitive, LineHandle, LinePrimitive, PoolCapacities, PrimitiveKind,
    Pooled, PrimitivePools, PrimitiveStats, TextHandle, TextPrimitive,
};

pub fn crate_info() -> &'static str {
    "waymark-draw v0.1.0"
}
