//! Overlay orchestration: the per-frame loop that ties tracking, indexing,
//! visibility and pooled drawing together.
//!
//! # Invariants
//! - The orchestrator is the only writer of overlay state; nothing is global.
//! - Every primitive checked out during a frame is back in its pool when
//!   `frame` returns.
//! - A failing scan, missing camera or vanished entity degrades the frame
//!   and never aborts it.

mod orchestrator;
mod settings;
mod telemetry;

pub use orchestrator::{FramePhase, FrameReport, Marker, OverlayOrchestrator};
pub use settings::{
    GridSettings, LodSettings, OverlaySettings, PoolSettings, SCAN_INTERVAL_RANGE,
    ScreenCacheSettings, SettingsError, StyleSettings,
};
pub use telemetry::{FRAME_HISTORY, FrameTimer, OverlayTelemetry};

pub fn crate_info() -> &'static str {
    "waymark-overlay v0.1.0"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_loads() {
        assert!(crate_info().contains("overlay"));
    }
}
