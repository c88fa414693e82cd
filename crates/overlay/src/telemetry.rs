use std::fmt;
use std::time::Duration;
use waymark_common::PerKind;
use waymark_draw::PrimitiveStats;

/// Frames of history kept by the overlay's frame timer.
pub const FRAME_HISTORY: usize = 120;

/// Rolling window of frame durations.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    history: Vec<Duration>,
    next: usize,
    len: usize,
}

impl FrameTimer {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: vec![Duration::ZERO; capacity.max(1)],
            next: 0,
            len: 0,
        }
    }

    pub fn record(&mut self, dt: Duration) {
        self.history[self.next] = dt;
        self.next = (self.next + 1) % self.history.len();
        self.len = (self.len + 1).min(self.history.len());
    }

    fn window(&self) -> &[Duration] {
        &self.history[..self.len]
    }

    pub fn average(&self) -> Duration {
        match self.len {
            0 => Duration::ZERO,
            n => self.window().iter().sum::<Duration>() / n as u32,
        }
    }

    pub fn max(&self) -> Duration {
        self.window().iter().copied().max().unwrap_or(Duration::ZERO)
    }

    pub fn min(&self) -> Duration {
        self.window().iter().copied().min().unwrap_or(Duration::ZERO)
    }

    /// Most recently recorded duration.
    pub fn last(&self) -> Option<Duration> {
        if self.len == 0 {
            return None;
        }
        let index = (self.next + self.history.len() - 1) % self.history.len();
        Some(self.history[index])
    }

    pub fn count(&self) -> usize {
        self.len
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new(FRAME_HISTORY)
    }
}

/// Read-only overlay counters, updated once per frame.
#[derive(Debug, Clone, Default)]
pub struct OverlayTelemetry {
    pub tracked: PerKind<usize>,
    pub last_scan: Duration,
    pub last_render: Duration,
    pub frame_times: FrameTimer,
    pub pools: PrimitiveStats,
    pub enumeration_errors: u64,
    pub stale_evictions: u64,
    pub cleanup_evictions: u64,
    pub index_rejections: u64,
    pub frames: u64,
}

impl OverlayTelemetry {
    pub fn tracked_total(&self) -> usize {
        self.tracked.values().sum()
    }
}

impl fmt::Display for OverlayTelemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "frames rendered: {}", self.frames)?;
        write!(f, "tracked: {}", self.tracked_total())?;
        for (kind, count) in self.tracked.iter() {
            write!(f, " {kind}={count}")?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "frame time: avg={:?} min={:?} max={:?} (last {} frames)",
            self.frame_times.average(),
            self.frame_times.min(),
            self.frame_times.max(),
            self.frame_times.count()
        )?;
        writeln!(
            f,
            "last scan: {:?}, last render: {:?}",
            self.last_scan, self.last_render
        )?;
        for (name, stats) in [
            ("box", &self.pools.boxes),
            ("line", &self.pools.lines),
            ("text", &self.pools.texts),
        ] {
            writeln!(
                f,
                "pool {name}: allocated={} peak={} overflow={}",
                stats.allocated, stats.peak_in_use, stats.overflow_allocations
            )?;
        }
        write!(
            f,
            "enumeration errors: {}, stale evictions: {}, cleanup evictions: {}",
            self.enumeration_errors, self.stale_evictions, self.cleanup_evictions
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_common::EntityKind;

    #[test]
    fn frame_timer_basic() {
        let mut timer = FrameTimer::new(4);
        assert_eq!(timer.average(), Duration::ZERO);
        assert_eq!(timer.last(), None);

        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        assert_eq!(timer.count(), 2);
        assert_eq!(timer.average(), Duration::from_millis(15));
        assert_eq!(timer.min(), Duration::from_millis(10));
        assert_eq!(timer.max(), Duration::from_millis(20));
        assert_eq!(timer.last(), Some(Duration::from_millis(20)));
    }

    #[test]
    fn frame_timer_wraps() {
        let mut timer = FrameTimer::new(3);
        for ms in [100, 1, 2, 3] {
            timer.record(Duration::from_millis(ms));
        }
        assert_eq!(timer.count(), 3);
        assert_eq!(timer.max(), Duration::from_millis(3));
        assert_eq!(timer.average(), Duration::from_millis(2));
        assert_eq!(timer.last(), Some(Duration::from_millis(3)));
    }

    #[test]
    fn display_lists_kinds() {
        let mut telemetry = OverlayTelemetry::default();
        telemetry.tracked[EntityKind::Enemy] = 3;
        telemetry.tracked[EntityKind::Npc] = 1;
        let text = telemetry.to_string();
        assert!(text.contains("tracked: 4"));
        assert!(text.contains("Enemy=3"));
        assert!(text.contains("NPC=1"));
    }
}
