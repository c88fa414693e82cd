use std::time::{Duration, Instant};
use waymark_common::{EntityKind, KindSet, PerKind};

/// Tracks when each kind was last fully enumerated.
#[derive(Debug, Clone, Default)]
pub struct ScanSchedule {
    last: PerKind<Option<Instant>>,
}

impl ScanSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enabled kinds whose interval has elapsed. Never-scanned kinds are due.
    pub fn due(&self, now: Instant, intervals: &PerKind<Duration>, enabled: KindSet) -> KindSet {
        enabled
            .iter()
            .filter(|&kind| match self.last[kind] {
                None => true,
                Some(at) => now.saturating_duration_since(at) >= intervals[kind],
            })
            .collect()
    }

    pub fn mark(&mut self, kind: EntityKind, now: Instant) {
        self.last[kind] = Some(now);
    }

    pub fn mark_all(&mut self, kinds: KindSet, now: Instant) {
        for kind in kinds.iter() {
            self.mark(kind, now);
        }
    }

    /// Force `kind` to be due on the next check.
    pub fn reset(&mut self, kind: EntityKind) {
        self.last[kind] = None;
    }

    pub fn last_scan(&self, kind: EntityKind) -> Option<Instant> {
        self.last[kind]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn intervals() -> PerKind<Duration> {
        PerKind::from_fn(|kind| match kind {
            EntityKind::Enemy => Duration::from_millis(1000),
            _ => Duration::from_millis(2000),
        })
    }

    #[test]
    fn unscanned_kinds_are_due() {
        let schedule = ScanSchedule::new();
        let due = schedule.due(Instant::now(), &intervals(), KindSet::ALL);
        assert_eq!(due, KindSet::ALL);
    }

    #[test]
    fn disabled_kinds_are_never_due() {
        let schedule = ScanSchedule::new();
        let enabled = KindSet::only(EntityKind::Item);
        let due = schedule.due(Instant::now(), &intervals(), enabled);
        assert_eq!(due, enabled);
    }

    #[test]
    fn per_kind_intervals() {
        let t0 = Instant::now();
        let mut schedule = ScanSchedule::new();
        schedule.mark_all(KindSet::ALL, t0);

        assert!(schedule.due(t0 + Duration::from_millis(500), &intervals(), KindSet::ALL).is_empty());

        let due = schedule.due(t0 + Duration::from_millis(1000), &intervals(), KindSet::ALL);
        assert_eq!(due, KindSet::only(EntityKind::Enemy));

        let due = schedule.due(t0 + Duration::from_millis(2500), &intervals(), KindSet::ALL);
        assert_eq!(due, KindSet::ALL);
    }

    #[test]
    fn reset_forces_rescan() {
        let t0 = Instant::now();
        let mut schedule = ScanSchedule::new();
        schedule.mark(EntityKind::Npc, t0);
        assert_eq!(schedule.last_scan(EntityKind::Npc), Some(t0));
        schedule.reset(EntityKind::Npc);
        assert!(schedule.due(t0, &intervals(), KindSet::only(EntityKind::Npc)).contains(EntityKind::Npc));
    }
}
