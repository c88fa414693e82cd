use glam::Vec3;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::time::Instant;
use waymark_common::{EntityId, EntityKind, KindSet, PerKind};
use waymark_host::{EntitySource, HostError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CacheError {
    #[error("refresh of {kind} failed, keeping {kept} tracked entities: {source}")]
    Enumeration {
        kind: EntityKind,
        kept: usize,
        #[source]
        source: HostError,
    },
}

/// Last validated facts about a tracked entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub last_position: Vec3,
    pub last_seen: Instant,
}

/// Entities of one kind seen alive by the latest scan or hook.
#[derive(Debug, Default)]
pub struct TrackedSet {
    entries: BTreeMap<EntityId, TrackedEntity>,
}

impl TrackedSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        self.entries.get(&id)
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedEntity> {
        self.entries.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entries.keys().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Dead, unknown, or at a non-finite position; not tracked.
    Rejected,
}

/// Result of reconciling one kind against a full enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindDiff {
    pub kind: EntityKind,
    pub enumerated: usize,
    pub added: usize,
    pub removed: usize,
}

/// Outcome of a multi-kind refresh. Failed kinds keep their previous set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub diffs: Vec<KindDiff>,
    errors: Vec<CacheError>,
}

impl RefreshReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[CacheError] {
        &self.errors
    }

    pub fn added(&self) -> usize {
        self.diffs.iter().map(|d| d.added).sum()
    }

    pub fn removed(&self) -> usize {
        self.diffs.iter().map(|d| d.removed).sum()
    }
}

/// Tracked sets for every kind plus the id → kind lookup that keeps
/// eviction O(log n).
///
/// The cache holds ids and last-known facts only. Anything read from it must
/// be re-validated against the host before use.
#[derive(Debug)]
pub struct EntityCache {
    sets: PerKind<TrackedSet>,
    kinds: HashMap<EntityId, EntityKind>,
    scratch: Vec<EntityId>,
    seen: HashSet<EntityId>,
    removals: Vec<EntityId>,
}

impl Default for EntityCache {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityCache {
    pub fn new() -> Self {
        Self {
            sets: PerKind::from_fn(|_| TrackedSet::default()),
            kinds: HashMap::new(),
            scratch: Vec::new(),
            seen: HashSet::new(),
            removals: Vec::new(),
        }
    }

    /// Snapshot of the tracked set for `kind`.
    pub fn get_all(&self, kind: EntityKind) -> &TrackedSet {
        &self.sets[kind]
    }

    pub fn get(&self, id: EntityId) -> Option<&TrackedEntity> {
        let kind = self.kinds.get(&id)?;
        self.sets[*kind].get(id)
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.kinds.get(&id).copied()
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.kinds.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn counts(&self) -> PerKind<usize> {
        self.sets.map(|_, set| set.len())
    }

    /// Tracked entities of every kind in `filter`.
    pub fn tracked(&self, filter: KindSet) -> impl Iterator<Item = &TrackedEntity> {
        filter.iter().flat_map(move |kind| self.sets[kind].iter())
    }

    /// Validate `id` against the host and insert or refresh it.
    ///
    /// Idempotent: repeated calls for the same live entity only refresh its
    /// position. Dead or unknown entities are evicted instead.
    pub fn upsert<H>(&mut self, host: &H, id: EntityId, now: Instant) -> UpsertOutcome
    where
        H: EntitySource + ?Sized,
    {
        if !host.is_alive(id) {
            self.evict(id);
            return UpsertOutcome::Rejected;
        }
        let Some(kind) = host.kind(id) else {
            self.evict(id);
            return UpsertOutcome::Rejected;
        };
        let Some(position) = host.position(id).filter(|p| p.is_finite()) else {
            tracing::debug!(%id, %kind, "skipping entity without a finite position");
            return UpsertOutcome::Rejected;
        };

        if let Some(previous) = self.kinds.insert(id, kind)
            && previous != kind
        {
            self.sets[previous].entries.remove(&id);
        }

        let entry = TrackedEntity {
            id,
            kind,
            last_position: position,
            last_seen: now,
        };
        match self.sets[kind].entries.insert(id, entry) {
            Some(_) => UpsertOutcome::Updated,
            None => UpsertOutcome::Inserted,
        }
    }

    /// Stop tracking `id`. Idempotent.
    pub fn evict(&mut self, id: EntityId) -> Option<TrackedEntity> {
        let kind = self.kinds.remove(&id)?;
        self.sets[kind].entries.remove(&id)
    }

    /// Hook path: an entity was created.
    pub fn on_spawned<H>(&mut self, host: &H, id: EntityId, now: Instant) -> UpsertOutcome
    where
        H: EntitySource + ?Sized,
    {
        self.upsert(host, id, now)
    }

    /// Hook path: an entity was destroyed.
    pub fn on_despawned(&mut self, id: EntityId) -> Option<TrackedEntity> {
        self.evict(id)
    }

    /// Record a fresher position observed outside a scan.
    pub fn note_position(&mut self, id: EntityId, position: Vec3, now: Instant) {
        if !position.is_finite() {
            return;
        }
        if let Some(kind) = self.kinds.get(&id)
            && let Some(entry) = self.sets[*kind].entries.get_mut(&id)
        {
            entry.last_position = position;
            entry.last_seen = now;
        }
    }

    /// Reconcile `kind` against a full host enumeration.
    ///
    /// Live enumerated entities are upserted; tracked entities missing from
    /// the enumeration, or dead, are evicted. If the host fails to enumerate,
    /// the tracked set is left exactly as it was.
    pub fn refresh_kind<H>(
        &mut self,
        host: &H,
        kind: EntityKind,
        now: Instant,
    ) -> Result<KindDiff, CacheError>
    where
        H: EntitySource + ?Sized,
    {
        let _span = tracing::debug_span!("entity_refresh", %kind).entered();

        let mut ids = std::mem::take(&mut self.scratch);
        ids.clear();
        if let Err(source) = host.enumerate(kind, &mut ids) {
            self.scratch = ids;
            return Err(CacheError::Enumeration {
                kind,
                kept: self.sets[kind].len(),
                source,
            });
        }

        let before = self.sets[kind].len();
        let mut added = 0;
        self.seen.clear();
        for &id in &ids {
            match self.upsert(host, id, now) {
                UpsertOutcome::Inserted => {
                    added += 1;
                    self.seen.insert(id);
                }
                UpsertOutcome::Updated => {
                    self.seen.insert(id);
                }
                UpsertOutcome::Rejected => {}
            }
        }
        let enumerated = ids.len();
        self.scratch = ids;

        self.removals.clear();
        self.removals.extend(
            self.sets[kind]
                .ids()
                .filter(|id| !self.seen.contains(id)),
        );
        let mut removals = std::mem::take(&mut self.removals);
        for id in removals.drain(..) {
            self.evict(id);
        }
        self.removals = removals;

        let after = self.sets[kind].len();
        let diff = KindDiff {
            kind,
            enumerated,
            added,
            removed: (before + added).saturating_sub(after),
        };
        tracing::debug!(
            %kind,
            enumerated,
            added = diff.added,
            removed = diff.removed,
            tracked = after,
            "refreshed tracked set"
        );
        Ok(diff)
    }

    /// Refresh every kind in `filter`. One failing kind does not stop the rest.
    pub fn refresh<H>(&mut self, host: &H, filter: KindSet, now: Instant) -> RefreshReport
    where
        H: EntitySource + ?Sized,
    {
        let mut report = RefreshReport::default();
        for kind in filter.iter() {
            match self.refresh_kind(host, kind, now) {
                Ok(diff) => report.diffs.push(diff),
                Err(err) => report.errors.push(err),
            }
        }
        report
    }

    /// Evict every entry that fails the host liveness check, appending the
    /// evicted ids to `removed`. Returns how many were evicted.
    pub fn cleanup_invalid<H>(&mut self, host: &H, removed: &mut Vec<EntityId>) -> usize
    where
        H: EntitySource + ?Sized,
    {
        let start = removed.len();
        removed.extend(self.kinds.keys().copied().filter(|id| !host.is_alive(*id)));
        for &id in &removed[start..] {
            self.evict(id);
        }
        let count = removed.len() - start;
        if count > 0 {
            tracing::debug!(count, "evicted dead entities");
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use waymark_host::{HostEvent, SimWorld};

    fn now() -> Instant {
        Instant::now()
    }

    #[test]
    fn refresh_adds_live_entities() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Enemy, Vec3::ZERO);
        let b = world.spawn(EntityKind::Enemy, Vec3::ONE);
        world.spawn(EntityKind::Animal, Vec3::ONE);

        let mut cache = EntityCache::new();
        let diff = cache.refresh_kind(&world, EntityKind::Enemy, now()).unwrap();

        assert_eq!(diff.enumerated, 2);
        assert_eq!(diff.added, 2);
        assert_eq!(diff.removed, 0);
        assert!(cache.get_all(EntityKind::Enemy).contains(a));
        assert!(cache.get_all(EntityKind::Enemy).contains(b));
        assert!(cache.get_all(EntityKind::Animal).is_empty());
    }

    #[test]
    fn refresh_skips_dead_and_removes_missing() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Enemy, Vec3::ZERO);
        let b = world.spawn(EntityKind::Enemy, Vec3::ONE);
        let c = world.spawn(EntityKind::Enemy, Vec3::ONE);

        let mut cache = EntityCache::new();
        cache.refresh_kind(&world, EntityKind::Enemy, now()).unwrap();
        assert_eq!(cache.len(), 3);

        world.kill(a);
        world.despawn(b);
        let diff = cache.refresh_kind(&world, EntityKind::Enemy, now()).unwrap();

        assert_eq!(diff.removed, 2);
        assert_eq!(diff.added, 0);
        assert_eq!(cache.get_all(EntityKind::Enemy).ids().collect::<Vec<_>>(), vec![c]);
        assert!(cache.kind_of(a).is_none());
        assert!(cache.kind_of(b).is_none());
    }

    #[test]
    fn failed_enumeration_keeps_last_known_set() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Animal, Vec3::ZERO);
        let mut cache = EntityCache::new();
        cache.refresh_kind(&world, EntityKind::Animal, now()).unwrap();

        world.set_enumeration_failure(EntityKind::Animal, true);
        world.spawn(EntityKind::Animal, Vec3::ONE);
        let err = cache
            .refresh_kind(&world, EntityKind::Animal, now())
            .unwrap_err();

        let CacheError::Enumeration { kind, kept, .. } = err;
        assert_eq!(kind, EntityKind::Animal);
        assert_eq!(kept, 1);
        assert!(cache.get_all(EntityKind::Animal).contains(a));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn refresh_report_collects_errors_without_stopping() {
        let mut world = SimWorld::new();
        world.spawn(EntityKind::Enemy, Vec3::ZERO);
        world.spawn(EntityKind::Item, Vec3::ZERO);
        world.set_enumeration_failure(EntityKind::Enemy, true);

        let mut cache = EntityCache::new();
        let report = cache.refresh(&world, KindSet::ALL, now());

        assert!(!report.is_ok());
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.diffs.len(), EntityKind::COUNT - 1);
        assert_eq!(report.added(), 1);
        assert_eq!(cache.counts()[EntityKind::Item], 1);
    }

    #[test]
    fn hook_notifications_are_idempotent() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Player, Vec3::ZERO);
        let mut cache = EntityCache::new();

        assert_eq!(cache.on_spawned(&world, a, now()), UpsertOutcome::Inserted);
        assert_eq!(cache.on_spawned(&world, a, now()), UpsertOutcome::Updated);
        assert_eq!(cache.len(), 1);

        assert!(cache.on_despawned(a).is_some());
        assert!(cache.on_despawned(a).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn hooks_and_scan_share_one_set() {
        let mut world = SimWorld::new();
        let mut cache = EntityCache::new();
        let a = world.spawn(EntityKind::Npc, Vec3::ZERO);
        for event in world.drain_events() {
            if let HostEvent::Spawned { id, .. } = event {
                cache.on_spawned(&world, id, now());
            }
        }
        let diff = cache.refresh_kind(&world, EntityKind::Npc, now()).unwrap();
        assert_eq!(diff.added, 0);
        assert_eq!(cache.get_all(EntityKind::Npc).ids().collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn upsert_rejects_dead_and_non_finite() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Item, Vec3::ZERO);
        let b = world.spawn(EntityKind::Item, Vec3::new(f32::NAN, 0.0, 0.0));
        let mut cache = EntityCache::new();

        world.kill(a);
        assert_eq!(cache.upsert(&world, a, now()), UpsertOutcome::Rejected);
        assert_eq!(cache.upsert(&world, b, now()), UpsertOutcome::Rejected);
        assert_eq!(cache.upsert(&world, EntityId(999), now()), UpsertOutcome::Rejected);
        assert!(cache.is_empty());
    }

    #[test]
    fn cleanup_removes_dead_within_one_pass() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Enemy, Vec3::ZERO);
        let b = world.spawn(EntityKind::Animal, Vec3::ZERO);
        let mut cache = EntityCache::new();
        cache.refresh(&world, KindSet::ALL, now());

        world.kill(a);
        let mut removed = Vec::new();
        assert_eq!(cache.cleanup_invalid(&world, &mut removed), 1);
        assert_eq!(removed, vec![a]);
        assert!(!cache.contains(a));
        assert!(cache.contains(b));

        assert_eq!(cache.cleanup_invalid(&world, &mut removed), 0);
    }

    #[test]
    fn kind_change_moves_between_sets() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Npc, Vec3::ZERO);
        let mut cache = EntityCache::new();
        cache.upsert(&world, a, now());

        // Re-spawn the same id under another kind by rebuilding the world.
        let mut other = SimWorld::new();
        let b = other.spawn(EntityKind::Enemy, Vec3::ZERO);
        assert_eq!(a, b);
        cache.upsert(&other, b, now());

        assert!(cache.get_all(EntityKind::Npc).is_empty());
        assert!(cache.get_all(EntityKind::Enemy).contains(a));
        assert_eq!(cache.kind_of(a), Some(EntityKind::Enemy));
    }

    #[test]
    fn note_position_updates_entry() {
        let mut world = SimWorld::new();
        let a = world.spawn(EntityKind::Enemy, Vec3::ZERO);
        let mut cache = EntityCache::new();
        cache.upsert(&world, a, now());
        cache.note_position(a, Vec3::new(5.0, 0.0, 5.0), now());
        assert_eq!(cache.get(a).unwrap().last_position, Vec3::new(5.0, 0.0, 5.0));
        cache.note_position(a, Vec3::splat(f32::NAN), now());
        assert_eq!(cache.get(a).unwrap().last_position, Vec3::new(5.0, 0.0, 5.0));
    }

    #[test]
    fn tracked_filters_by_kind() {
        let mut world = SimWorld::new();
        world.spawn(EntityKind::Enemy, Vec3::ZERO);
        world.spawn(EntityKind::Item, Vec3::ZERO);
        world.spawn(EntityKind::Item, Vec3::ZERO);
        let mut cache = EntityCache::new();
        cache.refresh(&world, KindSet::ALL, now());

        assert_eq!(cache.tracked(KindSet::only(EntityKind::Item)).count(), 2);
        assert_eq!(cache.tracked(KindSet::ALL).count(), 3);
        assert_eq!(cache.tracked(KindSet::EMPTY).count(), 0);
    }
}
