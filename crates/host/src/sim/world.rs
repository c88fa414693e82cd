use glam::Vec3;
use std::collections::BTreeMap;
use waymark_common::{EntityId, EntityKind, KindSet};

use crate::contract::{EntitySource, HostError, HostEvent};

/// Per-entity data stored in the simulated world.
#[derive(Debug, Clone, PartialEq)]
pub struct SimEntity {
    pub kind: EntityKind,
    pub position: Vec3,
    pub velocity: Vec3,
    pub alive: bool,
    pub label: String,
}

/// Deterministic stand-in for a game world.
///
/// Uses BTreeMap for deterministic iteration order. Given the same seed and
/// sequence of operations, the world produces identical states, which keeps
/// overlay tests reproducible.
///
/// Lifecycle changes made through `spawn`/`despawn` are logged as
/// `HostEvent`s; `kill` deliberately logs nothing, modelling an entity whose
/// destruction hook was never delivered.
#[derive(Debug, Clone, Default)]
pub struct SimWorld {
    entities: BTreeMap<EntityId, SimEntity>,
    next_id: u64,
    tick: u64,
    seed: u64,
    /// Maximum speed change per second applied by `step`.
    wander: f32,
    failing: KindSet,
    events: Vec<HostEvent>,
}

impl SimWorld {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a world with a specific seed; entity motion derives from it.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            wander: 2.0,
            ..Default::default()
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> &BTreeMap<EntityId, SimEntity> {
        &self.entities
    }

    pub fn get(&self, id: EntityId) -> Option<&SimEntity> {
        self.entities.get(&id)
    }

    /// Drain lifecycle events for delivery to hook subscribers.
    pub fn drain_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    pub fn set_wander(&mut self, wander: f32) {
        self.wander = wander.max(0.0);
    }

    /// Spawn a stationary entity. Returns its id.
    pub fn spawn(&mut self, kind: EntityKind, position: Vec3) -> EntityId {
        self.spawn_moving(kind, position, Vec3::ZERO)
    }

    pub fn spawn_moving(&mut self, kind: EntityKind, position: Vec3, velocity: Vec3) -> EntityId {
        self.next_id += 1;
        let id = EntityId(self.next_id);
        self.entities.insert(
            id,
            SimEntity {
                kind,
                position,
                velocity,
                alive: true,
                label: format!("{}-{}", kind.name(), id.0),
            },
        );
        self.events.push(HostEvent::Spawned { id, kind });
        id
    }

    /// Mark an entity dead without removing it or emitting an event.
    pub fn kill(&mut self, id: EntityId) -> bool {
        match self.entities.get_mut(&id) {
            Some(e) if e.alive => {
                e.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Remove an entity and log the despawn.
    pub fn despawn(&mut self, id: EntityId) -> Option<SimEntity> {
        let removed = self.entities.remove(&id);
        if removed.is_some() {
            self.events.push(HostEvent::Despawned { id });
        }
        removed
    }

    pub fn set_position(&mut self, id: EntityId, position: Vec3) -> bool {
        if let Some(e) = self.entities.get_mut(&id) {
            e.position = position;
            true
        } else {
            false
        }
    }

    pub fn set_label(&mut self, id: EntityId, label: impl Into<String>) -> bool {
        if let Some(e) = self.entities.get_mut(&id) {
            e.label = label.into();
            true
        } else {
            false
        }
    }

    /// Make `enumerate` fail for `kind` until cleared.
    pub fn set_enumeration_failure(&mut self, kind: EntityKind, failing: bool) {
        if failing {
            self.failing.insert(kind);
        } else {
            self.failing.remove(kind);
        }
    }

    /// Advance the simulation by `dt` seconds.
    ///
    /// Each living entity integrates its velocity after a small seeded
    /// perturbation, so motion is reproducible across runs.
    pub fn step(&mut self, dt: f32) {
        self.tick += 1;
        self.seed = splitmix64(self.seed);
        let wander = self.wander * dt;
        for (id, e) in self.entities.iter_mut().filter(|(_, e)| e.alive) {
            let h = splitmix64(self.seed ^ id.0.wrapping_mul(0x9e37_79b9_7f4a_7c15));
            let dx = unit_signed(h);
            let dz = unit_signed(splitmix64(h));
            e.velocity += Vec3::new(dx, 0.0, dz) * wander;
            e.position += e.velocity * dt;
        }
    }

    /// Scatter `count` entities of mixed kinds over a square of half-size
    /// `extent` centred on the origin.
    pub fn scatter(&mut self, count: usize, extent: f32) -> Vec<EntityId> {
        let mut state = self.seed;
        let mut ids = Vec::with_capacity(count);
        for _ in 0..count {
            state = splitmix64(state);
            let kind = EntityKind::ALL[(state % EntityKind::COUNT as u64) as usize];
            state = splitmix64(state);
            let x = unit_signed(state) * extent;
            state = splitmix64(state);
            let z = unit_signed(state) * extent;
            state = splitmix64(state);
            let speed = if kind == EntityKind::Item { 0.0 } else { 1.5 };
            let heading = unit_signed(state) * std::f32::consts::PI;
            let velocity = Vec3::new(heading.cos(), 0.0, heading.sin()) * speed;
            ids.push(self.spawn_moving(kind, Vec3::new(x, 0.0, z), velocity));
        }
        ids
    }
}

impl EntitySource for SimWorld {
    fn enumerate(&self, kind: EntityKind, out: &mut Vec<EntityId>) -> Result<(), HostError> {
        if self.failing.contains(kind) {
            return Err(HostError::Enumeration {
                kind,
                reason: "injected failure".into(),
            });
        }
        // Dead-but-not-collected entities are still listed, as real hosts do.
        out.extend(
            self.entities
                .iter()
                .filter(|(_, e)| e.kind == kind)
                .map(|(id, _)| *id),
        );
        Ok(())
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.entities.get(&id).is_some_and(|e| e.alive)
    }

    fn position(&self, id: EntityId) -> Option<Vec3> {
        self.entities.get(&id).map(|e| e.position)
    }

    fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.entities.get(&id).map(|e| e.kind)
    }

    fn label(&self, id: EntityId) -> Option<&str> {
        self.entities
            .get(&id)
            .map(|e| e.label.as_str())
            .filter(|l| !l.is_empty())
    }
}

/// Splitmix64 step; advances the world seed reproducibly across platforms.
fn splitmix64(mut state: u64) -> u64 {
    state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Map a hash to [-1, 1).
fn unit_signed(h: u64) -> f32 {
    ((h >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_starts_empty() {
        let w = SimWorld::new();
        assert_eq!(w.tick(), 0);
        assert_eq!(w.entity_count(), 0);
    }

    #[test]
    fn spawn_and_despawn_log_events() {
        let mut w = SimWorld::new();
        let id = w.spawn(EntityKind::Enemy, Vec3::ZERO);
        assert!(w.is_alive(id));
        assert!(w.despawn(id).is_some());
        assert!(!w.is_alive(id));
        assert_eq!(
            w.drain_events(),
            vec![
                HostEvent::Spawned {
                    id,
                    kind: EntityKind::Enemy
                },
                HostEvent::Despawned { id },
            ]
        );
        assert!(w.events().is_empty());
    }

    #[test]
    fn kill_is_silent_and_keeps_entity_listed() {
        let mut w = SimWorld::new();
        let id = w.spawn(EntityKind::Animal, Vec3::ZERO);
        w.drain_events();
        assert!(w.kill(id));
        assert!(!w.kill(id));
        assert!(w.events().is_empty());
        assert!(!w.is_alive(id));

        let mut out = Vec::new();
        w.enumerate(EntityKind::Animal, &mut out).unwrap();
        assert_eq!(out, vec![id]);
    }

    #[test]
    fn enumerate_filters_by_kind() {
        let mut w = SimWorld::new();
        let a = w.spawn(EntityKind::Enemy, Vec3::ZERO);
        w.spawn(EntityKind::Item, Vec3::ZERO);
        let b = w.spawn(EntityKind::Enemy, Vec3::ONE);

        let mut out = Vec::new();
        w.enumerate(EntityKind::Enemy, &mut out).unwrap();
        assert_eq!(out, vec![a, b]);
    }

    #[test]
    fn injected_enumeration_failure() {
        let mut w = SimWorld::new();
        w.spawn(EntityKind::Npc, Vec3::ZERO);
        w.set_enumeration_failure(EntityKind::Npc, true);

        let mut out = Vec::new();
        let err = w.enumerate(EntityKind::Npc, &mut out).unwrap_err();
        assert!(matches!(err, HostError::Enumeration { kind: EntityKind::Npc, .. }));
        assert!(out.is_empty());

        w.set_enumeration_failure(EntityKind::Npc, false);
        assert!(w.enumerate(EntityKind::Npc, &mut out).is_ok());
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn step_is_deterministic_for_same_seed() {
        let mut w1 = SimWorld::with_seed(42);
        let mut w2 = SimWorld::with_seed(42);
        w1.scatter(20, 100.0);
        w2.scatter(20, 100.0);
        for _ in 0..50 {
            w1.step(1.0 / 60.0);
            w2.step(1.0 / 60.0);
        }
        let p1: Vec<Vec3> = w1.entities().values().map(|e| e.position).collect();
        let p2: Vec<Vec3> = w2.entities().values().map(|e| e.position).collect();
        assert_eq!(p1, p2);
        assert_eq!(w1.seed(), w2.seed());
    }

    #[test]
    fn dead_entities_do_not_move() {
        let mut w = SimWorld::with_seed(3);
        let id = w.spawn_moving(EntityKind::Enemy, Vec3::ZERO, Vec3::X);
        w.kill(id);
        w.step(1.0);
        assert_eq!(w.position(id), Some(Vec3::ZERO));
    }

    #[test]
    fn scatter_stays_within_extent() {
        let mut w = SimWorld::with_seed(9);
        let ids = w.scatter(100, 50.0);
        assert_eq!(ids.len(), 100);
        for e in w.entities().values() {
            assert!(e.position.x.abs() <= 50.0);
            assert!(e.position.z.abs() <= 50.0);
        }
    }

    #[test]
    fn labels_default_to_kind_and_id() {
        let mut w = SimWorld::new();
        let id = w.spawn(EntityKind::Player, Vec3::ZERO);
        assert_eq!(w.label(id), Some("Player-1"));
        w.set_label(id, "");
        assert_eq!(w.label(id), None);
    }
}
