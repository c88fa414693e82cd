use glam::Vec3;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use waymark_common::{CameraPose, EntityId, ScreenProjection};

/// Everything the resolver needs about one entity, captured from a single
/// camera pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CachedProjection {
    pub projection: ScreenProjection,
    pub distance: f32,
    /// Entity position minus camera position at capture time.
    pub offset: Vec3,
    /// Camera forward at capture time.
    pub forward: Vec3,
    pub stamp: Instant,
}

/// Short-lived per-entity projection cache.
///
/// Entries expire after `interval`. The whole cache is dropped once
/// `interval` has passed since the fill, when the camera has moved more than
/// `movement_threshold`, or when it has turned more than
/// `rotation_threshold_degrees` away from the fill orientation.
#[derive(Debug)]
pub struct ScreenCache {
    entries: HashMap<EntityId, CachedProjection>,
    fill_pose: Option<CameraPose>,
    filled_at: Option<Instant>,
    interval: Duration,
    movement_threshold: f32,
    cos_rotation_threshold: f32,
    hits: u64,
    misses: u64,
}

impl ScreenCache {
    pub fn new(interval: Duration, movement_threshold: f32, rotation_threshold_degrees: f32) -> Self {
        Self {
            entries: HashMap::new(),
            fill_pose: None,
            filled_at: None,
            interval,
            movement_threshold,
            cos_rotation_threshold: rotation_threshold_degrees.to_radians().cos(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn configure(&mut self, interval: Duration, movement_threshold: f32, rotation_threshold_degrees: f32) {
        self.interval = interval;
        self.movement_threshold = movement_threshold;
        self.cos_rotation_threshold = rotation_threshold_degrees.to_radians().cos();
        self.invalidate();
    }

    /// Drop stale state for a frame observed from `camera`.
    pub fn begin_frame(&mut self, now: Instant, camera: &CameraPose) {
        if let (Some(fill), Some(at)) = (self.fill_pose, self.filled_at) {
            let moved = fill.position.distance(camera.position) > self.movement_threshold;
            let turned = fill.forward.dot(camera.forward) < self.cos_rotation_threshold;
            let expired = now.saturating_duration_since(at) >= self.interval;
            if moved || turned || expired {
                tracing::trace!(moved, turned, expired, entries = self.entries.len(), "screen cache invalidated");
                self.invalidate();
            }
        }
        if self.fill_pose.is_none() {
            self.fill_pose = Some(*camera);
            self.filled_at = Some(now);
        }
    }

    pub fn get(&mut self, id: EntityId, now: Instant) -> Option<CachedProjection> {
        match self.entries.get(&id) {
            Some(entry) if now.saturating_duration_since(entry.stamp) < self.interval => {
                self.hits += 1;
                Some(*entry)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, id: EntityId, entry: CachedProjection) {
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: EntityId) {
        self.entries.remove(&id);
    }

    /// Clear every entry, keeping the allocation.
    pub fn invalidate(&mut self) {
        self.entries.clear();
        self.fill_pose = None;
        self.filled_at = None;
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses) since creation.
    pub fn hit_counts(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}
