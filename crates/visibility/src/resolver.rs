use glam::{Vec2, Vec3};
use std::time::Instant;
use waymark_common::{EntityId, EntityKind, Rect};
use waymark_host::Host;

use crate::lod::{LodTier, box_geometry, opacity_at};
use crate::screen_cache::{CachedProjection, ScreenCache};
use crate::settings::VisibilitySettings;

/// One entity that passed culling this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityRecord {
    pub id: EntityId,
    pub kind: EntityKind,
    pub screen: Vec2,
    pub depth: f32,
    pub distance: f32,
    pub tier: LodTier,
    pub rect: Rect,
    pub opacity: f32,
}

/// Per-frame culling counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolveStats {
    pub candidates: usize,
    pub visible: usize,
    pub stale: usize,
    pub disabled: usize,
    pub invalid_position: usize,
    pub culled_distance: usize,
    pub culled_depth: usize,
    pub culled_screen: usize,
    pub culled_fov: usize,
    pub camera_unavailable: bool,
}

/// Projects, culls and LOD-classifies candidate entities.
///
/// Output lives in buffers owned by the resolver and reused across frames;
/// read them with `records()` and `stale()` after `resolve`.
#[derive(Debug)]
pub struct VisibilityResolver {
    settings: VisibilitySettings,
    cos_half_fov: f32,
    cache: ScreenCache,
    records: Vec<VisibilityRecord>,
    stale: Vec<EntityId>,
    camera_seen: bool,
}

impl Default for VisibilityResolver {
    fn default() -> Self {
        Self::new(VisibilitySettings::default())
    }
}

impl VisibilityResolver {
    pub fn new(settings: VisibilitySettings) -> Self {
        let cache = ScreenCache::new(
            settings.cache_interval,
            settings.movement_threshold,
            settings.rotation_threshold_degrees,
        );
        Self {
            cos_half_fov: settings.cos_half_fov(),
            settings,
            cache,
            records: Vec::new(),
            stale: Vec::new(),
            camera_seen: true,
        }
    }

    pub fn settings(&self) -> &VisibilitySettings {
        &self.settings
    }

    /// Replace the settings. Cached projections are dropped.
    pub fn set_settings(&mut self, settings: VisibilitySettings) {
        self.cos_half_fov = settings.cos_half_fov();
        self.cache.configure(
            settings.cache_interval,
            settings.movement_threshold,
            settings.rotation_threshold_degrees,
        );
        self.settings = settings;
    }

    pub fn screen_cache(&self) -> &ScreenCache {
        &self.cache
    }

    /// Records produced by the last `resolve`.
    pub fn records(&self) -> &[VisibilityRecord] {
        &self.records
    }

    /// Candidates found dead or unknown during the last `resolve`.
    pub fn stale(&self) -> &[EntityId] {
        &self.stale
    }

    /// Forget a cached projection, e.g. after an entity was evicted.
    pub fn forget(&mut self, id: EntityId) {
        self.cache.remove(id);
    }

    /// Resolve `candidates` against the current camera.
    pub fn resolve<H>(&mut self, host: &H, candidates: &[EntityId], now: Instant) -> ResolveStats
    where
        H: Host + ?Sized,
    {
        let _span = tracing::debug_span!("visibility_resolve", candidates = candidates.len()).entered();
        self.records.clear();
        self.stale.clear();

        let mut stats = ResolveStats {
            candidates: candidates.len(),
            ..ResolveStats::default()
        };

        let Some(camera) = host.camera().filter(|c| c.position.is_finite()) else {
            if self.camera_seen {
                tracing::debug!("camera unavailable, skipping visibility pass");
                self.camera_seen = false;
            }
            stats.camera_unavailable = true;
            return stats;
        };
        if !self.camera_seen {
            tracing::debug!("camera available again");
            self.camera_seen = true;
        }

        self.cache.begin_frame(now, &camera);
        let screen = host.screen_size();

        for &id in candidates {
            if !host.is_alive(id) {
                self.stale.push(id);
                self.cache.remove(id);
                stats.stale += 1;
                continue;
            }
            let Some(kind) = host.kind(id) else {
                self.stale.push(id);
                stats.stale += 1;
                continue;
            };
            if !self.settings.enabled.contains(kind) {
                stats.disabled += 1;
                continue;
            }
            let Some(position) = host.position(id).filter(|p| p.is_finite()) else {
                stats.invalid_position += 1;
                continue;
            };

            let sample = match self.cache.get(id, now) {
                Some(cached) => cached,
                None => {
                    let distance = camera.position.distance(position);
                    if distance > self.settings.max_render_distance {
                        stats.culled_distance += 1;
                        continue;
                    }
                    let Some(projection) = host.project(position) else {
                        // Camera dropped out mid-frame; treat the frame as empty.
                        self.records.clear();
                        stats.visible = 0;
                        stats.camera_unavailable = true;
                        return stats;
                    };
                    let sample = CachedProjection {
                        projection,
                        distance,
                        offset: position - camera.position,
                        forward: camera.forward,
                        stamp: now,
                    };
                    self.cache.insert(id, sample);
                    sample
                }
            };
            let CachedProjection {
                projection,
                distance,
                ..
            } = sample;

            if distance > self.settings.max_render_distance {
                stats.culled_distance += 1;
                continue;
            }
            if !projection.in_front() {
                stats.culled_depth += 1;
                continue;
            }
            if !projection.within(screen) {
                stats.culled_screen += 1;
                continue;
            }
            if self.settings.fov_aware && !self.inside_fov(sample.forward, sample.offset) {
                stats.culled_fov += 1;
                continue;
            }

            let tier = LodTier::classify(distance, &self.settings.lod);
            let geometry = box_geometry(
                &self.settings.profiles[kind],
                &self.settings.sizing,
                projection.position,
                distance,
            );
            self.records.push(VisibilityRecord {
                id,
                kind,
                screen: projection.position,
                depth: projection.depth,
                distance,
                tier,
                rect: geometry.rect,
                opacity: opacity_at(distance, self.settings.max_render_distance),
            });
        }

        stats.visible = self.records.len();
        tracing::trace!(
            visible = stats.visible,
            stale = stats.stale,
            culled_distance = stats.culled_distance,
            culled_fov = stats.culled_fov,
            "visibility pass complete"
        );
        stats
    }

    fn inside_fov(&self, forward: Vec3, to_entity: Vec3) -> bool {
        let dir = to_entity.normalize_or_zero();
        if dir == Vec3::ZERO || forward == Vec3::ZERO {
            return true;
        }
        forward.dot(dir) >= self.cos_half_fov - 1e-6
    }
}
