use glam::Vec2;
use std::fmt::Write as _;
use std::time::{Duration, Instant};
use waymark_cache::{EntityCache, ScanSchedule, UpsertOutcome};
use waymark_common::{EntityId, KindSet, PerKind, Rect};
use waymark_draw::{
    BatchCompositor, BoxHandle, DrawBackend, LineHandle, PrimitivePools, TextHandle,
};
use waymark_host::Host;
use waymark_spatial::SpatialIndex;
use waymark_visibility::{VisibilityRecord, VisibilityResolver};

use crate::settings::{OverlaySettings, SettingsError};
use crate::telemetry::OverlayTelemetry;

/// Gap in pixels between a box and its labels.
const LABEL_GAP: f32 = 2.0;

/// Step of the frame state machine the orchestrator is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramePhase {
    #[default]
    Idle,
    ScanDue,
    Refresh,
    BuildIndex,
    Cleanup,
    Resolve,
    Emit,
    Flush,
}

/// What one `frame` call did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Kinds rescanned this frame.
    pub scanned: KindSet,
    pub index_rebuilt: bool,
    pub candidates: usize,
    pub visible: usize,
    /// Candidates found dead or unknown and evicted.
    pub stale: usize,
    /// Entries evicted by the periodic liveness sweep.
    pub cleaned: usize,
    pub draw_groups: usize,
    pub primitives: usize,
    pub camera_unavailable: bool,
}

/// A visible entity together with the primitives it holds for this frame.
#[derive(Debug)]
pub struct Marker {
    record: VisibilityRecord,
    frame: Option<BoxHandle>,
    name: Option<TextHandle>,
    distance: Option<TextHandle>,
    snapline: Option<LineHandle>,
}

impl Marker {
    pub fn record(&self) -> &VisibilityRecord {
        &self.record
    }

    fn queue(&self, pools: &PrimitivePools, compositor: &mut BatchCompositor) {
        if let Some(h) = &self.frame {
            compositor.add_box(pools, h);
        }
        if let Some(h) = &self.snapline {
            compositor.add_line(pools, h);
        }
        if let Some(h) = &self.name {
            compositor.add_text(pools, h);
        }
        if let Some(h) = &self.distance {
            compositor.add_text(pools, h);
        }
    }

    /// Return every held primitive to its pool.
    fn release(self, pools: &mut PrimitivePools) {
        let Marker {
            frame,
            name,
            distance,
            snapline,
            ..
        } = self;
        if let Some(h) = frame {
            pools.release(h);
        }
        if let Some(h) = name {
            pools.release(h);
        }
        if let Some(h) = distance {
            pools.release(h);
        }
        if let Some(h) = snapline {
            pools.release(h);
        }
    }
}

/// Opacity snapped to 0.1 steps so nearby entities share batches.
fn quantize_opacity(opacity: f32) -> f32 {
    (opacity.clamp(0.0, 1.0) * 10.0).round() / 10.0
}

/// Check out and fill the primitives `record`'s tier calls for.
fn emit_marker(
    pools: &mut PrimitivePools,
    settings: &OverlaySettings,
    record: &VisibilityRecord,
    label: Option<&str>,
    screen: Vec2,
) -> Marker {
    let style = &settings.style;
    let color = settings.colors[record.kind].with_opacity(quantize_opacity(record.opacity));
    let mut marker = Marker {
        record: *record,
        frame: None,
        name: None,
        distance: None,
        snapline: None,
    };

    let rect = if record.tier.shows_box() {
        record.rect
    } else {
        Rect::from_center_size(record.screen, Vec2::splat(style.marker_size))
    };
    let frame: BoxHandle = pools.checkout();
    {
        let b = pools.get_mut(&frame);
        b.rect = rect;
        b.color = color;
        b.thickness = style.box_thickness;
        b.visible = true;
    }
    marker.frame = Some(frame);

    if record.tier.shows_name() {
        let h: TextHandle = pools.checkout();
        let t = pools.get_mut(&h);
        match label {
            Some(label) => t.text.push_str(label),
            None => {
                let _ = write!(t.text, "{} {}", record.kind, record.id);
            }
        }
        t.position = Vec2::new(
            rect.center().x,
            rect.min.y - style.name_font_size - LABEL_GAP,
        );
        t.color = color;
        t.font_size = style.name_font_size;
        t.visible = true;
        marker.name = Some(h);
    }

    if record.tier.shows_distance() {
        let h: TextHandle = pools.checkout();
        let t = pools.get_mut(&h);
        let _ = write!(t.text, "{:.0}m", record.distance);
        t.position = Vec2::new(rect.center().x, rect.max.y + LABEL_GAP);
        t.color = color;
        t.font_size = style.distance_font_size;
        t.visible = true;
        marker.distance = Some(h);
    }

    if style.snaplines {
        let h: LineHandle = pools.checkout();
        let l = pools.get_mut(&h);
        l.from = Vec2::new(screen.x * 0.5, screen.y);
        l.to = Vec2::new(rect.center().x, rect.max.y);
        l.color = color;
        l.thickness = style.line_thickness;
        l.visible = true;
        marker.snapline = Some(h);
    }

    marker
}

/// Owns the whole overlay pipeline and drives it once per rendered frame.
///
/// Single writer: every piece of state lives here and `frame` takes
/// `&mut self`, so several independent overlays can run side by side.
#[derive(Debug)]
pub struct OverlayOrchestrator {
    settings: OverlaySettings,
    enabled: KindSet,
    scan_intervals: PerKind<Duration>,
    cleanup_interval: Duration,
    cache: EntityCache,
    schedule: ScanSchedule,
    index: SpatialIndex,
    index_dirty: bool,
    resolver: VisibilityResolver,
    pools: PrimitivePools,
    compositor: BatchCompositor,
    telemetry: OverlayTelemetry,
    phase: FramePhase,
    last_cleanup: Option<Instant>,
    candidates: Vec<EntityId>,
    removed: Vec<EntityId>,
    markers: Vec<Marker>,
}

impl OverlayOrchestrator {
    pub fn new(settings: OverlaySettings) -> Result<Self, SettingsError> {
        settings.validate()?;
        Ok(Self {
            enabled: settings.enabled_kinds(),
            scan_intervals: settings.scan_interval_durations(),
            cleanup_interval: settings.cleanup_duration(),
            cache: EntityCache::new(),
            schedule: ScanSchedule::new(),
            index: SpatialIndex::new(settings.grid.cell_size),
            index_dirty: true,
            resolver: VisibilityResolver::new(settings.visibility()),
            pools: PrimitivePools::new(settings.pool_capacities()),
            compositor: BatchCompositor::new(),
            telemetry: OverlayTelemetry::default(),
            phase: FramePhase::Idle,
            last_cleanup: None,
            candidates: Vec::new(),
            removed: Vec::new(),
            markers: Vec::new(),
            settings,
        })
    }

    pub fn settings(&self) -> &OverlaySettings {
        &self.settings
    }

    pub fn telemetry(&self) -> &OverlayTelemetry {
        &self.telemetry
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn cache(&self) -> &EntityCache {
        &self.cache
    }

    pub fn index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn pools(&self) -> &PrimitivePools {
        &self.pools
    }

    /// Visibility records from the most recent frame.
    pub fn visible(&self) -> &[VisibilityRecord] {
        self.resolver.records()
    }

    /// Validate and swap in new settings.
    ///
    /// Pools only grow. Newly enabled kinds are scanned on the next frame.
    pub fn apply_settings(&mut self, settings: OverlaySettings) -> Result<(), SettingsError> {
        settings.validate()?;
        let enabled = settings.enabled_kinds();

        if settings.grid.cell_size != self.settings.grid.cell_size {
            self.index.set_cell_size(settings.grid.cell_size);
            self.index_dirty = true;
        }
        if enabled != self.enabled {
            for kind in enabled.iter().filter(|k| !self.enabled.contains(*k)) {
                self.schedule.reset(kind);
            }
            self.index_dirty = true;
        }

        self.enabled = enabled;
        self.scan_intervals = settings.scan_interval_durations();
        self.cleanup_interval = settings.cleanup_duration();
        self.resolver.set_settings(settings.visibility());
        self.pools.reserve(settings.pool_capacities());
        tracing::info!(
            enabled = self.enabled.len(),
            max_render_distance = settings.max_render_distance,
            "overlay settings applied"
        );
        self.settings = settings;
        Ok(())
    }

    /// Hook: the host created `id`.
    pub fn on_entity_spawned<H>(&mut self, host: &H, id: EntityId, now: Instant) -> UpsertOutcome
    where
        H: Host + ?Sized,
    {
        let outcome = self.cache.on_spawned(host, id, now);
        match outcome {
            UpsertOutcome::Inserted | UpsertOutcome::Updated => {
                if let Some(entry) = self.cache.get(id)
                    && self.enabled.contains(entry.kind)
                    && self.index.insert(id, entry.last_position).is_err()
                {
                    self.telemetry.index_rejections += 1;
                }
            }
            UpsertOutcome::Rejected => {
                self.index.remove(id);
            }
        }
        outcome
    }

    /// Hook: the host destroyed `id`. Returns whether it was tracked.
    pub fn on_entity_despawned(&mut self, id: EntityId) -> bool {
        self.index.remove(id);
        self.resolver.forget(id);
        self.cache.on_despawned(id).is_some()
    }

    /// Run one frame: scan what is due, resolve, and draw into `backend`.
    pub fn frame<H, B>(&mut self, host: &H, backend: &mut B, now: Instant) -> FrameReport
    where
        H: Host + ?Sized,
        B: DrawBackend + ?Sized,
    {
        let _span = tracing::info_span!("overlay_frame", frame = self.telemetry.frames).entered();
        let frame_start = Instant::now();
        let mut report = FrameReport::default();

        self.phase = FramePhase::ScanDue;
        let due = self.schedule.due(now, &self.scan_intervals, self.enabled);
        if !due.is_empty() {
            self.refresh(host, due, now);
            report.scanned = due;
        }

        if self.index_dirty {
            self.phase = FramePhase::BuildIndex;
            let stats = self
                .index
                .rebuild(self.cache.tracked(self.enabled).map(|e| (e.id, e.last_position)));
            self.telemetry.index_rejections += stats.rejected as u64;
            self.index_dirty = false;
            report.index_rebuilt = true;
        }

        let cleanup_due = self
            .last_cleanup
            .is_none_or(|at| now.saturating_duration_since(at) >= self.cleanup_interval);
        if cleanup_due {
            self.phase = FramePhase::Cleanup;
            report.cleaned = self.cleanup(host);
            self.last_cleanup = Some(now);
        }

        let render_start = Instant::now();
        self.phase = FramePhase::Resolve;
        self.candidates.clear();
        if let Some(camera) = host.camera().filter(|c| c.position.is_finite()) {
            self.index
                .query_range(camera.position, self.settings.query_radius(), &mut self.candidates);
            self.candidates.sort_unstable();
        }
        let stats = self.resolver.resolve(host, &self.candidates, now);
        report.candidates = stats.candidates;
        report.visible = stats.visible;
        report.camera_unavailable = stats.camera_unavailable;

        self.removed.clear();
        self.removed.extend_from_slice(self.resolver.stale());
        for &id in &self.removed {
            self.cache.evict(id);
            self.index.remove(id);
        }
        report.stale = self.removed.len();
        self.telemetry.stale_evictions += report.stale as u64;

        for record in self.resolver.records() {
            let Some(position) = host.position(record.id).filter(|p| p.is_finite()) else {
                continue;
            };
            self.cache.note_position(record.id, position, now);
            if self.index.insert(record.id, position).is_err() {
                self.telemetry.index_rejections += 1;
            }
        }

        self.phase = FramePhase::Emit;
        let screen = host.screen_size();
        for record in self.resolver.records() {
            let marker = emit_marker(
                &mut self.pools,
                &self.settings,
                record,
                host.label(record.id),
                screen,
            );
            marker.queue(&self.pools, &mut self.compositor);
            self.markers.push(marker);
        }

        self.phase = FramePhase::Flush;
        let flushed = self.compositor.flush(&self.pools, backend);
        report.draw_groups = flushed.groups;
        report.primitives = flushed.primitives;
        self.telemetry.pools = self.pools.utilization();
        for marker in self.markers.drain(..) {
            marker.release(&mut self.pools);
        }

        self.telemetry.tracked = self.cache.counts();
        self.telemetry.last_render = render_start.elapsed();
        self.telemetry.frame_times.record(frame_start.elapsed());
        self.telemetry.frames += 1;
        self.phase = FramePhase::Idle;

        tracing::trace!(
            candidates = report.candidates,
            visible = report.visible,
            stale = report.stale,
            groups = report.draw_groups,
            primitives = report.primitives,
            "overlay frame complete"
        );
        report
    }

    fn refresh<H>(&mut self, host: &H, due: KindSet, now: Instant)
    where
        H: Host + ?Sized,
    {
        self.phase = FramePhase::Refresh;
        let scan_start = Instant::now();
        let report = self.cache.refresh(host, due, now);
        // Failed kinds wait a full interval too, rather than retrying every frame.
        self.schedule.mark_all(due, now);
        for err in report.errors() {
            tracing::warn!(error = %err, "entity enumeration failed, keeping last known set");
        }
        self.telemetry.enumeration_errors += report.errors().len() as u64;
        self.telemetry.last_scan = scan_start.elapsed();
        tracing::debug!(
            kinds = due.len(),
            added = report.added(),
            removed = report.removed(),
            errors = report.errors().len(),
            "scan complete"
        );
        self.index_dirty = true;
    }

    fn cleanup<H>(&mut self, host: &H) -> usize
    where
        H: Host + ?Sized,
    {
        self.removed.clear();
        let count = self.cache.cleanup_invalid(host, &mut self.removed);
        for &id in &self.removed {
            self.index.remove(id);
            self.resolver.forget(id);
        }
        self.telemetry.cleanup_evictions += count as u64;
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use waymark_common::EntityKind;
    use waymark_draw::RecordingBackend;
    use waymark_host::{SimCamera, SimHost, SimWorld};
    use waymark_visibility::LodTier;

    fn host() -> SimHost {
        SimHost::new(
            SimWorld::new(),
            SimCamera::looking_along(Vec3::ZERO, Vec3::Z),
        )
    }

    fn record(tier: LodTier, opacity: f32) -> VisibilityRecord {
        VisibilityRecord {
            id: EntityId(7),
            kind: EntityKind::Enemy,
            screen: Vec2::new(960.0, 540.0),
            depth: 40.0,
            distance: 40.0,
            tier,
            rect: Rect::from_center_size(Vec2::new(960.0, 530.0), Vec2::new(13.5, 22.5)),
            opacity,
        }
    }

    #[test]
    fn opacity_quantization() {
        assert_eq!(quantize_opacity(0.72), 0.7);
        assert_eq!(quantize_opacity(0.96), 1.0);
        assert_eq!(quantize_opacity(0.34), 0.3);
        assert_eq!(quantize_opacity(-1.0), 0.0);
    }

    #[test]
    fn tier0_marker_has_box_and_both_labels() {
        let mut pools = PrimitivePools::default();
        let settings = OverlaySettings::default();
        let marker = emit_marker(
            &mut pools,
            &settings,
            &record(LodTier::Tier0, 0.72),
            Some("Enemy-7"),
            Vec2::new(1920.0, 1080.0),
        );
        assert!(marker.frame.is_some() && marker.name.is_some() && marker.distance.is_some());
        assert!(marker.snapline.is_none());
        let name = pools.get(marker.name.as_ref().unwrap());
        assert_eq!(name.text, "Enemy-7");
        let distance = pools.get(marker.distance.as_ref().unwrap());
        assert_eq!(distance.text, "40m");
        let frame = pools.get(marker.frame.as_ref().unwrap());
        assert_eq!(frame.color, settings.colors[EntityKind::Enemy].with_opacity(0.7));
        marker.release(&mut pools);
        assert_eq!(pools.in_use(), 0);
    }

    #[test]
    fn tier2_marker_is_minimal() {
        let mut pools = PrimitivePools::default();
        let mut settings = OverlaySettings::default();
        settings.style.snaplines = true;
        let marker = emit_marker(
            &mut pools,
            &settings,
            &record(LodTier::Tier2, 0.3),
            None,
            Vec2::new(1920.0, 1080.0),
        );
        assert!(marker.name.is_none() && marker.distance.is_none());
        let frame = pools.get(marker.frame.as_ref().unwrap());
        assert_eq!(frame.rect.width(), settings.style.marker_size);
        let line = pools.get(marker.snapline.as_ref().unwrap());
        assert_eq!(line.from, Vec2::new(960.0, 1080.0));
        marker.release(&mut pools);
    }

    #[test]
    fn unlabeled_entity_falls_back_to_kind_and_id() {
        let mut pools = PrimitivePools::default();
        let marker = emit_marker(
            &mut pools,
            &OverlaySettings::default(),
            &record(LodTier::Tier0, 1.0),
            None,
            Vec2::new(1920.0, 1080.0),
        );
        assert_eq!(pools.get(marker.name.as_ref().unwrap()).text, "Enemy #7");
        marker.release(&mut pools);
    }

    #[test]
    fn first_frame_scans_everything_and_returns_to_idle() {
        let mut host = host();
        host.world.spawn(EntityKind::Enemy, Vec3::new(0.0, 0.0, 40.0));
        let mut overlay = OverlayOrchestrator::new(OverlaySettings::default()).unwrap();
        let mut backend = RecordingBackend::new();
        let report = overlay.frame(&host, &mut backend, Instant::now());
        assert_eq!(report.scanned, KindSet::ALL);
        assert!(report.index_rebuilt);
        assert_eq!(report.visible, 1);
        assert_eq!(overlay.phase(), FramePhase::Idle);
        assert_eq!(overlay.pools().in_use(), 0);
    }

    #[test]
    fn quiet_frame_skips_scan() {
        let mut host = host();
        host.world.spawn(EntityKind::Enemy, Vec3::new(0.0, 0.0, 40.0));
        let mut overlay = OverlayOrchestrator::new(OverlaySettings::default()).unwrap();
        let mut backend = RecordingBackend::new();
        let t0 = Instant::now();
        overlay.frame(&host, &mut backend, t0);
        let report = overlay.frame(&host, &mut backend, t0 + Duration::from_millis(16));
        assert!(report.scanned.is_empty());
        assert!(!report.index_rebuilt);
        assert_eq!(report.visible, 1);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let mut settings = OverlaySettings::default();
        settings.max_render_distance = -1.0;
        assert!(OverlayOrchestrator::new(settings.clone()).is_err());

        let mut overlay = OverlayOrchestrator::new(OverlaySettings::default()).unwrap();
        assert!(overlay.apply_settings(settings).is_err());
        assert_eq!(overlay.settings().max_render_distance, 150.0);
    }
}
