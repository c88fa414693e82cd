use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use waymark_common::{EntityKind, KindSet, PerKind, Rgba};
use waymark_draw::PoolCapacities;
use waymark_visibility::{BoxSizing, KindProfile, LodThresholds, VisibilitySettings};

/// Shortest and longest allowed per-kind scan interval, in seconds.
pub const SCAN_INTERVAL_RANGE: (f32, f32) = (0.1, 5.0);

/// Errors from loading or validating overlay settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported settings file extension: {0}")]
    UnsupportedFormat(PathBuf),
    #[error("invalid setting `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Warm pool sizes and the growth warning ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub boxes: usize,
    pub lines: usize,
    pub texts: usize,
    /// Warn once a pool grows past this multiple of its warm size.
    pub ceiling_factor: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        let caps = PoolCapacities::default();
        Self {
            boxes: caps.boxes,
            lines: caps.lines,
            texts: caps.texts,
            ceiling_factor: caps.ceiling_factor,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSettings {
    pub cell_size: f32,
    /// Extra query radius covering entities that moved since the last scan.
    pub query_margin: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            cell_size: waymark_spatial::DEFAULT_CELL_SIZE,
            query_margin: 10.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LodSettings {
    pub tier1_from: f32,
    pub tier2_from: f32,
    pub size_multiplier: f32,
    pub min_box_scale: f32,
}

impl Default for LodSettings {
    fn default() -> Self {
        let lod = LodThresholds::default();
        let sizing = BoxSizing::default();
        Self {
            tier1_from: lod.tier1_from,
            tier2_from: lod.tier2_from,
            size_multiplier: sizing.size_multiplier,
            min_box_scale: sizing.min_box_scale,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenCacheSettings {
    /// Seconds a cached projection stays valid.
    pub interval: f32,
    /// Camera travel that drops the whole cache.
    pub movement_threshold: f32,
    /// Camera turn, in degrees, that drops the whole cache.
    pub rotation_threshold: f32,
}

impl Default for ScreenCacheSettings {
    fn default() -> Self {
        Self {
            interval: 0.1,
            movement_threshold: 10.0,
            rotation_threshold: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleSettings {
    pub box_thickness: f32,
    pub line_thickness: f32,
    pub name_font_size: f32,
    pub distance_font_size: f32,
    /// Side length of the Tier2 marker in pixels.
    pub marker_size: f32,
    pub snaplines: bool,
}

impl Default for StyleSettings {
    fn default() -> Self {
        Self {
            box_thickness: 1.5,
            line_thickness: 1.0,
            name_font_size: 14.0,
            distance_font_size: 12.0,
            marker_size: 4.0,
            snaplines: false,
        }
    }
}

/// Runtime-mutable overlay configuration.
///
/// Times are in seconds. Missing fields fall back to their defaults, so a
/// settings file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub enabled: PerKind<bool>,
    pub colors: PerKind<Rgba>,
    pub max_render_distance: f32,
    pub fov_aware: bool,
    pub half_fov_degrees: f32,
    pub scan_intervals: PerKind<f32>,
    pub cleanup_interval: f32,
    pub pools: PoolSettings,
    pub grid: GridSettings,
    pub lod: LodSettings,
    pub screen_cache: ScreenCacheSettings,
    pub style: StyleSettings,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            enabled: PerKind::from_fn(|_| true),
            colors: PerKind::from_fn(default_color),
            max_render_distance: 150.0,
            fov_aware: false,
            half_fov_degrees: 60.0,
            scan_intervals: PerKind::from_fn(default_scan_interval),
            cleanup_interval: 0.5,
            pools: PoolSettings::default(),
            grid: GridSettings::default(),
            lod: LodSettings::default(),
            screen_cache: ScreenCacheSettings::default(),
            style: StyleSettings::default(),
        }
    }
}

fn default_color(kind: EntityKind) -> Rgba {
    match kind {
        EntityKind::Enemy => Rgba::rgb(255, 64, 64),
        EntityKind::Player => Rgba::rgb(64, 160, 255),
        EntityKind::Animal => Rgba::rgb(255, 170, 0),
        EntityKind::Item => Rgba::rgb(255, 230, 80),
        EntityKind::Npc => Rgba::rgb(80, 220, 120),
    }
}

fn default_scan_interval(kind: EntityKind) -> f32 {
    match kind {
        EntityKind::Enemy => 1.0,
        EntityKind::Player => 0.5,
        EntityKind::Animal => 2.0,
        EntityKind::Item => 3.0,
        EntityKind::Npc => 2.0,
    }
}

fn seconds(value: f32) -> Duration {
    Duration::try_from_secs_f32(value).unwrap_or(Duration::ZERO)
}

fn invalid(field: &'static str, reason: impl Into<String>) -> SettingsError {
    SettingsError::Invalid {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be a positive number, got {value}")))
    }
}

fn non_negative(field: &'static str, value: f32) -> Result<(), SettingsError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("must be zero or greater, got {value}")))
    }
}

impl OverlaySettings {
    /// Load settings from a `.yaml`/`.yml` or `.json` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        let settings: Self = match extension.as_deref() {
            Some("yaml" | "yml") => serde_yaml::from_str(&text)?,
            Some("json") => serde_json::from_str(&text)?,
            _ => return Err(SettingsError::UnsupportedFormat(path.to_path_buf())),
        };
        settings.validate()?;
        tracing::info!(path = %path.display(), "loaded overlay settings");
        Ok(settings)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SettingsError> {
        let settings: Self = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn to_yaml_string(&self) -> Result<String, SettingsError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        positive("max_render_distance", self.max_render_distance)?;
        if !(self.half_fov_degrees.is_finite()
            && self.half_fov_degrees > 0.0
            && self.half_fov_degrees <= 180.0)
        {
            return Err(invalid(
                "half_fov_degrees",
                format!("must be in (0, 180], got {}", self.half_fov_degrees),
            ));
        }

        let (lo, hi) = SCAN_INTERVAL_RANGE;
        for (kind, &interval) in self.scan_intervals.iter() {
            if !(interval.is_finite() && (lo..=hi).contains(&interval)) {
                return Err(invalid(
                    "scan_intervals",
                    format!("{kind} interval must be within {lo}..={hi} s, got {interval}"),
                ));
            }
        }
        positive("cleanup_interval", self.cleanup_interval)?;
        let shortest = self
            .scan_intervals
            .values()
            .copied()
            .fold(f32::INFINITY, f32::min);
        if self.cleanup_interval > shortest {
            return Err(invalid(
                "cleanup_interval",
                format!(
                    "{} s exceeds the shortest scan interval ({shortest} s)",
                    self.cleanup_interval
                ),
            ));
        }

        if self.pools.boxes == 0 || self.pools.lines == 0 || self.pools.texts == 0 {
            return Err(invalid("pools", "every pool needs a non-zero capacity"));
        }
        if self.pools.ceiling_factor == 0 {
            return Err(invalid("pools.ceiling_factor", "must be at least 1"));
        }

        positive("grid.cell_size", self.grid.cell_size)?;
        non_negative("grid.query_margin", self.grid.query_margin)?;

        positive("lod.tier1_from", self.lod.tier1_from)?;
        if !(self.lod.tier2_from.is_finite() && self.lod.tier2_from >= self.lod.tier1_from) {
            return Err(invalid(
                "lod.tier2_from",
                format!(
                    "must be at least tier1_from ({}), got {}",
                    self.lod.tier1_from, self.lod.tier2_from
                ),
            ));
        }
        positive("lod.size_multiplier", self.lod.size_multiplier)?;
        positive("lod.min_box_scale", self.lod.min_box_scale)?;

        non_negative("screen_cache.interval", self.screen_cache.interval)?;
        non_negative(
            "screen_cache.movement_threshold",
            self.screen_cache.movement_threshold,
        )?;
        let turn = self.screen_cache.rotation_threshold;
        if !(turn.is_finite() && (0.0..=180.0).contains(&turn)) {
            return Err(invalid(
                "screen_cache.rotation_threshold",
                format!("must be within 0..=180 degrees, got {turn}"),
            ));
        }

        positive("style.box_thickness", self.style.box_thickness)?;
        positive("style.line_thickness", self.style.line_thickness)?;
        positive("style.name_font_size", self.style.name_font_size)?;
        positive("style.distance_font_size", self.style.distance_font_size)?;
        positive("style.marker_size", self.style.marker_size)?;
        Ok(())
    }

    pub fn enabled_kinds(&self) -> KindSet {
        self.enabled
            .iter()
            .filter(|(_, on)| **on)
            .map(|(kind, _)| kind)
            .collect()
    }

    pub fn scan_interval_durations(&self) -> PerKind<Duration> {
        self.scan_intervals.map(|_, secs| seconds(*secs))
    }

    pub fn cleanup_duration(&self) -> Duration {
        seconds(self.cleanup_interval)
    }

    /// Radius handed to the spatial index each frame.
    pub fn query_radius(&self) -> f32 {
        self.max_render_distance + self.grid.query_margin
    }

    pub fn pool_capacities(&self) -> PoolCapacities {
        PoolCapacities {
            boxes: self.pools.boxes,
            lines: self.pools.lines,
            texts: self.pools.texts,
            ceiling_factor: self.pools.ceiling_factor,
        }
    }

    pub fn visibility(&self) -> VisibilitySettings {
        VisibilitySettings {
            enabled: self.enabled_kinds(),
            max_render_distance: self.max_render_distance,
            fov_aware: self.fov_aware,
            half_fov_degrees: self.half_fov_degrees,
            lod: LodThresholds {
                tier1_from: self.lod.tier1_from,
                tier2_from: self.lod.tier2_from,
            },
            sizing: BoxSizing {
                size_multiplier: self.lod.size_multiplier,
                min_box_scale: self.lod.min_box_scale,
            },
            profiles: PerKind::from_fn(KindProfile::for_kind),
            cache_interval: seconds(self.screen_cache.interval),
            movement_threshold: self.screen_cache.movement_threshold,
            rotation_threshold_degrees: self.screen_cache.rotation_threshold,
        }
    }
}
