use std::time::Duration;
use waymark_common::{EntityKind, KindSet, PerKind};

/// Distance thresholds separating LOD tiers. Each tier is inclusive at its
/// low end.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LodThresholds {
    pub tier1_from: f32,
    pub tier2_from: f32,
}

impl Default for LodThresholds {
    fn default() -> Self {
        Self {
            tier1_from: 50.0,
            tier2_from: 100.0,
        }
    }
}

/// Screen-space box scaling: `scale = max(min_box_scale, size_multiplier / distance)`
/// pixels per world unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxSizing {
    pub size_multiplier: f32,
    pub min_box_scale: f32,
}

impl Default for BoxSizing {
    fn default() -> Self {
        Self {
            size_multiplier: 500.0,
            min_box_scale: 2.0,
        }
    }
}

/// Body proportions used to size a kind's box.
///
/// `head_offset` and `feet_offset` are world-unit distances above and below
/// the entity's anchor point (its reported position).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindProfile {
    pub width_multiplier: f32,
    pub height: f32,
    pub head_offset: f32,
    pub feet_offset: f32,
}

impl KindProfile {
    pub const fn standing(width_multiplier: f32, height: f32) -> Self {
        Self {
            width_multiplier,
            height,
            head_offset: height,
            feet_offset: 0.0,
        }
    }

    /// Used for kinds without a dedicated profile.
    pub const FALLBACK: KindProfile = KindProfile::standing(0.5, 1.8);

    pub fn for_kind(kind: EntityKind) -> Self {
        match kind {
            EntityKind::Enemy => KindProfile::standing(0.6, 1.8),
            EntityKind::Animal => KindProfile::standing(0.8, 1.2),
            EntityKind::Player => KindProfile::standing(0.4, 1.8),
            EntityKind::Item | EntityKind::Npc => KindProfile::FALLBACK,
        }
    }
}

impl Default for KindProfile {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Tunables for the visibility pass.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilitySettings {
    pub enabled: KindSet,
    pub max_render_distance: f32,
    pub fov_aware: bool,
    pub half_fov_degrees: f32,
    pub lod: LodThresholds,
    pub sizing: BoxSizing,
    pub profiles: PerKind<KindProfile>,
    pub cache_interval: Duration,
    pub movement_threshold: f32,
    /// Camera turn that drops every cached projection.
    pub rotation_threshold_degrees: f32,
}

impl Default for VisibilitySettings {
    fn default() -> Self {
        Self {
            enabled: KindSet::ALL,
            max_render_distance: 150.0,
            fov_aware: false,
            half_fov_degrees: 60.0,
            lod: LodThresholds::default(),
            sizing: BoxSizing::default(),
            profiles: PerKind::from_fn(KindProfile::for_kind),
            cache_interval: Duration::from_millis(100),
            movement_threshold: 10.0,
            rotation_threshold_degrees: 5.0,
        }
    }
}

impl VisibilitySettings {
    pub fn cos_half_fov(&self) -> f32 {
        self.half_fov_degrees.to_radians().cos()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_profiles() {
        let settings = VisibilitySettings::default();
        let enemy = settings.profiles[EntityKind::Enemy];
        assert_eq!((enemy.width_multiplier, enemy.height), (0.6, 1.8));
        let animal = settings.profiles[EntityKind::Animal];
        assert_eq!((animal.width_multiplier, animal.height), (0.8, 1.2));
        let player = settings.profiles[EntityKind::Player];
        assert_eq!((player.width_multiplier, player.height), (0.4, 1.8));
        assert_eq!(settings.profiles[EntityKind::Item], KindProfile::FALLBACK);
        assert_eq!(settings.profiles[EntityKind::Npc], KindProfile::FALLBACK);
    }

    #[test]
    fn cos_half_fov_of_sixty_degrees() {
        let settings = VisibilitySettings::default();
        assert!((settings.cos_half_fov() - 0.5).abs() < 1e-6);
    }
}
