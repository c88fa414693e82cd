use glam::Vec2;
use waymark_common::Rect;

use crate::settings::{BoxSizing, KindProfile, LodThresholds};

const NEAR_OPACITY: f32 = 1.0;
const FAR_OPACITY: f32 = 0.3;
/// Distances below this are clamped when sizing boxes.
const MIN_SIZING_DISTANCE: f32 = 0.1;

/// Detail tier chosen by distance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LodTier {
    /// Box, name label and distance label.
    Tier0,
    /// Box and distance label.
    Tier1,
    /// Minimal marker.
    Tier2,
}

impl LodTier {
    pub fn classify(distance: f32, thresholds: &LodThresholds) -> Self {
        if distance < thresholds.tier1_from {
            LodTier::Tier0
        } else if distance < thresholds.tier2_from {
            LodTier::Tier1
        } else {
            LodTier::Tier2
        }
    }

    pub fn shows_box(self) -> bool {
        self != LodTier::Tier2
    }

    pub fn shows_name(self) -> bool {
        self == LodTier::Tier0
    }

    pub fn shows_distance(self) -> bool {
        self != LodTier::Tier2
    }
}

/// Screen-space box for one entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxGeometry {
    pub rect: Rect,
    /// Pixels per world unit at this distance.
    pub scale: f32,
}

/// Size and place a box around the projected anchor point.
pub fn box_geometry(
    profile: &KindProfile,
    sizing: &BoxSizing,
    anchor: Vec2,
    distance: f32,
) -> BoxGeometry {
    let scale = (sizing.size_multiplier / distance.max(MIN_SIZING_DISTANCE)).max(sizing.min_box_scale);
    let height = profile.height * scale;
    let width = height * profile.width_multiplier;
    BoxGeometry {
        rect: Rect {
            min: Vec2::new(anchor.x - width * 0.5, anchor.y - profile.head_offset * scale),
            max: Vec2::new(anchor.x + width * 0.5, anchor.y + profile.feet_offset * scale),
        },
        scale,
    }
}

/// Linear fade from fully opaque at the camera to 0.3 at max distance.
pub fn opacity_at(distance: f32, max_render_distance: f32) -> f32 {
    if max_render_distance <= 0.0 {
        return NEAR_OPACITY;
    }
    let t = (distance / max_render_distance).clamp(0.0, 1.0);
    NEAR_OPACITY - (NEAR_OPACITY - FAR_OPACITY) * t
}
