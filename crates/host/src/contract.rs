use glam::{Vec2, Vec3};
use waymark_common::{CameraPose, EntityId, EntityKind, ScreenProjection};

/// Failures reported by the host world.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HostError {
    #[error("host world is not ready")]
    WorldUnavailable,
    #[error("enumerating {kind} entities failed: {reason}")]
    Enumeration { kind: EntityKind, reason: String },
}

/// Lifecycle notification delivered by host hooks.
///
/// Delivery is best-effort: hooks may miss entities or repeat themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostEvent {
    Spawned { id: EntityId, kind: EntityKind },
    Despawned { id: EntityId },
}

/// Read access to host entities.
pub trait EntitySource {
    /// Append every entity of `kind` to `out`. Expensive; called on scan refresh only.
    fn enumerate(&self, kind: EntityKind, out: &mut Vec<EntityId>) -> Result<(), HostError>;

    fn is_alive(&self, id: EntityId) -> bool;

    fn position(&self, id: EntityId) -> Option<Vec3>;

    fn kind(&self, id: EntityId) -> Option<EntityKind>;

    /// Display name for labels.
    fn label(&self, _id: EntityId) -> Option<&str> {
        None
    }
}

/// Read access to the observer camera and the screen.
pub trait CameraSource {
    /// Current camera pose, or `None` while the camera is unavailable.
    fn camera(&self) -> Option<CameraPose>;

    /// Project a world point; `None` while the camera is unavailable.
    fn project(&self, point: Vec3) -> Option<ScreenProjection>;

    fn screen_size(&self) -> Vec2;
}

/// Everything the overlay consumes from its host.
pub trait Host: EntitySource + CameraSource {}

impl<T: EntitySource + CameraSource + ?Sized> Host for T {}
