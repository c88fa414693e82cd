//! Deterministic simulated host: a seeded world plus a perspective camera.

mod camera;
mod world;

pub use camera::SimCamera;
pub use world::{SimEntity, SimWorld};

use glam::{Vec2, Vec3};
use waymark_common::{CameraPose, EntityId, EntityKind, ScreenProjection};

use crate::contract::{CameraSource, EntitySource, HostError};

/// A `SimWorld` observed through a `SimCamera`.
///
/// The camera can be switched off to exercise the overlay's handling of a
/// host whose camera is not ready yet.
pub struct SimHost {
    pub world: SimWorld,
    pub camera: SimCamera,
    camera_available: bool,
}

impl SimHost {
    pub fn new(world: SimWorld, camera: SimCamera) -> Self {
        Self {
            world,
            camera,
            camera_available: true,
        }
    }

    pub fn set_camera_available(&mut self, available: bool) {
        if self.camera_available != available {
            tracing::debug!(available, "sim camera availability changed");
        }
        self.camera_available = available;
    }

    pub fn camera_available(&self) -> bool {
        self.camera_available
    }
}

impl EntitySource for SimHost {
    fn enumerate(&self, kind: EntityKind, out: &mut Vec<EntityId>) -> Result<(), HostError> {
        self.world.enumerate(kind, out)
    }

    fn is_alive(&self, id: EntityId) -> bool {
        self.world.is_alive(id)
    }

    fn position(&self, id: EntityId) -> Option<Vec3> {
        self.world.position(id)
    }

    fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.world.kind(id)
    }

    fn label(&self, id: EntityId) -> Option<&str> {
        self.world.label(id)
    }
}

impl CameraSource for SimHost {
    fn camera(&self) -> Option<CameraPose> {
        self.camera_available.then(|| self.camera.pose())
    }

    fn project(&self, point: Vec3) -> Option<ScreenProjection> {
        self.camera_available.then(|| self.camera.project(point))
    }

    fn screen_size(&self) -> Vec2 {
        self.camera.screen
    }
}
