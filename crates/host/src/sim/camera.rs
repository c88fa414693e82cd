use glam::{Mat4, Vec2, Vec3};
use waymark_common::{CameraPose, ScreenProjection};

/// Yaw/pitch perspective camera with a fixed screen size.
pub struct SimCamera {
    pub position: Vec3,
    pub yaw: f32,
    pub pitch: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub screen: Vec2,
    pub speed: f32,
    pub sensitivity: f32,
}

impl Default for SimCamera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.7, 0.0),
            yaw: 90.0_f32.to_radians(),
            pitch: 0.0,
            fov: 70.0_f32.to_radians(),
            near: 0.1,
            far: 2000.0,
            screen: Vec2::new(1920.0, 1080.0),
            speed: 4.0,
            sensitivity: 0.003,
        }
    }
}

impl SimCamera {
    /// Camera at `position` looking along `forward`.
    pub fn looking_along(position: Vec3, forward: Vec3) -> Self {
        let f = forward.normalize();
        Self {
            position,
            yaw: f.z.atan2(f.x),
            pitch: f.y.clamp(-1.0, 1.0).asin(),
            ..Self::default()
        }
    }

    pub fn forward(&self) -> Vec3 {
        Vec3::new(
            self.yaw.cos() * self.pitch.cos(),
            self.pitch.sin(),
            self.yaw.sin() * self.pitch.cos(),
        )
        .normalize()
    }

    pub fn pose(&self) -> CameraPose {
        CameraPose::new(self.position, self.forward())
    }

    pub fn move_forward(&mut self, dt: f32) {
        let fwd = self.forward();
        self.position += fwd * self.speed * dt;
    }

    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.yaw += dx * self.sensitivity;
        self.pitch -= dy * self.sensitivity;
        self.pitch = self.pitch.clamp(-89.0_f32.to_radians(), 89.0_f32.to_radians());
    }

    pub fn aspect(&self) -> f32 {
        if self.screen.y > 0.0 {
            self.screen.x / self.screen.y
        } else {
            1.0
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov, self.aspect(), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Project a world point to pixel coordinates (origin top-left).
    ///
    /// `depth` is the clip-space w, i.e. distance along the view axis; it is
    /// non-positive for points at or behind the camera plane.
    pub fn project(&self, point: Vec3) -> ScreenProjection {
        let clip = self.view_projection() * point.extend(1.0);
        if clip.w <= f32::EPSILON {
            return ScreenProjection {
                position: Vec2::splat(-1.0),
                depth: clip.w,
            };
        }
        let ndc = clip.truncate() / clip.w;
        ScreenProjection {
            position: Vec2::new(
                (ndc.x + 1.0) * 0.5 * self.screen.x,
                (1.0 - ndc.y) * 0.5 * self.screen.y,
            ),
            depth: clip.w,
        }
    }
}
