use glam::{Mat4, Vec3};

/// Where the viewer starts: behind the shifted datasets, facing +z.
pub const START_POSITION: Vec3 = Vec3::new(0.0, 0.0, -90.0);

const PITCH_LIMIT: f32 = 1.553_343; // ~89 degrees
const LOOK_SENSITIVITY: f32 = 0.003;

// Free-flying perspective camera driven by yaw and pitch
pub struct Camera {
    position: Vec3,
    yaw: f32,
    pitch: f32,
    fov_y: f32,
    aspect: f32,
    near: f32,
    far: f32,
}

impl Camera {
    pub fn new(position: Vec3, aspect: f32) -> Self {
        Self {
            position,
            yaw: 0.0,
            pitch: 0.0,
            fov_y: 60f32.to_radians(),
            aspect,
            near: 0.1,
            far: 2000.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Unit view direction; yaw 0 and pitch 0 look down +z.
    pub fn forward(&self) -> Vec3 {
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        Vec3::new(sin_yaw * cos_pitch, sin_pitch, cos_yaw * cos_pitch)
    }

    pub fn right(&self) -> Vec3 {
        self.forward().cross(Vec3::Y).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.right().cross(self.forward()).normalize()
    }

    pub fn set_aspect(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.aspect = width as f32 / height as f32;
        }
    }

    /// Turns by a raw mouse delta in pixels.
    pub fn look(&mut self, delta_x: f32, delta_y: f32) {
        self.yaw -= delta_x * LOOK_SENSITIVITY;
        self.pitch = (self.pitch - delta_y * LOOK_SENSITIVITY).clamp(-PITCH_LIMIT, PITCH_LIMIT);
    }

    /// Moves by a camera-local velocity (x right, y up, z forward).
    pub fn fly(&mut self, velocity: Vec3, dt: f32) {
        let step = self.right() * velocity.x + self.up() * velocity.y + self.forward() * velocity.z;
        self.position += step * dt;
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, self.forward(), Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect.max(1e-6), self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
