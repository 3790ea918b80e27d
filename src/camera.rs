use glam::{Mat4, Vec2, Vec3};

const DEFAULT_YAW: f32 = -90.0;
const DEFAULT_PITCH: f32 = 0.0;
const PITCH_LIMIT: f32 = 89.0;
const WORLD_UP: Vec3 = Vec3::Y;

/// First-person camera: orientation is stored as yaw/pitch in degrees and the
/// forward/right/up basis is derived from it. Looks down -Z by default.
#[derive(Clone, Debug, PartialEq)]
pub struct YawPitchCamera {
    pub position: Vec3,
    yaw: f32,
    pitch: f32,
    forward: Vec3,
    right: Vec3,
    up: Vec3,
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub rotate_sensitivity: f32,
    pub translate_sensitivity: f32,
    pub width: u32,
    pub height: u32,
}

impl YawPitchCamera {
    pub fn new() -> Self {
        Self::with_orientation(Vec3::new(0.0, 0.0, 2.0), DEFAULT_YAW, DEFAULT_PITCH)
    }

    pub fn with_orientation(position: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut cam = Self {
            position,
            yaw,
            pitch: clamp_pitch(pitch),
            forward: Vec3::NEG_Z,
            right: Vec3::X,
            up: Vec3::Y,
            fov_y_deg: 60.0,
            near: 0.01,
            far: 1000.0,
            rotate_sensitivity: 0.1,
            translate_sensitivity: 0.01,
            width: 1,
            height: 1,
        };
        cam.refresh_basis();
        cam
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn forward(&self) -> Vec3 {
        self.forward
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn set_orientation(&mut self, yaw: f32, pitch: f32) {
        self.yaw = if yaw.is_finite() { yaw } else { self.yaw };
        self.pitch = if pitch.is_finite() { clamp_pitch(pitch) } else { self.pitch };
        self.refresh_basis();
    }

    /// Adds `delta.x` to yaw and `delta.y` to pitch, scaled by the rotate
    /// sensitivity. The z component (roll) has no effect on this camera.
    pub fn rotate_with_sensitivity(&mut self, delta: Vec3) {
        let d = delta * self.rotate_sensitivity;
        self.set_orientation(self.yaw + d.x, self.pitch + d.y);
    }

    /// Moves along the current basis: x = right, y = up, z = forward.
    pub fn translate_with_sensitivity(&mut self, direction: Vec3) {
        let d = direction * self.translate_sensitivity;
        if !d.is_finite() {
            return;
        }
        self.position += self.right * d.x + self.up * d.y + self.forward * d.z;
    }

    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.forward, WORLD_UP)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_deg.clamp(1.0, 179.0).to_radians(),
            self.aspect(),
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn projector(&self) -> ScreenProjector {
        ScreenProjector {
            view_proj: self.view_projection(),
            position: self.position,
            forward: self.forward,
            right: self.right,
            up: self.up,
            width: self.width.max(1) as f32,
            height: self.height.max(1) as f32,
        }
    }

    fn refresh_basis(&mut self) {
        let (ys, yc) = self.yaw.to_radians().sin_cos();
        let (ps, pc) = self.pitch.to_radians().sin_cos();
        self.forward = Vec3::new(yc * pc, ps, ys * pc).normalize();
        self.right = self.forward.cross(WORLD_UP).normalize();
        self.up = self.right.cross(self.forward).normalize();
    }
}

impl Default for YawPitchCamera {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_pitch(p: f32) -> f32 {
    p.clamp(-PITCH_LIMIT, PITCH_LIMIT)
}

/// Immutable projection state captured for one dispatch.
#[derive(Clone, Copy, Debug)]
pub struct ScreenProjector {
    view_proj: Mat4,
    pub position: Vec3,
    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub width: f32,
    pub height: f32,
}

impl ScreenProjector {
    /// Distance of `p` from the camera along the view direction.
    #[inline]
    pub fn depth(&self, p: Vec3) -> f32 {
        (p - self.position).dot(self.forward)
    }

    /// Projects a world point to continuous pixel coordinates (origin top-left).
    /// Returns `None` for points behind the camera, outside the frame, or
    /// non-finite results.
    #[inline]
    pub fn to_pixel(&self, p: Vec3) -> Option<(f32, f32)> {
        let clip = self.view_proj * p.extend(1.0);
        if !(clip.w > 1e-6) {
            return None;
        }
        let ndc = Vec2::new(clip.x, clip.y) / clip.w;
        if !ndc.is_finite() || ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 {
            return None;
        }
        let x = (ndc.x * 0.5 + 0.5) * self.width;
        let y = (0.5 - ndc.y * 0.5) * self.height;
        Some((x, y))
    }
}
