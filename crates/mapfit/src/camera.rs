use glam::{Mat4, Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};

/// Where the camera sits and what it faces.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraFrame {
    pub position: Vec3,
    pub look_at: Vec3,
}

impl CameraFrame {
    pub fn new(position: Vec3, look_at: Vec3) -> Self {
        Self { position, look_at }
    }

    /// Interpolates position and look-at independently.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            look_at: self.look_at.lerp(other.look_at, t),
        }
    }
}

/// A ray with a normalised direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    /// Returns `None` for a zero-length direction.
    pub fn new(origin: Vec3, direction: Vec3) -> Option<Self> {
        let direction = direction.try_normalize()?;
        Some(Self { origin, direction })
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Canvas size in CSS (logical) pixels; converts between pixels and
/// normalised device coordinates (x right, y up, both in [-1, 1]).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        self.width / self.height.max(1.0)
    }

    pub fn to_ndc(&self, x_px: f32, y_px: f32) -> Vec2 {
        Vec2::new(
            (x_px / self.width.max(1.0)) * 2.0 - 1.0,
            -(y_px / self.height.max(1.0)) * 2.0 + 1.0,
        )
    }

    pub fn to_pixels(&self, ndc: Vec2) -> Vec2 {
        Vec2::new(
            (ndc.x + 1.0) * 0.5 * self.width,
            (1.0 - ndc.y) * 0.5 * self.height,
        )
    }
}

#[derive(Debug, Clone)]
pub struct PerspectiveCamera {
    /// Vertical field of view, degrees.
    pub fov_y_deg: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    frame: CameraFrame,
}

impl PerspectiveCamera {
    /// Creates a camera at the origin looking down -Z.
    pub fn new(fov_y_deg: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y_deg,
            aspect,
            near,
            far,
            frame: CameraFrame::new(Vec3::ZERO, Vec3::NEG_Z),
        }
    }

    /// The default three-quarter view: raised by `elevation_rad` above the
    /// ground plane at `distance`, on the +X/+Z diagonal, facing the origin.
    ///
    /// The X and Z offsets both take the full horizontal distance, so the
    /// camera ends up further from the origin than `distance`.
    pub fn isometric(width: f32, height: f32, distance: f32, elevation_rad: f32) -> Self {
        let mut camera = Self::new(50.0, width / height.max(1.0), 0.1, 10_000.0);
        let (sin_el, cos_el) = elevation_rad.sin_cos();
        let horizontal = distance * cos_el;
        camera.set_frame(CameraFrame::new(
            Vec3::new(horizontal, distance * sin_el, horizontal),
            Vec3::ZERO,
        ));
        camera
    }

    #[inline]
    pub fn frame(&self) -> CameraFrame {
        self.frame
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.frame.position
    }

    pub fn set_frame(&mut self, frame: CameraFrame) {
        self.frame = frame;
    }

    pub fn set_aspect(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn fov_y_rad(&self) -> f32 {
        self.fov_y_deg.to_radians()
    }

    /// Horizontal field of view derived from the vertical one and the aspect.
    pub fn fov_x_rad(&self) -> f32 {
        horizontal_fov_rad(self.fov_y_rad(), self.aspect)
    }

    pub fn view(&self) -> Mat4 {
        let forward = self.frame.look_at - self.frame.position;
        // Looking straight down: pick a different up to keep the basis valid.
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-12 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        Mat4::look_at_rh(self.frame.position, self.frame.look_at, up)
    }

    /// OpenGL-style projection (clip z in [-1, 1]).
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov_y_rad(), self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Ray from the camera through the given normalised device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Option<Ray> {
        let inv = self.view_proj().inverse();
        let through = inv.project_point3(Vec3::new(ndc.x, ndc.y, 0.5));
        Ray::new(self.frame.position, through - self.frame.position)
    }

    /// Projects a world point to NDC. `None` when behind the camera.
    pub fn project(&self, world: Vec3) -> Option<Vec2> {
        let clip = self.view_proj() * Vec4::new(world.x, world.y, world.z, 1.0);
        if clip.w <= 0.0 {
            return None;
        }
        Some(Vec2::new(clip.x / clip.w, clip.y / clip.w))
    }
}

/// `2 * atan(tan(fov_y / 2) * aspect)`
pub fn horizontal_fov_rad(fov_y_rad: f32, aspect: f32) -> f32 {
    2.0 * ((fov_y_rad * 0.5).tan() * aspect).atan()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn isometric_camera_matches_default_view() {
        let cam = PerspectiveCamera::isometric(800.0, 800.0, 12.0, 30f32.to_radians());
        let p = cam.position();
        assert_abs_diff_eq!(p.x, 12.0 * 30f32.to_radians().cos(), epsilon = 1e-5);
        assert_abs_diff_eq!(p.y, 6.0, epsilon = 1e-5);
        assert_eq!(p.x, p.z);
        assert_eq!(cam.frame().look_at, Vec3::ZERO);
        assert_eq!(cam.aspect, 1.0);
    }

    #[test]
    fn square_aspect_keeps_fov() {
        assert_abs_diff_eq!(horizontal_fov_rad(50f32.to_radians(), 1.0), 50f32.to_radians(), epsilon = 1e-6);
        assert!(horizontal_fov_rad(50f32.to_radians(), 2.0) > 50f32.to_radians());
    }

    #[test]
    fn centre_ray_points_at_target() {
        let cam = PerspectiveCamera::isometric(640.0, 480.0, 12.0, 30f32.to_radians());
        let ray = cam.ray_from_ndc(Vec2::ZERO).unwrap();
        let expected = (Vec3::ZERO - cam.position()).normalize();
        assert!(ray.direction.abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn project_then_ray_passes_through_point() {
        let cam = PerspectiveCamera::isometric(1024.0, 768.0, 12.0, 30f32.to_radians());
        let point = Vec3::new(1.5, 0.5, -2.0);
        let ndc = cam.project(point).unwrap();
        let ray = cam.ray_from_ndc(ndc).unwrap();
        let t = (point - ray.origin).dot(ray.direction);
        assert!(ray.at(t).abs_diff_eq(point, 1e-3));
    }

    #[test]
    fn viewport_pixel_conversion() {
        let vp = Viewport::new(200.0, 100.0);
        assert_eq!(vp.to_ndc(100.0, 50.0), Vec2::ZERO);
        assert_eq!(vp.to_ndc(0.0, 0.0), Vec2::new(-1.0, 1.0));
        assert_eq!(vp.to_pixels(Vec2::new(1.0, -1.0)), Vec2::new(200.0, 100.0));
    }

    #[test]
    fn frame_lerp_is_componentwise() {
        let a = CameraFrame::new(Vec3::ZERO, Vec3::X);
        let b = CameraFrame::new(Vec3::new(2.0, 2.0, 2.0), Vec3::Z);
        let mid = a.lerp(&b, 0.5);
        assert_eq!(mid.position, Vec3::ONE);
        assert_eq!(mid.look_at, Vec3::new(0.5, 0.0, 0.5));
    }
}
