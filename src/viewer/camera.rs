//! Spherical orbit camera with exponential damping.
//!
//! The camera keeps two spherical states: `target`, written by input
//! handling, and `current`, written only by [`OrbitCamera::update`] once per
//! frame. Rendering always uses `current`, so input bursts never tear a frame.

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::f32::consts::{PI, TAU};

/// `(radius, polar, azimuth)` around the orbit target.
///
/// Polar is measured from +Y, azimuth around +Y starting at +Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Spherical {
    pub radius: f32,
    pub polar: f32,
    pub azimuth: f32,
}

impl Spherical {
    pub fn new(radius: f32, polar: f32, azimuth: f32) -> Self {
        Self { radius, polar, azimuth }
    }

    /// Cartesian offset from the orbit target.
    pub fn to_offset(self) -> Vec3 {
        let s = self.polar.sin();
        Vec3::new(
            self.radius * s * self.azimuth.sin(),
            self.radius * self.polar.cos(),
            self.radius * s * self.azimuth.cos(),
        )
    }
}

/// Blend factor for one frame of `dt` seconds.
///
/// `damping` is the fraction of the remaining distance covered per 60 Hz
/// frame; other frame rates converge at the same speed in wall time.
pub fn damping_alpha(damping: f32, dt: f32) -> f32 {
    let damping = damping.clamp(0.0, 1.0);
    if damping >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - damping).powf(dt.max(0.0) * 60.0)
}

/// Move `current` toward `target` by `alpha`.
pub fn damp(current: f32, target: f32, alpha: f32) -> f32 {
    current + (target - current) * alpha
}

/// Wrap an angle difference into `(-π, π]`.
pub fn shortest_arc(delta: f32) -> f32 {
    let wrapped = (delta + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Like [`damp`] but along the shorter way around the circle.
pub fn damp_angle(current: f32, target: f32, alpha: f32) -> f32 {
    current + shortest_arc(target - current) * alpha
}

/// View and projection matrices for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraFrame {
    pub eye: Vec3,
    /// Unit vector from eye toward the orbit target.
    pub forward: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub near: f32,
    pub far: f32,
}

impl CameraFrame {
    /// Build a right-handed frame looking from `eye` at `target` with +Y up.
    pub fn look_at(eye: Vec3, target: Vec3, fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        let forward = (target - eye).normalize_or_zero();
        // looking straight up or down
        let up = if forward.cross(Vec3::Y).length_squared() < 1e-12 { Vec3::Z } else { Vec3::Y };
        Self {
            eye,
            forward,
            view: Mat4::look_at_rh(eye, target, up),
            projection: Mat4::perspective_rh(fov_y, aspect.max(1e-6), near, far),
            near,
            far,
        }
    }

    /// World point → view space (camera looks down -Z).
    pub fn to_view(&self, p: Vec3) -> Vec3 {
        self.view.transform_point3(p)
    }

    /// World direction → view space.
    pub fn dir_to_view(&self, d: Vec3) -> Vec3 {
        self.view.transform_vector3(d)
    }

    /// View point → normalized device coordinates `(x, y)` plus view depth.
    ///
    /// Returns `None` for points closer than the near plane.
    pub fn project(&self, v: Vec3) -> Option<(f32, f32, f32)> {
        let depth = -v.z;
        if depth < self.near {
            return None;
        }
        let clip = self.projection * v.extend(1.0);
        Some((clip.x / clip.w, clip.y / clip.w, depth))
    }
}

/// Damped orbit camera state.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitCamera {
    pub current: Spherical,
    pub target: Spherical,
    pub orbit_target: Vec3,
    pub aspect: f32,
}

impl OrbitCamera {
    pub fn new(initial: Spherical, aspect: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            orbit_target: Vec3::ZERO,
            aspect,
        }
    }

    /// Advance `current` toward `target`. The only writer of `current`.
    pub fn update(&mut self, damping: f32, dt: f32) {
        let alpha = damping_alpha(damping, dt);
        self.current.radius = damp(self.current.radius, self.target.radius, alpha);
        self.current.polar = damp(self.current.polar, self.target.polar, alpha);
        self.current.azimuth = damp_angle(self.current.azimuth, self.target.azimuth, alpha);
    }

    pub fn eye(&self) -> Vec3 {
        self.orbit_target + self.current.to_offset()
    }

    pub fn frame(&self, fov_y: f32, near: f32, far: f32) -> CameraFrame {
        CameraFrame::look_at(self.eye(), self.orbit_target, fov_y, self.aspect, near, far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_matches_spherical_convention() {
        let o = Spherical::new(2.0, PI / 2.0, 0.0).to_offset();
        assert!((o.z - 2.0).abs() < 1e-5 && o.x.abs() < 1e-5 && o.y.abs() < 1e-5);
        let top = Spherical::new(3.0, 0.0, 1.0).to_offset();
        assert!((top.y - 3.0).abs() < 1e-5);
    }

    #[test]
    fn alpha_at_sixty_hz_equals_damping() {
        assert!((damping_alpha(0.08, 1.0 / 60.0) - 0.08).abs() < 1e-5);
        assert_eq!(damping_alpha(0.08, 0.0), 0.0);
        assert_eq!(damping_alpha(1.0, 0.016), 1.0);
        // two half-steps land where one full step does
        let half = damping_alpha(0.08, 1.0 / 120.0);
        let two_halves = damp(damp(0.0, 1.0, half), 1.0, half);
        assert!((two_halves - 0.08).abs() < 1e-5);
    }

    #[test]
    fn angles_take_the_short_way() {
        assert!((shortest_arc(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-5);
        assert!((shortest_arc(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-5);
        let next = damp_angle(0.1, TAU - 0.1, 0.5);
        assert!(next < 0.1, "moved the long way: {next}");
        assert!((next - 0.0).abs() < 1e-4);
    }

    #[test]
    fn update_converges_to_target() {
        let mut cam = OrbitCamera::new(Spherical::new(140.0, 1.0, 0.5), 1.0);
        cam.target = Spherical::new(60.0, 1.2, -0.5);
        for _ in 0..600 {
            cam.update(0.08, 1.0 / 60.0);
        }
        assert!((cam.current.radius - 60.0).abs() < 1e-3);
        assert!((cam.current.polar - 1.2).abs() < 1e-4);
        assert!((cam.current.azimuth + 0.5).abs() < 1e-4);
    }

    #[test]
    fn target_projects_to_screen_center() {
        let cam = OrbitCamera::new(Spherical::new(50.0, 1.0, 0.7), 1.5);
        let frame = cam.frame(45f32.to_radians(), 0.1, 1000.0);
        let (x, y, depth) = frame.project(frame.to_view(cam.orbit_target)).unwrap();
        assert!(x.abs() < 1e-4 && y.abs() < 1e-4);
        assert!((depth - 50.0).abs() < 1e-3);
        // behind the camera
        assert!(frame.project(frame.to_view(frame.eye - frame.forward)).is_none());
    }

    #[test]
    fn screen_axes_follow_world_axes_from_the_front() {
        // on +Z looking at the origin: +X is screen right, +Y is screen up
        let cam = OrbitCamera::new(Spherical::new(10.0, PI / 2.0, 0.0), 1.0);
        let frame = cam.frame(60f32.to_radians(), 0.1, 100.0);
        let (x, _, _) = frame.project(frame.to_view(Vec3::X)).unwrap();
        let (_, y, _) = frame.project(frame.to_view(Vec3::Y)).unwrap();
        assert!(x > 0.0 && y > 0.0, "x={x} y={y}");
        assert!(frame.dir_to_view(Vec3::Z).abs_diff_eq(Vec3::Z, 1e-5));
    }

    #[test]
    fn top_down_view_stays_finite() {
        let frame = CameraFrame::look_at(Vec3::new(0.0, 10.0, 0.0), Vec3::ZERO, 1.0, 1.0, 0.1, 100.0);
        assert!(frame.view.is_finite());
        let (x, y, depth) = frame.project(frame.to_view(Vec3::ZERO)).unwrap();
        assert!(x.abs() < 1e-5 && y.abs() < 1e-5 && (depth - 10.0).abs() < 1e-4);
    }
}
