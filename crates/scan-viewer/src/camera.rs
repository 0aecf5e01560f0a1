use glam::{Mat4, Vec3};
use std::f32::consts::PI;

/// Vertical field of view, degrees.
pub const FOV_Y_DEG: f32 = 75.0;
pub const NEAR: f32 = 0.1;
pub const FAR: f32 = 1000.0;

/// Where every freshly generated cloud is framed from.
pub const DEFAULT_EYE: Vec3 = Vec3::new(0.0, 0.0, 5.0);

/// Keeps the polar angle off the exact poles so `look_at` stays defined.
const POLE_EPS: f32 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    /// Look-at point; mirrors the orbit controls' target.
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Perspective camera at [`DEFAULT_EYE`] looking at the origin.
    pub fn new(aspect: f32) -> Self {
        Self {
            position: DEFAULT_EYE,
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_rad: FOV_Y_DEG.to_radians(),
            aspect,
            near: NEAR,
            far: FAR,
        }
    }

    /// Back to the default framing.
    pub fn reset(&mut self) {
        self.position = DEFAULT_EYE;
        self.target = Vec3::ZERO;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// wgpu clip space: depth in [0, 1], which `perspective_rh` already targets.
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y_rad, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.proj() * self.view()
    }

    pub fn distance(&self) -> f32 {
        self.position.distance(self.target)
    }
}

/// Tunables of [`OrbitControls`]. Defaults are the viewer's configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitConfig {
    pub enable_damping: bool,
    /// Fraction of the pending motion applied (and removed) each update.
    pub damping_factor: f32,
    pub enable_rotate: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub pan_speed: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            enable_damping: true,
            damping_factor: 0.05,
            enable_rotate: true,
            enable_zoom: true,
            enable_pan: true,
            min_distance: 1.0,
            max_distance: 50.0,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            rotate_speed: 1.0,
            zoom_speed: 1.0,
            pan_speed: 1.0,
        }
    }
}

/// Orbit-style camera manipulation with inertial damping.
///
/// Input only accumulates pending motion; [`update`](Self::update) applies it
/// to the camera once per frame. With damping on, each update applies a
/// `damping_factor` share of the pending rotation and pan and decays the rest.
#[derive(Debug, Clone)]
pub struct OrbitControls {
    pub config: OrbitConfig,
    target: Vec3,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
}

impl OrbitControls {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            config,
            target: Vec3::ZERO,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
        }
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Drops pending motion and re-centers on `target`.
    pub fn reset(&mut self, target: Vec3) {
        self.target = target;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.scale = 1.0;
        self.pan_offset = Vec3::ZERO;
    }

    /// Releases the controls. Nothing is held beyond pending motion, which is
    /// discarded with `self`.
    pub fn dispose(self) {}

    /// True while damped motion is still being applied.
    pub fn is_settling(&self) -> bool {
        self.delta_theta.abs() > 1e-6
            || self.delta_phi.abs() > 1e-6
            || self.pan_offset.length_squared() > 1e-12
            || (self.scale - 1.0).abs() > 1e-6
    }

    /// Rotates by a pointer drag of `dx`,`dy` pixels; a drag across the full
    /// viewport height is one full turn.
    pub fn rotate_pixels(&mut self, dx: f32, dy: f32, viewport_height: f32) {
        if !self.config.enable_rotate || viewport_height <= 0.0 {
            return;
        }
        let k = 2.0 * PI * self.config.rotate_speed / viewport_height;
        self.delta_theta -= dx * k;
        self.delta_phi -= dy * k;
    }

    /// Positive `steps` zoom in (towards the target).
    pub fn zoom(&mut self, steps: f32) {
        if !self.config.enable_zoom {
            return;
        }
        self.scale *= 0.95f32.powf(steps * self.config.zoom_speed);
    }

    /// Pans by a pointer drag of `dx`,`dy` pixels so the point under the
    /// cursor follows it at target depth. Vertical motion moves along the
    /// ground plane (orthogonal to `camera.up`), not screen-space up.
    pub fn pan_pixels(&mut self, dx: f32, dy: f32, camera: &Camera, viewport_height: f32) {
        if !self.config.enable_pan || viewport_height <= 0.0 {
            return;
        }
        let offset = camera.position - self.target;
        let target_distance = offset.length() * (camera.fov_y_rad * 0.5).tan();
        let k = 2.0 * target_distance * self.config.pan_speed / viewport_height;

        let forward = (-offset).normalize_or_zero();
        let right = forward.cross(camera.up).normalize_or_zero();
        let along_ground = camera.up.cross(right);

        self.pan_offset += -right * (dx * k) + along_ground * (dy * k);
    }

    /// Applies pending motion to `camera`. Returns true if the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let cfg = &self.config;
        let offset = camera.position - self.target;

        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI * 0.5)
        };

        let step = if cfg.enable_damping {
            cfg.damping_factor
        } else {
            1.0
        };

        theta += self.delta_theta * step;
        phi += self.delta_phi * step;
        phi = phi
            .clamp(cfg.min_polar_angle, cfg.max_polar_angle)
            .clamp(POLE_EPS, PI - POLE_EPS);

        radius = (radius * self.scale).clamp(cfg.min_distance, cfg.max_distance);
        self.target += self.pan_offset * step;

        let new_offset = Vec3::new(
            radius * phi.sin() * theta.sin(),
            radius * phi.cos(),
            radius * phi.sin() * theta.cos(),
        );
        let new_position = self.target + new_offset;

        if cfg.enable_damping {
            let decay = 1.0 - cfg.damping_factor;
            self.delta_theta *= decay;
            self.delta_phi *= decay;
            self.pan_offset *= decay;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        let moved = new_position.distance_squared(camera.position) > 1e-12
            || self.target.distance_squared(camera.target) > 1e-12;
        camera.position = new_position;
        camera.target = self.target;
        moved
    }
}

impl Default for OrbitControls {
    fn default() -> Self {
        Self::new(OrbitConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: Vec3, b: Vec3) -> bool {
        a.distance(b) < 1e-4
    }

    #[test]
    fn new_camera_uses_default_framing() {
        let cam = Camera::new(16.0 / 9.0);
        assert_eq!(cam.position, Vec3::new(0.0, 0.0, 5.0));
        assert_eq!(cam.target, Vec3::ZERO);
        assert!((cam.fov_y_rad - 75f32.to_radians()).abs() < 1e-6);
        assert_eq!((cam.near, cam.far), (0.1, 1000.0));
    }

    #[test]
    fn idle_update_keeps_camera_still() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.update(&mut cam);
        assert!(approx(cam.position, DEFAULT_EYE));
        assert!(!controls.update(&mut cam));
    }

    #[test]
    fn zoom_is_clamped_to_distance_limits() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::default();

        controls.zoom(500.0);
        controls.update(&mut cam);
        assert!((cam.distance() - 1.0).abs() < 1e-4);

        controls.zoom(-500.0);
        controls.update(&mut cam);
        assert!((cam.distance() - 50.0).abs() < 1e-3);
    }

    #[test]
    fn damping_spreads_rotation_over_frames() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::default();
        controls.rotate_pixels(100.0, 0.0, 500.0);

        assert!(controls.update(&mut cam));
        let first = cam.position;
        assert!(controls.is_settling());

        for _ in 0..600 {
            controls.update(&mut cam);
        }
        assert!(!controls.is_settling());
        // Radius is preserved while orbiting.
        assert!((cam.distance() - 5.0).abs() < 1e-3);
        assert!(!approx(cam.position, first));
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::new(OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        });

        controls.rotate_pixels(0.0, 10_000.0, 100.0);
        controls.update(&mut cam);
        let offset = cam.position - cam.target;
        assert!(offset.y > 4.99, "expected camera near the top pole, got {offset}");
    }

    #[test]
    fn pan_moves_target_and_camera_together() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::new(OrbitConfig {
            enable_damping: false,
            ..OrbitConfig::default()
        });

        controls.pan_pixels(-50.0, 0.0, &cam, 500.0);
        controls.update(&mut cam);
        assert!(controls.target().x > 0.0);
        assert!(approx(cam.position - cam.target, DEFAULT_EYE));
    }

    #[test]
    fn disabled_inputs_are_ignored() {
        let mut cam = Camera::new(1.0);
        let mut controls = OrbitControls::new(OrbitConfig {
            enable_rotate: false,
            enable_zoom: false,
            enable_pan: false,
            ..OrbitConfig::default()
        });

        controls.rotate_pixels(40.0, 40.0, 100.0);
        controls.zoom(3.0);
        controls.pan_pixels(10.0, 10.0, &cam, 100.0);
        assert!(!controls.is_settling());
        controls.update(&mut cam);
        assert!(approx(cam.position, DEFAULT_EYE));
    }

    #[test]
    fn reset_discards_pending_motion() {
        let mut controls = OrbitControls::default();
        controls.rotate_pixels(10.0, 10.0, 100.0);
        controls.zoom(1.0);
        controls.reset(Vec3::ZERO);
        assert!(!controls.is_settling());
    }
}
