//! Plain scene description handed to renderers: viewport, background, lights.

use glam::Vec3;
use photoscan::Rgb;

/// Drawable area in physical pixels. Never zero-sized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// `None` for a zero-sized (minimized or detached) surface.
    pub fn new(width: u32, height: u32) -> Option<Self> {
        (width > 0 && height > 0).then_some(Self { width, height })
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    pub fn size_f32(&self) -> [f32; 2] {
        [self.width as f32, self.height as f32]
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    /// Light position; it shines from here towards the origin.
    pub position: Vec3,
}

impl DirectionalLight {
    /// Unit vector from the lit point towards the light.
    pub fn direction_to_light(&self) -> Vec3 {
        self.position.normalize_or_zero()
    }

    pub fn radiance(&self) -> [f32; 3] {
        self.color.map(|c| c * self.intensity)
    }
}

/// Ambient fill plus a key and a back/fill directional light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneLights {
    pub ambient: AmbientLight,
    pub key: DirectionalLight,
    pub fill: DirectionalLight,
}

impl Default for SceneLights {
    fn default() -> Self {
        Self {
            ambient: AmbientLight {
                color: [1.0; 3],
                intensity: 0.6,
            },
            key: DirectionalLight {
                color: [1.0; 3],
                intensity: 0.8,
                position: Vec3::new(1.0, 1.0, 1.0),
            },
            fill: DirectionalLight {
                color: [1.0; 3],
                intensity: 0.3,
                position: Vec3::new(-1.0, -1.0, -1.0),
            },
        }
    }
}

/// Everything fixed at scene-creation time. Changing any of it means a
/// rebuild.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSetup {
    pub viewport: Viewport,
    pub background: Rgb,
    pub lights: SceneLights,
}
