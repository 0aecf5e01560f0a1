//! User-tunable scan parameters.

use crate::color::Rgb;
use std::ops::RangeInclusive;

pub const POINT_SIZE_RANGE: RangeInclusive<f32> = 0.01..=0.1;
pub const POINT_DENSITY_RANGE: RangeInclusive<f32> = 0.01..=0.5;
pub const COLOR_INTENSITY_RANGE: RangeInclusive<f32> = 0.1..=2.0;
pub const DEPTH_EFFECT_RANGE: RangeInclusive<f32> = 0.1..=2.0;

/// Pure configuration value. Replacing it never touches the cached dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanSettings {
    /// Sprite size in world units (attenuated with distance).
    pub point_size: f32,
    /// Fraction of decoded pixels kept as points.
    pub point_density: f32,
    /// Multiplier applied to every color channel; not clamped.
    pub color_intensity: f32,
    /// Half-extent of the depth range brightness is mapped onto.
    pub depth_effect: f32,
    /// Clear color of the viewer. Changing it rebuilds the viewer session.
    pub background: Rgb,
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            point_size: 0.02,
            point_density: 0.1,
            color_intensity: 1.0,
            depth_effect: 1.0,
            background: Rgb::WHITE,
        }
    }
}

impl ScanSettings {
    /// Clamps every numeric field into its slider range. Non-finite values
    /// fall back to the default for that field.
    ///
    /// This is the UI-side guard; the resampler itself never re-validates.
    pub fn clamped(self) -> Self {
        let defaults = Self::default();
        let clamp = |v: f32, range: &RangeInclusive<f32>, fallback: f32| {
            if v.is_finite() {
                v.clamp(*range.start(), *range.end())
            } else {
                fallback
            }
        };

        Self {
            point_size: clamp(self.point_size, &POINT_SIZE_RANGE, defaults.point_size),
            point_density: clamp(
                self.point_density,
                &POINT_DENSITY_RANGE,
                defaults.point_density,
            ),
            color_intensity: clamp(
                self.color_intensity,
                &COLOR_INTENSITY_RANGE,
                defaults.color_intensity,
            ),
            depth_effect: clamp(self.depth_effect, &DEPTH_EFFECT_RANGE, defaults.depth_effect),
            background: self.background,
        }
    }

    /// True when `other` would produce a different point cloud (or sprite size).
    /// Background is excluded; it is handled by a session rebuild instead.
    pub fn geometry_differs(&self, other: &ScanSettings) -> bool {
        self.point_size != other.point_size
            || self.point_density != other.point_density
            || self.color_intensity != other.color_intensity
            || self.depth_effect != other.depth_effect
    }
}
