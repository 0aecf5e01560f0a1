//! Density resampling: cached samples + settings → render buffers.

use crate::cache::PhotoDataset;
use crate::error::{Result, ScanError};
use crate::sampler::RawSample;
use crate::settings::ScanSettings;
use rayon::prelude::*;

/// Image-plane units to world units.
pub const WORLD_SCALE: f32 = 5.0;

/// Flat, parallel xyz / rgb buffers ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderGeometry {
    vertices: Vec<f32>,
    colors: Vec<f32>,
}

impl RenderGeometry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Both buffers must hold the same number of whole triples.
    pub fn from_parts(vertices: Vec<f32>, colors: Vec<f32>) -> Result<Self> {
        if vertices.len() != colors.len() || vertices.len() % 3 != 0 {
            return Err(ScanError::InvalidGeometry {
                vertices: vertices.len(),
                colors: colors.len(),
            });
        }
        Ok(Self { vertices, colors })
    }

    pub fn vertices(&self) -> &[f32] {
        &self.vertices
    }

    pub fn colors(&self) -> &[f32] {
        &self.colors
    }

    /// Number of points.
    pub fn len(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// `(position, color)` per point.
    pub fn points(&self) -> impl Iterator<Item = ([f32; 3], [f32; 3])> + '_ {
        self.vertices
            .chunks_exact(3)
            .zip(self.colors.chunks_exact(3))
            .map(|(v, c)| ([v[0], v[1], v[2]], [c[0], c[1], c[2]]))
    }
}

/// Stride between kept samples, or `None` when nothing should be kept.
///
/// `target = floor(n * density)`, `stride = max(1, floor(n / target))`.
pub fn stride_for(n: usize, density: f32) -> Option<usize> {
    let target = (n as f64 * density as f64).floor();
    // Also rejects NaN.
    if !(target >= 1.0) {
        return None;
    }
    Some((n / target as usize).max(1))
}

/// Resamples `dataset` for display.
///
/// Keeps every `stride`-th sample (see [`stride_for`]) and maps it to world
/// space: x and y are scaled by [`WORLD_SCALE`], brightness becomes
/// `z = luminance * 2 * depth_effect - depth_effect`, and color channels are
/// multiplied by `color_intensity` without clamping.
///
/// Deterministic: each output point depends only on its own sample, and the
/// output order is the sample order.
pub fn resample(dataset: &PhotoDataset, settings: &ScanSettings) -> RenderGeometry {
    let samples = dataset.samples();
    let Some(stride) = stride_for(samples.len(), settings.point_density) else {
        return RenderGeometry::empty();
    };

    let count = samples.len().div_ceil(stride);
    let (positions, colors): (Vec<[f32; 3]>, Vec<[f32; 3]>) = (0..count)
        .into_par_iter()
        .map(|k| project(&samples[k * stride], settings))
        .unzip();

    RenderGeometry {
        vertices: positions.into_iter().flatten().collect(),
        colors: colors.into_iter().flatten().collect(),
    }
}

#[inline]
fn project(s: &RawSample, settings: &ScanSettings) -> ([f32; 3], [f32; 3]) {
    let depth = settings.depth_effect;
    let gain = settings.color_intensity;
    (
        [
            s.x * WORLD_SCALE,
            s.y * WORLD_SCALE,
            s.luminance * 2.0 * depth - depth,
        ],
        [s.color[0] * gain, s.color[1] * gain, s.color[2] * gain],
    )
}
