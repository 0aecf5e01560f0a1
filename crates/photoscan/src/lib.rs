//! Photo scan pipeline: photographs in, colored point clouds out.
//!
//! - [`sampler`] decodes JPEG/PNG photos into per-pixel [`RawSample`]s.
//! - [`cache`] keeps the full-resolution dataset for the current photo set.
//! - [`resample`] turns the dataset plus [`ScanSettings`] into render buffers.
//! - [`worker`] runs cache + resample on a background thread.
//! - [`controller`] and [`intake`] are the settings and file boundaries.
//!
//! Depth is brightness: every pixel becomes one point whose z is a linear
//! function of its luminance. Nothing here touches the GPU.

pub mod cache;
pub mod color;
pub mod controller;
pub mod debounce;
pub mod error;
pub mod intake;
pub mod resample;
pub mod sampler;
pub mod settings;
pub mod source;
pub mod worker;

pub use cache::{PhotoDataset, PointCloudCache};
pub use color::Rgb;
pub use controller::{SettingsChange, SettingsController};
pub use debounce::Debouncer;
pub use error::{Result, ScanError};
pub use intake::PhotoSet;
pub use resample::{resample, RenderGeometry};
pub use sampler::{PixelSampler, RawSample, Sampler, Thumbnail};
pub use settings::ScanSettings;
pub use source::{RasterFormat, SourceImage};
pub use worker::{ScanOutput, ScanWorker};

#[cfg(test)]
mod testing;
