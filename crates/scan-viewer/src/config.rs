use clap::Parser;
use photoscan::{Rgb, ScanSettings};
use std::path::PathBuf;
use std::time::Duration;

/// `scan_viewer` - turn photographs into an orbitable 3D point cloud.
///
/// Every sampled pixel becomes a point; its brightness pushes it towards or
/// away from the camera. Photos can be named here or dropped onto the window.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Config {
    /// JPEG/PNG files, or directories to search for them.
    pub photos: Vec<PathBuf>,

    /// Sprite size in world units (0.01 - 0.1).
    #[arg(long, env = "SCAN_POINT_SIZE", default_value_t = 0.02)]
    pub point_size: f32,

    /// Fraction of pixels turned into points (0.01 - 0.5).
    #[arg(long, env = "SCAN_POINT_DENSITY", default_value_t = 0.1)]
    pub point_density: f32,

    /// Color multiplier (0.1 - 2.0).
    #[arg(long, env = "SCAN_COLOR_INTENSITY", default_value_t = 1.0)]
    pub color_intensity: f32,

    /// How far brightness displaces points in depth (0.1 - 2.0).
    #[arg(long, env = "SCAN_DEPTH_EFFECT", default_value_t = 1.0)]
    pub depth_effect: f32,

    /// Viewer background as `#rrggbb`.
    #[arg(long, env = "SCAN_BACKGROUND", default_value = "#ffffff")]
    pub background: Rgb,

    /// Quiet period after the last settings change before resampling.
    #[arg(long, env = "SCAN_DEBOUNCE_MS", default_value_t = 100)]
    pub debounce_ms: u64,

    /// Generate a point cloud from the given photos right after startup.
    #[arg(long)]
    pub generate: bool,

    #[arg(long, default_value_t = 1280)]
    pub width: u32,

    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

impl Config {
    /// Initial settings, clamped into the slider ranges.
    pub fn scan_settings(&self) -> ScanSettings {
        ScanSettings {
            point_size: self.point_size,
            point_density: self.point_density,
            color_intensity: self.color_intensity,
            depth_effect: self.depth_effect,
            background: self.background,
        }
        .clamped()
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}
