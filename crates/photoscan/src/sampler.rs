//! Pixel sampling: one [`RawSample`] per decoded pixel.

use crate::error::{Result, ScanError};
use crate::source::SourceImage;
use image::RgbImage;

/// One decoded pixel on the normalized image plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSample {
    /// Column position in [-0.5, 0.5).
    pub x: f32,
    /// Row position in [-0.5, 0.5), growing downwards like image rows.
    pub y: f32,
    /// Mean of the three channels, in [0, 1].
    pub luminance: f32,
    /// Channels normalized to [0, 1].
    pub color: [f32; 3],
}

/// Anything that can turn a photo into samples. The cache is generic over
/// this so decode work can be observed.
pub trait Sampler: Sync {
    fn sample(&self, image: &SourceImage) -> Result<Vec<RawSample>>;
}

/// The production sampler: decodes JPEG/PNG with the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelSampler;

/// A small RGB preview of a photo, row-major, 3 bytes per pixel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl PixelSampler {
    /// Decodes using the declared format only; no content sniffing.
    pub fn decode(&self, image: &SourceImage) -> Result<RgbImage> {
        let format = image.raster_format()?;
        let decoded = image::load_from_memory_with_format(image.bytes(), format.image_format())
            .map_err(|source| ScanError::Decode {
                name: image.name().to_string(),
                source,
            })?;

        // Alpha is dropped.
        Ok(decoded.to_rgb8())
    }

    /// Decodes `image` and shrinks it so neither side exceeds `max_side`,
    /// keeping the aspect ratio. Images already small enough are returned
    /// as decoded.
    pub fn thumbnail(&self, image: &SourceImage, max_side: u32) -> Result<Thumbnail> {
        let rgb = self.decode(image)?;
        let (w, h) = fit_within(rgb.width(), rgb.height(), max_side.max(1));

        let small = if (w, h) == rgb.dimensions() {
            rgb
        } else {
            image::imageops::thumbnail(&rgb, w, h)
        };
        Ok(Thumbnail {
            width: small.width(),
            height: small.height(),
            rgb: small.into_raw(),
        })
    }
}

fn fit_within(w: u32, h: u32, max_side: u32) -> (u32, u32) {
    let long = w.max(h);
    if long <= max_side {
        return (w, h);
    }
    let scale = |side: u32| ((side as u64 * max_side as u64 / long as u64) as u32).max(1);
    (scale(w), scale(h))
}

impl Sampler for PixelSampler {
    fn sample(&self, image: &SourceImage) -> Result<Vec<RawSample>> {
        let rgb = self.decode(image)?;
        log::debug!(
            "Sampled {} ({}x{}, {} px)",
            image.name(),
            rgb.width(),
            rgb.height(),
            rgb.width() as u64 * rgb.height() as u64
        );
        Ok(samples_from_rgb(&rgb))
    }
}

/// Row-major samples: `x = col/W - 0.5`, `y = row/H - 0.5`.
pub fn samples_from_rgb(rgb: &RgbImage) -> Vec<RawSample> {
    let w = rgb.width() as f32;
    let h = rgb.height() as f32;

    rgb.enumerate_pixels()
        .map(|(col, row, px)| {
            let [r, g, b] = px.0;
            RawSample {
                x: col as f32 / w - 0.5,
                y: row as f32 / h - 0.5,
                luminance: (r as f32 + g as f32 + b as f32) / (3.0 * 255.0),
                color: [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0],
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{png_photo, solid_png};

    #[test]
    fn white_pixels_have_full_luminance() {
        let samples = PixelSampler.sample(&solid_png("white.png", 2, 2, [255, 255, 255])).unwrap();

        assert_eq!(samples.len(), 4);
        for s in &samples {
            assert_eq!(s.luminance, 1.0);
            assert_eq!(s.color, [1.0, 1.0, 1.0]);
        }
    }

    #[test]
    fn coordinates_are_row_major_and_centered() {
        let samples = PixelSampler.sample(&solid_png("grid.png", 4, 2, [0, 0, 0])).unwrap();
        let xy: Vec<(f32, f32)> = samples.iter().map(|s| (s.x, s.y)).collect();

        assert_eq!(
            xy,
            vec![
                (-0.5, -0.5),
                (-0.25, -0.5),
                (0.0, -0.5),
                (0.25, -0.5),
                (-0.5, 0.0),
                (-0.25, 0.0),
                (0.0, 0.0),
                (0.25, 0.0),
            ]
        );
    }

    #[test]
    fn luminance_is_channel_mean() {
        let photo = png_photo("mixed.png", 2, 1, |x, _| if x == 0 { [255, 0, 0] } else { [30, 60, 90] });
        let samples = PixelSampler.sample(&photo).unwrap();

        assert!((samples[0].luminance - 1.0 / 3.0).abs() < 1e-6);
        assert!((samples[1].luminance - 60.0 / 255.0).abs() < 1e-6);
        assert_eq!(samples[0].color, [1.0, 0.0, 0.0]);
    }

    #[test]
    fn thumbnail_keeps_aspect_and_fits_the_box() {
        let photo = solid_png("wide.png", 200, 50, [10, 20, 30]);
        let thumb = PixelSampler.thumbnail(&photo, 64).unwrap();

        assert_eq!((thumb.width, thumb.height), (64, 16));
        assert_eq!(thumb.rgb.len(), 64 * 16 * 3);
        assert_eq!(&thumb.rgb[..3], &[10, 20, 30]);
    }

    #[test]
    fn small_photo_is_not_upscaled() {
        let photo = png_photo("tiny.png", 3, 2, |x, y| [x as u8, y as u8, 7]);
        let thumb = PixelSampler.thumbnail(&photo, 64).unwrap();

        assert_eq!((thumb.width, thumb.height), (3, 2));
        assert_eq!(&thumb.rgb[3..6], &[1, 0, 7]);
    }

    #[test]
    fn extreme_aspect_never_rounds_to_zero() {
        assert_eq!(fit_within(1000, 2, 10), (10, 1));
        assert_eq!(fit_within(2, 1000, 10), (1, 10));
    }

    #[test]
    fn thumbnail_of_corrupt_photo_is_a_decode_error() {
        let photo = SourceImage::new("broken.png", "image/png", vec![0, 1, 2]);
        assert!(matches!(
            PixelSampler.thumbnail(&photo, 64),
            Err(ScanError::Decode { .. })
        ));
    }

    #[test]
    fn unsupported_type_is_rejected_before_decode() {
        let mut photo = solid_png("a.png", 1, 1, [1, 2, 3]);
        photo = SourceImage::new(photo.name(), "image/bmp", photo.bytes().to_vec());

        assert!(matches!(
            PixelSampler.sample(&photo),
            Err(ScanError::UnsupportedMedia { .. })
        ));
    }

    #[test]
    fn declared_format_is_trusted_over_content() {
        let png = solid_png("liar.jpg", 1, 1, [1, 2, 3]);
        let photo = SourceImage::new("liar.jpg", "image/jpeg", png.bytes().to_vec());

        assert!(matches!(PixelSampler.sample(&photo), Err(ScanError::Decode { .. })));
    }
}
