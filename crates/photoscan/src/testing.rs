//! In-memory photo fixtures for unit tests.

use crate::source::SourceImage;
use image::{ColorType, ImageEncoder, RgbImage};

/// Encodes a `w`×`h` PNG whose pixels come from `pixel(x, y)`.
pub fn png_photo(
    name: &str,
    w: u32,
    h: u32,
    pixel: impl Fn(u32, u32) -> [u8; 3],
) -> SourceImage {
    let img = RgbImage::from_fn(w, h, |x, y| image::Rgb(pixel(x, y)));
    let mut bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut bytes)
        .write_image(img.as_raw(), w, h, ColorType::Rgb8)
        .expect("encode png fixture");
    SourceImage::new(name, "image/png", bytes)
}

pub fn solid_png(name: &str, w: u32, h: u32, rgb: [u8; 3]) -> SourceImage {
    png_photo(name, w, h, |_, _| rgb)
}
