//! 8-bit RGB colors written as `#rrggbb`.

use crate::error::ScanError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb::new(0xff, 0xff, 0xff);
    pub const BLACK: Rgb = Rgb::new(0x00, 0x00, 0x00);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Channels normalized to [0, 1], still sRGB-encoded.
    #[inline]
    pub fn to_f32(self) -> [f32; 3] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
        ]
    }

    /// Inverse of [`Rgb::to_f32`]; out-of-range channels saturate.
    pub fn from_f32(rgb: [f32; 3]) -> Self {
        let q = |c: f32| (c.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(q(rgb[0]), q(rgb[1]), q(rgb[2]))
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Self::WHITE
    }
}

impl FromStr for Rgb {
    type Err = ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ScanError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.is_ascii() {
            return Err(invalid());
        }

        match hex.len() {
            6 => {
                let channel =
                    |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| invalid());
                Ok(Self::new(channel(0)?, channel(2)?, channel(4)?))
            }
            // Short form: each nibble is doubled (#fa0 == #ffaa00).
            3 => {
                let channel = |i: usize| {
                    u8::from_str_radix(&hex[i..i + 1], 16)
                        .map(|n| n * 17)
                        .map_err(|_| invalid())
                };
                Ok(Self::new(channel(0)?, channel(1)?, channel(2)?))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!("#ffffff".parse::<Rgb>().unwrap(), Rgb::WHITE);
        assert_eq!("#1A2b3C".parse::<Rgb>().unwrap(), Rgb::new(0x1a, 0x2b, 0x3c));
        assert_eq!("#fa0".parse::<Rgb>().unwrap(), Rgb::new(0xff, 0xaa, 0x00));
    }

    #[test]
    fn rejects_malformed_colors() {
        for bad in ["ffffff", "#ffff", "#gggggg", "#ffffff00", "", "#é12"] {
            assert!(
                matches!(bad.parse::<Rgb>(), Err(ScanError::InvalidColor(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn display_is_lowercase_hex() {
        assert_eq!(Rgb::new(0x0a, 0xbc, 0xff).to_string(), "#0abcff");
    }

    #[test]
    fn float_conversion_saturates() {
        assert_eq!(Rgb::from_f32([1.5, -0.2, 0.5]), Rgb::new(255, 0, 128));
        assert_eq!(Rgb::from_f32(Rgb::BLACK.to_f32()), Rgb::BLACK);
    }
}
