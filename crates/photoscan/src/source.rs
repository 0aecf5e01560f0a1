//! Caller-owned photographs as handed to the pipeline.

use crate::error::{Result, ScanError};

/// Raster formats the sampler will decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RasterFormat {
    Jpeg,
    Png,
}

impl RasterFormat {
    /// Accepts `image/jpeg`, `image/jpg` and `image/png`, ignoring case.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.trim();
        if mime.eq_ignore_ascii_case("image/jpeg") || mime.eq_ignore_ascii_case("image/jpg") {
            Some(Self::Jpeg)
        } else if mime.eq_ignore_ascii_case("image/png") {
            Some(Self::Png)
        } else {
            None
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    pub(crate) fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
        }
    }
}

/// Raw encoded bytes plus the declared MIME type. The pipeline only reads it.
#[derive(Debug, Clone)]
pub struct SourceImage {
    name: String,
    mime: String,
    bytes: Vec<u8>,
}

impl SourceImage {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The declared format, or `UnsupportedMedia` if it is not a raster type
    /// we decode.
    pub fn raster_format(&self) -> Result<RasterFormat> {
        RasterFormat::from_mime(&self.mime).ok_or_else(|| ScanError::UnsupportedMedia {
            name: self.name.clone(),
            mime: self.mime.clone(),
        })
    }
}

impl AsRef<SourceImage> for SourceImage {
    fn as_ref(&self) -> &SourceImage {
        self
    }
}
