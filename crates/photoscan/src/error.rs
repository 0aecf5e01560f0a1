//! Error type shared by the scan pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    /// Declared type is not one of the accepted raster formats.
    #[error("unsupported media type '{mime}' for {name}")]
    UnsupportedMedia { name: String, mime: String },

    /// Accepted type, but the bytes did not decode.
    #[error("failed to decode {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: image::ImageError,
    },

    #[error("invalid color '{0}', expected #rrggbb or #rgb")]
    InvalidColor(String),

    /// Vertex and color buffers must be parallel xyz/rgb triples.
    #[error("invalid geometry: {vertices} vertex floats vs {colors} color floats")]
    InvalidGeometry { vertices: usize, colors: usize },

    #[error("failed to start scan worker: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("scan worker has shut down")]
    WorkerGone,
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
