//! The ordered photo list fed into the pipeline.

use crate::error::Result;
use crate::source::{RasterFormat, SourceImage};
use std::sync::Arc;

/// MIME type to declare for a file extension; unknown extensions get a
/// generic binary type and will be rejected by [`PhotoSet::add`].
pub fn mime_for_extension(ext: &str) -> &'static str {
    RasterFormat::from_extension(ext).map_or("application/octet-stream", RasterFormat::mime)
}

/// Photos in insertion order. Only accepted raster types get in.
///
/// Entries are shared with the scan worker through `Arc`, so removing one here
/// releases it as soon as any in-flight scan is done with it.
#[derive(Debug, Default, Clone)]
pub struct PhotoSet {
    photos: Vec<Arc<SourceImage>>,
}

impl PhotoSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `image`, or returns `UnsupportedMedia` without storing it.
    pub fn add(&mut self, image: SourceImage) -> Result<()> {
        image.raster_format()?;
        self.photos.push(Arc::new(image));
        Ok(())
    }

    /// Adds every acceptable image, logging and dropping the rest. Returns the
    /// number accepted.
    pub fn extend<I>(&mut self, images: I) -> usize
    where
        I: IntoIterator<Item = SourceImage>,
    {
        let mut accepted = 0;
        for image in images {
            match self.add(image) {
                Ok(()) => accepted += 1,
                Err(e) => log::warn!("Ignoring photo: {}", e),
            }
        }
        accepted
    }

    /// Removes the photo at `index`; out of range is a no-op.
    pub fn remove(&mut self, index: usize) -> Option<Arc<SourceImage>> {
        (index < self.photos.len()).then(|| self.photos.remove(index))
    }

    pub fn clear(&mut self) {
        self.photos.clear();
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceImage> {
        self.photos.iter().map(|p| p.as_ref())
    }

    /// Cheap copy of the current list for handing to the worker.
    pub fn snapshot(&self) -> Vec<Arc<SourceImage>> {
        self.photos.clone()
    }
}
