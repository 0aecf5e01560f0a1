//! Full-resolution sample cache for the current photo set.

use crate::sampler::{PixelSampler, RawSample, Sampler};
use crate::source::SourceImage;
use rayon::prelude::*;

/// Every sample of every photo, in photo order, tagged with the number of
/// photos it was built from.
#[derive(Debug, Clone, Default)]
pub struct PhotoDataset {
    samples: Vec<RawSample>,
    source_count: usize,
}

impl PhotoDataset {
    pub fn new(samples: Vec<RawSample>, source_count: usize) -> Self {
        Self {
            samples,
            source_count,
        }
    }

    pub fn samples(&self) -> &[RawSample] {
        &self.samples
    }

    pub fn source_count(&self) -> usize {
        self.source_count
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// A dataset is stale as soon as the photo count differs.
    pub fn is_stale_for(&self, photo_count: usize) -> bool {
        self.source_count != photo_count
    }
}

/// Keeps one [`PhotoDataset`] and rebuilds it only when the photo *count*
/// changes.
///
/// Keyed on cardinality alone: swapping one photo for another (or adding and
/// then removing one) keeps serving the old samples until the count moves or
/// [`PointCloudCache::invalidate`] is called. This is the accepted behavior.
#[derive(Debug)]
pub struct PointCloudCache<S = PixelSampler> {
    sampler: S,
    dataset: PhotoDataset,
    rebuilds: u64,
}

impl PointCloudCache<PixelSampler> {
    pub fn new() -> Self {
        Self::with_sampler(PixelSampler)
    }
}

impl Default for PointCloudCache<PixelSampler> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sampler> PointCloudCache<S> {
    pub fn with_sampler(sampler: S) -> Self {
        Self {
            sampler,
            dataset: PhotoDataset::default(),
            rebuilds: 0,
        }
    }

    /// Returns the cached dataset, rebuilding it first if `photos.len()`
    /// differs from the recorded count.
    ///
    /// Photos are decoded in parallel; samples are concatenated in input
    /// order. Photos that fail to sample are skipped (and logged), but the
    /// dataset is still tagged with `photos.len()`.
    pub fn build_or_reuse<P>(&mut self, photos: &[P]) -> &PhotoDataset
    where
        P: AsRef<SourceImage> + Sync,
    {
        if !self.dataset.is_stale_for(photos.len()) {
            log::debug!(
                "Reusing cached dataset ({} samples from {} photos)",
                self.dataset.len(),
                photos.len()
            );
            return &self.dataset;
        }

        let sampler = &self.sampler;
        let per_photo: Vec<_> = photos
            .par_iter()
            .map(|photo| sampler.sample(photo.as_ref()))
            .collect();

        let mut samples = Vec::with_capacity(
            per_photo
                .iter()
                .map(|r| r.as_ref().map_or(0, Vec::len))
                .sum(),
        );
        let mut skipped = 0usize;

        for (photo, result) in photos.iter().zip(per_photo) {
            match result {
                Ok(mut s) => samples.append(&mut s),
                Err(e) => {
                    skipped += 1;
                    log::warn!("Skipping photo {}: {}", photo.as_ref().name(), e);
                }
            }
        }

        self.rebuilds += 1;
        log::info!(
            "Built dataset: {} samples from {} photos ({} skipped)",
            samples.len(),
            photos.len(),
            skipped
        );

        self.dataset = PhotoDataset::new(samples, photos.len());
        &self.dataset
    }

    pub fn dataset(&self) -> &PhotoDataset {
        &self.dataset
    }

    /// Forces the next [`build_or_reuse`](Self::build_or_reuse) to re-sample.
    pub fn invalidate(&mut self) {
        self.dataset = PhotoDataset {
            samples: Vec::new(),
            source_count: usize::MAX,
        };
    }

    /// How many times the dataset has been rebuilt.
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds
    }
}
