//! Background scan thread: owns the cache, runs build + resample off the UI
//! thread, and only ever reports the newest request.

use crate::cache::PointCloudCache;
use crate::error::{Result, ScanError};
use crate::resample::{resample, RenderGeometry};
use crate::sampler::{PixelSampler, Sampler};
use crate::settings::ScanSettings;
use crate::source::SourceImage;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

struct ScanJob {
    generation: u64,
    photos: Vec<Arc<SourceImage>>,
    settings: ScanSettings,
}

/// A finished scan, ready for `replace_geometry`.
#[derive(Debug)]
pub struct ScanOutput {
    pub generation: u64,
    pub geometry: RenderGeometry,
    pub point_size: f32,
    pub source_count: usize,
    pub elapsed: Duration,
}

pub struct ScanWorker {
    jobs: Option<Sender<ScanJob>>,
    results: Receiver<ScanOutput>,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl ScanWorker {
    pub fn spawn() -> Result<Self> {
        Self::spawn_with(PixelSampler)
    }

    pub fn spawn_with<S>(sampler: S) -> Result<Self>
    where
        S: Sampler + Send + 'static,
    {
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<ScanJob>();
        let (out_tx, out_rx) = crossbeam_channel::unbounded::<ScanOutput>();

        let handle = thread::Builder::new()
            .name("photoscan-worker".into())
            .spawn(move || run(PointCloudCache::with_sampler(sampler), job_rx, out_tx))?;

        Ok(Self {
            jobs: Some(job_tx),
            results: out_rx,
            handle: Some(handle),
            generation: 0,
        })
    }

    /// Queues a scan of `photos` with `settings` and returns its generation.
    ///
    /// An empty photo list is a no-op (`Ok(None)`). A newer submit supersedes
    /// any job the thread has not started yet.
    pub fn submit(
        &mut self,
        photos: Vec<Arc<SourceImage>>,
        settings: ScanSettings,
    ) -> Result<Option<u64>> {
        if photos.is_empty() {
            log::debug!("Scan requested with no photos; nothing to do");
            return Ok(None);
        }

        let jobs = self.jobs.as_ref().ok_or(ScanError::WorkerGone)?;
        self.generation += 1;
        jobs.send(ScanJob {
            generation: self.generation,
            photos,
            settings,
        })
        .map_err(|_| ScanError::WorkerGone)?;

        Ok(Some(self.generation))
    }

    /// The newest generation handed to [`submit`](Self::submit).
    pub fn latest_generation(&self) -> u64 {
        self.generation
    }

    /// Drains finished scans and returns the one for the latest generation,
    /// if it has arrived. Older results are dropped.
    pub fn try_latest(&mut self) -> Option<ScanOutput> {
        let mut latest = None;
        for out in self.results.try_iter() {
            if out.generation == self.generation {
                latest = Some(out);
            } else {
                log::debug!(
                    "Dropping stale scan (generation {} < {})",
                    out.generation,
                    self.generation
                );
            }
        }
        latest
    }

    /// Blocking variant of [`try_latest`](Self::try_latest).
    pub fn wait_latest(&mut self, timeout: Duration) -> Option<ScanOutput> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let out = self.results.recv_timeout(remaining).ok()?;
            if out.generation == self.generation {
                return Some(out);
            }
        }
    }
}

impl Drop for ScanWorker {
    fn drop(&mut self) {
        // Closing the job channel ends the thread's recv loop.
        self.jobs.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Scan worker panicked");
            }
        }
    }
}

fn run<S: Sampler>(
    mut cache: PointCloudCache<S>,
    jobs: Receiver<ScanJob>,
    results: Sender<ScanOutput>,
) {
    while let Ok(mut job) = jobs.recv() {
        // Only the newest queued request matters.
        for newer in jobs.try_iter() {
            log::debug!("Scan generation {} superseded by {}", job.generation, newer.generation);
            job = newer;
        }

        let started = Instant::now();
        let dataset = cache.build_or_reuse(&job.photos);
        let geometry = resample(dataset, &job.settings);
        let out = ScanOutput {
            generation: job.generation,
            point_size: job.settings.point_size,
            source_count: dataset.source_count(),
            geometry,
            elapsed: started.elapsed(),
        };

        log::debug!(
            "Scan generation {}: {} points in {:?}",
            out.generation,
            out.geometry.len(),
            out.elapsed
        );

        if results.send(out).is_err() {
            break;
        }
    }
    log::debug!("Scan worker exiting");
}
