//! Carving engine - find where known file formats begin inside a raw image.
//!
//! Scans raw disk images and memory dumps for the signatures in a
//! [`FormatCatalog`] and reports, per format, every offset where an instance
//! appears to start.
//!
//! # Design
//!
//! - **mmap**: Zero-copy, read-only access to multi-GB images via `memmap2`
//! - **One task per format**: every descriptor is scanned over the whole
//!   image on a bounded rayon pool; tasks share the buffer and return their
//!   own result, which is collected after the pool joins
//! - **Failure isolation**: a task that panics is recorded as an empty,
//!   failed result and its siblings carry on
//! - **Deterministic output**: offsets are sorted and results keyed by
//!   format name, so worker count never changes the outcome

pub mod catalog;
pub mod matcher;
pub mod signatures;

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{CarveError, CarveResult};
use crate::image;

pub use catalog::{FormatCatalog, FormatRecord, SignatureRecord};
pub use matcher::{find_simple, find_split};
pub use signatures::{Category, FormatDescriptor, MatchOffsets, Signature};

/// Matches found for one format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub format_name: String,
    pub category: Category,
    /// Ascending believed file starts, already adjusted by the back offset
    pub offsets: Vec<usize>,
    /// Set when the task for this format failed; offsets are then empty
    pub error: Option<String>,
}

impl ScanResult {
    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Outcome of scanning one buffer against a catalog
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOutcome {
    /// Every format that was attempted, in catalog order
    pub tested: Vec<String>,
    pub results: BTreeMap<String, ScanResult>,
}

impl ScanOutcome {
    pub fn offsets(&self, format: &str) -> Option<&[usize]> {
        self.results.get(format).map(|r| r.offsets.as_slice())
    }

    pub fn total_matches(&self) -> usize {
        self.results.values().map(|r| r.offsets.len()).sum()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ScanResult> {
        self.results.values().filter(|r| r.is_failed())
    }

    /// Results in the order the formats were tested
    pub fn in_tested_order(&self) -> impl Iterator<Item = &ScanResult> {
        self.tested.iter().filter_map(|name| self.results.get(name))
    }
}

/// Options for a scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Worker threads (0 = one per CPU). Never more than the number of formats.
    pub workers: usize,
    /// Compute a blake3 digest of the image for the report
    pub hash_image: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            workers: num_cpus::get(),
            hash_image: false,
        }
    }
}

/// Progress updates emitted during a scan
#[derive(Debug, Clone)]
pub enum ScanProgress {
    /// Scan started over `formats` formats
    Started { formats: usize, image_size: u64 },
    /// One format finished (emitted from worker threads)
    FormatDone { name: String, matches: usize },
    Done,
}

/// A completed scan of an image file
#[derive(Debug, Clone)]
pub struct ImageScan {
    pub source: PathBuf,
    pub image_size: u64,
    pub image_hash: Option<String>,
    pub workers: usize,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcome: ScanOutcome,
}

/// The scan coordinator
pub struct Carver {
    options: ScanOptions,
    catalog: FormatCatalog,
}

impl Carver {
    pub fn new(options: ScanOptions, catalog: FormatCatalog) -> Self {
        Self { options, catalog }
    }

    pub fn catalog(&self) -> &FormatCatalog {
        &self.catalog
    }

    /// Number of pool threads a scan will use
    pub fn effective_workers(&self) -> usize {
        let wanted = match self.options.workers {
            0 => num_cpus::get(),
            n => n,
        };
        wanted.min(self.catalog.len()).max(1)
    }

    /// Scan an in-memory buffer
    pub fn scan_buffer(&self, data: &[u8]) -> CarveResult<ScanOutcome> {
        self.scan_buffer_with_progress(data, |_| {})
    }

    /// Scan an in-memory buffer with a progress callback. The callback is
    /// called from worker threads as each format completes.
    pub fn scan_buffer_with_progress<F>(&self, data: &[u8], on_progress: F) -> CarveResult<ScanOutcome>
    where
        F: Fn(ScanProgress) + Send + Sync,
    {
        self.run_tasks(data, &on_progress, |desc, data| desc.find_next_file(data).collect())
    }

    /// Map the image at `path` read-only and scan it.
    pub fn scan_image(&self, path: &Path) -> CarveResult<ImageScan> {
        self.scan_image_with_progress(path, |_| {})
    }

    pub fn scan_image_with_progress<F>(&self, path: &Path, on_progress: F) -> CarveResult<ImageScan>
    where
        F: Fn(ScanProgress) + Send + Sync,
    {
        let started_at = Utc::now();
        let start = Instant::now();

        let mmap = image::open_image(path)?;
        let image_size = mmap.len() as u64;

        tracing::info!(
            source = %path.display(),
            image_size,
            formats = self.catalog.len(),
            workers = self.effective_workers(),
            hash_image = self.options.hash_image,
            "Starting signature scan"
        );

        let image_hash = self.options.hash_image.then(|| image::digest(&mmap));
        let outcome = self.scan_buffer_with_progress(&mmap, on_progress)?;

        let duration = start.elapsed();
        tracing::info!(
            matches = outcome.total_matches(),
            failed = outcome.failures().count(),
            duration_ms = duration.as_millis() as u64,
            "Signature scan complete"
        );

        Ok(ImageScan {
            source: path.to_path_buf(),
            image_size,
            image_hash,
            workers: self.effective_workers(),
            started_at,
            duration,
            outcome,
        })
    }

    /// Run one task per descriptor on a bounded pool and collect the results.
    fn run_tasks<F, T>(&self, data: &[u8], on_progress: &F, task: T) -> CarveResult<ScanOutcome>
    where
        F: Fn(ScanProgress) + Send + Sync,
        T: Fn(&FormatDescriptor, &[u8]) -> Vec<usize> + Send + Sync,
    {
        let tested = self.catalog.names();
        if self.catalog.is_empty() {
            tracing::debug!("Empty catalog, nothing to scan");
            return Ok(ScanOutcome::default());
        }

        on_progress(ScanProgress::Started {
            formats: self.catalog.len(),
            image_size: data.len() as u64,
        });

        let workers = self.effective_workers();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("sigsift-scan-{}", i))
            .build()
            .map_err(|e| CarveError::Pool(e.to_string()))?;

        tracing::debug!(workers, formats = self.catalog.len(), "Worker pool ready");

        let results: Vec<ScanResult> = pool.install(|| {
            self.catalog
                .formats()
                .par_iter()
                .map(|desc| {
                    let result = run_one(desc, data, &task);
                    on_progress(ScanProgress::FormatDone {
                        name: result.format_name.clone(),
                        matches: result.offsets.len(),
                    });
                    result
                })
                .collect()
        });

        on_progress(ScanProgress::Done);

        let results = results
            .into_iter()
            .map(|r| (r.format_name.clone(), r))
            .collect();

        Ok(ScanOutcome { tested, results })
    }
}

/// Scan a single format, turning a panic into a failed result.
fn run_one<T>(desc: &FormatDescriptor, data: &[u8], task: &T) -> ScanResult
where
    T: Fn(&FormatDescriptor, &[u8]) -> Vec<usize>,
{
    let started = Instant::now();

    match panic::catch_unwind(AssertUnwindSafe(|| task(desc, data))) {
        Ok(mut offsets) => {
            offsets.sort_unstable();
            tracing::debug!(
                format = desc.name(),
                matches = offsets.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Format scanned"
            );
            ScanResult {
                format_name: desc.name().to_string(),
                category: desc.category(),
                offsets,
                error: None,
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::error!(format = desc.name(), error = %message, "Format scan failed");
            ScanResult {
                format_name: desc.name().to_string(),
                category: desc.category(),
                offsets: Vec::new(),
                error: Some(message),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "scan task panicked".to_string()
    }
}
