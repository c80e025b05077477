//! sigsift Library
//!
//! Signature-based file carving: find every offset inside a raw disk image
//! or memory dump where a known file format appears to begin.
//!
//! # Features
//!
//! - **Declarative formats**: magic numbers, split signatures with an exact
//!   gap, trailers and back offsets, loaded from a built-in table or TOML
//! - **Parallel scanning**: one rayon task per format over a shared mmap
//! - **Read-Only Safe**: the image is mapped read-only and never copied
//! - **Complete reports**: every tested format is listed, found or not
//!
//! # Example
//!
//! ```no_run
//! use sigsift::carve::{Carver, FormatCatalog, ScanOptions};
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let carver = Carver::new(ScanOptions::default(), FormatCatalog::builtin());
//!     let scan = carver.scan_image(Path::new("disk.img"))?;
//!
//!     for result in scan.outcome.in_tested_order() {
//!         println!("{}: {:?}", result.format_name, result.offsets);
//!     }
//!     Ok(())
//! }
//! ```

pub mod carve;
pub mod cli;
pub mod config;
pub mod error;
pub mod image;
pub mod report;

// Re-export commonly used types
pub use carve::{
    Carver, Category, FormatCatalog, FormatDescriptor, ImageScan, ScanOptions, ScanOutcome,
    ScanProgress, ScanResult, Signature,
};
pub use config::Config;
pub use error::{CarveError, CarveResult};
pub use report::{ReportFormat, ScanReport};
