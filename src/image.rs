//! Read-only access to the image being scanned.
//!
//! The image is opened without write access and memory-mapped, so workers
//! share one view of the bytes and nothing is ever copied or modified.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{CarveError, CarveResult};

/// Open `path` read-only and map it into memory.
///
/// Directories are rejected. A zero-length file maps to an empty buffer,
/// which scans cleanly with no matches.
pub fn open_image(path: &Path) -> CarveResult<Mmap> {
    let io_err = |source: std::io::Error| CarveError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let metadata = file.metadata().map_err(io_err)?;

    if metadata.is_dir() {
        return Err(io_err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "is a directory",
        )));
    }

    // SAFETY: the map is read-only; the image is expected not to be
    // truncated by another process while the scan runs.
    let mmap = unsafe { Mmap::map(&file) }.map_err(io_err)?;

    tracing::debug!(path = %path.display(), size = mmap.len(), "Image mapped");
    Ok(mmap)
}

/// Blake3 digest of the image contents, hex encoded
pub fn digest(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
