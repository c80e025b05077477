//! File format descriptors and match enumeration.
//!
//! A descriptor holds one or more alternative signatures, the number of
//! header bytes to skip before the next search, an optional trailer that
//! moves the resume point past the end of the current instance, and a
//! back offset for formats whose magic sits a fixed distance into the file.

use std::fmt;
use std::iter::FusedIterator;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::matcher::{find_simple, find_split};
use crate::error::{CarveError, CarveResult};

/// Format categories used to group the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Documents,
    Archives,
    Images,
    Media,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Documents,
        Category::Archives,
        Category::Images,
        Category::Media,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Documents => "documents",
            Category::Archives => "archives",
            Category::Images => "images",
            Category::Media => "media",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CarveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "documents" | "document" | "docs" => Ok(Category::Documents),
            "archives" | "archive" => Ok(Category::Archives),
            "images" | "image" => Ok(Category::Images),
            "media" | "audio" | "video" => Ok(Category::Media),
            other => Err(CarveError::UnknownCategory(other.to_string())),
        }
    }
}

/// One way of recognising the start of a format
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    /// Contiguous magic bytes
    Simple(Vec<u8>),
    /// `start` and `end` markers with exactly `gap` bytes between them
    Split { start: Vec<u8>, gap: usize, end: Vec<u8> },
}

impl Signature {
    pub fn simple(pattern: &[u8]) -> Self {
        Signature::Simple(pattern.to_vec())
    }

    pub fn split(start: &[u8], gap: usize, end: &[u8]) -> Self {
        Signature::Split {
            start: start.to_vec(),
            gap,
            end: end.to_vec(),
        }
    }

    /// Search once from `from`. Returns the match offset and the offset the
    /// resume computation starts from (the end marker for split signatures).
    fn search(&self, data: &[u8], from: usize) -> Option<(usize, usize)> {
        match self {
            Signature::Simple(pattern) => find_simple(data, from, pattern).map(|o| (o, o)),
            Signature::Split { start, gap, end } => find_split(data, from, start, *gap, end),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Signature::Simple(pattern) => write!(f, "{}", hex::encode_upper(pattern)),
            Signature::Split { start, gap, end } => write!(
                f,
                "{} +{} {}",
                hex::encode_upper(start),
                gap,
                hex::encode_upper(end)
            ),
        }
    }
}

/// A file format the carver knows how to locate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatDescriptor {
    name: String,
    category: Category,
    signatures: Vec<Signature>,
    /// Bytes skipped past the match (or trailer) before searching again
    header_size: usize,
    trailer: Option<Vec<u8>>,
    /// Distance from the true file start to the matched magic
    back_offset: usize,
}

impl FormatDescriptor {
    pub fn new(
        name: impl Into<String>,
        category: Category,
        signatures: Vec<Signature>,
        header_size: usize,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            signatures,
            header_size,
            trailer: None,
            back_offset: 0,
        }
    }

    pub fn with_trailer(mut self, trailer: &[u8]) -> Self {
        self.trailer = Some(trailer.to_vec());
        self
    }

    pub fn with_back_offset(mut self, back_offset: usize) -> Self {
        self.back_offset = back_offset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    pub fn header_size(&self) -> usize {
        self.header_size
    }

    pub fn trailer(&self) -> Option<&[u8]> {
        self.trailer.as_deref()
    }

    pub fn back_offset(&self) -> usize {
        self.back_offset
    }

    /// Reject descriptors that cannot be scanned meaningfully.
    ///
    /// A simple signature with `header_size == 0` would resume exactly on
    /// the match it just reported and never advance.
    pub fn validate(&self) -> CarveResult<()> {
        let name = self.name.as_str();
        if name.trim().is_empty() {
            return Err(CarveError::invalid(name, "name is empty"));
        }

        for (i, sig) in self.signatures.iter().enumerate() {
            match sig {
                Signature::Simple(pattern) if pattern.is_empty() => {
                    return Err(CarveError::invalid(name, format!("signature {} is empty", i)));
                }
                Signature::Split { start, end, .. } if start.is_empty() || end.is_empty() => {
                    return Err(CarveError::invalid(
                        name,
                        format!("split signature {} has an empty marker", i),
                    ));
                }
                _ => {}
            }
        }

        if matches!(&self.trailer, Some(t) if t.is_empty()) {
            return Err(CarveError::invalid(name, "trailer is empty"));
        }

        let has_simple = self
            .signatures
            .iter()
            .any(|s| matches!(s, Signature::Simple(_)));
        if has_simple && self.header_size == 0 {
            return Err(CarveError::invalid(
                name,
                "header_size must be at least 1 for simple signatures",
            ));
        }

        Ok(())
    }

    /// Lazily enumerate every match offset in `data`.
    ///
    /// Offsets ascend within each signature alternative; alternatives are
    /// walked one after another, so the whole sequence is not globally
    /// sorted. Use [`FormatDescriptor::matches`] for a sorted list.
    pub fn find_next_file<'a>(&'a self, data: &'a [u8]) -> MatchOffsets<'a> {
        MatchOffsets {
            descriptor: self,
            data,
            alternative: 0,
            cursor: Some(0),
        }
    }

    /// All match offsets in ascending order.
    pub fn matches(&self, data: &[u8]) -> Vec<usize> {
        let mut offsets: Vec<usize> = self.find_next_file(data).collect();
        offsets.sort_unstable();
        offsets
    }

    /// Where the next magic search starts after a match whose resume anchor
    /// is `next_offset`. A missing trailer does not stop the scan.
    fn resume_point(&self, data: &[u8], next_offset: usize) -> usize {
        let anchor = match &self.trailer {
            Some(trailer) => find_simple(data, next_offset, trailer).unwrap_or(next_offset),
            None => next_offset,
        };
        anchor.saturating_add(self.header_size)
    }
}

/// Iterator over the match offsets of one descriptor, see
/// [`FormatDescriptor::find_next_file`].
#[derive(Debug, Clone)]
pub struct MatchOffsets<'a> {
    descriptor: &'a FormatDescriptor,
    data: &'a [u8],
    alternative: usize,
    /// `None` once the current alternative is exhausted
    cursor: Option<usize>,
}

impl Iterator for MatchOffsets<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let desc = self.descriptor;

        while let Some(sig) = desc.signatures.get(self.alternative) {
            let Some(current) = self.cursor else {
                self.alternative += 1;
                self.cursor = Some(0);
                continue;
            };

            let Some((offset, next_offset)) = sig.search(self.data, current) else {
                self.cursor = None;
                continue;
            };

            let resume = desc.resume_point(self.data, next_offset);
            self.cursor = if resume > offset {
                Some(resume)
            } else {
                // Only reachable for descriptors that skipped validation.
                tracing::warn!(format = %desc.name, offset, "Resume point does not advance, stopping");
                None
            };

            match offset.checked_sub(desc.back_offset) {
                Some(adjusted) => return Some(adjusted),
                None => {
                    tracing::debug!(
                        format = %desc.name,
                        offset,
                        back_offset = desc.back_offset,
                        "Match too close to image start, skipped"
                    );
                }
            }
        }

        None
    }
}

impl FusedIterator for MatchOffsets<'_> {}
