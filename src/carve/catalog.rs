//! Format catalog - the table of formats a scan looks for.
//!
//! The catalog is plain data. The built-in table covers common documents,
//! archives, images and media; custom tables are loaded from TOML files
//! with one `[[format]]` record per format, patterns written in hex.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::signatures::{Category, FormatDescriptor, Signature};
use crate::error::{CarveError, CarveResult};

/// Validated, immutable list of format descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormatCatalog {
    formats: Vec<FormatDescriptor>,
}

impl FormatCatalog {
    /// Build a catalog, validating every descriptor and rejecting duplicate
    /// names.
    pub fn new(formats: Vec<FormatDescriptor>) -> CarveResult<Self> {
        let mut seen = HashSet::new();
        for desc in &formats {
            desc.validate()?;
            if !seen.insert(desc.name()) {
                return Err(CarveError::invalid(desc.name(), "duplicate format name"));
            }
        }
        Ok(Self { formats })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// The built-in format table
    pub fn builtin() -> Self {
        Self {
            formats: builtin_formats(),
        }
    }

    /// Parse a TOML catalog
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile = toml::from_str(content).context("Failed to parse format catalog")?;
        let formats = file
            .formats
            .into_iter()
            .map(FormatDescriptor::try_from)
            .collect::<CarveResult<Vec<_>>>()?;
        Ok(Self::new(formats)?)
    }

    /// Load a TOML catalog from disk
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read format catalog: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid format catalog: {}", path.display()))
    }

    /// Render the catalog in the same TOML layout `load` accepts
    pub fn to_toml_string(&self) -> Result<String> {
        let file = CatalogFile {
            formats: self.formats.iter().map(FormatRecord::from).collect(),
        };
        toml::to_string_pretty(&file).context("Failed to serialize format catalog")
    }

    pub fn formats(&self) -> &[FormatDescriptor] {
        &self.formats
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FormatDescriptor> {
        self.formats.iter()
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FormatDescriptor> {
        self.formats.iter().find(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.formats.iter().map(|f| f.name().to_string()).collect()
    }

    pub fn by_category(&self) -> BTreeMap<Category, Vec<&FormatDescriptor>> {
        let mut map: BTreeMap<Category, Vec<&FormatDescriptor>> = BTreeMap::new();
        for desc in &self.formats {
            map.entry(desc.category()).or_default().push(desc);
        }
        map
    }

    /// Keep only the named formats. Names are matched case-insensitively;
    /// a name missing from the catalog is an error.
    pub fn retain_names(&mut self, names: &[String]) -> CarveResult<()> {
        let wanted: HashSet<String> = names.iter().map(|n| n.trim().to_lowercase()).collect();
        for name in &wanted {
            if !self.formats.iter().any(|f| f.name().to_lowercase() == *name) {
                return Err(CarveError::UnknownFormat(name.clone()));
            }
        }
        self.formats
            .retain(|f| wanted.contains(&f.name().to_lowercase()));
        Ok(())
    }

    pub fn retain_categories(&mut self, categories: &[Category]) {
        self.formats.retain(|f| categories.contains(&f.category()));
    }
}

impl<'a> IntoIterator for &'a FormatCatalog {
    type Item = &'a FormatDescriptor;
    type IntoIter = std::slice::Iter<'a, FormatDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.formats.iter()
    }
}

// ============================================================================
// TOML records
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(rename = "format", default)]
    formats: Vec<FormatRecord>,
}

/// One `[[format]]` entry of a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatRecord {
    pub name: String,
    pub category: String,
    pub header_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trailer: Option<String>,
    #[serde(default)]
    pub back_offset: usize,
    #[serde(default)]
    pub signatures: Vec<SignatureRecord>,
}

/// Either `{ magic = "..." }` or `{ start = "...", gap = N, end = "..." }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SignatureRecord {
    Split { start: String, gap: i64, end: String },
    Simple { magic: String },
}

fn decode_hex(name: &str, field: &str, value: &str) -> CarveResult<Vec<u8>> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    hex::decode(&compact)
        .map_err(|e| CarveError::invalid(name, format!("{} is not valid hex ({}): {}", field, value, e)))
}

impl TryFrom<FormatRecord> for FormatDescriptor {
    type Error = CarveError;

    fn try_from(rec: FormatRecord) -> CarveResult<Self> {
        let name = rec.name.as_str();
        let category: Category = rec
            .category
            .parse()
            .map_err(|e: CarveError| CarveError::invalid(name, e.to_string()))?;

        let mut signatures = Vec::with_capacity(rec.signatures.len());
        for sig in &rec.signatures {
            signatures.push(match sig {
                SignatureRecord::Simple { magic } => {
                    Signature::Simple(decode_hex(name, "magic", magic)?)
                }
                SignatureRecord::Split { start, gap, end } => {
                    let gap = usize::try_from(*gap).map_err(|_| {
                        CarveError::invalid(name, format!("split gap {} is negative", gap))
                    })?;
                    Signature::Split {
                        start: decode_hex(name, "start", start)?,
                        gap,
                        end: decode_hex(name, "end", end)?,
                    }
                }
            });
        }

        let mut desc = FormatDescriptor::new(name, category, signatures, rec.header_size)
            .with_back_offset(rec.back_offset);
        if let Some(trailer) = &rec.trailer {
            desc = desc.with_trailer(&decode_hex(name, "trailer", trailer)?);
        }
        desc.validate()?;
        Ok(desc)
    }
}

impl From<&FormatDescriptor> for FormatRecord {
    fn from(desc: &FormatDescriptor) -> Self {
        Self {
            name: desc.name().to_string(),
            category: desc.category().to_string(),
            header_size: desc.header_size(),
            trailer: desc.trailer().map(hex::encode_upper),
            back_offset: desc.back_offset(),
            signatures: desc
                .signatures()
                .iter()
                .map(|sig| match sig {
                    Signature::Simple(pattern) => SignatureRecord::Simple {
                        magic: hex::encode_upper(pattern),
                    },
                    Signature::Split { start, gap, end } => SignatureRecord::Split {
                        start: hex::encode_upper(start),
                        gap: *gap as i64,
                        end: hex::encode_upper(end),
                    },
                })
                .collect(),
        }
    }
}

// ============================================================================
// Built-in table
// ============================================================================

fn simple(name: &str, category: Category, magic: &[u8], header_size: usize) -> FormatDescriptor {
    FormatDescriptor::new(name, category, vec![Signature::simple(magic)], header_size)
}

fn riff(name: &str, category: Category, form: &[u8]) -> FormatDescriptor {
    FormatDescriptor::new(name, category, vec![Signature::split(b"RIFF", 4, form)], 12)
}

/// All built-in formats, grouped by category
fn builtin_formats() -> Vec<FormatDescriptor> {
    use Category::*;

    vec![
        // === Documents ===
        simple("pdf", Documents, b"%PDF-", 5).with_trailer(b"%%EOF"),
        simple("ps", Documents, b"%!PS-Adobe", 10),
        simple("rtf", Documents, b"{\\rtf1", 6).with_trailer(b"\\par }"),
        // OLE2 compound file (doc, xls, ppt, msg)
        simple("ole", Documents, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1], 512),
        // === Archives ===
        simple("zip", Archives, &[0x50, 0x4B, 0x03, 0x04], 22).with_trailer(&[0x50, 0x4B, 0x05, 0x06]),
        simple("rar", Archives, &[0x52, 0x61, 0x72, 0x21, 0x1A, 0x07], 7),
        simple("7z", Archives, &[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], 32),
        simple("bz2", Archives, b"BZh", 10),
        simple("gz", Archives, &[0x1F, 0x8B, 0x08], 10),
        simple("xz", Archives, &[0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00], 12),
        simple("cab", Archives, b"MSCF", 36),
        // "ustar" sits 257 bytes into each tar header block
        simple("tar", Archives, b"ustar", 512).with_back_offset(257),
        // === Images ===
        simple("jpg", Images, &[0xFF, 0xD8, 0xFF], 2).with_trailer(&[0xFF, 0xD9]),
        simple("png", Images, &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A], 8)
            .with_trailer(&[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82]),
        FormatDescriptor::new(
            "gif",
            Images,
            vec![Signature::simple(b"GIF87a"), Signature::simple(b"GIF89a")],
            2,
        )
        .with_trailer(&[0x00, 0x3B]),
        simple("bmp", Images, b"BM", 14),
        FormatDescriptor::new(
            "tiff",
            Images,
            vec![
                Signature::simple(&[0x49, 0x49, 0x2A, 0x00]),
                Signature::simple(&[0x4D, 0x4D, 0x00, 0x2A]),
            ],
            8,
        ),
        riff("webp", Images, b"WEBP"),
        simple("ico", Images, &[0x00, 0x00, 0x01, 0x00], 6),
        // === Media ===
        riff("wav", Media, b"WAVE"),
        riff("avi", Media, b"AVI "),
        simple("mp3", Media, b"ID3", 10),
        simple("flac", Media, b"fLaC", 4),
        simple("ogg", Media, b"OggS", 27),
        // ISO BMFF: 4-byte box size precedes "ftyp"
        simple("mp4", Media, b"ftyp", 8).with_back_offset(4),
        simple("mkv", Media, &[0x1A, 0x45, 0xDF, 0xA3], 4),
    ]
}
