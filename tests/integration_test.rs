//! Integration tests for sigsift

use std::path::{Path, PathBuf};

use sigsift::carve::{Carver, Category, FormatCatalog, FormatDescriptor, ScanOptions, Signature};
use sigsift::report::{self, FormatStatus, ReportFormat, ScanReport};
use tempfile::tempdir;

const CATALOG: &str = r#"
[[format]]
name = "bz2"
category = "archives"
header_size = 6
signatures = [{ magic = "425A68" }]

[[format]]
name = "wav"
category = "media"
header_size = 12
signatures = [{ start = "52494646", gap = 4, end = "57415645" }]

[[format]]
name = "7z"
category = "archives"
header_size = 32
signatures = [{ magic = "377ABCAF271C" }]
"#;

fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let p = dir.join(name);
    std::fs::write(&p, data).unwrap();
    p
}

fn carver(catalog: FormatCatalog, workers: usize) -> Carver {
    Carver::new(
        ScanOptions {
            workers,
            ..Default::default()
        },
        catalog,
    )
}

/// Build an image with known format instances at known offsets
fn build_image() -> (Vec<u8>, Vec<usize>, Vec<usize>) {
    let mut img = vec![0u8; 100];
    let mut bz2 = Vec::new();
    let mut wav = Vec::new();

    bz2.push(img.len());
    img.extend_from_slice(b"BZh91AY&SY");
    img.extend_from_slice(&[0x55; 50]);

    wav.push(img.len());
    img.extend_from_slice(b"RIFF\x24\x00\x00\x00WAVEfmt ");
    img.extend_from_slice(&[0x66; 40]);

    bz2.push(img.len());
    img.extend_from_slice(b"BZh11AY&SY");
    img.extend_from_slice(&[0u8; 30]);

    (img, bz2, wav)
}

#[test]
fn test_catalog_file_scan_end_to_end() {
    let dir = tempdir().unwrap();
    let catalog_path = write_file(dir.path(), "formats.toml", CATALOG.as_bytes());
    let (img, bz2, wav) = build_image();
    let image_path = write_file(dir.path(), "disk.img", &img);

    let catalog = FormatCatalog::load(&catalog_path).unwrap();
    let scan = carver(catalog, 2).scan_image(&image_path).unwrap();

    assert_eq!(scan.outcome.tested, vec!["bz2", "wav", "7z"]);
    assert_eq!(scan.outcome.offsets("bz2"), Some(bz2.as_slice()));
    assert_eq!(scan.outcome.offsets("wav"), Some(wav.as_slice()));
    assert_eq!(scan.outcome.offsets("7z"), Some(&[][..]));
}

#[test]
fn test_report_distinguishes_not_found_from_not_tested() {
    let dir = tempdir().unwrap();
    let (img, _, _) = build_image();
    let image_path = write_file(dir.path(), "disk.img", &img);

    let catalog = FormatCatalog::from_toml_str(CATALOG).unwrap();
    let scan = carver(catalog, 3).scan_image(&image_path).unwrap();
    let report = ScanReport::from_scan(&scan);

    let out = dir.path().join("report.json");
    report::write_report(&report, ReportFormat::Json, Some(&out)).unwrap();
    let loaded = report::load_report(&out).unwrap();

    assert_eq!(loaded.tested_formats.len(), 3);
    let seven_z = loaded.formats.iter().find(|f| f.name == "7z").unwrap();
    assert_eq!(seven_z.status, FormatStatus::NotFound);
    assert!(loaded.formats.iter().all(|f| f.name != "zip"));
    assert_eq!(loaded.total_matches, 3);
    assert_eq!(loaded.image_size, img.len() as u64);
}

#[test]
fn test_builtin_catalog_finds_planted_files() {
    let dir = tempdir().unwrap();
    let mut img = vec![0u8; 512];

    let zip_at = img.len();
    img.extend_from_slice(b"PK\x03\x04");
    img.extend_from_slice(&[0x11; 40]);
    img.extend_from_slice(b"PK\x03\x04");
    img.extend_from_slice(&[0x11; 40]);
    img.extend_from_slice(b"PK\x05\x06");
    img.extend_from_slice(&[0u8; 18]);

    let pdf_at = img.len();
    img.extend_from_slice(b"%PDF-1.7\n1 0 obj\n%%EOF\n");

    let jpg_at = img.len();
    img.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]);
    img.extend_from_slice(&[0x33; 64]);
    img.extend_from_slice(&[0xFF, 0xD9]);

    // tar header block: "ustar" sits 257 bytes in
    let tar_at = img.len();
    let mut block = vec![0u8; 512];
    block[257..262].copy_from_slice(b"ustar");
    img.extend_from_slice(&block);

    let path = write_file(dir.path(), "mixed.img", &img);
    let scan = carver(FormatCatalog::builtin(), 4).scan_image(&path).unwrap();

    assert_eq!(scan.outcome.offsets("zip"), Some(&[zip_at][..]));
    assert_eq!(scan.outcome.offsets("pdf"), Some(&[pdf_at][..]));
    assert_eq!(scan.outcome.offsets("jpg"), Some(&[jpg_at][..]));
    assert_eq!(scan.outcome.offsets("tar"), Some(&[tar_at][..]));
    assert_eq!(scan.outcome.tested.len(), FormatCatalog::builtin().len());
}

#[test]
fn test_category_filter() {
    let mut catalog = FormatCatalog::builtin();
    catalog.retain_categories(&[Category::Images]);

    let mut img = vec![0u8; 64];
    img.extend_from_slice(b"%PDF-1.4 %%EOF");
    img.extend_from_slice(b"GIF89a\x01\x00\x01\x00\x00\x3B");

    let outcome = carver(catalog, 2).scan_buffer(&img).unwrap();
    assert_eq!(outcome.offsets("gif"), Some(&[78][..]));
    assert!(outcome.offsets("pdf").is_none());
}

#[test]
fn test_repeated_scans_identical() {
    let (img, _, _) = build_image();
    let catalog = FormatCatalog::builtin();

    let first = carver(catalog.clone(), 1).scan_buffer(&img).unwrap();
    let second = carver(catalog.clone(), 8).scan_buffer(&img).unwrap();
    let third = carver(catalog, 3).scan_buffer(&img).unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
}

#[test]
fn test_descriptor_back_offset_never_negative() {
    let desc = FormatDescriptor::new("tar", Category::Archives, vec![Signature::simple(b"ustar")], 512)
        .with_back_offset(257);

    let mut img = vec![0u8; 1024];
    img[10..15].copy_from_slice(b"ustar"); // too close to the start
    img[600..605].copy_from_slice(b"ustar");

    let offsets: Vec<usize> = desc.find_next_file(&img).collect();
    assert_eq!(offsets, vec![600 - 257]);
}

#[test]
fn test_empty_image_lists_every_format_not_found() {
    let dir = tempdir().unwrap();
    let path = write_file(dir.path(), "empty.img", &[]);

    let catalog = FormatCatalog::from_toml_str(CATALOG).unwrap();
    let scan = carver(catalog, 2).scan_image(&path).unwrap();
    let report = ScanReport::from_scan(&scan);

    assert_eq!(report.image_size, 0);
    assert_eq!(report.tested_formats, vec!["bz2", "wav", "7z"]);
    assert!(report.formats.iter().all(|f| f.status == FormatStatus::NotFound));
    assert!(report.is_clean());
}
