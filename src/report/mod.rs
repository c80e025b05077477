//! Scan reports - render and persist the per-format results.
//!
//! Every tested format appears in the report, including formats with no
//! match and formats whose scan failed, so "tested, not found" is never
//! confused with "not tested".

use std::fs;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::carve::{Category, ImageScan, ScanOutcome};

/// Current report format version
pub const REPORT_VERSION: u32 = 1;

/// Tool identification string
pub const TOOL_NAME: &str = "sigsift";

/// Output encodings for a report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Human,
    Json,
}

/// What happened to one format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatStatus {
    Found,
    NotFound,
    Failed,
}

/// Report entry for a single format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatReport {
    pub name: String,
    pub category: Category,
    pub status: FormatStatus,
    pub count: usize,
    pub offsets: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A complete scan report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub version: u32,
    pub tool: String,
    pub tool_version: String,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub image_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_hash: Option<String>,
    pub workers: usize,
    pub duration_ms: u64,
    /// Every attempted format, in scan order
    pub tested_formats: Vec<String>,
    pub total_matches: usize,
    pub formats: Vec<FormatReport>,
}

impl ScanReport {
    pub fn from_scan(scan: &ImageScan) -> Self {
        let mut report = Self::from_outcome(
            &scan.source.to_string_lossy(),
            scan.image_size,
            &scan.outcome,
        );
        report.created_at = scan.started_at;
        report.image_hash = scan.image_hash.clone();
        report.workers = scan.workers;
        report.duration_ms = scan.duration.as_millis() as u64;
        report
    }

    pub fn from_outcome(source: &str, image_size: u64, outcome: &ScanOutcome) -> Self {
        let formats: Vec<FormatReport> = outcome
            .in_tested_order()
            .map(|r| FormatReport {
                name: r.format_name.clone(),
                category: r.category,
                status: if r.is_failed() {
                    FormatStatus::Failed
                } else if r.offsets.is_empty() {
                    FormatStatus::NotFound
                } else {
                    FormatStatus::Found
                },
                count: r.offsets.len(),
                offsets: r.offsets.clone(),
                error: r.error.clone(),
            })
            .collect();

        Self {
            version: REPORT_VERSION,
            tool: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            created_at: Utc::now(),
            source: source.to_string(),
            image_size,
            image_hash: None,
            workers: 0,
            duration_ms: 0,
            tested_formats: outcome.tested.clone(),
            total_matches: outcome.total_matches(),
            formats,
        }
    }

    pub fn failed(&self) -> impl Iterator<Item = &FormatReport> {
        self.formats
            .iter()
            .filter(|f| f.status == FormatStatus::Failed)
    }

    pub fn is_clean(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Render a report for humans
pub fn format_human(report: &ScanReport) -> String {
    let mut out = String::new();

    out.push_str("\n  sigsift scan report\n");
    out.push_str("  ==========================================\n\n");

    out.push_str(&format!("  Source:         {}\n", report.source));
    out.push_str(&format!(
        "  Image size:     {} ({} bytes)\n",
        humansize::format_size(report.image_size, humansize::BINARY),
        report.image_size
    ));
    if let Some(hash) = &report.image_hash {
        out.push_str(&format!("  Blake3:         {}\n", hash));
    }
    out.push_str(&format!("  Formats tested: {}\n", report.tested_formats.len()));
    out.push_str(&format!("  Matches:        {}\n", report.total_matches));
    out.push_str(&format!(
        "  Duration:       {}\n",
        humantime::format_duration(Duration::from_millis(report.duration_ms))
    ));

    let width = report
        .formats
        .iter()
        .map(|f| f.name.len())
        .max()
        .unwrap_or(0);

    for category in Category::ALL {
        let entries: Vec<&FormatReport> = report
            .formats
            .iter()
            .filter(|f| f.category == category)
            .collect();
        if entries.is_empty() {
            continue;
        }

        out.push_str(&format!("\n  [{}]\n", category));
        for f in entries {
            let detail = match f.status {
                FormatStatus::Found => format!(
                    "{} match(es) at {}",
                    f.count,
                    f.offsets
                        .iter()
                        .map(|o| o.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                FormatStatus::NotFound => "not found".to_string(),
                FormatStatus::Failed => format!(
                    "FAILED: {}",
                    f.error.as_deref().unwrap_or("unknown error")
                ),
            };
            out.push_str(&format!("    {:<width$}  {}\n", f.name, detail, width = width));
        }
    }

    out
}

pub fn to_json(report: &ScanReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

/// Write a report to `dest`, or to stdout when no destination is given
pub fn write_report(report: &ScanReport, format: ReportFormat, dest: Option<&Path>) -> Result<()> {
    let rendered = match format {
        ReportFormat::Human => format_human(report),
        ReportFormat::Json => to_json(report)? + "\n",
    };

    match dest {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            fs::write(path, rendered)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            tracing::info!(path = %path.display(), "Report written");
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            lock.write_all(rendered.as_bytes())
                .context("Failed to write report to stdout")?;
            lock.flush()?;
        }
    }

    Ok(())
}

/// Load a JSON report from disk
pub fn load_report(path: &Path) -> Result<ScanReport> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read report: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse report: {}", path.display()))
}
