//! Command handlers for the sigsift CLI

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use super::{ConfigArgs, FormatsArgs, ScanArgs};
use crate::carve::{Carver, Category, FormatCatalog, ScanOptions, ScanProgress};
use crate::config::{generate_sample_config, Config};
use crate::report::{self, ScanReport};

/// Build the catalog for a run: the built-in table or a TOML file, narrowed
/// to the requested formats and categories.
pub fn resolve_catalog(
    catalog_path: Option<&Path>,
    formats: &[String],
    categories: &[String],
) -> Result<FormatCatalog> {
    let mut catalog = match catalog_path {
        Some(path) => FormatCatalog::load(path)?,
        None => FormatCatalog::builtin(),
    };

    if !categories.is_empty() {
        let cats = categories
            .iter()
            .map(|c| c.parse::<Category>())
            .collect::<Result<Vec<_>, _>>()?;
        catalog.retain_categories(&cats);
    }

    if !formats.is_empty() {
        catalog.retain_names(formats)?;
    }

    tracing::debug!(formats = catalog.len(), "Catalog resolved");
    Ok(catalog)
}

/// Run `sigsift scan`. Returns the report that was written.
pub async fn run_scan(args: &ScanArgs, config: &Config) -> Result<ScanReport> {
    let catalog_path = args.catalog.as_deref().or(config.scan.catalog.as_deref());
    let formats = args.formats.clone().unwrap_or_else(|| config.scan.formats.clone());
    let categories = args
        .category
        .clone()
        .unwrap_or_else(|| config.scan.categories.clone());

    let catalog = resolve_catalog(catalog_path, &formats, &categories)?;

    let options = ScanOptions {
        workers: args.workers.unwrap_or(config.scan.workers),
        hash_image: args.hash || config.scan.hash_image,
    };
    let carver = Carver::new(options, catalog);

    let pb = if args.no_progress {
        ProgressBar::hidden()
    } else {
        scan_progress_bar(carver.catalog().len())?
    };

    let source: PathBuf = args.source.clone();
    let bar = pb.clone();
    let scan = tokio::task::spawn_blocking(move || {
        carver.scan_image_with_progress(&source, |p| match p {
            ScanProgress::Started { .. } => bar.set_message("scanning"),
            ScanProgress::FormatDone { name, matches } => {
                bar.inc(1);
                bar.set_message(format!("{} ({})", name, matches));
            }
            ScanProgress::Done => bar.set_message("done"),
        })
    })
    .await
    .context("Scan task aborted")?
    .with_context(|| format!("Failed to scan {}", args.source.display()))?;

    pb.finish_and_clear();

    let report = ScanReport::from_scan(&scan);
    let format = args.report.unwrap_or(config.report.format);
    let dest = args.output.as_deref().or(config.report.output.as_deref());
    report::write_report(&report, format, dest)?;

    if let Some(path) = dest {
        eprintln!(
            "{} {} matches across {} formats, report written to {}",
            "✓".green(),
            report.total_matches,
            report.tested_formats.len(),
            path.display()
        );
    }
    for failed in report.failed() {
        eprintln!(
            "{} {}: {}",
            "✗".red(),
            failed.name.red(),
            failed.error.as_deref().unwrap_or("unknown error")
        );
    }

    Ok(report)
}

/// Process exit status for a finished scan: 2 when any format failed
pub fn scan_exit_code(report: &ScanReport) -> i32 {
    if report.is_clean() {
        0
    } else {
        2
    }
}

fn scan_progress_bar(formats: usize) -> Result<ProgressBar> {
    let pb = ProgressBar::new(formats as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} formats {msg}")?
            .progress_chars("=> "),
    );
    Ok(pb)
}

/// Run `sigsift formats`
pub fn run_formats(args: &FormatsArgs, config: &Config) -> Result<()> {
    let catalog_path = args.catalog.as_deref().or(config.scan.catalog.as_deref());
    let categories = args.category.clone().unwrap_or_default();
    let catalog = resolve_catalog(catalog_path, &[], &categories)?;

    if args.toml {
        print!("{}", catalog.to_toml_string()?);
        return Ok(());
    }

    print!("{}", format_catalog(&catalog));
    Ok(())
}

/// Render the catalog as a table grouped by category
pub fn format_catalog(catalog: &FormatCatalog) -> String {
    let mut out = String::new();

    for (category, formats) in catalog.by_category() {
        out.push_str(&format!("\n{}\n", category.to_string().bold()));
        for f in formats {
            let sigs = f
                .signatures()
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" | ");
            out.push_str(&format!("  {:<6} {}\n", f.name().cyan(), sigs));

            let mut details = vec![format!("header {}", f.header_size())];
            if let Some(trailer) = f.trailer() {
                details.push(format!("trailer {}", hex::encode_upper(trailer)));
            }
            if f.back_offset() > 0 {
                details.push(format!("back {}", f.back_offset()));
            }
            out.push_str(&format!("         {}\n", details.join(", ").dimmed()));
        }
    }

    out.push_str(&format!(
        "\n{} formats. Without a trailer the next search resumes `header` bytes past each match,\n\
         so instances closer together than that are reported once.\n",
        catalog.len()
    ));
    out
}

/// Run `sigsift config`
pub fn run_config(args: &ConfigArgs, path: &Path) -> Result<()> {
    if args.write {
        if Config::ensure_exists(path)? {
            println!("{} Created {}", "✓".green(), path.display());
        } else {
            println!("Config already exists at {}", path.display());
        }
        return Ok(());
    }

    print!("{}", generate_sample_config());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carve::ScanOutcome;
    use crate::report::{FormatStatus, ReportFormat};
    use tempfile::tempdir;

    fn scan_args(source: PathBuf) -> ScanArgs {
        ScanArgs {
            source,
            workers: None,
            formats: None,
            category: None,
            catalog: None,
            output: None,
            report: None,
            hash: false,
            no_progress: true,
        }
    }

    fn bz2_image(dir: &Path) -> PathBuf {
        let path = dir.join("disk.img");
        std::fs::write(&path, b"XXXXBZhpayloadXXBZhmoar").unwrap();
        path
    }

    #[test]
    fn test_resolve_builtin_unfiltered() {
        let catalog = resolve_catalog(None, &[], &[]).unwrap();
        assert_eq!(catalog.len(), FormatCatalog::builtin().len());
    }

    #[test]
    fn test_resolve_by_category_then_name() {
        let catalog = resolve_catalog(None, &["zip".to_string()], &["archives".to_string()]).unwrap();
        assert_eq!(catalog.names(), vec!["zip"]);
    }

    #[test]
    fn test_resolve_name_outside_category_errors() {
        let err = resolve_catalog(None, &["jpg".to_string()], &["archives".to_string()]).unwrap_err();
        assert!(err.to_string().contains("jpg"));
    }

    #[test]
    fn test_resolve_unknown_category_errors() {
        assert!(resolve_catalog(None, &[], &["fonts".to_string()]).is_err());
    }

    #[test]
    fn test_format_catalog_lists_everything() {
        colored::control::set_override(false);
        let text = format_catalog(&FormatCatalog::builtin());
        for cat in Category::ALL {
            assert!(text.contains(cat.as_str()));
        }
        assert!(text.contains("zip    504B0304"));
        assert!(text.contains("trailer 504B0506"));
        assert!(text.contains("back 257"));
    }

    #[tokio::test]
    async fn test_run_scan_args_override_config() {
        let dir = tempdir().unwrap();
        let image = bz2_image(dir.path());
        let out = dir.path().join("reports").join("scan.json");

        let mut config = Config::default();
        config.scan.formats = vec!["zip".to_string()];
        config.report.format = ReportFormat::Human;
        config.report.output = Some(dir.path().join("unused.txt"));

        let mut args = scan_args(image);
        args.formats = Some(vec!["bz2".to_string(), "7z".to_string()]);
        args.report = Some(ReportFormat::Json);
        args.output = Some(out.clone());
        args.workers = Some(2);
        args.hash = true;

        let report = run_scan(&args, &config).await.unwrap();
        assert_eq!(report.tested_formats, vec!["7z", "bz2"]);
        assert_eq!(report.total_matches, 2);
        assert_eq!(report.workers, 2);
        assert!(report.image_hash.is_some());
        assert_eq!(scan_exit_code(&report), 0);

        let written = report::load_report(&out).unwrap();
        assert_eq!(written.tested_formats, report.tested_formats);
        let bz2 = written.formats.iter().find(|f| f.name == "bz2").unwrap();
        assert_eq!(bz2.offsets, vec![4, 16]);
        assert!(!dir.path().join("unused.txt").exists());
    }

    #[tokio::test]
    async fn test_run_scan_falls_back_to_config() {
        let dir = tempdir().unwrap();
        let image = bz2_image(dir.path());
        let out = dir.path().join("report.txt");

        let mut config = Config::default();
        config.scan.categories = vec!["archives".to_string()];
        config.scan.workers = 1;
        config.report.output = Some(out.clone());

        let report = run_scan(&scan_args(image), &config).await.unwrap();
        assert_eq!(report.workers, 1);
        assert!(report.image_hash.is_none());

        let builtin = FormatCatalog::builtin();
        let archives = &builtin.by_category()[&Category::Archives];
        assert_eq!(report.tested_formats.len(), archives.len());

        let text = std::fs::read_to_string(&out).unwrap();
        assert!(text.contains("[archives]"));
        assert!(!text.contains("[images]"));
    }

    #[tokio::test]
    async fn test_run_scan_missing_image_errors() {
        let dir = tempdir().unwrap();
        let args = scan_args(dir.path().join("missing.img"));
        let err = run_scan(&args, &Config::default()).await.unwrap_err();
        assert!(err.to_string().contains("missing.img"));
    }

    #[test]
    fn test_exit_code_reflects_failed_formats() {
        let mut outcome = ScanOutcome::default();
        outcome.tested.push("wav".to_string());
        outcome.results.insert(
            "wav".to_string(),
            crate::carve::ScanResult {
                format_name: "wav".to_string(),
                category: Category::Media,
                offsets: vec![],
                error: Some("scan task panicked".to_string()),
            },
        );

        let failed = ScanReport::from_outcome("disk.img", 10, &outcome);
        assert_eq!(failed.formats[0].status, FormatStatus::Failed);
        assert_eq!(scan_exit_code(&failed), 2);

        let clean = ScanReport::from_outcome("disk.img", 10, &ScanOutcome::default());
        assert_eq!(scan_exit_code(&clean), 0);
    }
}
