//! CLI module - Command line interface definitions and handlers

pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::report::ReportFormat;

/// sigsift - Signature-based file carver
///
/// Reports every offset where a known file format begins inside a raw disk
/// image or memory dump. The image is only ever opened read-only.
#[derive(Parser, Debug)]
#[command(name = "sigsift")]
#[command(author = "Ryan Cashmoney <tunclon@proton.me>")]
#[command(version)]
#[command(about = "Find where known file formats begin inside raw images", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (debug logging)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a raw image for format signatures
    Scan(ScanArgs),

    /// List the formats in the catalog
    Formats(FormatsArgs),

    /// Print or create the configuration file
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Parser)]
pub struct ScanArgs {
    /// Source raw image (dd, img, memory dump, or any binary file)
    #[arg(required = true)]
    pub source: PathBuf,

    /// Number of parallel workers (default: config, then CPU count)
    #[arg(long, short)]
    pub workers: Option<usize>,

    /// Only scan these formats (e.g., zip,pdf,jpg)
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub formats: Option<Vec<String>>,

    /// Only scan these categories (documents, archives, images, media)
    #[arg(long, short = 'c', value_delimiter = ',')]
    pub category: Option<Vec<String>>,

    /// TOML format catalog to use instead of the built-in table
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Write the report to this file instead of stdout
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Report encoding
    #[arg(long, value_enum)]
    pub report: Option<ReportFormat>,

    /// Include a blake3 digest of the image in the report
    #[arg(long)]
    pub hash: bool,

    /// Hide the progress bar
    #[arg(long)]
    pub no_progress: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct FormatsArgs {
    /// TOML format catalog to list instead of the built-in table
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Only list these categories
    #[arg(long, short = 'c', value_delimiter = ',')]
    pub category: Option<Vec<String>>,

    /// Print the catalog as TOML, ready to edit and pass back with --catalog
    #[arg(long)]
    pub toml: bool,
}

#[derive(Debug, Clone, Parser)]
pub struct ConfigArgs {
    /// Write the sample config to the config path if none exists
    #[arg(long)]
    pub write: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan() {
        let cli = Cli::try_parse_from([
            "sigsift", "scan", "disk.img", "-w", "4", "--formats", "zip,pdf", "--report", "json",
            "--hash",
        ])
        .unwrap();

        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.source, PathBuf::from("disk.img"));
                assert_eq!(args.workers, Some(4));
                assert_eq!(args.formats, Some(vec!["zip".to_string(), "pdf".to_string()]));
                assert_eq!(args.report, Some(ReportFormat::Json));
                assert!(args.hash);
                assert!(!args.no_progress);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_formats_with_global_flags() {
        let cli = Cli::try_parse_from(["sigsift", "formats", "-c", "images,media", "--toml", "-v"])
            .unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Formats(args) => {
                assert!(args.toml);
                assert_eq!(
                    args.category,
                    Some(vec!["images".to_string(), "media".to_string()])
                );
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_scan_requires_source() {
        assert!(Cli::try_parse_from(["sigsift", "scan"]).is_err());
    }
}
