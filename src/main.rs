//! sigsift - Signature-based file carver
//!
//! Scans a raw image for the signatures of known file formats and reports
//! every offset where one of them begins.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use sigsift::cli::{self, Cli, Commands};
use sigsift::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match (&cli.config, &cli.command) {
        // `config --write` may be about to create this file
        (Some(path), Commands::Config(_)) if !path.exists() => Config::default(),
        (Some(path), _) => Config::load_from(path)?,
        (None, _) => Config::load(),
    };

    // Initialize logging
    let level = if cli.verbose {
        "debug"
    } else {
        config.general.log_level.as_str()
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(format!("sigsift={}", level).parse()?))
        .init();

    match cli.command {
        Commands::Scan(args) => {
            let report = cli::commands::run_scan(&args, &config).await?;
            let code = cli::commands::scan_exit_code(&report);
            if code != 0 {
                std::process::exit(code);
            }
        }
        Commands::Formats(args) => {
            cli::commands::run_formats(&args, &config)?;
        }
        Commands::Config(args) => {
            let path = cli.config.clone().unwrap_or_else(Config::default_path);
            cli::commands::run_config(&args, &path)?;
        }
    }

    Ok(())
}
