//! Decrypting table exporter.
//!
//! Loads an export job file, runs every configured table export and prints
//! a summary per table.
//!
//! # Security Guarantees
//! - Read-only database operations only
//! - No credentials or cell values logged
//! - Passwords held in zeroizing memory

use clap::Parser;
use dbexport::{Cli, build_decryptor, output};
use dbexport_core::{DefaultSourceFactory, ExportJobConfig, Result, export_job, logging::init_logging};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.global.verbose, cli.global.quiet)?;

    let config = ExportJobConfig::load(&cli.config).await.map_err(|e| {
        error!("Failed to load export job: {}", e);
        e
    })?;
    info!(
        "Loaded {} with {} databases and {} tables",
        cli.config.display(),
        config.databases.len(),
        config.table_count()
    );

    let decryptor = build_decryptor(&cli.capability)?;

    let report = export_job(&config, &DefaultSourceFactory, decryptor.as_ref()).await;
    // Clears key material before a possible process::exit
    drop(decryptor);

    if !cli.global.quiet {
        println!("{}", output::render_summary(&report, cli.max_errors));
    }

    if let Some(report_path) = &cli.report {
        output::save_report(&report, report_path).await?;
        info!("Report saved to {}", report_path.display());
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
