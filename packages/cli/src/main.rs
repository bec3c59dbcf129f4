#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the council archive harvester.

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};
use council_archive_cli_utils::IndicatifProgress;
use council_archive_harvest::inspect::inspect_archive;
use council_archive_harvest::{HarvestConfig, HarvestError, Harvester, KindStats, RunStats};
use council_archive_records_models::RecordKind;
use council_archive_scraper::ReqwestClient;

#[derive(Parser)]
#[command(
    name = "council_archive",
    about = "Mirror council papers and meetings into a local archive"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl both collections and download every record not yet archived
    Harvest(HarvestArgs),
    /// Summarize what is already in the archive
    Status {
        /// Archive root (default: `documents`)
        #[arg(long, env = "COUNCIL_ARCHIVE_DIR")]
        target_dir: Option<PathBuf>,
    },
}

#[derive(clap::Args)]
struct HarvestArgs {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,
    /// Archive root
    #[arg(long, env = "COUNCIL_ARCHIVE_DIR")]
    target_dir: Option<PathBuf>,
    /// Paper collection URL
    #[arg(long)]
    papers_url: Option<String>,
    /// Meeting collection URL
    #[arg(long)]
    meetings_url: Option<String>,
    /// Body object URL used to discover collection URLs
    #[arg(long)]
    body_url: Option<String>,
    /// Stop each crawl after this many pages (for testing)
    #[arg(long)]
    max_pages: Option<u32>,
    /// Harvest only one collection
    #[arg(long, value_enum)]
    only: Option<Only>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Only {
    Papers,
    Meetings,
}

impl From<Only> for RecordKind {
    fn from(value: Only) -> Self {
        match value {
            Only::Papers => Self::Paper,
            Only::Meetings => Self::Meeting,
        }
    }
}

impl HarvestArgs {
    fn into_config(self) -> Result<(HarvestConfig, Option<Only>), HarvestError> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::load(path)?,
            None => HarvestConfig::default(),
        };

        if let Some(target_dir) = self.target_dir {
            config.target_dir = target_dir;
        }
        if self.papers_url.is_some() {
            config.papers_url = self.papers_url;
        }
        if self.meetings_url.is_some() {
            config.meetings_url = self.meetings_url;
        }
        if self.body_url.is_some() {
            config.body_url = self.body_url;
        }
        if self.max_pages.is_some() {
            config.max_pages = self.max_pages;
        }

        config.validate()?;
        Ok((config, self.only))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = council_archive_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Harvest(args) => {
            let (config, only) = args.into_config()?;
            let start = Instant::now();

            let client = ReqwestClient::new(&config.user_agent, config.request_timeout())?;
            let endpoints = config.resolve_endpoints(&client).await?;

            log::info!("Harvesting into {}", config.target_dir.display());

            let harvester = Harvester::new(client, endpoints, config.harvest_options())
                .with_progress(IndicatifProgress::factory(&multi));

            let stats = match only {
                Some(only) => harvester.run_kinds(&[RecordKind::from(only)]).await?,
                None => harvester.run().await?,
            };

            print_stats(&stats);
            println!("Finished in {:.1}s", start.elapsed().as_secs_f64());

            if stats.total_errors() > 0 {
                log::warn!(
                    "{} entities failed and will be retried on the next run",
                    stats.total_errors()
                );
            }
        }
        Commands::Status { target_dir } => {
            let root = target_dir.unwrap_or_else(|| HarvestConfig::default().target_dir);
            let report = inspect_archive(&root).await?;

            println!("Archive: {}", root.display());
            println!("{:<10} {:>10} {:>12} {:>8}", "", "complete", "incomplete", "files");
            for (label, counts) in [("papers", report.papers), ("meetings", report.meetings)] {
                println!(
                    "{label:<10} {:>10} {:>12} {:>8}",
                    counts.complete, counts.incomplete, counts.files
                );
            }

            if !report.incomplete_entities.is_empty() {
                println!();
                println!("Incomplete (reprocessed on next harvest):");
                for entity in &report.incomplete_entities {
                    println!("  {entity}");
                }
            }
        }
    }

    Ok(())
}

fn print_stats(stats: &RunStats) {
    println!();
    println!(
        "{:<10} {:>10} {:>8} {:>7} {:>11} {:>12}",
        "", "processed", "skipped", "errors", "downloaded", "failed files"
    );
    for (label, kind) in [("papers", &stats.papers), ("meetings", &stats.meetings)] {
        print_row(label, kind);
    }
}

fn print_row(label: &str, stats: &KindStats) {
    println!(
        "{label:<10} {:>10} {:>8} {:>7} {:>11} {:>12}",
        stats.processed, stats.skipped, stats.errors, stats.files_downloaded, stats.files_failed
    );
}
