/// # zenodo-sync CLI interface (module)
///
/// This module implements the full CLI surface for zenodo-sync: argument
/// parsing, validation, and the async entrypoint. All reconciliation logic
/// lives in the `zenodo-sync-core` crate; this module is strictly glue.
///
/// ## How to use
/// - Command-line users: run the installed `zenodo-sync` binary with `--help`.
/// - Programmatic/integration use: call [`run`] with a constructed [`Cli`].
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use zenodo_sync_core::config::{RunOptions, Stage, StageConfig};
use zenodo_sync_core::reconcile::archive;

use crate::catalog;
use crate::client::ZenodoClient;

fn parse_stage(s: &str) -> Result<Stage, String> {
    s.parse()
}

/// CLI for zenodo-sync: synchronise a conference-paper catalog with Zenodo
/// deposit records, publishing new or updated versions as needed.
#[derive(Parser)]
#[clap(
    name = "zenodo-sync",
    version,
    about = "Synchronise a conference-paper catalog with Zenodo deposit records"
)]
pub struct Cli {
    /// Path to the JSON paper catalog.
    pub papers: PathBuf,
    /// Path to the JSON conference metadata, keyed by year.
    pub conferences: PathBuf,
    /// Path for the updated output catalog (also read as prior state when it
    /// exists).
    pub output: PathBuf,
    /// Deployment stage: sandbox or production.
    #[clap(long, default_value = "sandbox", value_parser = parse_stage)]
    pub stage: Stage,
    /// Worker count; negative N leaves N cores free. Defaults to leaving one
    /// core free.
    #[clap(long, allow_hyphen_values = true)]
    pub workers: Option<i32>,
    /// Increase log verbosity (-v: debug, -vv: trace).
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Randomly sample at most this many papers from the catalog.
    #[clap(long)]
    pub max_items: Option<usize>,
    /// Exercise the decision logic without uploading or publishing anything.
    #[clap(long)]
    pub dry_run: bool,
}

/// Async CLI entrypoint, extracted for integration tests and main().
pub async fn run(cli: Cli) -> Result<()> {
    info!(stage = %cli.stage, dry_run = cli.dry_run, "Starting synchronisation run");

    let mut papers = catalog::load_papers(&cli.papers)?;
    let conferences = catalog::load_conferences(&cli.conferences)?;
    if let Some(prior) = catalog::load_prior(&cli.output)? {
        catalog::seed_from_prior(&mut papers, &prior);
    }
    let papers = catalog::sample(papers, cli.max_items);

    // Eager credential validation: a missing token for the requested stage
    // fails the run before any paper is touched.
    let stage_config = StageConfig::from_env(cli.stage);
    stage_config.validate()?;
    let client = ZenodoClient::new(stage_config)?;

    let options = RunOptions {
        dry_run: cli.dry_run,
        workers: cli.workers,
    };
    let report = archive(&client, papers, &conferences, &options).await;

    for failure in &report.failures {
        error!(
            title = %failure.title,
            year = %failure.year,
            error = %failure.error,
            "Paper failed to sync"
        );
    }

    catalog::write_output(&cli.output, &report.papers)?;
    info!(
        total = report.papers.len(),
        failed = report.failures.len(),
        output = %cli.output.display(),
        "Synchronisation run complete"
    );
    Ok(())
}
