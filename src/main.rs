#![deny(clippy::mod_module_files)]
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod error;
mod history;
mod record;
mod replay;
mod repo;
mod source;
mod validate;

use replay::{ReplayEngine, ReplayOptions};
use repo::{DestinationRepo, GitRepo};
use source::CvsCheckout;

/// Replay pre-extracted CVS commit history onto a git repository,
/// preserving authorship, timestamps, messages, and per-file change
/// semantics.
#[derive(Debug, Parser)]
#[command(name = "git-cvs-replay", version)]
struct Cli {
    /// Commit log: one JSON record per line.
    log_file: PathBuf,
    /// Branch to filter records to and to replay onto.
    branch: String,
    /// Destination git repository working tree.
    dest_repo: PathBuf,
    /// Checked-out CVS working copy of the source repository.
    source_checkout: PathBuf,

    /// Report extra per-file detail.
    #[arg(short, long)]
    verbose: bool,
    /// Report what would happen without mutating anything.
    #[arg(short = 'n', long)]
    dry_run: bool,
    /// Enable debug tracing.
    #[arg(long)]
    debug: bool,
    /// Bypass the timestamp ordering check against the destination tip.
    #[arg(short, long)]
    force: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let records = record::read_log(&cli.log_file, &cli.branch)?;
    tracing::info!(
        "decoded {} commit(s) for branch '{}'",
        records.len(),
        cli.branch
    );
    if records.is_empty() {
        println!("nothing to replay on branch '{}'", cli.branch);
        return Ok(());
    }

    let repo = GitRepo::new(&cli.dest_repo);
    if cli.dry_run {
        tracing::info!("dry-run: not checking out '{}'", cli.branch);
    } else {
        repo.checkout_branch(&cli.branch)?;
    }

    let watermark = history::read_watermark(&repo, &cli.branch)?;
    tracing::debug!(
        "watermark: {} by {}",
        watermark.unixtime,
        watermark.author
    );
    validate::check_batch(&records, &watermark, cli.force)?;

    let source = CvsCheckout::open(&cli.source_checkout)?;
    let opts = ReplayOptions {
        dry_run: cli.dry_run,
        verbose: cli.verbose,
    };
    let engine = ReplayEngine::new(&source, &repo, &cli.dest_repo, opts);
    engine.replay(&records)?;

    if cli.dry_run {
        println!("dry-run complete, no changes were made");
    } else {
        println!("replayed {} commit(s) onto '{}'", records.len(), cli.branch);
    }
    Ok(())
}
