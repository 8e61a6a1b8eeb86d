use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "photo-sync")]
#[command(about = "Upload new photos from a directory tree to your photo library", long_about = None)]
pub struct Cli {
    /// Directory to scan
    #[arg(long, global = true)]
    pub path: Option<PathBuf>,

    /// Number of successful uploads per run
    #[arg(long, alias = "limit", global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub step: Option<u64>,

    /// Walk and log what would be uploaded without contacting the service
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// `--step` as an upload cap, refusing values this platform cannot count to.
    pub fn upload_limit(&self) -> anyhow::Result<Option<usize>> {
        self.step
            .map(|step| {
                usize::try_from(step)
                    .with_context(|| format!("--step {} is too large for this platform", step))
            })
            .transpose()
    }
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Upload new files under the scan path (default)
    Upload,
    /// Display the number of entries in the upload ledger
    CountLedger,
    /// Print configuration values
    PrintConfig,
    /// Forget every recorded upload
    ResetLedger,
}
