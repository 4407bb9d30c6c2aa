//! CLI for nfetch.

mod commands;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nfetch_core::config;
use std::path::PathBuf;

use commands::{run_checksum, run_copy, run_segments, run_table};

#[derive(Debug, Parser)]
#[command(name = "nfetch")]
#[command(about = "nfetch: segmented, resumable transfer of named content", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Serve a local file under a name and fetch it back through the loopback network.
    Copy(CopyArgs),

    /// Print how a file would be cut into segments.
    Segments {
        /// File to measure.
        path: PathBuf,
        /// Segment size in bytes (default from config).
        #[arg(long, value_name = "BYTES")]
        chunk_size: Option<u32>,
    },

    /// Inspect the segment table of an unfinished download.
    Table {
        /// Download target (the `.sgt` suffix is added).
        target: PathBuf,
    },

    /// Compute SHA-256 of a file (e.g. to compare a copy with its source).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },
}

#[derive(Debug, Args)]
pub struct CopyArgs {
    /// Local file to publish.
    pub source: PathBuf,

    /// Name to publish the file under, e.g. `/videos/intro.mp4`.
    #[arg(long)]
    pub name: String,

    /// Directory to place the copy in; the file name is derived from the content name.
    #[arg(long, value_name = "DIR", conflicts_with = "output", required_unless_present = "output")]
    pub out_dir: Option<PathBuf>,

    /// Exact output file.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Segment size in bytes.
    #[arg(long, value_name = "BYTES")]
    pub chunk_size: Option<u32>,

    /// Maximum outstanding segment requests.
    #[arg(long, value_name = "N")]
    pub pipeline: Option<usize>,

    /// Route cost to register the source with (lower is preferred).
    #[arg(long, value_name = "N")]
    pub cost: Option<u32>,

    /// Stream the file through a shared file instead of per-segment requests.
    #[arg(long)]
    pub stream: bool,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Copy(args) => run_copy(&cfg, args).await?,
            CliCommand::Segments { path, chunk_size } => {
                run_segments(&path, chunk_size.unwrap_or(cfg.chunk_size))?
            }
            CliCommand::Table { target } => run_table(&target)?,
            CliCommand::Checksum { path } => run_checksum(&path)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
