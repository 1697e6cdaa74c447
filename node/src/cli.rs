//! # CLI Interface
//!
//! Defines the command-line argument structure for `strata-node` using
//! `clap` derive. Subcommands: `import`, `tip`, `chain`, `block`, and
//! `version`.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Strata chain index operator tool.
///
/// Imports raw blocks into a local chain database and inspects the block
/// tree: canonical tip, canonical chain, individual blocks.
#[derive(Parser, Debug)]
#[command(
    name = "strata-node",
    about = "Strata chain index operator tool",
    version,
    propagate_version = true
)]
pub struct StrataNodeCli {
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Path to the chain database directory.
    ///
    /// Created on first use if it does not exist.
    #[arg(long, short = 'd', env = "STRATA_DATA_DIR", default_value = "./strata-data", global = true)]
    pub data_dir: PathBuf,

    /// Engine configuration file (JSON). Defaults apply when omitted.
    #[arg(long, short = 'c', env = "STRATA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log output format: `pretty` or `json`.
    #[arg(long, default_value = "pretty", global = true)]
    pub log_format: String,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Import block files, in the order given.
    Import(ImportArgs),
    /// Print the canonical tip and chain summary.
    Tip,
    /// Walk the canonical chain back towards genesis.
    Chain(ChainArgs),
    /// Print one block's header.
    Block(BlockArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `import` subcommand.
#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Files containing one encoded block each.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Files contain hex text rather than raw bytes.
    #[arg(long)]
    pub hex: bool,

    /// Print Prometheus metrics for this run when done.
    #[arg(long)]
    pub metrics: bool,
}

/// Arguments for the `chain` subcommand.
#[derive(Parser, Debug)]
pub struct ChainArgs {
    /// Start from this block instead of the canonical tip (hex).
    #[arg(long)]
    pub from: Option<String>,

    /// Print at most this many hashes.
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

/// Arguments for the `block` subcommand.
#[derive(Parser, Debug)]
pub struct BlockArgs {
    /// Block hash (hex, optional `0x` prefix).
    pub hash: String,
}
