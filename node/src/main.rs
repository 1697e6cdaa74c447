// Copyright (c) 2026 Strata Contributors. MIT License.
// See LICENSE for details.

//! # Strata Node
//!
//! Entry point for the `strata-node` binary. Parses CLI arguments,
//! initializes logging, opens the chain database, and runs one command:
//!
//! - `import`  — import block files and report each outcome
//! - `tip`     — print the canonical tip and chain summary
//! - `chain`   — walk the canonical chain towards genesis
//! - `block`   — print one block's header as JSON
//! - `version` — print build version information

mod cli;
mod logging;
mod metrics;

use std::path::Path;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;

use strata_protocol::config::{EngineConfig, PROTOCOL_VERSION};
use strata_protocol::crypto::{hash_from_hex, short_hex};
use strata_protocol::{ChainEngine, ImportOutcome};

use cli::{BlockArgs, ChainArgs, Commands, GlobalArgs, ImportArgs, StrataNodeCli};
use logging::LogFormat;
use metrics::ImportMetrics;

fn main() -> Result<()> {
    let cli = StrataNodeCli::parse();

    if let Commands::Version = cli.command {
        print_version();
        return Ok(());
    }

    logging::init_logging(
        logging::DEFAULT_FILTER,
        LogFormat::from_str_lossy(&cli.global.log_format),
    );

    let engine = open_engine(&cli.global)?;
    let result = match cli.command {
        Commands::Import(args) => import_blocks(&engine, args),
        Commands::Tip => show_tip(&engine),
        Commands::Chain(args) => show_chain(&engine, args),
        Commands::Block(args) => show_block(&engine, args),
        Commands::Version => Ok(()),
    };
    engine.close().context("failed to close chain database")?;
    result
}

/// Loads the engine configuration and opens the database.
fn open_engine(global: &GlobalArgs) -> Result<ChainEngine> {
    let config = match &global.config {
        Some(path) => EngineConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => EngineConfig::default(),
    };

    std::fs::create_dir_all(&global.data_dir).with_context(|| {
        format!("failed to create data directory: {}", global.data_dir.display())
    })?;

    let engine = ChainEngine::open(&global.data_dir, config)
        .with_context(|| format!("failed to open chain database at {}", global.data_dir.display()))?;
    tracing::info!(path = %global.data_dir.display(), "chain database opened");
    Ok(engine)
}

/// Imports each file in order, printing one line per outcome.
fn import_blocks(engine: &ChainEngine, args: ImportArgs) -> Result<()> {
    let metrics = ImportMetrics::new().context("failed to register metrics")?;

    for path in &args.files {
        let raw = read_block_file(path, args.hex)?;
        let previous_tip = engine.canonical_tip_hash();

        let started = Instant::now();
        let outcome = engine
            .import(&raw)
            .with_context(|| format!("import of {} failed", path.display()))?;
        metrics
            .import_duration_seconds
            .observe(started.elapsed().as_secs_f64());
        metrics.observe(&outcome);

        if let ImportOutcome::Accepted {
            hash,
            canonical: true,
            ..
        } = &outcome
        {
            if engine.header(hash)?.parent_hash != previous_tip {
                metrics.reorgs_total.inc();
            }
        }

        println!("{}: {}", path.display(), outcome);
    }

    metrics.tip_number.set(engine.last_block_number() as i64);
    tracing::info!(
        files = args.files.len(),
        tip = %short_hex(&engine.canonical_tip_hash()),
        tip_number = engine.last_block_number(),
        "import finished"
    );

    if args.metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

/// Prints the canonical tip and headline numbers.
fn show_tip(engine: &ChainEngine) -> Result<()> {
    let status = engine.status()?;
    println!("tip          : {}", hex::encode(status.tip));
    println!("tip number   : {}", status.tip_number);
    println!("tip weight   : {}", status.tip_weight);
    println!("genesis      : {}", hex::encode(status.genesis));
    println!("known blocks : {}", status.known_blocks);
    println!("heads        : {}", status.heads);
    Ok(())
}

/// Prints `#number hash` lines from the start block towards genesis.
fn show_chain(engine: &ChainEngine, args: ChainArgs) -> Result<()> {
    let from = args.from.as_deref().map(parse_hash).transpose()?;
    let chain = engine.canonical_chain(from)?;
    let limit = args.limit.unwrap_or(chain.len());

    for hash in chain.iter().take(limit) {
        println!("#{} {}", engine.block_number(hash)?, hex::encode(hash));
    }
    Ok(())
}

/// Prints a block header as JSON.
fn show_block(engine: &ChainEngine, args: BlockArgs) -> Result<()> {
    let hash = parse_hash(&args.hash)?;
    let header = engine
        .header(&hash)
        .with_context(|| format!("block {} not available", args.hash))?;

    let children: Vec<String> = engine.children_of(&hash).iter().map(hex::encode).collect();
    let view = serde_json::json!({
        "hash": hex::encode(hash),
        "number": header.number,
        "parent_hash": header.parent_hash_hex(),
        "timestamp": header.timestamp,
        "difficulty": header.difficulty.to_string(),
        "uncles": header.uncles.iter().map(hex::encode).collect::<Vec<_>>(),
        "beneficiary": hex::encode(header.beneficiary),
        "state_root": hex::encode(header.state_root),
        "tx_root": hex::encode(header.tx_root),
        "extra_data": hex::encode(&header.extra_data),
        "total_weight": engine.total_weight(&hash)?.to_string(),
        "children": children,
    });
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}

/// Reads one encoded block: raw bytes, or hex text when `hex` is set.
fn read_block_file(path: &Path, hex: bool) -> Result<Vec<u8>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    if !hex {
        return Ok(bytes);
    }

    let text = std::str::from_utf8(&bytes)
        .with_context(|| format!("{} is not valid hex text", path.display()))?;
    let text = text.trim();
    let text = text.strip_prefix("0x").unwrap_or(text);
    hex::decode(text).with_context(|| format!("{} is not valid hex text", path.display()))
}

fn parse_hash(s: &str) -> Result<[u8; 32]> {
    match hash_from_hex(s) {
        Some(hash) => Ok(hash),
        None => bail!("invalid block hash: {s}"),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("strata-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", PROTOCOL_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_protocol::Block;

    #[test]
    fn reads_raw_and_hex_block_files() {
        let dir = tempfile::tempdir().unwrap();
        let raw = Block::genesis().to_bytes().unwrap();

        let raw_path = dir.path().join("genesis.blk");
        std::fs::write(&raw_path, &raw).unwrap();
        assert_eq!(read_block_file(&raw_path, false).unwrap(), raw);

        let hex_path = dir.path().join("genesis.hex");
        std::fs::write(&hex_path, format!("0x{}\n", hex::encode(&raw))).unwrap();
        assert_eq!(read_block_file(&hex_path, true).unwrap(), raw);
    }

    #[test]
    fn bad_hex_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.hex");
        std::fs::write(&path, "zz").unwrap();
        assert!(read_block_file(&path, true).is_err());
        assert!(read_block_file(&dir.path().join("missing"), false).is_err());
    }

    #[test]
    fn hash_argument_parsing() {
        let hash = [0xAB; 32];
        assert_eq!(parse_hash(&hex::encode(hash)).unwrap(), hash);
        assert_eq!(parse_hash(&format!("0x{}", hex::encode(hash))).unwrap(), hash);
        assert!(parse_hash("abcd").is_err());
    }

    #[test]
    fn import_command_against_temp_database() {
        let dir = tempfile::tempdir().unwrap();
        let global = GlobalArgs {
            data_dir: dir.path().join("db"),
            config: None,
            log_format: "pretty".into(),
        };

        let genesis = Block::genesis();
        let child = strata_protocol::storage::BlockBuilder::on(&genesis)
            .unwrap()
            .build();
        let file = dir.path().join("b1.blk");
        std::fs::write(&file, child.to_bytes().unwrap()).unwrap();

        let engine = open_engine(&global).unwrap();
        import_blocks(
            &engine,
            ImportArgs {
                files: vec![file],
                hex: false,
                metrics: false,
            },
        )
        .unwrap();
        assert_eq!(engine.canonical_tip_hash(), child.hash().unwrap());
        engine.close().unwrap();
    }
}
