//! grimnir-sb - Smart block preview tool
//!
//! Generates smart block sequences against a catalog database (read-only)
//! or a JSON library file, and prints either a preview listing or the
//! materialized schedule for a slot.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use grimnir_common::config::{ConfigResolver, TomlConfig};
use grimnir_sb::catalog::{Catalog, InMemoryCatalog, Library, RuleSetResolver, SqliteCatalog};
use grimnir_sb::{
    materialize_slot, render_preview, PreviewRequest, PreviewService, RuleDocument,
    SequenceDocument, SequenceResult,
};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Command-line arguments for grimnir-sb
#[derive(Parser, Debug)]
#[command(name = "grimnir-sb")]
#[command(about = "Smart block sequencing for Grimnir radio automation")]
#[command(version)]
struct Cli {
    /// Config file (overrides GRIMNIR_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a preview listing for a block
    Preview(BlockArgs),

    /// Print the scheduled items for a block placed at a slot start
    Materialize {
        #[command(flatten)]
        block: BlockArgs,

        /// Slot start time (RFC 3339, e.g. 2026-03-01T14:00:00Z)
        #[arg(long)]
        slot_start: String,
    },
}

#[derive(Args, Debug)]
struct BlockArgs {
    /// Catalog database (opened read-only)
    #[arg(long, env = "GRIMNIR_DB")]
    db: Option<PathBuf>,

    /// JSON library file, used when no database is given
    #[arg(long, env = "GRIMNIR_LIBRARY")]
    library: Option<PathBuf>,

    /// Station whose media is in scope
    #[arg(long, env = "GRIMNIR_STATION")]
    station: Option<String>,

    /// Stored smart block id
    #[arg(long, conflicts_with = "rules")]
    block: Option<String>,

    /// Rule document JSON file
    #[arg(long)]
    rules: Option<PathBuf>,

    /// Sequence document JSON file
    #[arg(long)]
    sequence: Option<PathBuf>,

    /// Random seed (wall clock when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Number of variants to generate
    #[arg(long)]
    variants: Option<usize>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigResolver::new("grimnir-sb")
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;

    init_tracing(&config);

    info!(
        "Starting Grimnir Smart Blocks (grimnir-sb) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match cli.command {
        Command::Preview(args) => {
            let results = run_block(&args, &config).await?;
            print_results(&results, args.json, render_preview)?;
        }
        Command::Materialize { block, slot_start } => {
            let slot_start: DateTime<Utc> = DateTime::parse_from_rfc3339(&slot_start)
                .with_context(|| format!("Invalid --slot-start '{}'", slot_start))?
                .with_timezone(&Utc);
            let results = run_block(&block, &config).await?;
            let slots: Vec<_> = results
                .iter()
                .map(|result| materialize_slot(result, slot_start))
                .collect();
            if block.json {
                println!("{}", serde_json::to_string_pretty(&slots)?);
            } else {
                for (i, items) in slots.iter().enumerate() {
                    if slots.len() > 1 {
                        println!("== Variant {} ==", i + 1);
                    }
                    for item in items {
                        println!(
                            "{}  {}  {}{}",
                            item.starts_at.format("%Y-%m-%d %H:%M:%S"),
                            item.ends_at.format("%H:%M:%S"),
                            if item.is_ad { "[AD] " } else { "" },
                            item.media_id
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

/// RUST_LOG wins over the configured level; logs go to stderr unless a
/// log file is configured
fn init_tracing(config: &TomlConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let Some(path) = &config.logging.file else {
        builder.with_writer(std::io::stderr).init();
        return;
    };
    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => builder.with_ansi(false).with_writer(Mutex::new(file)).init(),
        Err(e) => {
            builder.with_writer(std::io::stderr).init();
            warn!("Log file {} unavailable ({}), logging to stderr", path.display(), e);
        }
    }
}

async fn run_block(args: &BlockArgs, config: &TomlConfig) -> Result<Vec<SequenceResult>> {
    let station_id = args
        .station
        .clone()
        .or_else(|| config.station_id.clone())
        .context("No station given (--station or station_id in config)")?;

    let (catalog, resolver) = open_catalog(args, config).await?;
    let service = PreviewService::new(catalog, resolver.clone());

    let seed = args
        .seed
        .or(config.preview.seed)
        .unwrap_or_else(wall_clock_seed);
    let variants = args.variants.unwrap_or(config.preview.variants).max(1);

    let request = match &args.block {
        Some(block_id) => {
            let block = resolver
                .resolve_block(block_id)
                .await
                .with_context(|| format!("Failed to load smart block {}", block_id))?
                .with_context(|| format!("Smart block not found: {}", block_id))?;
            info!("Previewing smart block '{}' ({})", block.name, block.id);
            PreviewRequest::for_block(&block, station_id, seed)
        }
        None => {
            let Some(rules_path) = &args.rules else {
                bail!("Either --block or --rules is required");
            };
            PreviewRequest {
                block_id: None,
                station_id,
                rules: RuleDocument::from_json(&read_file(rules_path)?)
                    .map_err(anyhow::Error::msg)
                    .with_context(|| format!("Invalid rules file {}", rules_path.display()))?,
                sequence: match &args.sequence {
                    Some(path) => SequenceDocument::from_json(&read_file(path)?)
                        .map_err(anyhow::Error::msg)
                        .with_context(|| format!("Invalid sequence file {}", path.display()))?,
                    None => SequenceDocument::new(),
                },
                seed,
            }
        }
    };

    info!(seed, variants, "Generating preview");
    service
        .preview_variants(&request, variants)
        .await
        .context("Preview generation failed")
}

async fn open_catalog(
    args: &BlockArgs,
    config: &TomlConfig,
) -> Result<(Arc<dyn Catalog>, Arc<dyn RuleSetResolver>)> {
    if let Some(db_path) = args.db.as_ref().or(config.database_path.as_ref()) {
        let catalog = Arc::new(
            SqliteCatalog::open(db_path)
                .await
                .with_context(|| format!("Failed to open catalog {}", db_path.display()))?,
        );
        let resolver: Arc<dyn RuleSetResolver> = catalog.clone();
        let catalog: Arc<dyn Catalog> = catalog;
        return Ok((catalog, resolver));
    }

    if let Some(library_path) = args.library.as_ref().or(config.library_path.as_ref()) {
        let library = Library::from_json_file(library_path)
            .with_context(|| format!("Failed to load library {}", library_path.display()))?;
        let catalog = Arc::new(InMemoryCatalog::new(library));
        let resolver: Arc<dyn RuleSetResolver> = catalog.clone();
        let catalog: Arc<dyn Catalog> = catalog;
        return Ok((catalog, resolver));
    }

    bail!("No catalog configured (--db, --library, or database_path/library_path in config)")
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn wall_clock_seed() -> u64 {
    let seed = grimnir_common::time::now().timestamp_micros() as u64;
    warn!(seed, "No seed given, using wall clock; pass --seed to reproduce");
    seed
}

fn print_results(
    results: &[SequenceResult],
    json: bool,
    render: impl Fn(&SequenceResult) -> String,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    for (i, result) in results.iter().enumerate() {
        if results.len() > 1 {
            println!("== Variant {} ==", i + 1);
        }
        print!("{}", render(result));
    }
    Ok(())
}
