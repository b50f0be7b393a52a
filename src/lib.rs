pub mod chunk;
pub mod cli;
pub mod config;
pub mod decode;
pub mod detect;
pub mod error;
pub mod io_utils;
pub mod pipeline;
pub mod spreadsheet;
pub mod store;
pub mod table;
pub mod verify;

use std::{
    env,
    path::{Path, PathBuf},
    sync::OnceLock,
};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, ConfigCommands},
    config::IngestConfig,
    detect::{EncodingDetector, HeuristicDetector, UnavailableDetector},
    io_utils::{FileKind, SourceFile},
    pipeline::{Pipeline, RunOptions},
    store::{SqliteStore, TableStore},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("tabload", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Ingest(args) => handle_ingest(&args),
        Commands::Detect(args) => handle_detect(&args),
        Commands::Inspect(args) => handle_inspect(&args),
        Commands::Config(ConfigCommands::Init(args)) => {
            IngestConfig::default()
                .save(&args.output)
                .with_context(|| format!("Writing configuration to {:?}", args.output))?;
            info!("Default configuration written to {:?}", args.output);
            Ok(())
        }
        Commands::Config(ConfigCommands::Check(args)) => {
            load_config(Some(&args.config))?;
            println!("{:?}: OK", args.config);
            Ok(())
        }
    }
}

/// Loads and validates the configuration, falling back to built-in defaults.
pub fn load_config(path: Option<&Path>) -> Result<IngestConfig> {
    let config = match path {
        Some(path) => IngestConfig::load(path)
            .with_context(|| format!("Loading configuration from {path:?}"))?,
        None => IngestConfig::default(),
    };
    let issues = config.validate();
    if !issues.is_empty() {
        bail!("Invalid configuration:\n  - {}", issues.join("\n  - "));
    }
    Ok(config)
}

fn with_database(mut config: IngestConfig, db: Option<&PathBuf>) -> IngestConfig {
    if let Some(db) = db {
        config.database = db.clone();
    }
    config
}

fn handle_ingest(args: &cli::IngestArgs) -> Result<()> {
    if args.table.is_some() && args.inputs.len() > 1 {
        bail!("--table can only be used with a single input file");
    }
    let config = with_database(load_config(args.config.as_deref())?, args.db.as_ref());
    info!(
        "Ingesting {} file(s) into {:?}",
        args.inputs.len(),
        config.database
    );
    let mut pipeline = Pipeline::new(config)?;
    if args.no_detect {
        pipeline = pipeline.with_detector(Box::new(UnavailableDetector));
    }
    let options = RunOptions {
        table: args.table.clone(),
        sheet: args.sheet.clone(),
    };

    let outcomes = pipeline.run_all(&args.inputs, &options);
    let headers = ["file", "table", "rows", "columns", "encoding", "status"]
        .map(String::from)
        .to_vec();
    let rows = outcomes
        .iter()
        .map(|outcome| match outcome {
            Ok(done) => vec![
                done.path.clone(),
                done.table.clone(),
                done.rows.to_string(),
                done.columns.to_string(),
                done.encoding.clone(),
                "ok".to_string(),
            ],
            Err(failed) => vec![
                failed.path.display().to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                format!("failed ({}): {}", failed.stage, failed.source),
            ],
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);

    let failures = outcomes.iter().filter(|outcome| outcome.is_err()).count();
    if failures > 0 {
        return Err(anyhow!(
            "{failures} of {} file(s) failed to load",
            outcomes.len()
        ));
    }
    Ok(())
}

fn handle_detect(args: &cli::DetectArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let file = SourceFile::inspect(&args.input)?;
    if file.kind == FileKind::Spreadsheet {
        println!("{:?}: spreadsheet, encoding detection does not apply", args.input);
        return Ok(());
    }
    let sample_size = args.sample_size.unwrap_or(config.encoding.sample_size);
    let sample = io_utils::read_sample(&file.path, sample_size)
        .with_context(|| format!("Reading sample from {:?}", file.path))?;
    debug!("Sampled {} byte(s) from {:?}", sample.len(), file.path);
    let guess = HeuristicDetector.detect(&sample);
    let hint = config
        .source_matcher()?
        .find(&file.path)
        .and_then(|source| source.encoding.clone());
    let candidates = decode::candidate_list(
        guess.as_ref(),
        config.encoding.min_confidence,
        hint.as_deref(),
        &config.encoding.fallback_encodings,
    );
    match &guess {
        Some(guess) => println!(
            "Detected: {} (confidence {:.2})",
            guess.name, guess.confidence
        ),
        None => println!("Detected: none"),
    }
    println!("Candidates: {}", candidates.join(", "));
    Ok(())
}

fn handle_inspect(args: &cli::InspectArgs) -> Result<()> {
    let config = with_database(load_config(args.config.as_deref())?, args.db.as_ref());
    let store = SqliteStore::open(&config.database, &config.store)
        .with_context(|| format!("Opening database {:?}", config.database))?;
    let snapshot = store
        .snapshot(&args.table, args.rows)
        .with_context(|| format!("Reading table '{}'", args.table))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }
    println!("Table: {} ({} row(s))", snapshot.table, snapshot.row_count);
    let column_rows = snapshot
        .columns
        .iter()
        .map(|c| vec![c.name.clone(), c.declared_type.clone()])
        .collect::<Vec<_>>();
    table::print_table(&["column".to_string(), "type".to_string()], &column_rows);
    println!();
    table::print_table(&snapshot.column_names(), &snapshot.sample);
    Ok(())
}
