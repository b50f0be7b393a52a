use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Load delimited text and spreadsheet files into SQLite tables",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Load files into the database, replacing any table of the same name
    Ingest(IngestArgs),
    /// Guess a file's encoding and show the order candidates would be tried in
    Detect(DetectArgs),
    /// Show the row count, columns and first rows of a loaded table
    Inspect(InspectArgs),
    /// Write a default configuration file or check an existing one
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Debug, Args)]
pub struct IngestArgs {
    /// One or more .txt, .csv, .xlsx or .xls files
    #[arg(short = 'i', long = "input", required = true, action = clap::ArgAction::Append)]
    pub inputs: Vec<PathBuf>,
    /// YAML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// SQLite database file, overriding the configured one
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// Target table name (only with a single input)
    #[arg(short, long)]
    pub table: Option<String>,
    /// Worksheet to read from spreadsheets (defaults to the first sheet)
    #[arg(long)]
    pub sheet: Option<String>,
    /// Skip encoding detection and use the fallback list only
    #[arg(long = "no-detect")]
    pub no_detect: bool,
}

#[derive(Debug, Args)]
pub struct DetectArgs {
    /// File to inspect
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// YAML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Bytes to sample from the start of the file
    #[arg(long = "sample-size")]
    pub sample_size: Option<usize>,
}

#[derive(Debug, Args)]
pub struct InspectArgs {
    /// SQLite database file, overriding the configured one
    #[arg(long)]
    pub db: Option<PathBuf>,
    /// YAML configuration file (built-in defaults when omitted)
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Table to read back
    #[arg(short, long)]
    pub table: String,
    /// Number of sample rows to show
    #[arg(long, default_value_t = 5)]
    pub rows: usize,
    /// Emit the result as JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Write the built-in configuration to a YAML file
    Init(ConfigInitArgs),
    /// Validate a YAML configuration file
    Check(ConfigCheckArgs),
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Destination YAML file
    #[arg(short, long)]
    pub output: PathBuf,
}

#[derive(Debug, Args)]
pub struct ConfigCheckArgs {
    /// YAML configuration file to validate
    #[arg(short, long)]
    pub config: PathBuf,
}
