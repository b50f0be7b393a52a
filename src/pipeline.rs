//! Per-file ingestion: detect, decode, load, verify.
//!
//! A run walks `Init → Detecting → Decoding → Loading → Verifying` and ends in
//! either an [`IngestSuccess`] or an [`IngestFailure`] naming the stage that
//! failed. Files are processed one at a time, each to completion.

use std::{fmt, path::Path};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use log::{debug, info, warn};
use serde::Serialize;
use thiserror::Error;

use crate::{
    chunk,
    config::{IngestConfig, SourceMatcher},
    decode,
    detect::{EncodingDetector, EncodingGuess, HeuristicDetector},
    error::{ConfigError, IngestError},
    io_utils::{self, FileKind, SourceFile},
    store::{LoadResult, SqliteStore, TableStore},
    verify::{self, VerificationReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stage {
    Init,
    Detecting,
    Decoding,
    Loading,
    Verifying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Init => "init",
            Stage::Detecting => "detecting",
            Stage::Decoding => "decoding",
            Stage::Loading => "loading",
            Stage::Verifying => "verifying",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestSuccess {
    pub path: String,
    pub table: String,
    pub rows: usize,
    pub columns: usize,
    pub encoding: String,
    pub guess: Option<EncodingGuess>,
    pub candidates_tried: usize,
    pub chunk_size: usize,
    pub load: LoadResult,
    pub verification: VerificationReport,
    pub finished_at: DateTime<Local>,
}

#[derive(Debug, Error)]
#[error("{path:?} failed while {stage}: {source}")]
pub struct IngestFailure {
    pub path: std::path::PathBuf,
    pub stage: Stage,
    #[source]
    pub source: IngestError,
}

pub type IngestOutcome = std::result::Result<IngestSuccess, IngestFailure>;

/// Per-run overrides that take precedence over the source-pattern table.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub table: Option<String>,
    pub sheet: Option<String>,
}

pub struct Pipeline {
    config: IngestConfig,
    matcher: SourceMatcher,
    detector: Box<dyn EncodingDetector>,
    store: Box<dyn TableStore>,
}

impl Pipeline {
    /// Pipeline over the configured SQLite database with the heuristic detector.
    pub fn new(config: IngestConfig) -> Result<Self> {
        let store = SqliteStore::open(&config.database, &config.store)
            .with_context(|| format!("Opening database {:?}", config.database))?;
        let pipeline = Self::with_parts(config, Box::new(HeuristicDetector), Box::new(store))
            .context("Compiling source patterns")?;
        Ok(pipeline)
    }

    pub fn with_parts(
        config: IngestConfig,
        detector: Box<dyn EncodingDetector>,
        store: Box<dyn TableStore>,
    ) -> std::result::Result<Self, ConfigError> {
        let matcher = config.source_matcher()?;
        Ok(Self {
            config,
            matcher,
            detector,
            store,
        })
    }

    pub fn with_detector(mut self, detector: Box<dyn EncodingDetector>) -> Self {
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    pub fn run_all(&self, paths: &[impl AsRef<Path>], options: &RunOptions) -> Vec<IngestOutcome> {
        let workers = chunk::worker_count(&self.config.chunking, paths.len());
        info!(
            "Ingesting {} file(s) sequentially (suggested workers: {workers})",
            paths.len()
        );
        paths
            .iter()
            .map(|path| self.run(path.as_ref(), options))
            .collect()
    }

    pub fn run(&self, path: &Path, options: &RunOptions) -> IngestOutcome {
        let fail = |stage: Stage| {
            move |source: IngestError| {
                warn!("{path:?}: {stage} failed: {source}");
                IngestFailure {
                    path: path.to_path_buf(),
                    stage,
                    source,
                }
            }
        };

        enter(path, Stage::Init);
        let file = SourceFile::inspect(path).map_err(fail(Stage::Init))?;
        let source = self.matcher.find(path);
        if let Some(source) = source {
            debug!("{path:?} matches source '{}'", source.name);
        }
        let table = options
            .table
            .clone()
            .or_else(|| source.map(|s| s.table.clone()))
            .unwrap_or_else(|| io_utils::derive_table_name(path));
        let sheet = options
            .sheet
            .as_deref()
            .or_else(|| source.and_then(|s| s.sheet.as_deref()));

        enter(path, Stage::Detecting);
        let guess = self.detect(&file).map_err(fail(Stage::Detecting))?;

        enter(path, Stage::Decoding);
        let candidates = decode::candidate_list(
            guess.as_ref(),
            self.config.encoding.min_confidence,
            source.and_then(|s| s.encoding.as_deref()),
            &self.config.encoding.fallback_encodings,
        );
        debug!("{path:?}: candidates {candidates:?}");
        let decoded =
            decode::decode_file(&file, &candidates, sheet).map_err(fail(Stage::Decoding))?;

        enter(path, Stage::Loading);
        let chunk_size = chunk::chunk_size(&self.config.chunking, file.size_mb());
        debug!(
            "{path:?}: {:.2} MB, {chunk_size} row(s) per batch",
            file.size_mb()
        );
        let load = self
            .store
            .replace_table(&table, &decoded.table, chunk_size)
            .map_err(|source| IngestError::StoreWrite {
                table: table.clone(),
                source,
            })
            .map_err(fail(Stage::Loading))?;

        enter(path, Stage::Verifying);
        let verification = verify::verify_load(
            self.store.as_ref(),
            &table,
            &decoded.table,
            self.config.verify_sample_rows,
        )
        .map_err(fail(Stage::Verifying))?;

        info!(
            "✓ Loaded {path:?} into '{table}' ({} row(s), encoding {})",
            decoded.table.row_count(),
            decoded.encoding
        );
        Ok(IngestSuccess {
            path: path.display().to_string(),
            table,
            rows: decoded.table.row_count(),
            columns: decoded.table.column_count(),
            encoding: decoded.encoding,
            guess,
            candidates_tried: decoded.attempts,
            chunk_size,
            load,
            verification,
            finished_at: Local::now(),
        })
    }

    fn detect(&self, file: &SourceFile) -> std::result::Result<Option<EncodingGuess>, IngestError> {
        if file.kind == FileKind::Spreadsheet {
            debug!("{:?}: spreadsheet, encoding detection not needed", file.path);
            return Ok(None);
        }
        let sample = io_utils::read_sample(&file.path, self.config.encoding.sample_size).map_err(
            |source| IngestError::Io {
                path: file.path.clone(),
                source,
            },
        )?;
        let guess = self.detector.detect(&sample);
        match &guess {
            Some(guess) => info!(
                "Detected {} for {:?} (confidence {:.2})",
                guess.name, file.path, guess.confidence
            ),
            None => info!(
                "No encoding guess for {:?}; using fallback list",
                file.path
            ),
        }
        Ok(guess)
    }
}

fn enter(path: &Path, stage: Stage) {
    debug!("{path:?}: entering {stage}");
}
