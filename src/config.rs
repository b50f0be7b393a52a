//! Pipeline configuration.
//!
//! Everything the pipeline treats as fixed policy lives in [`IngestConfig`]:
//! the fallback encoding list, detector sampling, chunk breakpoints, store
//! pragmas, automatic indexes and the source-pattern table that maps known
//! file names to target tables. The value is built once (defaults or YAML)
//! and handed to [`crate::pipeline::Pipeline::new`]; nothing here is global.

use std::{
    fs,
    path::{Path, PathBuf},
};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DATABASE: &str = "data/sqlite/unified_database.db";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IngestConfig {
    pub database: PathBuf,
    pub encoding: EncodingSettings,
    pub chunking: ChunkSettings,
    pub store: StoreSettings,
    /// Rows pulled back by the verification read.
    pub verify_sample_rows: usize,
    pub sources: Vec<SourcePattern>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE),
            encoding: EncodingSettings::default(),
            chunking: ChunkSettings::default(),
            store: StoreSettings::default(),
            verify_sample_rows: 5,
            sources: default_sources(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncodingSettings {
    pub fallback_encodings: Vec<String>,
    /// Bytes read from the head of a file for detection.
    pub sample_size: usize,
    /// Guesses below this confidence are not promoted ahead of the fallback list.
    pub min_confidence: f64,
}

impl Default for EncodingSettings {
    fn default() -> Self {
        Self {
            fallback_encodings: [
                "utf-8-sig",
                "utf-8",
                "shift_jis",
                "euc-jp",
                "cp932",
                "iso-2022-jp",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            sample_size: 10 * 1024,
            min_confidence: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkSettings {
    pub base_chunk_size: usize,
    pub large_chunk_size: usize,
    pub small_file_mb: f64,
    pub medium_file_mb: f64,
    pub max_workers: usize,
    /// Carried for an outer scheduler; ingestion itself never times out.
    pub timeout_seconds: u64,
    /// Carried for an outer scheduler; failed files are not retried here.
    pub max_retries: u32,
}

impl Default for ChunkSettings {
    fn default() -> Self {
        Self {
            base_chunk_size: 50_000,
            large_chunk_size: 100_000,
            small_file_mb: 10.0,
            medium_file_mb: 100.0,
            max_workers: 4,
            timeout_seconds: 300,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreSettings {
    pub pragmas: Pragmas,
    pub auto_index_columns: Vec<String>,
    pub composite_indexes: Vec<CompositeIndex>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            pragmas: Pragmas::default(),
            auto_index_columns: [
                "id",
                "date",
                "code",
                "item_code",
                "plant_code",
                "created_at",
                "updated_at",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            composite_indexes: vec![
                CompositeIndex::new("idx_date_plant", &["date", "plant_code"]),
                CompositeIndex::new("idx_item_plant", &["item_code", "plant_code"]),
                CompositeIndex::new("idx_timestamps", &["created_at", "updated_at"]),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Pragmas {
    pub journal_mode: String,
    pub synchronous: String,
    pub cache_size: i64,
    pub mmap_size: i64,
    pub temp_store: String,
    pub page_size: i64,
}

impl Default for Pragmas {
    fn default() -> Self {
        Self {
            journal_mode: "WAL".to_string(),
            synchronous: "NORMAL".to_string(),
            cache_size: 10_000,
            mmap_size: 268_435_456,
            temp_store: "MEMORY".to_string(),
            page_size: 4096,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompositeIndex {
    pub name: String,
    pub columns: Vec<String>,
}

impl CompositeIndex {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// A known source file: a file-name glob and where its rows should land.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourcePattern {
    pub name: String,
    pub pattern: String,
    pub table: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
}

fn source(
    name: &str,
    pattern: &str,
    table: &str,
    encoding: Option<&str>,
    sheet: Option<&str>,
) -> SourcePattern {
    SourcePattern {
        name: name.to_string(),
        pattern: pattern.to_string(),
        table: table.to_string(),
        encoding: encoding.map(String::from),
        sheet: sheet.map(String::from),
    }
}

fn default_sources() -> Vec<SourcePattern> {
    vec![
        source(
            "PLM",
            "GetPLMItmPlntInfo_*.txt",
            "plm_item_plant_info",
            Some("shift_jis"),
            None,
        ),
        source(
            "WBS",
            "GetSekkeiWBSJisseki.txt",
            "wbs_sekkei_jisseki",
            Some("shift_jis"),
            None,
        ),
        source("BOM", "MARA_DL.csv", "bom_mara_data", Some("shift_jis"), None),
        source(
            "PRODUCTION",
            "PP_DL_CSV_SEISAN_YOTEI.csv",
            "production_yotei",
            Some("shift_jis"),
            None,
        ),
        source(
            "INVENTORY",
            "dbo_提出用_経理_滞留在庫資料_通常.xlsx",
            "inventory_teiryu",
            None,
            Some("Sheet1"),
        ),
    ]
}

impl IngestConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let serialized = serde_yaml::to_string(self)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, serialized).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns human-readable problems; an empty list means the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut issues = Vec::new();
        if self.encoding.fallback_encodings.is_empty() {
            issues.push("encoding.fallback_encodings must not be empty".to_string());
        }
        if self.encoding.sample_size == 0 {
            issues.push("encoding.sample_size must be greater than zero".to_string());
        }
        if !(0.0..=1.0).contains(&self.encoding.min_confidence) {
            issues.push(format!(
                "encoding.min_confidence must be within [0, 1], got {}",
                self.encoding.min_confidence
            ));
        }
        let chunking = &self.chunking;
        if chunking.base_chunk_size == 0 {
            issues.push("chunking.base_chunk_size must be greater than zero".to_string());
        }
        if chunking.large_chunk_size < chunking.base_chunk_size {
            issues.push(format!(
                "chunking.large_chunk_size ({}) must not be smaller than base_chunk_size ({})",
                chunking.large_chunk_size, chunking.base_chunk_size
            ));
        }
        if chunking.small_file_mb > chunking.medium_file_mb {
            issues.push(format!(
                "chunking.small_file_mb ({}) must not exceed medium_file_mb ({})",
                chunking.small_file_mb, chunking.medium_file_mb
            ));
        }
        if chunking.max_workers == 0 {
            issues.push("chunking.max_workers must be at least 1".to_string());
        }
        for index in &self.store.composite_indexes {
            if index.columns.is_empty() {
                issues.push(format!("composite index '{}' has no columns", index.name));
            }
        }
        for source in &self.sources {
            if let Err(err) = Glob::new(&source.pattern) {
                issues.push(format!(
                    "source '{}' has an invalid pattern '{}': {err}",
                    source.name, source.pattern
                ));
            }
            if source.table.trim().is_empty() {
                issues.push(format!("source '{}' has an empty table name", source.name));
            }
        }
        issues
    }

    pub fn source_matcher(&self) -> Result<SourceMatcher, ConfigError> {
        SourceMatcher::new(&self.sources)
    }
}

/// Compiled source patterns, matched against a file's name (not its directory).
#[derive(Debug, Clone)]
pub struct SourceMatcher {
    set: GlobSet,
    sources: Vec<SourcePattern>,
}

impl SourceMatcher {
    pub fn new(sources: &[SourcePattern]) -> Result<Self, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for source in sources {
            let glob = Glob::new(&source.pattern).map_err(|err| ConfigError::InvalidPattern {
                pattern: source.pattern.clone(),
                source: err,
            })?;
            builder.add(glob);
        }
        let set = builder.build().map_err(|err| ConfigError::InvalidPattern {
            pattern: "<pattern set>".to_string(),
            source: err,
        })?;
        Ok(Self {
            set,
            sources: sources.to_vec(),
        })
    }

    /// First configured source whose pattern matches the file name.
    pub fn find(&self, path: &Path) -> Option<&SourcePattern> {
        let file_name = path.file_name()?;
        self.set
            .matches(file_name)
            .into_iter()
            .min()
            .and_then(|idx| self.sources.get(idx))
    }
}
