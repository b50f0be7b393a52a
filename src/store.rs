//! Relational store access for the bulk loader.
//!
//! [`TableStore`] is the seam between the pipeline and the database: one call
//! replaces a table wholesale, another reads it back. [`SqliteStore`] is the
//! embedded implementation. It holds no connection between calls; every unit
//! of work opens its own connection, applies the per-connection pragmas and
//! drops it when done.

use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use rusqlite::{Connection, params, params_from_iter, types::ValueRef};
use serde::Serialize;

use crate::{
    config::{CompositeIndex, Pragmas, StoreSettings},
    error::StoreError,
    table::ParsedTable,
};

pub const COLUMN_TYPE: &str = "TEXT";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadResult {
    pub rows_written: usize,
    pub columns_written: usize,
    pub chunks: usize,
    pub indexes_created: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub declared_type: String,
}

/// Result of a verification read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSnapshot {
    pub table: String,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
    pub sample: Vec<Vec<String>>,
}

impl TableSnapshot {
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

pub trait TableStore {
    /// Replaces `table` with `data` in one transaction, inserting `chunk_size`
    /// rows per batch. On error the previous table is left as it was.
    fn replace_table(
        &self,
        table: &str,
        data: &ParsedTable,
        chunk_size: usize,
    ) -> Result<LoadResult, StoreError>;

    /// Row count, column metadata and the first `sample_rows` rows of `table`.
    fn snapshot(&self, table: &str, sample_rows: usize) -> Result<TableSnapshot, StoreError>;
}

/// Column names as the store will hold them. Empty names become
/// `Unnamed: <index>` and repeats get a `.<n>` suffix, so `a, a, a` is stored
/// as `a, a.1, a.2`.
pub fn store_column_names(columns: &[String]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(columns.len());
    for (idx, raw) in columns.iter().enumerate() {
        let base = if raw.trim().is_empty() {
            format!("Unnamed: {idx}")
        } else {
            raw.clone()
        };
        let mut candidate = base.clone();
        let mut suffix = 1;
        while names.iter().any(|n| n.eq_ignore_ascii_case(&candidate)) {
            candidate = format!("{base}.{suffix}");
            suffix += 1;
        }
        names.push(candidate);
    }
    names
}

pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn validate_table_name(table: &str) -> Result<(), StoreError> {
    if table.trim().is_empty()
        || table.contains('\0')
        || table.to_ascii_lowercase().starts_with("sqlite_")
    {
        return Err(StoreError::InvalidTableName(table.to_string()));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: PathBuf,
    pragmas: Pragmas,
    index_columns: Vec<String>,
    composite_indexes: Vec<CompositeIndex>,
}

impl SqliteStore {
    /// Prepares the database file: creates its directory and applies the
    /// persistent pragmas (`page_size`, then `journal_mode`).
    pub fn open(path: &Path, settings: &StoreSettings) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let store = Self {
            path: path.to_path_buf(),
            pragmas: settings.pragmas.clone(),
            index_columns: settings.auto_index_columns.clone(),
            composite_indexes: settings.composite_indexes.clone(),
        };
        let conn = Connection::open(&store.path)?;
        apply_pragma(&conn, "page_size", &store.pragmas.page_size.to_string())?;
        apply_pragma(&conn, "journal_mode", &store.pragmas.journal_mode)?;
        debug!("Prepared SQLite store at {:?}", store.path);
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.path)?;
        apply_pragma(&conn, "synchronous", &self.pragmas.synchronous)?;
        apply_pragma(&conn, "cache_size", &self.pragmas.cache_size.to_string())?;
        apply_pragma(&conn, "mmap_size", &self.pragmas.mmap_size.to_string())?;
        apply_pragma(&conn, "temp_store", &self.pragmas.temp_store)?;
        Ok(conn)
    }

    fn planned_indexes(&self, table: &str, columns: &[String]) -> Vec<(String, Vec<String>)> {
        let has = |name: &str| columns.iter().any(|c| c == name);
        let singles = self
            .index_columns
            .iter()
            .filter(|column| has(column))
            .map(|column| (format!("idx_{table}_{column}"), vec![column.clone()]));
        let composites = self
            .composite_indexes
            .iter()
            .filter(|index| !index.columns.is_empty() && index.columns.iter().all(|c| has(c)))
            .map(|index| (format!("{}_{table}", index.name), index.columns.clone()));
        singles.chain(composites).collect()
    }
}

// Pragma values are interpolated, so only plain words and numbers are accepted.
fn apply_pragma(conn: &Connection, name: &str, value: &str) -> Result<(), StoreError> {
    if value.is_empty()
        || !value
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
    {
        return Err(StoreError::InvalidPragma(format!("{name} = {value}")));
    }
    let mut stmt = conn.prepare(&format!("PRAGMA {name} = {value}"))?;
    let mut rows = stmt.query([])?;
    if let Some(row) = rows.next()? {
        let effective: rusqlite::types::Value = row.get(0)?;
        debug!("PRAGMA {name} = {value} -> {effective:?}");
    }
    Ok(())
}

impl TableStore for SqliteStore {
    fn replace_table(
        &self,
        table: &str,
        data: &ParsedTable,
        chunk_size: usize,
    ) -> Result<LoadResult, StoreError> {
        validate_table_name(table)?;
        let columns = store_column_names(data.columns());
        if columns.is_empty() {
            return Err(StoreError::NoColumns(table.to_string()));
        }
        let quoted_table = quote_identifier(table);
        let column_defs = columns
            .iter()
            .map(|c| format!("{} {COLUMN_TYPE}", quote_identifier(c)))
            .collect::<Vec<_>>()
            .join(", ");
        let placeholders = vec!["?"; columns.len()].join(", ");
        let chunk_size = chunk_size.max(1);

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(&format!("DROP TABLE IF EXISTS {quoted_table}"), [])?;
        tx.execute(&format!("CREATE TABLE {quoted_table} ({column_defs})"), [])?;

        let mut chunks = 0usize;
        let mut written = 0usize;
        {
            let mut insert =
                tx.prepare(&format!("INSERT INTO {quoted_table} VALUES ({placeholders})"))?;
            for chunk in data.rows().chunks(chunk_size) {
                for row in chunk {
                    insert.execute(params_from_iter(row.iter()))?;
                }
                chunks += 1;
                written += chunk.len();
                debug!(
                    "Table '{table}': batch {chunks} written ({written}/{} rows)",
                    data.row_count()
                );
            }
        }

        let mut indexes_created = Vec::new();
        for (name, index_columns) in self.planned_indexes(table, &columns) {
            let column_list = index_columns
                .iter()
                .map(|c| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            tx.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {quoted_table} ({column_list})",
                    quote_identifier(&name)
                ),
                [],
            )?;
            indexes_created.push(name);
        }
        tx.commit()?;

        info!(
            "Replaced table '{table}' with {written} row(s) x {} column(s) in {chunks} batch(es)",
            columns.len()
        );
        Ok(LoadResult {
            rows_written: written,
            columns_written: columns.len(),
            chunks,
            indexes_created,
        })
    }

    fn snapshot(&self, table: &str, sample_rows: usize) -> Result<TableSnapshot, StoreError> {
        validate_table_name(table)?;
        let conn = self.connect()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            params![table],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(StoreError::MissingTable(table.to_string()));
        }
        let quoted_table = quote_identifier(table);

        let row_count: i64 =
            conn.query_row(&format!("SELECT COUNT(*) FROM {quoted_table}"), [], |row| {
                row.get(0)
            })?;

        let mut info = conn.prepare(&format!("PRAGMA table_info({quoted_table})"))?;
        let columns = info
            .query_map([], |row| {
                Ok(ColumnInfo {
                    name: row.get(1)?,
                    declared_type: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut select = conn.prepare(&format!("SELECT * FROM {quoted_table} LIMIT ?1"))?;
        let width = columns.len();
        let sample = select
            .query_map(params![sample_rows as i64], |row| {
                (0..width)
                    .map(|idx| row.get_ref(idx).map(value_text))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TableSnapshot {
            table: table.to_string(),
            row_count: usize::try_from(row_count).unwrap_or_default(),
            columns,
            sample,
        })
    }
}

fn value_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(bytes) => String::from_utf8_lossy(bytes).into_owned(),
        ValueRef::Blob(bytes) => format!("<{} byte blob>", bytes.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    fn sample_table(rows: usize) -> ParsedTable {
        ParsedTable::new(
            strings(&["item_code", "plant_code", "数量"]),
            (0..rows)
                .map(|i| vec![format!("I{i:03}"), "P1".to_string(), i.to_string()])
                .collect(),
        )
        .expect("table")
    }

    #[test]
    fn store_names_disambiguate_repeats_and_blanks() {
        let names = store_column_names(&strings(&["a", "", "a", "A", "a"]));
        assert_eq!(names, strings(&["a", "Unnamed: 1", "a.1", "A.2", "a.3"]));
    }

    #[test]
    fn quote_identifier_escapes_quotes() {
        assert_eq!(quote_identifier("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn replace_and_snapshot_round_trip() {
        let dir = tempdir().expect("temp dir");
        let store =
            SqliteStore::open(&dir.path().join("nested/db.sqlite"), &StoreSettings::default())
                .expect("open store");
        let result = store
            .replace_table("parts", &sample_table(25), 10)
            .expect("load");
        assert_eq!(result.rows_written, 25);
        assert_eq!(result.columns_written, 3);
        assert_eq!(result.chunks, 3);
        assert_eq!(
            result.indexes_created,
            strings(&[
                "idx_parts_item_code",
                "idx_parts_plant_code",
                "idx_item_plant_parts"
            ])
        );

        let snapshot = store.snapshot("parts", 3).expect("snapshot");
        assert_eq!(snapshot.row_count, 25);
        assert_eq!(snapshot.column_names(), strings(&["item_code", "plant_code", "数量"]));
        assert!(snapshot.columns.iter().all(|c| c.declared_type == COLUMN_TYPE));
        assert_eq!(snapshot.sample.len(), 3);
        assert_eq!(snapshot.sample[0], strings(&["I000", "P1", "0"]));
    }

    #[test]
    fn failed_write_keeps_previous_table() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("db.sqlite");
        let plain = SqliteStore::open(&path, &StoreSettings::default()).expect("open store");
        plain
            .replace_table("parts", &sample_table(4), 100)
            .expect("first load");
        plain
            .replace_table("clash_parts", &sample_table(1), 100)
            .expect("clash table");

        // The composite index name collides with an existing table after the
        // drop, create and inserts have already run.
        let mut settings = StoreSettings::default();
        settings.auto_index_columns.clear();
        settings.composite_indexes = vec![CompositeIndex::new("clash", &["item_code"])];
        let clashing = SqliteStore::open(&path, &settings).expect("reopen");
        let err = clashing
            .replace_table("parts", &sample_table(2), 100)
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)), "{err}");
        assert_eq!(plain.snapshot("parts", 1).expect("snapshot").row_count, 4);

        assert!(matches!(
            plain.replace_table("parts", &ParsedTable::default(), 100),
            Err(StoreError::NoColumns(_))
        ));
        assert_eq!(plain.snapshot("parts", 1).expect("snapshot").row_count, 4);
    }

    #[test]
    fn missing_table_and_bad_names() {
        let dir = tempdir().expect("temp dir");
        let store = SqliteStore::open(&dir.path().join("db.sqlite"), &StoreSettings::default())
            .expect("open store");
        assert!(matches!(
            store.snapshot("absent", 1),
            Err(StoreError::MissingTable(_))
        ));
        assert!(matches!(
            store.replace_table("sqlite_master", &sample_table(1), 10),
            Err(StoreError::InvalidTableName(_))
        ));
    }
}
