use log::{info, warn};
use serde::Serialize;

use crate::{
    error::IngestError,
    store::{ColumnInfo, TableSnapshot, TableStore, store_column_names},
    table::ParsedTable,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationReport {
    pub table: String,
    pub row_count: usize,
    pub columns: Vec<ColumnInfo>,
    pub sample: Vec<Vec<String>>,
}

impl From<TableSnapshot> for VerificationReport {
    fn from(snapshot: TableSnapshot) -> Self {
        Self {
            table: snapshot.table,
            row_count: snapshot.row_count,
            columns: snapshot.columns,
            sample: snapshot.sample,
        }
    }
}

/// Reads `table` back and checks it against what was loaded: the same row
/// count and the same store column names in the same order.
pub fn verify_load(
    store: &dyn TableStore,
    table: &str,
    expected: &ParsedTable,
    sample_rows: usize,
) -> Result<VerificationReport, IngestError> {
    let snapshot = store
        .snapshot(table, sample_rows)
        .map_err(|source| IngestError::Store {
            table: table.to_string(),
            source,
        })?;
    let mismatches = compare(&snapshot, expected);
    if !mismatches.is_empty() {
        for mismatch in &mismatches {
            warn!("Verification of '{table}': {mismatch}");
        }
        return Err(IngestError::StoreVerifyMismatch {
            table: table.to_string(),
            mismatches,
        });
    }
    info!(
        "✓ Verified '{table}': {} row(s), {} column(s)",
        snapshot.row_count,
        snapshot.columns.len()
    );
    Ok(snapshot.into())
}

pub fn compare(snapshot: &TableSnapshot, expected: &ParsedTable) -> Vec<String> {
    let mut mismatches = Vec::new();
    if snapshot.row_count != expected.row_count() {
        mismatches.push(format!(
            "row count {} != expected {}",
            snapshot.row_count,
            expected.row_count()
        ));
    }
    let expected_columns = store_column_names(expected.columns());
    let actual_columns = snapshot.column_names();
    if actual_columns != expected_columns {
        mismatches.push(format!(
            "columns {actual_columns:?} != expected {expected_columns:?}"
        ));
    }
    let expected_width = expected_columns.len();
    if let Some(row) = snapshot.sample.iter().find(|row| row.len() != expected_width) {
        mismatches.push(format!(
            "sample row has {} value(s), expected {expected_width}",
            row.len()
        ));
    }
    mismatches
}
