use std::path::Path;

use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};

use crate::{error::ParseError, table::ParsedTable};

/// Reads one worksheet as text, the first row becoming the column names.
/// Uses `sheet` when given, otherwise the first worksheet in the workbook.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<ParsedTable> {
    let mut workbook =
        open_workbook_auto(path).with_context(|| format!("Opening workbook {path:?}"))?;
    let range = match sheet {
        Some(name) => workbook
            .worksheet_range(name)
            .with_context(|| format!("Reading worksheet '{name}'"))?,
        None => workbook
            .worksheet_range_at(0)
            .ok_or_else(|| anyhow!("Workbook {path:?} has no worksheets"))?
            .context("Reading first worksheet")?,
    };

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(cell_text).collect::<Vec<_>>());
    let columns = rows.next().unwrap_or_default();
    if columns.is_empty() {
        return Err(ParseError::NoColumns).context("Worksheet is empty");
    }
    Ok(ParsedTable::new(columns, rows.collect())?)
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        // Whole numbers stored as floats render without a trailing ".0".
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        other => other.to_string(),
    }
}
