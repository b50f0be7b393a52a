use std::borrow::Cow;
use std::fmt::Write as _;

use crate::error::ParseError;

/// Decoded tabular content: a header row plus text rows of equal width.
///
/// Column names are kept exactly as read, duplicates included. Values are
/// never coerced; every cell is the text the source held.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTable {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl ParsedTable {
    /// Builds a table, padding short rows with empty values. A row wider than
    /// the header is rejected; `row` in the error counts data rows from 1.
    pub fn new(columns: Vec<String>, mut rows: Vec<Vec<String>>) -> Result<Self, ParseError> {
        let width = columns.len();
        for (idx, row) in rows.iter_mut().enumerate() {
            if row.len() > width {
                return Err(ParseError::RowTooLong {
                    row: idx + 1,
                    found: row.len(),
                    expected: width,
                });
            }
            row.resize(width, String::new());
        }
        Ok(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let column_count = headers.len();
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();

    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(column_count) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    for width in &mut widths {
        *width = (*width).max(1);
    }

    let mut output = String::new();

    let header_line = format_row(headers, &widths);
    let _ = writeln!(output, "{header_line}");

    let separator_widths = widths.iter().map(|w| (*w).max(3)).collect::<Vec<usize>>();
    let separator_cells = separator_widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>();
    let separator_line = format_row(&separator_cells, &separator_widths);
    let _ = writeln!(output, "{separator_line}");

    for row in rows {
        let row_line = format_row(row, &widths);
        let _ = writeln!(output, "{row_line}");
    }

    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    let rendered = render_table(headers, rows);
    print!("{rendered}");
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut cells = Vec::with_capacity(values.len());
    for (idx, value) in values.iter().enumerate() {
        if idx >= widths.len() {
            break;
        }
        let sanitized = sanitize_cell(value);
        let display = display_width(sanitized.as_ref());
        let mut cell = sanitized.into_owned();
        let padding = widths[idx].saturating_sub(display);
        if padding > 0 {
            cell.push_str(&" ".repeat(padding));
        }
        cells.push(cell);
    }
    let mut line = cells.join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

// Full-width characters (CJK, kana, full-width forms) occupy two terminal cells.
fn display_width(value: &str) -> usize {
    value
        .chars()
        .map(|ch| match ch as u32 {
            0x1100..=0x115F | 0x2E80..=0xA4CF | 0xAC00..=0xD7A3 | 0xF900..=0xFAFF
            | 0xFE30..=0xFE4F | 0xFF00..=0xFF60 | 0xFFE0..=0xFFE6 => 2,
            _ => 1,
        })
        .sum()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn new_pads_short_rows() {
        let table = ParsedTable::new(
            strings(&["a", "b"]),
            vec![strings(&["1"]), strings(&["1", "2"])],
        )
        .expect("short rows are padded");
        assert!(table.rows().iter().all(|row| row.len() == 2));
        assert_eq!(table.rows()[0][1], "");
    }

    #[test]
    fn new_rejects_long_rows() {
        let err = ParsedTable::new(
            strings(&["a", "b"]),
            vec![strings(&["1", "2"]), strings(&["1", "2", "3"])],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ParseError::RowTooLong {
                row: 2,
                found: 3,
                expected: 2
            }
        ));
    }

    #[test]
    fn render_aligns_wide_characters() {
        let rendered = render_table(
            &strings(&["品名", "qty"]),
            &[strings(&["ab", "1"]), strings(&["line\nbreak", "2"])],
        );
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines[0], "品名        qty");
        assert_eq!(lines[2], "ab          1");
        assert_eq!(lines[3], "line break  2");
    }
}
