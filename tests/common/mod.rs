#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use encoding_rs::Encoding;
use rust_xlsxwriter::Workbook;
use tempfile::{TempDir, tempdir};
use tabload::config::IngestConfig;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes UTF-8 `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        self.write_bytes(name, contents.as_bytes())
    }

    pub fn write_bytes(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes `contents` transcoded into `encoding`.
    pub fn write_encoded(&self, name: &str, contents: &str, encoding: &'static Encoding) -> PathBuf {
        let (encoded, _, had_errors) = encoding.encode(contents);
        assert!(!had_errors, "fixture not representable in {}", encoding.name());
        self.write_bytes(name, &encoded)
    }

    /// Writes an `.xlsx` workbook with one worksheet per `(name, rows)` pair.
    /// Cells that parse as numbers are stored as numbers, empty cells are skipped.
    pub fn write_workbook(&self, name: &str, sheets: &[(&str, &[&[&str]])]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let mut workbook = Workbook::new();
        for (sheet_name, rows) in sheets {
            let sheet = workbook.add_worksheet();
            sheet.set_name(*sheet_name).expect("sheet name");
            for (row_idx, row) in rows.iter().enumerate() {
                for (col_idx, cell) in row.iter().enumerate() {
                    let (row_num, col_num) = (row_idx as u32, col_idx as u16);
                    if cell.is_empty() {
                        continue;
                    }
                    let written = match cell.parse::<f64>() {
                        Ok(number) => sheet.write_number(row_num, col_num, number),
                        Err(_) => sheet.write_string(row_num, col_num, *cell),
                    };
                    written.expect("write cell");
                }
            }
        }
        workbook.save(&path).expect("save workbook");
        path
    }

    /// Default configuration pointed at a database inside the workspace.
    pub fn config(&self) -> IngestConfig {
        IngestConfig {
            database: self.path().join("db").join("test.db"),
            ..IngestConfig::default()
        }
    }
}

/// Tab-separated text with a header row and `rows` data rows.
pub fn tsv_with_rows(rows: usize) -> String {
    let mut text = String::from("id\titem_code\t品名\n");
    for i in 0..rows {
        text.push_str(&format!("{i}\tA{i:04}\t部品{i}\n"));
    }
    text
}
