//! I/O utilities for source classification, sampling, encoding resolution and
//! delimited parsing.
//!
//! All byte-level file access in tabload flows through this module:
//!
//! - **Classification**: [`SourceFile::inspect`] checks existence and maps the
//!   extension to a [`FileKind`] before anything is decoded.
//! - **Sampling**: [`read_sample`] reads a bounded head of a file for detection.
//! - **Encoding**: [`resolve_candidate`] turns a candidate name into an
//!   `encoding_rs` decoder, and [`decode_strict`] refuses malformed input
//!   instead of substituting replacement characters.
//! - **Parsing**: [`parse_delimited`] reads decoded text into a [`ParsedTable`].
//!   Short records are padded to the header's width; longer ones are an error.

use std::{
    borrow::Cow,
    fs::File,
    io::{self, Read},
    path::{Path, PathBuf},
};

use encoding_rs::{Encoding, SHIFT_JIS, UTF_8, UTF_16BE, UTF_16LE};

use crate::{
    error::{IngestError, ParseError, Result},
    table::ParsedTable,
};

pub const TAB_DELIMITER: u8 = b'\t';
pub const COMMA_DELIMITER: u8 = b',';

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// `.txt`, tab- or comma-separated.
    DelimitedText,
    /// `.csv`
    CommaSeparated,
    /// `.xlsx` / `.xls`
    Spreadsheet,
}

impl FileKind {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" => Some(FileKind::DelimitedText),
            "csv" => Some(FileKind::CommaSeparated),
            "xlsx" | "xls" => Some(FileKind::Spreadsheet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub kind: FileKind,
}

impl SourceFile {
    pub fn inspect(path: &Path) -> Result<Self> {
        let metadata = match path.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => return Err(IngestError::FileNotFound(path.to_path_buf())),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(IngestError::FileNotFound(path.to_path_buf()));
            }
            Err(source) => {
                return Err(IngestError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let kind =
            FileKind::from_extension(extension).ok_or_else(|| IngestError::UnsupportedFileType {
                path: path.to_path_buf(),
                extension: extension.to_string(),
            })?;
        Ok(Self {
            path: path.to_path_buf(),
            size_bytes: metadata.len(),
            kind,
        })
    }

    pub fn size_mb(&self) -> f64 {
        self.size_bytes as f64 / BYTES_PER_MB
    }

    pub fn read_all(&self) -> Result<Vec<u8>> {
        std::fs::read(&self.path).map_err(|source| IngestError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

/// Reads at most `limit` bytes from the head of `path`.
pub fn read_sample(path: &Path, limit: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut sample = Vec::with_capacity(limit.min(64 * 1024));
    file.take(limit as u64).read_to_end(&mut sample)?;
    Ok(sample)
}

/// Table name derived from a file's stem: lower-cased, `-` and ` ` become `_`.
pub fn derive_table_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default()
        .to_lowercase()
        .replace(['-', ' '], "_")
}

/// A candidate name resolved to a concrete decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandidateEncoding {
    pub encoding: &'static Encoding,
    /// Drop a leading byte-order mark of this encoding before decoding.
    pub strip_bom: bool,
}

/// Maps a candidate name to a decoder. Returns `None` for names `encoding_rs`
/// does not know, which the decoder treats as a failed candidate.
pub fn resolve_candidate(label: &str) -> Option<CandidateEncoding> {
    let normalized = label.trim().to_ascii_lowercase();
    let strict = |encoding| CandidateEncoding {
        encoding,
        strip_bom: false,
    };
    match normalized.as_str() {
        "utf-8-sig" | "utf_8_sig" | "utf8-sig" => {
            return Some(CandidateEncoding {
                encoding: UTF_8,
                strip_bom: true,
            });
        }
        // encoding_rs maps "ascii" to windows-1252, which accepts every byte.
        "ascii" | "us-ascii" => return Some(strict(UTF_8)),
        "cp932" | "ms932" => return Some(strict(SHIFT_JIS)),
        _ => {}
    }
    let encoding = Encoding::for_label(normalized.as_bytes())
        .or_else(|| Encoding::for_label(normalized.replace('_', "-").as_bytes()))?;
    Some(CandidateEncoding {
        encoding,
        strip_bom: encoding == UTF_16LE || encoding == UTF_16BE,
    })
}

/// Decodes `bytes` without replacement characters; malformed input is an error.
pub fn decode_strict<'a>(
    bytes: &'a [u8],
    candidate: CandidateEncoding,
) -> std::result::Result<Cow<'a, str>, String> {
    let body = if candidate.strip_bom {
        match Encoding::for_bom(bytes) {
            Some((encoding, bom_len)) if encoding == candidate.encoding => &bytes[bom_len..],
            _ => bytes,
        }
    } else {
        bytes
    };
    candidate
        .encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| format!("invalid byte sequence for {}", candidate.encoding.name()))
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

/// Parses decoded text with the first record as the header row. Input with
/// no header fields at all (an empty file) is a parse failure.
pub fn parse_delimited(text: &str, delimiter: u8) -> std::result::Result<ParsedTable, ParseError> {
    let mut reader = open_csv_reader(text.as_bytes(), delimiter);
    let columns = reader
        .headers()?
        .iter()
        .map(str::to_string)
        .collect::<Vec<_>>();
    if columns.is_empty() {
        return Err(ParseError::NoColumns);
    }
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    ParsedTable::new(columns, rows)
}

pub fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        other => (other as char).to_string(),
    }
}
