//! Candidate decoding: ordered fallback search over encodings and separators.
//!
//! [`first_success`] is the search itself, independent of files: it walks an
//! ordered candidate list, stops at the first attempt that succeeds, and
//! otherwise returns every failure in the order it happened.

use std::path::Path;

use itertools::Itertools;
use log::{debug, info};

use crate::{
    detect::EncodingGuess,
    error::{AttemptFailure, IngestError, Result},
    io_utils::{self, COMMA_DELIMITER, FileKind, SourceFile, TAB_DELIMITER},
    spreadsheet,
    table::ParsedTable,
};

/// Encoding label reported for spreadsheets, which carry their own encoding.
pub const SPREADSHEET_ENCODING: &str = "spreadsheet";

/// Ordered, de-duplicated candidate names. Never empty when built from a
/// non-empty fallback list.
///
/// A confident guess is prepended only when the fallback list does not already
/// name it; a configured hint always moves to the front of the fallback list.
pub fn candidate_list(
    guess: Option<&EncodingGuess>,
    min_confidence: f64,
    hint: Option<&str>,
    fallback: &[String],
) -> Vec<String> {
    let promoted = guess
        .filter(|guess| guess.confidence >= min_confidence)
        .map(|guess| guess.name.as_str())
        .filter(|name| !fallback.iter().any(|f| f.trim().eq_ignore_ascii_case(name.trim())));
    promoted
        .into_iter()
        .chain(hint)
        .chain(fallback.iter().map(String::as_str))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unique_by(|name| name.to_ascii_lowercase())
        .collect()
}

/// Outcome of an exhausted or successful ordered search.
#[derive(Debug)]
pub enum SearchOutcome<C, T> {
    Found {
        candidate: C,
        value: T,
        failures: Vec<AttemptFailure>,
    },
    Exhausted(Vec<AttemptFailure>),
}

/// Tries `attempt` on each candidate in order and returns the first success.
/// Candidates after the winner are never attempted.
pub fn first_success<C, T, F>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> SearchOutcome<C, T>
where
    C: AsRef<str>,
    F: FnMut(&C) -> std::result::Result<T, String>,
{
    let mut failures = Vec::new();
    for candidate in candidates {
        match attempt(&candidate) {
            Ok(value) => {
                return SearchOutcome::Found {
                    candidate,
                    value,
                    failures,
                };
            }
            Err(reason) => {
                debug!("Candidate '{}' failed: {reason}", candidate.as_ref());
                failures.push(AttemptFailure {
                    candidate: candidate.as_ref().to_string(),
                    reason,
                });
            }
        }
    }
    SearchOutcome::Exhausted(failures)
}

/// Parses decoded text according to the file kind.
///
/// `.txt` is read tab-separated first; a tab parse that fails or produces a
/// single column is redone comma-separated on the same text, and that result
/// stands. `.csv` is read comma-separated only.
pub fn parse_text(text: &str, kind: FileKind) -> std::result::Result<ParsedTable, String> {
    match kind {
        FileKind::CommaSeparated => {
            io_utils::parse_delimited(text, COMMA_DELIMITER).map_err(|err| err.to_string())
        }
        FileKind::DelimitedText => match io_utils::parse_delimited(text, TAB_DELIMITER) {
            Ok(table) if table.column_count() != 1 => Ok(table),
            first => {
                debug!(
                    "Tab-separated parse gave {}; retrying with '{}'",
                    match &first {
                        Ok(_) => "one column".to_string(),
                        Err(err) => err.to_string(),
                    },
                    io_utils::printable_delimiter(COMMA_DELIMITER)
                );
                io_utils::parse_delimited(text, COMMA_DELIMITER).map_err(|err| err.to_string())
            }
        },
        FileKind::Spreadsheet => Err("spreadsheets are not parsed from decoded text".to_string()),
    }
}

/// Decodes `bytes` with the named candidate and parses the text.
pub fn attempt_candidate(
    bytes: &[u8],
    kind: FileKind,
    candidate: &str,
) -> std::result::Result<ParsedTable, String> {
    let encoding = io_utils::resolve_candidate(candidate)
        .ok_or_else(|| format!("unsupported encoding '{candidate}'"))?;
    let text = io_utils::decode_strict(bytes, encoding)?;
    parse_text(&text, kind)
}

/// A successfully decoded file.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub table: ParsedTable,
    pub encoding: String,
    pub attempts: usize,
}

/// Reads `file` using the ordered candidates. Spreadsheets skip the encoding
/// search and are parsed once.
pub fn decode_file(
    file: &SourceFile,
    candidates: &[String],
    sheet: Option<&str>,
) -> Result<Decoded> {
    if file.kind == FileKind::Spreadsheet {
        return decode_spreadsheet(&file.path, sheet);
    }
    let bytes = file.read_all()?;
    match first_success(candidates, |candidate| {
        attempt_candidate(&bytes, file.kind, candidate)
    }) {
        SearchOutcome::Found {
            candidate,
            value,
            failures,
        } => {
            info!(
                "Decoded {:?} as {} after {} failed candidate(s)",
                file.path,
                candidate,
                failures.len()
            );
            Ok(Decoded {
                table: value,
                encoding: candidate.clone(),
                attempts: failures.len() + 1,
            })
        }
        SearchOutcome::Exhausted(attempts) => Err(IngestError::EncodingExhausted {
            path: file.path.clone(),
            attempts,
        }),
    }
}

fn decode_spreadsheet(path: &Path, sheet: Option<&str>) -> Result<Decoded> {
    match spreadsheet::read_sheet(path, sheet) {
        Ok(table) => Ok(Decoded {
            table,
            encoding: SPREADSHEET_ENCODING.to_string(),
            attempts: 1,
        }),
        Err(err) => Err(IngestError::EncodingExhausted {
            path: path.to_path_buf(),
            attempts: vec![AttemptFailure {
                candidate: SPREADSHEET_ENCODING.to_string(),
                reason: format!("{err:#}"),
            }],
        }),
    }
}
