mod common;

use common::TestWorkspace;
use tabload::{
    config::SourcePattern,
    decode::SPREADSHEET_ENCODING,
    error::IngestError,
    pipeline::{Pipeline, RunOptions, Stage},
};

const SUMMARY: &[&[&str]] = &[
    &["code", "品名", "qty"],
    &["A1", "ボルト", "3"],
    &["B2", "", "4.5"],
];
const DETAIL: &[&[&str]] = &[&["plant", "count"], &["東京", "12"]];
const BLANK: &[&[&str]] = &[];

fn stock_workbook(ws: &TestWorkspace) -> std::path::PathBuf {
    ws.write_workbook("stock.xlsx", &[("Summary", SUMMARY), ("Detail", DETAIL)])
}

fn column_names(report: &tabload::verify::VerificationReport) -> Vec<&str> {
    report.columns.iter().map(|c| c.name.as_str()).collect()
}

#[test]
fn first_sheet_loads_by_default_with_header_from_row_one() {
    let ws = TestWorkspace::new();
    let path = stock_workbook(&ws);
    let done = Pipeline::new(ws.config())
        .expect("pipeline")
        .run(&path, &RunOptions::default())
        .expect("ingest workbook");

    assert_eq!(done.table, "stock");
    assert_eq!(done.encoding, SPREADSHEET_ENCODING);
    assert_eq!(done.candidates_tried, 1);
    assert!(done.guess.is_none());
    assert_eq!(done.rows, 2);
    assert_eq!(column_names(&done.verification), ["code", "品名", "qty"]);
    assert_eq!(done.verification.sample[0], ["A1", "ボルト", "3"]);
    assert_eq!(done.verification.sample[1], ["B2", "", "4.5"]);
}

#[test]
fn sheet_option_selects_the_named_worksheet() {
    let ws = TestWorkspace::new();
    let path = stock_workbook(&ws);
    let options = RunOptions {
        table: None,
        sheet: Some("Detail".to_string()),
    };
    let done = Pipeline::new(ws.config())
        .expect("pipeline")
        .run(&path, &options)
        .expect("ingest detail sheet");

    assert_eq!(column_names(&done.verification), ["plant", "count"]);
    assert_eq!(done.verification.sample, [["東京", "12"]]);
}

#[test]
fn source_pattern_sheet_and_table_apply() {
    let ws = TestWorkspace::new();
    let sheets = [("Summary", SUMMARY), ("Detail", DETAIL)];
    let path = ws.write_workbook("monthly_2024-05.xlsx", &sheets);
    let mut config = ws.config();
    config.sources.push(SourcePattern {
        name: "MONTHLY".to_string(),
        pattern: "monthly_*.xlsx".to_string(),
        table: "monthly_detail".to_string(),
        encoding: None,
        sheet: Some("Detail".to_string()),
    });
    let done = Pipeline::new(config)
        .expect("pipeline")
        .run(&path, &RunOptions::default())
        .expect("ingest");

    assert_eq!(done.table, "monthly_detail");
    assert_eq!(done.verification.row_count, 1);
    assert_eq!(column_names(&done.verification), ["plant", "count"]);
}

#[test]
fn missing_sheet_fails_in_decoding() {
    let ws = TestWorkspace::new();
    let path = stock_workbook(&ws);
    let options = RunOptions {
        table: None,
        sheet: Some("Nope".to_string()),
    };
    let failed = Pipeline::new(ws.config())
        .expect("pipeline")
        .run(&path, &options)
        .unwrap_err();
    assert_eq!(failed.stage, Stage::Decoding);
}

#[test]
fn empty_worksheet_is_exhausted_without_loading() {
    let ws = TestWorkspace::new();
    let path = ws.write_workbook("blank.xlsx", &[("Sheet1", BLANK)]);
    let failed = Pipeline::new(ws.config())
        .expect("pipeline")
        .run(&path, &RunOptions::default())
        .unwrap_err();

    assert_eq!(failed.stage, Stage::Decoding);
    match &failed.source {
        IngestError::EncodingExhausted { attempts, .. } => {
            assert_eq!(attempts.len(), 1);
            assert_eq!(attempts[0].candidate, SPREADSHEET_ENCODING);
            assert!(attempts[0].reason.contains("Worksheet is empty"));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}
