//! Integration tests for expense analysis.
//!
//! These tests drive a session end to end over the CSV fixtures: load,
//! filter, aggregate, chart, report and export.

use expense_analysis::charts::RasterImage;
use expense_analysis::{
    AnalysisSession, ChartId, ChartRasterizer, ChartSpec, ExpenseResult, FilterSelection,
    LoaderConfig, MetadataRow, Orientation, PageSize, ReportOptions, SessionStage,
};
use chrono::NaiveDate;
use polars::prelude::*;
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Returns a small grey image for every chart so reports never depend on
/// system fonts.
struct FlatRasterizer;

impl ChartRasterizer for FlatRasterizer {
    fn rasterize(&self, _: &ChartSpec, width: u32, height: u32) -> ExpenseResult<RasterImage> {
        let (width, height) = (width.min(16), height.min(10));
        Ok(RasterImage {
            width,
            height,
            rgb: vec![200; (width * height * 3) as usize],
        })
    }
}

fn loaded_session(fixture: &str) -> AnalysisSession {
    let mut session = AnalysisSession::builder()
        .rasterizer(Arc::new(FlatRasterizer))
        .build()
        .expect("session should build");
    session
        .load_path(fixtures_path().join(fixture))
        .expect("fixture should load");
    session
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

fn read_export(path: PathBuf) -> DataFrame {
    CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path))
        .expect("Failed to create CSV reader")
        .finish()
        .expect("Failed to read CSV file")
}

// ============================================================================
// Loading
// ============================================================================

#[test]
fn test_load_cleans_and_drops_rows() {
    let session = loaded_session("expenses.csv");
    let summary = session.load_summary().unwrap();

    assert_eq!(summary.rows_read, 9);
    assert_eq!(summary.rows_dropped, 2);
    assert!(!summary.metadata_row_skipped);

    let table = session.raw_table().unwrap();
    assert_eq!(table.len(), 7);
    assert!(close(table.total_cost(), 1965.5));
    assert_eq!(table.extra_columns, vec!["Notes".to_string()]);
    assert!(table.records.iter().any(|r| r.region == "Unspecified"));
}

#[test]
fn test_metadata_row_is_skipped() {
    let session = loaded_session("expenses_with_metadata.csv");
    let summary = session.load_summary().unwrap();

    assert!(summary.metadata_row_skipped);
    assert_eq!(summary.columns[0], "Date");
    assert_eq!(session.raw_table().unwrap().len(), 3);
}

#[test]
fn test_forced_absent_metadata_row_fails() {
    let mut session = AnalysisSession::builder()
        .loader_config(
            LoaderConfig::builder()
                .metadata_row(MetadataRow::Absent)
                .build()
                .unwrap(),
        )
        .build()
        .unwrap();

    let result = session.load_path(fixtures_path().join("expenses_with_metadata.csv"));
    assert!(result.is_err());
    assert!(!session.is_loaded());
}

#[test]
fn test_missing_columns_are_reported() {
    let mut session = AnalysisSession::builder().build().unwrap();
    let err = session
        .load_path(fixtures_path().join("missing_columns.csv"))
        .unwrap_err();

    assert_eq!(err.error_code(), "SCHEMA_ERROR");
    assert_eq!(
        err.missing_columns().unwrap(),
        &["Client Name", "Cost", "Payment Type"]
    );
    assert!(err.to_string().contains("Amount"));
    assert!(!session.is_loaded());
}

#[test]
fn test_missing_file_is_io_error() {
    let mut session = AnalysisSession::builder().build().unwrap();
    let err = session
        .load_path(fixtures_path().join("does_not_exist.csv"))
        .unwrap_err();
    assert_eq!(err.error_code(), "IO_ERROR");
}

// ============================================================================
// Aggregation properties
// ============================================================================

#[test]
fn test_totals_are_conserved_across_dimensions() {
    let session = loaded_session("expenses.csv");
    let summaries = session.summaries().unwrap();
    let total = summaries.kpis.total_cost;

    let by_region: f64 = summaries.regions.iter().map(|s| s.total_cost).sum();
    let by_trainer: f64 = summaries.trainers.iter().map(|s| s.total_cost).sum();
    let by_client: f64 = summaries.clients.iter().map(|s| s.total_cost).sum();
    let by_payment: f64 = summaries.payments.iter().map(|s| s.total_cost).sum();

    assert!(close(total, 1965.5));
    assert!(close(by_region, total));
    assert!(close(by_trainer, total));
    assert!(close(by_client, total));
    assert!(close(by_payment, total));
}

#[test]
fn test_region_equals_sum_of_its_clients() {
    let session = loaded_session("expenses.csv");
    let summaries = session.summaries().unwrap();

    let mut client_totals: BTreeMap<&str, f64> = BTreeMap::new();
    for client in &summaries.clients {
        *client_totals.entry(client.region.as_str()).or_default() += client.total_cost;
    }
    for region in &summaries.regions {
        assert!(close(region.total_cost, client_totals[region.label.as_str()]));
        assert!(close(
            region.average_cost,
            region.total_cost / region.session_count as f64
        ));
    }
}

#[test]
fn test_region_summary_values() {
    let session = loaded_session("expenses.csv");
    let regions = &session.summaries().unwrap().regions;

    let labels: Vec<&str> = regions.iter().map(|r| r.label.as_str()).collect();
    assert_eq!(labels, vec!["North", "East", "South", "Unspecified"]);

    let north = &regions[0];
    assert!(close(north.total_cost, 1350.0));
    assert_eq!(north.session_count, 2);
    assert_eq!(north.client_count, 2);
    assert!(close(north.average_cost, 675.0));
}

// ============================================================================
// Filtering
// ============================================================================

#[test]
fn test_empty_selection_is_identity() {
    let mut session = loaded_session("expenses.csv");
    let before = session.summaries().unwrap().clone();
    session.apply_filters(FilterSelection::all()).unwrap();

    assert_eq!(session.summaries().unwrap(), &before);
    assert_eq!(session.filtered_table().unwrap(), session.raw_table().unwrap());
}

#[test]
fn test_filters_combine() {
    let mut session = loaded_session("expenses.csv");
    let summaries = session
        .apply_filters(
            FilterSelection::all()
                .with_date_range(date(1), date(9))
                .with_trainers(["Asha"]),
        )
        .unwrap();

    assert!(close(summaries.kpis.total_cost, 350.0));
    assert_eq!(summaries.kpis.session_count, 2);
    assert_eq!(session.raw_table().unwrap().len(), 7);
}

#[test]
fn test_filter_options_cascade() {
    let session = loaded_session("expenses.csv");
    let selection = FilterSelection::all().with_regions(["North"]);
    let options = session.filter_options(&selection).unwrap();

    assert_eq!(options.date_bounds, Some((date(1), date(20))));
    assert_eq!(options.regions.len(), 4);
    assert_eq!(options.clients, vec!["Acme", "Birla"]);
    assert_eq!(options.trainers, vec!["Asha", "Ravi"]);
}

// ============================================================================
// Charts
// ============================================================================

#[test]
fn test_charts_are_deterministic() {
    let mut session = loaded_session("expenses.csv");
    let first = session.charts().unwrap().clone();
    session.apply_filters(FilterSelection::all()).unwrap();

    assert_eq!(session.charts().unwrap(), &first);
    assert_eq!(first.len(), ChartId::ALL.len());
}

// ============================================================================
// Report
// ============================================================================

#[test]
fn test_report_end_to_end() {
    let session = loaded_session("expenses.csv");
    let document = session.generate_report(&ReportOptions::default()).unwrap();

    assert!(document.bytes.starts_with(b"%PDF"));
    assert!(document.file_name.starts_with("expense_report_"));
    assert!(document.file_name.ends_with(".pdf"));
    assert!(document.page_count >= 2);
    assert!(document.omitted_charts.is_empty());
}

#[test]
fn test_report_landscape_letter_without_cover() {
    let session = loaded_session("expenses.csv");
    let options = ReportOptions::builder()
        .page_size(PageSize::Letter)
        .orientation(Orientation::Landscape)
        .include_cover(false)
        .build()
        .unwrap();
    let document = session.generate_report(&options).unwrap();
    assert!(document.bytes.starts_with(b"%PDF"));
}

#[test]
fn test_unknown_page_size_falls_back_to_a4() {
    let options: ReportOptions =
        serde_json::from_str(r#"{"page_size": "B5", "include_cover": false}"#).unwrap();
    assert_eq!(options.page_size, PageSize::A4);

    let session = loaded_session("expenses.csv");
    assert!(session.generate_report(&options).is_ok());
}

// ============================================================================
// Exports
// ============================================================================

#[test]
fn test_csv_export_to_directory() {
    let session = loaded_session("expenses.csv");
    let dir = tempfile::tempdir().unwrap();
    let written = session.export_csv(dir.path()).unwrap();
    assert_eq!(written.len(), 5);

    let regions = read_export(dir.path().join("region_summary.csv"));
    assert_eq!(regions.height(), 4);
    let first_region = regions.column("Region").unwrap().str().unwrap().get(0);
    assert_eq!(first_region, Some("North"));

    let filtered = read_export(dir.path().join("filtered_data.csv"));
    assert_eq!(filtered.height(), 7);
    assert!(filtered.column("Session_ID").is_ok());
    assert!(filtered.column("Notes").is_ok());

    let pivot = read_export(dir.path().join("payment_by_trainer.csv"));
    let last_trainer = pivot
        .column("Name of Trainer")
        .unwrap()
        .str()
        .unwrap()
        .get(pivot.height() - 1);
    assert_eq!(last_trainer, Some("Grand Total"));
}

#[test]
fn test_exports_follow_filters() {
    let mut session = loaded_session("expenses.csv");
    session
        .apply_filters(FilterSelection::all().with_regions(["South"]))
        .unwrap();

    let exports = session.csv_exports().unwrap();
    let filtered = exports
        .iter()
        .find(|e| e.file_name == "filtered_data.csv")
        .unwrap()
        .text();
    assert_eq!(filtered.lines().count(), 3);
    assert!(!filtered.contains("North"));
}

// ============================================================================
// Progress
// ============================================================================

#[test]
fn test_progress_reports_each_stage() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let mut session = AnalysisSession::builder()
        .rasterizer(Arc::new(FlatRasterizer))
        .on_progress(move |update| sink.lock().unwrap().push(update.stage))
        .build()
        .unwrap();

    session
        .load_path(fixtures_path().join("expenses.csv"))
        .unwrap();
    session.generate_report(&ReportOptions::default()).unwrap();

    let stages = stages.lock().unwrap();
    for stage in [
        SessionStage::Loading,
        SessionStage::Filtering,
        SessionStage::Aggregating,
        SessionStage::Charting,
        SessionStage::ReportAssembly,
    ] {
        assert!(stages.contains(&stage), "missing {:?}", stage);
    }
    assert_eq!(stages.last(), Some(&SessionStage::Complete));
}

#[test]
fn test_failed_load_reports_failure() {
    let stages = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&stages);
    let mut session = AnalysisSession::builder()
        .on_progress(move |update| sink.lock().unwrap().push(update.stage))
        .build()
        .unwrap();

    assert!(session
        .load_path(fixtures_path().join("missing_columns.csv"))
        .is_err());
    assert_eq!(stages.lock().unwrap().last(), Some(&SessionStage::Failed));
}
