//! Upload loading and cleaning.
//!
//! Reads a separator-delimited upload with polars (every column as string),
//! resolves the header row, checks the required columns and coerces each
//! row into an [`ExpenseRecord`]. Rows whose date or cost cannot be parsed
//! are dropped; only the count is reported.

pub mod converters;

use crate::config::{LoaderConfig, MetadataRow};
use crate::error::{ExpenseError, Result, ResultExt};
use crate::types::{
    COL_CLIENT, COL_COST, COL_DATE, COL_PAYMENT, COL_REGION, COL_TRAINER, ExpenseRecord,
    ExpenseTable, REQUIRED_COLUMNS,
};
use crate::utils::normalize_header;
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, info, warn};

pub use converters::{parse_cost, parse_day_first_date};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// What happened while loading an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadSummary {
    /// Data rows read below the header.
    pub rows_read: usize,
    /// Rows dropped for an unparseable date or cost.
    pub rows_dropped: usize,
    /// Whether a leading metadata line was skipped.
    pub metadata_row_skipped: bool,
    /// Normalized header names, in file order.
    pub columns: Vec<String>,
}

/// Cleaned table plus its load summary.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub table: ExpenseTable,
    pub summary: LoadSummary,
}

/// Reads and cleans expense uploads.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    config: LoaderConfig,
}

impl DataLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Load an upload from disk.
    pub fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadedData> {
        let path = path.as_ref();
        info!("Loading expense data from {}", path.display());
        let bytes = std::fs::read(path)?;
        self.load_bytes(&bytes)
            .context(format!("While loading {}", path.display()))
    }

    /// Load an upload held in memory.
    pub fn load_bytes(&self, bytes: &[u8]) -> Result<LoadedData> {
        self.config
            .validate()
            .map_err(|e| ExpenseError::InvalidConfig(e.to_string()))?;

        let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ExpenseError::NoData("the uploaded file is empty".to_string()));
        }

        let skip_first = self.should_skip_first_line(bytes);
        let body = if skip_first {
            match bytes.iter().position(|&b| b == b'\n') {
                Some(pos) => &bytes[pos + 1..],
                None => &[][..],
            }
        } else {
            bytes
        };

        if body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ExpenseError::NoData(
                "no header row found after the metadata line".to_string(),
            ));
        }

        let df = self.read_frame(body)?;
        let (table, mut summary) = clean_frame(&df)?;
        summary.metadata_row_skipped = skip_first;

        info!(
            "Loaded {} rows ({} dropped, {} extra columns)",
            table.len(),
            summary.rows_dropped,
            table.extra_columns.len()
        );

        Ok(LoadedData { table, summary })
    }

    fn should_skip_first_line(&self, bytes: &[u8]) -> bool {
        match self.config.metadata_row {
            MetadataRow::Skip => {
                debug!("Skipping first line (metadata row forced)");
                true
            }
            MetadataRow::Absent => false,
            MetadataRow::Auto => {
                let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
                let detected = detect_metadata_row(
                    first_line,
                    self.config.separator,
                    self.config.metadata_separator_run,
                );
                if detected {
                    info!(
                        "First line starts with {}+ separators, treating it as a metadata row",
                        self.config.metadata_separator_run
                    );
                }
                detected
            }
        }
    }

    fn read_frame(&self, body: &[u8]) -> Result<DataFrame> {
        debug!("Reading CSV body ({} bytes)", body.len());

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(0))
            .with_parse_options(
                CsvParseOptions::default()
                    .with_separator(self.config.separator)
                    .with_quote_char(Some(b'"'))
                    .with_truncate_ragged_lines(true),
            )
            .into_reader_with_file_handle(Cursor::new(body.to_vec()))
            .finish()
            .context("Failed to parse the uploaded file")
    }
}

/// True when `first_line` begins with at least `run` separators.
pub fn detect_metadata_row(first_line: &[u8], separator: u8, run: usize) -> bool {
    run > 0 && first_line.iter().take_while(|&&b| b == separator).count() >= run
}

/// Look up a required column by its normalized name. The first occurrence
/// wins when two headers normalize to the same name.
fn required_series<'a>(
    df: &'a DataFrame,
    raw_names: &[String],
    normalized: &[String],
    name: &str,
) -> Result<&'a Series> {
    let raw = normalized
        .iter()
        .position(|n| n == name)
        .map(|i| raw_names[i].as_str())
        .unwrap_or(name);
    Ok(df.column(raw)?.as_materialized_series())
}

/// Validate the header and coerce the frame into records.
pub(crate) fn clean_frame(df: &DataFrame) -> Result<(ExpenseTable, LoadSummary)> {
    let raw_names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let normalized: Vec<String> = raw_names.iter().map(|n| normalize_header(n)).collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|req| !normalized.iter().any(|n| n == *req))
        .map(|req| req.to_string())
        .collect();
    if !missing.is_empty() {
        warn!("Upload is missing required columns: {}", missing.join(", "));
        return Err(ExpenseError::schema(missing, normalized));
    }

    let series = |name: &str| required_series(df, &raw_names, &normalized, name);

    let internal = |e: anyhow::Error| ExpenseError::Internal(e.to_string());
    let dates = converters::string_to_dates(series(COL_DATE)?).map_err(internal)?;
    let costs = converters::string_to_costs(series(COL_COST)?).map_err(internal)?;
    let regions = converters::string_to_labels(series(COL_REGION)?).map_err(internal)?;
    let clients = converters::string_to_labels(series(COL_CLIENT)?).map_err(internal)?;
    let trainers = converters::string_to_labels(series(COL_TRAINER)?).map_err(internal)?;
    let payments = converters::string_to_labels(series(COL_PAYMENT)?).map_err(internal)?;

    let mut extra_columns = Vec::new();
    let mut extra_values = Vec::new();
    for (i, name) in normalized.iter().enumerate() {
        if REQUIRED_COLUMNS.contains(&name.as_str()) || extra_columns.contains(name) {
            continue;
        }
        let column = df.column(&raw_names[i])?.as_materialized_series();
        extra_values.push(converters::string_values(column).map_err(internal)?);
        extra_columns.push(name.clone());
    }

    let rows_read = df.height();
    let mut records = Vec::with_capacity(rows_read);
    for row in 0..rows_read {
        let (Some(date), Some(cost)) = (dates[row], costs[row]) else {
            continue;
        };
        records.push(ExpenseRecord {
            date,
            region: regions[row].clone(),
            client_name: clients[row].clone(),
            trainer_name: trainers[row].clone(),
            payment_type: payments[row].clone(),
            cost,
            extra: extra_values.iter().map(|col| col[row].clone()).collect(),
        });
    }

    let rows_dropped = rows_read - records.len();
    if rows_dropped > 0 {
        debug!("Dropped {} rows with an unparseable date or cost", rows_dropped);
    }

    let table = ExpenseTable {
        records,
        extra_columns,
    };
    let summary = LoadSummary {
        rows_read,
        rows_dropped,
        metadata_row_skipped: false,
        columns: normalized,
    };
    Ok((table, summary))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const BASIC: &str = "Date ,Region,Client Name,Cost,Name of Trainer,Payment Type,Notes\n\
        01/01/2024,RegionA,ClientX,100,T1,Cash,first\n\
        01/01/2024,RegionA,ClientX,50,T1,UPI,\n\
        08/01/2024,RegionA,ClientY,200,T2,Cash,third\n";

    fn load(text: &str) -> Result<LoadedData> {
        DataLoader::default().load_bytes(text.as_bytes())
    }

    #[test]
    fn test_detect_metadata_row() {
        assert!(detect_metadata_row(b",,,,,Visit Plan", b',', 5));
        assert!(!detect_metadata_row(b",,,,Visit Plan", b',', 5));
        assert!(!detect_metadata_row(b"Date,Region", b',', 5));
        assert!(detect_metadata_row(b";;;;;;", b';', 5));
    }

    #[test]
    fn test_load_basic_upload() {
        let loaded = load(BASIC).unwrap();
        assert_eq!(loaded.table.len(), 3);
        assert_eq!(loaded.summary.rows_read, 3);
        assert_eq!(loaded.summary.rows_dropped, 0);
        assert!(!loaded.summary.metadata_row_skipped);
        assert_eq!(loaded.summary.columns[0], "Date");

        let first = &loaded.table.records[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(first.cost, 100.0);
        assert_eq!(loaded.table.extra_columns, vec!["Notes".to_string()]);
        assert_eq!(first.extra, vec![Some("first".to_string())]);
        assert_eq!(loaded.table.records[1].extra, vec![None]);
    }

    #[test]
    fn test_auto_skips_metadata_row() {
        let text = format!(",,,,,,L&D Onsite Visit Plan\n{}", BASIC);
        let loaded = load(&text).unwrap();
        assert!(loaded.summary.metadata_row_skipped);
        assert_eq!(loaded.table.len(), 3);
    }

    #[test]
    fn test_absent_mode_never_skips() {
        let loader = DataLoader::new(
            LoaderConfig::builder()
                .metadata_row(MetadataRow::Absent)
                .build()
                .unwrap(),
        );
        let loaded = loader.load_bytes(BASIC.as_bytes()).unwrap();
        assert!(!loaded.summary.metadata_row_skipped);
        assert_eq!(loaded.table.len(), 3);
    }

    #[test]
    fn test_drops_rows_with_bad_date_or_cost() {
        let text = "Date,Region,Client Name,Cost,Name of Trainer,Payment Type\n\
            01/01/2024,A,X,100,T1,Cash\n\
            not a date,A,X,100,T1,Cash\n\
            02/01/2024,A,X,abc,T1,Cash\n\
            03/01/2024,A,X,-20,T1,Cash\n";
        let loaded = load(text).unwrap();
        assert_eq!(loaded.table.len(), 1);
        assert_eq!(loaded.summary.rows_dropped, 3);
    }

    #[test]
    fn test_blank_categoricals_become_unspecified() {
        let text = "Date,Region,Client Name,Cost,Name of Trainer,Payment Type\n\
            01/01/2024,,X,100,T1,\n";
        let loaded = load(text).unwrap();
        let record = &loaded.table.records[0];
        assert_eq!(record.region, "Unspecified");
        assert_eq!(record.payment_type, "Unspecified");
    }

    #[test]
    fn test_missing_columns_reported() {
        let text = "Date,Region,Client Name\n01/01/2024,A,X\n";
        let err = load(text).unwrap_err();
        assert_eq!(err.error_code(), "SCHEMA_ERROR");
        assert_eq!(
            err.missing_columns().unwrap(),
            &["Cost", "Name of Trainer", "Payment Type"].map(String::from)[..]
        );
        assert!(err.to_string().contains("Date, Region, Client Name"));
    }

    #[test]
    fn test_semicolon_separator() {
        let loader = DataLoader::new(LoaderConfig::builder().separator(b';').build().unwrap());
        let text = "Date;Region;Client Name;Cost;Name of Trainer;Payment Type\n\
            01/01/2024;A;X;\"1,250\";T1;Cash\n";
        let loaded = loader.load_bytes(text.as_bytes()).unwrap();
        assert_eq!(loaded.table.records[0].cost, 1250.0);
    }

    #[test]
    fn test_empty_upload() {
        let err = load("").unwrap_err();
        assert_eq!(err.error_code(), "NO_DATA");
    }

    #[test]
    fn test_bom_is_ignored() {
        let text = format!("\u{feff}{}", BASIC);
        let loaded = load(&text).unwrap();
        assert_eq!(loaded.summary.columns[0], "Date");
    }
}
