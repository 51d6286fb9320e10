//! CSV exports of the filtered data and its summaries.
//!
//! Each export is built as a polars `DataFrame` and written with
//! `CsvWriter`: UTF-8, comma-separated, header row, numbers rounded to two
//! decimals.

use crate::aggregate::{CrossTab, client_summary, group_summary};
use crate::error::{Result, ResultExt};
use crate::types::{
    COL_CLIENT, COL_COST, COL_DATE, COL_PAYMENT, COL_REGION, COL_SESSION_ID, COL_TRAINER,
    ExpenseRecord, ExpenseTable,
};
use crate::utils::round2;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const REGION_SUMMARY_FILE: &str = "region_summary.csv";
pub const TRAINER_SUMMARY_FILE: &str = "trainer_summary.csv";
pub const CLIENT_SUMMARY_FILE: &str = "client_summary.csv";
pub const PAYMENT_BY_TRAINER_FILE: &str = "payment_by_trainer.csv";
pub const FILTERED_DATA_FILE: &str = "filtered_data.csv";

/// One rendered CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct CsvExport {
    pub file_name: &'static str,
    pub bytes: Vec<u8>,
}

impl CsvExport {
    /// The bytes as text; exports are always UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

fn text_column(name: &str, values: Vec<String>) -> Column {
    Series::new(name.into(), values).into_column()
}

fn count_column(name: &str, values: Vec<u64>) -> Column {
    Series::new(name.into(), values).into_column()
}

fn money_column(name: &str, values: impl IntoIterator<Item = f64>) -> Column {
    let rounded: Vec<f64> = values.into_iter().map(round2).collect();
    Series::new(name.into(), rounded).into_column()
}

fn write_csv(df: &mut DataFrame) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    CsvWriter::new(&mut buffer)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)?;
    Ok(buffer)
}

fn by_region(record: &ExpenseRecord) -> &str {
    &record.region
}

fn by_trainer(record: &ExpenseRecord) -> &str {
    &record.trainer_name
}

fn by_payment(record: &ExpenseRecord) -> &str {
    &record.payment_type
}

/// Region summary sorted by total cost descending.
pub fn region_summary_frame(records: &[ExpenseRecord]) -> Result<DataFrame> {
    let summaries = group_summary(records, by_region);
    let df = DataFrame::new(vec![
        text_column(COL_REGION, summaries.iter().map(|s| s.label.clone()).collect()),
        count_column(
            "Session Count",
            summaries.iter().map(|s| s.session_count as u64).collect(),
        ),
        count_column(
            "Number of Clients",
            summaries.iter().map(|s| s.client_count as u64).collect(),
        ),
        money_column("Total Cost", summaries.iter().map(|s| s.total_cost)),
        money_column("Average Cost", summaries.iter().map(|s| s.average_cost)),
        money_column(
            "Average Weekly Cost",
            summaries.iter().map(|s| s.average_weekly_cost),
        ),
        money_column(
            "Average Daily Cost",
            summaries.iter().map(|s| s.average_daily_cost),
        ),
        money_column(
            "Average Client Cost",
            summaries.iter().map(|s| s.average_client_cost),
        ),
    ])?;
    Ok(df)
}

/// Trainer summary sorted by total cost descending.
pub fn trainer_summary_frame(records: &[ExpenseRecord]) -> Result<DataFrame> {
    let summaries = group_summary(records, by_trainer);
    let df = DataFrame::new(vec![
        text_column(COL_TRAINER, summaries.iter().map(|s| s.label.clone()).collect()),
        count_column(
            "Session Count",
            summaries.iter().map(|s| s.session_count as u64).collect(),
        ),
        money_column("Total Cost", summaries.iter().map(|s| s.total_cost)),
        money_column("Average Cost", summaries.iter().map(|s| s.average_cost)),
        money_column(
            "Average Weekly Cost",
            summaries.iter().map(|s| s.average_weekly_cost),
        ),
    ])?;
    Ok(df)
}

pub fn client_summary_frame(records: &[ExpenseRecord]) -> Result<DataFrame> {
    let summaries = client_summary(records);
    let df = DataFrame::new(vec![
        text_column(COL_REGION, summaries.iter().map(|s| s.region.clone()).collect()),
        text_column(
            COL_CLIENT,
            summaries.iter().map(|s| s.client_name.clone()).collect(),
        ),
        count_column(
            "Session Count",
            summaries.iter().map(|s| s.session_count as u64).collect(),
        ),
        money_column("Total Cost", summaries.iter().map(|s| s.total_cost)),
        money_column("Average Cost", summaries.iter().map(|s| s.average_cost)),
    ])?;
    Ok(df)
}

/// Trainer x payment-type pivot with a Grand Total row and column.
pub fn payment_by_trainer_frame(records: &[ExpenseRecord]) -> Result<DataFrame> {
    let pivot = CrossTab::build(records, by_trainer, by_payment).with_margins();
    let rows = pivot.rows_with_margins();

    let mut columns = vec![text_column(
        COL_TRAINER,
        rows.iter().map(|(label, _)| label.clone()).collect(),
    )];
    for (index, name) in pivot.columns_with_margins().iter().enumerate() {
        columns.push(money_column(name, rows.iter().map(|(_, cells)| cells[index])));
    }
    Ok(DataFrame::new(columns)?)
}

/// The filtered rows with their extra columns and a `Session_ID`.
pub fn filtered_data_frame(table: &ExpenseTable) -> Result<DataFrame> {
    let records = &table.records;
    let mut columns = vec![
        text_column(
            COL_DATE,
            records
                .iter()
                .map(|r| r.date.format("%Y-%m-%d").to_string())
                .collect(),
        ),
        text_column(COL_REGION, records.iter().map(|r| r.region.clone()).collect()),
        text_column(
            COL_CLIENT,
            records.iter().map(|r| r.client_name.clone()).collect(),
        ),
        money_column(COL_COST, records.iter().map(|r| r.cost)),
        text_column(
            COL_TRAINER,
            records.iter().map(|r| r.trainer_name.clone()).collect(),
        ),
        text_column(
            COL_PAYMENT,
            records.iter().map(|r| r.payment_type.clone()).collect(),
        ),
    ];

    for (index, name) in table.extra_columns.iter().enumerate() {
        let values: Vec<Option<String>> = records
            .iter()
            .map(|r| r.extra.get(index).cloned().flatten())
            .collect();
        columns.push(Series::new(name.as_str().into(), values).into_column());
    }

    columns.push(text_column(
        COL_SESSION_ID,
        records.iter().map(ExpenseRecord::session_id).collect(),
    ));
    Ok(DataFrame::new(columns)?)
}

/// Render all five exports in memory.
pub fn csv_exports(table: &ExpenseTable) -> Result<Vec<CsvExport>> {
    let records = table.records.as_slice();
    let frames = [
        (REGION_SUMMARY_FILE, region_summary_frame(records)),
        (TRAINER_SUMMARY_FILE, trainer_summary_frame(records)),
        (CLIENT_SUMMARY_FILE, client_summary_frame(records)),
        (PAYMENT_BY_TRAINER_FILE, payment_by_trainer_frame(records)),
        (FILTERED_DATA_FILE, filtered_data_frame(table)),
    ];

    let mut exports = Vec::with_capacity(frames.len());
    for (file_name, frame) in frames {
        let mut df = frame.context(format!("Building {}", file_name))?;
        debug!("Writing {} ({} rows)", file_name, df.height());
        exports.push(CsvExport {
            file_name,
            bytes: write_csv(&mut df)?,
        });
    }
    Ok(exports)
}

/// Write all five exports into `dir`, creating it when missing.
pub fn export_to_dir(table: &ExpenseTable, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for export in csv_exports(table)? {
        let path = dir.join(export.file_name);
        let mut file = File::create(&path)?;
        std::io::Write::write_all(&mut file, &export.bytes)?;
        written.push(path);
    }
    info!("Exported {} CSV files to {}", written.len(), dir.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn record(
        day: u32,
        region: &str,
        client: &str,
        trainer: &str,
        payment: &str,
        cost: f64,
    ) -> ExpenseRecord {
        ExpenseRecord::new(
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            region,
            client,
            trainer,
            payment,
            cost,
        )
    }

    fn table() -> ExpenseTable {
        ExpenseTable::new(vec![
            record(1, "RegionA", "Client1", "Asha", "Cash", 100.0),
            record(1, "RegionA", "Client1", "Asha", "UPI", 50.0),
            record(8, "RegionA", "Client2", "Ravi", "Cash", 200.0),
            record(9, "RegionB", "Client3", "Ravi", "UPI", 10.25),
        ])
    }

    fn export_text(name: &str) -> String {
        csv_exports(&table())
            .unwrap()
            .into_iter()
            .find(|e| e.file_name == name)
            .unwrap()
            .text()
    }

    #[test]
    fn test_all_files_present() {
        let names: Vec<&str> = csv_exports(&table())
            .unwrap()
            .iter()
            .map(|e| e.file_name)
            .collect();
        assert_eq!(
            names,
            vec![
                REGION_SUMMARY_FILE,
                TRAINER_SUMMARY_FILE,
                CLIENT_SUMMARY_FILE,
                PAYMENT_BY_TRAINER_FILE,
                FILTERED_DATA_FILE,
            ]
        );
    }

    #[test]
    fn test_region_summary_columns_and_order() {
        let df = region_summary_frame(&table().records).unwrap();
        let names: Vec<String> = df
            .get_column_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "Region",
                "Session Count",
                "Number of Clients",
                "Total Cost",
                "Average Cost",
                "Average Weekly Cost",
                "Average Daily Cost",
                "Average Client Cost",
            ]
        );
        let regions = df.column("Region").unwrap().str().unwrap();
        assert_eq!(regions.get(0), Some("RegionA"));
        let totals = df.column("Total Cost").unwrap().f64().unwrap();
        assert_eq!(totals.get(0), Some(350.0));
        let averages = df.column("Average Cost").unwrap().f64().unwrap();
        assert_eq!(averages.get(0), Some(175.0));
    }

    #[test]
    fn test_payment_pivot_has_grand_totals() {
        let df = payment_by_trainer_frame(&table().records).unwrap();
        assert_eq!(df.height(), 3);
        let trainers = df.column("Name of Trainer").unwrap().str().unwrap();
        assert_eq!(trainers.get(2), Some("Grand Total"));
        let totals = df.column("Grand Total").unwrap().f64().unwrap();
        assert_eq!(totals.get(0), Some(150.0));
        assert_eq!(totals.get(2), Some(360.25));
    }

    #[test]
    fn test_filtered_data_has_session_ids() {
        let text = export_text(FILTERED_DATA_FILE);
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("Date,Region,Client Name,Cost,Name of Trainer,Payment Type,Session_ID")
        );
        assert!(text.contains("2024-01-01_Client1"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn test_filtered_data_keeps_extra_columns() {
        let mut table = table();
        table.extra_columns = vec!["Notes".to_string()];
        for (i, record) in table.records.iter_mut().enumerate() {
            record.extra = vec![(i == 0).then(|| "first".to_string())];
        }
        let df = filtered_data_frame(&table).unwrap();
        let notes = df.column("Notes").unwrap().str().unwrap();
        assert_eq!(notes.get(0), Some("first"));
        assert_eq!(notes.get(1), None);
    }

    #[test]
    fn test_empty_table_exports_headers_only() {
        let exports = csv_exports(&ExpenseTable::default()).unwrap();
        let region = exports[0].text();
        assert!(region.starts_with("Region,Session Count"));
        assert_eq!(region.lines().count(), 1);
    }

    #[test]
    fn test_export_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let written = export_to_dir(&table(), &out).unwrap();
        assert_eq!(written.len(), 5);
        for path in written {
            assert!(path.exists());
        }
    }
}
