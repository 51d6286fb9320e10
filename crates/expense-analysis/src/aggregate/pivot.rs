//! Two-dimensional cost pivots.

use crate::types::ExpenseRecord;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Label of the margin row and column.
pub const GRAND_TOTAL_LABEL: &str = "Grand Total";

/// Cost summed over every (row, column) pair, missing pairs zero.
///
/// Rows and columns are label-ascending. When built with margins the
/// totals are kept separately from `values`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrossTab {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    /// `values[row][column]`.
    pub values: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margins: Option<Margins>,
}

/// Row, column and grand totals of a [`CrossTab`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub row_totals: Vec<f64>,
    pub column_totals: Vec<f64>,
    pub grand_total: f64,
}

impl CrossTab {
    /// Pivot `records` on two keys, zero-filling absent combinations.
    pub fn build<R, C>(records: &[ExpenseRecord], row_key: R, column_key: C) -> Self
    where
        R: Fn(&ExpenseRecord) -> &str,
        C: Fn(&ExpenseRecord) -> &str,
    {
        let mut cells: BTreeMap<(&str, &str), f64> = BTreeMap::new();
        let mut rows = BTreeSet::new();
        let mut columns = BTreeSet::new();
        for record in records {
            let (row, column) = (row_key(record), column_key(record));
            rows.insert(row);
            columns.insert(column);
            *cells.entry((row, column)).or_default() += record.cost;
        }

        let values: Vec<Vec<f64>> = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|column| cells.get(&(*row, *column)).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();

        Self {
            row_labels: rows.into_iter().map(str::to_string).collect(),
            column_labels: columns.into_iter().map(str::to_string).collect(),
            values,
            margins: None,
        }
    }

    /// Attach row, column and grand totals.
    pub fn with_margins(mut self) -> Self {
        let row_totals: Vec<f64> = self.values.iter().map(|row| row.iter().sum()).collect();
        let column_totals: Vec<f64> = (0..self.column_labels.len())
            .map(|c| self.values.iter().map(|row| row[c]).sum())
            .collect();
        let grand_total: f64 = row_totals.iter().sum();
        self.margins = Some(Margins {
            row_totals,
            column_totals,
            grand_total,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.row_labels.is_empty()
    }

    /// Cell value by labels; zero for unknown labels.
    pub fn value(&self, row: &str, column: &str) -> f64 {
        let r = self.row_labels.iter().position(|l| l == row);
        let c = self.column_labels.iter().position(|l| l == column);
        match (r, c) {
            (Some(r), Some(c)) => self.values[r][c],
            _ => 0.0,
        }
    }

    /// Largest cell value, 0 when empty.
    pub fn max_value(&self) -> f64 {
        self.values
            .iter()
            .flatten()
            .copied()
            .fold(0.0, f64::max)
    }

    /// Rows as label plus cells, with the margin column and row appended when
    /// present. Used by the CSV exporter.
    pub fn rows_with_margins(&self) -> Vec<(String, Vec<f64>)> {
        let mut rows: Vec<(String, Vec<f64>)> = self
            .row_labels
            .iter()
            .zip(&self.values)
            .enumerate()
            .map(|(i, (label, cells))| {
                let mut cells = cells.clone();
                if let Some(margins) = &self.margins {
                    cells.push(margins.row_totals[i]);
                }
                (label.clone(), cells)
            })
            .collect();

        if let Some(margins) = &self.margins {
            let mut totals = margins.column_totals.clone();
            totals.push(margins.grand_total);
            rows.push((GRAND_TOTAL_LABEL.to_string(), totals));
        }
        rows
    }

    /// Column headers matching [`rows_with_margins`](Self::rows_with_margins).
    pub fn columns_with_margins(&self) -> Vec<String> {
        let mut columns = self.column_labels.clone();
        if self.margins.is_some() {
            columns.push(GRAND_TOTAL_LABEL.to_string());
        }
        columns
    }
}
