//! Row filtering.
//!
//! Predicates run in a fixed order (date range, region, client, trainer) and
//! each one is a passthrough when its selection is empty.

use crate::error::{ExpenseError, Result};
use crate::types::{ExpenseRecord, ExpenseTable, FilterSelection};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Applies a [`FilterSelection`] to a table.
pub struct FilterEngine;

impl FilterEngine {
    /// Produce the filtered subset. The input table is never modified.
    pub fn apply(table: &ExpenseTable, selection: &FilterSelection) -> Result<ExpenseTable> {
        if let Some((from, to)) = selection.date_range
            && from > to
        {
            return Err(ExpenseError::InvalidFilter(format!(
                "date range starts after it ends ({} > {})",
                from, to
            )));
        }

        if selection.is_passthrough() {
            return Ok(table.clone());
        }

        let records: Vec<ExpenseRecord> = table
            .records
            .iter()
            .filter(|r| in_range(r, selection.date_range))
            .filter(|r| member(&selection.regions, &r.region))
            .filter(|r| member(&selection.clients, &r.client_name))
            .filter(|r| member(&selection.trainers, &r.trainer_name))
            .cloned()
            .collect();

        debug!("Filter kept {} of {} rows", records.len(), table.len());
        Ok(table.with_records(records))
    }
}

fn in_range(record: &ExpenseRecord, range: Option<(NaiveDate, NaiveDate)>) -> bool {
    range.is_none_or(|(from, to)| record.date >= from && record.date <= to)
}

fn member(selected: &BTreeSet<String>, value: &str) -> bool {
    selected.is_empty() || selected.contains(value)
}

/// Choices each selector offers, narrowed by the selectors above it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterOptions {
    /// Overall bounds of the unfiltered table.
    pub date_bounds: Option<(NaiveDate, NaiveDate)>,
    /// Regions present within the selected date range.
    pub regions: Vec<String>,
    /// Clients present within the selected dates and regions.
    pub clients: Vec<String>,
    /// Trainers present within the selected dates, regions and clients.
    pub trainers: Vec<String>,
}

impl FilterOptions {
    /// Compute the cascading option lists for `selection`.
    pub fn cascade(table: &ExpenseTable, selection: &FilterSelection) -> Self {
        let by_date: Vec<&ExpenseRecord> = table
            .records
            .iter()
            .filter(|r| in_range(r, selection.date_range))
            .collect();
        let regions = distinct(by_date.iter().map(|r| r.region.as_str()));

        let by_region: Vec<&ExpenseRecord> = by_date
            .into_iter()
            .filter(|r| member(&selection.regions, &r.region))
            .collect();
        let clients = distinct(by_region.iter().map(|r| r.client_name.as_str()));

        let trainers = distinct(
            by_region
                .iter()
                .filter(|r| member(&selection.clients, &r.client_name))
                .map(|r| r.trainer_name.as_str()),
        );

        Self {
            date_bounds: table.date_bounds(),
            regions,
            clients,
            trainers,
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    values
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}
