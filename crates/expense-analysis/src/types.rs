//! Core data types shared across the loader, filters, aggregation and reports.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Column holding the expense date.
pub const COL_DATE: &str = "Date";
/// Column holding the region name.
pub const COL_REGION: &str = "Region";
/// Column holding the client name.
pub const COL_CLIENT: &str = "Client Name";
/// Column holding the numeric cost.
pub const COL_COST: &str = "Cost";
/// Column holding the trainer name.
pub const COL_TRAINER: &str = "Name of Trainer";
/// Column holding the payment type.
pub const COL_PAYMENT: &str = "Payment Type";
/// Derived session identifier column (filtered export only).
pub const COL_SESSION_ID: &str = "Session_ID";

/// Columns every upload must provide, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 6] = [
    COL_DATE,
    COL_REGION,
    COL_CLIENT,
    COL_COST,
    COL_TRAINER,
    COL_PAYMENT,
];

/// Label used for blank categorical cells.
pub const UNSPECIFIED_LABEL: &str = "Unspecified";

/// One cleaned expense row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub date: NaiveDate,
    pub region: String,
    pub client_name: String,
    pub trainer_name: String,
    pub payment_type: String,
    /// Always finite and non-negative.
    pub cost: f64,
    /// Non-required input columns, aligned with [`ExpenseTable::extra_columns`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Option<String>>,
}

impl ExpenseRecord {
    /// Create a record without extra columns.
    pub fn new(
        date: NaiveDate,
        region: impl Into<String>,
        client_name: impl Into<String>,
        trainer_name: impl Into<String>,
        payment_type: impl Into<String>,
        cost: f64,
    ) -> Self {
        Self {
            date,
            region: region.into(),
            client_name: client_name.into(),
            trainer_name: trainer_name.into(),
            payment_type: payment_type.into(),
            cost,
            extra: Vec::new(),
        }
    }

    /// The session this row belongs to.
    pub fn session_key(&self) -> SessionKey {
        SessionKey {
            date: self.date,
            client_name: self.client_name.clone(),
        }
    }

    /// Session identifier as exported (`2024-01-01_ClientX`).
    pub fn session_id(&self) -> String {
        self.session_key().to_string()
    }
}

/// A distinct (date, client) pair; the unit of "Session Count".
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub date: NaiveDate,
    pub client_name: String,
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.date.format("%Y-%m-%d"), self.client_name)
    }
}

/// The cleaned, in-memory row set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseTable {
    pub records: Vec<ExpenseRecord>,
    /// Names of the non-required input columns carried in each record.
    #[serde(default)]
    pub extra_columns: Vec<String>,
}

impl ExpenseTable {
    pub fn new(records: Vec<ExpenseRecord>) -> Self {
        Self {
            records,
            extra_columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sum of cost over every row.
    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }

    /// Earliest and latest date, if any rows exist.
    pub fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        let min = self.records.iter().map(|r| r.date).min()?;
        let max = self.records.iter().map(|r| r.date).max()?;
        Some((min, max))
    }

    /// A table with the same column layout holding `records`.
    pub fn with_records(&self, records: Vec<ExpenseRecord>) -> Self {
        Self {
            records,
            extra_columns: self.extra_columns.clone(),
        }
    }
}

/// User-selected filters. Empty sets and a missing range pass everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSelection {
    /// Inclusive `(from, to)` bounds.
    #[serde(default)]
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    #[serde(default)]
    pub regions: BTreeSet<String>,
    #[serde(default)]
    pub clients: BTreeSet<String>,
    #[serde(default)]
    pub trainers: BTreeSet<String>,
}

impl FilterSelection {
    /// A selection that keeps every row.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_date_range(mut self, from: NaiveDate, to: NaiveDate) -> Self {
        self.date_range = Some((from, to));
        self
    }

    pub fn with_regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = regions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_clients<I, S>(mut self, clients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clients = clients.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_trainers<I, S>(mut self, trainers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trainers = trainers.into_iter().map(Into::into).collect();
        self
    }

    /// True when no predicate would remove any row.
    pub fn is_passthrough(&self) -> bool {
        self.date_range.is_none()
            && self.regions.is_empty()
            && self.clients.is_empty()
            && self.trainers.is_empty()
    }
}
