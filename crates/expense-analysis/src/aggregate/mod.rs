//! Aggregation over filtered expense records.
//!
//! This module computes every table the dashboard, charts and report
//! consume:
//! - Region and trainer summaries with derived weekly/daily/client rates
//! - Client summary keyed by (region, client)
//! - Payment shares
//! - Region x trainer, trainer x payment and region x payment pivots
//! - Weekly series by region and by trainer
//!
//! All output is deterministic: groups are collected in ordered maps and
//! ties in the cost ordering break on the label.

mod pivot;
mod summaries;
mod weekly;

use crate::types::{ExpenseRecord, ExpenseTable};
use crate::utils::safe_div;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

pub use pivot::{CrossTab, GRAND_TOTAL_LABEL, Margins};
pub use summaries::{
    ClientSummary, GroupSummary, PaymentShare, client_summary, group_summary, payment_shares,
    weeks_span,
};
pub use weekly::{WeeklyPoint, WeeklySeries, week_bounds, week_start, weekly_by};

/// Headline metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Kpis {
    pub total_cost: f64,
    pub session_count: usize,
    /// Total cost per session, 0 without sessions.
    pub average_cost: f64,
    pub record_count: usize,
}

impl Kpis {
    pub fn from_records(records: &[ExpenseRecord]) -> Self {
        let total_cost: f64 = records.iter().map(|r| r.cost).sum();
        let session_count = records
            .iter()
            .map(ExpenseRecord::session_key)
            .collect::<BTreeSet<_>>()
            .len();
        Self {
            total_cost,
            session_count,
            average_cost: safe_div(total_cost, session_count as f64),
            record_count: records.len(),
        }
    }
}

/// Every aggregation table for one filtered table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summaries {
    pub kpis: Kpis,
    pub regions: Vec<GroupSummary>,
    pub trainers: Vec<GroupSummary>,
    pub clients: Vec<ClientSummary>,
    pub payments: Vec<PaymentShare>,
    /// Region rows, trainer columns, zero-filled.
    pub region_trainer: CrossTab,
    /// Trainer rows, payment-type columns, with grand totals.
    pub trainer_payment: CrossTab,
    /// Region rows, payment-type columns.
    pub region_payment: CrossTab,
    pub weekly_by_region: Vec<WeeklySeries>,
    pub weekly_by_trainer: Vec<WeeklySeries>,
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

/// Computes [`Summaries`] from a filtered table.
pub struct AggregationEngine;

impl AggregationEngine {
    /// Run every aggregation over `table`.
    pub fn summarize(table: &ExpenseTable) -> Summaries {
        let records = &table.records;
        debug!("Aggregating {} records", records.len());

        Summaries {
            kpis: Kpis::from_records(records),
            regions: group_summary(records, by_region),
            trainers: group_summary(records, by_trainer),
            clients: client_summary(records),
            payments: payment_shares(records),
            region_trainer: CrossTab::build(records, by_region, by_trainer),
            trainer_payment: CrossTab::build(records, by_trainer, by_payment).with_margins(),
            region_payment: CrossTab::build(records, by_region, by_payment),
            weekly_by_region: weekly_by(records, by_region),
            weekly_by_trainer: weekly_by(records, by_trainer),
        }
    }
}
