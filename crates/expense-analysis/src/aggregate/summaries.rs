//! Grouped summaries by region, trainer, client and payment type.

use crate::types::{ExpenseRecord, SessionKey};
use crate::utils::safe_div;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-group metrics for a single dimension (region or trainer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub label: String,
    /// Distinct (date, client) pairs.
    pub session_count: usize,
    pub client_count: usize,
    pub unique_days: usize,
    pub total_cost: f64,
    /// Total cost over sessions, not a per-row mean.
    pub average_cost: f64,
    pub average_weekly_cost: f64,
    pub average_daily_cost: f64,
    pub average_client_cost: f64,
}

/// Metrics for one client within a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub region: String,
    pub client_name: String,
    pub session_count: usize,
    pub total_cost: f64,
    pub average_cost: f64,
}

/// One payment type's share of the overall total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentShare {
    pub payment_type: String,
    pub total_cost: f64,
    /// Percentage of the overall total, 0 when the total is 0.
    pub percentage: f64,
}

/// Number of weeks a date span covers for the weekly-average rate.
///
/// `(max - min).days / 7`, floored to one week.
pub fn weeks_span(min: NaiveDate, max: NaiveDate) -> f64 {
    ((max - min).num_days() as f64 / 7.0).max(1.0)
}

#[derive(Default)]
struct Accumulator<'a> {
    total: f64,
    sessions: BTreeSet<SessionKey>,
    clients: BTreeSet<&'a str>,
    days: BTreeSet<NaiveDate>,
}

impl<'a> Accumulator<'a> {
    fn push(&mut self, record: &'a ExpenseRecord) {
        self.total += record.cost;
        self.sessions.insert(record.session_key());
        self.clients.insert(&record.client_name);
        self.days.insert(record.date);
    }

    fn date_bounds(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((*self.days.first()?, *self.days.last()?))
    }
}

/// Summarize `records` grouped by `key`, sorted by total cost descending.
pub fn group_summary<F>(records: &[ExpenseRecord], key: F) -> Vec<GroupSummary>
where
    F: Fn(&ExpenseRecord) -> &str,
{
    let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
    for record in records {
        groups.entry(key(record)).or_default().push(record);
    }

    let mut summaries: Vec<GroupSummary> = groups
        .into_iter()
        .map(|(label, acc)| {
            let weeks = acc
                .date_bounds()
                .map(|(min, max)| weeks_span(min, max))
                .unwrap_or(1.0);
            let session_count = acc.sessions.len();
            GroupSummary {
                label: label.to_string(),
                session_count,
                client_count: acc.clients.len(),
                unique_days: acc.days.len(),
                total_cost: acc.total,
                average_cost: safe_div(acc.total, session_count as f64),
                average_weekly_cost: safe_div(acc.total, weeks),
                average_daily_cost: safe_div(acc.total, acc.days.len() as f64),
                average_client_cost: safe_div(acc.total, acc.clients.len() as f64),
            }
        })
        .collect();

    sort_by_total(&mut summaries, |s| (s.total_cost, s.label.as_str()));
    summaries
}

/// Summarize by (region, client), sorted by total cost descending.
pub fn client_summary(records: &[ExpenseRecord]) -> Vec<ClientSummary> {
    let mut groups: BTreeMap<(&str, &str), Accumulator> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.region.as_str(), record.client_name.as_str()))
            .or_default()
            .push(record);
    }

    let mut summaries: Vec<ClientSummary> = groups
        .into_iter()
        .map(|((region, client), acc)| ClientSummary {
            region: region.to_string(),
            client_name: client.to_string(),
            session_count: acc.sessions.len(),
            total_cost: acc.total,
            average_cost: safe_div(acc.total, acc.sessions.len() as f64),
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.total_cost
            .total_cmp(&a.total_cost)
            .then_with(|| a.region.cmp(&b.region))
            .then_with(|| a.client_name.cmp(&b.client_name))
    });
    summaries
}

/// Payment totals and their percentage of the overall total.
pub fn payment_shares(records: &[ExpenseRecord]) -> Vec<PaymentShare> {
    let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
    for record in records {
        *totals.entry(record.payment_type.as_str()).or_default() += record.cost;
    }
    let overall: f64 = totals.values().sum();

    let mut shares: Vec<PaymentShare> = totals
        .into_iter()
        .map(|(payment_type, total_cost)| PaymentShare {
            payment_type: payment_type.to_string(),
            total_cost,
            percentage: safe_div(total_cost, overall) * 100.0,
        })
        .collect();

    sort_by_total(&mut shares, |s| (s.total_cost, s.payment_type.as_str()));
    shares
}

/// Sort descending by total, ties by label ascending.
pub(crate) fn sort_by_total<T, F>(items: &mut [T], key: F)
where
    F: Fn(&T) -> (f64, &str),
{
    items.sort_by(|a, b| {
        let (total_a, label_a) = key(a);
        let (total_b, label_b) = key(b);
        total_b.total_cmp(&total_a).then_with(|| label_a.cmp(label_b))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn three_rows() -> Vec<ExpenseRecord> {
        vec![
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "T1", "Cash", 100.0),
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "T1", "UPI", 50.0),
            ExpenseRecord::new(date(1, 8), "RegionA", "ClientY", "T2", "Cash", 200.0),
        ]
    }

    #[test]
    fn test_weeks_span() {
        assert_eq!(weeks_span(date(1, 1), date(1, 1)), 1.0);
        assert_eq!(weeks_span(date(1, 1), date(1, 15)), 2.0);
        assert_eq!(weeks_span(date(1, 1), date(1, 4)), 1.0);
        assert_eq!(weeks_span(date(1, 1), date(1, 22)), 3.0);
    }

    #[test]
    fn test_weekly_cost_within_total_for_short_span() {
        let records = vec![
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "T1", "Cash", 100.0),
            ExpenseRecord::new(date(1, 4), "RegionA", "ClientY", "T1", "Cash", 200.0),
        ];
        let region = &group_summary(&records, |r| r.region.as_str())[0];
        assert_eq!(region.total_cost, 300.0);
        assert_eq!(region.average_weekly_cost, 300.0);
        assert!(region.average_weekly_cost <= region.total_cost);
    }

    #[test]
    fn test_region_sessions_total_average() {
        let summary = group_summary(&three_rows(), |r| r.region.as_str());
        assert_eq!(summary.len(), 1);
        let region = &summary[0];
        assert_eq!(region.label, "RegionA");
        assert_eq!(region.session_count, 2);
        assert_eq!(region.total_cost, 350.0);
        assert_eq!(region.average_cost, 175.0);
        assert_eq!(region.client_count, 2);
        assert_eq!(region.unique_days, 2);
        assert_eq!(region.average_weekly_cost, 350.0);
        assert_eq!(region.average_daily_cost, 175.0);
        assert_eq!(region.average_client_cost, 175.0);
    }

    #[test]
    fn test_sorted_by_total_then_label() {
        let records = vec![
            ExpenseRecord::new(date(1, 1), "B", "X", "T", "Cash", 10.0),
            ExpenseRecord::new(date(1, 1), "A", "X", "T", "Cash", 10.0),
            ExpenseRecord::new(date(1, 1), "C", "X", "T", "Cash", 30.0),
        ];
        let labels: Vec<String> = group_summary(&records, |r| r.region.as_str())
            .into_iter()
            .map(|s| s.label)
            .collect();
        assert_eq!(labels, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_client_summary_conserves_region_totals() {
        let records = three_rows();
        let clients = client_summary(&records);
        assert_eq!(clients[0].client_name, "ClientY");
        assert_eq!(clients[1].session_count, 1);
        assert_eq!(clients[1].average_cost, 150.0);
        let sum: f64 = clients.iter().map(|c| c.total_cost).sum();
        assert_eq!(sum, 350.0);
    }

    #[test]
    fn test_client_ties_ordered_by_label() {
        let records = vec![
            ExpenseRecord::new(date(1, 1), "South", "Zen", "T1", "Cash", 40.0),
            ExpenseRecord::new(date(1, 2), "North", "Acme", "T1", "Cash", 40.0),
            ExpenseRecord::new(date(1, 3), "North", "Birla", "T2", "Cash", 40.0),
            ExpenseRecord::new(date(1, 4), "East", "Cipla", "T2", "Cash", 90.0),
        ];
        let order: Vec<(String, String)> = client_summary(&records)
            .into_iter()
            .map(|c| (c.region, c.client_name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("East".to_string(), "Cipla".to_string()),
                ("North".to_string(), "Acme".to_string()),
                ("North".to_string(), "Birla".to_string()),
                ("South".to_string(), "Zen".to_string()),
            ]
        );
    }

    #[test]
    fn test_payment_shares() {
        let shares = payment_shares(&three_rows());
        assert_eq!(shares[0].payment_type, "Cash");
        assert_eq!(shares[0].total_cost, 300.0);
        assert!((shares[0].percentage - 85.714).abs() < 0.01);
        assert!((shares[1].percentage - 14.286).abs() < 0.01);
    }

    #[test]
    fn test_empty_records() {
        assert!(group_summary(&[], |r| r.region.as_str()).is_empty());
        assert!(payment_shares(&[]).is_empty());
    }
}
