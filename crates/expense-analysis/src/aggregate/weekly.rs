//! Weekly resampling.
//!
//! Weeks start on Monday and are labelled by that Monday. A group only gets
//! points for weeks in which it has records.

use crate::types::ExpenseRecord;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Cost total of one week.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    pub week_start: NaiveDate,
    pub total_cost: f64,
}

/// One group's weekly totals in date order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklySeries {
    pub group: String,
    pub points: Vec<WeeklyPoint>,
}

/// The Monday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Resample by week for every group of `key`; groups in label order.
pub fn weekly_by<F>(records: &[ExpenseRecord], key: F) -> Vec<WeeklySeries>
where
    F: Fn(&ExpenseRecord) -> &str,
{
    let mut groups: BTreeMap<&str, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
    for record in records {
        *groups
            .entry(key(record))
            .or_default()
            .entry(week_start(record.date))
            .or_default() += record.cost;
    }

    groups
        .into_iter()
        .map(|(group, weeks)| WeeklySeries {
            group: group.to_string(),
            points: weeks
                .into_iter()
                .map(|(week_start, total_cost)| WeeklyPoint {
                    week_start,
                    total_cost,
                })
                .collect(),
        })
        .collect()
}

/// Earliest and latest week across every series.
pub fn week_bounds(series: &[WeeklySeries]) -> Option<(NaiveDate, NaiveDate)> {
    let weeks = series.iter().flat_map(|s| s.points.iter().map(|p| p.week_start));
    weeks.fold(None, |acc, w| match acc {
        None => Some((w, w)),
        Some((lo, hi)) => Some((lo.min(w), hi.max(w))),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_week_start_is_monday() {
        // 2024-01-01 is a Monday.
        assert_eq!(week_start(date(1, 1)), date(1, 1));
        assert_eq!(week_start(date(1, 7)), date(1, 1));
        assert_eq!(week_start(date(1, 10)), date(1, 8));
    }

    #[test]
    fn test_weekly_example() {
        let records = vec![
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "T1", "Cash", 100.0),
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "T1", "Cash", 50.0),
            ExpenseRecord::new(date(1, 8), "RegionA", "ClientY", "T2", "Cash", 200.0),
        ];
        let series = weekly_by(&records, |r| r.region.as_str());
        assert_eq!(series.len(), 1);
        assert_eq!(
            series[0].points,
            vec![
                WeeklyPoint { week_start: date(1, 1), total_cost: 150.0 },
                WeeklyPoint { week_start: date(1, 8), total_cost: 200.0 },
            ]
        );
    }

    #[test]
    fn test_empty_weeks_omitted() {
        let records = vec![
            ExpenseRecord::new(date(1, 2), "A", "X", "T1", "Cash", 10.0),
            ExpenseRecord::new(date(1, 30), "A", "X", "T1", "Cash", 20.0),
            ExpenseRecord::new(date(1, 16), "B", "X", "T1", "Cash", 5.0),
        ];
        let series = weekly_by(&records, |r| r.region.as_str());
        assert_eq!(series[0].points.len(), 2);
        assert_eq!(series[1].group, "B");
        assert_eq!(week_bounds(&series), Some((date(1, 1), date(1, 29))));
    }
}
