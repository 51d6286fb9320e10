//! Maps [`Summaries`] to chart specifications.

use super::spec::{
    BarMode, CategorySeries, ChartId, ChartKind, ChartSet, ChartSpec, ScatterPoint,
    ScatterSeries, Slice, TimeSeries,
};
use crate::aggregate::{CrossTab, GroupSummary, Summaries, WeeklySeries, week_bounds};
use crate::config::ChartTheme;
use chrono::{Duration, NaiveDate};
use std::collections::BTreeMap;
use tracing::debug;

/// Donut hole as a fraction of the radius.
const DONUT_HOLE: f64 = 0.5;
/// Largest scatter marker diameter, in pixels.
const SCATTER_SIZE_MAX: f64 = 20.0;
/// Fraction of the weekly span added on both sides of the x axis.
const WEEKLY_AXIS_PADDING: f64 = 0.1;

/// Builds a [`ChartSet`] from aggregation output.
#[derive(Debug, Clone, Default)]
pub struct ChartRenderer {
    theme: ChartTheme,
}

impl ChartRenderer {
    pub fn new(theme: ChartTheme) -> Self {
        Self { theme }
    }

    pub fn theme(&self) -> &ChartTheme {
        &self.theme
    }

    /// Render every chart with data. Charts whose source table is empty are
    /// left out of the set.
    pub fn render_all(&self, summaries: &Summaries) -> ChartSet {
        let mut set = ChartSet::new();
        let candidates = [
            self.region_pie(summaries),
            self.region_trend(summaries),
            self.region_bar_group(summaries),
            self.region_activity(summaries),
            self.trainer_payment(summaries),
            self.trainer_heatmap(summaries),
            self.trainer_efficiency(summaries),
            self.trainer_pie(summaries),
            self.trainer_trend(summaries),
            self.client_cost(summaries),
            self.client_scatter(summaries),
            self.payment_pie(summaries),
            self.payment_stack(summaries),
        ];
        for spec in candidates.into_iter().flatten() {
            set.insert(spec);
        }
        debug!("Rendered {} chart specs", set.len());
        set
    }

    fn spec(&self, id: ChartId, kind: ChartKind) -> ChartSpec {
        ChartSpec {
            id,
            title: id.title().to_string(),
            template: self.theme.template.clone(),
            x_label: None,
            y_label: None,
            currency: self.theme.currency.clone(),
            kind,
        }
    }

    fn cost_axis_label(&self) -> String {
        format!("Cost ({})", self.theme.currency)
    }

    fn donut<'a, I>(&self, id: ChartId, items: I) -> Option<ChartSpec>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let slices: Vec<Slice> = items
            .into_iter()
            .enumerate()
            .map(|(i, (label, value))| Slice {
                label: label.to_string(),
                value,
                color: self.theme.color(i).to_string(),
            })
            .collect();
        if slices.is_empty() {
            return None;
        }
        Some(self.spec(
            id,
            ChartKind::Donut {
                hole: DONUT_HOLE,
                slices,
            },
        ))
    }

    fn category_series(&self, index: usize, name: &str, values: Vec<f64>) -> CategorySeries {
        CategorySeries {
            name: name.to_string(),
            color: self.theme.color(index).to_string(),
            values,
        }
    }

    /// Region share of total cost.
    pub fn region_pie(&self, summaries: &Summaries) -> Option<ChartSpec> {
        self.donut(
            ChartId::RegionPie,
            summaries
                .regions
                .iter()
                .map(|r| (r.label.as_str(), r.total_cost)),
        )
    }

    /// Weekly cost per region.
    pub fn region_trend(&self, summaries: &Summaries) -> Option<ChartSpec> {
        self.weekly_line(ChartId::RegionTrend, &summaries.weekly_by_region)
    }

    /// Region total next to average session cost.
    pub fn region_bar_group(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let regions = &summaries.regions;
        if regions.is_empty() {
            return None;
        }
        let series = vec![
            self.category_series(0, "Total Cost", regions.iter().map(|r| r.total_cost).collect()),
            self.category_series(
                1,
                "Average Session Cost",
                regions.iter().map(|r| r.average_cost).collect(),
            ),
        ];
        Some(self.spec(
            ChartId::RegionBarGroup,
            ChartKind::Bar {
                mode: BarMode::Group,
                categories: labels(regions),
                series,
            },
        ))
    }

    /// Sessions and clients per region, busiest first.
    pub fn region_activity(&self, summaries: &Summaries) -> Option<ChartSpec> {
        if summaries.regions.is_empty() {
            return None;
        }
        let mut regions: Vec<&GroupSummary> = summaries.regions.iter().collect();
        regions.sort_by(|a, b| {
            b.session_count
                .cmp(&a.session_count)
                .then_with(|| a.label.cmp(&b.label))
        });
        let series = vec![
            self.category_series(
                0,
                "Session Count",
                regions.iter().map(|r| r.session_count as f64).collect(),
            ),
            self.category_series(
                1,
                "Client Count",
                regions.iter().map(|r| r.client_count as f64).collect(),
            ),
        ];
        Some(self.spec(
            ChartId::RegionActivity,
            ChartKind::Bar {
                mode: BarMode::Group,
                categories: regions.iter().map(|r| r.label.clone()).collect(),
                series,
            },
        ))
    }

    /// Trainer cost split by payment type, trainers ordered by total.
    pub fn trainer_payment(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let pivot = &summaries.trainer_payment;
        if pivot.is_empty() {
            return None;
        }
        let trainers = labels(&summaries.trainers);
        let series = pivot
            .column_labels
            .iter()
            .enumerate()
            .map(|(i, payment)| {
                let values = trainers.iter().map(|t| pivot.value(t, payment)).collect();
                self.category_series(i, payment, values)
            })
            .collect();
        let mut spec = self.spec(
            ChartId::TrainerPayment,
            ChartKind::Bar {
                mode: BarMode::Group,
                categories: trainers,
                series,
            },
        );
        spec.y_label = Some(self.cost_axis_label());
        Some(spec)
    }

    /// Region x trainer cost grid.
    pub fn trainer_heatmap(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let CrossTab {
            row_labels,
            column_labels,
            values,
            ..
        } = &summaries.region_trainer;
        if row_labels.is_empty() {
            return None;
        }
        let mut spec = self.spec(
            ChartId::TrainerHeatmap,
            ChartKind::Heatmap {
                x_labels: column_labels.clone(),
                y_labels: row_labels.clone(),
                z: values.clone(),
                colorscale: "Viridis".to_string(),
            },
        );
        spec.x_label = Some("Trainers".to_string());
        spec.y_label = Some("Regions".to_string());
        Some(spec)
    }

    /// Average session cost against average weekly cost per trainer.
    pub fn trainer_efficiency(&self, summaries: &Summaries) -> Option<ChartSpec> {
        if summaries.trainers.is_empty() {
            return None;
        }
        let mut trainers: Vec<&GroupSummary> = summaries.trainers.iter().collect();
        trainers.sort_by(|a, b| a.label.cmp(&b.label));
        let series = vec![
            self.category_series(
                0,
                "Average Cost",
                trainers.iter().map(|t| t.average_cost).collect(),
            ),
            self.category_series(
                1,
                "Average Weekly Cost",
                trainers.iter().map(|t| t.average_weekly_cost).collect(),
            ),
        ];
        Some(self.spec(
            ChartId::TrainerEfficiency,
            ChartKind::CategoryLine {
                categories: trainers.iter().map(|t| t.label.clone()).collect(),
                series,
            },
        ))
    }

    /// Trainer share of total cost.
    pub fn trainer_pie(&self, summaries: &Summaries) -> Option<ChartSpec> {
        self.donut(
            ChartId::TrainerPie,
            summaries
                .trainers
                .iter()
                .map(|t| (t.label.as_str(), t.total_cost)),
        )
    }

    /// Weekly cost per trainer.
    pub fn trainer_trend(&self, summaries: &Summaries) -> Option<ChartSpec> {
        self.weekly_line(ChartId::TrainerTrend, &summaries.weekly_by_trainer)
    }

    /// Total cost per client, most expensive first.
    pub fn client_cost(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let clients = &summaries.clients;
        if clients.is_empty() {
            return None;
        }
        Some(self.spec(
            ChartId::ClientCost,
            ChartKind::CategoryLine {
                categories: clients.iter().map(|c| c.client_name.clone()).collect(),
                series: vec![self.category_series(
                    0,
                    "Total Cost",
                    clients.iter().map(|c| c.total_cost).collect(),
                )],
            },
        ))
    }

    /// Sessions per client, sized by cost and coloured by region.
    pub fn client_scatter(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let clients = &summaries.clients;
        if clients.is_empty() {
            return None;
        }
        let max_cost = clients.iter().map(|c| c.total_cost).fold(0.0, f64::max);

        let mut by_region: BTreeMap<&str, Vec<ScatterPoint>> = BTreeMap::new();
        for (index, client) in clients.iter().enumerate() {
            by_region
                .entry(client.region.as_str())
                .or_default()
                .push(ScatterPoint {
                    category: index,
                    y: client.session_count as f64,
                    size_value: client.total_cost,
                    marker_size: marker_size(client.total_cost, max_cost),
                });
        }

        let series = by_region
            .into_iter()
            .enumerate()
            .map(|(i, (region, points))| ScatterSeries {
                name: region.to_string(),
                color: self.theme.color(i).to_string(),
                points,
            })
            .collect();

        let mut spec = self.spec(
            ChartId::ClientScatter,
            ChartKind::Scatter {
                categories: clients.iter().map(|c| c.client_name.clone()).collect(),
                series,
            },
        );
        spec.x_label = Some("Client Name".to_string());
        spec.y_label = Some("Session Count".to_string());
        Some(spec)
    }

    /// Payment type share of total cost.
    pub fn payment_pie(&self, summaries: &Summaries) -> Option<ChartSpec> {
        self.donut(
            ChartId::PaymentPie,
            summaries
                .payments
                .iter()
                .map(|p| (p.payment_type.as_str(), p.total_cost)),
        )
    }

    /// Region cost stacked by payment type.
    pub fn payment_stack(&self, summaries: &Summaries) -> Option<ChartSpec> {
        let pivot = &summaries.region_payment;
        if pivot.is_empty() {
            return None;
        }
        let series = pivot
            .column_labels
            .iter()
            .enumerate()
            .map(|(c, payment)| {
                let values = pivot.values.iter().map(|row| row[c]).collect();
                self.category_series(c, payment, values)
            })
            .collect();
        Some(self.spec(
            ChartId::PaymentStack,
            ChartKind::Bar {
                mode: BarMode::Stack,
                categories: pivot.row_labels.clone(),
                series,
            },
        ))
    }

    fn weekly_line(&self, id: ChartId, weekly: &[WeeklySeries]) -> Option<ChartSpec> {
        let (min, max) = week_bounds(weekly)?;
        let series = weekly
            .iter()
            .enumerate()
            .map(|(i, s)| TimeSeries {
                name: s.group.clone(),
                color: self.theme.color(i).to_string(),
                points: s.points.iter().map(|p| (p.week_start, p.total_cost)).collect(),
            })
            .collect();
        let mut spec = self.spec(
            id,
            ChartKind::WeeklyLine {
                x_range: padded_range(min, max),
                series,
            },
        );
        spec.x_label = Some("Week".to_string());
        spec.y_label = Some(self.cost_axis_label());
        Some(spec)
    }
}

fn labels(groups: &[GroupSummary]) -> Vec<String> {
    groups.iter().map(|g| g.label.clone()).collect()
}

/// Pad a date range by 10% of its span on both sides, rounded up to whole
/// days; a single-day range gets one day each side.
pub fn padded_range(min: NaiveDate, max: NaiveDate) -> (NaiveDate, NaiveDate) {
    let span = (max - min).num_days();
    let pad = if span > 0 {
        (span as f64 * WEEKLY_AXIS_PADDING).ceil() as i64
    } else {
        1
    };
    (min - Duration::days(pad), max + Duration::days(pad))
}

/// Marker diameter with area proportional to `value`.
fn marker_size(value: f64, max: f64) -> f64 {
    if max <= 0.0 {
        return SCATTER_SIZE_MAX / 2.0;
    }
    (value / max).sqrt() * SCATTER_SIZE_MAX
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::AggregationEngine;
    use crate::types::{ExpenseRecord, ExpenseTable};
    use pretty_assertions::assert_eq;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn summaries() -> Summaries {
        AggregationEngine::summarize(&ExpenseTable::new(vec![
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "Asha", "Cash", 100.0),
            ExpenseRecord::new(date(1, 1), "RegionA", "ClientX", "Asha", "UPI", 50.0),
            ExpenseRecord::new(date(1, 8), "RegionA", "ClientY", "Ravi", "Cash", 200.0),
            ExpenseRecord::new(date(1, 29), "RegionB", "ClientZ", "Ravi", "Card", 80.0),
        ]))
    }

    #[test]
    fn test_render_all_produces_every_chart() {
        let set = ChartRenderer::default().render_all(&summaries());
        assert_eq!(set.len(), ChartId::ALL.len());
        for id in ChartId::ALL {
            assert!(set.contains(id), "missing {}", id);
        }
    }

    #[test]
    fn test_empty_summaries_produce_no_charts() {
        let set = ChartRenderer::default().render_all(&Summaries::default());
        assert!(set.is_empty());
    }

    #[test]
    fn test_render_is_deterministic() {
        let renderer = ChartRenderer::default();
        let s = summaries();
        assert_eq!(renderer.render_all(&s), renderer.render_all(&s));
    }

    #[test]
    fn test_region_pie_slices_follow_totals() {
        let spec = ChartRenderer::default().region_pie(&summaries()).unwrap();
        let ChartKind::Donut { hole, slices } = spec.kind else {
            panic!("expected donut");
        };
        assert_eq!(hole, 0.5);
        assert_eq!(slices[0].label, "RegionA");
        assert_eq!(slices[0].value, 350.0);
        assert_eq!(slices[0].color, "#636EFA");
        assert_eq!(slices[1].color, "#EF553B");
    }

    #[test]
    fn test_weekly_trend_points_and_padding() {
        let spec = ChartRenderer::default().region_trend(&summaries()).unwrap();
        let ChartKind::WeeklyLine { x_range, series } = spec.kind else {
            panic!("expected weekly line");
        };
        assert_eq!(
            series[0].points,
            vec![(date(1, 1), 150.0), (date(1, 8), 200.0)]
        );
        // Weeks span 2024-01-01..2024-01-29 (28 days), padded by 3 days.
        assert_eq!(x_range, (date(1, 1) - Duration::days(3), date(1, 29) + Duration::days(3)));
    }

    #[test]
    fn test_padded_range_single_day() {
        assert_eq!(padded_range(date(1, 8), date(1, 8)), (date(1, 7), date(1, 9)));
    }

    #[test]
    fn test_trainer_payment_orders_trainers_by_total() {
        let spec = ChartRenderer::default().trainer_payment(&summaries()).unwrap();
        let ChartKind::Bar { mode, categories, series } = spec.kind else {
            panic!("expected bar");
        };
        assert_eq!(mode, BarMode::Group);
        assert_eq!(categories, vec!["Ravi", "Asha"]);
        let names: Vec<&str> = series.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Card", "Cash", "UPI"]);
        assert_eq!(series[1].values, vec![200.0, 100.0]);
    }

    #[test]
    fn test_client_scatter_marker_sizes() {
        let spec = ChartRenderer::default().client_scatter(&summaries()).unwrap();
        let ChartKind::Scatter { categories, series } = spec.kind else {
            panic!("expected scatter");
        };
        assert_eq!(categories[0], "ClientY");
        assert_eq!(series[0].name, "RegionA");
        assert_eq!(series[0].points[0].marker_size, SCATTER_SIZE_MAX);
        assert_eq!(series[1].name, "RegionB");
    }

    #[test]
    fn test_theme_currency_in_axis_label() {
        let theme = ChartTheme {
            currency: "INR".to_string(),
            ..ChartTheme::default()
        };
        let spec = ChartRenderer::new(theme).trainer_trend(&summaries()).unwrap();
        assert_eq!(spec.y_label.as_deref(), Some("Cost (INR)"));
        assert_eq!(spec.template, "plotly_white");
    }
}
