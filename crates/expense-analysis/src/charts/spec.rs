//! Chart specification types.
//!
//! A spec is plain data: labels, values and colours already resolved, so a
//! rasterizer or a frontend can draw it without touching the aggregates.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies every chart the dashboard renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartId {
    RegionPie,
    RegionTrend,
    RegionBarGroup,
    RegionActivity,
    TrainerPayment,
    TrainerHeatmap,
    TrainerEfficiency,
    TrainerPie,
    TrainerTrend,
    ClientCost,
    ClientScatter,
    PaymentPie,
    PaymentStack,
}

impl ChartId {
    pub const ALL: [ChartId; 13] = [
        ChartId::RegionPie,
        ChartId::RegionTrend,
        ChartId::RegionBarGroup,
        ChartId::RegionActivity,
        ChartId::TrainerPayment,
        ChartId::TrainerHeatmap,
        ChartId::TrainerEfficiency,
        ChartId::TrainerPie,
        ChartId::TrainerTrend,
        ChartId::ClientCost,
        ChartId::ClientScatter,
        ChartId::PaymentPie,
        ChartId::PaymentStack,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegionPie => "region_pie",
            Self::RegionTrend => "region_trend",
            Self::RegionBarGroup => "region_bar_group",
            Self::RegionActivity => "region_activity",
            Self::TrainerPayment => "trainer_payment",
            Self::TrainerHeatmap => "trainer_heatmap",
            Self::TrainerEfficiency => "trainer_efficiency",
            Self::TrainerPie => "trainer_pie",
            Self::TrainerTrend => "trainer_trend",
            Self::ClientCost => "client_cost",
            Self::ClientScatter => "client_scatter",
            Self::PaymentPie => "payment_pie",
            Self::PaymentStack => "payment_stack",
        }
    }

    /// Caption shown above the chart.
    pub fn title(&self) -> &'static str {
        match self {
            Self::RegionPie => "Regional Cost Distribution",
            Self::RegionTrend => "Weekly Cost Trends by Region",
            Self::RegionBarGroup => "Regional Cost Analysis: Total vs Average",
            Self::RegionActivity => "Regional Activity: Sessions & Clients",
            Self::TrainerPayment => "Trainer Expenses by Payment Method",
            Self::TrainerHeatmap => "Regional-Trainer Cost Heatmap",
            Self::TrainerEfficiency => "Trainer Cost Efficiency: Avg Cost vs Weekly Cost",
            Self::TrainerPie => "Trainer Expense Distribution",
            Self::TrainerTrend => "Weekly Cost Trends by Trainer",
            Self::ClientCost => "Client Cost Overview",
            Self::ClientScatter => "Client Session Analysis",
            Self::PaymentPie => "Payment Method Distribution",
            Self::PaymentStack => "Payment Methods by Region",
        }
    }
}

impl fmt::Display for ChartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One wedge of a donut chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub color: String,
}

/// Values aligned with a categorical axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorySeries {
    pub name: String,
    pub color: String,
    pub values: Vec<f64>,
}

/// Dated values on a continuous axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub name: String,
    pub color: String,
    pub points: Vec<(NaiveDate, f64)>,
}

/// A sized marker on a categorical x axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// Index into the chart's categories.
    pub category: usize,
    pub y: f64,
    /// Value the marker size encodes.
    pub size_value: f64,
    /// Marker diameter in pixels.
    pub marker_size: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterSeries {
    pub name: String,
    pub color: String,
    pub points: Vec<ScatterPoint>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BarMode {
    Group,
    Stack,
}

/// Chart geometry and data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartKind {
    Donut {
        /// Inner radius as a fraction of the outer radius.
        hole: f64,
        slices: Vec<Slice>,
    },
    Bar {
        mode: BarMode,
        categories: Vec<String>,
        series: Vec<CategorySeries>,
    },
    /// Lines over a categorical axis.
    CategoryLine {
        categories: Vec<String>,
        series: Vec<CategorySeries>,
    },
    /// Lines over weekly buckets.
    WeeklyLine {
        /// Padded axis range.
        x_range: (NaiveDate, NaiveDate),
        series: Vec<TimeSeries>,
    },
    Heatmap {
        x_labels: Vec<String>,
        y_labels: Vec<String>,
        /// `z[y][x]`.
        z: Vec<Vec<f64>>,
        colorscale: String,
    },
    Scatter {
        categories: Vec<String>,
        series: Vec<ScatterSeries>,
    },
}

/// A complete, renderable chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    pub id: ChartId,
    pub title: String,
    pub template: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_label: Option<String>,
    /// Currency prefix used for value labels.
    pub currency: String,
    pub kind: ChartKind,
}

/// Charts keyed by id, iterated in id order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartSet {
    charts: BTreeMap<ChartId, ChartSpec>,
}

impl ChartSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, spec: ChartSpec) {
        self.charts.insert(spec.id, spec);
    }

    pub fn get(&self, id: ChartId) -> Option<&ChartSpec> {
        self.charts.get(&id)
    }

    pub fn contains(&self, id: ChartId) -> bool {
        self.charts.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = ChartId> + '_ {
        self.charts.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChartSpec> {
        self.charts.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chart_id_names_are_snake_case() {
        for id in ChartId::ALL {
            let json = serde_json::to_string(&id).unwrap();
            assert_eq!(json, format!("\"{}\"", id.as_str()));
        }
    }

    #[test]
    fn test_kind_is_tagged() {
        let kind = ChartKind::Donut {
            hole: 0.5,
            slices: vec![],
        };
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "donut");
    }
}
