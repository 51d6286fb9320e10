//! PDF report assembly.
//!
//! The assembler walks the section sequence Cover → KPI → Region → Trainer
//! → Client → Payment, skipping disabled sections, and turns each one into
//! layout blocks. Tables are recomputed from the filtered records so every
//! section stands on its own. Charts come from the session's [`ChartSet`]
//! and are rasterized on demand; a chart that fails to rasterize is logged
//! and left out while its table stays.
//!
//! # Example
//!
//! ```rust,ignore
//! use expense_analysis::report::ReportAssembler;
//! use expense_analysis::charts::PlottersRasterizer;
//!
//! let document = ReportAssembler::new(options)
//!     .assemble(&filtered, &charts, &PlottersRasterizer)?;
//! std::fs::write(&document.file_name, &document.bytes)?;
//! ```

mod layout;
mod pdf;

pub use layout::{Block, INCH, Layout, TableBlock};
pub use pdf::{MARGIN, PdfWriter};

use crate::aggregate::{Kpis, client_summary, group_summary, payment_shares};
use crate::charts::{ChartId, ChartRasterizer, ChartSet};
use crate::config::{ChartTheme, ReportOptions};
use crate::error::{ExpenseError, Result};
use crate::types::{ExpenseRecord, ExpenseTable};
use crate::utils::{format_currency, truncate_chars};
use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub const REPORT_TITLE: &str = "Expense Analysis Report";
const TOP_TRAINERS: usize = 10;
const TOP_CLIENTS: usize = 15;
const CLIENT_NAME_CHARS: usize = 20;

/// Report sections in document order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Cover,
    Kpi,
    Region,
    Trainer,
    Client,
    Payment,
}

impl ReportSection {
    pub fn first() -> Self {
        Self::Cover
    }

    /// The section after this one, `None` after Payment.
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Cover => Some(Self::Kpi),
            Self::Kpi => Some(Self::Region),
            Self::Region => Some(Self::Trainer),
            Self::Trainer => Some(Self::Client),
            Self::Client => Some(Self::Payment),
            Self::Payment => None,
        }
    }

    pub fn is_enabled(self, options: &ReportOptions) -> bool {
        match self {
            Self::Cover => options.include_cover,
            Self::Kpi => options.sections.kpi,
            Self::Region => options.sections.region,
            Self::Trainer => options.sections.trainer,
            Self::Client => options.sections.client,
            Self::Payment => options.sections.payment,
        }
    }

    /// Charts placed after the section table, with their size in inches.
    pub fn charts(self) -> &'static [(ChartId, f32, f32)] {
        match self {
            Self::Cover | Self::Kpi => &[],
            Self::Region => &[
                (ChartId::RegionPie, 6.0, 4.0),
                (ChartId::RegionTrend, 7.0, 4.0),
                (ChartId::RegionBarGroup, 7.0, 4.0),
            ],
            Self::Trainer => &[
                (ChartId::TrainerPie, 6.0, 4.0),
                (ChartId::TrainerEfficiency, 7.0, 4.0),
                (ChartId::TrainerPayment, 7.0, 4.0),
            ],
            Self::Client => &[
                (ChartId::ClientCost, 7.0, 4.0),
                (ChartId::ClientScatter, 7.0, 4.0),
            ],
            Self::Payment => &[
                (ChartId::PaymentPie, 6.0, 4.0),
                (ChartId::PaymentStack, 7.0, 4.0),
            ],
        }
    }
}

/// A finished report, fully in memory.
#[derive(Debug, Clone)]
pub struct ReportDocument {
    pub bytes: Vec<u8>,
    /// `expense_report_<YYYYmmdd_HHMMSS>.pdf`
    pub file_name: String,
    pub page_count: usize,
    /// Charts that failed to rasterize and were left out.
    pub omitted_charts: Vec<ChartId>,
}

/// Builds the PDF report for one filtered table.
#[derive(Debug, Clone)]
pub struct ReportAssembler {
    options: ReportOptions,
    currency: String,
    generated_at: Option<NaiveDateTime>,
}

impl ReportAssembler {
    pub fn new(options: ReportOptions) -> Self {
        Self {
            options,
            currency: ChartTheme::default().currency,
            generated_at: None,
        }
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    /// Pin the generation timestamp instead of reading the clock.
    pub fn with_generated_at(mut self, generated_at: NaiveDateTime) -> Self {
        self.generated_at = Some(generated_at);
        self
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Lay out and serialize the report.
    pub fn assemble(
        &self,
        table: &ExpenseTable,
        charts: &ChartSet,
        rasterizer: &dyn ChartRasterizer,
    ) -> Result<ReportDocument> {
        self.options
            .validate()
            .map_err(|e| ExpenseError::ReportGeneration(e.to_string()))?;

        let generated_at = self
            .generated_at
            .unwrap_or_else(|| Local::now().naive_local());
        info!(
            "Assembling report for {} records ({} page)",
            table.len(),
            self.options.page_size.name()
        );

        let layout = self.layout(table, charts, rasterizer, generated_at);
        let (bytes, page_count) = PdfWriter::new(REPORT_TITLE, self.options.page_dimensions_mm())
            .and_then(|writer| writer.render(&layout.blocks))
            .map_err(|e| ExpenseError::ReportGeneration(format!("{:#}", e)))?;

        info!(
            "Report complete: {} pages, {} bytes, {} charts omitted",
            page_count,
            bytes.len(),
            layout.omitted_charts.len()
        );

        Ok(ReportDocument {
            bytes,
            file_name: format!("expense_report_{}.pdf", generated_at.format("%Y%m%d_%H%M%S")),
            page_count,
            omitted_charts: layout.omitted_charts,
        })
    }

    /// Build the block layout without serializing it.
    pub fn layout(
        &self,
        table: &ExpenseTable,
        charts: &ChartSet,
        rasterizer: &dyn ChartRasterizer,
        generated_at: NaiveDateTime,
    ) -> Layout {
        let records = table.records.as_slice();
        let mut layout = Layout::default();

        if !self.options.include_cover {
            layout.push(Block::Title(REPORT_TITLE.to_string()));
            layout.push(Block::Paragraph {
                text: format!("Generated on {}", generated_at.format("%B %d, %Y")),
                centered: false,
            });
            layout.spacer(20.0);
        }

        let mut state = Some(ReportSection::first());
        while let Some(section) = state {
            if section.is_enabled(&self.options) {
                debug!("Laying out {:?} section", section);
                match section {
                    ReportSection::Cover => self.cover(&mut layout, records, generated_at),
                    ReportSection::Kpi => self.kpi(&mut layout, records),
                    ReportSection::Region => self.region(&mut layout, records),
                    ReportSection::Trainer => self.trainer(&mut layout, records),
                    ReportSection::Client => self.client(&mut layout, records),
                    ReportSection::Payment => self.payment(&mut layout, records),
                }
                self.place_charts(&mut layout, section, charts, rasterizer);
            }
            state = section.next();
        }

        layout
    }

    fn money(&self, value: f64) -> String {
        format_currency(&self.currency, value)
    }

    fn cover(&self, layout: &mut Layout, records: &[ExpenseRecord], generated_at: NaiveDateTime) {
        let kpis = Kpis::from_records(records);
        layout.push(Block::Title(REPORT_TITLE.to_string()));
        layout.spacer(50.0);
        layout.push(Block::Paragraph {
            text: format!(
                "Generated on: {}",
                generated_at.format("%B %d, %Y at %I:%M %p")
            ),
            centered: true,
        });
        layout.push(Block::Paragraph {
            text: format!("Total Records: {}", records.len()),
            centered: true,
        });
        layout.spacer(50.0);

        let rows = vec![
            vec!["Total Cost".to_string(), self.money(kpis.total_cost)],
            vec!["Total Sessions".to_string(), kpis.session_count.to_string()],
            vec!["Average Cost/Session".to_string(), self.money(kpis.average_cost)],
        ];
        layout.push(Block::Table(
            TableBlock::new(&["Key Metrics", "Value"], rows, vec![3.0 * INCH, 3.0 * INCH])
                .with_font_sizes(14.0, 12.0),
        ));
        layout.push(Block::PageBreak);
    }

    fn kpi(&self, layout: &mut Layout, records: &[ExpenseRecord]) {
        let kpis = Kpis::from_records(records);
        layout.push(Block::Heading("Key Performance Indicators".to_string()));
        let rows = vec![
            vec!["Total Cost".to_string(), self.money(kpis.total_cost)],
            vec!["Total Sessions".to_string(), kpis.session_count.to_string()],
            vec!["Average Cost per Session".to_string(), self.money(kpis.average_cost)],
        ];
        layout.push(Block::Table(TableBlock::new(
            &["Metric", "Value"],
            rows,
            vec![3.0 * INCH, 3.0 * INCH],
        )));
        layout.spacer(20.0);
    }

    fn region(&self, layout: &mut Layout, records: &[ExpenseRecord]) {
        let rows = group_summary(records, |r| r.region.as_str())
            .into_iter()
            .map(|s| {
                vec![
                    s.label,
                    self.money(s.total_cost),
                    s.session_count.to_string(),
                    s.client_count.to_string(),
                ]
            })
            .collect();
        layout.push(Block::Heading("Regional Summary".to_string()));
        layout.push(Block::Table(TableBlock::new(
            &["Region", "Total Cost", "Sessions", "Clients"],
            rows,
            vec![1.5 * INCH; 4],
        )));
        layout.spacer(20.0);
    }

    fn trainer(&self, layout: &mut Layout, records: &[ExpenseRecord]) {
        let rows = group_summary(records, |r| r.trainer_name.as_str())
            .into_iter()
            .take(TOP_TRAINERS)
            .map(|s| {
                vec![
                    s.label,
                    self.money(s.total_cost),
                    s.session_count.to_string(),
                    self.money(s.average_cost),
                ]
            })
            .collect();
        layout.push(Block::Heading("Trainer Summary".to_string()));
        layout.push(Block::Table(TableBlock::new(
            &["Trainer", "Total Cost", "Sessions", "Avg Cost"],
            rows,
            vec![2.0 * INCH, 1.5 * INCH, 1.0 * INCH, 1.5 * INCH],
        )));
        layout.spacer(20.0);
    }

    fn client(&self, layout: &mut Layout, records: &[ExpenseRecord]) {
        let rows = client_summary(records)
            .into_iter()
            .take(TOP_CLIENTS)
            .map(|s| {
                vec![
                    s.region,
                    truncate_chars(&s.client_name, CLIENT_NAME_CHARS),
                    self.money(s.total_cost),
                    s.session_count.to_string(),
                ]
            })
            .collect();
        layout.push(Block::Heading(format!("Client Summary (Top {})", TOP_CLIENTS)));
        layout.push(Block::Table(TableBlock::new(
            &["Region", "Client", "Total Cost", "Sessions"],
            rows,
            vec![1.2 * INCH, 2.0 * INCH, 1.5 * INCH, 1.3 * INCH],
        )));
        layout.spacer(20.0);
    }

    fn payment(&self, layout: &mut Layout, records: &[ExpenseRecord]) {
        let rows = payment_shares(records)
            .into_iter()
            .map(|s| {
                vec![
                    s.payment_type,
                    self.money(s.total_cost),
                    format!("{:.1}%", s.percentage),
                ]
            })
            .collect();
        layout.push(Block::Heading("Payment Method Distribution".to_string()));
        layout.push(Block::Table(TableBlock::new(
            &["Payment Type", "Total Cost", "Percentage"],
            rows,
            vec![2.0 * INCH; 3],
        )));
        layout.spacer(20.0);
    }

    fn place_charts(
        &self,
        layout: &mut Layout,
        section: ReportSection,
        charts: &ChartSet,
        rasterizer: &dyn ChartRasterizer,
    ) {
        let (px_width, px_height) = self.options.chart_pixels;
        let placements = section.charts();
        for (index, &(id, width_in, height_in)) in placements.iter().enumerate() {
            let Some(spec) = charts.get(id) else {
                debug!("Chart '{}' not available, skipping", id);
                continue;
            };
            match rasterizer.rasterize(spec, px_width, px_height) {
                Ok(image) => {
                    layout.push(Block::Image {
                        chart: id,
                        image,
                        size: (width_in * INCH, height_in * INCH),
                    });
                    layout.spacer(if index + 1 == placements.len() { 20.0 } else { 10.0 });
                }
                Err(e) => {
                    warn!("Omitting chart '{}' from report: {}", id, e);
                    layout.omitted_charts.push(id);
                }
            }
        }
    }
}
