//! Expense Analysis Library
//!
//! Loads a trainer expense sheet, cleans it with Polars, and turns the
//! filtered rows into summaries, chart specifications, a paginated PDF
//! report and CSV exports.
//!
//! # Overview
//!
//! - **Loading**: separator-delimited files with an optional metadata line,
//!   day-first dates and currency-formatted costs
//! - **Filtering**: date range, region, client and trainer selections with
//!   cascading option lists
//! - **Aggregation**: KPIs, region/trainer/client/payment summaries, pivots
//!   and weekly series
//! - **Charts**: serializable chart specs plus a plotters rasterizer
//! - **Report**: a sectioned PDF built with printpdf
//! - **Export**: five CSV files written through Polars
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use expense_analysis::{AnalysisSession, FilterSelection, ReportOptions};
//!
//! let mut session = AnalysisSession::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//!
//! let summary = session.load_path("expenses.csv")?;
//! println!("Loaded {} rows ({} dropped)", summary.rows_read, summary.rows_dropped);
//!
//! session.apply_filters(FilterSelection::all().with_regions(["North"]))?;
//! println!("Total cost: {}", session.summaries()?.kpis.total_cost);
//!
//! let report = session.generate_report(&ReportOptions::default())?;
//! std::fs::write(&report.file_name, &report.bytes)?;
//! session.export_csv("exports")?;
//! ```
//!
//! # Configuration
//!
//! ```rust,ignore
//! use expense_analysis::config::*;
//!
//! let loader = LoaderConfig::builder()
//!     .separator(b';')
//!     .metadata_row(MetadataRow::Skip)
//!     .build()?;
//!
//! let report = ReportOptions::builder()
//!     .page_size_name("Letter")
//!     .orientation(Orientation::Landscape)
//!     .include_cover(false)
//!     .build()?;
//! ```

pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod loader;
pub mod progress;
pub mod report;
pub mod session;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use aggregate::{AggregationEngine, Kpis, Summaries};
pub use charts::{ChartId, ChartRasterizer, ChartRenderer, ChartSet, ChartSpec, PlottersRasterizer};
pub use config::{
    ChartTheme, ConfigValidationError, LoaderConfig, LoaderConfigBuilder, MetadataRow,
    Orientation, PageSize, ReportOptions, ReportOptionsBuilder, SectionToggles,
};
pub use error::{ExpenseError, Result as ExpenseResult, ResultExt};
pub use export::CsvExport;
pub use filter::{FilterEngine, FilterOptions};
pub use loader::{DataLoader, LoadSummary, LoadedData};
pub use progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate, SessionStage};
pub use report::{ReportAssembler, ReportDocument, ReportSection};
pub use session::{AnalysisSession, AnalysisSessionBuilder, SessionSnapshot};
pub use types::{ExpenseRecord, ExpenseTable, FilterSelection, SessionKey};
