//! The analysis session: one upload, its filters and everything derived
//! from them.
//!
//! A session loads a file once and keeps the cleaned table. Each filter
//! change recomputes the filtered rows, the summaries and the chart specs in
//! one synchronous pass. Reports and CSV exports read the current filtered
//! state and never modify it.

use crate::aggregate::{AggregationEngine, Summaries};
use crate::charts::{ChartRasterizer, ChartRenderer, ChartSet, PlottersRasterizer};
use crate::config::{ChartTheme, LoaderConfig, ReportOptions};
use crate::error::{ExpenseError, Result};
use crate::export::{self, CsvExport};
use crate::filter::{FilterEngine, FilterOptions};
use crate::loader::{DataLoader, LoadSummary, LoadedData};
use crate::progress::{ClosureProgressReporter, ProgressReporter, ProgressUpdate, SessionStage};
use crate::report::{ReportAssembler, ReportDocument};
use crate::types::{ExpenseTable, FilterSelection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Everything derived from the loaded table for the current selection.
#[derive(Debug, Clone)]
struct SessionState {
    raw: ExpenseTable,
    load_summary: LoadSummary,
    selection: FilterSelection,
    filtered: ExpenseTable,
    summaries: Summaries,
    charts: ChartSet,
}

/// Serializable view of the current session state.
#[derive(Debug, Serialize)]
pub struct SessionSnapshot<'a> {
    pub load_summary: &'a LoadSummary,
    pub selection: &'a FilterSelection,
    pub filter_options: FilterOptions,
    pub summaries: &'a Summaries,
    pub charts: &'a ChartSet,
}

impl SessionSnapshot<'_> {
    /// Pretty-printed JSON, as printed by the CLI's `--json` mode.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A single-user analysis session.
///
/// Use [`AnalysisSession::builder()`] to create one.
///
/// # Example
///
/// ```rust,ignore
/// use expense_analysis::{AnalysisSession, FilterSelection, ReportOptions};
///
/// let mut session = AnalysisSession::builder().build()?;
/// session.load_path("expenses.csv")?;
/// session.apply_filters(FilterSelection::all().with_regions(["North"]))?;
///
/// let document = session.generate_report(&ReportOptions::default())?;
/// std::fs::write(&document.file_name, &document.bytes)?;
/// ```
pub struct AnalysisSession {
    loader: DataLoader,
    renderer: ChartRenderer,
    rasterizer: Arc<dyn ChartRasterizer + Send + Sync>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
    state: Option<SessionState>,
}

static_assertions::assert_impl_all!(AnalysisSession: Send);

impl AnalysisSession {
    pub fn builder() -> AnalysisSessionBuilder {
        AnalysisSessionBuilder::default()
    }

    /// Load and clean a file, replacing any previous upload.
    pub fn load_path(&mut self, path: impl AsRef<Path>) -> Result<&LoadSummary> {
        self.report_progress(ProgressUpdate::new(
            SessionStage::Loading,
            0.0,
            "Reading uploaded file...",
        ));
        let loaded = self.loader.load_path(path);
        self.finish_load(loaded)
    }

    /// Load and clean an in-memory upload, replacing any previous upload.
    pub fn load_bytes(&mut self, bytes: &[u8]) -> Result<&LoadSummary> {
        self.report_progress(ProgressUpdate::new(
            SessionStage::Loading,
            0.0,
            "Reading uploaded file...",
        ));
        let loaded = self.loader.load_bytes(bytes);
        self.finish_load(loaded)
    }

    fn finish_load(&mut self, loaded: Result<LoadedData>) -> Result<&LoadSummary> {
        let start = Instant::now();
        let result = loaded.and_then(|loaded| {
            if loaded.table.is_empty() {
                return Err(ExpenseError::NoData(format!(
                    "no rows with a valid date and cost ({} dropped)",
                    loaded.summary.rows_dropped
                )));
            }
            self.report_progress(ProgressUpdate::new(
                SessionStage::Loading,
                1.0,
                format!("Loaded {} rows", loaded.table.len()),
            ));
            self.recompute(loaded.table, loaded.summary, FilterSelection::all())
        });

        match result {
            Ok(state) => {
                info!("Session ready in {:.2?}", start.elapsed());
                self.report_progress(ProgressUpdate::complete("Data loaded"));
                Ok(&self.state.insert(state).load_summary)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Apply a new filter selection and recompute summaries and charts.
    pub fn apply_filters(&mut self, selection: FilterSelection) -> Result<&Summaries> {
        let state = self.state.take().ok_or_else(not_loaded)?;
        match self.recompute(state.raw.clone(), state.load_summary.clone(), selection) {
            Ok(next) => {
                self.report_progress(ProgressUpdate::complete("Filters applied"));
                Ok(&self.state.insert(next).summaries)
            }
            Err(e) => {
                // Keep the previous selection usable.
                self.state = Some(state);
                Err(self.fail(e))
            }
        }
    }

    fn recompute(
        &self,
        raw: ExpenseTable,
        load_summary: LoadSummary,
        selection: FilterSelection,
    ) -> Result<SessionState> {
        self.report_progress(ProgressUpdate::new(
            SessionStage::Filtering,
            0.0,
            "Applying filters...",
        ));
        let filtered = FilterEngine::apply(&raw, &selection)?;
        info!("{} of {} rows match the selection", filtered.len(), raw.len());

        self.report_progress(ProgressUpdate::new(
            SessionStage::Aggregating,
            0.0,
            "Computing summaries...",
        ));
        let summaries = AggregationEngine::summarize(&filtered);

        self.report_progress(ProgressUpdate::new(
            SessionStage::Charting,
            0.0,
            "Building charts...",
        ));
        let charts = self.renderer.render_all(&summaries);

        Ok(SessionState {
            raw,
            load_summary,
            selection,
            filtered,
            summaries,
            charts,
        })
    }

    fn state(&self) -> Result<&SessionState> {
        self.state.as_ref().ok_or_else(not_loaded)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_some()
    }

    pub fn raw_table(&self) -> Result<&ExpenseTable> {
        Ok(&self.state()?.raw)
    }

    pub fn filtered_table(&self) -> Result<&ExpenseTable> {
        Ok(&self.state()?.filtered)
    }

    pub fn load_summary(&self) -> Result<&LoadSummary> {
        Ok(&self.state()?.load_summary)
    }

    pub fn selection(&self) -> Result<&FilterSelection> {
        Ok(&self.state()?.selection)
    }

    pub fn summaries(&self) -> Result<&Summaries> {
        Ok(&self.state()?.summaries)
    }

    pub fn charts(&self) -> Result<&ChartSet> {
        Ok(&self.state()?.charts)
    }

    /// Options each selector offers for `selection`.
    pub fn filter_options(&self, selection: &FilterSelection) -> Result<FilterOptions> {
        Ok(FilterOptions::cascade(&self.state()?.raw, selection))
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot<'_>> {
        let state = self.state()?;
        Ok(SessionSnapshot {
            load_summary: &state.load_summary,
            selection: &state.selection,
            filter_options: FilterOptions::cascade(&state.raw, &state.selection),
            summaries: &state.summaries,
            charts: &state.charts,
        })
    }

    /// Build the PDF report for the current filtered rows.
    pub fn generate_report(&self, options: &ReportOptions) -> Result<ReportDocument> {
        let state = self.state()?;
        self.report_progress(ProgressUpdate::new(
            SessionStage::ReportAssembly,
            0.0,
            "Generating PDF report...",
        ));
        let result = ReportAssembler::new(options.clone())
            .with_currency(self.renderer.theme().currency.clone())
            .assemble(&state.filtered, &state.charts, self.rasterizer.as_ref());

        match result {
            Ok(document) => {
                self.report_progress(ProgressUpdate::complete(format!(
                    "Report ready: {}",
                    document.file_name
                )));
                Ok(document)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Render the five CSV exports in memory.
    pub fn csv_exports(&self) -> Result<Vec<CsvExport>> {
        let state = self.state()?;
        self.report_progress(ProgressUpdate::new(
            SessionStage::Exporting,
            0.0,
            "Rendering CSV exports...",
        ));
        match export::csv_exports(&state.filtered) {
            Ok(exports) => {
                self.report_progress(ProgressUpdate::complete("CSV exports ready"));
                Ok(exports)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Write the five CSV exports into `dir`.
    pub fn export_csv(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let state = self.state()?;
        self.report_progress(ProgressUpdate::new(
            SessionStage::Exporting,
            0.0,
            "Writing CSV exports...",
        ));
        match export::export_to_dir(&state.filtered, dir.as_ref()) {
            Ok(paths) => {
                self.report_progress(ProgressUpdate::complete("CSV exports written"));
                Ok(paths)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn fail(&self, e: ExpenseError) -> ExpenseError {
        error!("Session error: {}", e);
        self.report_progress(ProgressUpdate::failed(e.to_string()));
        e
    }
}

fn not_loaded() -> ExpenseError {
    ExpenseError::NoData("no file has been loaded".to_string())
}

/// Builder for [`AnalysisSession`].
#[derive(Default)]
pub struct AnalysisSessionBuilder {
    loader_config: Option<LoaderConfig>,
    theme: Option<ChartTheme>,
    rasterizer: Option<Arc<dyn ChartRasterizer + Send + Sync>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(AnalysisSessionBuilder: Send);

impl AnalysisSessionBuilder {
    pub fn loader_config(mut self, config: LoaderConfig) -> Self {
        self.loader_config = Some(config);
        self
    }

    pub fn theme(mut self, theme: ChartTheme) -> Self {
        self.theme = Some(theme);
        self
    }

    /// Replace the plotters rasterizer used for report images.
    pub fn rasterizer(mut self, rasterizer: Arc<dyn ChartRasterizer + Send + Sync>) -> Self {
        self.rasterizer = Some(rasterizer);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    pub fn build(self) -> Result<AnalysisSession> {
        let config = self.loader_config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| ExpenseError::InvalidConfig(e.to_string()))?;

        let rasterizer: Arc<dyn ChartRasterizer + Send + Sync> = match self.rasterizer {
            Some(rasterizer) => rasterizer,
            None => Arc::new(PlottersRasterizer),
        };

        Ok(AnalysisSession {
            loader: DataLoader::new(config),
            renderer: ChartRenderer::new(self.theme.unwrap_or_default()),
            rasterizer,
            progress_reporter: self.progress_reporter,
            state: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::{ChartSpec, RasterImage};
    use std::sync::Mutex;

    const CSV: &str = "Date,Region,Client Name,Cost,Name of Trainer,Payment Type\n\
        01/01/2024,RegionA,Client1,100,Asha,Cash\n\
        01/01/2024,RegionA,Client1,50,Asha,UPI\n\
        08/01/2024,RegionA,Client2,200,Ravi,Cash\n\
        09/01/2024,RegionB,Client3,75,Ravi,UPI\n";

    struct BlankRasterizer;

    impl ChartRasterizer for BlankRasterizer {
        fn rasterize(&self, _: &ChartSpec, _: u32, _: u32) -> Result<RasterImage> {
            Ok(RasterImage {
                width: 2,
                height: 2,
                rgb: vec![255; 12],
            })
        }
    }

    fn session() -> AnalysisSession {
        let mut session = AnalysisSession::builder()
            .rasterizer(Arc::new(BlankRasterizer))
            .build()
            .unwrap();
        session.load_bytes(CSV.as_bytes()).unwrap();
        session
    }

    #[test]
    fn test_operations_before_load_are_no_data() {
        let session = AnalysisSession::builder().build().unwrap();
        assert!(!session.is_loaded());
        assert_eq!(session.summaries().unwrap_err().error_code(), "NO_DATA");
        assert_eq!(
            session
                .generate_report(&ReportOptions::default())
                .unwrap_err()
                .error_code(),
            "NO_DATA"
        );
    }

    #[test]
    fn test_load_computes_everything() {
        let session = session();
        assert_eq!(session.raw_table().unwrap().len(), 4);
        assert_eq!(session.filtered_table().unwrap().len(), 4);
        let summaries = session.summaries().unwrap();
        assert_eq!(summaries.kpis.total_cost, 425.0);
        assert!(!session.charts().unwrap().is_empty());
    }

    #[test]
    fn test_apply_filters_recomputes() {
        let mut session = session();
        let summaries = session
            .apply_filters(FilterSelection::all().with_regions(["RegionA"]))
            .unwrap();
        assert_eq!(summaries.kpis.total_cost, 350.0);
        assert_eq!(summaries.kpis.session_count, 2);
        assert_eq!(session.raw_table().unwrap().len(), 4);
        assert_eq!(session.filtered_table().unwrap().len(), 3);
    }

    #[test]
    fn test_invalid_filter_keeps_previous_state() {
        let mut session = session();
        let from = chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let to = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let err = session
            .apply_filters(FilterSelection::all().with_date_range(from, to))
            .unwrap_err();
        assert_eq!(err.error_code(), "INVALID_FILTER");
        assert!(session.is_loaded());
        assert_eq!(session.filtered_table().unwrap().len(), 4);
    }

    #[test]
    fn test_filter_to_nothing_yields_empty_outputs() {
        let mut session = session();
        session
            .apply_filters(FilterSelection::all().with_regions(["Nowhere"]))
            .unwrap();
        assert!(session.charts().unwrap().is_empty());
        assert_eq!(session.summaries().unwrap().kpis.total_cost, 0.0);
        let document = session.generate_report(&ReportOptions::default()).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_all_rows_dropped_is_no_data() {
        let mut session = AnalysisSession::builder().build().unwrap();
        let csv = "Date,Region,Client Name,Cost,Name of Trainer,Payment Type\n\
            not a date,RegionA,Client1,100,Asha,Cash\n";
        let err = session.load_bytes(csv.as_bytes()).unwrap_err();
        assert_eq!(err.error_code(), "NO_DATA");
        assert!(!session.is_loaded());
    }

    #[test]
    fn test_report_and_exports() {
        let session = session();
        let document = session.generate_report(&ReportOptions::default()).unwrap();
        assert!(document.bytes.starts_with(b"%PDF"));
        assert!(document.omitted_charts.is_empty());

        let exports = session.csv_exports().unwrap();
        assert_eq!(exports.len(), 5);
    }

    #[test]
    fn test_progress_ends_with_complete() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&stages);
        let mut session = AnalysisSession::builder()
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap();
        session.load_bytes(CSV.as_bytes()).unwrap();

        let stages = stages.lock().unwrap();
        assert_eq!(stages.first(), Some(&SessionStage::Loading));
        assert!(stages.contains(&SessionStage::Charting));
        assert_eq!(stages.last(), Some(&SessionStage::Complete));
    }

    #[test]
    fn test_snapshot_serializes() {
        let session = session();
        let json = serde_json::to_value(session.snapshot().unwrap()).unwrap();
        assert_eq!(json["summaries"]["kpis"]["session_count"], 3);
        assert!(json["charts"]["region_pie"].is_object());
        assert_eq!(json["filter_options"]["regions"][0], "RegionA");
    }

    #[test]
    fn test_snapshot_to_json_is_pretty_printed() {
        let session = session();
        let text = session.snapshot().unwrap().to_json().unwrap();
        assert!(text.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["load_summary"]["rows_dropped"], 0);
        assert_eq!(value["summaries"]["kpis"]["session_count"], 3);
    }
}
