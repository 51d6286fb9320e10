//! Progress reporting for session actions.
//!
//! Every session action (load, filter change, report, export) runs one
//! synchronous pass and reports the stages it moves through. A UI can show
//! a progress bar; the CLI logs them.
//!
//! # Example
//!
//! ```rust,ignore
//! use expense_analysis::AnalysisSession;
//!
//! let session = AnalysisSession::builder()
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stages a session action passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStage {
    /// Reading and cleaning the uploaded file
    Loading,
    /// Applying the filter selection
    Filtering,
    /// Computing summaries and pivots
    Aggregating,
    /// Building chart specs
    Charting,
    /// Laying out and writing the PDF
    ReportAssembly,
    /// Writing CSV files
    Exporting,
    Complete,
    Failed,
}

impl SessionStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Loading => "Loading Data",
            Self::Filtering => "Applying Filters",
            Self::Aggregating => "Aggregating",
            Self::Charting => "Building Charts",
            Self::ReportAssembly => "Generating Report",
            Self::Exporting => "Exporting CSV",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }

    /// Share of a full load pass (load, filter, aggregate, chart) this stage
    /// accounts for. Report and export actions run as their own pass.
    pub fn weight(&self) -> f32 {
        match self {
            Self::Loading => 0.40,
            Self::Filtering => 0.15,
            Self::Aggregating => 0.25,
            Self::Charting => 0.20,
            Self::ReportAssembly | Self::Exporting => 1.0,
            Self::Complete | Self::Failed => 0.0,
        }
    }

    /// Cumulative progress at the start of this stage.
    pub fn base_progress(&self) -> f32 {
        match self {
            Self::Loading => 0.0,
            Self::Filtering => 0.40,
            Self::Aggregating => 0.55,
            Self::Charting => 0.80,
            Self::ReportAssembly | Self::Exporting => 0.0,
            Self::Complete => 1.0,
            Self::Failed => 0.0,
        }
    }
}

/// One progress event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: SessionStage,

    /// Overall progress of the current action (0.0 - 1.0)
    pub progress: f32,

    /// Progress within the stage (0.0 - 1.0)
    pub stage_progress: f32,

    pub message: String,
}

impl ProgressUpdate {
    pub fn new(stage: SessionStage, stage_progress: f32, message: impl Into<String>) -> Self {
        let stage_progress = stage_progress.clamp(0.0, 1.0);
        let progress = stage.base_progress() + stage.weight() * stage_progress;
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            stage_progress,
            message: message.into(),
        }
    }

    pub fn complete(message: impl Into<String>) -> Self {
        Self {
            stage: SessionStage::Complete,
            progress: 1.0,
            stage_progress: 1.0,
            message: message.into(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            stage: SessionStage::Failed,
            progress: 0.0,
            stage_progress: 0.0,
            message: message.into(),
        }
    }
}

/// Receives progress updates from a session.
///
/// Implementations must be `Send + Sync` so a session can be moved to a
/// worker thread while the reporter forwards events to a UI.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_load_pass_weights_sum_to_one() {
        let total: f32 = [
            SessionStage::Loading,
            SessionStage::Filtering,
            SessionStage::Aggregating,
            SessionStage::Charting,
        ]
        .iter()
        .map(SessionStage::weight)
        .sum();
        assert!((total - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_progress_is_cumulative() {
        let update = ProgressUpdate::new(SessionStage::Aggregating, 0.5, "halfway");
        assert!((update.progress - 0.675).abs() < 1e-6);
        assert_eq!(update.stage_progress, 0.5);
    }

    #[test]
    fn test_progress_is_clamped() {
        let update = ProgressUpdate::new(SessionStage::Charting, 3.0, "over");
        assert_eq!(update.stage_progress, 1.0);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_standalone_stage_spans_full_range() {
        let update = ProgressUpdate::new(SessionStage::ReportAssembly, 1.0, "done");
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_closure_reporter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            sink.lock().unwrap().push(update.stage);
        });
        reporter.report(ProgressUpdate::new(SessionStage::Loading, 0.0, "start"));
        reporter.report(ProgressUpdate::complete("done"));
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SessionStage::Loading, SessionStage::Complete]
        );
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&SessionStage::ReportAssembly).unwrap();
        assert_eq!(json, "\"report_assembly\"");
    }
}
