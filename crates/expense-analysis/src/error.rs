//! Error types for expense analysis.
//!
//! This module provides the error hierarchy used at the session boundary,
//! built with `thiserror`. Lower-level helpers return `anyhow::Result` and
//! are mapped into these variants where they surface to a caller.
//!
//! Errors serialize as `{ code, message }` so a UI layer can render them
//! without matching on the enum.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for expense analysis.
#[derive(Error, Debug)]
pub enum ExpenseError {
    /// Required columns are absent from the uploaded table.
    #[error(
        "The uploaded file is missing the following required columns: {}. Available columns: {}",
        .missing.join(", "),
        .found.join(", ")
    )]
    Schema {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// No rows survived cleaning, or no data has been loaded yet.
    #[error("No data available: {0}")]
    NoData(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A filter selection could not be applied (e.g. inverted date range).
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    /// Report assembly or PDF serialization failed.
    #[error("Failed to generate report: {0}")]
    ReportGeneration(String),

    /// A chart could not be rasterized.
    #[error("Failed to render chart '{chart}': {reason}")]
    ChartRender { chart: String, reason: String },

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ExpenseError>,
    },
}

impl ExpenseError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ExpenseError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Build a schema error from the missing and found column names.
    pub fn schema(missing: Vec<String>, found: Vec<String>) -> Self {
        ExpenseError::Schema { missing, found }
    }

    /// Get error code for frontend handling.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Schema { .. } => "SCHEMA_ERROR",
            Self::NoData(_) => "NO_DATA",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidFilter(_) => "INVALID_FILTER",
            Self::ReportGeneration(_) => "REPORT_GENERATION_FAILED",
            Self::ChartRender { .. } => "CHART_RENDER_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Missing column names, if this is (or wraps) a schema error.
    pub fn missing_columns(&self) -> Option<&[String]> {
        match self {
            Self::Schema { missing, .. } => Some(missing),
            Self::WithContext { source, .. } => source.missing_columns(),
            _ => None,
        }
    }

    /// Every error is recoverable at session level; the session can accept a
    /// new upload or new options afterwards. Only internal errors indicate a
    /// bug worth surfacing differently.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Internal(_) => false,
            Self::WithContext { source, .. } => source.is_recoverable(),
            _ => true,
        }
    }
}

/// Errors are serialized as a struct with `code` and `message` fields.
impl Serialize for ExpenseError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ExpenseError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for expense analysis operations.
pub type Result<T> = std::result::Result<T, ExpenseError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ExpenseError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            ExpenseError::NoData("empty".to_string()).error_code(),
            "NO_DATA"
        );
        assert_eq!(
            ExpenseError::schema(vec!["Cost".to_string()], vec![]).error_code(),
            "SCHEMA_ERROR"
        );
    }

    #[test]
    fn test_schema_message_lists_missing_and_found() {
        let error = ExpenseError::schema(
            vec!["Cost".to_string(), "Payment Type".to_string()],
            vec!["Date".to_string(), "Region".to_string()],
        );
        let message = error.to_string();
        assert!(message.contains("Cost, Payment Type"));
        assert!(message.contains("Date, Region"));
    }

    #[test]
    fn test_missing_columns_through_context() {
        let error = ExpenseError::schema(vec!["Cost".to_string()], vec![])
            .with_context("While loading upload");
        assert_eq!(error.missing_columns(), Some(&["Cost".to_string()][..]));
        assert_eq!(error.error_code(), "SCHEMA_ERROR");
    }

    #[test]
    fn test_is_recoverable() {
        assert!(ExpenseError::NoData("x".to_string()).is_recoverable());
        assert!(ExpenseError::ReportGeneration("x".to_string()).is_recoverable());
        assert!(!ExpenseError::Internal("bug".to_string()).is_recoverable());
    }

    #[test]
    fn test_error_serialization() {
        let error = ExpenseError::ReportGeneration("page overflow".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("REPORT_GENERATION_FAILED"));
        assert!(json.contains("page overflow"));
    }

    #[test]
    fn test_with_context() {
        let error = ExpenseError::InvalidConfig("separator".to_string())
            .with_context("During loading");
        assert!(error.to_string().contains("During loading"));
        assert_eq!(error.error_code(), "INVALID_CONFIG");
    }

    #[test]
    fn test_json_error_conversion() {
        let parse = serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err();
        let error: ExpenseError = parse.into();
        assert_eq!(error.error_code(), "JSON_ERROR");
    }
}
