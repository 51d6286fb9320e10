//! Configuration types for loading, charting and report export.
//!
//! Loader and report options use the builder pattern with validation on
//! `build()`. All types deserialize from JSON so a frontend can submit them
//! directly.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Loader configuration
// =============================================================================

/// How to treat a possible metadata line above the header row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MetadataRow {
    /// Skip the first line only if it starts with a run of separators.
    #[default]
    Auto,
    /// Always skip the first line.
    Skip,
    /// The first line is the header.
    Absent,
}

/// Configuration for reading an expense upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Field separator byte.
    /// Default: b','
    pub separator: u8,

    /// Metadata row handling.
    /// Default: Auto
    pub metadata_row: MetadataRow,

    /// Minimum run of leading separators that marks a metadata line in
    /// `Auto` mode.
    /// Default: 5
    pub metadata_separator_run: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            separator: b',',
            metadata_row: MetadataRow::default(),
            metadata_separator_run: 5,
        }
    }
}

impl LoaderConfig {
    /// Create a new configuration builder.
    pub fn builder() -> LoaderConfigBuilder {
        LoaderConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if matches!(self.separator, b'"' | b'\n' | b'\r') {
            return Err(ConfigValidationError::InvalidSeparator(self.separator as char));
        }

        if self.metadata_separator_run == 0 {
            return Err(ConfigValidationError::InvalidSeparatorRun(
                self.metadata_separator_run,
            ));
        }

        Ok(())
    }
}

/// Builder for [`LoaderConfig`].
#[derive(Debug, Default)]
pub struct LoaderConfigBuilder {
    separator: Option<u8>,
    metadata_row: Option<MetadataRow>,
    metadata_separator_run: Option<usize>,
}

impl LoaderConfigBuilder {
    /// Set the field separator.
    pub fn separator(mut self, separator: u8) -> Self {
        self.separator = Some(separator);
        self
    }

    /// Set how a leading metadata line is handled.
    pub fn metadata_row(mut self, mode: MetadataRow) -> Self {
        self.metadata_row = Some(mode);
        self
    }

    /// Set the minimum separator run that marks a metadata line.
    pub fn metadata_separator_run(mut self, run: usize) -> Self {
        self.metadata_separator_run = Some(run);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> Result<LoaderConfig, ConfigValidationError> {
        let defaults = LoaderConfig::default();
        let config = LoaderConfig {
            separator: self.separator.unwrap_or(defaults.separator),
            metadata_row: self.metadata_row.unwrap_or_default(),
            metadata_separator_run: self
                .metadata_separator_run
                .unwrap_or(defaults.metadata_separator_run),
        };

        config.validate()?;
        Ok(config)
    }
}

// =============================================================================
// Report configuration
// =============================================================================

/// Supported page sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum PageSize {
    A0,
    A1,
    A2,
    A3,
    #[default]
    A4,
    A5,
    A6,
    Letter,
    Legal,
}

impl PageSize {
    /// Every supported size, in selector order.
    pub const ALL: [PageSize; 9] = [
        PageSize::A0,
        PageSize::A1,
        PageSize::A2,
        PageSize::A3,
        PageSize::A4,
        PageSize::A5,
        PageSize::A6,
        PageSize::Letter,
        PageSize::Legal,
    ];

    /// Resolve a user-supplied name. Unrecognized or missing names fall back
    /// to A4.
    pub fn from_name(name: Option<&str>) -> Self {
        name.map(str::trim)
            .and_then(|n| {
                Self::ALL
                    .into_iter()
                    .find(|size| size.name().eq_ignore_ascii_case(n))
            })
            .unwrap_or_default()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::A0 => "A0",
            Self::A1 => "A1",
            Self::A2 => "A2",
            Self::A3 => "A3",
            Self::A4 => "A4",
            Self::A5 => "A5",
            Self::A6 => "A6",
            Self::Letter => "Letter",
            Self::Legal => "Legal",
        }
    }

    /// Portrait width and height in millimetres.
    pub fn dimensions_mm(&self) -> (f32, f32) {
        match self {
            Self::A0 => (841.0, 1189.0),
            Self::A1 => (594.0, 841.0),
            Self::A2 => (420.0, 594.0),
            Self::A3 => (297.0, 420.0),
            Self::A4 => (210.0, 297.0),
            Self::A5 => (148.0, 210.0),
            Self::A6 => (105.0, 148.0),
            Self::Letter => (215.9, 279.4),
            Self::Legal => (215.9, 355.6),
        }
    }
}

/// Unrecognized names deserialize to the A4 fallback instead of failing.
impl<'de> Deserialize<'de> for PageSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let name = Option::<String>::deserialize(deserializer)?;
        Ok(PageSize::from_name(name.as_deref()))
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

/// Which per-category sections the report includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionToggles {
    pub kpi: bool,
    pub region: bool,
    pub trainer: bool,
    pub client: bool,
    pub payment: bool,
}

impl Default for SectionToggles {
    fn default() -> Self {
        Self::all()
    }
}

impl SectionToggles {
    /// Every section enabled ("Select All Tables").
    pub fn all() -> Self {
        Self {
            kpi: true,
            region: true,
            trainer: true,
            client: true,
            payment: true,
        }
    }

    /// Every section disabled.
    pub fn none() -> Self {
        Self {
            kpi: false,
            region: false,
            trainer: false,
            client: false,
            payment: false,
        }
    }
}

/// Options consumed once per report export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOptions {
    /// Default: A4
    #[serde(default)]
    pub page_size: PageSize,

    /// Default: Portrait
    #[serde(default)]
    pub orientation: Orientation,

    /// Default: true
    #[serde(default = "default_true")]
    pub include_cover: bool,

    /// Default: all sections
    #[serde(default)]
    pub sections: SectionToggles,

    /// Pixel size of rasterized chart images.
    /// Default: (800, 500)
    #[serde(default = "default_chart_pixels")]
    pub chart_pixels: (u32, u32),
}

fn default_true() -> bool {
    true
}

fn default_chart_pixels() -> (u32, u32) {
    (800, 500)
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            page_size: PageSize::default(),
            orientation: Orientation::default(),
            include_cover: true,
            sections: SectionToggles::default(),
            chart_pixels: default_chart_pixels(),
        }
    }
}

impl ReportOptions {
    /// Create a new options builder.
    pub fn builder() -> ReportOptionsBuilder {
        ReportOptionsBuilder::default()
    }

    /// Page width and height in millimetres after applying orientation.
    pub fn page_dimensions_mm(&self) -> (f32, f32) {
        let (w, h) = self.page_size.dimensions_mm();
        match self.orientation {
            Orientation::Portrait => (w, h),
            Orientation::Landscape => (h, w),
        }
    }

    /// Validate the options and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        let (w, h) = self.chart_pixels;
        if !(100..=4000).contains(&w) || !(100..=4000).contains(&h) {
            return Err(ConfigValidationError::InvalidChartPixels(w, h));
        }
        Ok(())
    }
}

/// Builder for [`ReportOptions`].
#[derive(Debug, Default)]
pub struct ReportOptionsBuilder {
    page_size: Option<PageSize>,
    orientation: Option<Orientation>,
    include_cover: Option<bool>,
    sections: Option<SectionToggles>,
    chart_pixels: Option<(u32, u32)>,
}

impl ReportOptionsBuilder {
    /// Set the page size.
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = Some(size);
        self
    }

    /// Set the page size by name, falling back to A4 when unrecognized.
    pub fn page_size_name(mut self, name: &str) -> Self {
        self.page_size = Some(PageSize::from_name(Some(name)));
        self
    }

    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = Some(orientation);
        self
    }

    pub fn include_cover(mut self, include: bool) -> Self {
        self.include_cover = Some(include);
        self
    }

    pub fn sections(mut self, sections: SectionToggles) -> Self {
        self.sections = Some(sections);
        self
    }

    /// Set the pixel size used when rasterizing charts.
    pub fn chart_pixels(mut self, width: u32, height: u32) -> Self {
        self.chart_pixels = Some((width, height));
        self
    }

    /// Build the options.
    pub fn build(self) -> Result<ReportOptions, ConfigValidationError> {
        let options = ReportOptions {
            page_size: self.page_size.unwrap_or_default(),
            orientation: self.orientation.unwrap_or_default(),
            include_cover: self.include_cover.unwrap_or(true),
            sections: self.sections.unwrap_or_default(),
            chart_pixels: self.chart_pixels.unwrap_or_else(default_chart_pixels),
        };

        options.validate()?;
        Ok(options)
    }
}

// =============================================================================
// Chart theme
// =============================================================================

/// The Plotly qualitative palette.
pub const PLOTLY_PALETTE: [&str; 10] = [
    "#636EFA", "#EF553B", "#00CC96", "#AB63FA", "#FFA15A", "#19D3F3", "#FF6692", "#B6E880",
    "#FF97FF", "#FECB52",
];

/// Visual theme handed to the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartTheme {
    /// Series colours as `#RRGGBB`, cycled in order.
    pub palette: Vec<String>,
    /// Template name recorded in each chart spec.
    pub template: String,
    /// Currency prefix for labels and tables.
    pub currency: String,
}

impl Default for ChartTheme {
    fn default() -> Self {
        Self {
            palette: PLOTLY_PALETTE.iter().map(|c| c.to_string()).collect(),
            template: "plotly_white".to_string(),
            currency: "Rs.".to_string(),
        }
    }
}

impl ChartTheme {
    /// Colour for series `index`, cycling through the palette.
    pub fn color(&self, index: usize) -> &str {
        if self.palette.is_empty() {
            return PLOTLY_PALETTE[index % PLOTLY_PALETTE.len()];
        }
        &self.palette[index % self.palette.len()]
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid separator {0:?} (quotes and line breaks are not allowed)")]
    InvalidSeparator(char),

    #[error("Invalid metadata separator run: {0} (must be at least 1)")]
    InvalidSeparatorRun(usize),

    #[error("Invalid chart size {0}x{1} (each side must be between 100 and 4000 pixels)")]
    InvalidChartPixels(u32, u32),
}
