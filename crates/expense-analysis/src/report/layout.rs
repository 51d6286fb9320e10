//! Block layout model consumed by the PDF writer.
//!
//! Sizes are in PDF points (1/72 inch).

use crate::charts::{ChartId, RasterImage};

pub const INCH: f32 = 72.0;

/// Accent colour for titles, headings and table headers (`#667eea`).
pub const ACCENT: (u8, u8, u8) = (0x66, 0x7e, 0xea);
/// Body row background of tables (beige).
pub const ROW_FILL: (u8, u8, u8) = (245, 245, 220);

/// One flowable element of the report.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Centered document title.
    Title(String),
    /// Section heading.
    Heading(String),
    Paragraph {
        text: String,
        centered: bool,
    },
    Table(TableBlock),
    Image {
        chart: ChartId,
        image: RasterImage,
        /// Target width and height before fitting to the page.
        size: (f32, f32),
    },
    /// Vertical gap.
    Spacer(f32),
    PageBreak,
}

/// A grid table with a styled header row.
#[derive(Debug, Clone, PartialEq)]
pub struct TableBlock {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
    pub column_widths: Vec<f32>,
    pub header_font_size: f32,
    pub body_font_size: f32,
}

impl TableBlock {
    /// Standard section table: 10pt header, 9pt body.
    pub fn new(header: &[&str], rows: Vec<Vec<String>>, column_widths: Vec<f32>) -> Self {
        Self {
            header: header.iter().map(|h| h.to_string()).collect(),
            rows,
            column_widths,
            header_font_size: 10.0,
            body_font_size: 9.0,
        }
    }

    /// Override the font sizes (the cover metrics table uses 14/12).
    pub fn with_font_sizes(mut self, header: f32, body: f32) -> Self {
        self.header_font_size = header;
        self.body_font_size = body;
        self
    }

    pub fn total_width(&self) -> f32 {
        self.column_widths.iter().sum()
    }
}

/// Blocks plus the charts that could not be rasterized.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    pub blocks: Vec<Block>,
    pub omitted_charts: Vec<ChartId>,
}

impl Layout {
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn spacer(&mut self, height: f32) {
        self.blocks.push(Block::Spacer(height));
    }

    /// Number of chart images placed.
    pub fn image_count(&self) -> usize {
        self.blocks
            .iter()
            .filter(|b| matches!(b, Block::Image { .. }))
            .count()
    }

    pub fn headings(&self) -> Vec<&str> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Heading(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn tables(&self) -> Vec<&TableBlock> {
        self.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Table(table) => Some(table),
                _ => None,
            })
            .collect()
    }
}
