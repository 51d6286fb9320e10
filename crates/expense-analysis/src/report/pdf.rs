//! Paginating PDF writer for report blocks, built on `printpdf`.
//!
//! Layout runs top-down in points; printpdf places content bottom-up in
//! millimetres, so every draw call goes through [`PageCursor::to_pdf_y`].

use super::layout::{ACCENT, Block, INCH, ROW_FILL, TableBlock};
use crate::charts::RasterImage;
use anyhow::{Context, Result, anyhow};
use printpdf::image_crate::{DynamicImage, RgbImage};
use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, Image as PdfImage, ImageTransform, IndirectFontRef, Line, Mm,
    PdfDocument, PdfDocumentReference, PdfLayerReference, Point, Polygon, Rgb,
};
use tracing::debug;

const MM_PER_PT: f32 = 25.4 / INCH;
/// Page margin on every side.
pub const MARGIN: f32 = 30.0;
const LINE_SPACING: f32 = 1.2;
/// Average Helvetica glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f32 = 0.5;
const BOLD_GLYPH_WIDTH: f32 = 0.55;
const CELL_PADDING: f32 = 6.0;
const HEADER_BOTTOM_PADDING: f32 = 12.0;

const TITLE_SIZE: f32 = 24.0;
const HEADING_SIZE: f32 = 16.0;
const PARAGRAPH_SIZE: f32 = 12.0;

fn mm(points: f32) -> Mm {
    Mm(points * MM_PER_PT)
}

fn rgb((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(Rgb::new(
        r as f32 / 255.0,
        g as f32 / 255.0,
        b as f32 / 255.0,
        None,
    ))
}

const BLACK: (u8, u8, u8) = (0, 0, 0);
const WHITE_SMOKE: (u8, u8, u8) = (245, 245, 245);

/// Approximate rendered width of `text`.
fn text_width(text: &str, size: f32, bold: bool) -> f32 {
    let factor = if bold { BOLD_GLYPH_WIDTH } else { GLYPH_WIDTH };
    text.chars().count() as f32 * size * factor
}

/// Greedy word wrap to `max_width`.
fn wrap_text(text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{} {}", current, word)
        };
        if !current.is_empty() && text_width(&candidate, size, false) > max_width {
            lines.push(std::mem::take(&mut current));
            current = word.to_string();
        } else {
            current = candidate;
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}

/// Cut `text` so it fits `max_width`, marking the cut with `..`.
fn fit_text(text: &str, size: f32, bold: bool, max_width: f32) -> String {
    if text_width(text, size, bold) <= max_width {
        return text.to_string();
    }
    let per_char = size * if bold { BOLD_GLYPH_WIDTH } else { GLYPH_WIDTH };
    let keep = ((max_width / per_char) as usize).saturating_sub(2);
    let mut cut: String = text.chars().take(keep).collect();
    cut.push_str("..");
    cut
}

/// Vertical position on the current page, measured from the top edge.
struct PageCursor {
    page_height: f32,
    y: f32,
}

impl PageCursor {
    fn to_pdf_y(&self, y_from_top: f32) -> Mm {
        mm(self.page_height - y_from_top)
    }
}

/// Writes blocks into a new PDF document, adding pages as content overflows.
pub struct PdfWriter {
    doc: PdfDocumentReference,
    layer: PdfLayerReference,
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    page_width: f32,
    page_height: f32,
    cursor: PageCursor,
    page_count: usize,
}

impl PdfWriter {
    /// Open a document with pages of `page_mm` (width, height).
    pub fn new(title: &str, page_mm: (f32, f32)) -> Result<Self> {
        let (width_mm, height_mm) = page_mm;
        let (doc, page, layer) = PdfDocument::new(title, Mm(width_mm), Mm(height_mm), "Layer 1");
        let regular = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .context("Failed to load Helvetica")?;
        let bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .context("Failed to load Helvetica-Bold")?;
        let layer = doc.get_page(page).get_layer(layer);
        let page_height = height_mm / MM_PER_PT;

        Ok(Self {
            doc,
            layer,
            regular,
            bold,
            page_width: width_mm / MM_PER_PT,
            page_height,
            cursor: PageCursor {
                page_height,
                y: MARGIN,
            },
            page_count: 1,
        })
    }

    fn content_width(&self) -> f32 {
        self.page_width - 2.0 * MARGIN
    }

    fn content_height(&self) -> f32 {
        self.page_height - 2.0 * MARGIN
    }

    fn remaining(&self) -> f32 {
        self.page_height - MARGIN - self.cursor.y
    }

    fn at_page_top(&self) -> bool {
        self.cursor.y <= MARGIN
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(
            mm(self.page_width),
            mm(self.page_height),
            format!("Layer {}", self.page_count + 1),
        );
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.cursor.y = MARGIN;
        self.page_count += 1;
    }

    /// Start a new page unless `height` fits below the cursor.
    fn ensure_space(&mut self, height: f32) {
        if height > self.remaining() && !self.at_page_top() {
            self.new_page();
        }
    }

    /// Render every block and serialize the document.
    pub fn render(mut self, blocks: &[Block]) -> Result<(Vec<u8>, usize)> {
        for block in blocks {
            match block {
                Block::Title(text) => self.title(text),
                Block::Heading(text) => self.heading(text),
                Block::Paragraph { text, centered } => self.paragraph(text, *centered),
                Block::Table(table) => self.table(table),
                Block::Image { chart, image, size } => self
                    .image(image, *size)
                    .with_context(|| format!("Failed to place chart '{}'", chart))?,
                Block::Spacer(height) => {
                    self.cursor.y = (self.cursor.y + height).min(self.page_height - MARGIN);
                }
                Block::PageBreak => {
                    if !self.at_page_top() {
                        self.new_page();
                    }
                }
            }
        }

        let page_count = self.page_count;
        debug!("Serializing PDF with {} pages", page_count);
        let bytes = self
            .doc
            .save_to_bytes()
            .map_err(|e| anyhow!("Failed to serialize PDF: {}", e))?;
        Ok((bytes, page_count))
    }

    fn text_at(&self, text: &str, size: f32, x: f32, baseline: f32, bold: bool) {
        let font = if bold { &self.bold } else { &self.regular };
        self.layer
            .use_text(text, size, mm(x), self.cursor.to_pdf_y(baseline), font);
    }

    fn centered_text(&self, text: &str, size: f32, baseline: f32, bold: bool) {
        let width = text_width(text, size, bold);
        let x = MARGIN + ((self.content_width() - width) / 2.0).max(0.0);
        self.text_at(text, size, x, baseline, bold);
    }

    fn title(&mut self, text: &str) {
        let height = TITLE_SIZE * LINE_SPACING;
        self.ensure_space(height);
        self.layer.set_fill_color(rgb(ACCENT));
        self.centered_text(text, TITLE_SIZE, self.cursor.y + TITLE_SIZE, true);
        self.cursor.y += height + 30.0;
    }

    fn heading(&mut self, text: &str) {
        let height = 12.0 + HEADING_SIZE * LINE_SPACING + 12.0;
        // Keep a heading with at least a table header underneath it.
        self.ensure_space(height + 40.0);
        self.cursor.y += 12.0;
        self.layer.set_fill_color(rgb(ACCENT));
        self.text_at(text, HEADING_SIZE, MARGIN, self.cursor.y + HEADING_SIZE, true);
        self.cursor.y += HEADING_SIZE * LINE_SPACING + 12.0;
    }

    fn paragraph(&mut self, text: &str, centered: bool) {
        let line_height = PARAGRAPH_SIZE * LINE_SPACING;
        self.layer.set_fill_color(rgb(BLACK));
        for line in wrap_text(text, PARAGRAPH_SIZE, self.content_width()) {
            self.ensure_space(line_height);
            let baseline = self.cursor.y + PARAGRAPH_SIZE;
            if centered {
                self.centered_text(&line, PARAGRAPH_SIZE, baseline, false);
            } else {
                self.text_at(&line, PARAGRAPH_SIZE, MARGIN, baseline, false);
            }
            self.cursor.y += line_height;
        }
        self.cursor.y += 10.0;
    }

    fn fill_rect(&self, x: f32, top: f32, width: f32, height: f32, color: (u8, u8, u8)) {
        let bottom = top + height;
        let ring = vec![
            (Point::new(mm(x), self.cursor.to_pdf_y(top)), false),
            (Point::new(mm(x + width), self.cursor.to_pdf_y(top)), false),
            (Point::new(mm(x + width), self.cursor.to_pdf_y(bottom)), false),
            (Point::new(mm(x), self.cursor.to_pdf_y(bottom)), false),
        ];
        self.layer.set_fill_color(rgb(color));
        self.layer.add_polygon(Polygon {
            rings: vec![ring],
            mode: PaintMode::Fill,
            winding_order: WindingOrder::NonZero,
        });
    }

    fn stroke_line(&self, from: (f32, f32), to: (f32, f32)) {
        self.layer.add_line(Line {
            points: vec![
                (Point::new(mm(from.0), self.cursor.to_pdf_y(from.1)), false),
                (Point::new(mm(to.0), self.cursor.to_pdf_y(to.1)), false),
            ],
            is_closed: false,
        });
    }

    /// Draw one row of cells with its background and grid.
    fn table_row(
        &self,
        cells: &[String],
        widths: &[f32],
        x0: f32,
        height: f32,
        header: bool,
        size: f32,
    ) {
        let total: f32 = widths.iter().sum();
        let top = self.cursor.y;
        self.fill_rect(x0, top, total, height, if header { ACCENT } else { ROW_FILL });

        self.layer.set_fill_color(rgb(if header { WHITE_SMOKE } else { BLACK }));
        let mut x = x0;
        for (cell, width) in cells.iter().zip(widths) {
            let text = fit_text(cell, size, header, width - 2.0 * CELL_PADDING);
            let text_w = text_width(&text, size, header);
            let baseline = top + CELL_PADDING / 2.0 + size;
            self.text_at(&text, size, x + (width - text_w) / 2.0, baseline, header);
            x += width;
        }

        self.layer.set_outline_color(rgb(BLACK));
        self.layer.set_outline_thickness(1.0);
        let bottom = top + height;
        self.stroke_line((x0, top), (x0 + total, top));
        self.stroke_line((x0, bottom), (x0 + total, bottom));
        let mut x = x0;
        self.stroke_line((x, top), (x, bottom));
        for width in widths {
            x += width;
            self.stroke_line((x, top), (x, bottom));
        }
    }

    fn table(&mut self, table: &TableBlock) {
        let available = self.content_width();
        let natural = table.total_width();
        let scale = if natural > available && natural > 0.0 {
            available / natural
        } else {
            1.0
        };
        let widths: Vec<f32> = table.column_widths.iter().map(|w| w * scale).collect();
        let total: f32 = widths.iter().sum();
        let x0 = MARGIN + (available - total).max(0.0) / 2.0;

        let header_height =
            table.header_font_size * LINE_SPACING + CELL_PADDING / 2.0 + HEADER_BOTTOM_PADDING;
        let row_height = table.body_font_size * LINE_SPACING + CELL_PADDING;

        self.ensure_space(header_height + row_height);
        self.table_row(&table.header, &widths, x0, header_height, true, table.header_font_size);
        self.cursor.y += header_height;

        for row in &table.rows {
            if row_height > self.remaining() {
                self.new_page();
                self.table_row(&table.header, &widths, x0, header_height, true, table.header_font_size);
                self.cursor.y += header_height;
            }
            self.table_row(row, &widths, x0, row_height, false, table.body_font_size);
            self.cursor.y += row_height;
        }
    }

    fn image(&mut self, image: &RasterImage, (width, height): (f32, f32)) -> Result<()> {
        let fit = (self.content_width() / width)
            .min(self.content_height() / height)
            .min(1.0);
        let (width, height) = (width * fit, height * fit);
        self.ensure_space(height);

        let buffer = RgbImage::from_raw(image.width, image.height, image.rgb.clone())
            .ok_or_else(|| anyhow!("pixel buffer does not match {}x{}", image.width, image.height))?;
        let pdf_image = PdfImage::from_dynamic_image(&DynamicImage::ImageRgb8(buffer));

        // Scale by dpi so the pixel width lands on the target width.
        let dpi = image.width as f32 * INCH / width;
        let x = MARGIN + (self.content_width() - width) / 2.0;
        pdf_image.add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(mm(x)),
                translate_y: Some(self.cursor.to_pdf_y(self.cursor.y + height)),
                dpi: Some(dpi),
                ..Default::default()
            },
        );
        self.cursor.y += height;
        Ok(())
    }
}
