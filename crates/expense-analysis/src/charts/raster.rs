//! Chart rasterization.
//!
//! [`ChartRasterizer`] turns a [`ChartSpec`] into an RGB image. The default
//! [`PlottersRasterizer`] draws into an in-memory bitmap with plotters.
//! Failures are reported per chart so a caller can skip the image and go on.

use super::spec::{BarMode, CategorySeries, ChartKind, ChartSpec, ScatterSeries, Slice, TimeSeries};
use crate::error::{ExpenseError, Result};
use crate::utils::{format_si, truncate_chars};
use chrono::{Duration, NaiveDate};
use plotters::coord::Shift;
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::f64::consts::PI;

type DrawResult<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

const FONT: &str = "sans-serif";
const MAX_AXIS_LABEL_CHARS: usize = 14;

/// A rasterized chart, 8-bit RGB, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

/// Converts chart specs to images.
pub trait ChartRasterizer {
    fn rasterize(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<RasterImage>;
}

/// Draws charts with the plotters bitmap backend.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlottersRasterizer;

impl ChartRasterizer for PlottersRasterizer {
    fn rasterize(&self, spec: &ChartSpec, width: u32, height: u32) -> Result<RasterImage> {
        let render_err = |reason: String| ExpenseError::ChartRender {
            chart: spec.id.to_string(),
            reason,
        };
        if width == 0 || height == 0 {
            return Err(render_err(format!("invalid image size {}x{}", width, height)));
        }

        let mut rgb = vec![0u8; width as usize * height as usize * 3];
        draw_chart(spec, &mut rgb, (width, height)).map_err(|e| render_err(e.to_string()))?;

        Ok(RasterImage { width, height, rgb })
    }
}

fn draw_chart(spec: &ChartSpec, buffer: &mut [u8], size: (u32, u32)) -> DrawResult<()> {
    let root = BitMapBackend::with_buffer(buffer, size).into_drawing_area();
    root.fill(&WHITE)?;

    match &spec.kind {
        ChartKind::Donut { hole, slices } => draw_donut(&root, spec, *hole, slices)?,
        ChartKind::Bar {
            mode,
            categories,
            series,
        } => draw_bars(&root, spec, *mode, categories, series)?,
        ChartKind::CategoryLine { categories, series } => {
            draw_category_lines(&root, spec, categories, series)?
        }
        ChartKind::WeeklyLine { x_range, series } => {
            draw_weekly_lines(&root, spec, *x_range, series)?
        }
        ChartKind::Heatmap {
            x_labels,
            y_labels,
            z,
            ..
        } => draw_heatmap(&root, spec, x_labels, y_labels, z)?,
        ChartKind::Scatter { categories, series } => {
            draw_scatter(&root, spec, categories, series)?
        }
    }

    root.present()?;
    Ok(())
}

/// Parse `#RRGGBB`; anything else is grey.
fn parse_hex(color: &str) -> RGBColor {
    let hex = color.trim_start_matches('#');
    let channel = |i: usize| {
        hex.get(i..i + 2)
            .and_then(|c| u8::from_str_radix(c, 16).ok())
    };
    match (hex.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => RGBColor(r, g, b),
        _ => RGBColor(128, 128, 128),
    }
}

/// Viridis colour for `t` in `[0, 1]`, linearly interpolated.
pub(crate) fn viridis(t: f64) -> RGBColor {
    const STOPS: [(u8, u8, u8); 5] = [
        (68, 1, 84),
        (59, 82, 139),
        (33, 145, 140),
        (94, 201, 98),
        (253, 231, 37),
    ];
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (STOPS.len() - 1) as f64;
    let i = (scaled.floor() as usize).min(STOPS.len() - 2);
    let f = scaled - i as f64;
    let lerp = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * f).round() as u8;
    let (a, b) = (STOPS[i], STOPS[i + 1]);
    RGBColor(lerp(a.0, b.0), lerp(a.1, b.1), lerp(a.2, b.2))
}

fn category_label(categories: &[String], x: f64) -> String {
    let rounded = x.round();
    if (x - rounded).abs() > 1e-6 || rounded < 0.0 {
        return String::new();
    }
    categories
        .get(rounded as usize)
        .map(|c| truncate_chars(c, MAX_AXIS_LABEL_CHARS))
        .unwrap_or_default()
}

fn value_ceiling(max: f64) -> f64 {
    if max.is_finite() && max > 0.0 { max * 1.15 } else { 1.0 }
}

fn draw_donut(root: &Area, spec: &ChartSpec, hole: f64, slices: &[Slice]) -> DrawResult<()> {
    let area = root.titled(&spec.title, (FONT, 22).into_font())?;
    let (width, height) = area.dim_in_pixel();
    let (plot, legend) = area.split_horizontally(width * 7 / 10);

    let cx = (width * 7 / 20) as i32;
    let cy = (height / 2) as i32;
    let outer = (width.min(height) as f64 * 0.4).min(width as f64 * 0.3);
    let inner = outer * hole;

    let total: f64 = slices.iter().map(|s| s.value).sum();
    let mut angle = -PI / 2.0;
    for slice in slices {
        if total <= 0.0 || slice.value <= 0.0 {
            continue;
        }
        let sweep = slice.value / total * 2.0 * PI;
        let steps = ((sweep / (2.0 * PI)) * 120.0).ceil().max(2.0) as usize;
        let mut points = vec![(cx, cy)];
        for step in 0..=steps {
            let a = angle + sweep * step as f64 / steps as f64;
            points.push((
                cx + (outer * a.cos()).round() as i32,
                cy + (outer * a.sin()).round() as i32,
            ));
        }
        plot.draw(&Polygon::new(points, parse_hex(&slice.color).filled()))?;

        let mid = angle + sweep / 2.0;
        let label_r = (outer + inner) / 2.0;
        let percent = format!("{:.1}%", slice.value / total * 100.0);
        let style = (FONT, 13)
            .into_font()
            .color(&WHITE)
            .pos(Pos::new(HPos::Center, VPos::Center));
        plot.draw(&Text::new(
            percent,
            (
                cx + (label_r * mid.cos()).round() as i32,
                cy + (label_r * mid.sin()).round() as i32,
            ),
            style,
        ))?;
        angle += sweep;
    }
    plot.draw(&Circle::new((cx, cy), inner.round() as i32, WHITE.filled()))?;

    for (i, slice) in slices.iter().enumerate() {
        let y = 20 + i as i32 * 22;
        let color = parse_hex(&slice.color);
        legend.draw(&Rectangle::new([(0, y), (12, y + 12)], color.filled()))?;
        let text = format!(
            "{} ({} {})",
            truncate_chars(&slice.label, MAX_AXIS_LABEL_CHARS),
            spec.currency,
            format_si(slice.value)
        );
        legend.draw(&Text::new(text, (18, y), (FONT, 13).into_font()))?;
    }
    Ok(())
}

fn draw_bars(
    root: &Area,
    spec: &ChartSpec,
    mode: BarMode,
    categories: &[String],
    series: &[CategorySeries],
) -> DrawResult<()> {
    let n = categories.len().max(1);
    let max = match mode {
        BarMode::Group => series
            .iter()
            .flat_map(|s| s.values.iter().copied())
            .fold(0.0, f64::max),
        BarMode::Stack => (0..categories.len())
            .map(|i| series.iter().map(|s| s.values.get(i).copied().unwrap_or(0.0)).sum::<f64>())
            .fold(0.0, f64::max),
    };

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..value_ceiling(max))?;

    let formatter = |x: &f64| category_label(categories, *x);
    let si = |y: &f64| format_si(*y);
    let mut mesh = chart.configure_mesh();
    mesh.disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&formatter)
        .y_label_formatter(&si);
    if let Some(label) = &spec.y_label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;

    let group_width = 0.8;
    let bar_width = match mode {
        BarMode::Group => group_width / series.len().max(1) as f64,
        BarMode::Stack => group_width,
    };
    let mut stacked = vec![0.0; categories.len()];

    for (s, serie) in series.iter().enumerate() {
        let color = parse_hex(&serie.color);
        let mut bars = Vec::new();
        let mut labels = Vec::new();
        for (i, value) in serie.values.iter().copied().enumerate() {
            let (x0, base) = match mode {
                BarMode::Group => (i as f64 - group_width / 2.0 + s as f64 * bar_width, 0.0),
                BarMode::Stack => (i as f64 - group_width / 2.0, stacked[i]),
            };
            let top = base + value;
            bars.push(Rectangle::new([(x0, base), (x0 + bar_width, top)], color.filled()));
            if value > 0.0 {
                labels.push(Text::new(
                    format_si(value),
                    (x0 + bar_width / 2.0, top),
                    (FONT, 11)
                        .into_font()
                        .color(&BLACK)
                        .pos(Pos::new(HPos::Center, VPos::Bottom)),
                ));
            }
            if mode == BarMode::Stack {
                stacked[i] = top;
            }
        }
        chart
            .draw_series(bars)?
            .label(serie.name.as_str())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        chart.draw_series(labels)?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_category_lines(
    root: &Area,
    spec: &ChartSpec,
    categories: &[String],
    series: &[CategorySeries],
) -> DrawResult<()> {
    let n = categories.len().max(1);
    let max = series
        .iter()
        .flat_map(|s| s.values.iter().copied())
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..value_ceiling(max))?;

    let formatter = |x: &f64| category_label(categories, *x);
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(n)
        .x_label_formatter(&formatter)
        .y_label_formatter(&|y: &f64| format_si(*y))
        .draw()?;

    for serie in series {
        let color = parse_hex(&serie.color);
        let points: Vec<(f64, f64)> = serie
            .values
            .iter()
            .enumerate()
            .map(|(i, v)| (i as f64, *v))
            .collect();
        draw_labelled_line(&mut chart, &serie.name, color, &points)?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_weekly_lines(
    root: &Area,
    spec: &ChartSpec,
    x_range: (NaiveDate, NaiveDate),
    series: &[TimeSeries],
) -> DrawResult<()> {
    let (start, end) = x_range;
    let span = (end - start).num_days().max(1) as f64;
    let max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|(_, v)| *v))
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..span, 0f64..value_ceiling(max))?;

    let date_label = |x: &f64| {
        (start + Duration::days(x.round() as i64))
            .format("%b %d")
            .to_string()
    };
    let si = |y: &f64| format_si(*y);
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(8)
        .x_label_formatter(&date_label)
        .y_label_formatter(&si);
    if let Some(label) = &spec.x_label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &spec.y_label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;

    for serie in series {
        let color = parse_hex(&serie.color);
        let points: Vec<(f64, f64)> = serie
            .points
            .iter()
            .map(|(date, v)| ((*date - start).num_days() as f64, *v))
            .collect();
        draw_labelled_line(&mut chart, &serie.name, color, &points)?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

fn draw_labelled_line<'a, 'b>(
    chart: &mut ChartContext<'a, BitMapBackend<'b>, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    name: &str,
    color: RGBColor,
    points: &[(f64, f64)],
) -> DrawResult<()> {
    chart
        .draw_series(LineSeries::new(points.iter().copied(), color.stroke_width(2)))?
        .label(name)
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
    chart.draw_series(points.iter().map(|p| Circle::new(*p, 4, color.filled())))?;
    chart.draw_series(points.iter().map(|&(x, y)| {
        Text::new(
            format_si(y),
            (x, y),
            (FONT, 11)
                .into_font()
                .color(&BLACK)
                .pos(Pos::new(HPos::Center, VPos::Bottom)),
        )
    }))?;
    Ok(())
}

fn draw_heatmap(
    root: &Area,
    spec: &ChartSpec,
    x_labels: &[String],
    y_labels: &[String],
    z: &[Vec<f64>],
) -> DrawResult<()> {
    let nx = x_labels.len().max(1);
    let ny = y_labels.len().max(1);
    let max = z.iter().flatten().copied().fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(90)
        .build_cartesian_2d(-0.5f64..(nx as f64 - 0.5), -0.5f64..(ny as f64 - 0.5))?;

    let x_formatter = |x: &f64| category_label(x_labels, *x);
    let y_formatter = |y: &f64| category_label(y_labels, *y);
    let mut mesh = chart.configure_mesh();
    mesh.disable_mesh()
        .x_labels(nx)
        .y_labels(ny)
        .x_label_formatter(&x_formatter)
        .y_label_formatter(&y_formatter);
    if let Some(label) = &spec.x_label {
        mesh.x_desc(label.as_str());
    }
    if let Some(label) = &spec.y_label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;

    let cells: Vec<(f64, f64, f64)> = z
        .iter()
        .enumerate()
        .flat_map(|(row, values)| {
            values
                .iter()
                .enumerate()
                .map(move |(col, v)| (col as f64, row as f64, *v))
        })
        .collect();

    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        let t = if max > 0.0 { v / max } else { 0.0 };
        Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], viridis(t).filled())
    }))?;
    chart.draw_series(cells.iter().map(|&(x, y, v)| {
        let text_color: &RGBColor = if max > 0.0 && v / max > 0.6 { &BLACK } else { &WHITE };
        Text::new(
            format!("{:.0}", v),
            (x, y),
            (FONT, 12)
                .into_font()
                .color(text_color)
                .pos(Pos::new(HPos::Center, VPos::Center)),
        )
    }))?;
    Ok(())
}

fn draw_scatter(
    root: &Area,
    spec: &ChartSpec,
    categories: &[String],
    series: &[ScatterSeries],
) -> DrawResult<()> {
    let n = categories.len().max(1);
    let max = series
        .iter()
        .flat_map(|s| s.points.iter().map(|p| p.y))
        .fold(0.0, f64::max);

    let mut chart = ChartBuilder::on(root)
        .caption(&spec.title, (FONT, 22).into_font())
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..(n as f64 - 0.5), 0f64..value_ceiling(max))?;

    let formatter = |x: &f64| category_label(categories, *x);
    let mut mesh = chart.configure_mesh();
    mesh.x_labels(n).x_label_formatter(&formatter);
    if let Some(label) = &spec.y_label {
        mesh.y_desc(label.as_str());
    }
    mesh.draw()?;

    for serie in series {
        let color = parse_hex(&serie.color);
        chart
            .draw_series(serie.points.iter().map(|p| {
                Circle::new(
                    (p.category as f64, p.y),
                    (p.marker_size / 2.0).max(2.0).round() as i32,
                    color.mix(0.7).filled(),
                )
            }))?
            .label(serie.name.as_str())
            .legend(move |(x, y)| Circle::new((x + 5, y), 5, color.filled()));
        chart.draw_series(serie.points.iter().map(|p| {
            Text::new(
                format!("{}", p.y),
                (p.category as f64, p.y),
                (FONT, 11)
                    .into_font()
                    .color(&BLACK)
                    .pos(Pos::new(HPos::Center, VPos::Bottom)),
            )
        }))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::charts::spec::ChartId;

    fn donut_spec() -> ChartSpec {
        ChartSpec {
            id: ChartId::PaymentPie,
            title: ChartId::PaymentPie.title().to_string(),
            template: "plotly_white".to_string(),
            x_label: None,
            y_label: None,
            currency: "Rs.".to_string(),
            kind: ChartKind::Donut {
                hole: 0.5,
                slices: vec![Slice {
                    label: "Cash".to_string(),
                    value: 100.0,
                    color: "#636EFA".to_string(),
                }],
            },
        }
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#636EFA"), RGBColor(0x63, 0x6E, 0xFA));
        assert_eq!(parse_hex("oops"), RGBColor(128, 128, 128));
    }

    #[test]
    fn test_viridis_endpoints() {
        assert_eq!(viridis(0.0), RGBColor(68, 1, 84));
        assert_eq!(viridis(1.0), RGBColor(253, 231, 37));
        assert_eq!(viridis(f64::NAN), RGBColor(68, 1, 84));
    }

    #[test]
    fn test_category_label() {
        let categories = vec!["North".to_string(), "South".to_string()];
        assert_eq!(category_label(&categories, 1.0), "South");
        assert_eq!(category_label(&categories, 0.5), "");
        assert_eq!(category_label(&categories, 2.0), "");
    }

    #[test]
    fn test_zero_size_rejected() {
        let err = PlottersRasterizer.rasterize(&donut_spec(), 0, 100).unwrap_err();
        assert_eq!(err.error_code(), "CHART_RENDER_FAILED");
    }

    #[test]
    fn test_rasterize_fills_buffer_or_reports_chart() {
        // Font availability depends on the host; either outcome must be
        // well-formed.
        match PlottersRasterizer.rasterize(&donut_spec(), 320, 200) {
            Ok(image) => {
                assert_eq!(image.rgb.len(), 320 * 200 * 3);
                assert!(image.rgb.iter().any(|&b| b != 255));
            }
            Err(err) => assert!(err.to_string().contains("payment_pie")),
        }
    }
}
