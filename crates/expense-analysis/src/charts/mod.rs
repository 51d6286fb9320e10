//! Chart specifications and rasterization.
//!
//! [`ChartRenderer`] is a pure mapping from aggregation output to a
//! [`ChartSet`]; the same summaries always produce the same specs.
//! [`ChartRasterizer`] turns a spec into pixels for the PDF report.

mod raster;
mod renderer;
mod spec;

pub use raster::{ChartRasterizer, PlottersRasterizer, RasterImage};
pub use renderer::{ChartRenderer, padded_range};
pub use spec::{
    BarMode, CategorySeries, ChartId, ChartKind, ChartSet, ChartSpec, ScatterPoint,
    ScatterSeries, Slice, TimeSeries,
};
