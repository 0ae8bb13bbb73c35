use std::{
    panic::{catch_unwind, AssertUnwindSafe},
    path::Path,
};

use plotly::{
    common::{ColorScale, ColorScaleElement, Title},
    contour::{Coloring, Contours},
    layout::{Axis, TickMode},
    Contour, ImageFormat, Layout, Plot,
};

use super::{RenderError, Renderer};
use crate::{colormap::Colormap, plot::PlotSpec};

/// Draws plots with plotly and exports them to PNG through kaleido.
#[derive(Debug, Clone)]
pub struct PlotlyRenderer {
    /// Resolution multiplier passed to kaleido
    pub scale: f64,
}

impl Default for PlotlyRenderer {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl Renderer for PlotlyRenderer {
    fn render(&self, spec: &PlotSpec, output: &Path) -> Result<(), RenderError> {
        if spec.values.is_empty() || spec.levels.len() < 2 {
            return Err(RenderError::EmptyPlot);
        }
        // kaleido panics rather than returning an error, so check what we can first
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() && !parent.is_dir() {
                return Err(RenderError::Save {
                    path: output.to_path_buf(),
                    reason: format!("directory {} does not exist", parent.display()),
                });
            }
        }

        let plot = build_plot(spec)?;
        let (width, height) = (spec.width as usize, spec.height as usize);
        let scale = self.scale;
        catch_unwind(AssertUnwindSafe(|| {
            plot.write_image(output, ImageFormat::PNG, width, height, scale)
        }))
        .map_err(|e| {
            let msg = e
                .downcast_ref::<String>()
                .cloned()
                .or_else(|| e.downcast_ref::<&str>().map(|s| s.to_string()))
                .unwrap_or_else(|| "kaleido failed for an unknown reason".to_string());
            RenderError::Export(msg)
        })?;

        if !output.exists() {
            return Err(RenderError::Save {
                path: output.to_path_buf(),
                reason: "kaleido did not create the file".to_string(),
            });
        }
        Ok(())
    }
}

fn build_plot(spec: &PlotSpec) -> Result<Plot, RenderError> {
    let nbands = spec.levels.len() - 1;
    let first = spec.levels[0];
    let last = spec.levels[nbands];
    let step = uniform_step(&spec.levels).ok_or_else(|| RenderError::UnevenLevels(spec.levels.clone()))?;

    // Column-form x/y/z so that the z range can be pinned to the outer levels
    let (mut x, mut y, mut z) = (Vec::new(), Vec::new(), Vec::new());
    for ((row, col), &v) in spec.values.indexed_iter() {
        x.push(col as f64);
        y.push(row as f64);
        z.push(v);
    }

    let trace = Contour::new(x, y, z)
        .contours(
            Contours::new()
                .coloring(Coloring::Fill)
                .start(first)
                .end(last)
                .size(step),
        )
        .zauto(false)
        .zmin(first)
        .zmax(last)
        .color_scale(band_color_scale(spec))
        .connect_gaps(false);

    let layout = Layout::new()
        .title(Title::new(&spec.title))
        .width(spec.width as usize)
        .height(spec.height as usize)
        .x_axis(tick_axis(&spec.x_label, &spec.x_ticks))
        .y_axis(tick_axis(&spec.y_label, &spec.y_ticks));

    let mut plot = Plot::new();
    plot.add_trace(trace);
    plot.set_layout(layout);
    Ok(plot)
}

/// Spacing of `levels` if they are evenly spaced. plotly contours only take a
/// start, end and step.
fn uniform_step(levels: &[f64]) -> Option<f64> {
    let nbands = levels.len().checked_sub(1).filter(|&n| n > 0)?;
    let step = (levels[nbands] - levels[0]) / nbands as f64;
    let tol = 1e-6 * step.abs();
    levels
        .windows(2)
        .all(|w| ((w[1] - w[0]) - step).abs() <= tol)
        .then_some(step)
}

fn tick_axis(label: &str, ticks: &[(usize, String)]) -> Axis {
    Axis::new()
        .title(Title::new(label))
        .tick_mode(TickMode::Array)
        .tick_values(ticks.iter().map(|(i, _)| *i as f64).collect())
        .tick_text(ticks.iter().map(|(_, s)| s.clone()).collect())
}

/// A stepped colour scale giving each band a single colour. Stops sit at the
/// levels' positions within the pinned z range.
fn band_color_scale(spec: &PlotSpec) -> ColorScale {
    let cmap = Colormap::named(spec.colormap);
    let nbands = spec.levels.len() - 1;
    let first = spec.levels[0];
    let span = spec.levels[nbands] - first;
    let elements = spec
        .levels
        .windows(2)
        .enumerate()
        .flat_map(|(band, w)| {
            let [r, g, b] = cmap.band_color(band, nbands);
            let color = format!("rgb({r},{g},{b})");
            let lo = (w[0] - first) / span;
            let hi = (w[1] - first) / span;
            [ColorScaleElement(lo, color.clone()), ColorScaleElement(hi, color)]
        })
        .collect();
    ColorScale::Vector(elements)
}
