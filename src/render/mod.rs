//! Drawing a [`PlotSpec`] to an image file.
//!
//! [`RasterRenderer`] is always available and writes PNGs directly. With the
//! `plotting` feature, [`PlotlyRenderer`] draws the same plot with `plotly`
//! and exports it through kaleido.
use std::path::{Path, PathBuf};

use crate::plot::PlotSpec;

mod font;
mod raster;
#[cfg(feature = "plotting")]
mod plotly_export;

pub use raster::RasterRenderer;
#[cfg(feature = "plotting")]
pub use plotly_export::PlotlyRenderer;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Plot has no data to draw")]
    EmptyPlot,
    #[error("Figure size {width}x{height} is too small, need at least {min_width}x{min_height} pixels with this font scale")]
    TooSmall {
        width: u32,
        height: u32,
        min_width: u32,
        min_height: u32,
    },
    #[error("Could not save plot to {}: {reason}", path.display())]
    Save { path: PathBuf, reason: String },
    #[error("Error exporting plot: {0}")]
    Export(String),
    #[error("Contour levels must be evenly spaced for this renderer, got {0:?}")]
    UnevenLevels(Vec<f64>),
    #[error("Renderer not available: {0}")]
    Unavailable(String),
}

/// Something that can draw a filled contour cross-section plot to a file.
pub trait Renderer {
    fn render(&self, spec: &PlotSpec, output: &Path) -> Result<(), RenderError>;
}

impl<R: Renderer + ?Sized> Renderer for &R {
    fn render(&self, spec: &PlotSpec, output: &Path) -> Result<(), RenderError> {
        (**self).render(spec, output)
    }
}

impl<R: Renderer + ?Sized> Renderer for Box<R> {
    fn render(&self, spec: &PlotSpec, output: &Path) -> Result<(), RenderError> {
        (**self).render(spec, output)
    }
}

/// The renderers that can be chosen at run time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum RendererKind {
    /// Built-in PNG renderer
    #[default]
    Raster,
    /// plotly with kaleido export, needs the `plotting` feature
    Plotly,
}

impl RendererKind {
    pub fn build(self) -> Result<Box<dyn Renderer>, RenderError> {
        match self {
            RendererKind::Raster => Ok(Box::new(RasterRenderer::default())),
            #[cfg(feature = "plotting")]
            RendererKind::Plotly => Ok(Box::new(PlotlyRenderer::default())),
            #[cfg(not(feature = "plotting"))]
            RendererKind::Plotly => Err(RenderError::Unavailable(
                "the plotly renderer requires compiling with the 'plotting' feature".to_string(),
            )),
        }
    }
}
