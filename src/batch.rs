//! Running the cross-section plot over every file matching an input pattern.
//!
//! For each file, [`run_batch`] applies the file name filter, opens the file,
//! computes the configured field and the model heights, interpolates the
//! cross-section, and renders it to `<output dir>/<file name><suffix>`. The
//! output directory is the configured prefix plus the name of the directory
//! the pattern searches in (see [`output_dir_name`]).
//!
//! What happens when one file fails depends on the [`FailurePolicy`].
use std::path::{Path, PathBuf};

use error_stack::{FrameKind, Report, ResultExt};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    config::{FieldKind, RunConfig},
    files::{ensure_output_dir, expand_pattern, output_dir_name, output_file_name},
    plot::PlotSpec,
    render::Renderer,
    units::{dbz_to_linear, linear_to_dbz},
    wrf::{self, FieldSource, WrfError},
    xsect::{vertcross, CrossSection},
};

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Could not set up the batch")]
    Setup,
    #[error("Error reading {}", .0.display())]
    Read(PathBuf),
    #[error("Error plotting {}", .0.display())]
    Render(PathBuf),
    #[error("{0}")]
    Context(String),
}

impl BatchError {
    fn context<S: ToString>(ctx: S) -> Self {
        Self::Context(ctx.to_string())
    }
}

/// What to do when one file in the batch fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Log the failure and go on to the next file
    #[default]
    Continue,
    /// Stop the batch if a file cannot be read or its cross-section cannot be
    /// computed. Failures to draw or save a plot still go on to the next file.
    StopOnReadError,
}

/// Which part of the processing a file failed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum FailureStage {
    /// Opening the file, reading variables or computing the cross-section
    Read,
    /// Building, drawing or saving the plot
    Render,
}

#[derive(Debug, Clone)]
pub struct FileFailure {
    pub path: PathBuf,
    pub stage: FailureStage,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub output_dir: PathBuf,
    /// (input, plot) for each plot written
    pub rendered: Vec<(PathBuf, PathBuf)>,
    /// Inputs rejected by the file name filter
    pub skipped: Vec<PathBuf>,
    pub failed: Vec<FileFailure>,
}

impl BatchSummary {
    pub fn n_files(&self) -> usize {
        self.rendered.len() + self.skipped.len() + self.failed.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    /// One row per input file, in the order rendered, failed, skipped.
    pub fn rows(&self) -> Vec<SummaryRow> {
        let rendered = self.rendered.iter().map(|(input, plot)| SummaryRow {
            file: display_name(input),
            status: "plotted".to_string(),
            detail: plot.display().to_string(),
        });
        let failed = self.failed.iter().map(|f| SummaryRow {
            file: display_name(&f.path),
            status: format!("failed ({})", f.stage),
            detail: f.message.clone(),
        });
        let skipped = self.skipped.iter().map(|p| SummaryRow {
            file: display_name(p),
            status: "skipped".to_string(),
            detail: "does not match the file filter".to_string(),
        });
        rendered.chain(failed).chain(skipped).collect()
    }
}

#[derive(Debug, Clone, tabled::Tabled)]
pub struct SummaryRow {
    #[tabled(rename = "File")]
    pub file: String,
    #[tabled(rename = "Status")]
    pub status: String,
    #[tabled(rename = "Details")]
    pub detail: String,
}

fn display_name(p: &Path) -> String {
    p.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| p.display().to_string())
}

/// Something that can open an input file as a [`FieldSource`].
pub trait DatasetOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FieldSource>, WrfError>;
}

impl<F> DatasetOpener for F
where
    F: Fn(&Path) -> Result<Box<dyn FieldSource>, WrfError>,
{
    fn open(&self, path: &Path) -> Result<Box<dyn FieldSource>, WrfError> {
        self(path)
    }
}

/// Opens input files as netCDF WRF output.
#[cfg(feature = "netcdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct NcOpener;

#[cfg(feature = "netcdf")]
impl DatasetOpener for NcOpener {
    fn open(&self, path: &Path) -> Result<Box<dyn FieldSource>, WrfError> {
        let source = wrf::NcSource::open(path)?;
        Ok(Box::new(source))
    }
}

/// Plot every file matching `pattern`, writing the plots into a directory
/// under `output_root`.
///
/// Returns an error if the pattern or output directory are unusable, or if a
/// file fails to read under [`FailurePolicy::StopOnReadError`]. Other per-file
/// failures are recorded in the summary.
pub fn run_batch<O, R>(
    pattern: &str,
    output_root: &Path,
    config: &RunConfig,
    opener: &O,
    renderer: &R,
) -> error_stack::Result<BatchSummary, BatchError>
where
    O: DatasetOpener + ?Sized,
    R: Renderer + ?Sized,
{
    let out_dir_name = output_dir_name(pattern, &config.output_prefix).change_context(BatchError::Setup)?;
    let output_dir = output_root.join(out_dir_name);
    ensure_output_dir(&output_dir).change_context(BatchError::Setup)?;

    let files = expand_pattern(pattern).change_context(BatchError::Setup)?;
    if files.is_empty() {
        log::warn!("No files match {pattern}");
    }

    let mut summary = BatchSummary {
        output_dir: output_dir.clone(),
        ..Default::default()
    };

    for file in files {
        if !config.filter.matches(&file) {
            log::debug!("Skipping {} (does not match filter '{}')", file.display(), config.filter);
            summary.skipped.push(file);
            continue;
        }

        log::info!("Plotting {}", file.display());
        match plot_one_file(&file, &output_dir, config, opener, renderer) {
            Ok(plot_file) => {
                log::info!("Saved {}", plot_file.display());
                summary.rendered.push((file, plot_file));
            }
            Err((stage, report)) => {
                if stage == FailureStage::Read && config.failure_policy == FailurePolicy::StopOnReadError {
                    log::error!(
                        "Stopping the batch, {} plot(s) were written before {} failed",
                        summary.rendered.len(),
                        file.display()
                    );
                    return Err(report);
                }
                log::error!("{report:?}");
                summary.failed.push(FileFailure {
                    path: file,
                    stage,
                    message: report_message(&report),
                });
            }
        }
    }

    Ok(summary)
}

fn plot_one_file<O, R>(
    file: &Path,
    output_dir: &Path,
    config: &RunConfig,
    opener: &O,
    renderer: &R,
) -> Result<PathBuf, (FailureStage, Report<BatchError>)>
where
    O: DatasetOpener + ?Sized,
    R: Renderer + ?Sized,
{
    let xs = {
        let source = opener
            .open(file)
            .change_context_lazy(|| BatchError::Read(file.to_path_buf()))
            .map_err(|e| (FailureStage::Read, e))?;
        compute_cross_section(source.as_ref(), config)
            .change_context_lazy(|| BatchError::Read(file.to_path_buf()))
            .map_err(|e| (FailureStage::Read, e))?
    };

    let render_err = |e: Report<BatchError>| (FailureStage::Render, e);
    let plot_name = output_file_name(file, &config.output_suffix)
        .change_context_lazy(|| BatchError::Render(file.to_path_buf()))
        .map_err(render_err)?;
    let plot_file = output_dir.join(plot_name);

    let spec = PlotSpec::from_cross_section(&xs, config)
        .change_context_lazy(|| BatchError::Render(file.to_path_buf()))
        .map_err(render_err)?;
    renderer
        .render(&spec, &plot_file)
        .change_context_lazy(|| BatchError::Render(file.to_path_buf()))
        .map_err(render_err)?;
    Ok(plot_file)
}

/// Compute the configured field's cross-section from one source.
///
/// Reflectivity is interpolated as linear Z and converted back to dBZ after.
pub fn compute_cross_section(
    source: &dyn FieldSource,
    config: &RunConfig,
) -> error_stack::Result<CrossSection, BatchError> {
    let diag = config.diagnostic();
    let field = wrf::get_diagnostic(source, diag)
        .change_context_lazy(|| BatchError::context(format!("Error computing {diag:?}")))?;
    let z = wrf::height(source).change_context_lazy(|| BatchError::context("Error computing model heights"))?;
    let (lat, lon) =
        wrf::lat_lon(source).change_context_lazy(|| BatchError::context("Error reading latitude/longitude"))?;

    let is_refl = config.field == FieldKind::Reflectivity;
    let field = if is_refl { field.mapv(dbz_to_linear) } else { field };

    let mut xs = vertcross(
        field.view(),
        z.view(),
        lat.view(),
        lon.view(),
        config.start,
        config.end,
        config.vertical_interp,
    )
    .change_context_lazy(|| {
        BatchError::context(format!(
            "Error computing the cross-section from {} to {}",
            config.start, config.end
        ))
    })?;

    if is_refl {
        xs.values.mapv_inplace(linear_to_dbz);
    }
    Ok(xs)
}

/// The report's contexts on one line, outermost first
fn report_message(report: &Report<BatchError>) -> String {
    report
        .frames()
        .filter_map(|frame| match frame.kind() {
            FrameKind::Context(ctx) => Some(ctx.to_string()),
            FrameKind::Attachment(_) => None,
        })
        .join(": ")
}
