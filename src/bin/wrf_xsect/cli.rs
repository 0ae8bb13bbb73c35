//! Command line interface definitions
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use wrf_xsect::{
    batch::FailurePolicy,
    config::{Preset, RunConfig},
    files::FileFilter,
    render::RendererKind,
    units::WindUnit,
    wrf::ReflectivitySource,
    xsect::CoordPair,
};

/// Plot vertical cross-sections of WRF output files.
///
/// Each file matching the input pattern is plotted to a PNG in a directory
/// named after the directory the files are in, e.g. plots for "run1/wrfout*"
/// go in "UpdatedPlots_run1".
#[derive(Debug, Parser)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    pub(crate) command: Commands,

    #[command(flatten)]
    pub(crate) verbosity: Verbosity<InfoLevel>,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum Commands {
    /// Plot a cross-section for every file matching a pattern
    Plot(PlotCli),
    /// Write an example configuration file with the values of a preset
    ConfigTemplate(TemplateCli),
    /// Print the configuration that a plot run would use, after merging the
    /// preset, configuration file and environment.
    DebugConfig(ConfigCli),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct ConfigCli {
    /// TOML file with configuration values that override the preset.
    #[clap(short, long)]
    pub(crate) config: Option<PathBuf>,

    /// Default values to start from.
    #[clap(short, long, default_value_t = Preset::Wind)]
    pub(crate) preset: Preset,
}

#[derive(Debug, Clone, Args)]
pub(crate) struct PlotCli {
    /// Glob pattern for the input files, including their directory, e.g.
    /// "/data/run1/wrfout_d01*". Quote it so the shell does not expand it.
    /// If omitted, it is asked for on the terminal.
    pub(crate) pattern: Option<String>,

    #[clap(flatten)]
    pub(crate) config: ConfigCli,

    /// Only plot files whose names pass this filter: "all", "prefix:<text>",
    /// "contains:<text>" or "glob:<pattern>".
    #[clap(short, long)]
    pub(crate) filter: Option<FileFilter>,

    /// First endpoint of the cross-section, as "LAT,LON".
    #[clap(long, allow_hyphen_values = true)]
    pub(crate) start: Option<CoordPair>,

    /// Second endpoint of the cross-section, as "LAT,LON".
    #[clap(long, allow_hyphen_values = true)]
    pub(crate) end: Option<CoordPair>,

    /// Units for wind speed plots, e.g. "kt" or "m/s".
    #[clap(long)]
    pub(crate) wind_units: Option<WindUnit>,

    /// Always compute reflectivity from the mixing ratios, even if the
    /// files have REFL_10CM.
    #[clap(long)]
    pub(crate) derive_reflectivity: bool,

    /// Stop the whole run if a file cannot be read, instead of going on
    /// to the next file.
    #[clap(long)]
    pub(crate) fail_fast: bool,

    /// Directory to create the output directory in.
    #[clap(short, long, default_value = ".")]
    pub(crate) output_root: PathBuf,

    /// How to draw the plots.
    #[clap(short, long, value_enum, default_value_t = RendererKind::Raster)]
    pub(crate) renderer: RendererKind,
}

impl PlotCli {
    /// Apply the command line overrides on top of a loaded configuration.
    pub(crate) fn apply_to(&self, config: &mut RunConfig) {
        if let Some(filter) = &self.filter {
            config.filter = filter.clone();
        }
        if let Some(start) = self.start {
            config.start = start;
        }
        if let Some(end) = self.end {
            config.end = end;
        }
        if let Some(units) = self.wind_units {
            config.wind_units = units;
        }
        if self.derive_reflectivity {
            config.reflectivity_source = ReflectivitySource::Derived;
        }
        if self.fail_fast {
            config.failure_policy = FailurePolicy::StopOnReadError;
        }
    }
}

#[derive(Debug, Clone, Args)]
pub(crate) struct TemplateCli {
    /// Path to write the template to
    pub(crate) template_file: PathBuf,

    /// Preset whose values are written out.
    #[clap(short, long, default_value_t = Preset::Wind)]
    pub(crate) preset: Preset,
}
