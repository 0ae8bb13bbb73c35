//! Run configuration for the cross-section renderer.
//!
//! All of the values that control a run (the cross-section endpoints, which
//! field is plotted, colours, levels, output naming, etc.) live in [`RunConfig`].
//! A configuration is built in layers, each overriding the previous:
//!
//! 1. the built-in defaults of a [`Preset`],
//! 2. an optional TOML file,
//! 3. environment variables starting with `WRF_XSECT_`, e.g.
//!    `WRF_XSECT_TICK_STRIDE=10`. Nested values use a double underscore:
//!    `WRF_XSECT_START__LAT=36.5`.
//!
//! Command line options are applied on top of that by the program itself.
//! An example TOML file can be written with [`RunConfig::write_template`]:
//!
//! ```toml
//! field = "reflectivity"
//! colormap = "nws_reflectivity"
//! levels = [5.0, 10.0, 15.0, 20.0, 25.0, 30.0, 35.0, 40.0]
//! filter = "prefix:wrfout_d02"
//!
//! [start]
//! lat = 36.99464
//! lon = -82.37988
//!
//! [end]
//! lat = 35.53535
//! lon = -81.08899
//! ```
use std::{io::Write, path::Path};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::{
    batch::FailurePolicy,
    colormap::ColormapName,
    files::FileFilter,
    interpolation::VerticalInterp,
    units::WindUnit,
    wrf::{Diagnostic, ReflectivitySource},
    xsect::CoordPair,
};

/// Prefix for environment variables that override configuration values
pub const ENV_PREFIX: &str = "WRF_XSECT_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Error loading configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Error writing configuration template to {}: {reason}", path.display())]
    Write { path: std::path::PathBuf, reason: String },
}

impl ConfigError {
    fn invalid<S: ToString>(msg: S) -> Self {
        Self::Invalid(msg.to_string())
    }
}

/// Which field the cross-section shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FieldKind {
    WindSpeed,
    Reflectivity,
}

impl FieldKind {
    pub fn diagnostic(&self, wind_units: WindUnit, refl_source: ReflectivitySource) -> Diagnostic {
        match self {
            FieldKind::WindSpeed => Diagnostic::WindSpeed(wind_units),
            FieldKind::Reflectivity => Diagnostic::Reflectivity(refl_source),
        }
    }

    pub fn long_name(&self) -> &'static str {
        match self {
            FieldKind::WindSpeed => "Wind Speed",
            FieldKind::Reflectivity => "Reflectivity",
        }
    }
}

/// Starting points for a configuration, matching the plot variants this
/// program replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Preset {
    /// Wind speed in knots with the jet colour map and computed levels
    #[default]
    Wind,
    /// Reflectivity from 5 to 75 dBZ with the NWS colour table
    Reflectivity,
}

/// How the horizontal axis is labelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum XLabelStyle {
    /// "lat, lon" of the path point
    #[default]
    LatLon,
    /// Distance from the start of the path in km
    Distance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FigureSize {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Field to plot
    pub field: FieldKind,
    /// Units for wind speed plots
    pub wind_units: WindUnit,
    /// Whether reflectivity may come from `REFL_10CM` or is always derived
    #[serde(default)]
    pub reflectivity_source: ReflectivitySource,
    pub colormap: ColormapName,
    /// Contour levels. If not given, levels are computed from the data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub levels: Option<Vec<f64>>,
    /// Maximum number of bands when levels are computed
    pub max_bands: usize,
    /// Label every Nth sample on both axes
    pub tick_stride: usize,
    /// Text size as a multiple of the base glyph size
    pub font_scale: u32,
    pub x_labels: XLabelStyle,
    pub vertical_interp: VerticalInterp,
    /// Filter on input file names, see [`FileFilter`]
    pub filter: FileFilter,
    /// Prepended to the input directory name to make the output directory name
    pub output_prefix: String,
    /// Appended to the input file name to make the plot file name
    pub output_suffix: String,
    pub failure_policy: FailurePolicy,
    // Tables must come after plain values for the TOML template.
    /// First endpoint of the cross-section
    pub start: CoordPair,
    /// Second endpoint of the cross-section
    pub end: CoordPair,
    /// Size of the output image in pixels
    pub figure_size: FigureSize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start: CoordPair::new(36.99464, -82.37988),
            end: CoordPair::new(35.53535, -81.08899),
            field: FieldKind::WindSpeed,
            wind_units: WindUnit::Knots,
            reflectivity_source: ReflectivitySource::Auto,
            colormap: ColormapName::Jet,
            levels: None,
            max_bands: 10,
            figure_size: FigureSize { width: 1000, height: 700 },
            tick_stride: 20,
            font_scale: 1,
            x_labels: XLabelStyle::LatLon,
            vertical_interp: VerticalInterp::Linear,
            filter: FileFilter::default(),
            output_prefix: "UpdatedPlots_".to_string(),
            output_suffix: "_plot.png".to_string(),
            failure_policy: FailurePolicy::Continue,
        }
    }
}

impl RunConfig {
    pub fn preset(preset: Preset) -> Self {
        match preset {
            Preset::Wind => Self::default(),
            Preset::Reflectivity => Self::reflectivity_preset(),
        }
    }

    pub fn reflectivity_preset() -> Self {
        Self {
            field: FieldKind::Reflectivity,
            colormap: ColormapName::NwsReflectivity,
            levels: Some((1..=15).map(|n| 5.0 * n as f64).collect()),
            ..Self::default()
        }
    }

    /// Build a configuration from the preset defaults, an optional TOML file, and
    /// the environment, then validate it.
    pub fn load(preset: Preset, toml_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::preset(preset)));
        if let Some(toml_file) = toml_file {
            if !toml_file.exists() {
                return Err(ConfigError::invalid(format!(
                    "configuration file {} does not exist",
                    toml_file.display()
                )));
            }
            figment = figment.merge(Toml::file(toml_file));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Self = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_stride == 0 {
            return Err(ConfigError::invalid("tick_stride must be at least 1"));
        }
        if self.font_scale == 0 {
            return Err(ConfigError::invalid("font_scale must be at least 1"));
        }
        if self.max_bands == 0 {
            return Err(ConfigError::invalid("max_bands must be at least 1"));
        }
        if self.figure_size.width == 0 || self.figure_size.height == 0 {
            return Err(ConfigError::invalid("figure_size width and height must be positive"));
        }
        for (name, pt) in [("start", &self.start), ("end", &self.end)] {
            if !(-90.0..=90.0).contains(&pt.lat) || !pt.lon.is_finite() {
                return Err(ConfigError::invalid(format!("{name} point {pt} is not a valid coordinate")));
            }
        }
        if self.start == self.end {
            return Err(ConfigError::invalid("start and end points must differ"));
        }
        if let Some(levels) = &self.levels {
            if levels.len() < 2 {
                return Err(ConfigError::invalid("levels must have at least 2 values"));
            }
            if levels.iter().any(|l| !l.is_finite()) {
                return Err(ConfigError::invalid("levels must all be finite"));
            }
            if levels.windows(2).any(|w| w[1] <= w[0]) {
                return Err(ConfigError::invalid("levels must be strictly increasing"));
            }
        }
        if self.output_suffix.is_empty() {
            return Err(ConfigError::invalid(
                "output_suffix must not be empty, or plots would overwrite their inputs",
            ));
        }
        Ok(())
    }

    pub fn diagnostic(&self) -> Diagnostic {
        self.field.diagnostic(self.wind_units, self.reflectivity_source)
    }

    /// Units label for the plotted field, e.g. "kt" or "dBZ"
    pub fn units_label(&self) -> &'static str {
        match self.field {
            FieldKind::WindSpeed => self.wind_units.label(),
            FieldKind::Reflectivity => "dBZ",
        }
    }

    /// Write this configuration as a commented TOML file.
    pub fn write_template(&self, path: &Path) -> Result<(), ConfigError> {
        let comments = [
            "Configuration for wrf_xsect. Every key is optional; missing keys take",
            "their value from the preset given on the command line (--preset).",
            "",
            "field: 'wind_speed' or 'reflectivity'",
            "wind_units: 'm s-1', 'kt', 'km h-1' or 'mi h-1'",
            "reflectivity_source: 'auto' (use REFL_10CM when the file has it) or",
            "    'derived' (always compute from the hydrometeor mixing ratios)",
            "colormap: 'jet', 'viridis', 'gist_ncar' or 'nws_reflectivity'",
            "levels: list of contour levels, e.g. levels = [5.0, 10.0, 15.0]. If omitted,",
            "    up to max_bands levels are computed from each file's data.",
            "x_labels: 'lat_lon' or 'distance'",
            "vertical_interp: 'linear' or 'nearest'",
            "filter: 'all', 'prefix:<text>', 'contains:<text>' or 'glob:<pattern>'",
            "failure_policy: 'continue' (log and move on after any failure) or",
            "    'stop_on_read_error' (stop the whole run if a file cannot be read)",
            "",
        ];
        let map_err = |e: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };

        let mut f = std::fs::File::create(path).map_err(map_err)?;
        for line in comments {
            writeln!(f, "# {line}").map_err(map_err)?;
        }
        let s = toml::to_string_pretty(self).map_err(|e| ConfigError::Write {
            path: path.to_path_buf(),
            reason: format!("could not serialize the configuration: {e}"),
        })?;
        write!(f, "{s}").map_err(map_err)?;
        Ok(())
    }
}
