//! Turning a cross-section into a description of the plot to draw.
use ndarray::Array2;

use crate::{
    colormap::{nice_levels, ColormapName},
    config::{RunConfig, XLabelStyle},
    ticks::{downsample_labels, TickError},
    xsect::CrossSection,
};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error(transparent)]
    Tick(#[from] TickError),
    #[error("The cross-section has no valid values, cannot compute contour levels")]
    NoValidData,
}

/// Everything a [`Renderer`](crate::render::Renderer) needs to draw one plot.
#[derive(Debug, Clone)]
pub struct PlotSpec {
    /// Values to contour, (row, column) = (height level, path point). NaN is left blank.
    pub values: Array2<f64>,
    /// Boundaries of the filled bands, strictly increasing
    pub levels: Vec<f64>,
    pub colormap: ColormapName,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    /// Shown over the colour bar, normally the units
    pub colorbar_label: String,
    /// Column index and label of each horizontal tick
    pub x_ticks: Vec<(usize, String)>,
    /// Row index and label of each vertical tick
    pub y_ticks: Vec<(usize, String)>,
    pub width: u32,
    pub height: u32,
    pub font_scale: u32,
}

impl PlotSpec {
    pub fn from_cross_section(xs: &CrossSection, config: &RunConfig) -> Result<Self, PlotError> {
        let levels = match &config.levels {
            Some(levels) => levels.clone(),
            None => {
                let (lo, hi) = xs.value_range().ok_or(PlotError::NoValidData)?;
                nice_levels(lo, hi, config.max_bands)
            }
        };

        let units = config.units_label();
        let title = format!(
            "Cross-Section of {} ({units}) from {} to {}",
            config.field.long_name(),
            xs.start,
            xs.end
        );

        let (x_label, x_tick_labels): (&str, Vec<String>) = match config.x_labels {
            XLabelStyle::LatLon => (
                "Latitude, Longitude",
                xs.lat_lons.iter().map(|p| p.latlon_str()).collect(),
            ),
            XLabelStyle::Distance => (
                "Distance (km)",
                xs.distances_km.iter().map(|d| format!("{d:.0}")).collect(),
            ),
        };
        let x_ticks = downsample_labels(&x_tick_labels, config.tick_stride)?;

        let height_labels: Vec<String> = xs.heights.iter().map(|h| format!("{h:.0}")).collect();
        let y_ticks = downsample_labels(&height_labels, config.tick_stride)?;

        Ok(Self {
            values: xs.values.clone(),
            levels,
            colormap: config.colormap,
            title,
            x_label: x_label.to_string(),
            y_label: "Height (m)".to_string(),
            colorbar_label: units.to_string(),
            x_ticks,
            y_ticks,
            width: config.figure_size.width,
            height: config.figure_size.height,
            font_scale: config.font_scale,
        })
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }
}

/// Format a contour level without trailing zeros, e.g. 5 -> "5", 2.5 -> "2.5"
pub fn format_level(level: f64) -> String {
    let s = format!("{level:.4}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xsect::CoordPair;
    use ndarray::Array2;
    use rstest::rstest;

    fn make_xs(npts: usize, nlev: usize, value: f64) -> CrossSection {
        CrossSection {
            values: Array2::from_elem((nlev, npts), value),
            heights: (0..nlev).map(|k| 10.0 * k as f64).collect(),
            lat_lons: (0..npts).map(|i| CoordPair::new(36.0 + 0.01 * i as f64, -82.0)).collect(),
            distances_km: (0..npts).map(|i| 1.1 * i as f64).collect(),
            start: CoordPair::new(36.0, -82.0),
            end: CoordPair::new(36.5, -82.0),
        }
    }

    #[test]
    fn test_plot_spec_ticks_and_title() {
        let xs = make_xs(45, 100, 12.0);
        let config = RunConfig::default();
        let spec = PlotSpec::from_cross_section(&xs, &config).unwrap();

        assert_eq!(spec.title, "Cross-Section of Wind Speed (kt) from (36.00000, -82.00000) to (36.50000, -82.00000)");
        assert_eq!(spec.x_ticks.len(), 3);
        assert_eq!(spec.x_ticks[1], (20, "36.2000, -82.0000".to_string()));
        assert_eq!(spec.y_ticks.len(), 5);
        assert_eq!(spec.y_ticks[4], (80, "800".to_string()));
        assert_eq!(spec.colorbar_label, "kt");
        assert!(spec.levels[0] <= 12.0 && *spec.levels.last().unwrap() >= 12.0);
    }

    #[test]
    fn test_plot_spec_distance_labels() {
        let xs = make_xs(30, 10, 1.0);
        let mut config = RunConfig::reflectivity_preset();
        config.x_labels = XLabelStyle::Distance;
        config.tick_stride = 10;
        let spec = PlotSpec::from_cross_section(&xs, &config).unwrap();
        assert_eq!(spec.x_label, "Distance (km)");
        assert_eq!(spec.x_ticks, vec![(0, "0".to_string()), (10, "11".to_string()), (20, "22".to_string())]);
        assert_eq!(spec.levels, config.levels.unwrap());
        assert!(spec.title.starts_with("Cross-Section of Reflectivity (dBZ)"));
    }

    #[test]
    fn test_all_missing_needs_levels() {
        let xs = make_xs(5, 5, f64::NAN);
        let err = PlotSpec::from_cross_section(&xs, &RunConfig::default()).unwrap_err();
        assert!(matches!(err, PlotError::NoValidData));

        // With explicit levels there is nothing to compute, so an empty plot is fine
        PlotSpec::from_cross_section(&xs, &RunConfig::reflectivity_preset()).unwrap();
    }

    #[rstest]
    #[case(5.0, "5")]
    #[case(2.5, "2.5")]
    #[case(0.30000000000000004, "0.3")]
    #[case(-0.0, "0")]
    #[case(-12.25, "-12.25")]
    fn test_format_level(#[case] level: f64, #[case] expected: &str) {
        assert_eq!(format_level(level), expected);
    }
}
