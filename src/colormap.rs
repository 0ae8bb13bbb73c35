//! Colour maps and contour levels for the filled contour plots.
use serde::{Deserialize, Serialize};

/// The colour maps available for plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ColormapName {
    #[default]
    Jet,
    Viridis,
    GistNcar,
    /// The discrete colour table used by the US National Weather Service for radar reflectivity
    NwsReflectivity,
}

/// A colour map defined by colour stops on [0, 1].
///
/// Continuous maps blend linearly between stops. Discrete maps pick the colour
/// of the bucket `t` falls in, with the stops spread evenly.
#[derive(Debug, Clone)]
pub struct Colormap {
    stops: Vec<(f64, [u8; 3])>,
    discrete: bool,
}

impl Colormap {
    pub fn named(name: ColormapName) -> Self {
        match name {
            ColormapName::Jet => Self::continuous(&[
                (0.0, [0, 0, 128]),
                (0.11, [0, 0, 255]),
                (0.125, [0, 0, 255]),
                (0.34, [0, 220, 255]),
                (0.375, [0, 255, 255]),
                (0.5, [128, 255, 128]),
                (0.625, [255, 255, 0]),
                (0.66, [255, 220, 0]),
                (0.875, [255, 0, 0]),
                (0.89, [240, 0, 0]),
                (1.0, [128, 0, 0]),
            ]),
            ColormapName::Viridis => Self::continuous(&[
                (0.0, [68, 1, 84]),
                (0.25, [59, 82, 139]),
                (0.5, [33, 145, 140]),
                (0.75, [94, 201, 98]),
                (1.0, [253, 231, 37]),
            ]),
            ColormapName::GistNcar => Self::continuous(&[
                (0.0, [0, 0, 128]),
                (0.12, [0, 100, 255]),
                (0.25, [0, 230, 230]),
                (0.37, [0, 200, 60]),
                (0.5, [100, 255, 0]),
                (0.62, [255, 255, 0]),
                (0.75, [255, 120, 0]),
                (0.87, [255, 0, 200]),
                (1.0, [254, 248, 254]),
            ]),
            ColormapName::NwsReflectivity => Self::discrete(&[
                [4, 233, 231],
                [1, 159, 244],
                [3, 0, 244],
                [2, 253, 2],
                [1, 197, 1],
                [0, 142, 0],
                [253, 248, 2],
                [229, 188, 0],
                [253, 149, 0],
                [253, 0, 0],
                [212, 0, 0],
                [188, 0, 0],
                [248, 0, 253],
                [152, 84, 198],
            ]),
        }
    }

    fn continuous(stops: &[(f64, [u8; 3])]) -> Self {
        Self { stops: stops.to_vec(), discrete: false }
    }

    fn discrete(colors: &[[u8; 3]]) -> Self {
        let n = colors.len().max(1);
        let stops = colors
            .iter()
            .enumerate()
            .map(|(i, &c)| (i as f64 / n as f64, c))
            .collect();
        Self { stops, discrete: true }
    }

    /// Colour at position `t`, clamped to [0, 1].
    pub fn color_at(&self, t: f64) -> [u8; 3] {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        if self.discrete {
            let n = self.stops.len();
            let i = ((t * n as f64) as usize).min(n - 1);
            return self.stops[i].1;
        }

        let upper = self.stops.iter().position(|(s, _)| *s >= t).unwrap_or(self.stops.len() - 1);
        if upper == 0 {
            return self.stops[0].1;
        }
        let (t0, c0) = self.stops[upper - 1];
        let (t1, c1) = self.stops[upper];
        let w = if t1 > t0 { (t - t0) / (t1 - t0) } else { 1.0 };
        let mix = |a: u8, b: u8| (a as f64 + w * (b as f64 - a as f64)).round() as u8;
        [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])]
    }

    /// Colour of filled band `band` out of `nbands`.
    pub fn band_color(&self, band: usize, nbands: usize) -> [u8; 3] {
        if nbands <= 1 {
            return self.color_at(0.5);
        }
        if self.discrete {
            // Give each band its own colour when there are enough, as the NWS table expects
            let t = (band as f64 + 0.5) / nbands as f64;
            return self.color_at(t);
        }
        self.color_at(band as f64 / (nbands - 1) as f64)
    }
}

/// Contour levels covering `min` to `max` with "nice" spacing: a step of 1,
/// 2, 2.5 or 5 times a power of ten, giving at most `max_bins` bands. Falls
/// back to the bare `[min, max]` when no such step fits.
pub fn nice_levels(min: f64, max: f64, max_bins: usize) -> Vec<f64> {
    let max_bins = max_bins.max(1);
    let (mut lo, mut hi) = if min <= max { (min, max) } else { (max, min) };
    if !lo.is_finite() || !hi.is_finite() {
        return vec![0.0, 1.0];
    }
    if hi - lo < f64::EPSILON * lo.abs().max(1.0) {
        let pad = if lo == 0.0 { 1.0 } else { 0.1 * lo.abs() };
        lo -= pad;
        hi += pad;
    }

    // Bands are counted after snapping the ends outward to multiples of the step
    let snapped = |step: f64| ((lo / step).floor() as i64, (hi / step).ceil() as i64);
    let raw_step = (hi - lo) / max_bins as f64;
    let magnitude = 10f64.powf(raw_step.log10().floor());
    let step = (0..4)
        .flat_map(|decade| [1.0, 2.0, 2.5, 5.0].map(|m| m * magnitude * 10f64.powi(decade)))
        .find(|&s| {
            let (first, last) = snapped(s);
            (last - first).max(1) as usize <= max_bins
        });

    let Some(step) = step else {
        // Only possible with a single band straddling a multiple of every step
        return vec![lo, hi];
    };
    let (first, last) = snapped(step);
    let mut levels: Vec<f64> = (first..=last).map(|i| i as f64 * step).collect();
    if levels.len() < 2 {
        levels.push(levels[0] + step);
    }
    levels
}

/// Which band between consecutive `levels` `value` falls in. The top level
/// belongs to the last band; NaN or values outside the levels have no band.
pub fn level_index(levels: &[f64], value: f64) -> Option<usize> {
    if levels.len() < 2 || value.is_nan() {
        return None;
    }
    let last = levels.len() - 1;
    if value < levels[0] || value > levels[last] {
        return None;
    }
    if value == levels[last] {
        return Some(last - 1);
    }
    levels.windows(2).position(|w| value >= w[0] && value < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    #[test]
    fn test_jet_ends() {
        let jet = Colormap::named(ColormapName::Jet);
        assert_eq!(jet.color_at(0.0), [0, 0, 128]);
        assert_eq!(jet.color_at(1.0), [128, 0, 0]);
        assert_eq!(jet.color_at(-3.0), [0, 0, 128]);
        assert_eq!(jet.color_at(0.625), [255, 255, 0]);
    }

    #[test]
    fn test_continuous_blend() {
        let viridis = Colormap::named(ColormapName::Viridis);
        let c = viridis.color_at(0.125);
        // halfway between the first two stops
        assert_eq!(c, [64, 42, 112]);
    }

    #[test]
    fn test_discrete_bands() {
        let nws = Colormap::named(ColormapName::NwsReflectivity);
        assert_eq!(nws.band_color(0, 14), [4, 233, 231]);
        assert_eq!(nws.band_color(13, 14), [152, 84, 198]);
        assert_eq!(nws.band_color(6, 14), [253, 248, 2]);
    }

    #[rstest]
    #[case(0.0, 43.0, 10, 0.0, 45.0, 5.0)]
    #[case(3.2, 8.9, 8, 3.0, 9.0, 1.0)]
    #[case(-0.5, 0.5, 4, -0.5, 0.5, 0.25)]
    #[case(0.5, 10.5, 10, 0.0, 12.0, 2.0)]
    fn test_nice_levels(
        #[case] min: f64,
        #[case] max: f64,
        #[case] bins: usize,
        #[case] first: f64,
        #[case] last: f64,
        #[case] step: f64,
    ) {
        let levels = nice_levels(min, max, bins);
        assert_abs_diff_eq!(levels[0], first, epsilon = 1e-9);
        assert_abs_diff_eq!(*levels.last().unwrap(), last, epsilon = 1e-9);
        assert_abs_diff_eq!(levels[1] - levels[0], step, epsilon = 1e-9);
        assert!(levels.len() - 1 <= bins);
    }

    #[test]
    fn test_nice_levels_single_band() {
        let levels = nice_levels(-0.3, 0.4, 1);
        assert_eq!(levels.len(), 2);
        assert!(levels[0] <= -0.3 && levels[1] >= 0.4);
    }

    #[test]
    fn test_nice_levels_constant() {
        let levels = nice_levels(42.0, 42.0, 8);
        assert!(levels[0] <= 42.0);
        assert!(*levels.last().unwrap() >= 42.0);
        assert!(levels.len() >= 2);
    }

    #[test]
    fn test_level_index() {
        let levels = [5.0, 10.0, 15.0, 20.0];
        assert_eq!(level_index(&levels, 5.0), Some(0));
        assert_eq!(level_index(&levels, 12.0), Some(1));
        assert_eq!(level_index(&levels, 20.0), Some(2));
        assert_eq!(level_index(&levels, 4.9), None);
        assert_eq!(level_index(&levels, 20.1), None);
        assert_eq!(level_index(&levels, f64::NAN), None);
    }
}
