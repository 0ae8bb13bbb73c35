//! Vertical cross-sections through a 3D WRF field.
//!
//! The path between the two endpoints is a straight line in grid space, sampled
//! roughly once per grid cell. Each level of the field is bilinearly
//! interpolated to the path points, then every column is interpolated in the
//! vertical onto a regular set of heights from the surface to just under the
//! top of the field along the path. Heights outside a column's range are NaN.
use std::{fmt::Display, str::FromStr};

use ndarray::{Array2, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::interpolation::{InterpolationError, InterpolationMethod, VerticalInterp};

/// Mean earth radius (km) used for distances along the path
const EARTH_RADIUS_KM: f64 = 6371.0;
/// Number of output heights in a cross-section
pub const N_HEIGHT_LEVELS: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum XsectError {
    #[error("Point {point} is outside the model domain (latitude {lat_min:.3} to {lat_max:.3}, longitude {lon_min:.3} to {lon_max:.3})")]
    OutOfDomain {
        point: CoordPair,
        lat_min: f64,
        lat_max: f64,
        lon_min: f64,
        lon_max: f64,
    },
    #[error("Start and end points fall on the same grid point ({x}, {y})")]
    DegeneratePath { x: usize, y: usize },
    #[error("Array shapes do not match: {0}")]
    ShapeMismatch(String),
    #[error("The latitude/longitude grid is empty")]
    EmptyGrid,
    #[error("The height field has no valid values along the path")]
    NoValidHeights,
    #[error(transparent)]
    Interpolation(#[from] InterpolationError),
}

/// A latitude/longitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordPair {
    pub lat: f64,
    pub lon: f64,
}

impl CoordPair {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Label used for the horizontal axis, e.g. "36.9946, -82.3799"
    pub fn latlon_str(&self) -> String {
        format!("{:.4}, {:.4}", self.lat, self.lon)
    }

    /// Great circle distance to `other` in kilometers
    pub fn distance_km(&self, other: &CoordPair) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = lat2 - lat1;
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

impl Display for CoordPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.5}, {:.5})", self.lat, self.lon)
    }
}

impl FromStr for CoordPair {
    type Err = String;

    /// Parse "LAT,LON", e.g. "36.99464,-82.37988"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| format!("Expected LAT,LON, got '{s}'"))?;
        let lat: f64 = lat.trim().parse().map_err(|e| format!("Invalid latitude '{lat}': {e}"))?;
        let lon: f64 = lon.trim().parse().map_err(|e| format!("Invalid longitude '{lon}': {e}"))?;
        if !(-90.0..=90.0).contains(&lat) {
            return Err(format!("Latitude {lat} is not between -90 and 90"));
        }
        Ok(Self { lat, lon })
    }
}

/// A cross-section of one field.
#[derive(Debug, Clone)]
pub struct CrossSection {
    /// Interpolated values, shape (height level, path point). NaN marks missing data.
    pub values: Array2<f64>,
    /// Height of each level (m)
    pub heights: Vec<f64>,
    /// Latitude/longitude of each path point
    pub lat_lons: Vec<CoordPair>,
    /// Distance of each path point from the first one (km)
    pub distances_km: Vec<f64>,
    /// Requested start point
    pub start: CoordPair,
    /// Requested end point
    pub end: CoordPair,
}

impl CrossSection {
    pub fn n_levels(&self) -> usize {
        self.values.len_of(Axis(0))
    }

    pub fn n_points(&self) -> usize {
        self.values.len_of(Axis(1))
    }

    /// Minimum and maximum of the non-missing values, `None` if all are missing.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Finds the grid point nearest to a latitude/longitude.
pub struct GridLocator<'a> {
    lat: ArrayView2<'a, f64>,
    lon: ArrayView2<'a, f64>,
    lat_bounds: (f64, f64),
    lon_bounds: (f64, f64),
}

impl<'a> GridLocator<'a> {
    pub fn new(lat: ArrayView2<'a, f64>, lon: ArrayView2<'a, f64>) -> Result<Self, XsectError> {
        if lat.shape() != lon.shape() {
            return Err(XsectError::ShapeMismatch(format!(
                "latitude is {:?} but longitude is {:?}",
                lat.shape(),
                lon.shape()
            )));
        }
        let lat_bounds = finite_bounds(lat.iter()).ok_or(XsectError::EmptyGrid)?;
        let lon_bounds = finite_bounds(lon.iter()).ok_or(XsectError::EmptyGrid)?;
        Ok(Self { lat, lon, lat_bounds, lon_bounds })
    }

    /// Return the (x, y) = (west_east, south_north) indices of the grid point
    /// closest to `point`.
    pub fn locate(&self, point: CoordPair) -> Result<(usize, usize), XsectError> {
        let (lat_min, lat_max) = self.lat_bounds;
        let (lon_min, lon_max) = self.lon_bounds;
        if point.lat < lat_min || point.lat > lat_max || point.lon < lon_min || point.lon > lon_max {
            return Err(XsectError::OutOfDomain { point, lat_min, lat_max, lon_min, lon_max });
        }

        // Scale longitude differences so the comparison is roughly isotropic.
        let coslat = point.lat.to_radians().cos();
        let mut best = (0, 0);
        let mut best_dist = f64::INFINITY;
        for ((j, i), &lat) in self.lat.indexed_iter() {
            let lon = self.lon[[j, i]];
            let d = (lat - point.lat).powi(2) + ((lon - point.lon) * coslat).powi(2);
            if d < best_dist {
                best_dist = d;
                best = (i, j);
            }
        }
        Ok(best)
    }
}

fn finite_bounds<'a, I: Iterator<Item = &'a f64>>(values: I) -> Option<(f64, f64)> {
    values.filter(|v| v.is_finite()).fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Evenly spaced points in grid space from `start` to `end` inclusive, about
/// one grid cell apart.
pub fn path_points(start: (usize, usize), end: (usize, usize)) -> Result<Vec<(f64, f64)>, XsectError> {
    if start == end {
        return Err(XsectError::DegeneratePath { x: start.0, y: start.1 });
    }

    let (xs, ys) = (start.0 as f64, start.1 as f64);
    let (dx, dy) = (end.0 as f64 - xs, end.1 as f64 - ys);
    let npts = (dx.hypot(dy).floor() as usize + 1).max(2);
    let step = (npts - 1) as f64;
    Ok((0..npts)
        .map(|i| (xs + dx * i as f64 / step, ys + dy * i as f64 / step))
        .collect())
}

/// Bilinear interpolation of a 2D (south_north, west_east) field at grid
/// coordinate (x, y). Coordinates are clamped to the grid.
pub fn bilinear(field: ArrayView2<f64>, x: f64, y: f64) -> f64 {
    let (ny, nx) = field.dim();
    let x = x.clamp(0.0, (nx - 1) as f64);
    let y = y.clamp(0.0, (ny - 1) as f64);
    let (x0, y0) = (x.floor() as usize, y.floor() as usize);
    let (x1, y1) = ((x0 + 1).min(nx - 1), (y0 + 1).min(ny - 1));
    let (wx, wy) = (x - x0 as f64, y - y0 as f64);

    let bottom = field[[y0, x0]] * (1.0 - wx) + field[[y0, x1]] * wx;
    let top = field[[y1, x0]] * (1.0 - wx) + field[[y1, x1]] * wx;
    bottom * (1.0 - wy) + top * wy
}

/// Interpolate every level of a 3D (bottom_top, south_north, west_east) field
/// to the path points. Returns (level, point).
pub fn interp2d_xy(field: ArrayView3<f64>, points: &[(f64, f64)]) -> Array2<f64> {
    let nz = field.len_of(Axis(0));
    Array2::from_shape_fn((nz, points.len()), |(k, ip)| {
        let (x, y) = points[ip];
        bilinear(field.index_axis(Axis(0), k), x, y)
    })
}

/// Output heights for a cross-section: [`N_HEIGHT_LEVELS`] levels from 0 in
/// steps of 1% of the tallest height found along the path.
pub fn height_levels(z_on_path: ArrayView2<f64>) -> Result<Vec<f64>, XsectError> {
    let (_, z_max) = finite_bounds(z_on_path.iter()).ok_or(XsectError::NoValidHeights)?;
    let dz = 0.01 * z_max;
    Ok((0..N_HEIGHT_LEVELS).map(|i| dz * i as f64).collect())
}

/// Compute the vertical cross-section of `field` between `start` and `end`.
///
/// `field` and `z` are (bottom_top, south_north, west_east); `lat` and `lon`
/// are (south_north, west_east). `z` is the height (m) of each point of `field`.
pub fn vertcross<'a>(
    field: ArrayView3<f64>,
    z: ArrayView3<f64>,
    lat: ArrayView2<'a, f64>,
    lon: ArrayView2<'a, f64>,
    start: CoordPair,
    end: CoordPair,
    method: VerticalInterp,
) -> Result<CrossSection, XsectError> {
    if field.shape() != z.shape() {
        return Err(XsectError::ShapeMismatch(format!(
            "field is {:?} but height is {:?}",
            field.shape(),
            z.shape()
        )));
    }
    if field.shape()[1..] != *lat.shape() {
        return Err(XsectError::ShapeMismatch(format!(
            "field is {:?} but latitude is {:?}",
            field.shape(),
            lat.shape()
        )));
    }

    let locator = GridLocator::new(lat, lon)?;
    let start_xy = locator.locate(start)?;
    let end_xy = locator.locate(end)?;
    log::debug!("Cross-section runs from grid point {start_xy:?} to {end_xy:?}");
    let points = path_points(start_xy, end_xy)?;

    let field_on_path = interp2d_xy(field, &points);
    let z_on_path = interp2d_xy(z, &points);
    let heights = height_levels(z_on_path.view())?;

    let mut values = Array2::from_elem((heights.len(), points.len()), f64::NAN);
    for (ip, mut column) in values.axis_iter_mut(Axis(1)).enumerate() {
        let col_z = z_on_path.column(ip).to_vec();
        let col_v = field_on_path.column(ip).to_vec();
        for (out, &h) in column.iter_mut().zip(heights.iter()) {
            *out = method.interp1d_or_nan(&col_z, &col_v, h)?;
        }
    }

    let lat_lons: Vec<CoordPair> = points
        .iter()
        .map(|&(x, y)| CoordPair::new(bilinear(lat, x, y), bilinear(lon, x, y)))
        .collect();
    let distances_km = lat_lons
        .iter()
        .map(|p| lat_lons[0].distance_km(p))
        .collect();

    Ok(CrossSection {
        values,
        heights,
        lat_lons,
        distances_km,
        start,
        end,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{SyntheticWrf, LEVEL_SPACING};
    use crate::wrf;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rstest::rstest;

    #[rstest]
    #[case((0, 0), (10, 0), 11)]
    #[case((0, 0), (3, 4), 6)]
    #[case((5, 5), (5, 6), 2)]
    fn test_path_points(#[case] start: (usize, usize), #[case] end: (usize, usize), #[case] npts: usize) {
        let pts = path_points(start, end).unwrap();
        assert_eq!(pts.len(), npts);
        assert_abs_diff_eq!(pts[0].0, start.0 as f64);
        assert_abs_diff_eq!(pts[0].1, start.1 as f64);
        assert_abs_diff_eq!(pts[npts - 1].0, end.0 as f64, epsilon = 1e-12);
        assert_abs_diff_eq!(pts[npts - 1].1, end.1 as f64, epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_path() {
        let err = path_points((2, 3), (2, 3)).unwrap_err();
        assert!(matches!(err, XsectError::DegeneratePath { x: 2, y: 3 }));
    }

    #[test]
    fn test_bilinear() {
        let f = array![[0.0, 1.0], [2.0, 3.0]];
        assert_abs_diff_eq!(bilinear(f.view(), 0.5, 0.5), 1.5);
        assert_abs_diff_eq!(bilinear(f.view(), 1.0, 0.0), 1.0);
        assert_abs_diff_eq!(bilinear(f.view(), 0.25, 1.0), 2.25);
        // clamped
        assert_abs_diff_eq!(bilinear(f.view(), 5.0, 5.0), 3.0);
    }

    #[test]
    fn test_locate() {
        let src = SyntheticWrf::new(2, 31, 31).build();
        let (lat, lon) = wrf::lat_lon(&src).unwrap();
        let locator = GridLocator::new(lat.view(), lon.view()).unwrap();

        // Grid spacing is 0.1 degrees starting at 35 N, 83 W
        assert_eq!(locator.locate(CoordPair::new(35.0, -83.0)).unwrap(), (0, 0));
        assert_eq!(locator.locate(CoordPair::new(36.01, -81.49)).unwrap(), (15, 10));

        let err = locator.locate(CoordPair::new(40.0, -81.0)).unwrap_err();
        assert!(matches!(err, XsectError::OutOfDomain { .. }));
    }

    #[test]
    fn test_coord_pair_parse_and_format() {
        let p: CoordPair = "36.99464, -82.37988".parse().unwrap();
        assert_abs_diff_eq!(p.lat, 36.99464);
        assert_abs_diff_eq!(p.lon, -82.37988);
        assert_eq!(p.latlon_str(), "36.9946, -82.3799");
        assert!("36.9".parse::<CoordPair>().is_err());
        assert!("95.0,10.0".parse::<CoordPair>().is_err());
    }

    #[test]
    fn test_distance() {
        // One degree of latitude is about 111.2 km
        let a = CoordPair::new(35.0, -82.0);
        let b = CoordPair::new(36.0, -82.0);
        assert_abs_diff_eq!(a.distance_km(&b), 111.19, epsilon = 0.01);
        assert_abs_diff_eq!(a.distance_km(&a), 0.0);
    }

    #[test]
    fn test_constant_field_cross_section() {
        let src = SyntheticWrf::new(10, 31, 31).with_reflectivity(42.0).build();
        let z = wrf::height(&src).unwrap();
        let dbz = wrf::reflectivity(&src, wrf::ReflectivitySource::Auto).unwrap();
        let (lat, lon) = wrf::lat_lon(&src).unwrap();

        let start = CoordPair::new(36.99464, -82.37988);
        let end = CoordPair::new(35.53535, -81.08899);
        let xs = vertcross(dbz.view(), z.view(), lat.view(), lon.view(), start, end, VerticalInterp::Linear).unwrap();

        assert_eq!(xs.n_levels(), N_HEIGHT_LEVELS);
        assert_eq!(xs.n_points(), xs.lat_lons.len());
        assert_eq!(xs.n_points(), xs.distances_km.len());

        let lowest = 0.5 * LEVEL_SPACING as f64;
        let mut n_valid = 0;
        for (k, row) in xs.values.axis_iter(Axis(0)).enumerate() {
            for &v in row.iter() {
                if xs.heights[k] < lowest {
                    assert!(v.is_nan(), "level below the lowest model level should be missing");
                } else {
                    assert_abs_diff_eq!(v, 42.0, epsilon = 1e-9);
                    n_valid += 1;
                }
            }
        }
        assert!(n_valid > 0);

        // Path starts near the start point and ends near the end point
        let first = xs.lat_lons[0];
        let last = xs.lat_lons[xs.n_points() - 1];
        assert!(first.distance_km(&start) < 10.0);
        assert!(last.distance_km(&end) < 10.0);
        assert!(xs.distances_km.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn test_linear_field_cross_section() {
        // A field equal to height should reproduce the output heights
        let src = SyntheticWrf::new(8, 11, 11).build();
        let z = wrf::height(&src).unwrap();
        let (lat, lon) = wrf::lat_lon(&src).unwrap();
        let xs = vertcross(
            z.view(),
            z.view(),
            lat.view(),
            lon.view(),
            CoordPair::new(35.1, -82.9),
            CoordPair::new(37.9, -80.1),
            VerticalInterp::Linear,
        )
        .unwrap();

        let z_max = 7.5 * LEVEL_SPACING as f64;
        assert_abs_diff_eq!(xs.heights[1], 0.01 * z_max, epsilon = 1e-9);
        for (k, &h) in xs.heights.iter().enumerate() {
            let v = xs.values[[k, 0]];
            if v.is_finite() {
                assert_abs_diff_eq!(v, h, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let src = SyntheticWrf::new(4, 5, 5).build();
        let z = wrf::height(&src).unwrap();
        let (lat, lon) = wrf::lat_lon(&src).unwrap();
        let other = ndarray::Array3::<f64>::zeros((3, 5, 5));
        let err = vertcross(
            other.view(),
            z.view(),
            lat.view(),
            lon.view(),
            CoordPair::new(35.5, -82.5),
            CoordPair::new(37.5, -80.5),
            VerticalInterp::Linear,
        )
        .unwrap_err();
        assert!(matches!(err, XsectError::ShapeMismatch(_)));
    }
}
