//! Reading WRF output fields and computing the derived quantities the
//! cross-sections are drawn from.
//!
//! Everything here works through the [`FieldSource`] trait, so that the
//! diagnostics can be computed from a netCDF file ([`NcSource`], requires the
//! `netcdf` feature) or from arrays built in memory ([`MemorySource`]).
//! Only the first time in a file is ever used; sources drop the leading
//! `Time` dimension.
use std::collections::HashMap;
#[cfg(feature = "netcdf")]
use std::path::{Path, PathBuf};

use ndarray::{Array2, Array3, ArrayD, ArrayViewD, Axis, Ix2, Ix3, Slice, Zip};
use serde::{Deserialize, Serialize};

use crate::units::{linear_to_dbz, WindUnit};

/// Standard gravity used by WRF to convert geopotential to height (m s-2)
pub const GRAVITY: f64 = 9.81;
/// Dry air gas constant (J kg-1 K-1)
const RD: f64 = 287.04;
/// Dry air heat capacity at constant pressure (J kg-1 K-1)
const CP: f64 = 1004.5;
/// WRF's base potential temperature, added to the perturbation `T` (K)
const T_BASE: f64 = 300.0;
const P_REF: f64 = 100_000.0;
const FREEZING: f64 = 273.15;
/// Smallest equivalent reflectivity factor before taking the log (mm^6 m^-3)
const MIN_Z_E: f64 = 0.001;

#[derive(Debug, thiserror::Error)]
pub enum WrfError {
    #[error("Could not open {} as a WRF file: {reason}", path.display())]
    CouldNotOpen { path: std::path::PathBuf, reason: String },
    #[error("Missing expected variable: {0}")]
    MissingVariable(String),
    #[error("Error reading variable {varname}: {reason}")]
    ReadError { varname: String, reason: String },
    #[error("Variable {varname} has shape {actual:?}, expected {expected}")]
    ShapeMismatch {
        varname: String,
        actual: Vec<usize>,
        expected: String,
    },
}

impl WrfError {
    fn shape_mismatch<S: ToString, E: ToString>(varname: S, actual: &[usize], expected: E) -> Self {
        Self::ShapeMismatch {
            varname: varname.to_string(),
            actual: actual.to_vec(),
            expected: expected.to_string(),
        }
    }
}

/// Something that WRF variables can be read from.
pub trait FieldSource {
    /// Return variable `name` at the first time, without the `Time` dimension.
    fn variable(&self, name: &str) -> Result<ArrayD<f32>, WrfError>;

    /// Whether the source contains variable `name`.
    fn has_variable(&self, name: &str) -> bool;

    /// Read a variable and convert it to `f64`.
    fn variable_f64(&self, name: &str) -> Result<ArrayD<f64>, WrfError> {
        Ok(self.variable(name)?.mapv(f64::from))
    }
}

/// A [`FieldSource`] that holds its variables in memory.
#[derive(Debug, Default, Clone)]
pub struct MemorySource {
    variables: HashMap<String, ArrayD<f32>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a variable. `values` must not include a `Time` dimension.
    pub fn with_variable<S: ToString>(mut self, name: S, values: ArrayD<f32>) -> Self {
        self.variables.insert(name.to_string(), values);
        self
    }

    pub fn insert<S: ToString>(&mut self, name: S, values: ArrayD<f32>) {
        self.variables.insert(name.to_string(), values);
    }

    pub fn remove(&mut self, name: &str) -> Option<ArrayD<f32>> {
        self.variables.remove(name)
    }
}

impl FieldSource for MemorySource {
    fn variable(&self, name: &str) -> Result<ArrayD<f32>, WrfError> {
        self.variables
            .get(name)
            .cloned()
            .ok_or_else(|| WrfError::MissingVariable(name.to_string()))
    }

    fn has_variable(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }
}

/// A [`FieldSource`] reading from a WRF netCDF file.
#[cfg(feature = "netcdf")]
pub struct NcSource {
    path: PathBuf,
    file: netcdf::File,
}

#[cfg(feature = "netcdf")]
impl NcSource {
    pub fn open(path: &Path) -> Result<Self, WrfError> {
        let file = netcdf::open(path).map_err(|e| WrfError::CouldNotOpen {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(feature = "netcdf")]
impl FieldSource for NcSource {
    fn variable(&self, name: &str) -> Result<ArrayD<f32>, WrfError> {
        let var = self
            .file
            .variable(name)
            .ok_or_else(|| WrfError::MissingVariable(name.to_string()))?;
        let read_err = |e: netcdf::Error| WrfError::ReadError {
            varname: name.to_string(),
            reason: e.to_string(),
        };

        let dims = var.dimensions();
        let time_len = dims.first().filter(|d| d.name() == "Time").map(|d| d.len());
        match time_len {
            None => var.get::<f32, _>(netcdf::Extents::All).map_err(read_err),
            Some(0) => Err(WrfError::ReadError {
                varname: name.to_string(),
                reason: "the Time dimension is empty".to_string(),
            }),
            Some(_) => {
                // Only the first time is plotted; the index drops the Time axis
                let extents: Vec<netcdf::Extent> = std::iter::once(netcdf::Extent::Index(0))
                    .chain((1..dims.len()).map(|_| netcdf::Extent::Slice { start: 0, stride: 1 }))
                    .collect();
                var.get::<f32, _>(extents).map_err(read_err)
            }
        }
    }

    fn has_variable(&self, name: &str) -> bool {
        self.file.variable(name).is_some()
    }
}

/// The derived fields a cross-section can be computed for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Diagnostic {
    /// Geopotential height on mass levels (m)
    Height,
    /// Simulated radar reflectivity (dBZ)
    Reflectivity(ReflectivitySource),
    /// Horizontal wind speed in the given units
    WindSpeed(WindUnit),
    /// Full pressure (hPa)
    Pressure,
}

/// Compute a 3D (bottom_top, south_north, west_east) derived field.
pub fn get_diagnostic<S: FieldSource + ?Sized>(source: &S, diag: Diagnostic) -> Result<Array3<f64>, WrfError> {
    match diag {
        Diagnostic::Height => height(source),
        Diagnostic::Reflectivity(how) => reflectivity(source, how),
        Diagnostic::WindSpeed(unit) => wind_speed(source, unit),
        Diagnostic::Pressure => pressure(source),
    }
}

/// Average adjacent points along `axis`, moving a staggered field to the
/// mass points. The output is one shorter than the input along `axis`.
pub fn destagger(values: ArrayViewD<f64>, axis: usize, varname: &str) -> Result<ArrayD<f64>, WrfError> {
    if axis >= values.ndim() || values.len_of(Axis(axis)) < 2 {
        return Err(WrfError::shape_mismatch(
            varname,
            values.shape(),
            format!("at least 2 points along axis {axis}"),
        ));
    }

    let left = values.slice_axis(Axis(axis), Slice::from(..-1isize));
    let right = values.slice_axis(Axis(axis), Slice::from(1usize..));
    Ok((&left + &right) * 0.5)
}

/// Geopotential height (m) on mass levels, from `PH` and `PHB`.
pub fn height<S: FieldSource + ?Sized>(source: &S) -> Result<Array3<f64>, WrfError> {
    let ph = source.variable_f64("PH")?;
    let phb = source.variable_f64("PHB")?;
    check_same_shape("PHB", phb.shape(), ph.shape())?;

    let geopotential = ph + phb;
    let z = destagger(geopotential.view(), 0, "PH")? / GRAVITY;
    into_3d(z, "PH")
}

/// Full pressure (hPa), from `P` and `PB`.
pub fn pressure<S: FieldSource + ?Sized>(source: &S) -> Result<Array3<f64>, WrfError> {
    let p = source.variable_f64("P")?;
    let pb = source.variable_f64("PB")?;
    check_same_shape("PB", pb.shape(), p.shape())?;
    into_3d((p + pb) / 100.0, "P")
}

/// Horizontal wind speed from the staggered `U` and `V` components.
///
/// Speed is invariant to the rotation from grid-relative to earth-relative
/// winds, so no rotation is applied.
pub fn wind_speed<S: FieldSource + ?Sized>(source: &S, unit: WindUnit) -> Result<Array3<f64>, WrfError> {
    let u = source.variable_f64("U")?;
    let v = source.variable_f64("V")?;
    let ua = into_3d(destagger(u.view(), 2, "U")?, "U")?;
    let va = into_3d(destagger(v.view(), 1, "V")?, "V")?;
    check_same_shape("V", va.shape(), ua.shape())?;

    Ok(Zip::from(&ua)
        .and(&va)
        .map_collect(|&u, &v| unit.from_mps(u.hypot(v))))
}

/// Where simulated reflectivity comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReflectivitySource {
    /// `REFL_10CM` if the file has it, otherwise derived
    #[default]
    Auto,
    /// Always derived from the mixing ratios
    Derived,
}

/// Simulated reflectivity (dBZ).
///
/// With [`ReflectivitySource::Auto`], uses `REFL_10CM` if the file has it.
/// Otherwise it is computed from the rain, snow and graupel mixing ratios
/// assuming exponential size distributions with constant intercepts. Without
/// a snow variable, rain below freezing is counted as snow.
pub fn reflectivity<S: FieldSource + ?Sized>(source: &S, how: ReflectivitySource) -> Result<Array3<f64>, WrfError> {
    if how == ReflectivitySource::Auto && source.has_variable("REFL_10CM") {
        log::debug!("Using REFL_10CM for reflectivity");
        return into_3d(source.variable_f64("REFL_10CM")?, "REFL_10CM");
    }

    log::debug!("Computing reflectivity from hydrometeor mixing ratios");
    let p = pressure(source)?.mapv(|p| p * 100.0);
    let theta = into_3d(source.variable_f64("T")?, "T")?;
    let qv = into_3d(source.variable_f64("QVAPOR")?, "QVAPOR")?;
    let mut qr = into_3d(source.variable_f64("QRAIN")?, "QRAIN")?;
    check_same_shape("T", theta.shape(), p.shape())?;
    check_same_shape("QVAPOR", qv.shape(), p.shape())?;
    check_same_shape("QRAIN", qr.shape(), p.shape())?;

    let has_snow = source.has_variable("QSNOW");
    let mut qs = optional_mixing_ratio(source, "QSNOW", p.shape())?;
    let qg = optional_mixing_ratio(source, "QGRAUP", p.shape())?;

    let tmk = Zip::from(&theta)
        .and(&p)
        .map_collect(|&th, &p| (th + T_BASE) * (p / P_REF).powf(RD / CP));

    if !has_snow {
        Zip::from(&mut qr)
            .and(&mut qs)
            .and(&tmk)
            .for_each(|qr, qs, &t| {
                if t < FREEZING {
                    *qs = *qr;
                    *qr = 0.0;
                }
            });
    }

    let factors = ReflectivityFactors::new();
    let dbz = Array3::from_shape_fn(p.raw_dim(), |idx| {
        let z_e = factors.z_e(
            p[idx],
            tmk[idx],
            qv[idx].max(0.0),
            qr[idx].max(0.0),
            qs[idx].max(0.0),
            qg[idx].max(0.0),
        );
        linear_to_dbz(z_e.max(MIN_Z_E))
    });

    Ok(dbz)
}

/// Latitude and longitude of the mass points, from `XLAT` and `XLONG`.
pub fn lat_lon<S: FieldSource + ?Sized>(source: &S) -> Result<(Array2<f64>, Array2<f64>), WrfError> {
    let lat = source.variable_f64("XLAT")?;
    let lon = source.variable_f64("XLONG")?;
    check_same_shape("XLONG", lon.shape(), lat.shape())?;
    let shape = lat.shape().to_vec();
    let lat = lat
        .into_dimensionality::<Ix2>()
        .map_err(|_| WrfError::shape_mismatch("XLAT", &shape, "(south_north, west_east)"))?;
    let lon = lon
        .into_dimensionality::<Ix2>()
        .map_err(|_| WrfError::shape_mismatch("XLONG", &shape, "(south_north, west_east)"))?;
    Ok((lat, lon))
}

fn optional_mixing_ratio<S: FieldSource + ?Sized>(source: &S, name: &str, shape: &[usize]) -> Result<Array3<f64>, WrfError> {
    if source.has_variable(name) {
        let q = into_3d(source.variable_f64(name)?, name)?;
        check_same_shape(name, q.shape(), shape)?;
        Ok(q)
    } else {
        let dims: [usize; 3] = shape
            .try_into()
            .map_err(|_| WrfError::shape_mismatch(name, shape, "3 dimensions"))?;
        Ok(Array3::zeros(dims))
    }
}

fn into_3d(values: ArrayD<f64>, varname: &str) -> Result<Array3<f64>, WrfError> {
    let shape = values.shape().to_vec();
    values
        .into_dimensionality::<Ix3>()
        .map_err(|_| WrfError::shape_mismatch(varname, &shape, "(bottom_top, south_north, west_east)"))
}

fn check_same_shape(varname: &str, actual: &[usize], expected: &[usize]) -> Result<(), WrfError> {
    if actual != expected {
        return Err(WrfError::shape_mismatch(varname, actual, format!("{expected:?}")));
    }
    Ok(())
}

/// Constant parts of the reflectivity calculation for each hydrometeor.
struct ReflectivityFactors {
    rain: f64,
    snow: f64,
    graupel: f64,
}

impl ReflectivityFactors {
    const GAMMA_SEVEN: f64 = 720.0;
    const RHO_WATER: f64 = 1000.0;
    const RHO_SNOW: f64 = 100.0;
    const RHO_GRAUPEL: f64 = 400.0;
    const N0_RAIN: f64 = 8.0e6;
    const N0_SNOW: f64 = 2.0e7;
    const N0_GRAUPEL: f64 = 4.0e6;
    /// Ratio of the dielectric factors of ice and water
    const ALPHA: f64 = 0.224;

    fn new() -> Self {
        let base = Self::GAMMA_SEVEN * 1.0e18;
        let pi = std::f64::consts::PI;
        let ice = |rho: f64| {
            base * (1.0 / (pi * rho)).powf(1.75) * (rho / Self::RHO_WATER).powi(2) * Self::ALPHA
        };
        Self {
            rain: base * (1.0 / (pi * Self::RHO_WATER)).powf(1.75),
            snow: ice(Self::RHO_SNOW),
            graupel: ice(Self::RHO_GRAUPEL),
        }
    }

    fn air_density(p: f64, t: f64, qv: f64) -> f64 {
        let virtual_t = t * (0.622 + qv) / (0.622 * (1.0 + qv));
        p / (RD * virtual_t)
    }

    /// Equivalent reflectivity factor (mm^6 m^-3) from rain, snow and graupel
    fn z_e(&self, p: f64, t: f64, qv: f64, qr: f64, qs: f64, qg: f64) -> f64 {
        let rho = Self::air_density(p, t, qv);
        self.rain * (rho * qr).powf(1.75) / Self::N0_RAIN.powf(0.75)
            + self.snow * (rho * qs).powf(1.75) / Self::N0_SNOW.powf(0.75)
            + self.graupel * (rho * qg).powf(1.75) / Self::N0_GRAUPEL.powf(0.75)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::SyntheticWrf;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    #[test]
    fn test_destagger() {
        let x = array![[0.0, 2.0, 4.0], [10.0, 20.0, 30.0]].into_dyn();
        let d = destagger(x.view(), 1, "x").unwrap();
        assert_eq!(d.shape(), &[2, 2]);
        assert_abs_diff_eq!(d[[0, 0]], 1.0);
        assert_abs_diff_eq!(d[[0, 1]], 3.0);
        assert_abs_diff_eq!(d[[1, 1]], 25.0);

        let d = destagger(x.view(), 0, "x").unwrap();
        assert_eq!(d.shape(), &[1, 3]);
        assert_abs_diff_eq!(d[[0, 2]], 17.0);
    }

    #[test]
    fn test_destagger_too_short() {
        let x = Array::<f64, _>::zeros((1, 3)).into_dyn();
        let err = destagger(x.view(), 0, "x").unwrap_err();
        assert!(matches!(err, WrfError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_height() {
        let src = SyntheticWrf::new(4, 5, 6).build();
        let z = height(&src).unwrap();
        assert_eq!(z.shape(), &[4, 5, 6]);
        // Staggered levels are every 500 m, so mass levels are at 250, 750, ...
        assert_abs_diff_eq!(z[[0, 2, 3]], 250.0, epsilon = 1e-6);
        assert_abs_diff_eq!(z[[3, 0, 0]], 1750.0, epsilon = 1e-6);
    }

    #[test]
    fn test_wind_speed() {
        let src = SyntheticWrf::new(3, 4, 5).with_wind(3.0, 4.0).build();
        let wspd = wind_speed(&src, WindUnit::MetersPerSecond).unwrap();
        assert_eq!(wspd.shape(), &[3, 4, 5]);
        assert!(wspd.iter().all(|&w| (w - 5.0).abs() < 1e-6));

        let wspd = wind_speed(&src, WindUnit::Knots).unwrap();
        assert_abs_diff_eq!(wspd[[1, 1, 1]], 5.0 * 1.9438445, epsilon = 1e-5);
    }

    #[test]
    fn test_reflectivity_prefers_refl_10cm() {
        let src = SyntheticWrf::new(3, 4, 5).with_reflectivity(35.0).build();
        let dbz = reflectivity(&src, ReflectivitySource::Auto).unwrap();
        assert!(dbz.iter().all(|&v| (v - 35.0).abs() < 1e-5));
    }

    #[test]
    fn test_reflectivity_derived_ignores_refl_10cm() {
        let src = SyntheticWrf::new(3, 4, 5).with_reflectivity(35.0).build();
        let dbz = reflectivity(&src, ReflectivitySource::Derived).unwrap();
        assert!(dbz.iter().all(|&v| (v - linear_to_dbz(MIN_Z_E)).abs() < 1e-9));

        let diag = get_diagnostic(&src, Diagnostic::Reflectivity(ReflectivitySource::Derived)).unwrap();
        assert_eq!(diag, dbz);
    }

    #[test]
    fn test_reflectivity_computed_from_mixing_ratios() {
        let dry = SyntheticWrf::new(3, 4, 5).without_reflectivity().build();
        let dbz = reflectivity(&dry, ReflectivitySource::Auto).unwrap();
        // No hydrometeors means the floor value
        assert!(dbz.iter().all(|&v| (v - linear_to_dbz(MIN_Z_E)).abs() < 1e-9));

        let wet = SyntheticWrf::new(3, 4, 5).without_reflectivity().with_rain(1e-3).build();
        let dbz = reflectivity(&wet, ReflectivitySource::Derived).unwrap();
        // 1 g/kg of rain is a moderate rain rate, somewhere in the 40s of dBZ
        assert!(dbz.iter().all(|&v| v > 35.0 && v < 55.0), "got {dbz:?}");
    }

    #[cfg(feature = "netcdf")]
    #[test]
    fn test_nc_source_reads_first_time() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("wrfout_d01_test");
        {
            let mut file = netcdf::create(&path).unwrap();
            file.add_dimension("Time", 3).unwrap();
            file.add_dimension("south_north", 2).unwrap();
            file.add_dimension("west_east", 2).unwrap();
            let values: Vec<f32> = (0..12).map(|i| i as f32).collect();
            let mut var = file
                .add_variable::<f32>("T2", &["Time", "south_north", "west_east"])
                .unwrap();
            var.put_values(&values, netcdf::Extents::All).unwrap();
            let mut var = file.add_variable::<f32>("HGT", &["south_north", "west_east"]).unwrap();
            var.put_values(&[1.0f32, 2.0, 3.0, 4.0], netcdf::Extents::All).unwrap();
        }

        let src = NcSource::open(&path).unwrap();
        let t2 = src.variable("T2").unwrap();
        assert_eq!(t2.shape(), &[2, 2]);
        assert_eq!(t2.iter().copied().collect::<Vec<_>>(), vec![0.0, 1.0, 2.0, 3.0]);

        let hgt = src.variable("HGT").unwrap();
        assert_eq!(hgt.shape(), &[2, 2]);
        assert_abs_diff_eq!(hgt[[1, 1]], 4.0);
    }

    #[test]
    fn test_missing_variable() {
        let src = MemorySource::new();
        let err = height(&src).unwrap_err();
        match err {
            WrfError::MissingVariable(v) => assert_eq!(v, "PH"),
            e => panic!("Expected a missing variable error, got {e:?}"),
        }
    }

    #[test]
    fn test_shape_mismatch() {
        let src = MemorySource::new()
            .with_variable("PH", Array::<f32, _>::zeros((3, 2, 2)).into_dyn())
            .with_variable("PHB", Array::<f32, _>::zeros((3, 2, 3)).into_dyn());
        let err = height(&src).unwrap_err();
        assert!(matches!(err, WrfError::ShapeMismatch { .. }));
    }
}
