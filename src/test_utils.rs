//! Helpers shared by the unit tests.
use ndarray::{Array, Array3};

use crate::wrf::{MemorySource, GRAVITY};

/// Spacing of the staggered (w-point) levels in the synthetic datasets (m)
pub(crate) const LEVEL_SPACING: f32 = 500.0;

/// Builder for a small WRF-like dataset with uniform fields.
///
/// Latitude increases linearly along `south_north` and longitude along
/// `west_east`, by default spanning 35 to 38 N and 83 to 80 W. The
/// staggered levels are [`LEVEL_SPACING`] apart everywhere.
pub(crate) struct SyntheticWrf {
    nz: usize,
    ny: usize,
    nx: usize,
    lat_range: (f32, f32),
    lon_range: (f32, f32),
    u: f32,
    v: f32,
    refl: Option<f32>,
    rain: f32,
}

impl SyntheticWrf {
    pub(crate) fn new(nz: usize, ny: usize, nx: usize) -> Self {
        Self {
            nz,
            ny,
            nx,
            lat_range: (35.0, 38.0),
            lon_range: (-83.0, -80.0),
            u: 10.0,
            v: 0.0,
            refl: Some(30.0),
            rain: 0.0,
        }
    }

    pub(crate) fn with_domain(mut self, lat_range: (f32, f32), lon_range: (f32, f32)) -> Self {
        self.lat_range = lat_range;
        self.lon_range = lon_range;
        self
    }

    pub(crate) fn with_wind(mut self, u: f32, v: f32) -> Self {
        self.u = u;
        self.v = v;
        self
    }

    pub(crate) fn with_reflectivity(mut self, dbz: f32) -> Self {
        self.refl = Some(dbz);
        self
    }

    pub(crate) fn without_reflectivity(mut self) -> Self {
        self.refl = None;
        self
    }

    pub(crate) fn with_rain(mut self, qr: f32) -> Self {
        self.rain = qr;
        self
    }

    pub(crate) fn build(&self) -> MemorySource {
        let (nz, ny, nx) = (self.nz, self.ny, self.nx);
        let step = |range: (f32, f32), n: usize, i: usize| {
            if n < 2 {
                range.0
            } else {
                range.0 + (range.1 - range.0) * i as f32 / (n - 1) as f32
            }
        };

        let lat = Array::from_shape_fn((ny, nx), |(j, _)| step(self.lat_range, ny, j));
        let lon = Array::from_shape_fn((ny, nx), |(_, i)| step(self.lon_range, nx, i));
        let phb = Array::from_shape_fn((nz + 1, ny, nx), |(k, _, _)| {
            // computed in f64 so the geopotential is exact in f32
            (k as f64 * LEVEL_SPACING as f64 * GRAVITY) as f32
        });
        let pb = Array::from_shape_fn((nz, ny, nx), |(k, _, _)| 100_000.0 - 4000.0 * k as f32);

        let mut src = MemorySource::new()
            .with_variable("XLAT", lat.into_dyn())
            .with_variable("XLONG", lon.into_dyn())
            .with_variable("PH", Array3::<f32>::zeros((nz + 1, ny, nx)).into_dyn())
            .with_variable("PHB", phb.into_dyn())
            .with_variable("P", Array3::<f32>::zeros((nz, ny, nx)).into_dyn())
            .with_variable("PB", pb.into_dyn())
            .with_variable("T", Array3::<f32>::zeros((nz, ny, nx)).into_dyn())
            .with_variable("QVAPOR", Array3::from_elem((nz, ny, nx), 0.005f32).into_dyn())
            .with_variable("QRAIN", Array3::from_elem((nz, ny, nx), self.rain).into_dyn())
            .with_variable("U", Array3::from_elem((nz, ny, nx + 1), self.u).into_dyn())
            .with_variable("V", Array3::from_elem((nz, ny + 1, nx), self.v).into_dyn());

        if let Some(dbz) = self.refl {
            src.insert("REFL_10CM", Array3::from_elem((nz, ny, nx), dbz).into_dyn());
        }
        src
    }
}
