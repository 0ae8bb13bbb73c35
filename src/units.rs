use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug)]
pub struct UnknownUnitError {
    pub quantity: &'static str,
    pub unit: String
}

impl UnknownUnitError {
    fn new<S: ToString>(quantity: &'static str, unit: S) -> Self {
        Self { quantity, unit: unit.to_string() }
    }
}

impl Display for UnknownUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown {} unit '{}'", self.quantity, self.unit)
    }
}

impl std::error::Error for UnknownUnitError {}


/// Convert reflectivity in dBZ to linear Z (mm^6 m^-3).
///
/// Reflectivity must be in linear units when it is interpolated, otherwise
/// the interpolation weights act on a logarithm.
pub fn dbz_to_linear(dbz: f64) -> f64 {
    10f64.powf(dbz / 10.0)
}

/// Convert linear Z (mm^6 m^-3) back to dBZ. Non-positive inputs give -inf or NaN,
/// the same as `log10`.
pub fn linear_to_dbz(z: f64) -> f64 {
    10.0 * z.log10()
}

/// Units that a horizontal wind speed can be plotted in.
///
/// [`FromStr`] accepts the CF-style unit strings ("m s-1", "kt", "km h-1", "mi h-1")
/// plus a few common aliases ("m/s", "knots", "kmh", "mph"), ignoring case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum WindUnit {
    MetersPerSecond,
    Knots,
    KilometersPerHour,
    MilesPerHour,
}

impl WindUnit {
    /// Convert a speed in m/s into this unit
    pub fn from_mps(&self, value: f64) -> f64 {
        match self {
            WindUnit::MetersPerSecond => value,
            WindUnit::Knots => value * 1.943_844_5,
            WindUnit::KilometersPerHour => value * 3.6,
            WindUnit::MilesPerHour => value * 2.236_936_3,
        }
    }

    /// Short label used in plot titles, e.g. "kt"
    pub fn label(&self) -> &'static str {
        match self {
            WindUnit::MetersPerSecond => "m s-1",
            WindUnit::Knots => "kt",
            WindUnit::KilometersPerHour => "km h-1",
            WindUnit::MilesPerHour => "mi h-1",
        }
    }
}

impl Default for WindUnit {
    fn default() -> Self {
        Self::Knots
    }
}

impl Display for WindUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for WindUnit {
    type Err = UnknownUnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "m s-1" | "m/s" | "mps" => Ok(Self::MetersPerSecond),
            "kt" | "kts" | "knots" => Ok(Self::Knots),
            "km h-1" | "km/h" | "kmh" => Ok(Self::KilometersPerHour),
            "mi h-1" | "mi/h" | "mph" => Ok(Self::MilesPerHour),
            _ => Err(UnknownUnitError::new("wind speed", s)),
        }
    }
}

impl TryFrom<String> for WindUnit {
    type Error = UnknownUnitError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<WindUnit> for String {
    fn from(value: WindUnit) -> Self {
        value.label().to_string()
    }
}
