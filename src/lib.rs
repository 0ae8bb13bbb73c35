pub mod batch;
pub mod colormap;
pub mod config;
pub mod files;
pub mod interpolation;
pub mod logging;
pub mod plot;
pub mod render;
pub mod ticks;
pub mod units;
pub mod wrf;
pub mod xsect;

#[cfg(test)]
pub(crate) mod test_utils;
