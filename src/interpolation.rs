use num_traits::Float;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

#[derive(Debug, thiserror::Error)]
pub enum InterpolationError {
    #[error("Input arrays were different lengths (x.len() = {x_len}, y.len() = {y_len}")]
    InputLengthMismatch { x_len: usize, y_len: usize },
    #[error(
        "Input arrays were too short, needed at least {req_len} elements but got only {actual_len}"
    )]
    InputTooShort { req_len: usize, actual_len: usize },
    #[error(
        "Requested output coordinate ({out}) falls outside the input domain ({left} to {right})"
    )]
    OutOfDomain {
        left: String,
        right: String,
        out: String,
    },
    #[error("Input coordinate is not monotonic")]
    NotMonotonic,
}

pub trait InterpolationMethod {
    fn interp1d<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError>;

    /// Interpolate to `output_x`, returning NaN instead of an error when the
    /// output coordinate is outside the input domain. This is how missing
    /// values in a cross-section are represented.
    fn interp1d_or_nan<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError> {
        match self.interp1d(input_x, input_y, output_x) {
            Err(InterpolationError::OutOfDomain { .. }) => Ok(F::nan()),
            res => res,
        }
    }

    fn check_1d_inputs<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
        must_be_in_bounds: bool,
        min_len: usize,
    ) -> Result<(), InterpolationError> {
        if input_x.len() != input_y.len() {
            return Err(InterpolationError::InputLengthMismatch {
                x_len: input_x.len(),
                y_len: input_y.len(),
            });
        }

        // Now we know both are the same length, so only need to test 1
        if input_x.len() < min_len {
            return Err(InterpolationError::InputTooShort {
                req_len: min_len,
                actual_len: input_x.len(),
            });
        }

        if must_be_in_bounds {
            let left_bound = if let Some(x) = input_x.iter().copied().reduce(F::min) {
                x
            } else {
                // We only get None if the input is empty. If we got here, the min_len must have been 0, which means
                // the interpolator must handle the 0 length case
                return Ok(());
            };

            // If left bound was Some, this must also be Some.
            let right_bound = input_x
                .iter()
                .copied()
                .reduce(F::max)
                .expect("input_x.max() should return Some if input_x.min() returned Some()");

            if output_x.is_nan() || output_x < left_bound || output_x > right_bound {
                return Err(InterpolationError::OutOfDomain {
                    left: format!("{left_bound:?}"),
                    right: format!("{right_bound:?}"),
                    out: format!("{output_x:?}"),
                });
            }
        }

        Ok(())
    }
}

pub struct ConstantValueInterp {
    allow_extrapolation: bool,
}

impl ConstantValueInterp {
    pub fn new(allow_extrapolation: bool) -> Self {
        Self {
            allow_extrapolation,
        }
    }
}

impl InterpolationMethod for ConstantValueInterp {
    fn interp1d<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError> {
        self.check_1d_inputs(input_x, input_y, output_x, !self.allow_extrapolation, 1)?;
        // Checking the inputs ensures that output_x is in the domain of input_x if we do not allow extrapolation, so
        // we can safely find the nearest x value.
        let (i_closest, _) = input_x
            .iter()
            .enumerate()
            .fold(None, |acc, (i, x)| {
                let new_diff = (*x - output_x).abs();
                if let Some((curr_i, curr_diff)) = acc {
                    if new_diff < curr_diff {
                        Some((i, new_diff))
                    } else {
                        Some((curr_i, curr_diff))
                    }
                } else {
                    Some((i, new_diff))
                }
            })
            .expect("Inputs must have at least 1 element");

        Ok(input_y[i_closest])
    }
}

/// Piecewise linear interpolation over a monotonic (increasing or decreasing)
/// input coordinate. With extrapolation allowed, the first or last segment is
/// extended.
pub struct LinearInterp {
    allow_extrapolation: bool,
}

impl LinearInterp {
    pub fn new(allow_extrapolation: bool) -> Self {
        Self {
            allow_extrapolation,
        }
    }
}

impl InterpolationMethod for LinearInterp {
    fn interp1d<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError> {
        self.check_1d_inputs(input_x, input_y, output_x, !self.allow_extrapolation, 2)?;

        let increasing = input_x[input_x.len() - 1] >= input_x[0];
        let is_ordered = |a: F, b: F| if increasing { a <= b } else { a >= b };
        if !input_x.windows(2).all(|w| is_ordered(w[0], w[1])) {
            return Err(InterpolationError::NotMonotonic);
        }

        // Index of the left end of the bracketing segment, clamped to the first/last
        // segment so that extrapolation reuses the end slopes.
        let nseg = input_x.len() - 1;
        let i = input_x[1..nseg]
            .iter()
            .take_while(|&&x| is_ordered(x, output_x))
            .count();

        let (x0, x1) = (input_x[i], input_x[i + 1]);
        let (y0, y1) = (input_y[i], input_y[i + 1]);
        if x1 == x0 {
            return Ok(y0);
        }
        let weight = (output_x - x0) / (x1 - x0);
        Ok(y0 + weight * (y1 - y0))
    }
}

/// Which interpolation to use along each vertical column of a cross-section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerticalInterp {
    #[default]
    Linear,
    Nearest,
}

impl InterpolationMethod for VerticalInterp {
    fn interp1d<F: Float + Debug>(
        &self,
        input_x: &[F],
        input_y: &[F],
        output_x: F,
    ) -> Result<F, InterpolationError> {
        // Never extrapolate vertically: levels outside the column are missing data.
        match self {
            VerticalInterp::Linear => LinearInterp::new(false).interp1d(input_x, input_y, output_x),
            VerticalInterp::Nearest => ConstantValueInterp::new(false).interp1d(input_x, input_y, output_x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_constant_value_error_checks() {
        let interpolator = ConstantValueInterp::new(false);

        let err = interpolator.interp1d(&[1.0], &[1.0, 1.0], 2.0).unwrap_err();
        match err {
            InterpolationError::InputLengthMismatch { x_len, y_len } => {
                assert_eq!(x_len, 1, "x_len in error is incorrect");
                assert_eq!(y_len, 2, "y_len in error is incorrect");
            }
            _ => assert!(
                false,
                "Expected InputLengthMismatch error, did not get that"
            ),
        }

        let err = interpolator.interp1d::<f64>(&[], &[], 2.0).unwrap_err();
        match err {
            InterpolationError::InputTooShort {
                req_len,
                actual_len,
            } => {
                assert_eq!(req_len, 1, "req_len in error is incorrect");
                assert_eq!(actual_len, 0, "actual_len in error is incorrect");
            }
            _ => assert!(false, "Expected InputTooShort error, did not get that"),
        }

        let err = interpolator
            .interp1d(&[1.0, 2.0], &[2.0, 4.0], 0.0)
            .unwrap_err();
        match err {
            InterpolationError::OutOfDomain {
                left: _,
                right: _,
                out: _,
            } => (),
            _ => assert!(false, "Expected OutOfDomain error, did not get that"),
        }
    }

    #[test]
    fn test_constant_value_no_extrap() {
        let interpolator = ConstantValueInterp::new(false);
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];

        let y_out = interpolator
            .interp1d(x.as_slice(), y.as_slice(), 1.25)
            .unwrap();
        assert_abs_diff_eq!(y_out, 2.0);
    }

    #[test]
    fn test_constant_value_with_extrap() {
        let interpolator = ConstantValueInterp::new(true);
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];

        // Ensure the correct value for an in-bounds value
        let y_out = interpolator
            .interp1d(x.as_slice(), y.as_slice(), 1.25)
            .unwrap();
        assert_abs_diff_eq!(y_out, 2.0);

        let y_out = interpolator
            .interp1d(x.as_slice(), y.as_slice(), 10.0)
            .unwrap();
        assert_abs_diff_eq!(y_out, 6.0);
    }

    #[test]
    fn test_linear_no_extrap() {
        let interpolator = LinearInterp::new(false);
        let x = [0.0, 100.0, 300.0];
        let y = [10.0, 20.0, 40.0];

        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 50.0).unwrap(), 15.0);
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 200.0).unwrap(), 30.0);
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 300.0).unwrap(), 40.0);
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 0.0).unwrap(), 10.0);
        assert!(interpolator.interp1d(&x, &y, 301.0).is_err());
    }

    #[test]
    fn test_linear_decreasing_x() {
        let interpolator = LinearInterp::new(false);
        let x = [1000.0, 850.0, 500.0];
        let y = [0.0, 1500.0, 5500.0];
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 925.0).unwrap(), 750.0);
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 675.0).unwrap(), 3500.0);
    }

    #[test]
    fn test_linear_with_extrap() {
        let interpolator = LinearInterp::new(true);
        let x = [1.0, 2.0, 3.0];
        let y = [2.0, 4.0, 6.0];
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 4.0).unwrap(), 8.0);
        assert_abs_diff_eq!(interpolator.interp1d(&x, &y, 0.0).unwrap(), 0.0);
    }

    #[test]
    fn test_linear_not_monotonic() {
        let interpolator = LinearInterp::new(true);
        let err = interpolator
            .interp1d(&[1.0, 3.0, 2.0], &[1.0, 1.0, 1.0], 1.5)
            .unwrap_err();
        assert!(matches!(err, InterpolationError::NotMonotonic));
    }

    #[test]
    fn test_vertical_interp_missing_is_nan() {
        let x = [100.0f32, 200.0, 300.0];
        let y = [1.0f32, 2.0, 3.0];
        for method in [VerticalInterp::Linear, VerticalInterp::Nearest] {
            let v = method.interp1d_or_nan(&x, &y, 50.0).unwrap();
            assert!(v.is_nan(), "{method} should give NaN below the column");
            let v = method.interp1d_or_nan(&x, &y, 200.0).unwrap();
            assert_abs_diff_eq!(v, 2.0);
        }
    }
}
