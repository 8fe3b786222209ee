//! Count-data validation for abundance matrices.

use super::missing::{as_numeric, count_missing, NumericKind};
use crate::error::{PredictError, Result};
use serde_json::Value;

/// Absolute tolerance for integer-likeness.
pub const INT_ATOL: f64 = 1e-8;
/// Relative tolerance for integer-likeness (tight, so that 4.00001 is rejected).
pub const INT_RTOL: f64 = 1e-8;

const COUNT_DATA_MSG: &str =
    "Input abundance matrix must have count data (missing values allowed). ";

/// Element-wise closeness, `|a - b| <= atol + rtol * |b|`.
///
/// Not symmetric in `a` and `b`. With `equal_nan`, NaN pairs compare equal.
pub fn allclose(a: &[f64], b: &[f64], atol: f64, rtol: f64, equal_nan: bool) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(&x, &y)| {
            if x.is_nan() || y.is_nan() {
                return equal_nan && x.is_nan() && y.is_nan();
            }
            (x - y).abs() <= atol + rtol * y.abs()
        })
}

/// Check that every non-missing value is an integer within tolerance.
///
/// The comparison is run in both directions.
pub fn is_int_like(values: &[f64]) -> bool {
    let rounded: Vec<f64> = values.iter().map(|v| v.round()).collect();
    allclose(values, &rounded, INT_ATOL, INT_RTOL, true)
        && allclose(&rounded, values, INT_ATOL, INT_RTOL, true)
}

/// Validate raw abundance cells as count data.
///
/// Fails when:
/// - every cell is missing,
/// - a cell is not numeric,
/// - a value is not integer-like,
/// - a rounded value is negative.
pub fn validate_abundance_values(cells: &[Value]) -> Result<()> {
    if cells.is_empty() || count_missing(cells) == cells.len() {
        return Err(PredictError::Validation {
            reason: "Input abundance matrix cannot have all missing matrix values".to_string(),
        });
    }

    let values = as_numeric(cells, NumericKind::Float)?.ok_or_else(|| {
        PredictError::Validation {
            reason: format!("{}Non-numeric value detected", COUNT_DATA_MSG),
        }
    })?;

    if !is_int_like(&values) {
        let offending = values
            .iter()
            .find(|v| !v.is_nan() && (*v - v.round()).abs() > INT_ATOL)
            .copied()
            .unwrap_or(f64::NAN);
        return Err(PredictError::Validation {
            reason: format!("{}Non-integer detected: {}", COUNT_DATA_MSG, offending),
        });
    }

    // Rounding first lets tiny negative deltas like -1e-10 through
    if let Some(v) = values.iter().find(|v| !v.is_nan() && v.round() < 0.0) {
        return Err(PredictError::Validation {
            reason: format!("{}Negative value detected: {}", COUNT_DATA_MSG, v),
        });
    }

    Ok(())
}
