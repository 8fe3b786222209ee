//! Canonicalization of heterogeneous missing-value cells.
//!
//! Abundance values arrive as JSON cells and may encode "missing" in several
//! ways: `null`, an empty string, the strings `"None"`/`"null"`, or a NaN
//! rendering. All of them become `f64::NAN` before numeric casting.

use crate::error::{PredictError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Target numeric representation for [`as_numeric`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericKind {
    /// 64-bit float; missing cells become NaN.
    Float,
    /// Integral values only; cannot hold missing cells.
    Integer,
}

/// Check whether a cell is one of the recognized missing-value tokens.
pub fn is_missing(cell: &Value) -> bool {
    match cell {
        Value::Null => true,
        Value::String(s) => {
            let token = s.trim();
            token.is_empty()
                || token == "None"
                || token == "null"
                || token.eq_ignore_ascii_case("nan")
        }
        Value::Number(n) => n.as_f64().map(f64::is_nan).unwrap_or(false),
        _ => false,
    }
}

/// Count missing cells.
pub fn count_missing(cells: &[Value]) -> usize {
    cells.iter().filter(|c| is_missing(c)).count()
}

/// Cast cells to numbers after replacing missing tokens with NaN.
///
/// Returns `Ok(None)` when some non-missing cell cannot be represented in the
/// requested kind (not a number, or fractional for [`NumericKind::Integer`]),
/// leaving the caller to phrase the validation message.
///
/// # Errors
/// Asking for [`NumericKind::Integer`] while missing cells are present is a
/// usage error, since integers have no missing sentinel and truncating is
/// never acceptable.
pub fn as_numeric(cells: &[Value], kind: NumericKind) -> Result<Option<Vec<f64>>> {
    if kind == NumericKind::Integer && cells.iter().any(is_missing) {
        return Err(PredictError::InvalidParameter(
            "Cannot assign missing values to an integer array".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(cells.len());
    for cell in cells {
        if is_missing(cell) {
            out.push(f64::NAN);
            continue;
        }
        let value = match cell {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        match value {
            Some(v) if kind == NumericKind::Integer && v.fract() != 0.0 => return Ok(None),
            Some(v) => out.push(v),
            None => return Ok(None),
        }
    }
    Ok(Some(out))
}
