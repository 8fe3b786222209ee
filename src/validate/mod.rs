//! Validation of abundance data before it reaches the predictor.

pub mod counts;
pub mod missing;

pub use counts::{allclose, is_int_like, validate_abundance_values, INT_ATOL, INT_RTOL};
pub use missing::{as_numeric, count_missing, is_missing, NumericKind};
