//! Data structures for abundance matrices, side-tables, and predictor output.

mod abundance_matrix;
mod attribute_mapping;
mod function_table;
pub mod io;

pub use abundance_matrix::{AbundanceMatrix, MatrixData};
pub use attribute_mapping::{
    numbered_duplicate, ApplyReport, AttributeMapping, AttributeSlot, SlotAllocation,
    SlotOutcome,
};
pub use function_table::{FunctionTable, NOT_PREDICTED};
