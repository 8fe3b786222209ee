//! Reconciliation of predictor output with the input matrix.
//!
//! The predictor silently drops amplicons it cannot place or that sit too far
//! from reference genomes. This module pads its tables back to the full set
//! of amplicons (and samples), checks the drops are explained, and derives
//! per-amplicon annotations from the padded tables.

pub mod dropped;
pub mod pad;
pub mod traits;

pub use dropped::{classify_dropped, verify_dropped, DropReason, QualityTable, DEFAULT_NSTI_MAX};
pub use pad::{check_sample_ids, pad_table_file, restore_full_shape, Orientation};
pub use traits::{derive_traits, DescriptionMap};
