//! Functional prediction for amplicon abundance matrices
//!
//! This library runs an external function predictor over an amplicon matrix
//! and folds its outputs back into a versioned object store.
//!
//! # Overview
//!
//! The library is organized into modules that each own one stage:
//!
//! - **validate**: Count-data checks on raw matrix cells
//! - **data**: Matrices, attribute side-tables and predictor tables
//! - **predictor**: Invoking the predictor and locating its outputs
//! - **reconcile**: Padding tables back to full shape and explaining dropped entities
//! - **store**: Versioned object storage and load/modify/save sessions
//! - **report**: Clustered heatmaps and the HTML report
//! - **pipeline**: Run parameters, per-run state and orchestration
//!
//! # Example
//!
//! ```no_run
//! use amplicon_predict::prelude::*;
//!
//! let store = LocalStore::open("store").unwrap();
//! let settings = Settings::default();
//! let predictor = settings.predictor();
//!
//! let params = RunParams::new("my_workspace/amplicon_matrix");
//! let summary = run_pipeline(&params, &settings, &store, &predictor).unwrap();
//! println!("report at {}", summary.report_html.display());
//! ```

pub mod data;
pub mod error;
pub mod pipeline;
pub mod predictor;
pub mod reconcile;
pub mod report;
pub mod store;
pub mod validate;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::data::{
        AbundanceMatrix, AttributeMapping, FunctionTable, MatrixData, SlotOutcome, NOT_PREDICTED,
    };
    pub use crate::error::{PredictError, Result};
    pub use crate::pipeline::{run_pipeline, RunParams, RunSummary, Settings};
    pub use crate::predictor::{FunctionFamily, OutputTable, Predictor, ShellPredictor, OUTPUT_TABLES};
    pub use crate::reconcile::{
        classify_dropped, derive_traits, restore_full_shape, verify_dropped, DropReason,
        Orientation, QualityTable,
    };
    pub use crate::report::{render_heatmap, HtmlReportWriter};
    pub use crate::store::{LocalStore, ObjectStore, ProfileStore};
    pub use crate::validate::validate_abundance_values;
}
