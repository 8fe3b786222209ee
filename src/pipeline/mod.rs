//! Orchestration of a prediction run.

mod config;
mod context;
mod runner;

pub use config::{RunParams, Settings, ALLOWED_PARAMS};
pub use context::{CreatedObject, RunContext, RunSummary};
pub use runner::{run_pipeline, ReconciledTable};
