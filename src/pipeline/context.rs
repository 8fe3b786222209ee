//! Per-run state: working directory, warnings, and created objects.

use crate::error::Result;
use log::warn;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// An object saved during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedObject {
    pub reference: String,
    pub description: String,
}

/// State owned by one pipeline run.
///
/// Each run gets its own uuid-named directory under the scratch directory.
#[derive(Debug)]
pub struct RunContext {
    run_dir: PathBuf,
    commands: Vec<String>,
    warnings: Vec<String>,
    objects_created: Vec<CreatedObject>,
}

impl RunContext {
    /// Create a fresh run directory under `scratch_dir`.
    pub fn create(scratch_dir: &Path) -> Result<Self> {
        let run_id = Uuid::new_v4();
        let run_dir = scratch_dir.join(format!("run_{}", run_id));
        fs::create_dir_all(&run_dir)?;
        Ok(Self {
            run_dir,
            commands: Vec::new(),
            warnings: Vec::new(),
            objects_created: Vec::new(),
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn seqs_path(&self) -> PathBuf {
        self.run_dir.join("study_seqs.fna")
    }

    pub fn abundance_path(&self) -> PathBuf {
        self.run_dir.join("study_seqs.tsv")
    }

    pub fn predictor_out_dir(&self) -> PathBuf {
        self.run_dir.join("predictor_out")
    }

    pub fn log_path(&self) -> PathBuf {
        self.run_dir.join("log.txt")
    }

    pub fn decompressed_dir(&self) -> PathBuf {
        self.run_dir.join("decompressed")
    }

    pub fn report_dir(&self) -> PathBuf {
        self.run_dir.join("report")
    }

    /// Record a warning for the report and log it.
    pub fn warn<S: Into<String>>(&mut self, msg: S) {
        let msg = msg.into();
        warn!("{}", msg);
        self.warnings.push(msg);
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn record_command(&mut self, command: String) {
        self.commands.push(command);
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn record_object(&mut self, reference: &str, description: &str) {
        self.objects_created.push(CreatedObject {
            reference: reference.to_string(),
            description: description.to_string(),
        });
    }

    pub fn objects_created(&self) -> &[CreatedObject] {
        &self.objects_created
    }

    /// Close the run into its summary.
    pub fn into_summary(self, report_html: PathBuf) -> RunSummary {
        RunSummary {
            run_dir: self.run_dir,
            report_html,
            objects_created: self.objects_created,
            warnings: self.warnings,
        }
    }
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_dir: PathBuf,
    pub report_html: PathBuf,
    pub objects_created: Vec<CreatedObject>,
    pub warnings: Vec<String>,
}
