//! The tables the predictor writes, and how to find them.

use crate::data::io::gunzip;
use crate::error::{PredictError, Result};
use crate::reconcile::Orientation;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Gene family or pathway database a table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FunctionFamily {
    Ko,
    Ec,
    MetaCyc,
}

impl FunctionFamily {
    /// Axis label used for this family.
    pub fn label(&self) -> &'static str {
        match self {
            FunctionFamily::Ko => "KO",
            FunctionFamily::Ec => "EC",
            FunctionFamily::MetaCyc => "MetaCyc pathway",
        }
    }

    /// Short code used in object names and descriptions.
    pub fn code(&self) -> &'static str {
        match self {
            FunctionFamily::Ko => "KO",
            FunctionFamily::Ec => "EC",
            FunctionFamily::MetaCyc => "MetaCyc",
        }
    }
}

/// What a derived profile is indexed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileCategory {
    /// Per amplicon
    Amplicon,
    /// Per sample
    Community,
}

/// One table in the predictor's output directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputTable {
    /// Stable identifier, also the figure id in the report
    pub id: &'static str,
    /// Path relative to the output directory
    pub rel_path: &'static str,
    /// Axis holding the padded entities
    pub orientation: Orientation,
    pub function: FunctionFamily,
    pub category: ProfileCategory,
    /// (row label, column label)
    pub axis_labels: (&'static str, &'static str),
}

impl OutputTable {
    /// Name of the table once decompressed.
    pub fn tsv_name(&self) -> String {
        let base = Path::new(self.rel_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.rel_path.to_string());
        base.trim_end_matches(".gz").to_string()
    }
}

/// Every table the predictor produces, in report order.
pub static OUTPUT_TABLES: [OutputTable; 6] = [
    OutputTable {
        id: "amplicon_ec",
        rel_path: "EC_predicted.tsv.gz",
        orientation: Orientation::ByRowEntity,
        function: FunctionFamily::Ec,
        category: ProfileCategory::Amplicon,
        axis_labels: ("amplicon ID", "EC"),
    },
    OutputTable {
        id: "amplicon_ko",
        rel_path: "KO_predicted.tsv.gz",
        orientation: Orientation::ByRowEntity,
        function: FunctionFamily::Ko,
        category: ProfileCategory::Amplicon,
        axis_labels: ("amplicon ID", "KO"),
    },
    OutputTable {
        id: "amplicon_metacyc",
        rel_path: "pathways_out/path_abun_predictions.tsv.gz",
        orientation: Orientation::ByRowEntity,
        function: FunctionFamily::MetaCyc,
        category: ProfileCategory::Amplicon,
        axis_labels: ("amplicon ID", "MetaCyc pathway"),
    },
    OutputTable {
        id: "metagenome_ec",
        rel_path: "EC_metagenome_out/pred_metagenome_unstrat.tsv.gz",
        orientation: Orientation::ByColumnEntity,
        function: FunctionFamily::Ec,
        category: ProfileCategory::Community,
        axis_labels: ("EC", "sample ID"),
    },
    OutputTable {
        id: "metagenome_ko",
        rel_path: "KO_metagenome_out/pred_metagenome_unstrat.tsv.gz",
        orientation: Orientation::ByColumnEntity,
        function: FunctionFamily::Ko,
        category: ProfileCategory::Community,
        axis_labels: ("KO", "sample ID"),
    },
    OutputTable {
        id: "metagenome_metacyc",
        rel_path: "pathways_out/path_abun_unstrat.tsv.gz",
        orientation: Orientation::ByColumnEntity,
        function: FunctionFamily::MetaCyc,
        category: ProfileCategory::Community,
        axis_labels: ("MetaCyc pathway", "sample ID"),
    },
];

/// Per-amplicon placement quality written next to the tables.
pub const QUALITY_TABLE: &str = "marker_predicted_and_nsti.tsv.gz";

/// Column of [`QUALITY_TABLE`] holding the NSTI.
pub const QUALITY_COLUMN: &str = "metadata_NSTI";

/// Look up a catalog entry by id.
pub fn find_table(id: &str) -> Option<&'static OutputTable> {
    OUTPUT_TABLES.iter().find(|t| t.id == id)
}

/// Catalog entries for the selected function families, in report order.
pub fn select_tables(families: &[FunctionFamily]) -> Vec<&'static OutputTable> {
    OUTPUT_TABLES
        .iter()
        .filter(|t| families.contains(&t.function))
        .collect()
}

/// Check every table in `tables` exists under `out_dir`.
pub fn check_outputs(out_dir: &Path, tables: &[&OutputTable]) -> Result<()> {
    for table in tables {
        let path = out_dir.join(table.rel_path);
        if !path.is_file() {
            return Err(PredictError::MissingOutput(path));
        }
    }
    Ok(())
}

/// A predictor table decompressed into the run directory.
#[derive(Debug, Clone)]
pub struct DecompressedTable {
    pub table: &'static OutputTable,
    pub path: PathBuf,
}

/// Gunzip each table into its own numbered subdirectory of `dst_dir`.
///
/// Several tables share a file name, so each goes to `<dst_dir>/<i>/`.
pub fn decompress_outputs(
    out_dir: &Path,
    dst_dir: &Path,
    tables: &[&'static OutputTable],
) -> Result<Vec<DecompressedTable>> {
    tables
        .iter()
        .copied()
        .enumerate()
        .map(|(i, table)| {
            let dst = dst_dir.join(i.to_string()).join(table.tsv_name());
            let path = gunzip(out_dir.join(table.rel_path), &dst)?;
            info!("Decompressed {} to {}", table.rel_path, path.display());
            Ok(DecompressedTable { table, path })
        })
        .collect()
}
