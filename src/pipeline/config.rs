//! Run parameters and tool settings.

use crate::error::{PredictError, Result};
use crate::predictor::{FunctionFamily, ShellPredictor};
use crate::reconcile::DEFAULT_NSTI_MAX;
use crate::report::DEFAULT_MAX_LEN;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Keys accepted by [`RunParams::from_value`] after flattening.
pub const ALLOWED_PARAMS: [&str; 9] = [
    "amplicon_matrix_ref",
    "workspace_id",
    "workspace_name",
    "output_name",
    "create_amplicon_derived_objects",
    "create_sample_derived_objects",
    "ko",
    "ec",
    "metacyc",
];

/// Parameters of one prediction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunParams {
    /// Reference of the amplicon matrix to predict for
    pub amplicon_matrix_ref: String,
    /// Workspace receiving new objects; defaults to the matrix's
    pub workspace_name: Option<String>,
    pub workspace_id: Option<String>,
    /// Name for the re-saved matrix; defaults to the matrix's own name
    pub output_name: Option<String>,
    /// Create per-amplicon functional profiles (default true)
    pub create_amplicon_derived_objects: bool,
    /// Create per-sample functional profiles (default true)
    pub create_sample_derived_objects: bool,
    pub ko: bool,
    pub ec: bool,
    pub metacyc: bool,
}

impl RunParams {
    /// Parameters for `amplicon_matrix_ref` with every default.
    pub fn new(amplicon_matrix_ref: &str) -> Self {
        Self {
            amplicon_matrix_ref: amplicon_matrix_ref.to_string(),
            workspace_name: None,
            workspace_id: None,
            output_name: None,
            create_amplicon_derived_objects: true,
            create_sample_derived_objects: true,
            ko: true,
            ec: true,
            metacyc: true,
        }
    }

    /// Build parameters from a loosely-typed mapping.
    ///
    /// Nested mappings are flattened one level, so `{"functions": {"ko": 0}}`
    /// reads as `{"ko": 0}`. Every key must be in [`ALLOWED_PARAMS`].
    /// Booleans may be given as `0`/`1`; an empty `output_name` means none.
    pub fn from_value(value: Value) -> Result<Self> {
        let flat = flatten(value)?;
        if let Some(key) = flat.keys().find(|k| !ALLOWED_PARAMS.contains(&k.as_str())) {
            return Err(PredictError::UnknownParameter(key.clone()));
        }

        let amplicon_matrix_ref = get_string(&flat, "amplicon_matrix_ref")?
            .ok_or_else(|| PredictError::MissingParameter("amplicon_matrix_ref".to_string()))?;
        let mut params = Self::new(&amplicon_matrix_ref);

        params.workspace_name = get_string(&flat, "workspace_name")?;
        params.workspace_id = get_string(&flat, "workspace_id")?;
        params.output_name = get_string(&flat, "output_name")?.filter(|s| !s.is_empty());

        if let Some(v) = get_bool(&flat, "create_amplicon_derived_objects")? {
            params.create_amplicon_derived_objects = v;
        }
        if let Some(v) = get_bool(&flat, "create_sample_derived_objects")? {
            params.create_sample_derived_objects = v;
        }
        if let Some(v) = get_bool(&flat, "ko")? {
            params.ko = v;
        }
        if let Some(v) = get_bool(&flat, "ec")? {
            params.ec = v;
        }
        if let Some(v) = get_bool(&flat, "metacyc")? {
            params.metacyc = v;
        }

        if params.functions().is_empty() {
            return Err(PredictError::InvalidParameter(
                "At least one of ko, ec, metacyc must be selected".to_string(),
            ));
        }

        Ok(params)
    }

    /// Parse a JSON document and apply [`RunParams::from_value`].
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Parse a YAML document and apply [`RunParams::from_value`].
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        Self::from_value(serde_yaml::from_str(yaml)?)
    }

    /// Selected function families.
    pub fn functions(&self) -> Vec<FunctionFamily> {
        let mut families = Vec::new();
        if self.ko {
            families.push(FunctionFamily::Ko);
        }
        if self.ec {
            families.push(FunctionFamily::Ec);
        }
        if self.metacyc {
            families.push(FunctionFamily::MetaCyc);
        }
        families
    }

    /// Workspace for new objects, if one was given.
    pub fn workspace(&self) -> Option<&str> {
        self.workspace_name
            .as_deref()
            .or(self.workspace_id.as_deref())
    }
}

fn flatten(value: Value) -> Result<Map<String, Value>> {
    let Value::Object(map) = value else {
        return Err(PredictError::InvalidParameter(
            "Parameters must be a mapping".to_string(),
        ));
    };

    let mut flat = Map::new();
    for (key, value) in map {
        match value {
            Value::Object(inner) => flat.extend(inner),
            other => {
                flat.insert(key, other);
            }
        }
    }
    Ok(flat)
}

fn get_string(map: &Map<String, Value>, key: &str) -> Result<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(PredictError::InvalidParameter(format!(
            "'{}' must be a string, got {}",
            key, other
        ))),
    }
}

fn get_bool(map: &Map<String, Value>, key: &str) -> Result<Option<bool>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(Value::Number(n)) if n.as_i64() == Some(0) => Ok(Some(false)),
        Some(Value::Number(n)) if n.as_i64() == Some(1) => Ok(Some(true)),
        Some(other) => Err(PredictError::InvalidParameter(format!(
            "'{}' must be a boolean, got {}",
            key, other
        ))),
    }
}

/// Tool-level settings shared by every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Predictor executable (or shell prefix ending in it)
    pub executable: String,
    pub threads: usize,
    /// Flags appended to the predictor command line
    pub extra_flags: Vec<String>,
    /// Directory holding per-run working directories
    pub scratch_dir: PathBuf,
    /// Amplicons with a higher NSTI are expected to be dropped
    pub nsti_max: f64,
    /// Check dropped amplicons against the quality table
    pub verify_drops: bool,
    /// Pad per-sample tables to every sample of the matrix
    pub pad_sample_tables: bool,
    /// Cap on heatmap rows and columns
    pub heatmap_max_len: usize,
    /// Header of the id column in the abundance table
    pub amplicon_header: String,
    /// Two-column TSV mapping MetaCyc pathway codes to descriptions
    pub metacyc_descriptions: Option<PathBuf>,
    /// Name of the side-table slot receiving pathway predictions
    pub trait_attribute: String,
    /// Source of that slot, also the method name of derived profiles
    pub trait_source: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            executable: "picrust2_pipeline.py".to_string(),
            threads: 1,
            extra_flags: vec!["--verbose".to_string()],
            scratch_dir: default_scratch_dir(),
            nsti_max: DEFAULT_NSTI_MAX,
            verify_drops: true,
            pad_sample_tables: true,
            heatmap_max_len: DEFAULT_MAX_LEN,
            amplicon_header: "Amplicon_Id".to_string(),
            metacyc_descriptions: None,
            trait_attribute: "PICRUSt2 MetaCyc Predictions".to_string(),
            trait_source: "PICRUSt2".to_string(),
        }
    }
}

impl Settings {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(PredictError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(PredictError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_yaml(&std::fs::read_to_string(path)?)
    }

    /// Shell predictor configured from these settings.
    pub fn predictor(&self) -> ShellPredictor {
        ShellPredictor::new(&self.executable)
            .with_threads(self.threads)
            .with_extra_flags(self.extra_flags.clone())
    }
}

fn default_scratch_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("amplicon-predict")
        .join("runs")
}
