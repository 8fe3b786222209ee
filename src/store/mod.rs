//! Persistent objects: the input matrix, its side-table, and derived profiles.
//!
//! Objects are addressed by `workspace/name/version` references. Saving never
//! overwrites: every save of a name produces the next version.

mod local;
mod session;

pub use local::LocalStore;
pub use session::{LoadedAttributeMapping, LoadedMatrix};

use crate::error::{PredictError, Result};
use crate::predictor::{FunctionFamily, ProfileCategory};
use serde_json::Value;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Type name of amplicon abundance matrices.
pub const MATRIX_TYPE: &str = "KBaseMatrices.AmpliconMatrix";
/// Type name of attribute side-tables.
pub const ATTRIBUTE_MAPPING_TYPE: &str = "KBaseExperiments.AttributeMapping";
/// Type name of derived functional profiles.
pub const PROFILE_TYPE: &str = "KBaseProfile.FunctionalProfile";

/// Parsed `workspace/name[/version]` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectRef {
    pub workspace: String,
    pub name: String,
    /// `None` means the latest version
    pub version: Option<u64>,
}

impl FromStr for ObjectRef {
    type Err = PredictError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split('/').collect();
        let invalid = || PredictError::InvalidParameter(format!("Invalid object reference '{}'", s));

        let (workspace, name, version) = match parts.as_slice() {
            [ws, name] => (*ws, *name, None),
            [ws, name, version] => (
                *ws,
                *name,
                Some(version.parse::<u64>().map_err(|_| invalid())?),
            ),
            _ => return Err(invalid()),
        };
        if workspace.is_empty() || name.is_empty() {
            return Err(invalid());
        }

        Ok(Self {
            workspace: workspace.to_string(),
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.version {
            Some(v) => write!(f, "{}/{}/{}", self.workspace, self.name, v),
            None => write!(f, "{}/{}", self.workspace, self.name),
        }
    }
}

/// An object as returned by [`ObjectStore::get_object`].
#[derive(Debug, Clone)]
pub struct StoredObject {
    /// Fully versioned reference
    pub reference: ObjectRef,
    pub type_name: String,
    pub data: Value,
}

/// A new object version to persist.
#[derive(Debug, Clone)]
pub struct SaveRequest<'a> {
    pub workspace: &'a str,
    pub type_name: &'a str,
    pub name: &'a str,
    pub data: Value,
    /// References of the objects this one was derived from
    pub provenance: Vec<String>,
}

/// Versioned object storage.
pub trait ObjectStore {
    /// Fetch an object; a reference without version resolves to the latest.
    fn get_object(&self, reference: &str) -> Result<StoredObject>;

    /// Persist a new version and return its full reference.
    fn save_object(&self, request: SaveRequest) -> Result<String>;
}

/// A functional profile to derive from a padded predictor table.
#[derive(Debug, Clone)]
pub struct ProfileRequest<'a> {
    pub workspace: &'a str,
    /// Matrix the profile was predicted from
    pub matrix_ref: &'a str,
    /// Padded TSV holding the profile values
    pub table_path: &'a Path,
    pub category: ProfileCategory,
    pub function: FunctionFamily,
    pub method: &'a str,
    pub name: &'a str,
    pub description: &'a str,
}

/// Factory for derived functional profile objects.
pub trait ProfileStore {
    /// Create the profile and return its reference.
    fn create_profile(&self, request: &ProfileRequest) -> Result<String>;
}
