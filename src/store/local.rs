//! Directory-backed object store.

use super::{
    ObjectRef, ObjectStore, ProfileRequest, ProfileStore, SaveRequest, StoredObject, PROFILE_TYPE,
};
use crate::data::FunctionTable;
use crate::error::{PredictError, Result};
use log::info;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// On-disk form of one object version.
#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    type_name: String,
    name: String,
    version: u64,
    #[serde(default)]
    provenance: Vec<String>,
    data: Value,
}

/// Object store keeping each version as `<root>/<workspace>/<name>/<version>.json`.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn object_dir(&self, workspace: &str, name: &str) -> Result<PathBuf> {
        for part in [workspace, name] {
            if part.is_empty() || part.contains('/') || part == "." || part == ".." {
                return Err(PredictError::InvalidParameter(format!(
                    "Invalid workspace or object name '{}'",
                    part
                )));
            }
        }
        Ok(self.root.join(workspace).join(name))
    }

    /// Saved versions of `workspace/name`, ascending.
    pub fn versions(&self, workspace: &str, name: &str) -> Result<Vec<u64>> {
        let dir = self.object_dir(workspace, name)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut versions: Vec<u64> = fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                match path.extension().and_then(|e| e.to_str()) {
                    Some("json") => path.file_stem()?.to_str()?.parse().ok(),
                    _ => None,
                }
            })
            .collect();
        versions.sort_unstable();
        Ok(versions)
    }

    /// Provenance recorded for a stored object.
    pub fn provenance(&self, reference: &str) -> Result<Vec<String>> {
        Ok(self.read_envelope(reference)?.1.provenance)
    }

    fn read_envelope(&self, reference: &str) -> Result<(ObjectRef, Envelope)> {
        let mut r: ObjectRef = reference.parse()?;
        let version = match r.version {
            Some(v) => v,
            None => *self
                .versions(&r.workspace, &r.name)?
                .last()
                .ok_or_else(|| PredictError::ObjectNotFound(reference.to_string()))?,
        };

        let path = self
            .object_dir(&r.workspace, &r.name)?
            .join(format!("{}.json", version));
        if !path.is_file() {
            return Err(PredictError::ObjectNotFound(reference.to_string()));
        }

        let envelope: Envelope = serde_json::from_reader(BufReader::new(File::open(path)?))?;
        r.version = Some(version);
        Ok((r, envelope))
    }
}

impl ObjectStore for LocalStore {
    fn get_object(&self, reference: &str) -> Result<StoredObject> {
        let (reference, envelope) = self.read_envelope(reference)?;
        Ok(StoredObject {
            reference,
            type_name: envelope.type_name,
            data: envelope.data,
        })
    }

    fn save_object(&self, request: SaveRequest) -> Result<String> {
        let dir = self.object_dir(request.workspace, request.name)?;
        fs::create_dir_all(&dir)?;

        let version = self
            .versions(request.workspace, request.name)?
            .last()
            .map_or(1, |v| v + 1);
        let envelope = Envelope {
            type_name: request.type_name.to_string(),
            name: request.name.to_string(),
            version,
            provenance: request.provenance,
            data: request.data,
        };

        let mut writer = BufWriter::new(File::create(dir.join(format!("{}.json", version)))?);
        serde_json::to_writer_pretty(&mut writer, &envelope)?;
        writer.flush()?;

        let reference = ObjectRef {
            workspace: request.workspace.to_string(),
            name: request.name.to_string(),
            version: Some(version),
        }
        .to_string();
        info!("Saved {} {}", request.type_name, reference);
        Ok(reference)
    }
}

impl ProfileStore for LocalStore {
    fn create_profile(&self, request: &ProfileRequest) -> Result<String> {
        let table = FunctionTable::from_tsv(request.table_path)?;
        let values: Vec<Vec<Option<f64>>> = (0..table.n_rows())
            .map(|i| {
                table
                    .row(i)
                    .into_iter()
                    .map(|v| if v.is_nan() { None } else { Some(v) })
                    .collect()
            })
            .collect();

        let data = json!({
            "original_matrix_ref": request.matrix_ref,
            "profile_category": request.category,
            "profile_type": request.function.code(),
            "method": request.method,
            "description": request.description,
            "data": {
                "row_ids": table.row_ids(),
                "col_ids": table.col_ids(),
                "values": values,
            },
        });

        self.save_object(SaveRequest {
            workspace: request.workspace,
            type_name: PROFILE_TYPE,
            name: request.name,
            data,
            provenance: vec![request.matrix_ref.to_string()],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predictor::{FunctionFamily, ProfileCategory};

    fn save(store: &LocalStore, name: &str, data: Value) -> String {
        store
            .save_object(SaveRequest {
                workspace: "ws",
                type_name: "Test.Object",
                name,
                data,
                provenance: vec!["ws/input/1".to_string()],
            })
            .unwrap()
    }

    #[test]
    fn test_versions_increment() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();

        assert_eq!(save(&store, "obj", json!({"x": 1})), "ws/obj/1");
        assert_eq!(save(&store, "obj", json!({"x": 2})), "ws/obj/2");
        assert_eq!(store.versions("ws", "obj").unwrap(), vec![1, 2]);

        let first = store.get_object("ws/obj/1").unwrap();
        assert_eq!(first.data, json!({"x": 1}));
        assert_eq!(first.type_name, "Test.Object");

        let latest = store.get_object("ws/obj").unwrap();
        assert_eq!(latest.reference.to_string(), "ws/obj/2");
        assert_eq!(latest.data, json!({"x": 2}));
        assert_eq!(store.provenance("ws/obj/2").unwrap(), vec!["ws/input/1"]);
    }

    #[test]
    fn test_missing_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        save(&store, "obj", json!({}));

        assert!(matches!(
            store.get_object("ws/other"),
            Err(PredictError::ObjectNotFound(_))
        ));
        assert!(matches!(
            store.get_object("ws/obj/7"),
            Err(PredictError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_invalid_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path()).unwrap();
        assert!(store.versions("ws", "..").is_err());
    }

    #[test]
    fn test_create_profile() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::open(dir.path().join("store")).unwrap();
        let table = dir.path().join("table.tsv");
        fs::write(&table, "function\ts1\ts2\nK1\t4\t\n").unwrap();

        let reference = store
            .create_profile(&ProfileRequest {
                workspace: "ws",
                matrix_ref: "ws/matrix/2",
                table_path: &table,
                category: ProfileCategory::Community,
                function: FunctionFamily::Ko,
                method: "PICRUSt2",
                name: "matrix.metagenome_ko",
                description: "KO abundance per sample",
            })
            .unwrap();
        assert_eq!(reference, "ws/matrix.metagenome_ko/1");

        let obj = store.get_object(&reference).unwrap();
        assert_eq!(obj.type_name, PROFILE_TYPE);
        assert_eq!(obj.data["profile_category"], json!("community"));
        assert_eq!(obj.data["profile_type"], json!("KO"));
        assert_eq!(obj.data["data"]["values"], json!([[4.0, null]]));
        assert_eq!(store.provenance(&reference).unwrap(), vec!["ws/matrix/2"]);
    }
}
