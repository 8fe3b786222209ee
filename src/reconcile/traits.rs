//! Per-amplicon trait strings from a padded entity × function table.

use crate::data::io::open_reader;
use crate::data::FunctionTable;
use crate::error::{PredictError, Result};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Function code → human-readable description.
#[derive(Debug, Clone, Default)]
pub struct DescriptionMap {
    map: HashMap<String, String>,
}

impl DescriptionMap {
    /// Read a headerless two-column TSV (gzip if the path ends in `.gz`).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(open_reader(path)?);

        let mut map = HashMap::new();
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            match (record.get(0), record.get(1)) {
                (Some(code), Some(desc)) => {
                    map.insert(code.to_string(), desc.to_string());
                }
                _ => {
                    return Err(PredictError::InvalidParameter(format!(
                        "Description line {} has fewer than 2 fields",
                        line + 1
                    )))
                }
            }
        }

        Ok(Self { map })
    }

    /// Description of `code`, or the code itself if unknown.
    pub fn describe<'a>(&'a self, code: &'a str) -> &'a str {
        self.map.get(code).map(String::as_str).unwrap_or(code)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl FromIterator<(String, String)> for DescriptionMap {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            map: iter.into_iter().collect(),
        }
    }
}

/// Comma-join the functions each amplicon is predicted to carry.
///
/// A function counts when its abundance is nonzero; columns keep table
/// order. Amplicons predicted to carry nothing map to an empty string.
/// Amplicons whose row is entirely not-predicted get no entry at all, so
/// their current attribute value is left alone.
pub fn derive_traits(
    table: &FunctionTable,
    descriptions: Option<&DescriptionMap>,
) -> BTreeMap<String, String> {
    let mut traits = BTreeMap::new();

    for (i, id) in table.row_ids().iter().enumerate() {
        let row = table.row(i);
        if row.iter().all(|v| v.is_nan()) {
            continue;
        }

        let names: Vec<&str> = row
            .iter()
            .zip(table.col_ids())
            .filter(|(v, _)| !v.is_nan() && **v != 0.0)
            .map(|(_, code)| match descriptions {
                Some(map) => map.describe(code),
                None => code.as_str(),
            })
            .collect();

        traits.insert(id.clone(), names.join(","));
    }

    traits
}
