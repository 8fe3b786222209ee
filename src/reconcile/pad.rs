//! Restore predictor tables to the full entity universe.

use crate::data::{FunctionTable, NOT_PREDICTED};
use crate::error::{PredictError, Result};
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Which axis of a table carries the entity ids to be padded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Entities are rows (entity × function)
    ByRowEntity,
    /// Entities are columns (function × sample)
    ByColumnEntity,
}

impl Orientation {
    /// Entity ids of `table` along this orientation.
    pub fn entity_ids<'a>(&self, table: &'a FunctionTable) -> &'a [String] {
        match self {
            Orientation::ByRowEntity => table.row_ids(),
            Orientation::ByColumnEntity => table.col_ids(),
        }
    }
}

/// Pad `table` so its entity axis lists exactly `full_ids`, in that order.
///
/// Entities the table lacks are filled with [`NOT_PREDICTED`]; present
/// entities are copied by id, so the table's own ordering does not matter.
/// If the table already has as many entities as `full_ids`, it is returned
/// untouched.
///
/// # Errors
/// `InvalidParameter` if the table holds an entity outside `full_ids` or
/// holds the same entity twice.
pub fn restore_full_shape(
    table: FunctionTable,
    full_ids: &[String],
    orientation: Orientation,
) -> Result<FunctionTable> {
    if orientation.entity_ids(&table).len() == full_ids.len() {
        return Ok(table);
    }

    match orientation {
        Orientation::ByRowEntity => pad_rows(&table, full_ids),
        Orientation::ByColumnEntity => Ok(pad_rows(&table.transpose(), full_ids)?.transpose()),
    }
}

fn pad_rows(table: &FunctionTable, full_ids: &[String]) -> Result<FunctionTable> {
    let target: HashMap<&str, usize> = full_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();

    let mut data = DMatrix::from_element(full_ids.len(), table.n_cols(), NOT_PREDICTED);
    let mut seen = HashSet::with_capacity(table.n_rows());

    for (src, id) in table.row_ids().iter().enumerate() {
        let dst = *target.get(id.as_str()).ok_or_else(|| {
            PredictError::InvalidParameter(format!(
                "Entity '{}' is not among the {} known ids",
                id,
                full_ids.len()
            ))
        })?;
        if !seen.insert(dst) {
            return Err(PredictError::InvalidParameter(format!(
                "Entity '{}' appears more than once",
                id
            )));
        }
        data.row_mut(dst).copy_from(&table.data().row(src));
    }

    debug!(
        "Padded {} of {} entities with the not-predicted marker",
        full_ids.len() - seen.len(),
        full_ids.len()
    );

    Ok(
        FunctionTable::new(data, full_ids.to_vec(), table.col_ids().to_vec())?
            .with_index_name(table.index_name()),
    )
}

/// Pad a table file in place; returns the entity ids the file held before padding.
pub fn pad_table_file<P: AsRef<Path>>(
    path: P,
    full_ids: &[String],
    orientation: Orientation,
) -> Result<Vec<String>> {
    let path = path.as_ref();
    let table = FunctionTable::from_tsv(path)?;
    let present = orientation.entity_ids(&table).to_vec();

    if present.len() != full_ids.len() {
        restore_full_shape(table, full_ids, orientation)?.to_tsv(path)?;
    }

    Ok(present)
}

/// Check the samples of a function × sample table against the matrix's.
///
/// A sample outside `col_ids` is always an error. Samples of `col_ids`
/// missing from the table are an error unless `allow_missing`, in which case
/// the caller pads them afterwards.
pub fn check_sample_ids(
    table: &FunctionTable,
    col_ids: &[String],
    allow_missing: bool,
) -> Result<()> {
    let known: HashSet<&str> = col_ids.iter().map(String::as_str).collect();
    let present: HashSet<&str> = table.col_ids().iter().map(String::as_str).collect();

    let extra: Vec<&str> = table
        .col_ids()
        .iter()
        .map(String::as_str)
        .filter(|id| !known.contains(id))
        .collect();
    if !extra.is_empty() {
        return Err(PredictError::Reconciliation {
            table: table.index_name().to_string(),
            reason: format!(
                "{} sample(s) not in the input matrix, e.g. {:?}",
                extra.len(),
                &extra[..extra.len().min(5)]
            ),
        });
    }

    if !allow_missing {
        let missing: Vec<&str> = col_ids
            .iter()
            .map(String::as_str)
            .filter(|id| !present.contains(id))
            .collect();
        if !missing.is_empty() {
            return Err(PredictError::Reconciliation {
                table: table.index_name().to_string(),
                reason: format!(
                    "{} sample(s) of the input matrix missing, e.g. {:?}",
                    missing.len(),
                    &missing[..missing.len().min(5)]
                ),
            });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn partial_table() -> FunctionTable {
        // Rows out of universe order; "b" and "d" dropped
        let data = DMatrix::from_row_slice(2, 2, &[3.0, 0.0, 1.0, 2.0]);
        FunctionTable::new(data, ids(&["c", "a"]), ids(&["f1", "f2"]))
            .unwrap()
            .with_index_name("sequence")
    }

    #[test]
    fn test_pad_rows_in_universe_order() {
        let full = ids(&["a", "b", "c", "d"]);
        let padded = restore_full_shape(partial_table(), &full, Orientation::ByRowEntity).unwrap();

        assert_eq!(padded.row_ids(), full.as_slice());
        assert_eq!(padded.col_ids(), &["f1", "f2"]);
        assert_eq!(padded.index_name(), "sequence");
        assert_eq!(padded.row(0), vec![1.0, 2.0]);
        assert_eq!(padded.row(2), vec![3.0, 0.0]);
        assert!(padded.row(1).iter().all(|v| v.is_nan()));
        assert!(padded.row(3).iter().all(|v| v.is_nan()));
        // Predicted zero stays zero
        assert_eq!(padded.get(2, 1), 0.0);
    }

    #[test]
    fn test_padding_is_idempotent() {
        let full = ids(&["a", "b", "c", "d"]);
        let once = restore_full_shape(partial_table(), &full, Orientation::ByRowEntity).unwrap();
        let twice = restore_full_shape(once.clone(), &full, Orientation::ByRowEntity).unwrap();

        assert_eq!(once.row_ids(), twice.row_ids());
        for i in 0..once.n_rows() {
            for j in 0..once.n_cols() {
                let (x, y) = (once.get(i, j), twice.get(i, j));
                assert!(x == y || (x.is_nan() && y.is_nan()));
            }
        }
    }

    #[test]
    fn test_full_table_returned_unchanged() {
        // Same count takes the fast path, ordering included
        let full = ids(&["a", "c"]);
        let table = restore_full_shape(partial_table(), &full, Orientation::ByRowEntity).unwrap();
        assert_eq!(table.row_ids(), &["c", "a"]);
    }

    #[test]
    fn test_pad_columns() {
        let data = DMatrix::from_row_slice(2, 2, &[5.0, 6.0, 7.0, 8.0]);
        let table = FunctionTable::new(data, ids(&["K1", "K2"]), ids(&["s3", "s1"])).unwrap();
        let full = ids(&["s1", "s2", "s3"]);

        let padded = restore_full_shape(table, &full, Orientation::ByColumnEntity).unwrap();
        assert_eq!(padded.row_ids(), &["K1", "K2"]);
        assert_eq!(padded.col_ids(), full.as_slice());
        assert_eq!(padded.get(0, 0), 6.0);
        assert!(padded.get(0, 1).is_nan());
        assert_eq!(padded.get(1, 2), 7.0);
    }

    #[test]
    fn test_unknown_entity_rejected() {
        let full = ids(&["a", "b", "x"]);
        assert!(matches!(
            restore_full_shape(partial_table(), &full, Orientation::ByRowEntity),
            Err(PredictError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let data = DMatrix::from_row_slice(2, 1, &[1.0, 2.0]);
        let table = FunctionTable::new(data, ids(&["a", "a"]), ids(&["f1"])).unwrap();
        let full = ids(&["a", "b", "c"]);
        assert!(restore_full_shape(table, &full, Orientation::ByRowEntity).is_err());
    }

    #[test]
    fn test_pad_table_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("table.tsv");
        std::fs::write(&path, "sequence\tf1\tf2\nc\t3\t0\na\t1\t2\n").unwrap();

        let present = pad_table_file(&path, &ids(&["a", "b", "c", "d"]), Orientation::ByRowEntity)
            .unwrap();
        assert_eq!(present, ids(&["c", "a"]));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "sequence\tf1\tf2\na\t1\t2\nb\t\t\nc\t3\t0\nd\t\t\n");
    }

    #[test]
    fn test_check_sample_ids() {
        let data = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        let table = FunctionTable::new(data, ids(&["K1"]), ids(&["s1", "s9"])).unwrap();

        // Same samples in another order
        assert!(check_sample_ids(&table, &ids(&["s9", "s1"]), false).is_ok());
        // Missing sample tolerated only when it will be padded
        assert!(check_sample_ids(&table, &ids(&["s1", "s9", "s2"]), true).is_ok());
        assert!(matches!(
            check_sample_ids(&table, &ids(&["s1", "s9", "s2"]), false),
            Err(PredictError::Reconciliation { .. })
        ));
        // Unknown sample never tolerated
        assert!(matches!(
            check_sample_ids(&table, &ids(&["s1", "s2"]), true),
            Err(PredictError::Reconciliation { .. })
        ));
    }

    #[test]
    fn test_single_column_padding() {
        let data = DMatrix::from_row_slice(2, 1, &[5.0, 7.0]);
        let table = FunctionTable::new(data, ids(&["b", "d"]), ids(&["f"])).unwrap();
        let full = ids(&["a", "b", "c", "d"]);

        let padded = restore_full_shape(table, &full, Orientation::ByRowEntity).unwrap();
        assert_eq!(padded.row_ids(), full.as_slice());
        assert_eq!(padded.n_cols(), 1);
        assert!(padded.get(0, 0).is_nan());
        assert_eq!(padded.get(1, 0), 5.0);
        assert!(padded.get(2, 0).is_nan());
        assert_eq!(padded.get(3, 0), 7.0);
        assert_eq!(padded.n_not_predicted(), 2);
    }
}
