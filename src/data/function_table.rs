//! Dense labelled tables produced by the functional predictor.

use super::io::{format_value, open_reader};
use crate::error::{PredictError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// Marker for "not predicted", kept distinct from a predicted zero.
pub const NOT_PREDICTED: f64 = f64::NAN;

/// A dense table with labelled rows and columns.
///
/// Cells holding [`NOT_PREDICTED`] are written as empty cells and read back
/// as the sentinel, so a round trip through TSV never turns them into zeros.
#[derive(Debug, Clone)]
pub struct FunctionTable {
    /// Values (rows × columns)
    data: DMatrix<f64>,
    /// Row identifiers
    row_ids: Vec<String>,
    /// Column identifiers
    col_ids: Vec<String>,
    /// Header of the identifier column
    index_name: String,
}

impl FunctionTable {
    /// Create a table from values and identifiers.
    pub fn new(data: DMatrix<f64>, row_ids: Vec<String>, col_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != row_ids.len() {
            return Err(PredictError::DimensionMismatch {
                expected: nrows,
                actual: row_ids.len(),
            });
        }
        if ncols != col_ids.len() {
            return Err(PredictError::DimensionMismatch {
                expected: ncols,
                actual: col_ids.len(),
            });
        }
        Ok(Self {
            data,
            row_ids,
            col_ids,
            index_name: "id".to_string(),
        })
    }

    /// Set the header of the identifier column.
    pub fn with_index_name(mut self, name: &str) -> Self {
        self.index_name = name.to_string();
        self
    }

    /// Load a table from a TSV file (gzip-compressed if the path ends in `.gz`).
    ///
    /// Expected format:
    /// - First row: header, first field names the identifier column
    /// - Subsequent rows: identifier followed by values; empty cells are the sentinel
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(open_reader(path)?)
    }

    /// Parse a table from any TSV reader.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(reader);

        let header = rdr.headers()?.clone();
        if header.is_empty() {
            return Err(PredictError::EmptyData("Table has no header".to_string()));
        }
        let index_name = header[0].to_string();
        let col_ids: Vec<String> = header.iter().skip(1).map(String::from).collect();
        let n_cols = col_ids.len();

        let mut row_ids = Vec::new();
        let mut values = Vec::new();
        for (row_idx, record) in rdr.records().enumerate() {
            let record = record?;
            row_ids.push(record[0].to_string());
            for (col_idx, field) in record.iter().skip(1).enumerate() {
                let field = field.trim();
                let value = if field.is_empty() {
                    NOT_PREDICTED
                } else {
                    field.parse::<f64>().map_err(|_| {
                        PredictError::InvalidParameter(format!(
                            "Invalid value '{}' at row {}, column {}",
                            field, row_idx, col_idx
                        ))
                    })?
                };
                values.push(value);
            }
        }

        let data = DMatrix::from_row_slice(row_ids.len(), n_cols, &values);
        Ok(Self::new(data, row_ids, col_ids)?.with_index_name(&index_name))
    }

    /// Write the table to a TSV file.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "{}", self.index_name)?;
        for col_id in &self.col_ids {
            write!(writer, "\t{}", col_id)?;
        }
        writeln!(writer)?;

        for (row_idx, row_id) in self.row_ids.iter().enumerate() {
            write!(writer, "{}", row_id)?;
            for col_idx in 0..self.n_cols() {
                write!(writer, "\t{}", format_value(self.data[(row_idx, col_idx)]))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[(row, col)]
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.data.ncols()
    }

    #[inline]
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    #[inline]
    pub fn col_ids(&self) -> &[String] {
        &self.col_ids
    }

    #[inline]
    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    #[inline]
    pub fn data(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Get a row as a dense vector.
    pub fn row(&self, row: usize) -> Vec<f64> {
        self.data.row(row).iter().copied().collect()
    }

    /// Swap rows and columns.
    pub fn transpose(&self) -> Self {
        Self {
            data: self.data.transpose(),
            row_ids: self.col_ids.clone(),
            col_ids: self.row_ids.clone(),
            index_name: self.index_name.clone(),
        }
    }

    /// Row sums, counting the sentinel as zero.
    pub fn row_sums(&self) -> Vec<f64> {
        (0..self.n_rows())
            .into_par_iter()
            .map(|row| {
                self.data
                    .row(row)
                    .iter()
                    .filter(|v| !v.is_nan())
                    .sum::<f64>()
            })
            .collect()
    }

    /// Column sums, counting the sentinel as zero.
    pub fn col_sums(&self) -> Vec<f64> {
        (0..self.n_cols())
            .into_par_iter()
            .map(|col| {
                self.data
                    .column(col)
                    .iter()
                    .filter(|v| !v.is_nan())
                    .sum::<f64>()
            })
            .collect()
    }

    /// Number of cells holding the sentinel.
    pub fn n_not_predicted(&self) -> usize {
        self.data.iter().filter(|v| v.is_nan()).count()
    }

    /// Subset to the given row and column indices, in the given order.
    pub fn subset(&self, rows: &[usize], cols: &[usize]) -> Result<Self> {
        if let Some(&bad) = rows.iter().find(|&&r| r >= self.n_rows()) {
            return Err(PredictError::InvalidParameter(format!(
                "Row index {} out of bounds",
                bad
            )));
        }
        if let Some(&bad) = cols.iter().find(|&&c| c >= self.n_cols()) {
            return Err(PredictError::InvalidParameter(format!(
                "Column index {} out of bounds",
                bad
            )));
        }

        let data = DMatrix::from_fn(rows.len(), cols.len(), |i, j| {
            self.data[(rows[i], cols[j])]
        });
        let row_ids = rows.iter().map(|&r| self.row_ids[r].clone()).collect();
        let col_ids = cols.iter().map(|&c| self.col_ids[c].clone()).collect();

        Ok(Self::new(data, row_ids, col_ids)?.with_index_name(&self.index_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_table() -> FunctionTable {
        // 3 amplicons × 2 functions, one cell not predicted
        let data = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 2.5, NOT_PREDICTED, 0.0, 4.0]);
        FunctionTable::new(
            data,
            vec!["asv_1".into(), "asv_2".into(), "asv_3".into()],
            vec!["K00001".into(), "K00002".into()],
        )
        .unwrap()
        .with_index_name("sequence")
    }

    #[test]
    fn test_dimension_check() {
        let data = DMatrix::zeros(2, 2);
        assert!(FunctionTable::new(data, vec!["a".into()], vec!["x".into(), "y".into()]).is_err());
    }

    #[test]
    fn test_sums_skip_sentinel() {
        let table = create_test_table();
        assert_eq!(table.row_sums(), vec![1.0, 2.5, 4.0]);
        assert_eq!(table.col_sums(), vec![3.5, 4.0]);
        assert_eq!(table.n_not_predicted(), 1);
    }

    #[test]
    fn test_tsv_roundtrip_keeps_sentinel() {
        let table = create_test_table();
        let file = tempfile::NamedTempFile::new().unwrap();
        table.to_tsv(file.path()).unwrap();

        let text = std::fs::read_to_string(file.path()).unwrap();
        assert!(text.starts_with("sequence\tK00001\tK00002\n"));
        assert!(text.contains("asv_2\t2.5\t\n"));

        let loaded = FunctionTable::from_tsv(file.path()).unwrap();
        assert_eq!(loaded.row_ids(), table.row_ids());
        assert_eq!(loaded.col_ids(), table.col_ids());
        assert_eq!(loaded.index_name(), "sequence");
        assert!(loaded.get(1, 1).is_nan());
        assert_eq!(loaded.get(1, 0), 2.5);
        assert_eq!(loaded.get(0, 1), 0.0);
    }

    #[test]
    fn test_invalid_value() {
        let text = "id\tx\na\tnot_a_number\n";
        assert!(FunctionTable::from_reader(text.as_bytes()).is_err());
    }

    #[test]
    fn test_transpose() {
        let t = create_test_table().transpose();
        assert_eq!(t.n_rows(), 2);
        assert_eq!(t.n_cols(), 3);
        assert_eq!(t.row_ids(), &["K00001", "K00002"]);
        assert_eq!(t.get(1, 2), 4.0);
    }

    #[test]
    fn test_subset() {
        let table = create_test_table();
        let sub = table.subset(&[2, 0], &[1]).unwrap();
        assert_eq!(sub.row_ids(), &["asv_3", "asv_1"]);
        assert_eq!(sub.col_ids(), &["K00002"]);
        assert_eq!(sub.get(0, 0), 4.0);
        assert!(table.subset(&[3], &[0]).is_err());
    }
}
