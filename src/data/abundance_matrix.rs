//! Amplicon abundance matrix as stored in the object store.

use super::io::format_value;
use crate::error::{PredictError, Result};
use crate::validate::{as_numeric, validate_abundance_values, NumericKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// The numeric payload of an [`AbundanceMatrix`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixData {
    /// Amplicon identifiers (rows)
    pub row_ids: Vec<String>,
    /// Sample identifiers (columns)
    pub col_ids: Vec<String>,
    /// Raw cells; numbers, `null`, or string tokens
    pub values: Vec<Vec<Value>>,
}

/// Amplicons × samples abundance matrix with its links to other objects.
///
/// Fields this crate does not know about are kept in `extra` and written back
/// unchanged on save.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbundanceMatrix {
    data: MatrixData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_attributemapping_ref: Option<String>,
    /// Matrix row id → side-table instance id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    row_mapping: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_set_ref: Option<String>,
    /// Amplicon id → nucleotide sequence
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequences: Option<BTreeMap<String, String>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AbundanceMatrix {
    /// Create a matrix from its payload, checking the shape.
    pub fn new(data: MatrixData) -> Result<Self> {
        let matrix = Self {
            data,
            row_attributemapping_ref: None,
            row_mapping: None,
            sample_set_ref: None,
            sequences: None,
            extra: Map::new(),
        };
        matrix.check_shape()?;
        Ok(matrix)
    }

    /// Deserialize a stored object, checking the shape.
    pub fn from_value(value: Value) -> Result<Self> {
        let matrix: Self = serde_json::from_value(value)?;
        matrix.check_shape()?;
        Ok(matrix)
    }

    /// Serialize back to the stored representation.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    fn check_shape(&self) -> Result<()> {
        if self.data.values.len() != self.data.row_ids.len() {
            return Err(PredictError::DimensionMismatch {
                expected: self.data.row_ids.len(),
                actual: self.data.values.len(),
            });
        }
        for row in &self.data.values {
            if row.len() != self.data.col_ids.len() {
                return Err(PredictError::DimensionMismatch {
                    expected: self.data.col_ids.len(),
                    actual: row.len(),
                });
            }
        }
        Ok(())
    }

    pub fn with_row_attributemapping_ref(mut self, reference: &str) -> Self {
        self.row_attributemapping_ref = Some(reference.to_string());
        self
    }

    pub fn with_row_mapping(mut self, mapping: BTreeMap<String, String>) -> Self {
        self.row_mapping = Some(mapping);
        self
    }

    pub fn with_sample_set_ref(mut self, reference: &str) -> Self {
        self.sample_set_ref = Some(reference.to_string());
        self
    }

    pub fn with_sequences(mut self, sequences: BTreeMap<String, String>) -> Self {
        self.sequences = Some(sequences);
        self
    }

    #[inline]
    pub fn row_ids(&self) -> &[String] {
        &self.data.row_ids
    }

    #[inline]
    pub fn col_ids(&self) -> &[String] {
        &self.data.col_ids
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.data.row_ids.len()
    }

    #[inline]
    pub fn n_cols(&self) -> usize {
        self.data.col_ids.len()
    }

    pub fn row_attributemapping_ref(&self) -> Option<&str> {
        self.row_attributemapping_ref.as_deref()
    }

    /// Point the matrix at a new version of its row side-table.
    pub fn set_row_attributemapping_ref(&mut self, reference: &str) {
        self.row_attributemapping_ref = Some(reference.to_string());
    }

    pub fn row_mapping(&self) -> Option<&BTreeMap<String, String>> {
        self.row_mapping.as_ref()
    }

    pub fn sample_set_ref(&self) -> Option<&str> {
        self.sample_set_ref.as_deref()
    }

    /// All cells in row-major order.
    pub fn cells(&self) -> Vec<Value> {
        self.data.values.iter().flatten().cloned().collect()
    }

    /// Check the matrix holds count data.
    pub fn validate(&self) -> Result<()> {
        validate_abundance_values(&self.cells())
    }

    /// Write the sequences as FASTA, in row order.
    pub fn write_fasta<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let sequences = self
            .sequences
            .as_ref()
            .ok_or_else(|| PredictError::MissingParameter("sequences".to_string()))?;

        let mut writer = BufWriter::new(File::create(path)?);
        for id in &self.data.row_ids {
            let seq = sequences.get(id).ok_or_else(|| {
                PredictError::InvalidParameter(format!("No sequence for amplicon '{}'", id))
            })?;
            writeln!(writer, ">{}", id)?;
            writeln!(writer, "{}", seq)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Write the abundance table handed to the predictor.
    ///
    /// Prerequisite: [`AbundanceMatrix::validate`]. Missing cells are written empty.
    pub fn write_abundance_tsv<P: AsRef<Path>>(&self, path: P, header: &str) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);

        write!(writer, "{}", header)?;
        for sample_id in &self.data.col_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (row_id, row) in self.data.row_ids.iter().zip(&self.data.values) {
            let values = as_numeric(row, NumericKind::Float)?.ok_or_else(|| {
                PredictError::Validation {
                    reason: format!("Non-numeric value in row '{}'", row_id),
                }
            })?;
            write!(writer, "{}", row_id)?;
            for value in values {
                write!(writer, "\t{}", format_value(value))?;
            }
            writeln!(writer)?;
        }
        writer.flush()?;

        Ok(())
    }
}
