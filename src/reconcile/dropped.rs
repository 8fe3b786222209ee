//! Account for entities the predictor dropped.
//!
//! The predictor drops an amplicon for one of two reasons: it could not be
//! placed at all (so it is missing from the quality table), or it was placed
//! too far from any reference genome (its NSTI exceeds the threshold). After
//! padding, the set of dropped ids must be explained by those two reasons.

use crate::data::io::open_reader;
use crate::error::{PredictError, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

/// Default maximum NSTI for an amplicon to be kept.
pub const DEFAULT_NSTI_MAX: f64 = 2.0;

/// Per-entity quality metric reported by the predictor.
#[derive(Debug, Clone, Default)]
pub struct QualityTable {
    metrics: HashMap<String, f64>,
}

impl QualityTable {
    /// Read `column` from a TSV (or gzip TSV) whose first column holds entity ids.
    pub fn from_tsv<P: AsRef<Path>>(path: P, column: &str) -> Result<Self> {
        let path = path.as_ref();
        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .from_reader(open_reader(path)?);

        let col_idx = rdr
            .headers()?
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| PredictError::Reconciliation {
                table: path.display().to_string(),
                reason: format!("No column '{}'", column),
            })?;

        let mut metrics = HashMap::new();
        for record in rdr.records() {
            let record = record?;
            let field = record.get(col_idx).unwrap_or("").trim();
            let value = if field.is_empty() {
                f64::NAN
            } else {
                field.parse::<f64>().map_err(|_| {
                    PredictError::InvalidParameter(format!(
                        "Invalid {} value '{}' for '{}'",
                        column, field, &record[0]
                    ))
                })?
            };
            metrics.insert(record[0].to_string(), value);
        }

        Ok(Self { metrics })
    }

    /// Metric for `id`, if the entity was placed.
    pub fn get(&self, id: &str) -> Option<f64> {
        self.metrics.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}

impl FromIterator<(String, f64)> for QualityTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            metrics: iter.into_iter().collect(),
        }
    }
}

/// Why entities were dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DropReason {
    precondition: BTreeSet<String>,
    quality_threshold: BTreeSet<String>,
}

impl DropReason {
    /// Build a partition; the two sets must not overlap.
    pub fn new(precondition: BTreeSet<String>, quality_threshold: BTreeSet<String>) -> Result<Self> {
        let overlap: Vec<&String> = precondition.intersection(&quality_threshold).collect();
        if !overlap.is_empty() {
            return Err(PredictError::Reconciliation {
                table: "drop reasons".to_string(),
                reason: format!(
                    "{} id(s) dropped for both reasons, e.g. {:?}",
                    overlap.len(),
                    sample(overlap.iter().map(|s| s.as_str()))
                ),
            });
        }
        Ok(Self {
            precondition,
            quality_threshold,
        })
    }

    /// Ids never placed by the predictor.
    pub fn precondition(&self) -> &BTreeSet<String> {
        &self.precondition
    }

    /// Ids placed but beyond the quality threshold.
    pub fn quality_threshold(&self) -> &BTreeSet<String> {
        &self.quality_threshold
    }

    /// Union of both reasons.
    pub fn all(&self) -> BTreeSet<String> {
        self.precondition
            .union(&self.quality_threshold)
            .cloned()
            .collect()
    }
}

/// Partition the entities of `full_ids` that the predictor is expected to drop.
///
/// An id absent from `quality` failed a precondition; an id whose metric
/// exceeds `nsti_max` failed the quality threshold. A missing metric never
/// exceeds the threshold.
pub fn classify_dropped(
    full_ids: &[String],
    quality: &QualityTable,
    nsti_max: f64,
) -> Result<DropReason> {
    let mut precondition = BTreeSet::new();
    let mut quality_threshold = BTreeSet::new();

    for id in full_ids {
        match quality.get(id) {
            None => {
                precondition.insert(id.clone());
            }
            Some(nsti) if nsti > nsti_max => {
                quality_threshold.insert(id.clone());
            }
            Some(_) => {}
        }
    }

    DropReason::new(precondition, quality_threshold)
}

/// Check that the ids missing from a table are explained by `reason`.
///
/// The missing ids must equal either the precondition drops alone, or the
/// precondition and quality drops together.
pub fn verify_dropped(
    table: &str,
    full_ids: &[String],
    present_ids: &[String],
    reason: &DropReason,
) -> Result<()> {
    let present: HashSet<&str> = present_ids.iter().map(String::as_str).collect();
    let dropped: BTreeSet<String> = full_ids
        .iter()
        .filter(|id| !present.contains(id.as_str()))
        .cloned()
        .collect();

    if dropped == reason.precondition || dropped == reason.all() {
        return Ok(());
    }

    let expected = reason.all();
    let unexplained: Vec<&str> = dropped
        .difference(&expected)
        .map(String::as_str)
        .collect();
    let kept: Vec<&str> = reason
        .precondition
        .difference(&dropped)
        .map(String::as_str)
        .collect();

    Err(PredictError::Reconciliation {
        table: table.to_string(),
        reason: format!(
            "{} dropped, {} failed placement, {} exceeded NSTI; \
             unexplained drops {:?}, unplaced but present {:?}",
            dropped.len(),
            reason.precondition.len(),
            reason.quality_threshold.len(),
            sample(unexplained.into_iter()),
            sample(kept.into_iter()),
        ),
    })
}

fn sample<'a, I: Iterator<Item = &'a str>>(ids: I) -> Vec<&'a str> {
    ids.take(5).collect()
}
