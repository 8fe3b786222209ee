//! Attribute side-table keyed by entity id.
//!
//! An [`AttributeMapping`] holds an ordered list of named, sourced attribute
//! slots and, for every entity, one value per slot. Slots are only ever
//! appended. Every append is mirrored into each instance in the same call,
//! so `instances[id].len() == attributes.len()` holds after every operation.

use crate::error::{PredictError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// A named, sourced column of the side-table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeSlot {
    pub attribute: String,
    pub source: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AttributeSlot {
    pub fn new(attribute: &str, source: &str) -> Self {
        Self {
            attribute: attribute.to_string(),
            source: source.to_string(),
            extra: Map::new(),
        }
    }
}

/// How [`AttributeMapping::allocate_or_get_slot`] resolved a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotOutcome {
    /// A slot with the same name and source already existed.
    Existing,
    /// A new slot was appended under the requested name.
    Created,
    /// A new slot was appended under a numbered name, since the requested
    /// name was taken by a slot from another source.
    Renamed { requested: String },
}

/// Result of a slot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAllocation {
    /// Position in `attributes` and in every instance
    pub index: usize,
    /// Name stored for the slot
    pub name: String,
    pub outcome: SlotOutcome,
}

/// Summary of a bulk value update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Number of instance values overwritten
    pub updated: usize,
    /// Caller ids that had no target in the remap
    pub unmapped: Vec<String>,
    /// Ids (after remapping) absent from the side-table
    pub unknown: Vec<String>,
}

/// Side-table of attribute slots over a set of entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeMapping {
    attributes: Vec<AttributeSlot>,
    instances: BTreeMap<String, Vec<Value>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AttributeMapping {
    /// Create a side-table, checking every instance has one value per slot.
    pub fn new(
        attributes: Vec<AttributeSlot>,
        instances: BTreeMap<String, Vec<Value>>,
    ) -> Result<Self> {
        let mapping = Self {
            attributes,
            instances,
            extra: Map::new(),
        };
        mapping.check_instance_lengths()?;
        Ok(mapping)
    }

    /// Deserialize a stored object, checking the instance-length invariant.
    pub fn from_value(value: Value) -> Result<Self> {
        let mapping: Self = serde_json::from_value(value)?;
        mapping.check_instance_lengths()?;
        Ok(mapping)
    }

    /// Serialize back to the stored representation.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }

    #[inline]
    pub fn attributes(&self) -> &[AttributeSlot] {
        &self.attributes
    }

    #[inline]
    pub fn instances(&self) -> &BTreeMap<String, Vec<Value>> {
        &self.instances
    }

    /// Value of slot `index` for entity `id`.
    pub fn value(&self, id: &str, index: usize) -> Option<&Value> {
        self.instances.get(id).and_then(|values| values.get(index))
    }

    /// Index of the slot matching both `attribute` and `source`.
    pub fn find_slot(&self, attribute: &str, source: &str) -> Option<usize> {
        self.attributes
            .iter()
            .position(|slot| slot.attribute == attribute && slot.source == source)
    }

    /// Get the slot for `(attribute, source)`, appending one if absent.
    ///
    /// Repeating a request returns the same index without growing the table.
    /// A new slot never reuses a same-named slot from another source: it gets
    /// the lowest free ` (k)` suffix instead. The new slot starts as `null`
    /// for every instance.
    pub fn allocate_or_get_slot(&mut self, attribute: &str, source: &str) -> Result<SlotAllocation> {
        if let Some(index) = self.find_slot(attribute, source) {
            return Ok(SlotAllocation {
                index,
                name: self.attributes[index].attribute.clone(),
                outcome: SlotOutcome::Existing,
            });
        }

        let name = numbered_duplicate(self.attributes.iter().map(|s| s.attribute.as_str()), attribute)?;
        let outcome = if name == attribute {
            SlotOutcome::Created
        } else {
            SlotOutcome::Renamed {
                requested: attribute.to_string(),
            }
        };

        self.attributes.push(AttributeSlot::new(&name, source));
        for values in self.instances.values_mut() {
            values.push(Value::Null);
        }
        self.check_instance_lengths()?;

        Ok(SlotAllocation {
            index: self.attributes.len() - 1,
            name,
            outcome,
        })
    }

    /// Overwrite slot `index` for every entity in `id_to_value`.
    ///
    /// With `id_remap`, keys are first translated from the caller's id space
    /// into the side-table's. Keys without a remap target, and translated ids
    /// the side-table does not know, are skipped and listed in the report.
    /// Entities not mentioned keep their current value.
    pub fn apply_values(
        &mut self,
        index: usize,
        id_to_value: &BTreeMap<String, String>,
        id_remap: Option<&BTreeMap<String, String>>,
    ) -> Result<ApplyReport> {
        if index >= self.attributes.len() {
            return Err(PredictError::InvalidParameter(format!(
                "Attribute slot {} out of bounds ({} slots)",
                index,
                self.attributes.len()
            )));
        }

        let mut report = ApplyReport::default();
        for (id, value) in id_to_value {
            let target = match id_remap {
                Some(remap) => match remap.get(id) {
                    Some(target) => target,
                    None => {
                        report.unmapped.push(id.clone());
                        continue;
                    }
                },
                None => id,
            };

            match self.instances.get_mut(target) {
                Some(values) => {
                    values[index] = Value::String(value.clone());
                    report.updated += 1;
                }
                None => report.unknown.push(target.clone()),
            }
        }

        Ok(report)
    }

    /// Check every instance holds exactly one value per slot.
    pub fn check_instance_lengths(&self) -> Result<()> {
        let n = self.attributes.len();
        match self.instances.iter().find(|(_, values)| values.len() != n) {
            Some((id, values)) => Err(PredictError::InvariantViolation(format!(
                "Instance '{}' has {} values but there are {} attributes",
                id,
                values.len(),
                n
            ))),
            None => Ok(()),
        }
    }
}

/// Pick a name for `query` that does not collide with `names`.
///
/// Returns `query` itself if unused. Otherwise returns `query (k)` with the
/// lowest `k >= 1` not already taken by a name of exactly that form; names
/// that merely contain `query` are ignored.
pub fn numbered_duplicate<'a, I>(names: I, query: &str) -> Result<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    if !names.contains(&query) {
        return Ok(query.to_string());
    }

    let pattern = Regex::new(&format!(r"^{}(?: \(([1-9]\d*)\))?$", regex::escape(query)))?;
    let taken: BTreeSet<u64> = names
        .iter()
        .filter_map(|name| pattern.captures(name))
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect();

    let k = (1..).find(|k| !taken.contains(k)).unwrap_or(1);
    Ok(format!("{} ({})", query, k))
}
