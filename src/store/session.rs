//! Load/modify/save sessions over stored objects.

use super::{ObjectRef, ObjectStore, SaveRequest, ATTRIBUTE_MAPPING_TYPE, MATRIX_TYPE};
use crate::data::{AbundanceMatrix, AttributeMapping};
use crate::error::{PredictError, Result};

fn check_type(reference: &ObjectRef, actual: &str, expected: &str) -> Result<()> {
    if actual == expected {
        Ok(())
    } else {
        Err(PredictError::InvalidParameter(format!(
            "Object {} has type {}, expected {}",
            reference, actual, expected
        )))
    }
}

/// The input matrix together with where it came from.
#[derive(Debug, Clone)]
pub struct LoadedMatrix {
    reference: ObjectRef,
    matrix: AbundanceMatrix,
}

impl LoadedMatrix {
    pub fn load<S: ObjectStore + ?Sized>(store: &S, reference: &str) -> Result<Self> {
        let obj = store.get_object(reference)?;
        check_type(&obj.reference, &obj.type_name, MATRIX_TYPE)?;
        Ok(Self {
            matrix: AbundanceMatrix::from_value(obj.data)?,
            reference: obj.reference,
        })
    }

    /// Versioned reference the matrix was loaded from.
    pub fn reference(&self) -> String {
        self.reference.to_string()
    }

    pub fn workspace(&self) -> &str {
        &self.reference.workspace
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    pub fn matrix(&self) -> &AbundanceMatrix {
        &self.matrix
    }

    pub fn matrix_mut(&mut self) -> &mut AbundanceMatrix {
        &mut self.matrix
    }

    /// Save the matrix as a new version of `workspace/name`.
    pub fn save<S: ObjectStore + ?Sized>(
        &self,
        store: &S,
        workspace: &str,
        name: &str,
        provenance: Vec<String>,
    ) -> Result<String> {
        store.save_object(SaveRequest {
            workspace,
            type_name: MATRIX_TYPE,
            name,
            data: self.matrix.to_value()?,
            provenance,
        })
    }
}

/// An attribute side-table open for modification.
///
/// [`save`](LoadedAttributeMapping::save) consumes the session, so a table
/// cannot be modified after it has been persisted.
#[derive(Debug)]
pub struct LoadedAttributeMapping {
    reference: ObjectRef,
    mapping: AttributeMapping,
}

impl LoadedAttributeMapping {
    pub fn load<S: ObjectStore + ?Sized>(store: &S, reference: &str) -> Result<Self> {
        let obj = store.get_object(reference)?;
        check_type(&obj.reference, &obj.type_name, ATTRIBUTE_MAPPING_TYPE)?;
        Ok(Self {
            mapping: AttributeMapping::from_value(obj.data)?,
            reference: obj.reference,
        })
    }

    pub fn reference(&self) -> String {
        self.reference.to_string()
    }

    pub fn mapping(&self) -> &AttributeMapping {
        &self.mapping
    }

    pub fn mapping_mut(&mut self) -> &mut AttributeMapping {
        &mut self.mapping
    }

    /// Persist the table as the next version of its name.
    pub fn save<S: ObjectStore + ?Sized>(self, store: &S) -> Result<String> {
        self.mapping.check_instance_lengths()?;
        store.save_object(SaveRequest {
            workspace: &self.reference.workspace,
            type_name: ATTRIBUTE_MAPPING_TYPE,
            name: &self.reference.name,
            data: self.mapping.to_value()?,
            provenance: vec![self.reference.to_string()],
        })
    }
}
