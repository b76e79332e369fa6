//! Attribute type catalog.
//!
//! Each attribute type keeps its current data type plus the type that was in
//! force for every earlier version: `type_history[v - 1]` is the type of
//! version `v`, so `type_history.len() == version - 1` always holds.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::ProvenanceError;
use crate::types::AttributeDataType;

/// Reference to one attribute type at one version.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AttributeRef {
    pub name: String,
    pub version: u32,
}

impl AttributeRef {
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }

    pub fn is_named(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }
}

/// A named attribute type with its version history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AttributeTypeDef {
    pub name: String,
    #[serde(rename = "dataType")]
    pub current_type: AttributeDataType,
    pub version: u32,
    #[serde(rename = "dataTypeHistory", default)]
    pub type_history: Vec<AttributeDataType>,
}

impl AttributeTypeDef {
    pub fn new(name: impl Into<String>, data_type: AttributeDataType) -> Self {
        Self {
            name: name.into(),
            current_type: data_type,
            version: 1,
            type_history: Vec::new(),
        }
    }

    /// Change the current type. Returns false when the type is unchanged.
    pub fn set_type(&mut self, data_type: AttributeDataType) -> bool {
        if self.current_type == data_type {
            return false;
        }
        self.type_history.push(self.current_type);
        self.current_type = data_type;
        self.version += 1;
        true
    }

    /// Type recorded for `version`, or `None` outside `[1, version]`.
    pub fn type_at(&self, version: i64) -> Option<AttributeDataType> {
        if version == self.version as i64 {
            Some(self.current_type)
        } else if version < 1 || version > self.version as i64 {
            None
        } else {
            self.type_history.get((version - 1) as usize).copied()
        }
    }

    pub fn reference(&self) -> AttributeRef {
        AttributeRef::new(self.name.clone(), self.version)
    }
}

/// What `define_or_update` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefineOutcome {
    Created,
    Updated {
        previous: AttributeDataType,
        version: u32,
    },
    Unchanged,
}

/// All attribute types, in definition order, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeCatalog {
    definitions: Vec<AttributeTypeDef>,
}

impl AttributeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AttributeTypeDef> {
        self.definitions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AttributeTypeDef> {
        self.definitions.iter()
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Insert at version 1, or change the type of an existing definition.
    ///
    /// Re-defining with the same type is a no-op.
    pub fn define_or_update(&mut self, name: &str, data_type: AttributeDataType) -> DefineOutcome {
        match self
            .definitions
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name))
        {
            Some(existing) => {
                let previous = existing.current_type;
                if existing.set_type(data_type) {
                    DefineOutcome::Updated {
                        previous,
                        version: existing.version,
                    }
                } else {
                    DefineOutcome::Unchanged
                }
            }
            None => {
                self.definitions.push(AttributeTypeDef::new(name, data_type));
                DefineOutcome::Created
            }
        }
    }

    pub fn type_at(&self, name: &str, version: i64) -> Result<AttributeDataType, ProvenanceError> {
        let definition = self
            .get(name)
            .ok_or_else(|| ProvenanceError::not_found("attribute", name))?;
        definition
            .type_at(version)
            .ok_or_else(|| ProvenanceError::VersionOutOfRange {
                name: definition.name.clone(),
                requested: version,
                current: definition.version,
            })
    }
}
