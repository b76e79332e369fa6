//! The schema registry: one stored document holding both catalogs and the
//! accepted units of measure.

use serde::{Deserialize, Serialize};

use crate::error::ProvenanceError;
use crate::schema::asset_type::{AssetTypeCatalog, AssetTypeDef, Migration};
use crate::schema::attribute::{AttributeCatalog, AttributeRef, AttributeTypeDef, DefineOutcome};
use crate::types::AttributeDataType;

/// What `define_asset_type` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetTypeOutcome {
    Created,
    Migrated(Migration),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaRegistry {
    #[serde(rename = "attributeDefinitions", default)]
    pub attributes: AttributeCatalog,
    #[serde(rename = "assetDefinitions", default)]
    pub asset_types: AssetTypeCatalog,
    #[serde(default)]
    pub units: Vec<String>,
    /// Last generation handed to a newly created asset type
    #[serde(rename = "assetGeneration", default)]
    pub asset_generation: u32,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Attribute types
    // ========================================================================

    /// Define a new attribute type or change the type of an existing one.
    ///
    /// A type change swaps the new reference into every asset type whose
    /// current set holds the attribute. Asset-type versions are left alone.
    pub fn define_attribute(
        &mut self,
        name: &str,
        data_type: AttributeDataType,
    ) -> Result<DefineOutcome, ProvenanceError> {
        if name.trim().is_empty() {
            return Err(ProvenanceError::Invalid(
                "The attribute name must not be empty".to_string(),
            ));
        }

        let outcome = self.attributes.define_or_update(name, data_type);
        if let DefineOutcome::Updated { .. } = outcome {
            if let Some(reference) = self.attributes.get(name).map(AttributeTypeDef::reference) {
                for asset_type in self.asset_types.iter_mut() {
                    asset_type.replace_reference(&reference);
                }
            }
        }
        Ok(outcome)
    }

    pub fn attribute(&self, name: &str) -> Result<&AttributeTypeDef, ProvenanceError> {
        self.attributes
            .get(name)
            .ok_or_else(|| ProvenanceError::not_found("attribute", name))
    }

    pub fn type_at(&self, name: &str, version: i64) -> Result<AttributeDataType, ProvenanceError> {
        self.attributes.type_at(name, version)
    }

    // ========================================================================
    // Asset types
    // ========================================================================

    /// Define an asset type, or migrate an existing one to exactly the
    /// requested attribute set.
    ///
    /// Every unresolved name is reported at once, in the order given.
    pub fn define_asset_type(
        &mut self,
        name: &str,
        requested: &[String],
    ) -> Result<AssetTypeOutcome, ProvenanceError> {
        if name.trim().is_empty() {
            return Err(ProvenanceError::Invalid(
                "The asset name must not be empty".to_string(),
            ));
        }

        let mut resolved: Vec<AttributeRef> = Vec::with_capacity(requested.len());
        let mut unresolved: Vec<String> = Vec::new();
        for attribute in requested {
            match self.attributes.get(attribute) {
                Some(definition) => {
                    if !resolved.iter().any(|r| r.is_named(&definition.name)) {
                        resolved.push(definition.reference());
                    }
                }
                None => {
                    if !unresolved.iter().any(|u| u.eq_ignore_ascii_case(attribute)) {
                        unresolved.push(attribute.clone());
                    }
                }
            }
        }
        if !unresolved.is_empty() {
            return Err(ProvenanceError::UndefinedAttributes(unresolved));
        }

        match self.asset_types.get_mut(name) {
            Some(existing) => Ok(AssetTypeOutcome::Migrated(existing.migrate(&resolved))),
            None => {
                self.asset_generation += 1;
                let mut definition = AssetTypeDef::new(name, resolved);
                definition.generation = self.asset_generation;
                self.asset_types.insert(definition);
                Ok(AssetTypeOutcome::Created)
            }
        }
    }

    pub fn asset_type(&self, name: &str) -> Result<&AssetTypeDef, ProvenanceError> {
        self.asset_types
            .get(name)
            .ok_or_else(|| ProvenanceError::not_found("asset type", name))
    }

    pub fn attributes_at(
        &self,
        name: &str,
        version: i64,
    ) -> Result<Vec<AttributeRef>, ProvenanceError> {
        self.asset_types.attributes_at(name, version)
    }

    /// Attribute set at `version` paired with each attribute's data type at
    /// its recorded attribute version.
    pub fn typed_attributes_at(
        &self,
        name: &str,
        version: i64,
    ) -> Result<Vec<(AttributeRef, AttributeDataType)>, ProvenanceError> {
        self.attributes_at(name, version)?
            .into_iter()
            .map(|reference| {
                let data_type = self.type_at(&reference.name, reference.version as i64)?;
                Ok((reference, data_type))
            })
            .collect()
    }

    /// Typed attribute set of a definition pinned by `generation` and
    /// `version`. A definition recreated under the same name after removal
    /// does not match records made against the removed one.
    pub fn pinned_attributes(
        &self,
        name: &str,
        generation: u32,
        version: i64,
    ) -> Result<Vec<(AttributeRef, AttributeDataType)>, ProvenanceError> {
        let current = self.asset_type(name)?;
        if current.generation != generation {
            return Err(ProvenanceError::not_found(
                "asset type",
                format!("{} (generation {})", name, generation),
            ));
        }
        self.typed_attributes_at(name, version)
    }

    /// Existing records pinned to the removed type are untouched.
    pub fn delete_asset_type(&mut self, name: &str) -> Result<AssetTypeDef, ProvenanceError> {
        self.asset_types
            .remove(name)
            .ok_or_else(|| ProvenanceError::not_found("asset type", name))
    }

    // ========================================================================
    // Units
    // ========================================================================

    pub fn add_unit(&mut self, unit: &str) -> Result<(), ProvenanceError> {
        if unit.trim().is_empty() {
            return Err(ProvenanceError::Invalid("The unit must not be empty".to_string()));
        }
        if self.has_unit(unit) {
            return Err(ProvenanceError::already_exists("unit", unit));
        }
        self.units.push(unit.to_string());
        Ok(())
    }

    /// Units match exactly.
    pub fn has_unit(&self, unit: &str) -> bool {
        self.units.iter().any(|u| u == unit)
    }
}
