//! Schema registry operations.

use serde::Serialize;
use tracing::{debug, info};

use super::ProvenanceContract;
use crate::error::ProvenanceError;
use crate::ledger::Ledger;
use crate::schema::{AssetTypeDef, AssetTypeOutcome, DefineOutcome, SchemaRegistry};
use crate::types::AttributeDataType;

/// An attribute of an asset type with the data type of its recorded version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedAttribute {
    pub name: String,
    pub version: u32,
    #[serde(rename = "dataType")]
    pub data_type: AttributeDataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypedAttributeList {
    pub attributes: Vec<TypedAttribute>,
}

impl ProvenanceContract {
    pub fn add_unit(
        &self,
        ledger: &mut dyn Ledger,
        unit: &str,
    ) -> Result<SchemaRegistry, ProvenanceError> {
        let registry = self.run(ledger, |tx| {
            let mut registry = self.load_registry_or_default(tx)?;
            registry.add_unit(unit)?;
            self.store_registry(tx, &registry)?;
            Ok(registry)
        })?;
        info!(unit = %unit, "unit added");
        Ok(registry)
    }

    /// Define an attribute type, or change its data type. `data_type` accepts
    /// the canonical names and their legacy aliases.
    pub fn put_attribute_definition(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
        data_type: &str,
    ) -> Result<SchemaRegistry, ProvenanceError> {
        let data_type: AttributeDataType = data_type.parse()?;
        let (registry, outcome) = self.run(ledger, |tx| {
            let mut registry = self.load_registry_or_default(tx)?;
            let outcome = registry.define_attribute(name, data_type)?;
            if outcome != DefineOutcome::Unchanged {
                self.store_registry(tx, &registry)?;
            }
            Ok((registry, outcome))
        })?;

        match outcome {
            DefineOutcome::Created => {
                info!(attribute = %name, data_type = %data_type, "attribute defined")
            }
            DefineOutcome::Updated { previous, version } => info!(
                attribute = %name,
                from = %previous,
                to = %data_type,
                version,
                "attribute type changed"
            ),
            DefineOutcome::Unchanged => {
                debug!(attribute = %name, "attribute already defined with this type")
            }
        }
        Ok(registry)
    }

    pub fn put_asset_definition(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
        attributes: &[String],
    ) -> Result<SchemaRegistry, ProvenanceError> {
        let (registry, outcome) = self.run(ledger, |tx| {
            let mut registry = self.load_registry_or_default(tx)?;
            let outcome = registry.define_asset_type(name, attributes)?;
            let changed = match &outcome {
                AssetTypeOutcome::Created => true,
                AssetTypeOutcome::Migrated(migration) => !migration.is_empty(),
            };
            if changed {
                self.store_registry(tx, &registry)?;
            }
            Ok((registry, outcome))
        })?;

        match outcome {
            AssetTypeOutcome::Created => info!(asset_type = %name, "asset type defined"),
            AssetTypeOutcome::Migrated(migration) => info!(
                asset_type = %name,
                added = migration.added.len(),
                removed = migration.removed.len(),
                "asset type migrated"
            ),
        }
        Ok(registry)
    }

    pub fn remove_asset_definition(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
    ) -> Result<SchemaRegistry, ProvenanceError> {
        let registry = self.run(ledger, |tx| {
            let mut registry = self.load_registry(tx)?;
            registry.delete_asset_type(name)?;
            self.store_registry(tx, &registry)?;
            Ok(registry)
        })?;
        info!(asset_type = %name, "asset type removed");
        Ok(registry)
    }

    pub fn get_definition(
        &self,
        ledger: &mut dyn Ledger,
    ) -> Result<SchemaRegistry, ProvenanceError> {
        self.run(ledger, |tx| self.load_registry(tx))
    }

    pub fn get_asset_definition(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
    ) -> Result<AssetTypeDef, ProvenanceError> {
        self.run(ledger, |tx| {
            let registry = self.load_registry(tx)?;
            registry.asset_type(name).cloned()
        })
    }

    /// The attributes an asset type had at `version`, each with the data type
    /// of the attribute version it referenced.
    pub fn get_attribute_definitions_of_asset(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
        version: i64,
    ) -> Result<TypedAttributeList, ProvenanceError> {
        self.run(ledger, |tx| {
            let registry = self.load_registry(tx)?;
            let attributes = registry
                .typed_attributes_at(name, version)?
                .into_iter()
                .map(|(reference, data_type)| TypedAttribute {
                    name: reference.name,
                    version: reference.version,
                    data_type,
                })
                .collect();
            debug!(asset_type = %name, version, "reconstructed asset type");
            Ok(TypedAttributeList { attributes })
        })
    }

    pub fn get_data_type_of_attribute_definition(
        &self,
        ledger: &mut dyn Ledger,
        name: &str,
        version: i64,
    ) -> Result<AttributeDataType, ProvenanceError> {
        self.run(ledger, |tx| self.load_registry(tx)?.type_at(name, version))
    }
}
