//! Contract entry points.
//!
//! Every public method runs as one unit of work: it opens a [`Transaction`]
//! over the ledger, reads what it needs, validates everything, stages its
//! writes and commits. A failed precondition returns before commit, so the
//! ledger is never left half-updated.

mod acceptance;
mod assets;
mod schema;

pub use assets::{
    CreateAsset, EVENT_ALARM_ACTIVATED, EVENT_ALARM_DEACTIVATED, EVENT_OWNERSHIP_TRANSFERRED,
};
pub use schema::{TypedAttribute, TypedAttributeList};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::asset::AssetRecord;
use crate::error::ProvenanceError;
use crate::ledger::{Ledger, LedgerError};
use crate::private::PrivateAttributePartition;
use crate::schema::SchemaRegistry;
use crate::transaction::Transaction;
use crate::types::{upsert_attribute, Attribute};

/// Storage layout of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractConfig {
    /// Public key of the schema registry document
    #[serde(default = "default_registry_key")]
    pub registry_key: String,

    /// Appended to a record key to address its private partition
    #[serde(default = "default_private_suffix")]
    pub private_suffix: String,

    /// Appended to an organisation identity to address its rule set
    #[serde(default = "default_rules_suffix")]
    pub rules_suffix: String,

    /// Collection holding acceptance rule sets, when the caller names none
    #[serde(default)]
    pub acceptance_collection: Option<String>,
}

fn default_registry_key() -> String {
    "METADEF".to_string()
}

fn default_private_suffix() -> String {
    "_P".to_string()
}

fn default_rules_suffix() -> String {
    "_ACR".to_string()
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            registry_key: default_registry_key(),
            private_suffix: default_private_suffix(),
            rules_suffix: default_rules_suffix(),
            acceptance_collection: None,
        }
    }
}

/// A record together with the private attributes the caller can read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetView {
    #[serde(flatten)]
    pub record: AssetRecord,
    #[serde(rename = "privateData")]
    pub private_data: Vec<Attribute>,
}

#[derive(Debug, Clone, Default)]
pub struct ProvenanceContract {
    config: ContractConfig,
}

impl ProvenanceContract {
    pub fn new(config: ContractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ContractConfig {
        &self.config
    }

    /// Run `op` in a fresh transaction and commit only if it succeeds.
    fn run<T>(
        &self,
        ledger: &mut dyn Ledger,
        op: impl FnOnce(&mut Transaction<'_>) -> Result<T, ProvenanceError>,
    ) -> Result<T, ProvenanceError> {
        let mut tx = Transaction::begin(ledger);
        let value = op(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn private_key(&self, key: &str) -> String {
        format!("{}{}", key, self.config.private_suffix)
    }

    fn rules_key(&self, organisation: &str) -> String {
        format!("{}{}", organisation, self.config.rules_suffix)
    }

    fn load_registry(&self, tx: &mut Transaction<'_>) -> Result<SchemaRegistry, ProvenanceError> {
        tx.read_json(&self.config.registry_key)?
            .ok_or_else(|| ProvenanceError::not_found("schema registry", &self.config.registry_key))
    }

    /// The registry is created lazily by the first schema write.
    fn load_registry_or_default(
        &self,
        tx: &mut Transaction<'_>,
    ) -> Result<SchemaRegistry, ProvenanceError> {
        Ok(tx.read_json(&self.config.registry_key)?.unwrap_or_default())
    }

    fn store_registry(
        &self,
        tx: &mut Transaction<'_>,
        registry: &SchemaRegistry,
    ) -> Result<(), ProvenanceError> {
        tx.write_json(&self.config.registry_key, registry)
    }

    fn load_asset(
        &self,
        tx: &mut Transaction<'_>,
        key: &str,
    ) -> Result<AssetRecord, ProvenanceError> {
        tx.read_json(key)?
            .ok_or_else(|| ProvenanceError::not_found("object", key))
    }

    fn store_asset(
        &self,
        tx: &mut Transaction<'_>,
        record: &AssetRecord,
    ) -> Result<(), ProvenanceError> {
        tx.write_json(&record.key, record)
    }

    /// Private attributes of `record` from every referenced collection the
    /// caller may read. Collections the caller cannot read are skipped.
    fn readable_private_attributes(
        &self,
        tx: &mut Transaction<'_>,
        record: &AssetRecord,
    ) -> Result<Vec<Attribute>, ProvenanceError> {
        let private_key = self.private_key(&record.key);
        let mut attributes = Vec::new();
        for collection in &record.private_collections {
            match tx.read_private_json::<PrivateAttributePartition>(collection, &private_key) {
                Ok(Some(partition)) => attributes.extend(partition.attributes),
                Ok(None) => warn!(
                    key = %record.key,
                    collection = %collection,
                    "referenced private partition is missing"
                ),
                Err(ProvenanceError::Ledger(LedgerError::AccessDenied { .. })) => warn!(
                    key = %record.key,
                    collection = %collection,
                    "skipping unreadable private collection"
                ),
                Err(e) => return Err(e),
            }
        }
        Ok(attributes)
    }

    /// Public attributes overlaid with readable private ones.
    fn merged_attributes(
        &self,
        tx: &mut Transaction<'_>,
        record: &AssetRecord,
    ) -> Result<Vec<Attribute>, ProvenanceError> {
        let mut merged = record.attributes.clone();
        for attribute in self.readable_private_attributes(tx, record)? {
            upsert_attribute(&mut merged, attribute);
        }
        Ok(merged)
    }
}
