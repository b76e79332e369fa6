//! Asset record operations: creation, custody, lineage, attributes, alarms.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error, info, warn};

use super::{AssetView, ProvenanceContract};
use crate::asset::{link_quantities, AssetRecord};
use crate::error::{InvalidValue, ProvenanceError};
use crate::ledger::Ledger;
use crate::private::PrivateAttributePartition;
use crate::rules::AcceptanceRuleSet;
use crate::schema::AttributeRef;
use crate::transaction::Transaction;
use crate::types::{Attribute, AttributeDataType};

pub const EVENT_ALARM_ACTIVATED: &str = "alarm_activated";
pub const EVENT_ALARM_DEACTIVATED: &str = "alarm_deactivated";
pub const EVENT_OWNERSHIP_TRANSFERRED: &str = "ownership_transferred";

/// Input of [`ProvenanceContract::create_asset`].
#[derive(Debug, Clone, Default)]
pub struct CreateAsset {
    pub key: String,
    /// Where private attributes go. Required when any are supplied.
    pub private_collection: Option<String>,
    pub asset_type: String,
    /// Raw quantity, parsed as a real number
    pub quantity: String,
    pub unit: String,
    pub public_attributes: Vec<(String, String)>,
    pub private_attributes: Vec<(String, String)>,
}

impl CreateAsset {
    pub fn new(
        key: impl Into<String>,
        asset_type: impl Into<String>,
        quantity: impl Into<String>,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            asset_type: asset_type.into(),
            quantity: quantity.into(),
            unit: unit.into(),
            ..Default::default()
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.public_attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_private_attribute(
        mut self,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.private_attributes.push((name.into(), value.into()));
        self
    }

    pub fn in_collection(mut self, collection: impl Into<String>) -> Self {
        self.private_collection = Some(collection.into());
        self
    }
}

/// Attribute set an operation validates against, with declared types.
struct AllowedAttributes(Vec<(AttributeRef, AttributeDataType)>);

impl AllowedAttributes {
    fn lookup(&self, name: &str) -> Option<&(AttributeRef, AttributeDataType)> {
        self.0.iter().find(|(reference, _)| reference.is_named(name))
    }

    /// Resolve and parse `values`. Reports every unknown name, then every
    /// repeated name, then every unparsable value.
    fn parse_all<'a, I>(&self, values: I) -> Result<Vec<Attribute>, ProvenanceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut undefined: Vec<String> = Vec::new();
        let mut duplicates: Vec<String> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();
        let mut resolved = Vec::new();

        for (name, raw) in values {
            match self.lookup(name) {
                None => undefined.push(name.to_string()),
                Some(entry) => {
                    if !seen.insert(entry.0.name.to_lowercase()) {
                        if !duplicates.iter().any(|d| d.eq_ignore_ascii_case(name)) {
                            duplicates.push(entry.0.name.clone());
                        }
                        continue;
                    }
                    resolved.push((entry, raw));
                }
            }
        }
        if !undefined.is_empty() {
            return Err(ProvenanceError::UndefinedAttributes(undefined));
        }
        if !duplicates.is_empty() {
            return Err(ProvenanceError::DuplicateAttributes(duplicates));
        }

        let mut invalid: Vec<InvalidValue> = Vec::new();
        let mut attributes = Vec::with_capacity(resolved.len());
        for ((reference, data_type), raw) in resolved {
            match data_type.parse_value(&reference.name, raw) {
                Ok(value) => {
                    attributes.push(Attribute::new(&reference.name, reference.version, value))
                }
                Err(e) => invalid.push(e),
            }
        }
        if !invalid.is_empty() {
            return Err(ProvenanceError::InvalidValues(invalid));
        }
        Ok(attributes)
    }
}

impl ProvenanceContract {
    /// Attribute set of the asset-type version `record` is pinned to.
    fn allowed_for(
        &self,
        tx: &mut Transaction<'_>,
        record: &AssetRecord,
    ) -> Result<AllowedAttributes, ProvenanceError> {
        let registry = self.load_registry(tx)?;
        let typed = registry.pinned_attributes(
            &record.asset_type,
            record.asset_type_generation,
            record.asset_type_version as i64,
        )?;
        Ok(AllowedAttributes(typed))
    }

    pub fn create_asset(
        &self,
        ledger: &mut dyn Ledger,
        request: CreateAsset,
    ) -> Result<AssetRecord, ProvenanceError> {
        let record = self.run(ledger, |tx| {
            if tx.exists(&request.key)? {
                return Err(ProvenanceError::already_exists("object", &request.key));
            }

            let registry = self.load_registry(tx)?;
            let asset_type = registry.asset_type(&request.asset_type)?;
            if !registry.has_unit(&request.unit) {
                return Err(ProvenanceError::not_found("unit", &request.unit));
            }
            let quantity: f64 = request.quantity.trim().parse().map_err(|_| {
                ProvenanceError::Invalid(format!("The amount {} is not a number", request.quantity))
            })?;
            if !quantity.is_finite() || quantity < 0.0 {
                return Err(ProvenanceError::Invalid(format!(
                    "The amount {} must be a non-negative number",
                    request.quantity
                )));
            }

            let collection = request
                .private_collection
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty());
            if !request.private_attributes.is_empty() && collection.is_none() {
                return Err(ProvenanceError::Invalid(
                    "Please select a private data collection to store the private data".to_string(),
                ));
            }

            let allowed = AllowedAttributes(
                registry.typed_attributes_at(&asset_type.name, asset_type.version as i64)?,
            );
            let supplied = request
                .public_attributes
                .iter()
                .map(|(name, raw)| (name.as_str(), raw.as_str()))
                .chain(
                    request
                        .private_attributes
                        .iter()
                        .map(|(name, raw)| (name.as_str(), raw.as_str())),
                );
            let mut parsed = allowed.parse_all(supplied)?;

            let missing: Vec<String> = allowed
                .0
                .iter()
                .filter(|(reference, _)| !parsed.iter().any(|a| reference.is_named(&a.name)))
                .map(|(reference, _)| reference.name.clone())
                .collect();
            if !missing.is_empty() {
                return Err(ProvenanceError::MissingAttributes(missing));
            }

            let private_attributes = parsed.split_off(request.public_attributes.len());
            let mut record = AssetRecord::new(
                &request.key,
                &asset_type.name,
                asset_type.version,
                quantity,
                &request.unit,
                tx.caller(),
                tx.now(),
            );
            record.asset_type_generation = asset_type.generation;
            record.attributes = parsed;

            if let (Some(collection), false) = (collection, private_attributes.is_empty()) {
                let partition = PrivateAttributePartition {
                    attributes: private_attributes,
                };
                tx.write_private_json(collection, &self.private_key(&record.key), &partition)?;
                record.add_private_collection(collection);
            }
            self.store_asset(tx, &record)?;
            Ok(record)
        })?;

        info!(
            key = %record.key,
            asset_type = %record.asset_type,
            owner = %record.actual_owner,
            "asset created"
        );
        Ok(record)
    }

    /// Remove a record and every private partition it references.
    pub fn delete_asset(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
    ) -> Result<String, ProvenanceError> {
        let record = self.run(ledger, |tx| {
            let record = self.load_asset(tx, key)?;
            let private_key = self.private_key(key);
            for collection in &record.private_collections {
                tx.delete_private(collection, &private_key);
            }
            tx.delete(key);
            Ok(record)
        })?;
        info!(key = %key, collections = record.private_collections.len(), "asset deleted");
        Ok(format!("The object with the key {} was deleted", key))
    }

    pub fn get_asset(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
    ) -> Result<AssetView, ProvenanceError> {
        self.run(ledger, |tx| {
            let record = self.load_asset(tx, key)?;
            let private_data = self.readable_private_attributes(tx, &record)?;
            debug!(key = %key, private = private_data.len(), "asset read");
            Ok(AssetView { record, private_data })
        })
    }

    /// Every stored revision, oldest first.
    pub fn get_asset_history(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
    ) -> Result<Vec<AssetRecord>, ProvenanceError> {
        self.run(ledger, |tx| {
            if !tx.exists(key)? {
                return Err(ProvenanceError::not_found("object", key));
            }
            tx.history(key)?
                .iter()
                .filter(|revision| !revision.is_empty())
                .map(|revision| {
                    serde_json::from_slice(revision).map_err(|source| {
                        error!(key = %key, error = %source, "stored revision does not decode");
                        ProvenanceError::Corrupted {
                            key: key.to_string(),
                            source,
                        }
                    })
                })
                .collect()
        })
    }

    pub fn contains_asset(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
    ) -> Result<bool, ProvenanceError> {
        self.run(ledger, |tx| tx.exists(key))
    }

    /// Whether private attributes of `key` exist in `collection`. Works for
    /// callers outside the collection.
    pub fn has_private_attributes(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        collection: &str,
    ) -> Result<bool, ProvenanceError> {
        self.run(ledger, |tx| {
            if !tx.exists(key)? {
                return Err(ProvenanceError::not_found("object", key));
            }
            Ok(tx.private_hash(collection, &self.private_key(key))?.is_some())
        })
    }

    pub fn delete_private_attributes(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        collection: &str,
    ) -> Result<String, ProvenanceError> {
        self.run(ledger, |tx| {
            let mut record = self.load_asset(tx, key)?;
            let private_key = self.private_key(key);
            if tx.private_hash(collection, &private_key)?.is_none() {
                return Err(ProvenanceError::not_found(
                    "private data of",
                    format!("{} in {}", key, collection),
                ));
            }
            tx.delete_private(collection, &private_key);
            if record.remove_private_collection(collection) {
                self.store_asset(tx, &record)?;
            }
            Ok(())
        })?;
        info!(key = %key, collection = %collection, "private attributes deleted");
        Ok(format!(
            "The private attributes of {} were deleted from the private data collection {}",
            key, collection
        ))
    }

    /// Offer custody to `receiver`.
    ///
    /// When the receiver keeps a rule set in the acceptance collection, the
    /// record's merged attributes must satisfy every condition for its asset
    /// type. A rule set with `autoAccept` takes custody immediately.
    pub fn set_receiver(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        receiver: &str,
        acceptance_collection: Option<&str>,
    ) -> Result<AssetRecord, ProvenanceError> {
        let acceptance_collection = acceptance_collection
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .or_else(|| self.config.acceptance_collection.clone());

        let (record, transferred) = self.run(ledger, |tx| {
            let caller = tx.caller();
            let mut record = self.load_asset(tx, key)?;
            record.ensure_owner(&caller)?;

            let mut auto_accept = false;
            if let (Some(collection), false) =
                (acceptance_collection.as_deref(), receiver.is_empty())
            {
                let rules: Option<AcceptanceRuleSet> =
                    tx.read_private_json(collection, &self.rules_key(receiver))?;
                // Rule sets without conditions for this asset type neither gate
                // nor auto-accept it.
                if let Some(rules) =
                    rules.filter(|r| r.conditions_for(&record.asset_type).is_some())
                {
                    let merged = self.merged_attributes(tx, &record)?;
                    rules.evaluate(&record.asset_type, &merged)?;
                    debug!(key = %key, receiver = %receiver, "acceptance rules satisfied");
                    auto_accept = rules.auto_accept;
                }
            }

            if auto_accept {
                record.transfer_to(receiver, tx.now());
                tx.emit(EVENT_OWNERSHIP_TRANSFERRED, &record);
            } else {
                record.set_receiver(&caller, receiver)?;
            }
            self.store_asset(tx, &record)?;
            Ok((record, auto_accept))
        })?;

        if transferred {
            info!(key = %key, owner = %receiver, "ownership transferred by auto-accept");
        } else {
            info!(key = %key, receiver = %receiver, "receiver set");
        }
        Ok(record)
    }

    pub fn confirm_ownership(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
    ) -> Result<AssetRecord, ProvenanceError> {
        let record = self.run(ledger, |tx| {
            let caller = tx.caller();
            let mut record = self.load_asset(tx, key)?;
            record.confirm_ownership(&caller, tx.now())?;
            self.store_asset(tx, &record)?;
            tx.emit(EVENT_OWNERSHIP_TRANSFERRED, &record);
            Ok(record)
        })?;
        info!(key = %key, owner = %record.actual_owner, "ownership confirmed");
        Ok(record)
    }

    /// Record `predecessor` as a source of `successor`, moving `delta` units
    /// of quantity across. Returns the successor.
    pub fn link_predecessor(
        &self,
        ledger: &mut dyn Ledger,
        predecessor: &str,
        successor: &str,
        delta: f64,
    ) -> Result<AssetRecord, ProvenanceError> {
        let record = self.run(ledger, |tx| {
            let caller = tx.caller();
            let mut succ = self.load_asset(tx, successor)?;
            let mut pred = self.load_asset(tx, predecessor)?;
            succ.ensure_owner(&caller)?;
            pred.ensure_owner(&caller)?;

            link_quantities(&mut pred, &mut succ, delta)?;
            self.store_asset(tx, &pred)?;
            self.store_asset(tx, &succ)?;
            Ok(succ)
        })?;
        info!(predecessor = %predecessor, successor = %successor, delta, "lineage linked");
        Ok(record)
    }

    /// Set several public attributes, validated against the record's pinned
    /// asset-type version.
    pub fn update_attributes(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        names: &[String],
        values: &[String],
    ) -> Result<AssetRecord, ProvenanceError> {
        if names.len() != values.len() {
            return Err(ProvenanceError::Invalid(format!(
                "{} attribute names but {} values",
                names.len(),
                values.len()
            )));
        }

        let record = self.run(ledger, |tx| {
            let mut record = self.load_asset(tx, key)?;
            let allowed = self.allowed_for(tx, &record)?;
            let parsed = allowed.parse_all(
                names
                    .iter()
                    .map(String::as_str)
                    .zip(values.iter().map(String::as_str)),
            )?;
            for attribute in parsed {
                record.set_attribute(attribute);
            }
            self.store_asset(tx, &record)?;
            Ok(record)
        })?;
        info!(key = %key, attributes = names.len(), "attributes updated");
        Ok(record)
    }

    pub fn update_attribute(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        name: &str,
        value: &str,
    ) -> Result<AssetRecord, ProvenanceError> {
        self.update_attributes(ledger, key, &[name.to_string()], &[value.to_string()])
    }

    /// Set private attributes of `key` in `collection`, creating the
    /// partition on first use.
    pub fn update_private_attributes(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        collection: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<PrivateAttributePartition, ProvenanceError> {
        if values.is_empty() {
            return Err(ProvenanceError::Invalid("No transient data passed".to_string()));
        }
        if collection.trim().is_empty() {
            return Err(ProvenanceError::Invalid(
                "Please select a private data collection to store the private data".to_string(),
            ));
        }

        let partition = self.run(ledger, |tx| {
            let mut record = self.load_asset(tx, key)?;
            let allowed = self.allowed_for(tx, &record)?;
            let parsed = allowed.parse_all(
                values
                    .iter()
                    .map(|(name, raw)| (name.as_str(), raw.as_str())),
            )?;

            let private_key = self.private_key(key);
            let mut partition: PrivateAttributePartition =
                tx.read_private_json(collection, &private_key)?.unwrap_or_default();
            for attribute in parsed {
                partition.set(attribute);
            }
            tx.write_private_json(collection, &private_key, &partition)?;
            if record.add_private_collection(collection) {
                self.store_asset(tx, &record)?;
            }
            Ok(partition)
        })?;
        info!(
            key = %key,
            collection = %collection,
            attributes = values.len(),
            "private attributes updated"
        );
        Ok(partition)
    }

    pub fn update_private_attribute(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        collection: &str,
        name: &str,
        value: &str,
    ) -> Result<PrivateAttributePartition, ProvenanceError> {
        let values = BTreeMap::from([(name.to_string(), value.to_string())]);
        self.update_private_attributes(ledger, key, collection, &values)
    }

    /// Set the alarm flag of `key` and of its direct successors.
    pub fn set_alarm(
        &self,
        ledger: &mut dyn Ledger,
        key: &str,
        active: bool,
    ) -> Result<AssetRecord, ProvenanceError> {
        let (record, propagated) = self.run(ledger, |tx| {
            let mut record = self.load_asset(tx, key)?;
            record.set_alarm(active);

            let successors: BTreeSet<String> =
                record.successor_keys().map(str::to_string).collect();
            let mut propagated = 0usize;
            for successor in &successors {
                match tx.read_json::<AssetRecord>(successor)? {
                    Some(mut next) => {
                        next.set_alarm(active);
                        self.store_asset(tx, &next)?;
                        propagated += 1;
                    }
                    None => warn!(
                        key = %key,
                        successor = %successor,
                        "successor link points to a missing record"
                    ),
                }
            }

            self.store_asset(tx, &record)?;
            let event = if active {
                EVENT_ALARM_ACTIVATED
            } else {
                EVENT_ALARM_DEACTIVATED
            };
            tx.emit(event, &record);
            Ok((record, propagated))
        })?;
        info!(key = %key, active, successors = propagated, "alarm set");
        Ok(record)
    }
}
