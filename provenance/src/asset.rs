//! Asset records and their ownership / lineage state machine.
//!
//! ```text
//! Active --set_receiver--> TransferPending --confirm_ownership--> Active
//!   ^                                                               |
//!   +------------------------- (new owner) -------------------------+
//! ```
//!
//! Deletion is terminal and handled by the contract, which also removes the
//! record's private partitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::ProvenanceError;
use crate::types::{find_attribute, upsert_attribute, Attribute};

/// One entry of the append-only custody history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct OwnershipEntry {
    pub timestamp: DateTime<Utc>,
    pub owner: String,
}

/// Edge of the lineage graph. The annotation is a human-readable note of the
/// quantity moved across the edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct LineageLink {
    pub peer_key: String,
    pub annotation: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AssetState {
    Active,
    TransferPending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "camelCase")]
pub struct AssetRecord {
    pub key: String,
    #[serde(rename = "productName")]
    pub asset_type: String,
    /// Asset-type version in force at creation; later schema edits do not
    /// change what this record validates against.
    #[serde(rename = "productVersion")]
    pub asset_type_version: u32,
    /// Generation of the asset type the record was created against
    #[serde(rename = "productGeneration", default)]
    pub asset_type_generation: u32,
    #[serde(rename = "amount")]
    pub quantity: f64,
    pub unit: String,
    #[serde(default)]
    pub alarm_flag: bool,
    pub actual_owner: String,
    /// Empty when no transfer is pending
    #[serde(rename = "receiver", default)]
    pub pending_receiver: String,
    #[serde(rename = "tsAndOwner", default)]
    pub ownership_history: Vec<OwnershipEntry>,
    #[serde(rename = "predecessor", default)]
    pub predecessors: Vec<LineageLink>,
    #[serde(rename = "successor", default)]
    pub successors: Vec<LineageLink>,
    #[serde(rename = "privateDataCollection", default)]
    pub private_collections: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl AssetRecord {
    pub fn new(
        key: impl Into<String>,
        asset_type: impl Into<String>,
        asset_type_version: u32,
        quantity: f64,
        unit: impl Into<String>,
        owner: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let owner = owner.into();
        Self {
            key: key.into(),
            asset_type: asset_type.into(),
            asset_type_version,
            asset_type_generation: 0,
            quantity,
            unit: unit.into(),
            alarm_flag: false,
            actual_owner: owner.clone(),
            pending_receiver: String::new(),
            ownership_history: vec![OwnershipEntry {
                timestamp: now,
                owner,
            }],
            predecessors: Vec::new(),
            successors: Vec::new(),
            private_collections: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn state(&self) -> AssetState {
        if self.pending_receiver.is_empty() {
            AssetState::Active
        } else {
            AssetState::TransferPending
        }
    }

    pub fn ensure_owner(&self, caller: &str) -> Result<(), ProvenanceError> {
        if self.actual_owner != caller {
            return Err(ProvenanceError::NotOwner {
                caller: caller.to_string(),
                key: self.key.clone(),
            });
        }
        Ok(())
    }

    /// Nominate the next owner. An empty receiver withdraws a pending offer.
    pub fn set_receiver(&mut self, caller: &str, receiver: &str) -> Result<(), ProvenanceError> {
        self.ensure_owner(caller)?;
        self.pending_receiver = receiver.to_string();
        Ok(())
    }

    pub fn confirm_ownership(
        &mut self,
        caller: &str,
        now: DateTime<Utc>,
    ) -> Result<(), ProvenanceError> {
        if self.pending_receiver.is_empty() || self.pending_receiver != caller {
            return Err(ProvenanceError::NotReceiver {
                caller: caller.to_string(),
                key: self.key.clone(),
            });
        }
        self.transfer_to(caller, now);
        Ok(())
    }

    /// Move custody unconditionally. Callers check authorization first.
    pub fn transfer_to(&mut self, new_owner: &str, now: DateTime<Utc>) {
        self.pending_receiver.clear();
        self.ownership_history.push(OwnershipEntry {
            timestamp: now,
            owner: new_owner.to_string(),
        });
        self.actual_owner = new_owner.to_string();
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, name)
    }

    /// Insert or replace by name.
    pub fn set_attribute(&mut self, attribute: Attribute) {
        upsert_attribute(&mut self.attributes, attribute);
    }

    pub fn add_private_collection(&mut self, collection: &str) -> bool {
        if self.private_collections.iter().any(|c| c == collection) {
            return false;
        }
        self.private_collections.push(collection.to_string());
        true
    }

    pub fn remove_private_collection(&mut self, collection: &str) -> bool {
        let before = self.private_collections.len();
        self.private_collections.retain(|c| c != collection);
        self.private_collections.len() != before
    }

    /// Returns whether the flag changed.
    pub fn set_alarm(&mut self, active: bool) -> bool {
        let changed = self.alarm_flag != active;
        self.alarm_flag = active;
        changed
    }

    pub fn successor_keys(&self) -> impl Iterator<Item = &str> {
        self.successors.iter().map(|link| link.peer_key.as_str())
    }
}

/// Move `delta` from `predecessor` to `successor` and record the edge on both.
///
/// Everything is checked before either record is touched: on error both are
/// exactly as they were.
pub fn link_quantities(
    predecessor: &mut AssetRecord,
    successor: &mut AssetRecord,
    delta: f64,
) -> Result<(), ProvenanceError> {
    if predecessor.key == successor.key {
        return Err(ProvenanceError::Invalid(format!(
            "The object {} cannot be its own predecessor",
            predecessor.key
        )));
    }
    if !delta.is_finite() || delta < 0.0 {
        return Err(ProvenanceError::Invalid(format!(
            "The amount {} is not a non-negative number",
            delta
        )));
    }
    let remaining = predecessor.quantity - delta;
    if remaining < 0.0 {
        return Err(ProvenanceError::NegativeQuantity {
            key: predecessor.key.clone(),
            resulting: remaining,
        });
    }

    let received = successor.quantity + delta;
    if !received.is_finite() {
        return Err(ProvenanceError::QuantityOverflow {
            key: successor.key.clone(),
        });
    }

    predecessor.quantity = remaining;
    successor.quantity = received;

    predecessor.successors.push(LineageLink {
        peer_key: successor.key.clone(),
        annotation: format!("{} {}", delta, predecessor.unit),
    });
    successor.predecessors.push(LineageLink {
        peer_key: predecessor.key.clone(),
        annotation: format!("{} {} {}", delta, predecessor.unit, predecessor.asset_type),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::types::AttributeValue;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn lot(key: &str, quantity: f64) -> AssetRecord {
        AssetRecord::new(key, "milklot", 1, quantity, "Liter", "Org1MSP", at(0))
    }

    #[test]
    fn test_handshake() {
        let mut milk = lot("milk1", 10.0);
        assert_eq!(milk.state(), AssetState::Active);

        let err = milk.set_receiver("Org2MSP", "Org2MSP").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailed);

        milk.set_receiver("Org1MSP", "Org2MSP").unwrap();
        assert_eq!(milk.state(), AssetState::TransferPending);

        let err = milk.confirm_ownership("Org3MSP", at(5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailed);

        milk.confirm_ownership("Org2MSP", at(10)).unwrap();
        assert_eq!(milk.actual_owner, "Org2MSP");
        assert!(milk.pending_receiver.is_empty());
        assert_eq!(milk.ownership_history.len(), 2);
        assert_eq!(milk.ownership_history[1].timestamp, at(10));
    }

    #[test]
    fn test_confirm_without_offer_fails() {
        let mut milk = lot("milk1", 10.0);
        assert!(milk.confirm_ownership("", at(1)).is_err());
        assert!(milk.confirm_ownership("Org1MSP", at(1)).is_err());
        assert_eq!(milk.ownership_history.len(), 1);
    }

    #[test]
    fn test_link_conserves_quantity() {
        let mut milk = lot("milk1", 10.0);
        let mut cheese = lot("cheese1", 1.5);

        link_quantities(&mut milk, &mut cheese, 4.0).unwrap();
        assert_eq!(milk.quantity, 6.0);
        assert_eq!(cheese.quantity, 5.5);
        assert_eq!(milk.successors[0].peer_key, "cheese1");
        assert_eq!(milk.successors[0].annotation, "4 Liter");
        assert_eq!(cheese.predecessors[0].annotation, "4 Liter milklot");
    }

    #[test]
    fn test_link_rejects_overdraw_without_mutation() {
        let mut milk = lot("milk1", 3.0);
        let mut cheese = lot("cheese1", 0.0);
        let (milk_before, cheese_before) = (milk.clone(), cheese.clone());

        let err = link_quantities(&mut milk, &mut cheese, 5.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert_eq!(milk, milk_before);
        assert_eq!(cheese, cheese_before);

        assert!(link_quantities(&mut milk, &mut cheese, -1.0).is_err());
        assert!(link_quantities(&mut milk, &mut cheese, f64::NAN).is_err());
        assert_eq!(milk, milk_before);
    }

    #[test]
    fn test_link_rejects_successor_overflow_without_mutation() {
        let mut milk = lot("milk1", 1e308);
        let mut cheese = lot("cheese1", 1e308);
        let (milk_before, cheese_before) = (milk.clone(), cheese.clone());

        let err = link_quantities(&mut milk, &mut cheese, 1e308).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvariantViolation);
        assert!(matches!(err, ProvenanceError::QuantityOverflow { ref key } if key == "cheese1"));
        assert_eq!(milk, milk_before);
        assert_eq!(cheese, cheese_before);
    }

    #[test]
    fn test_attributes_and_collections() {
        let mut milk = lot("milk1", 1.0);
        milk.set_attribute(Attribute::new("Quality", 1, AttributeValue::String("A".into())));
        milk.set_attribute(Attribute::new("quality", 1, AttributeValue::String("B".into())));
        assert_eq!(milk.attributes.len(), 1);
        assert_eq!(
            milk.attribute("QUALITY").unwrap().value,
            AttributeValue::String("B".into())
        );

        assert!(milk.add_private_collection("CollectionOne"));
        assert!(!milk.add_private_collection("CollectionOne"));
        assert!(milk.remove_private_collection("CollectionOne"));
        assert!(milk.private_collections.is_empty());
    }

    #[test]
    fn test_wire_names() {
        let mut milk = lot("milk1", 2.5);
        milk.set_alarm(true);
        let json = serde_json::to_value(&milk).unwrap();

        for field in [
            "productName",
            "productVersion",
            "amount",
            "alarmFlag",
            "actualOwner",
            "receiver",
            "tsAndOwner",
            "predecessor",
            "successor",
            "privateDataCollection",
            "attributes",
        ] {
            assert!(json.get(field).is_some(), "missing {field}");
        }
        assert_eq!(json["tsAndOwner"][0]["owner"], "Org1MSP");

        let decoded: AssetRecord = serde_json::from_value(json).unwrap();
        assert_eq!(decoded, milk);
    }
}
