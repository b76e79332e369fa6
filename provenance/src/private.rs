//! Private attribute partitions.
//!
//! A partition holds the organisation-private attributes of one asset record
//! inside one private collection, stored under `<record key><suffix>`.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::InvalidValue;
use crate::types::{
    find_attribute, remove_attribute, upsert_attribute, Attribute, AttributeDataType,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct PrivateAttributePartition {
    #[serde(default)]
    pub attributes: Vec<Attribute>,
}

impl PrivateAttributePartition {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `raw` as `data_type` and store it, replacing any value of the
    /// same name.
    pub fn add(
        &mut self,
        name: &str,
        version: u32,
        raw: &str,
        data_type: AttributeDataType,
    ) -> Result<(), InvalidValue> {
        let value = data_type.parse_value(name, raw)?;
        upsert_attribute(&mut self.attributes, Attribute::new(name, version, value));
        Ok(())
    }

    /// Store an already parsed attribute, replacing any of the same name.
    pub fn set(&mut self, attribute: Attribute) {
        upsert_attribute(&mut self.attributes, attribute);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        remove_attribute(&mut self.attributes, name)
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        find_attribute(&self.attributes, name)
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributeValue;

    #[test]
    fn test_add_is_type_checked() {
        let mut partition = PrivateAttributePartition::new();
        partition
            .add("Price", 1, "12.5", AttributeDataType::Float)
            .unwrap();
        let err = partition
            .add("Count", 1, "twelve", AttributeDataType::Integer)
            .unwrap_err();

        assert_eq!(err.attribute, "Count");
        assert_eq!(partition.attributes.len(), 1);
    }

    #[test]
    fn test_add_replaces_on_conflict() {
        let mut partition = PrivateAttributePartition::new();
        partition.add("Price", 1, "1", AttributeDataType::Float).unwrap();
        partition.add("price", 2, "7", AttributeDataType::Integer).unwrap();

        assert_eq!(partition.attributes.len(), 1);
        assert_eq!(partition.get("PRICE").unwrap().value, AttributeValue::Integer(7));
        assert!(partition.remove("Price"));
        assert!(partition.is_empty());
    }
}
