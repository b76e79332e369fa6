//! String-argument dispatcher.
//!
//! Hosts that receive invocations as a function name plus string arguments
//! (and a transient map for private values) route them through [`dispatch`].
//! Array arguments are JSON arrays inside a single string argument.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::contract::{CreateAsset, ProvenanceContract};
use crate::envelope::Envelope;
use crate::error::ProvenanceError;
use crate::ledger::Ledger;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub function: String,
    pub args: Vec<String>,
    /// Private attribute values, kept out of the public arguments
    pub transient: BTreeMap<String, String>,
}

impl Invocation {
    pub fn new<I, S>(function: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            function: function.into(),
            args: args.into_iter().map(Into::into).collect(),
            transient: BTreeMap::new(),
        }
    }

    pub fn with_transient(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.transient.insert(name.into(), value.into());
        self
    }

    fn expect_args(&self, expected: RangeInclusive<usize>) -> Result<(), ProvenanceError> {
        if expected.contains(&self.args.len()) {
            return Ok(());
        }
        let wanted = if expected.start() == expected.end() {
            expected.start().to_string()
        } else {
            format!("{} to {}", expected.start(), expected.end())
        };
        Err(ProvenanceError::Invalid(format!(
            "{} expects {} arguments but got {}",
            self.function,
            wanted,
            self.args.len()
        )))
    }

    fn arg(&self, index: usize) -> &str {
        self.args.get(index).map(String::as_str).unwrap_or("")
    }
}

/// Map deprecated function names onto their current names.
pub fn canonical_function(name: &str) -> &str {
    match name {
        "META_addUnit" => "addUnit",
        "META_addAttributeDefinition" => "putAttributeDefinition",
        "META_addProductDefinition" => "putAssetDefinition",
        "META_deleteProduct" => "removeAssetDefinition",
        "META_readMetaDef" => "getDefinition",
        "META_readMetaDefOfProduct" => "getAssetDefinition",
        "META_getAttributesOfProductWithVersion" => "getAttributeDefinitionsOfAsset",
        "META_getDataTypeOfAttributeWithVersion" => "getDataTypeOfAttributeDefinition",
        "createObject" => "createAsset",
        "readObject" => "getAsset",
        "deleteObject" => "deleteAsset",
        "objectExists" => "containsAsset",
        "privateObjectExists" => "hasPrivateAttributes",
        "deletePrivateObject" => "deletePrivateAttributes",
        "getAssetHistory" => "getAssetHistoryList",
        "changeOwner" | "confirmOwnership" => "setOwner",
        "updateAttribute" => "setAttribute",
        "updatePrivateAttribute" => "setPrivateAttribute",
        other => other,
    }
}

fn string_array(function: &str, raw: &str) -> Result<Vec<String>, ProvenanceError> {
    serde_json::from_str(raw).map_err(|e| {
        ProvenanceError::Invalid(format!(
            "{}: {} is not a JSON array of strings ({})",
            function, raw, e
        ))
    })
}

fn version(raw: &str) -> Result<i64, ProvenanceError> {
    raw.trim()
        .parse()
        .map_err(|_| ProvenanceError::Invalid(format!("Malformatted version number {}", raw)))
}

fn number(raw: &str) -> Result<f64, ProvenanceError> {
    raw.trim()
        .parse()
        .map_err(|_| ProvenanceError::Invalid(format!("The amount {} is not a number", raw)))
}

fn flag(raw: &str) -> Result<bool, ProvenanceError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ProvenanceError::Invalid(format!("{} is not a boolean", raw))),
    }
}

fn json<T: Serialize>(result: Result<T, ProvenanceError>) -> Result<Value, ProvenanceError> {
    result.and_then(|value| {
        serde_json::to_value(value).map_err(|source| ProvenanceError::Encode {
            key: "response".to_string(),
            source,
        })
    })
}

/// Quantity moved by a lineage call. The legacy four-argument form passes
/// the predecessor's (negative) change and the successor's change
/// separately; they must cancel out.
fn lineage_delta(invocation: &Invocation) -> Result<f64, ProvenanceError> {
    let first = number(invocation.arg(2))?;
    if invocation.args.len() == 3 {
        return Ok(first);
    }
    let removed = -first;
    let added = number(invocation.arg(3))?;
    if removed != added {
        return Err(ProvenanceError::Invalid(format!(
            "The predecessor loses {} but the successor gains {}",
            removed, added
        )));
    }
    Ok(added)
}

/// Route one invocation to the contract and wrap the outcome.
pub fn dispatch(
    contract: &ProvenanceContract,
    ledger: &mut dyn Ledger,
    invocation: &Invocation,
) -> Envelope {
    let function = canonical_function(&invocation.function);
    debug!(
        function = %invocation.function,
        canonical = %function,
        args = invocation.args.len(),
        "dispatching"
    );

    Envelope::from_result(route(contract, ledger, invocation, function))
}

fn route(
    contract: &ProvenanceContract,
    ledger: &mut dyn Ledger,
    inv: &Invocation,
    function: &str,
) -> Result<Value, ProvenanceError> {
    match function {
        // Schema
        "addUnit" => {
            inv.expect_args(1..=1)?;
            json(contract.add_unit(ledger, inv.arg(0)))
        }
        "putAttributeDefinition" => {
            inv.expect_args(2..=2)?;
            json(contract.put_attribute_definition(ledger, inv.arg(0), inv.arg(1)))
        }
        "putAssetDefinition" => {
            inv.expect_args(2..=2)?;
            let attributes = string_array(function, inv.arg(1))?;
            json(contract.put_asset_definition(ledger, inv.arg(0), &attributes))
        }
        "removeAssetDefinition" => {
            inv.expect_args(1..=1)?;
            json(contract.remove_asset_definition(ledger, inv.arg(0)))
        }
        "getDefinition" => {
            inv.expect_args(0..=0)?;
            json(contract.get_definition(ledger))
        }
        "getAssetDefinition" => {
            inv.expect_args(1..=1)?;
            json(contract.get_asset_definition(ledger, inv.arg(0)))
        }
        "getAttributeDefinitionsOfAsset" => {
            inv.expect_args(2..=2)?;
            let version = version(inv.arg(1))?;
            json(contract.get_attribute_definitions_of_asset(ledger, inv.arg(0), version))
        }
        "getDataTypeOfAttributeDefinition" => {
            inv.expect_args(2..=2)?;
            let version = version(inv.arg(1))?;
            json(contract.get_data_type_of_attribute_definition(ledger, inv.arg(0), version))
        }

        // Assets
        "createAsset" => {
            inv.expect_args(7..=7)?;
            let names = string_array(function, inv.arg(5))?;
            let values = string_array(function, inv.arg(6))?;
            if names.len() != values.len() {
                return Err(ProvenanceError::Invalid(format!(
                    "{} attribute names but {} values",
                    names.len(),
                    values.len()
                )));
            }
            let request = CreateAsset {
                key: inv.arg(0).to_string(),
                private_collection: Some(inv.arg(1).to_string()),
                asset_type: inv.arg(2).to_string(),
                quantity: inv.arg(3).to_string(),
                unit: inv.arg(4).to_string(),
                public_attributes: names.into_iter().zip(values).collect(),
                private_attributes: inv
                    .transient
                    .iter()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect(),
            };
            json(contract.create_asset(ledger, request))
        }
        "deleteAsset" => {
            inv.expect_args(1..=1)?;
            json(contract.delete_asset(ledger, inv.arg(0)))
        }
        "getAsset" => {
            inv.expect_args(1..=1)?;
            json(contract.get_asset(ledger, inv.arg(0)))
        }
        "getAssetHistoryList" => {
            inv.expect_args(1..=1)?;
            json(contract.get_asset_history(ledger, inv.arg(0)))
        }
        "containsAsset" => {
            inv.expect_args(1..=1)?;
            json(contract.contains_asset(ledger, inv.arg(0)))
        }
        "hasPrivateAttributes" => {
            inv.expect_args(2..=2)?;
            json(contract.has_private_attributes(ledger, inv.arg(0), inv.arg(1)))
        }
        "deletePrivateAttributes" => {
            inv.expect_args(2..=2)?;
            json(contract.delete_private_attributes(ledger, inv.arg(0), inv.arg(1)))
        }
        "setReceiver" => {
            inv.expect_args(2..=3)?;
            let collection = inv.args.get(2).map(String::as_str);
            json(contract.set_receiver(ledger, inv.arg(0), inv.arg(1), collection))
        }
        "setOwner" => {
            inv.expect_args(1..=1)?;
            json(contract.confirm_ownership(ledger, inv.arg(0)))
        }
        "addPredecessor" => {
            inv.expect_args(3..=4)?;
            let delta = lineage_delta(inv)?;
            json(contract.link_predecessor(ledger, inv.arg(0), inv.arg(1), delta))
        }
        "setAttribute" => {
            inv.expect_args(3..=3)?;
            let names = string_array(function, inv.arg(1))?;
            let values = string_array(function, inv.arg(2))?;
            json(contract.update_attributes(ledger, inv.arg(0), &names, &values))
        }
        "setPrivateAttribute" => {
            inv.expect_args(2..=2)?;
            json(contract.update_private_attributes(ledger, inv.arg(0), inv.arg(1), &inv.transient))
        }
        "activateAlarm" => {
            inv.expect_args(1..=1)?;
            json(contract.set_alarm(ledger, inv.arg(0), true))
        }
        "deactivateAlarm" => {
            inv.expect_args(1..=1)?;
            json(contract.set_alarm(ledger, inv.arg(0), false))
        }

        // Acceptance rules
        "addAcceptanceCondition" => {
            inv.expect_args(4..=4)?;
            json(contract.add_acceptance_condition(
                ledger,
                inv.arg(0),
                inv.arg(1),
                inv.arg(2),
                inv.arg(3),
            ))
        }
        "setAutoAccept" => {
            inv.expect_args(2..=2)?;
            json(contract.set_auto_accept(ledger, inv.arg(0), flag(inv.arg(1))?))
        }
        "deleteAcceptanceRules" => {
            inv.expect_args(2..=2)?;
            json(contract.delete_acceptance_rules(ledger, inv.arg(0), inv.arg(1)))
        }
        "getAcceptanceRules" => {
            inv.expect_args(2..=2)?;
            json(contract.get_acceptance_rules(ledger, inv.arg(0), inv.arg(1)))
        }

        _ => Err(ProvenanceError::Invalid(format!(
            "The function {} does not exist",
            inv.function
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;

    #[test]
    fn test_aliases() {
        assert_eq!(canonical_function("META_addUnit"), "addUnit");
        assert_eq!(canonical_function("changeOwner"), "setOwner");
        assert_eq!(canonical_function("createAsset"), "createAsset");
    }

    #[test]
    fn test_unknown_function_and_bad_arity() {
        let contract = ProvenanceContract::default();
        let mut ledger = MemoryLedger::new("Org1MSP");

        let unknown = dispatch(&contract, &mut ledger, &Invocation::new("selectAsset", ["{}"]));
        assert_eq!(unknown.status, "400");

        let no_args = Invocation::new("addUnit", Vec::<String>::new());
        let arity = dispatch(&contract, &mut ledger, &no_args);
        assert_eq!(arity.status, "400");
        assert_eq!(arity.response, "addUnit expects 1 arguments but got 0");
    }

    #[test]
    fn test_legacy_lineage_delta_must_balance() {
        let balanced = Invocation::new("addPredecessor", ["milk1", "cheese1", "-4", "4"]);
        assert_eq!(lineage_delta(&balanced).unwrap(), 4.0);

        let unbalanced = Invocation::new("addPredecessor", ["milk1", "cheese1", "-4", "5"]);
        assert!(lineage_delta(&unbalanced).is_err());
    }

    #[test]
    fn test_malformed_array_argument() {
        let contract = ProvenanceContract::default();
        let mut ledger = MemoryLedger::new("Org1MSP");
        let envelope = dispatch(
            &contract,
            &mut ledger,
            &Invocation::new("META_addProductDefinition", ["milklot", "Quality"]),
        );
        assert_eq!(envelope.status, "400");
    }
}
