//! Acceptance rule operations. Each organisation edits only its own rule set,
//! stored in a private collection under `<organisation><suffix>`.

use tracing::info;

use super::ProvenanceContract;
use crate::error::ProvenanceError;
use crate::ledger::Ledger;
use crate::rules::{AcceptanceRuleSet, Condition};
use crate::transaction::Transaction;

impl ProvenanceContract {
    fn caller_rules(
        &self,
        tx: &mut Transaction<'_>,
        collection: &str,
    ) -> Result<(String, AcceptanceRuleSet), ProvenanceError> {
        if collection.trim().is_empty() {
            return Err(ProvenanceError::Invalid(
                "Please select a private data collection for the acceptance rules".to_string(),
            ));
        }
        let caller = tx.caller();
        let key = self.rules_key(&caller);
        let rules = tx
            .read_private_json(collection, &key)?
            .unwrap_or_else(|| AcceptanceRuleSet::new(&caller));
        Ok((key, rules))
    }

    /// Add or overwrite one condition in the caller's rule set.
    pub fn add_acceptance_condition(
        &self,
        ledger: &mut dyn Ledger,
        collection: &str,
        asset_type: &str,
        attribute: &str,
        condition: &str,
    ) -> Result<AcceptanceRuleSet, ProvenanceError> {
        let condition: Condition = condition.parse()?;
        let rules = self.run(ledger, |tx| {
            let (key, mut rules) = self.caller_rules(tx, collection)?;
            rules.add_condition(asset_type, attribute, condition.clone());
            tx.write_private_json(collection, &key, &rules)?;
            Ok(rules)
        })?;
        info!(
            owner = %rules.owner,
            asset_type = %asset_type,
            attribute = %attribute,
            condition = %condition,
            "acceptance condition added"
        );
        Ok(rules)
    }

    pub fn set_auto_accept(
        &self,
        ledger: &mut dyn Ledger,
        collection: &str,
        auto_accept: bool,
    ) -> Result<AcceptanceRuleSet, ProvenanceError> {
        let rules = self.run(ledger, |tx| {
            let (key, mut rules) = self.caller_rules(tx, collection)?;
            rules.auto_accept = auto_accept;
            tx.write_private_json(collection, &key, &rules)?;
            Ok(rules)
        })?;
        info!(owner = %rules.owner, auto_accept, "auto-accept set");
        Ok(rules)
    }

    /// Drop every condition the caller holds for `asset_type`.
    pub fn delete_acceptance_rules(
        &self,
        ledger: &mut dyn Ledger,
        collection: &str,
        asset_type: &str,
    ) -> Result<AcceptanceRuleSet, ProvenanceError> {
        let rules = self.run(ledger, |tx| {
            let (key, mut rules) = self.caller_rules(tx, collection)?;
            if !rules.delete_asset_type_rules(asset_type) {
                return Err(ProvenanceError::not_found("acceptance rules for", asset_type));
            }
            tx.write_private_json(collection, &key, &rules)?;
            Ok(rules)
        })?;
        info!(owner = %rules.owner, asset_type = %asset_type, "acceptance rules deleted");
        Ok(rules)
    }

    pub fn get_acceptance_rules(
        &self,
        ledger: &mut dyn Ledger,
        collection: &str,
        organisation: &str,
    ) -> Result<AcceptanceRuleSet, ProvenanceError> {
        self.run(ledger, |tx| {
            tx.read_private_json(collection, &self.rules_key(organisation))?
                .ok_or_else(|| ProvenanceError::not_found("acceptance rule set of", organisation))
        })
    }
}
