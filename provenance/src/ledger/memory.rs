//! In-memory ledger.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

use super::{content_hash, Ledger, LedgerError, LedgerWrite};

/// An event captured by [`MemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedEvent {
    pub name: String,
    pub payload: Vec<u8>,
}

impl EmittedEvent {
    pub fn payload_json(&self) -> Option<serde_json::Value> {
        serde_json::from_slice(&self.payload).ok()
    }
}

/// Ledger kept entirely in memory.
///
/// Collections are open to every caller until restricted with
/// [`MemoryLedger::restrict_collection`].
#[derive(Debug, Default)]
pub struct MemoryLedger {
    caller: String,
    clock: Option<DateTime<Utc>>,
    state: BTreeMap<String, Vec<u8>>,
    history: BTreeMap<String, Vec<Vec<u8>>>,
    private: BTreeMap<(String, String), Vec<u8>>,
    members: BTreeMap<String, BTreeSet<String>>,
    events: Vec<EmittedEvent>,
    fail_events: bool,
    fail_writes: bool,
}

impl MemoryLedger {
    pub fn new(caller: impl Into<String>) -> Self {
        Self {
            caller: caller.into(),
            ..Default::default()
        }
    }

    /// Switch the identity subsequent calls run as.
    pub fn set_caller(&mut self, caller: impl Into<String>) {
        self.caller = caller.into();
    }

    pub fn restrict_collection<I, S>(&mut self, collection: &str, members: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.insert(
            collection.to_string(),
            members.into_iter().map(Into::into).collect(),
        );
    }

    /// Pin `now()` to a fixed instant.
    pub fn set_clock(&mut self, now: DateTime<Utc>) {
        self.clock = Some(now);
    }

    /// Make `emit` fail, for exercising the fire-and-forget path.
    pub fn fail_events(&mut self, fail: bool) {
        self.fail_events = fail;
    }

    /// Make `apply` reject every batch, for exercising failed commits.
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn events(&self) -> &[EmittedEvent] {
        &self.events
    }

    fn can_read(&self, collection: &str) -> bool {
        self.members
            .get(collection)
            .map_or(true, |members| members.contains(&self.caller))
    }
}

impl Ledger for MemoryLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.state.get(key).cloned())
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        self.history
            .entry(key.to_string())
            .or_default()
            .push(value.clone());
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    fn delete_state(&mut self, key: &str) -> Result<(), LedgerError> {
        self.state.remove(key);
        Ok(())
    }

    fn key_history(&self, key: &str) -> Result<Vec<Vec<u8>>, LedgerError> {
        Ok(self.history.get(key).cloned().unwrap_or_default())
    }

    fn get_private_data(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<Vec<u8>>, LedgerError> {
        if !self.can_read(collection) {
            return Err(LedgerError::AccessDenied {
                collection: collection.to_string(),
                caller: self.caller.clone(),
            });
        }
        Ok(self
            .private
            .get(&(collection.to_string(), key.to_string()))
            .cloned())
    }

    fn put_private_data(
        &mut self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.private
            .insert((collection.to_string(), key.to_string()), value);
        Ok(())
    }

    fn delete_private_data(&mut self, collection: &str, key: &str) -> Result<(), LedgerError> {
        self.private
            .remove(&(collection.to_string(), key.to_string()));
        Ok(())
    }

    fn get_private_data_hash(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self
            .private
            .get(&(collection.to_string(), key.to_string()))
            .map(|value| content_hash(value)))
    }

    fn apply(&mut self, writes: Vec<LedgerWrite>) -> Result<(), LedgerError> {
        if self.fail_writes {
            return Err(LedgerError::Backend(format!(
                "rejected a batch of {} writes",
                writes.len()
            )));
        }
        for write in writes {
            match write {
                LedgerWrite::PutState { key, value } => self.put_state(&key, value)?,
                LedgerWrite::DeleteState { key } => self.delete_state(&key)?,
                LedgerWrite::PutPrivate {
                    collection,
                    key,
                    value,
                } => self.put_private_data(&collection, &key, value)?,
                LedgerWrite::DeletePrivate { collection, key } => {
                    self.delete_private_data(&collection, &key)?
                }
            }
        }
        Ok(())
    }

    fn caller_identity(&self) -> &str {
        &self.caller
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.unwrap_or_else(Utc::now)
    }

    fn emit(&mut self, name: &str, payload: &[u8]) -> Result<(), LedgerError> {
        if self.fail_events {
            return Err(LedgerError::Event(format!("event sink rejected {}", name)));
        }
        self.events.push(EmittedEvent {
            name: name.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_and_history() {
        let mut ledger = MemoryLedger::new("Org1MSP");
        ledger.put_state("milk1", b"a".to_vec()).unwrap();
        ledger.put_state("milk1", b"b".to_vec()).unwrap();
        ledger.delete_state("milk1").unwrap();

        assert_eq!(ledger.get_state("milk1").unwrap(), None);
        assert_eq!(
            ledger.key_history("milk1").unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_private_access_scoping() {
        let mut ledger = MemoryLedger::new("Org1MSP");
        ledger.restrict_collection("CollectionOne", ["Org1MSP", "Org2MSP"]);
        ledger
            .put_private_data("CollectionOne", "milk1_P", b"{}".to_vec())
            .unwrap();

        assert!(ledger.get_private_data("CollectionOne", "milk1_P").unwrap().is_some());

        ledger.set_caller("Org3MSP");
        assert!(matches!(
            ledger.get_private_data("CollectionOne", "milk1_P"),
            Err(LedgerError::AccessDenied { .. })
        ));
        assert_eq!(
            ledger.get_private_data_hash("CollectionOne", "milk1_P").unwrap(),
            Some(content_hash(b"{}"))
        );
    }

    #[test]
    fn test_events_can_fail() {
        let mut ledger = MemoryLedger::new("Org1MSP");
        ledger.emit("alarm_activated", b"{}").unwrap();
        ledger.fail_events(true);
        assert!(ledger.emit("alarm_activated", b"{}").is_err());
        assert_eq!(ledger.events().len(), 1);
    }
}
