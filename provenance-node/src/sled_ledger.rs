//! Durable ledger on a local sled database.
//!
//! Trees:
//! - `state`: current public values
//! - `history`: every public write, keyed by `<key>\0<sequence>`
//! - `private:<collection>`: one tree per private collection
//! - `events`: emitted events in emission order

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use provenance::ledger::content_hash;
use provenance::{Ledger, LedgerError, LedgerWrite};
use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::{Db, Transactional, Tree};
use tracing::{debug, info};

use crate::config::CollectionConfig;
use crate::error::NodeError;

/// An event as persisted in the `events` tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

pub struct SledLedger {
    db: Db,
    state: Tree,
    history: Tree,
    events: Tree,
    caller: String,
    members: BTreeMap<String, BTreeSet<String>>,
}

fn backend(e: sled::Error) -> LedgerError {
    LedgerError::Backend(e.to_string())
}

fn history_prefix(key: &str) -> Vec<u8> {
    let mut prefix = key.as_bytes().to_vec();
    prefix.push(0);
    prefix
}

impl SledLedger {
    /// Open or create the ledger database
    pub fn open<P: AsRef<Path>>(path: P, caller: impl Into<String>) -> Result<Self, NodeError> {
        let db = sled::open(path.as_ref())?;
        let state = db.open_tree("state")?;
        let history = db.open_tree("history")?;
        let events = db.open_tree("events")?;
        info!(path = %path.as_ref().display(), "Opened ledger database");
        Ok(Self {
            db,
            state,
            history,
            events,
            caller: caller.into(),
            members: BTreeMap::new(),
        })
    }

    /// Limit reads of `collection` to its configured members.
    pub fn restrict_collection(&mut self, collection: &CollectionConfig) {
        self.members.insert(
            collection.name.clone(),
            collection.members.iter().cloned().collect(),
        );
    }

    pub fn set_caller(&mut self, caller: impl Into<String>) {
        self.caller = caller.into();
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<usize, NodeError> {
        Ok(self.db.flush()?)
    }

    /// All emitted events, oldest first
    pub fn events(&self) -> Result<Vec<StoredEvent>, NodeError> {
        let mut events = Vec::new();
        for item in self.events.iter() {
            let (_, value) = item?;
            events.push(serde_json::from_slice(&value)?);
        }
        Ok(events)
    }

    fn private_tree(&self, collection: &str) -> Result<Tree, LedgerError> {
        self.db
            .open_tree(format!("private:{}", collection))
            .map_err(backend)
    }

    fn can_read(&self, collection: &str) -> bool {
        self.members
            .get(collection)
            .map_or(true, |members| members.contains(&self.caller))
    }

    fn next_sequence(&self) -> Result<[u8; 8], LedgerError> {
        Ok(self.db.generate_id().map_err(backend)?.to_be_bytes())
    }

    fn history_key(&self, key: &str) -> Result<Vec<u8>, LedgerError> {
        let mut history_key = history_prefix(key);
        history_key.extend_from_slice(&self.next_sequence()?);
        Ok(history_key)
    }
}

impl Ledger for SledLedger {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self
            .state
            .get(key.as_bytes())
            .map_err(backend)?
            .map(|value| value.to_vec()))
    }

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError> {
        let history_key = self.history_key(key)?;
        self.history
            .insert(history_key, value.as_slice())
            .map_err(backend)?;
        self.state.insert(key.as_bytes(), value).map_err(backend)?;
        debug!(key = %key, "state written");
        Ok(())
    }

    fn delete_state(&mut self, key: &str) -> Result<(), LedgerError> {
        self.state.remove(key.as_bytes()).map_err(backend)?;
        Ok(())
    }

    fn key_history(&self, key: &str) -> Result<Vec<Vec<u8>>, LedgerError> {
        let mut values = Vec::new();
        for item in self.history.scan_prefix(history_prefix(key)) {
            let (_, value) = item.map_err(backend)?;
            values.push(value.to_vec());
        }
        Ok(values)
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
            .private_tree(collection)?
            .get(key.as_bytes())
            .map_err(backend)?
            .map(|value| value.to_vec()))
    }

    fn put_private_data(
        &mut self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), LedgerError> {
        self.private_tree(collection)?
            .insert(key.as_bytes(), value)
            .map_err(backend)?;
        debug!(collection = %collection, key = %key, "private data written");
        Ok(())
    }

    fn delete_private_data(&mut self, collection: &str, key: &str) -> Result<(), LedgerError> {
        self.private_tree(collection)?
            .remove(key.as_bytes())
            .map_err(backend)?;
        Ok(())
    }

    fn get_private_data_hash(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<String>, LedgerError> {
        Ok(self
            .private_tree(collection)?
            .get(key.as_bytes())
            .map_err(backend)?
            .map(|value| content_hash(&value)))
    }

    /// Runs as one sled transaction over `state`, `history` and every
    /// private tree the batch touches.
    fn apply(&mut self, writes: Vec<LedgerWrite>) -> Result<(), LedgerError> {
        const STATE: usize = 0;
        const HISTORY: usize = 1;

        let mut trees = vec![self.state.clone(), self.history.clone()];
        let mut private_trees: BTreeMap<&str, usize> = BTreeMap::new();
        let mut history_keys = Vec::new();
        for write in &writes {
            match write {
                LedgerWrite::PutState { key, .. } => history_keys.push(self.history_key(key)?),
                LedgerWrite::PutPrivate { collection, .. }
                | LedgerWrite::DeletePrivate { collection, .. } => {
                    if !private_trees.contains_key(collection.as_str()) {
                        private_trees.insert(collection.as_str(), trees.len());
                        trees.push(self.private_tree(collection)?);
                    }
                }
                LedgerWrite::DeleteState { .. } => {}
            }
        }

        trees
            .as_slice()
            .transaction(|views| -> ConflictableTransactionResult<(), ()> {
                let mut history_keys = history_keys.iter();
                for write in &writes {
                    match write {
                        LedgerWrite::PutState { key, value } => {
                            if let Some(history_key) = history_keys.next() {
                                views[HISTORY].insert(history_key.as_slice(), value.as_slice())?;
                            }
                            views[STATE].insert(key.as_bytes(), value.as_slice())?;
                        }
                        LedgerWrite::DeleteState { key } => {
                            views[STATE].remove(key.as_bytes())?;
                        }
                        LedgerWrite::PutPrivate {
                            collection,
                            key,
                            value,
                        } => {
                            views[private_trees[collection.as_str()]]
                                .insert(key.as_bytes(), value.as_slice())?;
                        }
                        LedgerWrite::DeletePrivate { collection, key } => {
                            views[private_trees[collection.as_str()]].remove(key.as_bytes())?;
                        }
                    }
                }
                Ok(())
            })
            .map_err(|e: TransactionError<()>| match e {
                TransactionError::Abort(()) => {
                    LedgerError::Backend("ledger transaction aborted".to_string())
                }
                TransactionError::Storage(e) => backend(e),
            })?;
        debug!(writes = writes.len(), "batch applied");
        Ok(())
    }

    fn caller_identity(&self) -> &str {
        &self.caller
    }

    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn emit(&mut self, name: &str, payload: &[u8]) -> Result<(), LedgerError> {
        let payload = serde_json::from_slice(payload)
            .unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(payload).into_owned())
            });
        let event = StoredEvent {
            name: name.to_string(),
            timestamp: self.now(),
            payload,
        };
        let bytes = serde_json::to_vec(&event).map_err(|e| LedgerError::Event(e.to_string()))?;
        let sequence = self.next_sequence()?;
        self.events.insert(sequence, bytes).map_err(backend)?;
        info!(event = %name, "event emitted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open(dir: &TempDir) -> SledLedger {
        SledLedger::open(dir.path().join("ledger.sled"), "Org1MSP").unwrap()
    }

    #[test]
    fn test_history_is_per_key_and_ordered() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        ledger.put_state("milk1", b"a".to_vec()).unwrap();
        ledger.put_state("milk10", b"x".to_vec()).unwrap();
        ledger.put_state("milk1", b"b".to_vec()).unwrap();
        ledger.delete_state("milk1").unwrap();

        assert_eq!(ledger.get_state("milk1").unwrap(), None);
        assert_eq!(
            ledger.key_history("milk1").unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
        assert_eq!(ledger.key_history("milk10").unwrap().len(), 1);
    }

    #[test]
    fn test_batch_spans_all_trees() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        ledger.put_state("milk2", b"old".to_vec()).unwrap();

        ledger
            .apply(vec![
                LedgerWrite::PutState {
                    key: "milk1".into(),
                    value: b"a".to_vec(),
                },
                LedgerWrite::DeleteState {
                    key: "milk2".into(),
                },
                LedgerWrite::PutPrivate {
                    collection: "CollectionOne".into(),
                    key: "milk1_P".into(),
                    value: b"{}".to_vec(),
                },
            ])
            .unwrap();

        assert_eq!(ledger.get_state("milk1").unwrap(), Some(b"a".to_vec()));
        assert_eq!(ledger.key_history("milk1").unwrap(), vec![b"a".to_vec()]);
        assert_eq!(ledger.get_state("milk2").unwrap(), None);
        assert_eq!(
            ledger.get_private_data("CollectionOne", "milk1_P").unwrap(),
            Some(b"{}".to_vec())
        );

        ledger
            .apply(vec![LedgerWrite::DeletePrivate {
                collection: "CollectionOne".into(),
                key: "milk1_P".into(),
            }])
            .unwrap();
        assert_eq!(ledger.get_private_data_hash("CollectionOne", "milk1_P").unwrap(), None);
    }

    #[test]
    fn test_private_membership() {
        let dir = TempDir::new().unwrap();
        let mut ledger = open(&dir);
        ledger.restrict_collection(&CollectionConfig {
            name: "CollectionOne".into(),
            members: vec!["Org1MSP".into()],
        });
        ledger
            .put_private_data("CollectionOne", "milk1_P", b"{}".to_vec())
            .unwrap();

        ledger.set_caller("Org2MSP");
        assert!(matches!(
            ledger.get_private_data("CollectionOne", "milk1_P"),
            Err(LedgerError::AccessDenied { .. })
        ));
        assert_eq!(
            ledger.get_private_data_hash("CollectionOne", "milk1_P").unwrap(),
            Some(content_hash(b"{}"))
        );
        assert_eq!(ledger.get_private_data("Open", "milk1_P").unwrap(), None);
    }

    #[test]
    fn test_events_persist() {
        let dir = TempDir::new().unwrap();
        {
            let mut ledger = open(&dir);
            ledger.emit("alarm_activated", br#"{"key":"milk1"}"#).unwrap();
            ledger.emit("alarm_deactivated", b"not json").unwrap();
            ledger.flush().unwrap();
        }

        let events = open(&dir).events().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].name, "alarm_activated");
        assert_eq!(events[0].payload["key"], "milk1");
        assert_eq!(events[1].payload, "not json");
    }
}
