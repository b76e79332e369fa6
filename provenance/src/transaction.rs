//! Per-call transaction buffer.
//!
//! A [`Transaction`] reads each slot from the ledger at most once and stages
//! every write. Nothing reaches the ledger until [`Transaction::commit`]; a
//! transaction that is dropped instead leaves the ledger untouched. Events are
//! queued and emitted after the writes, and a failing event sink is logged
//! rather than surfaced.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::ProvenanceError;
use crate::ledger::{content_hash, Ledger, LedgerError, LedgerWrite};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Slot {
    State(String),
    Private { collection: String, key: String },
}

impl Slot {
    fn private(collection: &str, key: &str) -> Self {
        Self::Private {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }

    fn label(&self) -> String {
        match self {
            Self::State(key) => key.clone(),
            Self::Private { collection, key } => format!("{}/{}", collection, key),
        }
    }
}

#[derive(Debug, Clone)]
enum Staged {
    Put(Vec<u8>),
    Delete,
}

pub struct Transaction<'l> {
    ledger: &'l mut dyn Ledger,
    reads: BTreeMap<Slot, Option<Vec<u8>>>,
    writes: BTreeMap<Slot, Staged>,
    events: Vec<(String, Vec<u8>)>,
}

impl<'l> Transaction<'l> {
    pub fn begin(ledger: &'l mut dyn Ledger) -> Self {
        Self {
            ledger,
            reads: BTreeMap::new(),
            writes: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn caller(&self) -> String {
        self.ledger.caller_identity().to_string()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.ledger.now()
    }

    fn read(&mut self, slot: Slot) -> Result<Option<Vec<u8>>, LedgerError> {
        if let Some(staged) = self.writes.get(&slot) {
            return Ok(match staged {
                Staged::Put(value) => Some(value.clone()),
                Staged::Delete => None,
            });
        }
        if let Some(cached) = self.reads.get(&slot) {
            return Ok(cached.clone());
        }

        let value = match &slot {
            Slot::State(key) => self.ledger.get_state(key)?,
            Slot::Private { collection, key } => self.ledger.get_private_data(collection, key)?,
        };
        // Empty values count as absent.
        let value = value.filter(|v| !v.is_empty());
        self.reads.insert(slot, value.clone());
        Ok(value)
    }

    fn decode<T: DeserializeOwned>(
        slot: &Slot,
        bytes: Option<Vec<u8>>,
    ) -> Result<Option<T>, ProvenanceError> {
        match bytes {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes).map(Some).map_err(|source| {
                error!(key = %slot.label(), error = %source, "stored record does not decode");
                ProvenanceError::Corrupted {
                    key: slot.label(),
                    source,
                }
            }),
        }
    }

    pub fn exists(&mut self, key: &str) -> Result<bool, ProvenanceError> {
        Ok(self.read(Slot::State(key.to_string()))?.is_some())
    }

    pub fn read_json<T: DeserializeOwned>(
        &mut self,
        key: &str,
    ) -> Result<Option<T>, ProvenanceError> {
        let slot = Slot::State(key.to_string());
        let bytes = self.read(slot.clone())?;
        Self::decode(&slot, bytes)
    }

    pub fn read_private_json<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>, ProvenanceError> {
        let slot = Slot::private(collection, key);
        let bytes = self.read(slot.clone())?;
        Self::decode(&slot, bytes)
    }

    /// Hash of a private value, staged writes included.
    pub fn private_hash(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<String>, ProvenanceError> {
        match self.writes.get(&Slot::private(collection, key)) {
            Some(Staged::Put(value)) => Ok(Some(content_hash(value))),
            Some(Staged::Delete) => Ok(None),
            None => Ok(self.ledger.get_private_data_hash(collection, key)?),
        }
    }

    /// Prior revisions are history, not state: they are not cached.
    pub fn history(&self, key: &str) -> Result<Vec<Vec<u8>>, ProvenanceError> {
        Ok(self.ledger.key_history(key)?)
    }

    fn encode<T: Serialize>(slot: &Slot, value: &T) -> Result<Vec<u8>, ProvenanceError> {
        serde_json::to_vec(value).map_err(|source| ProvenanceError::Encode {
            key: slot.label(),
            source,
        })
    }

    pub fn write_json<T: Serialize>(
        &mut self,
        key: &str,
        value: &T,
    ) -> Result<(), ProvenanceError> {
        let slot = Slot::State(key.to_string());
        let bytes = Self::encode(&slot, value)?;
        self.writes.insert(slot, Staged::Put(bytes));
        Ok(())
    }

    pub fn write_private_json<T: Serialize>(
        &mut self,
        collection: &str,
        key: &str,
        value: &T,
    ) -> Result<(), ProvenanceError> {
        let slot = Slot::private(collection, key);
        let bytes = Self::encode(&slot, value)?;
        self.writes.insert(slot, Staged::Put(bytes));
        Ok(())
    }

    pub fn delete(&mut self, key: &str) {
        self.writes.insert(Slot::State(key.to_string()), Staged::Delete);
    }

    pub fn delete_private(&mut self, collection: &str, key: &str) {
        self.writes.insert(Slot::private(collection, key), Staged::Delete);
    }

    /// Queue an event for after commit.
    pub fn emit<T: Serialize>(&mut self, name: &str, payload: &T) {
        match serde_json::to_vec(payload) {
            Ok(bytes) => self.events.push((name.to_string(), bytes)),
            Err(e) => warn!(event = %name, error = %e, "dropping event with unencodable payload"),
        }
    }

    pub fn staged_writes(&self) -> usize {
        self.writes.len()
    }

    /// Apply staged writes in key order as one batch, then emit queued events.
    pub fn commit(self) -> Result<(), ProvenanceError> {
        let Self {
            ledger,
            writes,
            events,
            ..
        } = self;

        let batch: Vec<LedgerWrite> = writes
            .into_iter()
            .map(|(slot, staged)| match (slot, staged) {
                (Slot::State(key), Staged::Put(value)) => LedgerWrite::PutState { key, value },
                (Slot::State(key), Staged::Delete) => LedgerWrite::DeleteState { key },
                (Slot::Private { collection, key }, Staged::Put(value)) => LedgerWrite::PutPrivate {
                    collection,
                    key,
                    value,
                },
                (Slot::Private { collection, key }, Staged::Delete) => {
                    LedgerWrite::DeletePrivate { collection, key }
                }
            })
            .collect();
        if !batch.is_empty() {
            ledger.apply(batch)?;
        }

        for (name, payload) in events {
            match ledger.emit(&name, &payload) {
                Ok(()) => debug!(event = %name, "event emitted"),
                Err(e) => warn!(event = %name, error = %e, "event emission failed"),
            }
        }
        Ok(())
    }
}
