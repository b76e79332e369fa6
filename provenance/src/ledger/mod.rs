//! The host ledger the contract runs against.
//!
//! The contract never talks to storage directly. Hosts implement [`Ledger`]
//! over whatever key-value store they have; [`MemoryLedger`] is the
//! in-process implementation used by tests and tools.

mod memory;

pub use memory::{EmittedEvent, MemoryLedger};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    /// The caller is not a member of the private collection
    #[error("{caller} may not read the private data collection {collection}")]
    AccessDenied { collection: String, caller: String },

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Event error: {0}")]
    Event(String),
}

/// One write of a committed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerWrite {
    PutState { key: String, value: Vec<u8> },
    DeleteState { key: String },
    PutPrivate { collection: String, key: String, value: Vec<u8> },
    DeletePrivate { collection: String, key: String },
}

/// Synchronous key-value ledger with access-scoped private collections.
pub trait Ledger {
    /// Current value of a public key.
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put_state(&mut self, key: &str, value: Vec<u8>) -> Result<(), LedgerError>;

    fn delete_state(&mut self, key: &str) -> Result<(), LedgerError>;

    /// Every value ever stored under `key`, oldest first.
    fn key_history(&self, key: &str) -> Result<Vec<Vec<u8>>, LedgerError>;

    /// Fails with [`LedgerError::AccessDenied`] for non-members.
    fn get_private_data(&self, collection: &str, key: &str) -> Result<Option<Vec<u8>>, LedgerError>;

    fn put_private_data(
        &mut self,
        collection: &str,
        key: &str,
        value: Vec<u8>,
    ) -> Result<(), LedgerError>;

    fn delete_private_data(&mut self, collection: &str, key: &str) -> Result<(), LedgerError>;

    /// Hex SHA-256 of the stored private value. Visible to every caller.
    fn get_private_data_hash(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<String>, LedgerError>;

    /// Apply `writes` in order as one atomic unit: either all of them take
    /// effect or none do.
    fn apply(&mut self, writes: Vec<LedgerWrite>) -> Result<(), LedgerError>;

    fn caller_identity(&self) -> &str;

    fn now(&self) -> DateTime<Utc>;

    fn emit(&mut self, name: &str, payload: &[u8]) -> Result<(), LedgerError>;
}

/// Hex-encoded SHA-256 of `bytes`.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_ne!(content_hash(b"milk"), content_hash(b"Milk"));
    }
}
