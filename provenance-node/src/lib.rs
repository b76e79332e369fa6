//! Provenance Node
//!
//! Runs the provenance contract against a durable local ledger.
//!
//! ## Features
//!
//! - **Sled ledger**: public state with full key history, private collections
//!   with configured membership, persisted events
//! - **TOML config**: data directory, default caller identity, collection
//!   membership and the default acceptance rule collection
//! - **One-shot invocation**: each run dispatches a single contract function
//!   and prints the `{status, response}` envelope

pub mod config;
pub mod error;
pub mod node;
pub mod sled_ledger;

pub use config::{CollectionConfig, Config};
pub use error::NodeError;
pub use node::{parse_transient, ProvenanceNode};
pub use sled_ledger::{SledLedger, StoredEvent};
