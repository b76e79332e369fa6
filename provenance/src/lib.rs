//! Supply-chain provenance core
//!
//! This crate implements the ledger-side logic for tracking physical goods:
//!
//! - **Schema registry**: versioned attribute types and asset types, with full
//!   historical reconstruction of any past asset-type version
//! - **Asset records**: quantity, ownership handshake, lineage links with
//!   conserved quantities, alarm flags and typed attributes
//! - **Private attribute partitions**: organisation-scoped attributes kept in
//!   private collections next to the public record
//! - **Acceptance rules**: per-organisation conditions an incoming asset must
//!   satisfy before custody can move
//!
//! Durable storage, caller identity, time and events are supplied by the host
//! through the [`Ledger`] trait. Every contract entry point runs inside a
//! [`Transaction`] that reads each key once and writes each key once at commit.
//!
//! # Example
//!
//! ```ignore
//! use provenance::{MemoryLedger, ProvenanceContract};
//!
//! let contract = ProvenanceContract::default();
//! let mut ledger = MemoryLedger::new("Org1MSP");
//!
//! contract.add_unit(&mut ledger, "Liter")?;
//! contract.put_attribute_definition(&mut ledger, "Quality", "String")?;
//! contract.put_asset_definition(&mut ledger, "milklot", &["Quality".to_string()])?;
//! ```

pub mod asset;
pub mod contract;
pub mod dispatch;
pub mod envelope;
pub mod error;
pub mod ledger;
pub mod private;
pub mod rules;
pub mod schema;
pub mod transaction;
pub mod types;

// Re-export main types
pub use asset::{AssetRecord, AssetState, LineageLink, OwnershipEntry};
pub use contract::{
    AssetView, ContractConfig, CreateAsset, ProvenanceContract, TypedAttribute, TypedAttributeList,
    EVENT_ALARM_ACTIVATED, EVENT_ALARM_DEACTIVATED, EVENT_OWNERSHIP_TRANSFERRED,
};
pub use dispatch::{dispatch, Invocation};
pub use envelope::Envelope;
pub use error::{ErrorKind, InvalidValue, ProvenanceError};
pub use ledger::{EmittedEvent, Ledger, LedgerError, LedgerWrite, MemoryLedger};
pub use private::PrivateAttributePartition;
pub use rules::{AcceptanceRuleSet, Condition};
pub use schema::{
    AssetTypeCatalog, AssetTypeDef, AssetTypeOutcome, AttributeCatalog, AttributeChange,
    AttributeRef, AttributeTypeDef, ChangeType, DefineOutcome, Migration, SchemaRegistry,
};
pub use transaction::Transaction;
pub use types::{Attribute, AttributeDataType, AttributeValue};
