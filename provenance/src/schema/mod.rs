//! Versioned schema: attribute types, asset types and units.

pub mod asset_type;
pub mod attribute;
pub mod registry;

pub use asset_type::{
    reconstruct, replay, AssetTypeCatalog, AssetTypeDef, AttributeChange, ChangeType, Migration,
};
pub use attribute::{AttributeCatalog, AttributeRef, AttributeTypeDef, DefineOutcome};
pub use registry::{AssetTypeOutcome, SchemaRegistry};
