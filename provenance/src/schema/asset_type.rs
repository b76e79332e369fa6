//! Asset type catalog.
//!
//! An asset type is a named set of attribute references. Every single add or
//! remove bumps the asset type's version by one and appends one entry to its
//! change history, so any earlier attribute set can be rebuilt by undoing the
//! history backwards from the current version.

use serde::{Deserialize, Serialize};

#[cfg(feature = "typescript")]
use ts_rs::TS;

use crate::error::ProvenanceError;
use crate::schema::attribute::AttributeRef;

/// Kind of a structural change to an asset type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum ChangeType {
    #[serde(rename = "ADD")]
    Add,
    #[serde(rename = "DELETE")]
    Remove,
}

/// One entry of an asset type's change history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AttributeChange {
    #[serde(rename = "type")]
    pub op: ChangeType,
    pub attribute: AttributeRef,
}

impl AttributeChange {
    pub fn add(attribute: AttributeRef) -> Self {
        Self {
            op: ChangeType::Add,
            attribute,
        }
    }

    pub fn remove(attribute: AttributeRef) -> Self {
        Self {
            op: ChangeType::Remove,
            attribute,
        }
    }

    /// Apply this change going forward in time.
    pub fn apply(&self, attributes: &mut Vec<AttributeRef>) {
        match self.op {
            ChangeType::Add => push_unique(attributes, self.attribute.clone()),
            ChangeType::Remove => attributes.retain(|a| !a.is_named(&self.attribute.name)),
        }
    }

    /// Undo this change going backwards in time.
    pub fn undo(&self, attributes: &mut Vec<AttributeRef>) {
        match self.op {
            ChangeType::Add => attributes.retain(|a| !a.is_named(&self.attribute.name)),
            ChangeType::Remove => push_unique(attributes, self.attribute.clone()),
        }
    }
}

fn push_unique(attributes: &mut Vec<AttributeRef>, attribute: AttributeRef) {
    if !attributes.iter().any(|a| a.is_named(&attribute.name)) {
        attributes.push(attribute);
    }
}

/// Rebuild the attribute set that was live at `target`.
///
/// `current` is the set at `current_version` and `history[i]` is the change
/// that moved the type from version `i + 1` to `i + 2`. Returns `None` when
/// `target` lies outside `[1, current_version]`.
pub fn reconstruct(
    current: &[AttributeRef],
    history: &[AttributeChange],
    current_version: u32,
    target: i64,
) -> Option<Vec<AttributeRef>> {
    if target < 1 || target > current_version as i64 {
        return None;
    }
    let undo_from = (target - 1) as usize;
    let mut attributes = current.to_vec();
    for change in history.get(undo_from..).unwrap_or(&[]).iter().rev() {
        change.undo(&mut attributes);
    }
    Some(attributes)
}

/// Replay `changes` forward on top of `base`.
pub fn replay(base: &[AttributeRef], changes: &[AttributeChange]) -> Vec<AttributeRef> {
    let mut attributes = base.to_vec();
    for change in changes {
        change.apply(&mut attributes);
    }
    attributes
}

/// A named asset definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct AssetTypeDef {
    pub name: String,
    pub attributes: Vec<AttributeRef>,
    pub version: u32,
    #[serde(rename = "changeHistory", default)]
    pub change_history: Vec<AttributeChange>,
    /// Distinguishes a definition from an earlier one removed under the same name
    #[serde(default)]
    pub generation: u32,
}

/// Structural edits made by one migration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Migration {
    pub added: Vec<AttributeRef>,
    pub removed: Vec<AttributeRef>,
}

impl Migration {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

impl AssetTypeDef {
    pub fn new(name: impl Into<String>, attributes: Vec<AttributeRef>) -> Self {
        let mut unique = Vec::with_capacity(attributes.len());
        for attribute in attributes {
            push_unique(&mut unique, attribute);
        }
        Self {
            name: name.into(),
            attributes: unique,
            version: 1,
            change_history: Vec::new(),
            generation: 0,
        }
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a.is_named(name))
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeRef> {
        self.attributes.iter().find(|a| a.is_named(name))
    }

    /// Add one attribute. No-op when an attribute of that name is present.
    pub fn add_attribute(&mut self, attribute: AttributeRef) -> bool {
        if self.has_attribute(&attribute.name) {
            return false;
        }
        self.attributes.push(attribute.clone());
        self.change_history.push(AttributeChange::add(attribute));
        self.version += 1;
        true
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<AttributeRef> {
        let index = self.attributes.iter().position(|a| a.is_named(name))?;
        let removed = self.attributes.remove(index);
        self.change_history
            .push(AttributeChange::remove(removed.clone()));
        self.version += 1;
        Some(removed)
    }

    /// Move to exactly `requested`: removals first (in current order), then
    /// additions (in request order), one version per edit.
    pub fn migrate(&mut self, requested: &[AttributeRef]) -> Migration {
        let mut migration = Migration::default();

        let stale: Vec<String> = self
            .attributes
            .iter()
            .filter(|a| !requested.iter().any(|r| r.is_named(&a.name)))
            .map(|a| a.name.clone())
            .collect();
        for name in stale {
            if let Some(removed) = self.remove_attribute(&name) {
                migration.removed.push(removed);
            }
        }

        for attribute in requested {
            if self.add_attribute(attribute.clone()) {
                migration.added.push(attribute.clone());
            }
        }
        migration
    }

    /// Swap in a newer reference to an attribute already in the current set.
    ///
    /// Not a structural change: version and history are untouched.
    pub fn replace_reference(&mut self, attribute: &AttributeRef) -> bool {
        match self.attributes.iter_mut().find(|a| a.is_named(&attribute.name)) {
            Some(existing) => {
                *existing = attribute.clone();
                true
            }
            None => false,
        }
    }

    pub fn attributes_at(&self, version: i64) -> Result<Vec<AttributeRef>, ProvenanceError> {
        reconstruct(&self.attributes, &self.change_history, self.version, version).ok_or_else(
            || ProvenanceError::VersionOutOfRange {
                name: self.name.clone(),
                requested: version,
                current: self.version,
            },
        )
    }
}

/// All asset types, in definition order, looked up case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetTypeCatalog {
    definitions: Vec<AssetTypeDef>,
}

impl AssetTypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&AssetTypeDef> {
        self.definitions
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut AssetTypeDef> {
        self.definitions
            .iter_mut()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetTypeDef> {
        self.definitions.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AssetTypeDef> {
        self.definitions.iter_mut()
    }

    pub fn insert(&mut self, definition: AssetTypeDef) {
        self.definitions.push(definition);
    }

    pub fn remove(&mut self, name: &str) -> Option<AssetTypeDef> {
        let index = self
            .definitions
            .iter()
            .position(|d| d.name.eq_ignore_ascii_case(name))?;
        Some(self.definitions.remove(index))
    }

    pub fn attributes_at(
        &self,
        name: &str,
        version: i64,
    ) -> Result<Vec<AttributeRef>, ProvenanceError> {
        self.get(name)
            .ok_or_else(|| ProvenanceError::not_found("asset type", name))?
            .attributes_at(version)
    }
}
