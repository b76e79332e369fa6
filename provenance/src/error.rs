//! Error types for provenance operations.

use serde::Serialize;

use crate::ledger::LedgerError;
use crate::types::AttributeDataType;

/// Coarse classification of a failure, independent of its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    ValidationFailed,
    AuthorizationFailed,
    RuleViolation,
    InvariantViolation,
    /// A stored record no longer decodes into its expected shape
    Corrupted,
    /// The ledger itself failed
    Storage,
}

/// A raw value that did not parse into its declared type.
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidValue {
    pub attribute: String,
    pub data_type: AttributeDataType,
    pub value: String,
    pub reason: String,
}

impl std::fmt::Display for InvalidValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {:?} is not a valid {} ({})",
            self.attribute, self.value, self.data_type, self.reason
        )
    }
}

/// Error types for provenance operations.
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    /// Key, attribute, asset type, unit or registry absent
    #[error("The {what} {name} does not exist")]
    NotFound { what: &'static str, name: String },

    #[error("The {what} {name} already exists")]
    AlreadyExists { what: &'static str, name: String },

    /// Names that are not defined where they were used
    #[error("{}", name_list(.0, "not defined"))]
    UndefinedAttributes(Vec<String>),

    /// Required attributes supplied in neither the public nor the private set
    #[error("{}", name_list(.0, "missing"))]
    MissingAttributes(Vec<String>),

    /// Attributes supplied more than once, or both publicly and privately
    #[error("{}", name_list(.0, "supplied more than once or as both public and private"))]
    DuplicateAttributes(Vec<String>),

    #[error("Parsing error: {}", value_list(.0))]
    InvalidValues(Vec<InvalidValue>),

    #[error("Version {requested} of {name} does not exist (current version is {current})")]
    VersionOutOfRange {
        name: String,
        requested: i64,
        current: u32,
    },

    /// Any other malformed input
    #[error("{0}")]
    Invalid(String),

    #[error("You ({caller}) are not the actual owner of {key}")]
    NotOwner { caller: String, key: String },

    #[error("You ({caller}) are not the receiver of {key}")]
    NotReceiver { caller: String, key: String },

    #[error("Acceptance rule violated: {attribute} = {value} does not satisfy {condition}")]
    RuleViolation {
        attribute: String,
        value: String,
        condition: String,
    },

    #[error(
        "Acceptance rule requires {attribute} to satisfy {condition} but the asset has no such attribute"
    )]
    RuleAttributeMissing { attribute: String, condition: String },

    #[error("The amount of {key} would drop below zero ({resulting})")]
    NegativeQuantity { key: String, resulting: f64 },

    #[error("The amount of {key} would exceed the representable range")]
    QuantityOverflow { key: String },

    #[error("Stored record {key} is corrupted: {source}")]
    Corrupted {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Record {key} could not be encoded: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl ProvenanceError {
    pub fn not_found(what: &'static str, name: impl Into<String>) -> Self {
        Self::NotFound {
            what,
            name: name.into(),
        }
    }

    pub fn already_exists(what: &'static str, name: impl Into<String>) -> Self {
        Self::AlreadyExists {
            what,
            name: name.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::UndefinedAttributes(_)
            | Self::MissingAttributes(_)
            | Self::DuplicateAttributes(_)
            | Self::InvalidValues(_)
            | Self::VersionOutOfRange { .. }
            | Self::Invalid(_) => ErrorKind::ValidationFailed,
            Self::NotOwner { .. } | Self::NotReceiver { .. } => ErrorKind::AuthorizationFailed,
            Self::RuleViolation { .. } | Self::RuleAttributeMissing { .. } => {
                ErrorKind::RuleViolation
            }
            Self::NegativeQuantity { .. } | Self::QuantityOverflow { .. } => {
                ErrorKind::InvariantViolation
            }
            Self::Corrupted { .. } | Self::Encode { .. } => ErrorKind::Corrupted,
            Self::Ledger(LedgerError::AccessDenied { .. }) => ErrorKind::AuthorizationFailed,
            Self::Ledger(_) => ErrorKind::Storage,
        }
    }

    /// Whether the failure is the caller's doing rather than a defect in the
    /// stored data or the host.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Corrupted | ErrorKind::Storage)
    }
}

fn value_list(values: &[InvalidValue]) -> String {
    values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn name_list(names: &[String], state: &str) -> String {
    match names {
        [single] => format!("The attribute {} is {}", single, state),
        _ => format!("The attributes {} are {}", names.join(", "), state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_messages_list_every_name() {
        let single = ProvenanceError::UndefinedAttributes(vec!["Color".into()]);
        assert_eq!(single.to_string(), "The attribute Color is not defined");

        let many = ProvenanceError::UndefinedAttributes(vec!["Color".into(), "Weight".into()]);
        assert_eq!(many.to_string(), "The attributes Color, Weight are not defined");
        assert_eq!(many.kind(), ErrorKind::ValidationFailed);
    }

    #[test]
    fn test_kinds() {
        let err = ProvenanceError::NotOwner {
            caller: "Org2MSP".into(),
            key: "milk1".into(),
        };
        assert_eq!(err.kind(), ErrorKind::AuthorizationFailed);

        let denied = ProvenanceError::from(LedgerError::AccessDenied {
            collection: "CollectionOne".into(),
            caller: "Org3MSP".into(),
        });
        assert_eq!(denied.kind(), ErrorKind::AuthorizationFailed);
        assert!(denied.is_recoverable());

        let corrupt = ProvenanceError::Corrupted {
            key: "milk1".into(),
            source: serde_json::from_str::<u32>("{").unwrap_err(),
        };
        assert_eq!(corrupt.kind(), ErrorKind::Corrupted);
        assert!(!corrupt.is_recoverable());
    }
}
