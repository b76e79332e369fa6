//! The `{status, response}` envelope every entry point returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, warn};

use crate::error::ProvenanceError;

pub const STATUS_OK: &str = "200";
pub const STATUS_REJECTED: &str = "400";
pub const STATUS_INTERNAL: &str = "500";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub status: String,
    pub response: Value,
}

impl Envelope {
    pub fn success(response: impl Into<Value>) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            response: response.into(),
        }
    }

    pub fn message(status: &str, message: impl Into<String>) -> Self {
        Self {
            status: status.to_string(),
            response: Value::String(message.into()),
        }
    }

    /// Wrap an error. Corruption and storage failures get `500` so they are
    /// never read as a business rejection.
    pub fn from_error(err: &ProvenanceError) -> Self {
        if err.is_recoverable() {
            warn!(kind = ?err.kind(), error = %err, "request rejected");
            Self::message(STATUS_REJECTED, err.to_string())
        } else {
            error!(kind = ?err.kind(), error = %err, "request failed");
            Self::message(STATUS_INTERNAL, err.to_string())
        }
    }

    pub fn from_result<T: Serialize>(result: Result<T, ProvenanceError>) -> Self {
        match result {
            Ok(value) => match serde_json::to_value(value) {
                Ok(value) => Self::success(value),
                Err(e) => Self::message(
                    STATUS_INTERNAL,
                    format!("Response could not be encoded: {}", e),
                ),
            },
            Err(err) => Self::from_error(&err),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"status":"{}","response":null}}"#, STATUS_INTERNAL)
        })
    }
}
