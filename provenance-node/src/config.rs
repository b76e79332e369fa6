//! Configuration for provenance-node

use std::path::{Path, PathBuf};

use provenance::ContractConfig;
use serde::{Deserialize, Serialize};

use crate::error::NodeError;

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("provenance-node")
}

/// A private data collection and the organisations allowed to read it.
///
/// Collections not listed here are readable by every caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub name: String,
    #[serde(default)]
    pub members: Vec<String>,
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the ledger database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Organisation identity invocations run as
    #[serde(default = "default_caller")]
    pub caller: String,

    /// Collection used for acceptance rules when an invocation names none
    #[serde(default)]
    pub acceptance_collection: Option<String>,

    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

fn default_caller() -> String {
    "Org1MSP".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            caller: default_caller(),
            acceptance_collection: None,
            collections: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, NodeError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), NodeError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Ledger database path
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.sled")
    }

    pub fn contract_config(&self) -> ContractConfig {
        ContractConfig {
            acceptance_collection: self.acceptance_collection.clone(),
            ..ContractConfig::default()
        }
    }
}
