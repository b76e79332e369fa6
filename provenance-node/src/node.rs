//! One contract instance bound to the local ledger.

use provenance::{dispatch, Envelope, Invocation, ProvenanceContract};
use tracing::info;

use crate::config::Config;
use crate::error::NodeError;
use crate::sled_ledger::SledLedger;

pub struct ProvenanceNode {
    contract: ProvenanceContract,
    ledger: SledLedger,
}

impl ProvenanceNode {
    /// Open the ledger under `config.data_dir` with the configured
    /// identity and collection membership.
    pub fn open(config: &Config) -> Result<Self, NodeError> {
        std::fs::create_dir_all(&config.data_dir)?;
        let mut ledger = SledLedger::open(config.ledger_path(), config.caller.as_str())?;
        for collection in &config.collections {
            ledger.restrict_collection(collection);
        }
        Ok(Self {
            contract: ProvenanceContract::new(config.contract_config()),
            ledger,
        })
    }

    pub fn ledger(&self) -> &SledLedger {
        &self.ledger
    }

    pub fn set_caller(&mut self, caller: impl Into<String>) {
        self.ledger.set_caller(caller);
    }

    /// Dispatch one invocation and flush the ledger.
    ///
    /// A rejected invocation still returns `Ok`; only host failures are errors.
    pub fn invoke(&mut self, invocation: &Invocation) -> Result<Envelope, NodeError> {
        let envelope = dispatch(&self.contract, &mut self.ledger, invocation);
        self.ledger.flush()?;
        info!(
            function = %invocation.function,
            status = %envelope.status,
            "Invocation finished"
        );
        Ok(envelope)
    }
}

/// Parse a `name=value` transient argument.
pub fn parse_transient(raw: &str) -> Result<(String, String), NodeError> {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.to_string()))
        }
        _ => Err(NodeError::Transient(raw.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_transient() {
        assert_eq!(
            parse_transient("Price=0.42").unwrap(),
            ("Price".to_string(), "0.42".to_string())
        );
        assert_eq!(parse_transient("Note=a=b").unwrap().1, "a=b");
        assert!(parse_transient("Price").is_err());
        assert!(parse_transient("=1").is_err());
    }
}
