//! The deployment record store, persisted as the `deployments.json` file
//!
//! Records are keyed by network name, then by contract name.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use alloy_primitives::{Address, TxHash, B256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ScriptError;

/// A contract deployment previously made by the scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    /// The address the contract was deployed to
    pub address: Address,
    /// The keccak256 hash of the creation code the contract was deployed from
    pub bytecode_hash: B256,
    /// The hash of the deployment transaction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<TxHash>,
}

/// The deployment records of all networks, backed by a JSON file
#[derive(Debug)]
pub struct DeploymentStore {
    /// The file the records are persisted to
    path: PathBuf,
    /// The records, keyed by network then contract name
    records: BTreeMap<String, BTreeMap<String, DeploymentRecord>>,
}

impl DeploymentStore {
    /// Open the store at the given path, starting empty if the file does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            debug!("no deployments file at {}, starting empty", path.display());
            return Ok(Self {
                path,
                records: BTreeMap::new(),
            });
        }

        let contents =
            fs::read_to_string(&path).map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;
        let records = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ReadDeployments(e.to_string()))?;

        Ok(Self { path, records })
    }

    /// The recorded deployment of a contract on a network, if any
    pub fn get(&self, network: &str, contract: &str) -> Option<&DeploymentRecord> {
        self.records.get(network)?.get(contract)
    }

    /// Record a deployment, replacing any previous record for the contract
    pub fn insert(&mut self, network: &str, contract: &str, record: DeploymentRecord) {
        self.records
            .entry(network.to_string())
            .or_default()
            .insert(contract.to_string(), record);
    }

    /// All recorded deployments on a network
    pub fn network(&self, network: &str) -> impl Iterator<Item = (&str, &DeploymentRecord)> {
        self.records
            .get(network)
            .into_iter()
            .flat_map(|contracts| contracts.iter().map(|(name, r)| (name.as_str(), r)))
    }

    /// Persist the records to disk
    pub fn save(&self) -> Result<(), ScriptError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        }

        let contents = serde_json::to_string_pretty(&self.records)
            .map_err(|e| ScriptError::WriteDeployments(e.to_string()))?;
        fs::write(&self.path, contents).map_err(|e| ScriptError::WriteDeployments(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn record(byte: u8) -> DeploymentRecord {
        DeploymentRecord {
            address: Address::with_last_byte(byte),
            bytecode_hash: B256::with_last_byte(byte),
            tx_hash: None,
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let store = DeploymentStore::open(dir.join("deployments.json")).unwrap();
        assert!(store.get("localhost", "NFTLiquidationG1").is_none());
        assert_eq!(store.network("localhost").count(), 0);
    }

    #[test]
    fn test_records_persist_per_network() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let path = dir.join("nested").join("deployments.json");

        let mut store = DeploymentStore::open(&path).unwrap();
        store.insert("localhost", "NFTLiquidationG1", record(1));
        store.insert("goerli", "NFTLiquidationG1", record(2));
        store.insert("localhost", "NFTLiquidationG1", record(3));
        store.save().unwrap();

        let reopened = DeploymentStore::open(&path).unwrap();
        assert_eq!(reopened.get("localhost", "NFTLiquidationG1"), Some(&record(3)));
        assert_eq!(reopened.get("goerli", "NFTLiquidationG1"), Some(&record(2)));
        assert!(reopened.get("mainnet", "NFTLiquidationG1").is_none());
        assert_eq!(reopened.network("localhost").count(), 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        let path = dir.join("deployments.json");
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            DeploymentStore::open(&path),
            Err(ScriptError::ReadDeployments(_))
        ));
    }
}
