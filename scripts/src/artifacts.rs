//! Loading and writing of contract compilation artifacts
//!
//! Artifacts are JSON files named `<ContractName>.json` holding at least the
//! contract ABI and its creation bytecode, in the layout produced by the
//! `compile` command and by common Solidity toolchains.

use std::{
    fs,
    path::{Path, PathBuf},
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::{keccak256, Bytes, B256};
use serde::{Deserialize, Serialize};

use crate::{constants::ARTIFACT_EXTENSION, errors::ScriptError};

/// A compiled contract
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// The name of the contract
    pub contract_name: String,
    /// The source file the contract was compiled from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    /// The contract ABI
    pub abi: JsonAbi,
    /// The creation bytecode, hex encoded
    pub bytecode: String,
}

impl Artifact {
    /// The path of a contract's artifact within the artifacts directory
    pub fn path(dir: &Path, contract_name: &str) -> PathBuf {
        dir.join(contract_name).with_extension(ARTIFACT_EXTENSION)
    }

    /// Load a contract's artifact from the artifacts directory
    pub fn load(dir: &Path, contract_name: &str) -> Result<Self, ScriptError> {
        let path = Self::path(dir, contract_name);
        let contents = fs::read_to_string(&path)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;
        let artifact: Artifact = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", path.display())))?;

        if artifact.contract_name != contract_name {
            return Err(ScriptError::ArtifactParsing(format!(
                "{} holds `{}`, expected `{contract_name}`",
                path.display(),
                artifact.contract_name
            )));
        }

        Ok(artifact)
    }

    /// Write the artifact into the artifacts directory
    pub fn write(&self, dir: &Path) -> Result<PathBuf, ScriptError> {
        fs::create_dir_all(dir).map_err(|e| ScriptError::WriteArtifact(e.to_string()))?;

        let path = Self::path(dir, &self.contract_name);
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ScriptError::WriteArtifact(e.to_string()))?;
        fs::write(&path, contents).map_err(|e| ScriptError::WriteArtifact(e.to_string()))?;

        Ok(path)
    }

    /// The decoded creation bytecode
    ///
    /// Errors if the bytecode is empty, as for interfaces and abstract contracts,
    /// or still contains unlinked library placeholders
    pub fn creation_code(&self) -> Result<Bytes, ScriptError> {
        let hex_code = self.bytecode.trim().trim_start_matches("0x");
        if hex_code.is_empty() {
            return Err(ScriptError::ArtifactParsing(format!(
                "`{}` has no bytecode, it cannot be deployed",
                self.contract_name
            )));
        }
        if hex_code.contains("__") {
            return Err(ScriptError::ArtifactParsing(format!(
                "`{}` has unlinked library references",
                self.contract_name
            )));
        }

        hex::decode(hex_code)
            .map(Bytes::from)
            .map_err(|e| ScriptError::ArtifactParsing(format!("{}: {e}", self.contract_name)))
    }

    /// The keccak256 hash of the creation bytecode
    pub fn bytecode_hash(&self) -> Result<B256, ScriptError> {
        Ok(keccak256(self.creation_code()?))
    }

    /// Ensure the ABI exposes every one of the given functions
    pub fn require_functions(&self, names: &[&str]) -> Result<(), ScriptError> {
        let missing: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| self.abi.function(name).is_none())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ScriptError::ArtifactParsing(format!(
                "`{}` is missing functions: {}",
                self.contract_name,
                missing.join(", ")
            )))
        }
    }
}
