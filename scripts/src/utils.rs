//! Utilities for the deploy scripts.

use std::{
    fs,
    path::{Path, PathBuf},
    process::{Command, Stdio},
    str::FromStr,
};

use alloy::{
    network::EthereumWallet,
    providers::{DynProvider, Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    transports::http::reqwest::Url,
};
use alloy_primitives::Address;
use tracing::info;

use crate::{constants::SOLIDITY_EXTENSION, errors::ScriptError};

/// Sets up the client with which to talk to the target network, reading in
/// the private key & RPC url.
///
/// Returns the provider, with the signer attached as its wallet, and the
/// signer's address.
pub async fn setup_client(
    priv_key: &str,
    rpc_url: &str,
) -> Result<(DynProvider, Address), ScriptError> {
    let url = Url::parse(rpc_url).map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let signer = PrivateKeySigner::from_str(priv_key)
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    let deployer = signer.address();

    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .on_http(url);
    let provider = DynProvider::new(provider);

    let chain_id = provider
        .get_chain_id()
        .await
        .map_err(|e| ScriptError::ClientInitialization(e.to_string()))?;
    info!("connected to chain {chain_id} as {deployer:#x}");

    Ok((provider, deployer))
}

/// Scale a gas estimate by the network's gas multiplier, rounding up
pub fn scale_gas(estimate: u64, multiplier: f64) -> u64 {
    (estimate as f64 * multiplier).ceil() as u64
}

/// Run a command to completion, capturing its standard output.
///
/// Standard error is forwarded to the terminal.
pub fn command_output_or(mut cmd: Command, err_msg: &str) -> Result<Vec<u8>, ScriptError> {
    cmd.stderr(Stdio::inherit());
    let output = cmd
        .output()
        .map_err(|e| ScriptError::ContractCompilation(format!("{err_msg}: {e}")))?;

    if !output.status.success() {
        return Err(ScriptError::ContractCompilation(format!(
            "{err_msg}: {}",
            output.status
        )));
    }

    Ok(output.stdout)
}

/// Recursively collect the Solidity source files under a directory, in a
/// stable order
pub fn find_sources(dir: &Path) -> Result<Vec<PathBuf>, ScriptError> {
    let mut sources = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir)
            .map_err(|e| ScriptError::ContractCompilation(format!("{}: {e}", dir.display())))?;
        for entry in entries {
            let path = entry
                .map_err(|e| ScriptError::ContractCompilation(e.to_string()))?
                .path();
            if path.is_dir() {
                pending.push(path);
            } else if path.extension().is_some_and(|ext| ext == SOLIDITY_EXTENSION) {
                sources.push(path);
            }
        }
    }

    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_scale_gas() {
        assert_eq!(scale_gas(21_000, 1.0), 21_000);
        assert_eq!(scale_gas(21_000, 5.0), 105_000);
        assert_eq!(scale_gas(3, 1.5), 5);
    }

    #[test]
    fn test_find_sources_recurses_and_sorts() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        fs::create_dir_all(dir.join("proxy")).unwrap();
        fs::write(dir.join("NFTLiquidationG1.sol"), "").unwrap();
        fs::write(dir.join("proxy").join("NFTLiquidationProxy.sol"), "").unwrap();
        fs::write(dir.join("README.md"), "").unwrap();

        let sources = find_sources(dir).unwrap();
        assert_eq!(
            sources,
            vec![
                dir.join("NFTLiquidationG1.sol"),
                dir.join("proxy").join("NFTLiquidationProxy.sol"),
            ]
        );
    }

    #[test]
    fn test_missing_sources_dir() {
        let temp = tempdir().unwrap();
        let dir = temp.path();
        assert!(find_sources(&dir.join("contracts")).is_err());
    }
}
