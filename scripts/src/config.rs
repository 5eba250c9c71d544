//! The static configuration table: target networks, known contract
//! addresses per network, and the Solidity compilers to build with

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    constants::{
        DEFAULT_ARTIFACTS_DIR, DEFAULT_COMPILER_VERSIONS, DEFAULT_DEPLOYMENTS_PATH,
        DEFAULT_NETWORK, DEFAULT_OPTIMIZER_RUNS, DEFAULT_PROTOCOL_FEE_MANTISSA,
        DEFAULT_SOURCES_DIR, LOCALHOST_RPC_URL, NUM_TX_CONFIRMATIONS,
        PUBLIC_NETWORK_GAS_MULTIPLIER, SOLC_BINARY_PREFIX, TX_TIMEOUT_SECS,
    },
    errors::ScriptError,
    pragma::SolcVersion,
};

/// The full project configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// The network used when none is selected on the command line
    pub default_network: String,
    /// The known networks, keyed by name
    pub networks: BTreeMap<String, NetworkConfig>,
    /// The Solidity compilers available to the `compile` command
    pub compilers: Vec<CompilerConfig>,
    /// Filesystem locations used by the scripts
    pub paths: PathsConfig,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        let public = |name: &str| {
            (
                name.to_string(),
                NetworkConfig {
                    gas_multiplier: PUBLIC_NETWORK_GAS_MULTIPLIER,
                    ..Default::default()
                },
            )
        };

        let localhost = (
            DEFAULT_NETWORK.to_string(),
            NetworkConfig {
                url: Some(LOCALHOST_RPC_URL.to_string()),
                ..Default::default()
            },
        );

        Self {
            default_network: DEFAULT_NETWORK.to_string(),
            networks: [localhost, public("goerli"), public("mainnet")]
                .into_iter()
                .collect(),
            compilers: DEFAULT_COMPILER_VERSIONS
                .iter()
                .map(|version| CompilerConfig {
                    version: version.to_string(),
                    optimizer: OptimizerConfig::default(),
                    path: None,
                })
                .collect(),
            paths: PathsConfig::default(),
        }
    }
}

impl ProjectConfig {
    /// Load the configuration from the given JSON file, falling back to the
    /// built-in defaults if the file does not exist
    pub fn load(path: &Path) -> Result<Self, ScriptError> {
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| ScriptError::Config(format!("{}: {e}", path.display())))?;
        let config: ProjectConfig = serde_json::from_str(&contents)
            .map_err(|e| ScriptError::Config(format!("{}: {e}", path.display())))?;

        config.validate()?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    /// Check every network's settings are usable
    pub fn validate(&self) -> Result<(), ScriptError> {
        for (name, network) in &self.networks {
            network
                .validate()
                .map_err(|e| ScriptError::Config(format!("network `{name}`: {e}")))?;
        }
        Ok(())
    }

    /// Look up a network by name
    pub fn network(&self, name: &str) -> Result<&NetworkConfig, ScriptError> {
        self.networks
            .get(name)
            .ok_or_else(|| ScriptError::Config(format!("unknown network `{name}`")))
    }
}

/// Settings for a single target network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// The RPC URL of the network; when absent the URL must be given on the
    /// command line or through the environment
    pub url: Option<String>,
    /// The factor applied to the node's gas estimate for every transaction
    pub gas_multiplier: f64,
    /// The number of confirmations to wait for each transaction
    pub confirmations: u64,
    /// How long to wait for a transaction receipt, in seconds
    pub tx_timeout_secs: u64,
    /// Contracts already deployed on this network
    pub contracts: KnownContracts,
    /// The desired protocol fee recipient, defaults to the deployer
    pub fee_recipient: Option<Address>,
    /// The desired protocol fee mantissa, as a decimal or `0x` string
    pub protocol_fee_mantissa: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            url: None,
            gas_multiplier: 1.0,
            confirmations: NUM_TX_CONFIRMATIONS,
            tx_timeout_secs: TX_TIMEOUT_SECS,
            contracts: KnownContracts::default(),
            fee_recipient: None,
            protocol_fee_mantissa: None,
        }
    }
}

impl NetworkConfig {
    /// Check the network's settings are usable; gas estimates may only be
    /// scaled up
    pub fn validate(&self) -> Result<(), ScriptError> {
        if !self.gas_multiplier.is_finite() || self.gas_multiplier < 1.0 {
            return Err(ScriptError::Config(format!(
                "gas_multiplier must be a finite number of at least 1, got {}",
                self.gas_multiplier
            )));
        }
        Ok(())
    }

    /// Resolve the RPC URL, preferring the one given on the command line
    pub fn resolve_url(&self, cli_url: Option<&str>) -> Result<String, ScriptError> {
        cli_url
            .map(str::to_string)
            .or_else(|| self.url.clone())
            .ok_or_else(|| {
                ScriptError::Config("no RPC URL configured, set `--rpc-url` or RPC_URL".to_string())
            })
    }

    /// The timeout to apply when waiting for transaction receipts
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }

    /// The desired protocol fee mantissa
    pub fn protocol_fee_mantissa(&self) -> Result<U256, ScriptError> {
        match &self.protocol_fee_mantissa {
            Some(s) => U256::from_str(s.trim())
                .map_err(|e| ScriptError::Config(format!("invalid fee mantissa `{s}`: {e}"))),
            None => Ok(U256::from(DEFAULT_PROTOCOL_FEE_MANTISSA)),
        }
    }
}

/// Addresses of contracts already deployed on a network
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnownContracts {
    /// The liquidation proxy; when set, no proxy is deployed
    pub proxy: Option<Address>,
    /// The comptroller; when unset, the proxy is left unconfigured
    pub comptroller: Option<Address>,
    /// The oEther token market
    pub o_ether: Option<Address>,
}

/// A Solidity compiler and its settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// The compiler version, e.g. `0.5.17`
    pub version: String,
    /// The optimizer settings
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    /// An explicit path to the compiler binary
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl CompilerConfig {
    /// The parsed compiler version
    pub fn solc_version(&self) -> Result<SolcVersion, ScriptError> {
        self.version.parse()
    }

    /// The compiler binary to invoke, `solc-<version>` unless configured
    pub fn binary(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("{SOLC_BINARY_PREFIX}{}", self.version)))
    }
}

/// Optimizer settings for a compiler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Whether the optimizer is enabled
    pub enabled: bool,
    /// The number of runs to optimize for
    pub runs: u32,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            runs: DEFAULT_OPTIMIZER_RUNS,
        }
    }
}

/// Filesystem locations used by the scripts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The directory containing the Solidity sources
    pub sources: PathBuf,
    /// The directory compilation artifacts are written to
    pub artifacts: PathBuf,
    /// The deployments record file
    pub deployments: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            sources: PathBuf::from(DEFAULT_SOURCES_DIR),
            artifacts: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
            deployments: PathBuf::from(DEFAULT_DEPLOYMENTS_PATH),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_default_table() {
        let config = ProjectConfig::default();
        assert_eq!(config.default_network, "localhost");

        let localhost = config.network("localhost").unwrap();
        assert_eq!(localhost.url.as_deref(), Some(LOCALHOST_RPC_URL));
        assert_eq!(localhost.gas_multiplier, 1.0);

        let mainnet = config.network("mainnet").unwrap();
        assert!(mainnet.url.is_none());
        assert_eq!(mainnet.gas_multiplier, 5.0);

        let versions: Vec<_> = config.compilers.iter().map(|c| c.version.as_str()).collect();
        assert_eq!(versions, ["0.4.11", "0.5.17", "0.6.12"]);
        assert!(config.compilers.iter().all(|c| c.optimizer.enabled && c.optimizer.runs == 200));
    }

    #[test]
    fn test_unknown_network() {
        assert!(ProjectConfig::default().network("sepolia").is_err());
    }

    #[test]
    fn test_resolve_url_prefers_cli() {
        let config = ProjectConfig::default();
        let localhost = config.network("localhost").unwrap();
        assert_eq!(
            localhost.resolve_url(Some("http://node:8545")).unwrap(),
            "http://node:8545"
        );
        assert_eq!(localhost.resolve_url(None).unwrap(), LOCALHOST_RPC_URL);
        assert!(config.network("goerli").unwrap().resolve_url(None).is_err());
    }

    #[test]
    fn test_partial_config_file() {
        let json = r#"{
            "networks": {
                "goerli": {
                    "gas_multiplier": 2.5,
                    "contracts": {
                        "proxy": "0x00000000000000000000000000000000000000aa",
                        "comptroller": "0x00000000000000000000000000000000000000bb"
                    },
                    "protocol_fee_mantissa": "50000000000000000"
                }
            },
            "compilers": [{ "version": "0.5.17" }]
        }"#;
        let config: ProjectConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.default_network, "localhost");
        assert_eq!(config.paths, PathsConfig::default());

        let goerli = config.network("goerli").unwrap();
        assert_eq!(goerli.gas_multiplier, 2.5);
        assert_eq!(goerli.confirmations, NUM_TX_CONFIRMATIONS);
        assert_eq!(
            goerli.contracts.proxy,
            Some(Address::with_last_byte(0xaa))
        );
        assert_eq!(goerli.contracts.o_ether, None);
        assert_eq!(
            goerli.protocol_fee_mantissa().unwrap(),
            U256::from(50_000_000_000_000_000u64)
        );

        let compiler = &config.compilers[0];
        assert_eq!(compiler.optimizer, OptimizerConfig::default());
        assert_eq!(compiler.binary(), PathBuf::from("solc-0.5.17"));
    }

    #[test]
    fn test_load_rejects_bad_gas_multiplier() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("deploy.config.json");

        for multiplier in ["0.5", "-2", "0"] {
            let json = format!(r#"{{ "networks": {{ "goerli": {{ "gas_multiplier": {multiplier} }} }} }}"#);
            fs::write(&path, json).unwrap();
            assert!(matches!(
                ProjectConfig::load(&path),
                Err(ScriptError::Config(_))
            ));
        }

        fs::write(&path, r#"{ "networks": { "goerli": { "gas_multiplier": 1.2 } } }"#).unwrap();
        let config = ProjectConfig::load(&path).unwrap();
        assert_eq!(config.network("goerli").unwrap().gas_multiplier, 1.2);

        let network = NetworkConfig {
            gas_multiplier: f64::NAN,
            ..Default::default()
        };
        assert!(network.validate().is_err());
        assert!(ProjectConfig::default().validate().is_ok());
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let config = ProjectConfig::load(&temp.path().join("deploy.config.json")).unwrap();
        assert_eq!(config, ProjectConfig::default());
    }

    #[test]
    fn test_fee_mantissa_default_and_hex() {
        let mut network = NetworkConfig::default();
        assert_eq!(
            network.protocol_fee_mantissa().unwrap(),
            U256::from(DEFAULT_PROTOCOL_FEE_MANTISSA)
        );

        network.protocol_fee_mantissa = Some("0x016345785d8a0000".to_string());
        assert_eq!(
            network.protocol_fee_mantissa().unwrap(),
            U256::from(DEFAULT_PROTOCOL_FEE_MANTISSA)
        );

        network.protocol_fee_mantissa = Some("ten percent".to_string());
        assert!(network.protocol_fee_mantissa().is_err());
    }
}
