//! Constants used in the deploy scripts

/// The name of the liquidation implementation (logic) contract
pub const LOGIC_CONTRACT_NAME: &str = "NFTLiquidationG1";

/// The name of the liquidation proxy contract
pub const PROXY_CONTRACT_NAME: &str = "NFTLiquidationProxy";

/// The functions the deploy routine calls on the implementation contract,
/// through the proxy or directly
pub const LOGIC_REQUIRED_FUNCTIONS: [&str; 10] = [
    "_become",
    "initialize",
    "comptroller",
    "_setComptroller",
    "oEther",
    "setOEther",
    "protocolFeeRecipient",
    "setProtocolFeeRecipient",
    "protocolFeeMantissa",
    "setProtocolFeeMantissa",
];

/// The optional view reporting whether the implementation has been
/// initialized
pub const INITIALIZED_FUNCTION: &str = "initialized";

/// The functions the deploy routine calls on the proxy contract
pub const PROXY_REQUIRED_FUNCTIONS: [&str; 3] = [
    "nftLiquidationImplementation",
    "pendingNFTLiquidationImplementation",
    "_setPendingImplementation",
];

/// The default protocol fee mantissa, 10% scaled by 1e18
pub const DEFAULT_PROTOCOL_FEE_MANTISSA: u128 = 100_000_000_000_000_000;

/// The network used when none is given on the command line
pub const DEFAULT_NETWORK: &str = "localhost";

/// The RPC URL of a local development node
pub const LOCALHOST_RPC_URL: &str = "http://localhost:8545";

/// The gas multiplier applied on public networks
pub const PUBLIC_NETWORK_GAS_MULTIPLIER: f64 = 5.0;

/// The number of confirmations to wait for each transaction
pub const NUM_TX_CONFIRMATIONS: u64 = 1;

/// The number of seconds to wait for a transaction receipt before giving up
pub const TX_TIMEOUT_SECS: u64 = 600;

/// The default path of the project configuration file
pub const DEFAULT_CONFIG_PATH: &str = "deploy.config.json";

/// The default path of the deployments file
pub const DEFAULT_DEPLOYMENTS_PATH: &str = "deployments.json";

/// The default directory containing the Solidity sources
pub const DEFAULT_SOURCES_DIR: &str = "contracts";

/// The default directory compilation artifacts are written to and read from
pub const DEFAULT_ARTIFACTS_DIR: &str = "artifacts";

/// The Solidity compiler versions configured by default
pub const DEFAULT_COMPILER_VERSIONS: [&str; 3] = ["0.4.11", "0.5.17", "0.6.12"];

/// The default number of optimizer runs
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

/// The prefix of versioned `solc` binaries, as installed by `svm`
pub const SOLC_BINARY_PREFIX: &str = "solc-";

/// The extension of Solidity source files
pub const SOLIDITY_EXTENSION: &str = "sol";

/// The extension of compilation artifacts
pub const ARTIFACT_EXTENSION: &str = "json";

/// The outputs requested from `solc --combined-json`
pub const SOLC_COMBINED_OUTPUTS: &str = "abi,bin";

/// The key under which `solc --combined-json` nests its contracts
pub const SOLC_CONTRACTS_KEY: &str = "contracts";

/// The keyword introducing a Solidity version pragma
pub const PRAGMA_SOLIDITY: &str = "pragma solidity";
