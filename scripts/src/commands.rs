//! Implementations of the various deploy scripts

use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use alloy::json_abi::JsonAbi;
use alloy_primitives::{Address, TxHash};
use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::{
    artifacts::Artifact,
    chain::{
        initialization_state, InitializationCheck, InitializationState, LiquidationChain,
        RpcChain, Setting, SettingKind,
    },
    config::{CompilerConfig, NetworkConfig, ProjectConfig},
    constants::{
        LOGIC_CONTRACT_NAME, LOGIC_REQUIRED_FUNCTIONS, PROXY_CONTRACT_NAME,
        PROXY_REQUIRED_FUNCTIONS, SOLC_COMBINED_OUTPUTS, SOLC_CONTRACTS_KEY,
    },
    deployments::{DeploymentRecord, DeploymentStore},
    errors::ScriptError,
    pragma::{extract_pragma, SolcVersion, VersionReq},
    utils::{command_output_or, find_sources},
};

// ----------
// | Deploy |
// ----------

/// The compiled liquidation contracts
#[derive(Debug, Clone)]
pub struct LiquidationArtifacts {
    /// The implementation (logic) contract
    pub logic: Artifact,
    /// The proxy contract
    pub proxy: Artifact,
}

impl LiquidationArtifacts {
    /// Load both artifacts and check they expose the functions the deploy
    /// routine calls
    pub fn load(dir: &Path) -> Result<Self, ScriptError> {
        let logic = Artifact::load(dir, LOGIC_CONTRACT_NAME)?;
        logic.require_functions(&LOGIC_REQUIRED_FUNCTIONS)?;

        let proxy = Artifact::load(dir, PROXY_CONTRACT_NAME)?;
        proxy.require_functions(&PROXY_REQUIRED_FUNCTIONS)?;

        Ok(Self { logic, proxy })
    }

    /// How the implementation's initialization state is read
    pub fn initialization_check(&self) -> InitializationCheck {
        InitializationCheck::for_logic(&self.logic)
    }
}

/// A state change made by the deploy routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A contract was deployed
    Deployed {
        /// The name of the contract
        contract: String,
        /// The address it was deployed to
        address: Address,
    },
    /// The proxy was given a new pending implementation
    SetPendingImplementation(Address),
    /// The implementation accepted its role on the proxy
    Become(Address),
    /// The contract behind the proxy was initialized
    Initialize,
    /// A configuration value was updated
    UpdateSetting(Setting),
}

impl Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Deployed { contract, address } => write!(f, "deploy {contract} at {address:#x}"),
            Action::SetPendingImplementation(a) => write!(f, "_setPendingImplementation({a:#x})"),
            Action::Become(proxy) => write!(f, "_become({proxy:#x})"),
            Action::Initialize => write!(f, "initialize()"),
            Action::UpdateSetting(setting) => write!(f, "set {setting}"),
        }
    }
}

/// A transaction submitted by the deploy routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTx {
    /// What the transaction did
    pub action: Action,
    /// The transaction hash
    pub tx_hash: TxHash,
}

/// The outcome of a run of the deploy routine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentReport {
    /// The implementation contract address
    pub implementation: Address,
    /// The proxy contract address
    pub proxy: Address,
    /// The transactions submitted, in order
    pub transactions: Vec<SubmittedTx>,
}

impl DeploymentReport {
    /// The actions taken, in order
    pub fn actions(&self) -> Vec<&Action> {
        self.transactions.iter().map(|tx| &tx.action).collect()
    }
}

/// Ensure the liquidation proxy and implementation are deployed, wired
/// together and configured on the given network.
///
/// Every step reads the chain first and only submits a transaction if the
/// chain differs from the desired state, so running the routine again against
/// an unchanged chain submits nothing.
pub async fn upsert_liquidation<C: LiquidationChain>(
    chain: &C,
    store: &mut DeploymentStore,
    network_name: &str,
    network: &NetworkConfig,
    artifacts: &LiquidationArtifacts,
) -> Result<DeploymentReport, ScriptError> {
    let mut transactions = Vec::new();

    let implementation =
        ensure_deployed(chain, store, network_name, &artifacts.logic, &mut transactions).await?;

    let proxy = match network.contracts.proxy {
        Some(proxy) => {
            info!("using configured {PROXY_CONTRACT_NAME} at {proxy:#x}");
            proxy
        }
        None => {
            ensure_deployed(chain, store, network_name, &artifacts.proxy, &mut transactions)
                .await?
        }
    };

    wire_implementation(chain, implementation, proxy, &mut transactions).await?;

    match desired_settings(network, chain.deployer())? {
        Some(settings) => {
            let check = artifacts.initialization_check();
            configure(chain, proxy, check, &settings, &mut transactions).await?
        }
        None => info!("no comptroller configured for {network_name}, skipping configuration"),
    }

    info!(
        "{network_name}: {PROXY_CONTRACT_NAME} at {proxy:#x}, {LOGIC_CONTRACT_NAME} at \
         {implementation:#x}, {} transaction(s) submitted",
        transactions.len()
    );

    Ok(DeploymentReport {
        implementation,
        proxy,
        transactions,
    })
}

/// Deploy a contract unless the store records a deployment of the same
/// bytecode that still has code on chain
async fn ensure_deployed<C: LiquidationChain>(
    chain: &C,
    store: &mut DeploymentStore,
    network_name: &str,
    artifact: &Artifact,
    transactions: &mut Vec<SubmittedTx>,
) -> Result<Address, ScriptError> {
    let name = artifact.contract_name.as_str();
    let bytecode_hash = artifact.bytecode_hash()?;

    if let Some(record) = store.get(network_name, name).cloned() {
        if record.bytecode_hash != bytecode_hash {
            info!("{name} bytecode changed since {:#x}, redeploying", record.address);
        } else if chain.code_at(record.address).await?.is_empty() {
            warn!("no code at recorded {name} address {:#x}, redeploying", record.address);
        } else {
            info!("reusing {name} at {:#x}", record.address);
            return Ok(record.address);
        }
    }

    let deployed = chain.deploy(artifact.creation_code()?).await?;
    info!("deployed {name} at {:#x}", deployed.address);

    // Persist immediately so that a failure later in the run does not lose
    // track of the contract
    store.insert(
        network_name,
        name,
        DeploymentRecord {
            address: deployed.address,
            bytecode_hash,
            tx_hash: Some(deployed.tx_hash),
        },
    );
    store.save()?;

    transactions.push(SubmittedTx {
        action: Action::Deployed {
            contract: name.to_string(),
            address: deployed.address,
        },
        tx_hash: deployed.tx_hash,
    });

    Ok(deployed.address)
}

/// Point the proxy at the implementation, proposing it as pending first if
/// it is not pending already
async fn wire_implementation<C: LiquidationChain>(
    chain: &C,
    implementation: Address,
    proxy: Address,
    transactions: &mut Vec<SubmittedTx>,
) -> Result<(), ScriptError> {
    let current = chain.implementation(proxy).await?;
    if current == implementation {
        debug!("{proxy:#x} already delegates to {implementation:#x}");
        return Ok(());
    }

    info!("switching {proxy:#x} from {current:#x} to {implementation:#x}");
    if chain.pending_implementation(proxy).await? != implementation {
        let tx_hash = chain
            .set_pending_implementation(proxy, implementation)
            .await?;
        transactions.push(SubmittedTx {
            action: Action::SetPendingImplementation(implementation),
            tx_hash,
        });
    }

    let tx_hash = chain.become_implementation(implementation, proxy).await?;
    transactions.push(SubmittedTx {
        action: Action::Become(proxy),
        tx_hash,
    });

    Ok(())
}

/// The configuration the proxy should hold on a network, `None` if the
/// network has no comptroller to configure against
pub fn desired_settings(
    network: &NetworkConfig,
    deployer: Address,
) -> Result<Option<Vec<Setting>>, ScriptError> {
    let Some(comptroller) = network.contracts.comptroller else {
        return Ok(None);
    };

    Ok(Some(vec![
        Setting::Comptroller(comptroller),
        Setting::OEther(network.contracts.o_ether.unwrap_or_default()),
        Setting::ProtocolFeeRecipient(network.fee_recipient.unwrap_or(deployer)),
        Setting::ProtocolFeeMantissa(network.protocol_fee_mantissa()?),
    ]))
}

/// Initialize the contract behind the proxy if needed, then bring every
/// setting in line with its desired value
async fn configure<C: LiquidationChain>(
    chain: &C,
    proxy: Address,
    check: InitializationCheck,
    settings: &[Setting],
    transactions: &mut Vec<SubmittedTx>,
) -> Result<(), ScriptError> {
    if initialization_state(chain, proxy, check).await? == InitializationState::Uninitialized {
        info!("initializing {proxy:#x}");
        let tx_hash = chain.initialize(proxy).await?;
        transactions.push(SubmittedTx {
            action: Action::Initialize,
            tx_hash,
        });
    }

    for desired in settings {
        let current = chain.read_setting(proxy, desired.kind()).await?;
        if current == *desired {
            debug!("{desired} already set");
            continue;
        }

        info!("updating {current} to {desired}");
        let tx_hash = chain.write_setting(proxy, *desired).await?;
        transactions.push(SubmittedTx {
            action: Action::UpdateSetting(*desired),
            tx_hash,
        });
    }

    Ok(())
}

/// Connect to a network with the deployer's key
pub async fn connect(
    network: &NetworkConfig,
    rpc_url: Option<&str>,
    priv_key: Option<&str>,
) -> Result<RpcChain, ScriptError> {
    let rpc_url = network.resolve_url(rpc_url)?;
    let priv_key = priv_key.ok_or_else(|| {
        ScriptError::ClientInitialization(
            "no private key given, set `--priv-key` or PRIVATE_KEY".to_string(),
        )
    })?;

    RpcChain::connect(&rpc_url, priv_key, network).await
}

// ----------
// | Status |
// ----------

/// A read-only snapshot of the liquidation deployment on a network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    /// The recorded deployments on the network
    pub recorded: Vec<(String, DeploymentRecord)>,
    /// The proxy in use, configured or recorded
    pub proxy: Option<Address>,
    /// The implementation the proxy delegates to
    pub implementation: Option<Address>,
    /// The implementation pending on the proxy
    pub pending_implementation: Option<Address>,
    /// Whether the contract behind the proxy is initialized
    pub initialization: Option<InitializationState>,
    /// The current configuration values, read only once initialized
    pub settings: Vec<Setting>,
}

/// Read the state of the liquidation deployment without submitting anything
pub async fn status<C: LiquidationChain>(
    chain: &C,
    store: &DeploymentStore,
    network_name: &str,
    network: &NetworkConfig,
    check: InitializationCheck,
) -> Result<StatusReport, ScriptError> {
    let recorded = store
        .network(network_name)
        .map(|(name, record)| (name.to_string(), record.clone()))
        .collect_vec();
    for (name, record) in &recorded {
        info!("recorded {name} at {:#x}", record.address);
    }

    let proxy = network.contracts.proxy.or_else(|| {
        store
            .get(network_name, PROXY_CONTRACT_NAME)
            .map(|r| r.address)
    });
    let Some(proxy) = proxy else {
        info!("no {PROXY_CONTRACT_NAME} on {network_name}");
        return Ok(StatusReport {
            recorded,
            proxy: None,
            implementation: None,
            pending_implementation: None,
            initialization: None,
            settings: Vec::new(),
        });
    };

    let implementation = chain.implementation(proxy).await?;
    let pending_implementation = chain.pending_implementation(proxy).await?;
    let initialization = initialization_state(chain, proxy, check).await?;
    info!("{PROXY_CONTRACT_NAME} {proxy:#x}: implementation {implementation:#x}, pending {pending_implementation:#x}, {initialization:?}");

    let mut settings = Vec::new();
    if initialization == InitializationState::Initialized {
        for kind in [
            SettingKind::Comptroller,
            SettingKind::OEther,
            SettingKind::ProtocolFeeRecipient,
            SettingKind::ProtocolFeeMantissa,
        ] {
            let setting = chain.read_setting(proxy, kind).await?;
            info!("{setting}");
            settings.push(setting);
        }
    }

    Ok(StatusReport {
        recorded,
        proxy: Some(proxy),
        implementation: Some(implementation),
        pending_implementation: Some(pending_implementation),
        initialization: Some(initialization),
        settings,
    })
}

// -----------
// | Compile |
// -----------

/// Compile every Solidity source with the highest configured compiler its
/// pragma allows, writing one artifact per deployable contract.
///
/// Returns the paths of the artifacts written.
pub fn compile(config: &ProjectConfig) -> Result<Vec<PathBuf>, ScriptError> {
    let compilers: BTreeMap<SolcVersion, &CompilerConfig> = config
        .compilers
        .iter()
        .map(|c| c.solc_version().map(|v| (v, c)))
        .collect::<Result<_, _>>()?;

    let sources = find_sources(&config.paths.sources)?
        .into_iter()
        .map(|path| {
            fs::read_to_string(&path)
                .map(|contents| (path.clone(), contents))
                .map_err(|e| ScriptError::ContractCompilation(format!("{}: {e}", path.display())))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let plan = assign_compilers(&sources, compilers.keys().copied())?;

    let mut written = Vec::new();
    for (version, files) in plan {
        let compiler = compilers[&version];
        info!("compiling {} file(s) with solc {version}", files.len());

        let mut cmd = Command::new(compiler.binary());
        cmd.arg("--combined-json").arg(SOLC_COMBINED_OUTPUTS);
        if compiler.optimizer.enabled {
            cmd.arg("--optimize")
                .arg("--optimize-runs")
                .arg(compiler.optimizer.runs.to_string());
        }
        cmd.args(&files);

        let output = command_output_or(cmd, &format!("solc {version} failed"))?;
        for artifact in parse_combined_json(&output)? {
            if artifact.bytecode.trim_start_matches("0x").is_empty() {
                debug!("skipping {}, no bytecode", artifact.contract_name);
                continue;
            }
            written.push(artifact.write(&config.paths.artifacts)?);
        }
    }

    let duplicates = written.iter().duplicates().collect_vec();
    if !duplicates.is_empty() {
        warn!("artifacts written more than once: {duplicates:?}");
    }

    info!("wrote {} artifact(s)", written.len());
    Ok(written)
}

/// Group source files by the highest available compiler satisfying their
/// version pragma.
///
/// Files without a pragma may be compiled by any compiler and are assigned
/// the newest.
pub fn assign_compilers<I>(
    sources: &[(PathBuf, String)],
    versions: I,
) -> Result<BTreeMap<SolcVersion, Vec<PathBuf>>, ScriptError>
where
    I: IntoIterator<Item = SolcVersion>,
{
    let versions = versions.into_iter().collect_vec();
    let newest = versions.iter().copied().max().ok_or_else(|| {
        ScriptError::ContractCompilation("no compilers configured".to_string())
    })?;

    let mut plan: BTreeMap<SolcVersion, Vec<PathBuf>> = BTreeMap::new();
    for (path, contents) in sources {
        let version = match extract_pragma(contents) {
            Some(pragma) => pragma
                .parse::<VersionReq>()?
                .highest_match(versions.iter().copied())
                .ok_or_else(|| {
                    ScriptError::ContractCompilation(format!(
                        "no configured compiler satisfies `{pragma}` in {}",
                        path.display()
                    ))
                })?,
            None => newest,
        };
        plan.entry(version).or_default().push(path.clone());
    }

    Ok(plan)
}

/// Parse the output of `solc --combined-json abi,bin` into artifacts
pub fn parse_combined_json(output: &[u8]) -> Result<Vec<Artifact>, ScriptError> {
    let parsed: Value = serde_json::from_slice(output)
        .map_err(|e| ScriptError::ArtifactParsing(format!("solc output: {e}")))?;
    let contracts = parsed[SOLC_CONTRACTS_KEY].as_object().ok_or_else(|| {
        ScriptError::ArtifactParsing("solc output has no contracts".to_string())
    })?;

    contracts
        .iter()
        .map(|(key, contract)| {
            // Keys are `path:Name`, or just `Name` for old compilers
            let (source_name, contract_name) = match key.rsplit_once(':') {
                Some((source, name)) => (Some(source.to_string()), name.to_string()),
                None => (None, key.clone()),
            };

            // Older compilers emit the ABI as a JSON string
            let abi: JsonAbi = match &contract["abi"] {
                Value::String(s) => serde_json::from_str(s),
                other => serde_json::from_value(other.clone()),
            }
            .map_err(|e| ScriptError::ArtifactParsing(format!("{contract_name} ABI: {e}")))?;

            let bin = contract["bin"].as_str().unwrap_or_default();
            Ok(Artifact {
                contract_name,
                source_name,
                abi,
                bytecode: format!("0x{bin}"),
            })
        })
        .collect()
}
