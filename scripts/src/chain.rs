//! Access to the target chain: the deploy, execute and read primitives the
//! deploy routine is built from

use std::{
    fmt::{self, Display},
    time::Duration,
};

use alloy::{
    contract::{CallBuilder, CallDecoder, Error as ContractError},
    network::{Ethereum, TransactionBuilder},
    providers::{DynProvider, PendingTransactionBuilder, Provider},
    rpc::types::TransactionRequest,
};
use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::{
    artifacts::Artifact,
    config::NetworkConfig,
    constants::INITIALIZED_FUNCTION,
    errors::ScriptError,
    solidity::{NFTLiquidationG1, NFTLiquidationProxy},
    utils::{scale_gas, setup_client},
};

/// Whether the liquidation contract behind a proxy has been initialized
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializationState {
    /// `initialize` has run against the proxy's storage
    Initialized,
    /// The proxy's storage has not been initialized
    Uninitialized,
}

impl From<bool> for InitializationState {
    fn from(initialized: bool) -> Self {
        if initialized {
            InitializationState::Initialized
        } else {
            InitializationState::Uninitialized
        }
    }
}

/// The on-chain state the initialization state is derived from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InitializationCheck {
    /// The implementation's `initialized()` view
    InitializedView,
    /// Whether `comptroller()` holds a non-zero address, for implementations
    /// without an `initialized()` view
    #[default]
    ComptrollerSet,
}

impl InitializationCheck {
    /// The check supported by an implementation's ABI
    pub fn for_logic(logic: &Artifact) -> Self {
        if logic.abi.function(INITIALIZED_FUNCTION).is_some() {
            InitializationCheck::InitializedView
        } else {
            InitializationCheck::ComptrollerSet
        }
    }
}

/// Read whether the contract behind a proxy has been initialized.
///
/// The state comes from storage reads only. A failed read, including a
/// revert, is returned as an error rather than taken to mean uninitialized.
pub async fn initialization_state<C: LiquidationChain + ?Sized>(
    chain: &C,
    proxy: Address,
    check: InitializationCheck,
) -> Result<InitializationState, ScriptError> {
    let initialized = match check {
        InitializationCheck::InitializedView => chain.initialized(proxy).await?,
        InitializationCheck::ComptrollerSet => {
            chain.read_setting(proxy, SettingKind::Comptroller).await?
                != Setting::Comptroller(Address::ZERO)
        }
    };

    debug!("{proxy:#x} initialized: {initialized} (from {check:?})");
    Ok(initialized.into())
}

/// The configuration values of the liquidation contract managed by the scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingKind {
    /// The comptroller the liquidation contract reports to
    Comptroller,
    /// The oEther market
    OEther,
    /// The recipient of protocol fees
    ProtocolFeeRecipient,
    /// The protocol fee, scaled by 1e18
    ProtocolFeeMantissa,
}

/// A configuration value of the liquidation contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Setting {
    /// The comptroller address
    Comptroller(Address),
    /// The oEther market address
    OEther(Address),
    /// The protocol fee recipient address
    ProtocolFeeRecipient(Address),
    /// The protocol fee mantissa
    ProtocolFeeMantissa(U256),
}

impl Setting {
    /// The kind of value this setting holds
    pub fn kind(&self) -> SettingKind {
        match self {
            Setting::Comptroller(_) => SettingKind::Comptroller,
            Setting::OEther(_) => SettingKind::OEther,
            Setting::ProtocolFeeRecipient(_) => SettingKind::ProtocolFeeRecipient,
            Setting::ProtocolFeeMantissa(_) => SettingKind::ProtocolFeeMantissa,
        }
    }
}

impl Display for SettingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingKind::Comptroller => write!(f, "comptroller"),
            SettingKind::OEther => write!(f, "oEther"),
            SettingKind::ProtocolFeeRecipient => write!(f, "protocolFeeRecipient"),
            SettingKind::ProtocolFeeMantissa => write!(f, "protocolFeeMantissa"),
        }
    }
}

impl Display for Setting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Setting::Comptroller(a) | Setting::OEther(a) | Setting::ProtocolFeeRecipient(a) => {
                write!(f, "{} = {a:#x}", self.kind())
            }
            Setting::ProtocolFeeMantissa(m) => write!(f, "{} = {m}", self.kind()),
        }
    }
}

/// A contract deployed by the scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployedContract {
    /// The address of the new contract
    pub address: Address,
    /// The hash of the deployment transaction
    pub tx_hash: TxHash,
}

/// The chain operations the deploy routine depends on.
///
/// Every write returns only once its transaction has been included, so
/// callers observe the effects of a write in their next read.
#[async_trait]
pub trait LiquidationChain: Send + Sync {
    /// The account submitting transactions
    fn deployer(&self) -> Address;

    /// Deploy a contract from its creation code
    async fn deploy(&self, creation_code: Bytes) -> Result<DeployedContract, ScriptError>;

    /// The runtime code at an address, empty if there is no contract there
    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError>;

    /// The implementation the proxy currently delegates to
    async fn implementation(&self, proxy: Address) -> Result<Address, ScriptError>;

    /// The implementation the proxy is waiting to be accepted by
    async fn pending_implementation(&self, proxy: Address) -> Result<Address, ScriptError>;

    /// Propose a new implementation to the proxy
    async fn set_pending_implementation(
        &self,
        proxy: Address,
        implementation: Address,
    ) -> Result<TxHash, ScriptError>;

    /// Have the implementation accept its pending role on the proxy
    async fn become_implementation(
        &self,
        implementation: Address,
        proxy: Address,
    ) -> Result<TxHash, ScriptError>;

    /// The implementation's `initialized()` flag, read through the proxy
    async fn initialized(&self, proxy: Address) -> Result<bool, ScriptError>;

    /// Initialize the contract behind the proxy
    async fn initialize(&self, proxy: Address) -> Result<TxHash, ScriptError>;

    /// Read a configuration value through the proxy
    async fn read_setting(&self, proxy: Address, kind: SettingKind)
        -> Result<Setting, ScriptError>;

    /// Write a configuration value through the proxy
    async fn write_setting(&self, proxy: Address, setting: Setting)
        -> Result<TxHash, ScriptError>;
}

/// The call builder type used against the RPC provider
type RpcCall<'a, D> = CallBuilder<(), &'a DynProvider, D, Ethereum>;

/// A [`LiquidationChain`] talking to a node over JSON-RPC, signing with a
/// local private key
pub struct RpcChain {
    /// The provider, with the deployer's wallet attached
    provider: DynProvider,
    /// The address of the deployer's wallet
    deployer: Address,
    /// The factor applied to every gas estimate
    gas_multiplier: f64,
    /// The number of confirmations to wait for every transaction
    confirmations: u64,
    /// How long to wait for a transaction receipt
    tx_timeout: Duration,
}

impl RpcChain {
    /// Connect to the given network, signing with the given private key
    pub async fn connect(
        rpc_url: &str,
        priv_key: &str,
        network: &NetworkConfig,
    ) -> Result<Self, ScriptError> {
        network.validate()?;
        let (provider, deployer) = setup_client(priv_key, rpc_url).await?;

        Ok(Self {
            provider,
            deployer,
            gas_multiplier: network.gas_multiplier,
            confirmations: network.confirmations,
            tx_timeout: network.tx_timeout(),
        })
    }

    /// Send a contract call as a transaction and wait for it to succeed
    async fn submit<D: CallDecoder + Send + Sync>(
        &self,
        call: RpcCall<'_, D>,
        label: &str,
    ) -> Result<TxHash, ScriptError> {
        let estimate = call
            .estimate_gas()
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("{label}: {e}")))?;
        let pending = call
            .gas(scale_gas(estimate, self.gas_multiplier))
            .send()
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("{label}: {e}")))?;

        self.confirm(pending, label).await.map(|(tx_hash, _)| tx_hash)
    }

    /// Wait for a pending transaction to be included and check it succeeded,
    /// returning its hash and the address of any contract it created
    async fn confirm(
        &self,
        pending: PendingTransactionBuilder<Ethereum>,
        label: &str,
    ) -> Result<(TxHash, Option<Address>), ScriptError> {
        let tx_hash = *pending.tx_hash();
        debug!("{label}: waiting for {tx_hash:#x}");

        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .with_timeout(Some(self.tx_timeout))
            .get_receipt()
            .await
            .map_err(|e| ScriptError::ContractInteraction(format!("{label}: {e}")))?;

        if !receipt.status() {
            return Err(ScriptError::TransactionReverted(format!("{label} ({tx_hash:#x})")));
        }

        info!(
            "{label}: included in block {} ({tx_hash:#x}, gas used {})",
            receipt.block_number.unwrap_or_default(),
            receipt.gas_used
        );
        Ok((tx_hash, receipt.contract_address))
    }
}

/// Wrap a failed view call into a [`ScriptError`]
fn read_error(method: &str) -> impl FnOnce(ContractError) -> ScriptError + '_ {
    move |e| ScriptError::ContractInteraction(format!("reading {method}: {e}"))
}

#[async_trait]
impl LiquidationChain for RpcChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn deploy(&self, creation_code: Bytes) -> Result<DeployedContract, ScriptError> {
        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(creation_code);

        let estimate = self
            .provider
            .estimate_gas(&tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;
        let tx = tx.with_gas_limit(scale_gas(estimate, self.gas_multiplier));

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ScriptError::ContractDeployment(e.to_string()))?;

        match self.confirm(pending, "deploy").await? {
            (tx_hash, Some(address)) => Ok(DeployedContract { address, tx_hash }),
            (tx_hash, None) => Err(ScriptError::ContractDeployment(format!(
                "no contract address in receipt of {tx_hash:#x}"
            ))),
        }
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
        self.provider
            .get_code_at(address)
            .await
            .map_err(|e| ScriptError::ContractInteraction(e.to_string()))
    }

    async fn implementation(&self, proxy: Address) -> Result<Address, ScriptError> {
        let contract = NFTLiquidationProxy::new(proxy, self.provider.clone());
        let res = contract
            .nftLiquidationImplementation()
            .call()
            .await
            .map_err(read_error("nftLiquidationImplementation"))?;
        Ok(res.implementation)
    }

    async fn pending_implementation(&self, proxy: Address) -> Result<Address, ScriptError> {
        let contract = NFTLiquidationProxy::new(proxy, self.provider.clone());
        let res = contract
            .pendingNFTLiquidationImplementation()
            .call()
            .await
            .map_err(read_error("pendingNFTLiquidationImplementation"))?;
        Ok(res.implementation)
    }

    async fn set_pending_implementation(
        &self,
        proxy: Address,
        implementation: Address,
    ) -> Result<TxHash, ScriptError> {
        let contract = NFTLiquidationProxy::new(proxy, self.provider.clone());
        self.submit(
            contract._setPendingImplementation(implementation),
            "_setPendingImplementation",
        )
        .await
    }

    async fn become_implementation(
        &self,
        implementation: Address,
        proxy: Address,
    ) -> Result<TxHash, ScriptError> {
        let contract = NFTLiquidationG1::new(implementation, self.provider.clone());
        self.submit(contract._become(proxy), "_become").await
    }

    async fn initialized(&self, proxy: Address) -> Result<bool, ScriptError> {
        let contract = NFTLiquidationG1::new(proxy, self.provider.clone());
        let res = contract
            .initialized()
            .call()
            .await
            .map_err(read_error("initialized"))?;
        Ok(res.initialized)
    }

    async fn initialize(&self, proxy: Address) -> Result<TxHash, ScriptError> {
        let contract = NFTLiquidationG1::new(proxy, self.provider.clone());
        self.submit(contract.initialize(), "initialize").await
    }

    async fn read_setting(
        &self,
        proxy: Address,
        kind: SettingKind,
    ) -> Result<Setting, ScriptError> {
        let contract = NFTLiquidationG1::new(proxy, self.provider.clone());
        let setting = match kind {
            SettingKind::Comptroller => Setting::Comptroller(
                contract
                    .comptroller()
                    .call()
                    .await
                    .map_err(read_error("comptroller"))?
                    .comptroller,
            ),
            SettingKind::OEther => Setting::OEther(
                contract
                    .oEther()
                    .call()
                    .await
                    .map_err(read_error("oEther"))?
                    .oEther,
            ),
            SettingKind::ProtocolFeeRecipient => Setting::ProtocolFeeRecipient(
                contract
                    .protocolFeeRecipient()
                    .call()
                    .await
                    .map_err(read_error("protocolFeeRecipient"))?
                    .recipient,
            ),
            SettingKind::ProtocolFeeMantissa => Setting::ProtocolFeeMantissa(
                contract
                    .protocolFeeMantissa()
                    .call()
                    .await
                    .map_err(read_error("protocolFeeMantissa"))?
                    .mantissa,
            ),
        };

        Ok(setting)
    }

    async fn write_setting(
        &self,
        proxy: Address,
        setting: Setting,
    ) -> Result<TxHash, ScriptError> {
        let contract = NFTLiquidationG1::new(proxy, self.provider.clone());
        match setting {
            Setting::Comptroller(a) => {
                self.submit(contract._setComptroller(a), "_setComptroller")
                    .await
            }
            Setting::OEther(a) => self.submit(contract.setOEther(a), "setOEther").await,
            Setting::ProtocolFeeRecipient(a) => {
                self.submit(
                    contract.setProtocolFeeRecipient(a),
                    "setProtocolFeeRecipient",
                )
                .await
            }
            Setting::ProtocolFeeMantissa(m) => {
                self.submit(contract.setProtocolFeeMantissa(m), "setProtocolFeeMantissa")
                    .await
            }
        }
    }
}
