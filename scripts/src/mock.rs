//! An in-memory simulation of the liquidation contracts on a chain, used to
//! exercise the deploy routine without a node

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard},
};

use alloy_primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;

use crate::{
    chain::{DeployedContract, LiquidationChain, Setting, SettingKind},
    errors::ScriptError,
};

/// A transaction submitted to the mock chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockTx {
    /// A contract deployment
    Deploy(Address),
    /// A `_setPendingImplementation` call on a proxy
    SetPendingImplementation {
        /// The proxy called
        proxy: Address,
        /// The proposed implementation
        implementation: Address,
    },
    /// A `_become` call on an implementation
    Become {
        /// The implementation called
        implementation: Address,
        /// The proxy it became the implementation of
        proxy: Address,
    },
    /// An `initialize` call through a proxy
    Initialize(Address),
    /// A setter call through a proxy
    WriteSetting(Setting),
}

/// The storage of a liquidation proxy, shared with its implementation
#[derive(Debug, Clone, Default)]
struct ProxyStorage {
    /// The active implementation
    implementation: Address,
    /// The implementation awaiting `_become`
    pending_implementation: Address,
    /// Whether `initialize` has run
    initialized: bool,
    /// The comptroller address
    comptroller: Address,
    /// The oEther market address
    o_ether: Address,
    /// The protocol fee recipient
    protocol_fee_recipient: Address,
    /// The protocol fee mantissa
    protocol_fee_mantissa: U256,
}

/// The mutable state of the mock chain
#[derive(Debug, Default)]
struct MockState {
    /// The deployer's nonce
    nonce: u64,
    /// The code deployed at each address
    code: HashMap<Address, Bytes>,
    /// The storage of each proxy touched
    proxies: HashMap<Address, ProxyStorage>,
    /// Every transaction submitted, in order
    transactions: Vec<MockTx>,
    /// Whether reads fail as if the node were unreachable
    unreachable: bool,
    /// Proxies whose implementation views revert, as when paused
    reverting: HashSet<Address>,
}

/// A [`LiquidationChain`] that keeps all state in memory.
///
/// Proxy semantics follow the two-step upgrade pattern: the proxy records a
/// pending implementation, which becomes active once the implementation
/// calls back through `_become`. Setters revert until `initialize` has run.
#[derive(Debug)]
pub struct MockChain {
    /// The account submitting transactions
    deployer: Address,
    /// The chain state
    state: Mutex<MockState>,
}

impl MockChain {
    /// Create an empty chain with the given deployer account
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            state: Mutex::new(MockState::default()),
        }
    }

    /// Lock the chain state
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock chain state poisoned")
    }

    /// All transactions submitted so far, in order
    pub fn transactions(&self) -> Vec<MockTx> {
        self.state().transactions.clone()
    }

    /// The number of transactions submitted so far
    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    /// Make every read fail as if the node could not be reached
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state().unreachable = unreachable;
    }

    /// Make every implementation view read through a proxy revert
    pub fn revert_reads(&self, proxy: Address) {
        self.state().reverting.insert(proxy);
    }

    /// Remove the code at an address, as after a development node restart
    pub fn wipe_code(&self, address: Address) {
        self.state().code.remove(&address);
    }

    /// Place a proxy at an address, as if deployed by someone else
    pub fn install_proxy(&self, proxy: Address) {
        let mut state = self.state();
        state.code.insert(proxy, Bytes::from_static(b"proxy"));
        state.proxies.entry(proxy).or_default();
    }

    /// Overwrite a setting in a proxy's storage without a transaction
    pub fn force_setting(&self, proxy: Address, setting: Setting) {
        let mut state = self.state();
        let storage = state.proxies.entry(proxy).or_default();
        storage.initialized = true;
        apply_setting(storage, setting);
    }

    /// Record a transaction and derive its hash
    fn record(state: &mut MockState, tx: MockTx) -> TxHash {
        state.transactions.push(tx);
        keccak256((state.transactions.len() as u64).to_be_bytes())
    }

    /// Fail if reads are disabled
    fn check_reachable(state: &MockState) -> Result<(), ScriptError> {
        if state.unreachable {
            Err(ScriptError::ContractInteraction(
                "connection refused".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Fail if reads are disabled or the proxy's views revert
    fn check_readable(state: &MockState, proxy: Address, method: &str) -> Result<(), ScriptError> {
        Self::check_reachable(state)?;
        if state.reverting.contains(&proxy) {
            return Err(ScriptError::ContractInteraction(format!(
                "reading {method}: execution reverted: Pausable: paused"
            )));
        }
        Ok(())
    }
}

/// Write a setting into proxy storage
fn apply_setting(storage: &mut ProxyStorage, setting: Setting) {
    match setting {
        Setting::Comptroller(a) => storage.comptroller = a,
        Setting::OEther(a) => storage.o_ether = a,
        Setting::ProtocolFeeRecipient(a) => storage.protocol_fee_recipient = a,
        Setting::ProtocolFeeMantissa(m) => storage.protocol_fee_mantissa = m,
    }
}

#[async_trait]
impl LiquidationChain for MockChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn deploy(&self, creation_code: Bytes) -> Result<DeployedContract, ScriptError> {
        let mut state = self.state();
        let address = self.deployer.create(state.nonce);
        state.nonce += 1;
        state.code.insert(address, creation_code);

        let tx_hash = Self::record(&mut state, MockTx::Deploy(address));
        Ok(DeployedContract { address, tx_hash })
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, ScriptError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn implementation(&self, proxy: Address) -> Result<Address, ScriptError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state
            .proxies
            .get(&proxy)
            .map(|s| s.implementation)
            .unwrap_or_default())
    }

    async fn pending_implementation(&self, proxy: Address) -> Result<Address, ScriptError> {
        let state = self.state();
        Self::check_reachable(&state)?;
        Ok(state
            .proxies
            .get(&proxy)
            .map(|s| s.pending_implementation)
            .unwrap_or_default())
    }

    async fn set_pending_implementation(
        &self,
        proxy: Address,
        implementation: Address,
    ) -> Result<TxHash, ScriptError> {
        let mut state = self.state();
        state.proxies.entry(proxy).or_default().pending_implementation = implementation;
        Ok(Self::record(
            &mut state,
            MockTx::SetPendingImplementation {
                proxy,
                implementation,
            },
        ))
    }

    async fn become_implementation(
        &self,
        implementation: Address,
        proxy: Address,
    ) -> Result<TxHash, ScriptError> {
        let mut state = self.state();
        let storage = state.proxies.entry(proxy).or_default();
        if storage.pending_implementation != implementation {
            return Err(ScriptError::TransactionReverted(format!(
                "_become: {implementation:#x} is not pending on {proxy:#x}"
            )));
        }

        storage.implementation = implementation;
        storage.pending_implementation = Address::ZERO;
        Ok(Self::record(
            &mut state,
            MockTx::Become {
                implementation,
                proxy,
            },
        ))
    }

    async fn initialized(&self, proxy: Address) -> Result<bool, ScriptError> {
        let state = self.state();
        Self::check_readable(&state, proxy, "initialized")?;
        Ok(state.proxies.get(&proxy).is_some_and(|s| s.initialized))
    }

    async fn initialize(&self, proxy: Address) -> Result<TxHash, ScriptError> {
        let mut state = self.state();
        let storage = state.proxies.entry(proxy).or_default();
        if storage.initialized {
            return Err(ScriptError::TransactionReverted(
                "initialize: already initialized".to_string(),
            ));
        }

        storage.initialized = true;
        Ok(Self::record(&mut state, MockTx::Initialize(proxy)))
    }

    async fn read_setting(
        &self,
        proxy: Address,
        kind: SettingKind,
    ) -> Result<Setting, ScriptError> {
        let state = self.state();
        Self::check_readable(&state, proxy, &kind.to_string())?;
        let storage = state.proxies.get(&proxy).cloned().unwrap_or_default();
        Ok(match kind {
            SettingKind::Comptroller => Setting::Comptroller(storage.comptroller),
            SettingKind::OEther => Setting::OEther(storage.o_ether),
            SettingKind::ProtocolFeeRecipient => {
                Setting::ProtocolFeeRecipient(storage.protocol_fee_recipient)
            }
            SettingKind::ProtocolFeeMantissa => {
                Setting::ProtocolFeeMantissa(storage.protocol_fee_mantissa)
            }
        })
    }

    async fn write_setting(
        &self,
        proxy: Address,
        setting: Setting,
    ) -> Result<TxHash, ScriptError> {
        let mut state = self.state();
        let storage = state.proxies.entry(proxy).or_default();
        if !storage.initialized {
            return Err(ScriptError::TransactionReverted(format!(
                "{}: contract not initialized",
                setting.kind()
            )));
        }

        apply_setting(storage, setting);
        Ok(Self::record(&mut state, MockTx::WriteSetting(setting)))
    }
}
