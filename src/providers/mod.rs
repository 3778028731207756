//! Providers Module - External Collaborators
//!
//! Chain RPC, wallet derivation/signing, the Alchemy token + prices
//! APIs, and the trait seams (`ChainGateway`, `PriceSource`) the core
//! consumes so tests can run against in-process mocks.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::models::config::ChainProfile;
use crate::models::errors::AppResult;
use crate::models::types::{ConfirmStatus, FeeLevel, SuggestedFees, TokenBalance};

pub mod alchemy;
pub mod evm;
pub mod rpc;
pub mod wallet;

pub use alchemy::{AlchemyClient, AlchemyPriceSource};
pub use evm::{EvmGateway, EvmGatewayBuilder};
pub use rpc::RpcProvider;
pub use wallet::SweepWallet;

/// Everything a sweep cycle needs from the chain for one wallet:
/// balances, fee data, gas estimation, transfer submission and the
/// bounded confirmation wait.
#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Address of the monitored wallet
    fn wallet_address(&self) -> Address;

    /// Native-currency balance of the monitored wallet (wei)
    async fn native_balance(&self) -> Result<U256>;

    /// Network-suggested fee data, prior to any boost
    async fn suggested_fees(&self) -> Result<SuggestedFees>;

    /// Non-zero token balances with resolved metadata
    async fn token_balances(&self) -> Result<Vec<TokenBalance>>;

    /// Gas units for transferring the full balance of `token` to
    /// `dest` (unbuffered)
    async fn estimate_token_transfer_gas(&self, dest: Address, token: &TokenBalance)
        -> Result<u64>;

    /// Sign and broadcast a native transfer; returns the transaction hash
    async fn submit_native_transfer(
        &self,
        dest: Address,
        amount: U256,
        fee: &FeeLevel,
    ) -> Result<String>;

    /// Sign and broadcast an ERC-20 transfer of the token's full
    /// balance; returns the transaction hash
    async fn submit_token_transfer(
        &self,
        dest: Address,
        token: &TokenBalance,
        fee: &FeeLevel,
    ) -> Result<String>;

    /// Poll for a receipt up to `timeout`. Timing out yields
    /// `ConfirmStatus::Pending`, never an error.
    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<ConfirmStatus>;
}

/// Batched USD price lookup. Rate-limit responses must surface "429"
/// in the error text so the cache can skip its retry loop.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>>;
}

/// Builds a [`ChainGateway`] for one (chain, secret) pair. Validation
/// of the recovery phrase and chain support happens here,
/// synchronously, at the start boundary.
pub trait GatewayBuilder: Send + Sync {
    fn connect(&self, profile: &ChainProfile, secret: &str) -> AppResult<Arc<dyn ChainGateway>>;
}
