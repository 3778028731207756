//! EVM chain gateway - production [`ChainGateway`] implementation
//!
//! Composes the JSON-RPC provider, the Alchemy token API and the
//! locally-derived wallet into the capability surface the sweep core
//! consumes. One gateway instance per running (account, chain) cycle.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};
use async_trait::async_trait;
use eyre::Result;
use serde::Deserialize;
use tracing::{debug, warn};

use super::alchemy::AlchemyClient;
use super::rpc::RpcProvider;
use super::wallet::SweepWallet;
use super::{ChainGateway, GatewayBuilder};
use crate::models::config::ChainProfile;
use crate::models::errors::AppResult;
use crate::models::types::{ConfirmStatus, FeeLevel, SuggestedFees, TokenBalance};
use crate::utils::constants::{
    GAS_BUFFER_DEN, GAS_BUFFER_NUM, NATIVE_TRANSFER_GAS, RECEIPT_POLL_INTERVAL_MS,
    TOKEN_TRANSFER_FALLBACK_GAS,
};
use crate::utils::convert::{parse_hex_u128, parse_hex_u256, parse_hex_u64};

sol! {
    function transfer(address to, uint256 amount) external returns (bool);
}

/// Minimal receipt view; only the status field matters here
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReceiptLite {
    status: Option<String>,
    #[allow(dead_code)]
    block_number: Option<String>,
}

/// Production gateway: one wallet on one EVM chain
pub struct EvmGateway {
    profile: ChainProfile,
    wallet: SweepWallet,
    rpc: RpcProvider,
    tokens: AlchemyClient,
}

impl EvmGateway {
    pub fn new(profile: ChainProfile, wallet: SweepWallet, rpc: RpcProvider) -> Self {
        let tokens = AlchemyClient::new(rpc.clone());
        Self {
            profile,
            wallet,
            rpc,
            tokens,
        }
    }

    /// Next nonce, including pending transactions so back-to-back
    /// submissions within one tick do not collide
    async fn next_nonce(&self) -> Result<u64> {
        let hex: String = self
            .rpc
            .call(
                "eth_getTransactionCount",
                serde_json::json!([format!("{:#x}", self.wallet.address()), "pending"]),
            )
            .await?;
        parse_hex_u64(&hex)
    }

    async fn send_raw(&self, raw: String) -> Result<String> {
        let tx_hash: String = self
            .rpc
            .call("eth_sendRawTransaction", serde_json::json!([raw]))
            .await?;
        Ok(tx_hash)
    }

    fn transfer_calldata(dest: Address, amount: U256) -> Bytes {
        Bytes::from(
            transferCall {
                to: dest,
                amount,
            }
            .abi_encode(),
        )
    }
}

#[async_trait]
impl ChainGateway for EvmGateway {
    fn wallet_address(&self) -> Address {
        self.wallet.address()
    }

    async fn native_balance(&self) -> Result<U256> {
        let hex: String = self
            .rpc
            .call(
                "eth_getBalance",
                serde_json::json!([format!("{:#x}", self.wallet.address()), "latest"]),
            )
            .await?;
        parse_hex_u256(&hex)
    }

    async fn suggested_fees(&self) -> Result<SuggestedFees> {
        let gas_price_hex: String = self.rpc.call("eth_gasPrice", serde_json::json!([])).await?;
        let gas_price = parse_hex_u128(&gas_price_hex)?;

        // Not every chain serves eth_maxPriorityFeePerGas; its absence
        // just means the legacy fee model.
        let priority_fee = match self
            .rpc
            .call::<String>("eth_maxPriorityFeePerGas", serde_json::json!([]))
            .await
        {
            Ok(hex) => parse_hex_u128(&hex).ok(),
            Err(e) => {
                debug!("No priority fee data on {}: {}", self.profile.key, e);
                None
            }
        };

        Ok(SuggestedFees {
            gas_price,
            priority_fee,
        })
    }

    async fn token_balances(&self) -> Result<Vec<TokenBalance>> {
        self.tokens
            .list_non_zero_token_balances(self.wallet.address())
            .await
    }

    async fn estimate_token_transfer_gas(
        &self,
        dest: Address,
        token: &TokenBalance,
    ) -> Result<u64> {
        let data = Self::transfer_calldata(dest, token.raw_amount);
        let params = serde_json::json!([{
            "from": format!("{:#x}", self.wallet.address()),
            "to": format!("{:#x}", token.contract),
            "data": format!("0x{}", hex::encode(&data)),
        }]);
        let hex: String = self.rpc.call("eth_estimateGas", params).await?;
        parse_hex_u64(&hex)
    }

    async fn submit_native_transfer(
        &self,
        dest: Address,
        amount: U256,
        fee: &FeeLevel,
    ) -> Result<String> {
        let nonce = self.next_nonce().await?;
        let raw = self.wallet.sign_transfer(
            self.profile.chain_id,
            nonce,
            dest,
            amount,
            Bytes::new(),
            NATIVE_TRANSFER_GAS,
            fee,
        )?;
        let tx_hash = self.send_raw(raw).await?;
        debug!("📤 Native transfer broadcast on {}: {}", self.profile.key, tx_hash);
        Ok(tx_hash)
    }

    async fn submit_token_transfer(
        &self,
        dest: Address,
        token: &TokenBalance,
        fee: &FeeLevel,
    ) -> Result<String> {
        // Buffered estimate as the gas limit; estimation failure falls
        // back to the conservative fixed cost.
        let units = match self.estimate_token_transfer_gas(dest, token).await {
            Ok(u) => u,
            Err(e) => {
                warn!(
                    "⚠️ Gas estimation failed for {} ({}), using fallback: {}",
                    token.symbol, token.contract, e
                );
                TOKEN_TRANSFER_FALLBACK_GAS
            }
        };
        let gas_limit = units * GAS_BUFFER_NUM / GAS_BUFFER_DEN;

        let nonce = self.next_nonce().await?;
        let raw = self.wallet.sign_transfer(
            self.profile.chain_id,
            nonce,
            token.contract,
            U256::ZERO,
            Self::transfer_calldata(dest, token.raw_amount),
            gas_limit,
            fee,
        )?;
        let tx_hash = self.send_raw(raw).await?;
        debug!(
            "📤 {} transfer broadcast on {}: {}",
            token.symbol, self.profile.key, tx_hash
        );
        Ok(tx_hash)
    }

    async fn await_confirmation(&self, tx_hash: &str, timeout: Duration) -> Result<ConfirmStatus> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self
                .rpc
                .call_optional::<ReceiptLite>(
                    "eth_getTransactionReceipt",
                    serde_json::json!([tx_hash]),
                )
                .await
            {
                Ok(Some(receipt)) => {
                    return Ok(match receipt.status.as_deref() {
                        Some("0x0") => ConfirmStatus::Reverted,
                        _ => ConfirmStatus::Confirmed,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    // Receipt polling errors are not fatal; the next
                    // poll may succeed within the deadline.
                    debug!("Receipt poll failed for {}: {}", tx_hash, e);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(ConfirmStatus::Pending);
            }
            tokio::time::sleep(Duration::from_millis(RECEIPT_POLL_INTERVAL_MS)).await;
        }
    }
}

/// Default [`GatewayBuilder`]: Alchemy-backed EVM gateways
#[derive(Default)]
pub struct EvmGatewayBuilder;

impl GatewayBuilder for EvmGatewayBuilder {
    fn connect(&self, profile: &ChainProfile, secret: &str) -> AppResult<Arc<dyn ChainGateway>> {
        let wallet = SweepWallet::from_phrase(secret, 0)?;
        let rpc = RpcProvider::for_chain(profile.key)?;
        Ok(Arc::new(EvmGateway::new(profile.clone(), wallet, rpc)))
    }
}
