//! Alchemy Enhanced APIs Module
//!
//! Implements the Alchemy-specific APIs the sweeper relies on beyond
//! standard JSON-RPC:
//! 1. Token API - alchemy_getTokenBalances, alchemy_getTokenMetadata
//! 2. Prices API - USD prices by token symbol (separate REST endpoint)
//!
//! Alchemy Documentation Reference:
//! - Token API: https://alchemy.com/docs/reference/token-api-overview.mdx
//! - Prices API: https://alchemy.com/docs/reference/prices-api-quickstart.mdx
//!
//! Compute Unit Costs (for rate limiting awareness):
//! - alchemy_getTokenMetadata: 10 CU
//! - alchemy_getTokenBalances: 20 CU
//! - Prices API: 40 CU per request

use std::collections::HashMap;
use std::str::FromStr;

use alloy_primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::rpc::{alchemy_api_key, RpcProvider};
use super::PriceSource;
use crate::models::errors::AppResult;
use crate::models::types::TokenBalance;
use crate::utils::constants::MAX_TRACKED_TOKENS;
use crate::utils::convert::parse_hex_u256;

// ============================================
// TOKEN API TYPES
// ============================================

/// Token metadata from alchemy_getTokenMetadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u8>,
    pub logo: Option<String>,
}

/// Token balance entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTokenBalance {
    pub contract_address: String,
    pub token_balance: Option<String>,
    pub error: Option<String>,
}

/// Response from alchemy_getTokenBalances
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalancesResponse {
    pub address: String,
    pub token_balances: Vec<RawTokenBalance>,
}

// ============================================
// TOKEN API CLIENT
// ============================================

/// Alchemy Token API client
pub struct AlchemyClient {
    provider: RpcProvider,
}

impl AlchemyClient {
    /// Create new Alchemy client from existing RPC provider
    pub fn new(provider: RpcProvider) -> Self {
        Self { provider }
    }

    /// Get token metadata (name, symbol, decimals, logo)
    ///
    /// Compute Units: 10 CU
    pub async fn get_token_metadata(&self, contract_address: &str) -> Result<TokenMetadata> {
        debug!("📊 Fetching token metadata for {}", contract_address);

        let params = serde_json::json!([contract_address]);
        self.provider
            .call::<TokenMetadata>("alchemy_getTokenMetadata", params)
            .await
    }

    /// Get token balances for an address
    ///
    /// Compute Units: 20 CU
    pub async fn get_token_balances(&self, owner_address: &str) -> Result<TokenBalancesResponse> {
        debug!("💰 Fetching token balances for {}", owner_address);

        let params = serde_json::json!([owner_address, "erc20"]);
        self.provider
            .call::<TokenBalancesResponse>("alchemy_getTokenBalances", params)
            .await
    }

    /// List the wallet's non-zero token balances with resolved
    /// metadata. Contracts with a zero balance, a balance error, or
    /// missing symbol/decimals are filtered out; tokens the sweeper
    /// cannot identify cannot be valued and must not be swept.
    pub async fn list_non_zero_token_balances(&self, owner: Address) -> Result<Vec<TokenBalance>> {
        let owner_str = format!("{:#x}", owner);
        let response = self.get_token_balances(&owner_str).await?;

        let mut out = Vec::new();
        for raw in response.token_balances {
            if out.len() >= MAX_TRACKED_TOKENS {
                warn!(
                    "⚠️ More than {} token contracts with balance; ignoring the rest",
                    MAX_TRACKED_TOKENS
                );
                break;
            }
            if raw.error.is_some() {
                continue;
            }
            let Some(balance_hex) = raw.token_balance else {
                continue;
            };
            let amount = match parse_hex_u256(&balance_hex) {
                Ok(v) => v,
                Err(e) => {
                    debug!("Skipping {}: {}", raw.contract_address, e);
                    continue;
                }
            };
            if amount.is_zero() {
                continue;
            }
            let Ok(contract) = Address::from_str(&raw.contract_address) else {
                continue;
            };

            // Metadata failures degrade to "skip this token", not to
            // a failed tick.
            let metadata = match self.get_token_metadata(&raw.contract_address).await {
                Ok(m) => m,
                Err(e) => {
                    warn!("⚠️ Metadata lookup failed for {}: {}", raw.contract_address, e);
                    continue;
                }
            };
            let (Some(symbol), Some(decimals)) = (metadata.symbol, metadata.decimals) else {
                debug!("Skipping {}: incomplete metadata", raw.contract_address);
                continue;
            };

            out.push(TokenBalance {
                contract,
                raw_amount: amount,
                symbol,
                decimals,
            });
        }

        debug!("💰 {} non-zero token balances for {}", out.len(), owner_str);
        Ok(out)
    }
}

// ============================================
// PRICES API TYPES
// ============================================

/// Per-symbol price data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPriceData {
    pub symbol: String,
    #[serde(default)]
    pub prices: Vec<PriceQuote>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Individual price quote
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceQuote {
    pub currency: String,
    pub value: String,
    pub last_updated_at: Option<String>,
}

/// Prices API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricesResponse {
    pub data: Vec<TokenPriceData>,
}

// ============================================
// PRICES API CLIENT (Separate endpoint)
// ============================================

/// Alchemy Prices API client
///
/// Uses the separate REST endpoint
/// `https://api.g.alchemy.com/prices/v1/{apiKey}/tokens/by-symbol`.
/// Compute Units: 40 CU per request.
pub struct AlchemyPriceSource {
    client: reqwest::Client,
    api_key: String,
}

impl AlchemyPriceSource {
    /// Create new Prices API client
    pub fn new() -> AppResult<Self> {
        let api_key = alchemy_api_key()?;

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .gzip(true)
            .build()
            .map_err(|e| {
                crate::models::errors::AppError::with_source(
                    crate::models::errors::ErrorCode::ConfigInvalidValue,
                    "Failed to build HTTP client",
                    e,
                )
            })?;

        Ok(Self { client, api_key })
    }

    /// Fetch USD quotes for a batch of symbols in one request
    async fn fetch_by_symbol(&self, symbols: &[String]) -> Result<PricesResponse> {
        let url = format!(
            "https://api.g.alchemy.com/prices/v1/{}/tokens/by-symbol",
            self.api_key
        );

        let query: Vec<(&str, &str)> = symbols
            .iter()
            .map(|s| ("symbols", s.as_str()))
            .collect();

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| eyre!("Prices API request failed: {}", e))?;

        if response.status() == 429 {
            return Err(eyre!("Prices API rate limited (HTTP 429)"));
        }
        if !response.status().is_success() {
            return Err(eyre!("Prices API error: {}", response.status()));
        }

        response
            .json::<PricesResponse>()
            .await
            .map_err(|e| eyre!("Failed to parse prices response: {}", e))
    }
}

#[async_trait]
impl PriceSource for AlchemyPriceSource {
    async fn fetch_prices(&self, symbols: &[String]) -> Result<HashMap<String, f64>> {
        let response = self.fetch_by_symbol(symbols).await?;

        let mut out = HashMap::new();
        for entry in response.data {
            if entry.error.is_some() {
                continue;
            }
            if let Some(quote) = entry.prices.iter().find(|p| p.currency == "usd") {
                if let Ok(value) = quote.value.parse::<f64>() {
                    out.insert(entry.symbol, value);
                }
            }
        }
        Ok(out)
    }
}
