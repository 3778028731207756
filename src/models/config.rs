//! Chain configuration: supported networks and per-chain sweep profiles
//!
//! One immutable `ChainProfile` per supported network, shared by every
//! account sweeping on that network. Thresholds and the poll interval
//! can be overridden through environment variables.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::models::errors::{AppError, AppResult};
use crate::utils::constants::*;

/// Supported networks. The enum (not a free-form string) is the key
/// everywhere so an unsupported chain is rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainKey {
    Ethereum,
    Bsc,
    Polygon,
    Arbitrum,
    Optimism,
    Avalanche,
    Base,
}

impl ChainKey {
    /// All supported chains
    pub const ALL: [ChainKey; 7] = [
        Self::Ethereum,
        Self::Bsc,
        Self::Polygon,
        Self::Arbitrum,
        Self::Optimism,
        Self::Avalanche,
        Self::Base,
    ];

    /// Canonical lowercase key (env vars, logs, CLI)
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ethereum => "ethereum",
            Self::Bsc => "bsc",
            Self::Polygon => "polygon",
            Self::Arbitrum => "arbitrum",
            Self::Optimism => "optimism",
            Self::Avalanche => "avalanche",
            Self::Base => "base",
        }
    }

    /// Numeric chain ID
    pub fn chain_id(&self) -> u64 {
        match self {
            Self::Ethereum => CHAIN_ID_ETHEREUM,
            Self::Bsc => CHAIN_ID_BSC,
            Self::Polygon => CHAIN_ID_POLYGON,
            Self::Arbitrum => CHAIN_ID_ARBITRUM,
            Self::Optimism => CHAIN_ID_OPTIMISM,
            Self::Avalanche => CHAIN_ID_AVALANCHE,
            Self::Base => CHAIN_ID_BASE,
        }
    }

    /// Alchemy subdomain for dynamic URL construction
    pub fn alchemy_subdomain(&self) -> &'static str {
        match self {
            Self::Ethereum => "eth-mainnet",
            Self::Bsc => "bnb-mainnet",
            Self::Polygon => "polygon-mainnet",
            Self::Arbitrum => "arb-mainnet",
            Self::Optimism => "opt-mainnet",
            Self::Avalanche => "avax-mainnet",
            Self::Base => "base-mainnet",
        }
    }

    /// Public RPC fallback URL (last resort when Alchemy fails)
    pub fn public_rpc(&self) -> &'static str {
        match self {
            Self::Ethereum => "https://eth.llamarpc.com",
            Self::Bsc => "https://bsc-dataseed.binance.org",
            Self::Polygon => "https://polygon-rpc.com",
            Self::Arbitrum => "https://arb1.arbitrum.io/rpc",
            Self::Optimism => "https://mainnet.optimism.io",
            Self::Avalanche => "https://api.avax.network/ext/bc/C/rpc",
            Self::Base => "https://mainnet.base.org",
        }
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChainKey {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "ethereum" | "eth" => Ok(Self::Ethereum),
            "bsc" | "bnb" => Ok(Self::Bsc),
            "polygon" | "matic" => Ok(Self::Polygon),
            "arbitrum" | "arb" => Ok(Self::Arbitrum),
            "optimism" | "op" => Ok(Self::Optimism),
            "avalanche" | "avax" => Ok(Self::Avalanche),
            "base" => Ok(Self::Base),
            other => Err(AppError::unsupported_chain(other)),
        }
    }
}

/// Static per-network sweep configuration. Immutable after load.
#[derive(Debug, Clone)]
pub struct ChainProfile {
    /// Chain this profile belongs to
    pub key: ChainKey,
    /// Display name for notifications
    pub name: String,
    /// Numeric chain ID (EIP-155)
    pub chain_id: u64,
    /// Native currency symbol
    pub native_symbol: String,
    /// Native currency decimal precision
    pub native_decimals: u8,
    /// Minimum USD value for a token balance to be swept
    pub usd_threshold: f64,
    /// Minimum USD value for the native balance to be swept.
    /// Held higher than the token threshold: the native coin also
    /// pays fees, and oversweeping it starves future cycles.
    pub native_usd_threshold: f64,
    /// Delay between sweep evaluation ticks
    pub poll_interval: Duration,
    /// Explorer transaction URL template, `{tx}` replaced by the hash
    pub explorer_tx_template: String,
}

/// Default token sweep threshold (USD)
pub const DEFAULT_USD_THRESHOLD: f64 = 5.0;

/// Default native sweep threshold (USD)
pub const DEFAULT_NATIVE_USD_THRESHOLD: f64 = 10.0;

/// Default poll interval (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

impl ChainProfile {
    /// Built-in profile for a supported chain
    pub fn for_chain(key: ChainKey) -> Self {
        let (name, native_symbol, explorer) = match key {
            ChainKey::Ethereum => ("Ethereum", "ETH", "https://etherscan.io/tx/{tx}"),
            ChainKey::Bsc => ("BNB Smart Chain", "BNB", "https://bscscan.com/tx/{tx}"),
            ChainKey::Polygon => ("Polygon", "POL", "https://polygonscan.com/tx/{tx}"),
            ChainKey::Arbitrum => ("Arbitrum One", "ETH", "https://arbiscan.io/tx/{tx}"),
            ChainKey::Optimism => (
                "Optimism",
                "ETH",
                "https://optimistic.etherscan.io/tx/{tx}",
            ),
            ChainKey::Avalanche => ("Avalanche C-Chain", "AVAX", "https://snowtrace.io/tx/{tx}"),
            ChainKey::Base => ("Base", "ETH", "https://basescan.org/tx/{tx}"),
        };

        Self {
            key,
            name: name.to_string(),
            chain_id: key.chain_id(),
            native_symbol: native_symbol.to_string(),
            native_decimals: 18,
            usd_threshold: DEFAULT_USD_THRESHOLD,
            native_usd_threshold: DEFAULT_NATIVE_USD_THRESHOLD,
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            explorer_tx_template: explorer.to_string(),
        }
    }

    /// Built-in profile with environment overrides applied:
    /// SWEEP_USD_THRESHOLD, SWEEP_NATIVE_USD_THRESHOLD,
    /// SWEEP_POLL_INTERVAL_SECS
    pub fn from_env(key: ChainKey) -> Self {
        let mut profile = Self::for_chain(key);

        if let Some(v) = env_f64("SWEEP_USD_THRESHOLD") {
            profile.usd_threshold = v;
        }
        if let Some(v) = env_f64("SWEEP_NATIVE_USD_THRESHOLD") {
            profile.native_usd_threshold = v;
        }
        if let Ok(raw) = std::env::var("SWEEP_POLL_INTERVAL_SECS") {
            if let Ok(secs) = raw.trim().parse::<u64>() {
                profile.poll_interval = Duration::from_secs(secs.max(5));
            }
        }

        profile
    }

    /// Explorer link for a transaction hash
    pub fn explorer_link(&self, tx_hash: &str) -> String {
        self.explorer_tx_template.replace("{tx}", tx_hash)
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok()?.trim().parse::<f64>().ok()
}
