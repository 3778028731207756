//! Constants Module - Single Source of Truth
//!
//! Semua konstanta dan nilai default yang dipakai di seluruh aplikasi
//! didefinisikan di sini. Tidak ada hardcoded values di modul lain!

// ============================================
// APPLICATION CONSTANTS
// ============================================

/// Application name
pub const APP_NAME: &str = "AutoSweep";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// User-Agent for HTTP requests (Alchemy dashboard monitoring)
pub const USER_AGENT: &str = "AutoSweep/0.1.0";

// ============================================
// RPC CONSTANTS
// ============================================

/// Default timeout for RPC requests (seconds)
pub const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Maximum retry attempts per RPC endpoint
pub const RPC_MAX_RETRIES: u32 = 3;

/// Base delay for RPC exponential backoff (milliseconds)
pub const RPC_BASE_RETRY_DELAY_MS: u64 = 100;

// ============================================
// GAS CONSTANTS
// ============================================

/// Gas units consumed by a plain native-currency transfer
pub const NATIVE_TRANSFER_GAS: u64 = 21_000;

/// Conservative gas estimate for an ERC-20 transfer when eth_estimateGas fails
pub const TOKEN_TRANSFER_FALLBACK_GAS: u64 = 65_000;

/// Safety buffer applied to every token gas estimate: +20%
pub const GAS_BUFFER_NUM: u64 = 120;
pub const GAS_BUFFER_DEN: u64 = 100;

/// Aggressive fee boost over the network-suggested level: +50%
pub const FEE_BOOST_NUM: u128 = 3;
pub const FEE_BOOST_DEN: u128 = 2;

/// Fixed fallback fee when fee data cannot be fetched at all (gwei).
/// Deliberately high: a stuck sweep costs more than an expensive one.
pub const FALLBACK_GAS_PRICE_GWEI: u128 = 100;

/// One gwei in wei
pub const GWEI: u128 = 1_000_000_000;

// ============================================
// PRICE CACHE CONSTANTS
// ============================================

/// Maximum symbols per oracle batch request
pub const PRICE_BATCH_SIZE: usize = 30;

/// Entry is served without a refresh while younger than this (seconds)
pub const PRICE_FRESH_TTL_SECS: u64 = 60;

/// Entries older than this are evicted by clear_expired (seconds).
/// Between the fresh TTL and this horizon an entry is stale but kept
/// as a degraded fallback.
pub const PRICE_EVICT_HORIZON_SECS: u64 = 3_600;

/// Maximum fetch attempts per batch before serving cache only
pub const PRICE_FETCH_MAX_RETRIES: u32 = 3;

/// Base delay for oracle exponential backoff (milliseconds)
pub const PRICE_BASE_RETRY_DELAY_MS: u64 = 500;

/// Minimum gap between two oracle requests (milliseconds)
pub const PRICE_MIN_REQUEST_GAP_MS: u64 = 1_000;

/// How long a coalesced caller waits for the in-flight fetch (seconds)
pub const PRICE_COALESCE_WAIT_SECS: u64 = 20;

// ============================================
// SWEEP CYCLE CONSTANTS
// ============================================

/// Bounded wait for a transaction receipt (seconds).
/// A timeout is NOT a failure: the transfer was broadcast.
pub const CONFIRMATION_TIMEOUT_SECS: u64 = 60;

/// Receipt polling interval during the confirmation wait (milliseconds)
pub const RECEIPT_POLL_INTERVAL_MS: u64 = 3_000;

/// Maximum tracked token contracts per wallet per tick
pub const MAX_TRACKED_TOKENS: usize = 25;

// ============================================
// BOOKKEEPING CONSTANTS
// ============================================

/// Soft cap on remembered transaction ids
pub const DEDUP_SOFT_CAP: usize = 1_000;

/// Trim target when the cap is exceeded (most recent kept)
pub const DEDUP_TRIM_TO: usize = 500;

/// Accounts with no interaction for this long get their cycles purged (seconds)
pub const ACCOUNT_IDLE_HORIZON_SECS: u64 = 86_400;

// ============================================
// CHAIN IDS - Single Source of Truth
// ============================================

/// Ethereum Mainnet
pub const CHAIN_ID_ETHEREUM: u64 = 1;
/// BNB Smart Chain
pub const CHAIN_ID_BSC: u64 = 56;
/// Polygon
pub const CHAIN_ID_POLYGON: u64 = 137;
/// Arbitrum One
pub const CHAIN_ID_ARBITRUM: u64 = 42161;
/// Optimism
pub const CHAIN_ID_OPTIMISM: u64 = 10;
/// Avalanche C-Chain
pub const CHAIN_ID_AVALANCHE: u64 = 43114;
/// Base
pub const CHAIN_ID_BASE: u64 = 8453;
