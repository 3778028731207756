//! Shared domain types for the sweep engine

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, U256};

use crate::models::config::ChainKey;

/// Composite identity of one running sweep cycle: (account, chain).
/// At most one active cycle exists per key at any time - this is the
/// central concurrency invariant of the whole system.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SweepKey {
    pub account_id: String,
    pub chain: ChainKey,
}

impl SweepKey {
    pub fn new(account_id: impl Into<String>, chain: ChainKey) -> Self {
        Self {
            account_id: account_id.into(),
            chain,
        }
    }
}

impl fmt::Display for SweepKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.account_id, self.chain)
    }
}

/// A non-zero ERC-20 balance held by the monitored wallet
#[derive(Debug, Clone)]
pub struct TokenBalance {
    /// Token contract address
    pub contract: Address,
    /// Raw on-chain amount (smallest unit)
    pub raw_amount: U256,
    /// Token symbol as reported by metadata
    pub symbol: String,
    /// Token decimal precision
    pub decimals: u8,
}

/// Network-suggested fee data, prior to the aggressive boost
#[derive(Debug, Clone, Copy)]
pub struct SuggestedFees {
    /// Legacy gas price / fee cap basis (wei)
    pub gas_price: u128,
    /// Priority fee (tip) when the chain supports the dual-fee model
    pub priority_fee: Option<u128>,
}

/// Effective fee level used for submissions this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeLevel {
    /// Single-price (legacy) fee model
    Legacy { gas_price: u128 },
    /// Dual-fee model: tip + cap. Invariant: priority_fee <= max_fee.
    Eip1559 { max_fee: u128, priority_fee: u128 },
}

impl FeeLevel {
    /// Build a dual-fee level, clamping the tip to the cap
    pub fn eip1559(max_fee: u128, priority_fee: u128) -> Self {
        Self::Eip1559 {
            max_fee,
            priority_fee: priority_fee.min(max_fee),
        }
    }

    /// Worst-case price per gas unit, used for reserve budgeting
    pub fn effective_price(&self) -> u128 {
        match self {
            Self::Legacy { gas_price } => *gas_price,
            Self::Eip1559 { max_fee, .. } => *max_fee,
        }
    }
}

/// A token transfer judged sweep-worthy this cycle. Transient:
/// rebuilt fresh on every tick, never persisted.
#[derive(Debug, Clone)]
pub struct TransferCandidate {
    pub token: TokenBalance,
    /// Human-readable amount (raw / 10^decimals)
    pub readable: f64,
    /// USD valuation at the cached price
    pub usd_value: f64,
}

/// The native portion of a sweep plan. `amount` is the balance minus
/// the gas reserve, never the full balance.
#[derive(Debug, Clone)]
pub struct NativeSweep {
    pub amount: U256,
    pub readable: f64,
    pub usd_value: f64,
}

/// Ordered transfer plan for one tick: native first (so the token gas
/// reserve is not spent by the native sweep), then tokens in
/// descending USD value.
#[derive(Debug, Clone, Default)]
pub struct SweepPlan {
    pub native: Option<NativeSweep>,
    pub tokens: Vec<TransferCandidate>,
}

impl SweepPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_none() && self.tokens.is_empty()
    }

    /// Number of transfers this plan will submit
    pub fn len(&self) -> usize {
        self.tokens.len() + usize::from(self.native.is_some())
    }
}

/// Outcome of a bounded confirmation wait
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmStatus {
    /// Receipt observed with success status
    Confirmed,
    /// Receipt observed with revert status
    Reverted,
    /// No receipt within the bounded wait. NOT a failure: the
    /// transaction was broadcast and may still confirm later.
    Pending,
}

/// Callback invoked once per user-visible sweep event. The chat/bot
/// front-end supplies this; the core never formats chat markup.
pub type NotifyFn = Arc<dyn Fn(String) + Send + Sync>;

/// Aggregate registry statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalStats {
    /// Accounts with at least one active cycle
    pub active_accounts: usize,
    /// Running sweep cycles across all accounts and chains
    pub active_sweeps: usize,
    /// Transfers notified since startup (deduplicated)
    pub notified_transfers: usize,
}
