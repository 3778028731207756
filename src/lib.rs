//! AutoSweep Library
//!
//! Automated fund-sweeping engine: polls a derived wallet across one
//! or more EVM networks and moves any balance above a USD threshold to
//! a fixed destination, after reserving enough native currency to pay
//! the fees:
//! - Batched, coalesced, rate-limit-aware USD price cache
//! - Gas budgeting with aggressive fees and dust suppression
//! - One independent, cooperatively-cancelled cycle per (account, chain)
//! - Deduplicated user notifications across confirmation retries

pub mod core;
pub mod models;
pub mod providers;
pub mod utils;

pub use crate::core::{plan_sweep, select_tokens, CacheStats, Deduplicator, PriceCache, SweepCycle, SweepRegistry};
pub use models::config::{ChainKey, ChainProfile};
pub use models::errors::{AppError, AppResult, ErrorCode};
pub use models::types::{
    ConfirmStatus, FeeLevel, GlobalStats, NativeSweep, NotifyFn, SuggestedFees, SweepKey,
    SweepPlan, TokenBalance, TransferCandidate,
};
pub use providers::{
    AlchemyPriceSource, ChainGateway, EvmGatewayBuilder, GatewayBuilder, PriceSource,
};
