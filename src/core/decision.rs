//! Sweep Decision Engine
//!
//! Pure functions: given balances, cached prices and a gas budget,
//! decide what gets swept this cycle and in what order. No I/O here,
//! which is what makes the thresholds and dust rules unit-testable.

use std::cmp::Ordering;
use std::collections::HashMap;

use alloy_primitives::U256;
use tracing::debug;

use crate::core::gas::native_transfer_cost;
use crate::models::config::ChainProfile;
use crate::models::types::{FeeLevel, NativeSweep, SweepPlan, TokenBalance, TransferCandidate};
use crate::utils::convert::{normalize_symbol, to_readable};

/// Filter token balances to those worth sweeping and order them by
/// descending USD value, so the highest-value transfers execute first
/// and the most value moves before any later step can exhaust gas.
///
/// A price of 0.0 means "unknown - do not sweep", never "worthless":
/// sweeping an unpriced asset risks moving something valuable that
/// merely failed a lookup.
pub fn select_tokens(
    balances: &[TokenBalance],
    prices: &HashMap<String, f64>,
    usd_threshold: f64,
) -> Vec<TransferCandidate> {
    let mut kept: Vec<TransferCandidate> = Vec::new();

    for balance in balances {
        let price = prices
            .get(&normalize_symbol(&balance.symbol))
            .copied()
            .unwrap_or(0.0);
        if price <= 0.0 {
            debug!("Price unknown for {}, not sweeping", balance.symbol);
            continue;
        }

        let readable = to_readable(balance.raw_amount, balance.decimals);
        let usd_value = readable * price;
        if usd_value >= usd_threshold {
            kept.push(TransferCandidate {
                token: balance.clone(),
                readable,
                usd_value,
            });
        } else {
            debug!(
                "{} worth ${:.2}, below ${:.2} threshold",
                balance.symbol, usd_value, usd_threshold
            );
        }
    }

    kept.sort_by(|a, b| {
        b.usd_value
            .partial_cmp(&a.usd_value)
            .unwrap_or(Ordering::Equal)
    });
    kept
}

/// Assemble the final transfer plan for one tick.
///
/// - If the native balance cannot fund the combined operation (its own
///   transfer plus the token gas reserve) while tokens are kept, the
///   whole cycle is skipped: the wallet is dust relative to the work,
///   and partial sweeps are not attempted.
/// - The native sweep moves `balance - transfer cost - token reserve`,
///   never the full balance, and only when that remainder clears the
///   native USD threshold.
pub fn plan_sweep(
    profile: &ChainProfile,
    native_balance: U256,
    native_price: f64,
    fee: &FeeLevel,
    tokens: Vec<TransferCandidate>,
    token_reserve: U256,
) -> SweepPlan {
    let native_cost = native_transfer_cost(fee);

    if !tokens.is_empty() {
        let minimum_needed = native_cost + token_reserve;
        if native_balance < minimum_needed {
            debug!(
                "Dust wallet on {}: balance {} below required {} for {} transfers, skipping cycle",
                profile.name,
                native_balance,
                minimum_needed,
                tokens.len() + 1
            );
            return SweepPlan::empty();
        }
    }

    let mut native = None;
    let sweepable = native_balance
        .checked_sub(native_cost)
        .and_then(|rest| rest.checked_sub(token_reserve))
        .unwrap_or(U256::ZERO);

    if sweepable > U256::ZERO {
        if native_price > 0.0 {
            let readable = to_readable(sweepable, profile.native_decimals);
            let usd_value = readable * native_price;
            if usd_value >= profile.native_usd_threshold {
                native = Some(NativeSweep {
                    amount: sweepable,
                    readable,
                    usd_value,
                });
            } else {
                debug!(
                    "Sweepable {} worth ${:.2}, below ${:.2} native threshold",
                    profile.native_symbol, usd_value, profile.native_usd_threshold
                );
            }
        } else {
            debug!(
                "Price unknown for native {}, not sweeping",
                profile.native_symbol
            );
        }
    }

    SweepPlan { native, tokens }
}
