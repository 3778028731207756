//! Gas Budgeter Module
//!
//! Translates network fee conditions into the native-currency reserve
//! a sweep needs: one native transfer plus N pending token transfers.
//! Fees are boosted ~50% over the suggested level to bias toward fast
//! confirmation - a stuck sweep costs more than an expensive one.

use alloy_primitives::{Address, U256};
use tracing::warn;

use crate::models::types::{FeeLevel, SuggestedFees, TransferCandidate};
use crate::providers::ChainGateway;
use crate::utils::constants::{
    FALLBACK_GAS_PRICE_GWEI, FEE_BOOST_DEN, FEE_BOOST_NUM, GAS_BUFFER_DEN, GAS_BUFFER_NUM, GWEI,
    NATIVE_TRANSFER_GAS, TOKEN_TRANSFER_FALLBACK_GAS,
};

/// Current fee level with the aggressive boost applied. Fee-data
/// failure falls back to a fixed high level rather than skipping the
/// tick.
pub async fn fee_level(gateway: &dyn ChainGateway) -> FeeLevel {
    match gateway.suggested_fees().await {
        Ok(suggested) => aggressive(suggested),
        Err(e) => {
            warn!(
                "⚠️ Fee data unavailable, using fixed fallback of {} gwei: {}",
                FALLBACK_GAS_PRICE_GWEI, e
            );
            FeeLevel::Legacy {
                gas_price: FALLBACK_GAS_PRICE_GWEI * GWEI,
            }
        }
    }
}

/// Boost the suggested level by 50%. The tip is boosted too but never
/// allowed past the cap.
fn aggressive(suggested: SuggestedFees) -> FeeLevel {
    let boosted = suggested.gas_price * FEE_BOOST_NUM / FEE_BOOST_DEN;
    match suggested.priority_fee {
        Some(tip) => FeeLevel::eip1559(boosted, tip * FEE_BOOST_NUM / FEE_BOOST_DEN),
        None => FeeLevel::Legacy { gas_price: boosted },
    }
}

/// Cost of one plain native transfer at this fee level
pub fn native_transfer_cost(fee: &FeeLevel) -> U256 {
    U256::from(NATIVE_TRANSFER_GAS) * U256::from(fee.effective_price())
}

/// Apply the per-transfer safety buffer (+20%) to a gas estimate
pub fn with_gas_buffer(units: u64) -> u64 {
    units * GAS_BUFFER_NUM / GAS_BUFFER_DEN
}

/// Native reserve required to move every candidate token: per-token
/// estimate (conservative fallback when estimation fails), each
/// buffered individually, summed at the effective price.
pub async fn token_transfer_reserve(
    gateway: &dyn ChainGateway,
    dest: Address,
    tokens: &[TransferCandidate],
    fee: &FeeLevel,
) -> U256 {
    let mut reserve = U256::ZERO;
    for candidate in tokens {
        let units = match gateway
            .estimate_token_transfer_gas(dest, &candidate.token)
            .await
        {
            Ok(units) => units,
            Err(e) => {
                warn!(
                    "⚠️ Gas estimation failed for {}, using fallback of {} units: {}",
                    candidate.token.symbol, TOKEN_TRANSFER_FALLBACK_GAS, e
                );
                TOKEN_TRANSFER_FALLBACK_GAS
            }
        };
        reserve += U256::from(with_gas_buffer(units)) * U256::from(fee.effective_price());
    }
    reserve
}
