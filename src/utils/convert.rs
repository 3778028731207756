//! Amount conversion helpers
//!
//! Raw on-chain amounts stay `U256` everywhere; `f64` exists only for
//! USD-value comparisons after conversion to a human-readable decimal.

use alloy_primitives::U256;
use eyre::{eyre, Result};

/// Convert a raw token amount to its human-readable decimal value.
///
/// Saturates at `u128::MAX` for absurdly large balances; a saturated
/// value still compares correctly against any realistic USD threshold.
pub fn to_readable(raw: U256, decimals: u8) -> f64 {
    let raw_u128: u128 = raw.try_into().unwrap_or(u128::MAX);
    raw_u128 as f64 / 10f64.powi(decimals as i32)
}

/// Normalize a token symbol for cache keys ("ETH" and "eth" are one entry)
#[inline]
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_lowercase()
}

/// Parse a JSON-RPC hex quantity ("0x1b4") into U256
pub fn parse_hex_u256(value: &str) -> Result<U256> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(stripped, 16).map_err(|e| eyre!("Invalid hex quantity '{}': {}", value, e))
}

/// Parse a JSON-RPC hex quantity into u64
pub fn parse_hex_u64(value: &str) -> Result<u64> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.is_empty() {
        return Ok(0);
    }
    u64::from_str_radix(stripped, 16).map_err(|e| eyre!("Invalid hex quantity '{}': {}", value, e))
}

/// Parse a JSON-RPC hex quantity into u128
pub fn parse_hex_u128(value: &str) -> Result<u128> {
    let stripped = value.strip_prefix("0x").unwrap_or(value);
    if stripped.is_empty() {
        return Ok(0);
    }
    u128::from_str_radix(stripped, 16).map_err(|e| eyre!("Invalid hex quantity '{}': {}", value, e))
}

/// Format an amount for notifications: enough precision for small
/// balances without drowning users in digits.
pub fn format_readable(value: f64) -> String {
    if value >= 1.0 {
        format!("{:.4}", value)
    } else {
        format!("{:.6}", value)
    }
}

/// Shorten an address or hash for log/notification display
pub fn short_hex(value: &str) -> String {
    if value.len() > 12 {
        format!("{}…{}", &value[..8], &value[value.len() - 4..])
    } else {
        value.to_string()
    }
}
