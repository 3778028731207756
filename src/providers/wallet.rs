//! Wallet derivation and transaction signing
//!
//! Derives the monitored wallet from a BIP-39 recovery phrase and
//! signs transfers locally; only raw signed transactions ever leave
//! the process. The phrase itself is never logged or echoed in errors.

use alloy::consensus::{SignableTransaction, TxEip1559, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};
use alloy_primitives::{Address, Bytes, TxKind, U256};
use eyre::{eyre, Result};

use crate::models::errors::{AppError, AppResult};
use crate::models::types::FeeLevel;

/// Locally-derived signing wallet for one account
pub struct SweepWallet {
    signer: PrivateKeySigner,
    address: Address,
}

impl SweepWallet {
    /// Derive from a recovery phrase at the standard account index.
    /// An unparseable phrase is a configuration error.
    pub fn from_phrase(phrase: &str, index: u32) -> AppResult<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .index(index)
            .map_err(|_| AppError::invalid_secret())?
            .build()
            .map_err(|_| AppError::invalid_secret())?;

        let address = signer.address();
        Ok(Self { signer, address })
    }

    /// Wallet address
    pub fn address(&self) -> Address {
        self.address
    }

    /// Build, sign and EIP-2718-encode a transfer. Returns the raw
    /// transaction as a 0x-prefixed hex string ready for
    /// eth_sendRawTransaction.
    pub fn sign_transfer(
        &self,
        chain_id: u64,
        nonce: u64,
        to: Address,
        value: U256,
        input: Bytes,
        gas_limit: u64,
        fee: &FeeLevel,
    ) -> Result<String> {
        let encoded = match *fee {
            FeeLevel::Eip1559 {
                max_fee,
                priority_fee,
            } => {
                let mut tx = TxEip1559 {
                    chain_id,
                    nonce,
                    gas_limit,
                    max_fee_per_gas: max_fee,
                    max_priority_fee_per_gas: priority_fee,
                    to: TxKind::Call(to),
                    value,
                    access_list: Default::default(),
                    input,
                };
                let signature = self
                    .signer
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| eyre!("Signing failed: {}", e))?;
                TxEnvelope::from(tx.into_signed(signature)).encoded_2718()
            }
            FeeLevel::Legacy { gas_price } => {
                let mut tx = TxLegacy {
                    chain_id: Some(chain_id),
                    nonce,
                    gas_price,
                    gas_limit,
                    to: TxKind::Call(to),
                    value,
                    input,
                };
                let signature = self
                    .signer
                    .sign_transaction_sync(&mut tx)
                    .map_err(|e| eyre!("Signing failed: {}", e))?;
                TxEnvelope::from(tx.into_signed(signature)).encoded_2718()
            }
        };

        Ok(format!("0x{}", hex::encode(encoded)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The canonical BIP-39 test vector phrase
    const TEST_PHRASE: &str =
        "test test test test test test test test test test test junk";

    #[test]
    fn test_derivation_is_deterministic() {
        let a = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        let b = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_known_derivation_address() {
        // First account of the well-known hardhat/anvil dev phrase
        let wallet = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        assert_eq!(
            format!("{:#x}", wallet.address()),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_distinct_indices_distinct_addresses() {
        let a = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        let b = SweepWallet::from_phrase(TEST_PHRASE, 1).unwrap();
        assert_ne!(a.address(), b.address());
    }

    #[test]
    fn test_garbage_phrase_rejected() {
        let result = SweepWallet::from_phrase("definitely not a mnemonic", 0);
        assert!(result.is_err());
    }

    #[test]
    fn test_sign_transfer_produces_raw_hex() {
        let wallet = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        let raw = wallet
            .sign_transfer(
                1,
                0,
                Address::ZERO,
                U256::from(1u64),
                Bytes::new(),
                21_000,
                &FeeLevel::eip1559(30_000_000_000, 1_000_000_000),
            )
            .unwrap();
        assert!(raw.starts_with("0x02")); // EIP-1559 type byte
    }

    #[test]
    fn test_sign_legacy_transfer() {
        let wallet = SweepWallet::from_phrase(TEST_PHRASE, 0).unwrap();
        let raw = wallet
            .sign_transfer(
                56,
                7,
                Address::ZERO,
                U256::from(1u64),
                Bytes::new(),
                21_000,
                &FeeLevel::Legacy {
                    gas_price: 5_000_000_000,
                },
            )
            .unwrap();
        assert!(raw.starts_with("0x"));
        assert!(!raw.starts_with("0x02"));
    }
}
