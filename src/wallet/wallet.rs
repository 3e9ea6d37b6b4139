//! Wallet implementation for the ledger
//!
//! A wallet is the node's signing identity: a secp256k1 key pair that owns
//! and signs the hop-count transactions this node originates.

use crate::core::{Transaction, TransactionError};
use crate::crypto::{KeyError, KeyPair};
use crate::storage::{Storage, StorageError, StoredKeys};
use serde_json::Value;
use thiserror::Error;

/// Wallet-related errors
#[derive(Error, Debug)]
pub enum WalletError {
    #[error("No wallet saved for node {0}")]
    NotFound(String),
    #[error("Stored public key does not match private key")]
    KeyMismatch,
    #[error("Transaction error: {0}")]
    TransactionError(#[from] TransactionError),
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),
    #[error("Crypto error: {0}")]
    CryptoError(#[from] KeyError),
}

/// The node's signing identity
#[derive(Clone)]
pub struct Wallet {
    key_pair: KeyPair,
}

impl Wallet {
    /// Create a new wallet with a fresh key pair
    pub fn new() -> Self {
        Self {
            key_pair: KeyPair::generate(),
        }
    }

    /// Import a wallet from a private key
    pub fn from_private_key(private_key_hex: &str) -> Result<Self, WalletError> {
        let key_pair = KeyPair::from_private_key_hex(private_key_hex)?;
        Ok(Self { key_pair })
    }

    /// Get the wallet's public key (hex), used as `dataOwner`
    pub fn public_key(&self) -> String {
        self.key_pair.public_key_hex()
    }

    /// Get the wallet's private key (hex)
    /// WARNING: Keep this secret!
    pub fn private_key(&self) -> String {
        self.key_pair.private_key_hex()
    }

    /// Sign `payload` as a transaction owned by this wallet
    pub fn sign_transaction(&self, payload: Value) -> Result<Transaction, WalletError> {
        Ok(Transaction::signed(&self.key_pair, payload)?)
    }

    /// Persist this wallet for `node_id`
    pub fn save(&self, storage: &Storage, node_id: &str) -> Result<(), WalletError> {
        let keys = StoredKeys {
            public_key: self.public_key(),
            private_key: self.private_key(),
        };
        storage.save_keys(node_id, &keys)?;
        Ok(())
    }

    /// Load the wallet saved for `node_id`
    pub fn load(storage: &Storage, node_id: &str) -> Result<Self, WalletError> {
        let keys = storage
            .load_keys(node_id)?
            .ok_or_else(|| WalletError::NotFound(node_id.to_string()))?;

        let wallet = Self::from_private_key(&keys.private_key)?;
        if wallet.public_key() != keys.public_key {
            return Err(WalletError::KeyMismatch);
        }
        Ok(wallet)
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::verify_transaction;
    use crate::storage::StorageConfig;
    use serde_json::json;

    #[test]
    fn test_sign_transaction() {
        let wallet = Wallet::new();
        let tx = wallet.sign_transaction(json!(6)).unwrap();

        assert_eq!(tx.owner, wallet.public_key());
        assert!(verify_transaction(&tx));
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        })
        .unwrap();

        assert!(matches!(
            Wallet::load(&storage, "5000"),
            Err(WalletError::NotFound(_))
        ));

        let wallet = Wallet::new();
        wallet.save(&storage, "5000").unwrap();

        let loaded = Wallet::load(&storage, "5000").unwrap();
        assert_eq!(loaded.public_key(), wallet.public_key());
        assert_eq!(loaded.private_key(), wallet.private_key());
    }

    #[test]
    fn test_mismatched_keys_rejected() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = Storage::new(StorageConfig {
            data_dir: temp_dir.path().to_path_buf(),
        })
        .unwrap();

        let keys = StoredKeys {
            public_key: Wallet::new().public_key(),
            private_key: Wallet::new().private_key(),
        };
        storage.save_keys("1", &keys).unwrap();

        assert!(matches!(
            Wallet::load(&storage, "1"),
            Err(WalletError::KeyMismatch)
        ));
    }
}
