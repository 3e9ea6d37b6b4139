//! Ledger persistence layer
//!
//! One JSON document per concern and node id under the data directory:
//! `blockchain-{id}.json`, `opentx-{id}.json`, `peernodes-{id}.json` and
//! `wallet-{id}.json`. Every write is a full overwrite through a temp file
//! and an atomic rename.

use crate::core::Blockchain;
use crate::mining::Mempool;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
        }
    }
}

/// Everything a node restores at startup
#[derive(Debug, Clone, Default)]
pub struct LoadedLedger {
    pub chain: Blockchain,
    pub pool: Mempool,
    pub peers: BTreeSet<String>,
}

/// Persisted wallet key pair in hex transport form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeys {
    pub public_key: String,
    pub private_key: String,
}

/// Ledger storage manager
pub struct Storage {
    config: StorageConfig,
}

impl Storage {
    /// Create a new storage manager, creating the data directory if needed
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    fn chain_path(&self, node_id: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("blockchain-{}.json", node_id))
    }

    fn pool_path(&self, node_id: &str) -> PathBuf {
        self.config.data_dir.join(format!("opentx-{}.json", node_id))
    }

    fn peers_path(&self, node_id: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("peernodes-{}.json", node_id))
    }

    fn wallet_path(&self, node_id: &str) -> PathBuf {
        self.config.data_dir.join(format!("wallet-{}.json", node_id))
    }

    /// Load chain, pool and peers for `node_id`.
    ///
    /// A missing or unreadable document silently falls back to its default:
    /// genesis-only chain, empty pool, no peers.
    pub fn load(&self, node_id: &str) -> LoadedLedger {
        LoadedLedger {
            chain: self.read_or_default(&self.chain_path(node_id)),
            pool: self.read_or_default(&self.pool_path(node_id)),
            peers: self.read_or_default(&self.peers_path(node_id)),
        }
    }

    /// Persist whichever parts are given.
    ///
    /// Each part is written independently; a failure on one does not stop
    /// the others. The first error encountered is returned.
    pub fn save(
        &self,
        node_id: &str,
        chain: Option<&Blockchain>,
        pool: Option<&Mempool>,
        peers: Option<&BTreeSet<String>>,
    ) -> Result<(), StorageError> {
        let mut outcome = Ok(());

        if let Some(chain) = chain {
            outcome = outcome.and(write_json(&self.chain_path(node_id), chain));
        }
        if let Some(pool) = pool {
            let written = write_json(&self.pool_path(node_id), pool);
            outcome = outcome.and(written);
        }
        if let Some(peers) = peers {
            let written = write_json(&self.peers_path(node_id), peers);
            outcome = outcome.and(written);
        }

        outcome
    }

    /// Persist the node's wallet keys
    pub fn save_keys(&self, node_id: &str, keys: &StoredKeys) -> Result<(), StorageError> {
        write_json(&self.wallet_path(node_id), keys)
    }

    /// Load the node's wallet keys, `None` if never saved
    pub fn load_keys(&self, node_id: &str) -> Result<Option<StoredKeys>, StorageError> {
        let path = self.wallet_path(node_id);
        if !path.exists() {
            return Ok(None);
        }
        read_json(&path).map(Some)
    }

    fn read_or_default<T: DeserializeOwned + Default>(&self, path: &Path) -> T {
        if !path.exists() {
            return T::default();
        }
        match read_json(path) {
            Ok(value) => value,
            Err(e) => {
                log::debug!("Ignoring unreadable {}: {}", path.display(), e);
                T::default()
            }
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    // Write to temporary file first
    let temp_path = path.with_extension("tmp");
    let file = fs::File::create(&temp_path)?;
    let writer = BufWriter::new(file);

    serde_json::to_writer_pretty(writer, value)?;

    // Atomic rename
    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Block, Transaction};
    use serde_json::json;

    fn storage_in(dir: &tempfile::TempDir) -> Storage {
        Storage::new(StorageConfig {
            data_dir: dir.path().to_path_buf(),
        })
        .unwrap()
    }

    #[test]
    fn test_missing_files_fall_back_to_genesis() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&temp_dir);

        let loaded = storage.load("5000");
        assert_eq!(loaded.chain, Blockchain::new());
        assert!(loaded.pool.is_empty());
        assert!(loaded.peers.is_empty());
    }

    #[test]
    fn test_save_load_ledger() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&temp_dir);

        let mut chain = Blockchain::new();
        chain.push(Block::new(1, chain.tip().hash(), vec![], 7));
        let mut pool = Mempool::new();
        pool.push(Transaction::new("aa", "bb", json!(4)));
        let peers: BTreeSet<String> = ["localhost:5001".to_string()].into_iter().collect();

        storage
            .save("5000", Some(&chain), Some(&pool), Some(&peers))
            .unwrap();

        let loaded = storage.load("5000");
        assert_eq!(loaded.chain, chain);
        assert_eq!(loaded.pool, pool);
        assert_eq!(loaded.peers, peers);

        // Other node ids are isolated
        assert_eq!(storage.load("5001").chain.len(), 1);
    }

    #[test]
    fn test_partial_save_leaves_other_parts() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&temp_dir);

        let mut pool = Mempool::new();
        pool.push(Transaction::new("aa", "bb", json!(4)));
        storage.save("1", None, Some(&pool), None).unwrap();

        let peers: BTreeSet<String> = ["a:1".to_string()].into_iter().collect();
        storage.save("1", None, None, Some(&peers)).unwrap();

        let loaded = storage.load("1");
        assert_eq!(loaded.pool, pool);
        assert_eq!(loaded.peers, peers);
    }

    #[test]
    fn test_corrupt_file_falls_back_silently() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&temp_dir);

        fs::write(temp_dir.path().join("blockchain-9.json"), "{not json").unwrap();
        fs::write(temp_dir.path().join("opentx-9.json"), "42").unwrap();

        let loaded = storage.load("9");
        assert_eq!(loaded.chain, Blockchain::new());
        assert!(loaded.pool.is_empty());
    }

    #[test]
    fn test_keys_round_trip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = storage_in(&temp_dir);

        assert!(storage.load_keys("7").unwrap().is_none());

        let keys = StoredKeys {
            public_key: "02ab".to_string(),
            private_key: "cd".to_string(),
        };
        storage.save_keys("7", &keys).unwrap();

        let loaded = storage.load_keys("7").unwrap().unwrap();
        assert_eq!(loaded.public_key, "02ab");
        assert_eq!(loaded.private_key, "cd");
    }
}
