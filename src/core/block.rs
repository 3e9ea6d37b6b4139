//! Block implementation for the ledger
//!
//! A block seals an ordered list of transactions under a proof-of-work
//! value and links to its predecessor by hash.

use crate::core::transaction::Transaction;
use crate::crypto::sha256_hex;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Proof value stored in the genesis block
pub const GENESIS_PROOF: u64 = 100;

/// A block in the chain.
///
/// Wire field names are `index`, `previous_hash`, `transactions`, `proof`
/// and `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain (0 = genesis)
    pub index: u64,
    /// Hash of the block at `index - 1`, empty for genesis
    pub previous_hash: String,
    /// Sealed transactions in construction order
    pub transactions: Vec<Transaction>,
    /// Proof-of-work solution
    pub proof: u64,
    /// Seconds since the Unix epoch
    #[serde(default)]
    pub timestamp: f64,
}

impl Block {
    /// Create a block stamped with the current wall-clock time
    pub fn new(
        index: u64,
        previous_hash: String,
        transactions: Vec<Transaction>,
        proof: u64,
    ) -> Self {
        Self {
            index,
            previous_hash,
            transactions,
            proof,
            timestamp: unix_timestamp(),
        }
    }

    /// The fixed genesis block shared by every node
    pub fn genesis() -> Self {
        Self {
            index: 0,
            previous_hash: String::new(),
            transactions: Vec::new(),
            proof: GENESIS_PROOF,
            timestamp: 0.0,
        }
    }

    pub fn hash(&self) -> String {
        hash_block(self)
    }

    /// Get number of transactions in this block
    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }
}

/// Current time as fractional Unix seconds
pub fn unix_timestamp() -> f64 {
    Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Canonical form hashed by [`hash_block`]: keys in fixed order, transactions
/// in block order, signatures included.
fn canonical_block(block: &Block) -> Value {
    let transactions: Vec<Value> = block
        .transactions
        .iter()
        .map(|tx| {
            json!({
                "dataOwner": tx.owner,
                "hop_count": tx.payload,
                "signature": tx.signature,
            })
        })
        .collect();

    json!({
        "index": block.index,
        "previous_hash": block.previous_hash,
        "proof": block.proof,
        "timestamp": block.timestamp,
        "transactions": transactions,
    })
}

/// SHA-256 hex digest of the block's canonical serialization
pub fn hash_block(block: &Block) -> String {
    sha256_hex(canonical_block(block).to_string().as_bytes())
}
