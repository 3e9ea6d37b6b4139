//! Hop-ledger: a single-writer proof-of-work ledger for signed hop counts
//!
//! Each node keeps a hash-linked chain of blocks whose transactions carry a
//! hop-count measurement signed by its owner (secp256k1). Pending
//! transactions are sealed into blocks by a leading-zero hash puzzle,
//! relayed to peers over HTTP, and disagreements are settled by adopting
//! the longest valid chain among peers.
//!
//! # Example
//!
//! ```rust
//! use hop_ledger::core::{verify_chain, Blockchain};
//! use hop_ledger::mining::proof_of_work;
//! use hop_ledger::wallet::Wallet;
//! use serde_json::json;
//!
//! let mut chain = Blockchain::new();
//! let wallet = Wallet::new();
//! let tx = wallet.sign_transaction(json!(4)).unwrap();
//!
//! let last_hash = chain.tip().hash();
//! let (proof, _stats) = proof_of_work(&[tx.clone()], &last_hash);
//! chain.push(hop_ledger::core::Block::new(1, last_hash, vec![tx], proof));
//!
//! assert!(verify_chain(chain.blocks()));
//! ```

pub mod api;
pub mod core;
pub mod crypto;
pub mod mining;
pub mod network;
pub mod storage;
pub mod wallet;

// Re-export commonly used types
pub use api::{create_router, ApiState};
pub use core::{Block, Blockchain, Transaction};
pub use crypto::KeyPair;
pub use mining::Mempool;
pub use network::{HttpPeerGateway, Node, NodeConfig, PeerGateway};
pub use storage::Storage;
pub use wallet::Wallet;
