//! Core ledger components
//!
//! This module contains the fundamental building blocks:
//! - Transactions (signed hop-count measurements)
//! - Blocks (proof-of-work sealed, hash linked)
//! - Blockchain (append-only chain rooted at genesis)
//! - Validation (proof, transaction and chain checks)

pub mod block;
pub mod blockchain;
pub mod transaction;
pub mod validation;

pub use block::{hash_block, unix_timestamp, Block, GENESIS_PROOF};
pub use blockchain::{Blockchain, BlockchainError};
pub use transaction::{canonical_projection, sign_payload, Transaction, TransactionError};
pub use validation::{valid_proof, verify_chain, verify_transaction, POW_TARGET};
