//! Proof-of-work, transaction and chain validation
//!
//! Every check here is a pure function returning `bool`: a failed check is
//! an ordinary negative answer, never an error.

use crate::core::block::{hash_block, Block};
use crate::core::transaction::Transaction;
use crate::crypto::sha256_hex;
use serde_json::Value;

/// Required prefix of a valid proof-of-work hash
pub const POW_TARGET: &str = "000";

/// Bytes hashed for a proof guess: canonical transactions, previous hash, proof
fn proof_guess(transactions: &[Transaction], last_hash: &str, proof: u64) -> String {
    let projections: Vec<Value> = transactions.iter().map(Transaction::canonical).collect();
    format!("{}{}{}", Value::Array(projections), last_hash, proof)
}

/// Whether `proof` solves the puzzle for `transactions` on top of `last_hash`
pub fn valid_proof(transactions: &[Transaction], last_hash: &str, proof: u64) -> bool {
    let guess = proof_guess(transactions, last_hash, proof);
    sha256_hex(guess.as_bytes()).starts_with(POW_TARGET)
}

/// Payload present and signature valid
pub fn verify_transaction(tx: &Transaction) -> bool {
    tx.validate().is_ok()
}

/// Check hash links, proofs and signatures for every block after genesis.
///
/// Genesis is trusted and never re-verified.
pub fn verify_chain(chain: &[Block]) -> bool {
    for (index, pair) in chain.windows(2).enumerate() {
        let (previous, block) = (&pair[0], &pair[1]);

        if block.previous_hash != hash_block(previous) {
            log::warn!("Previous hash mismatch at block {}", index + 1);
            return false;
        }

        if !valid_proof(&block.transactions, &block.previous_hash, block.proof) {
            log::warn!("Proof of work is invalid at block {}", index + 1);
            return false;
        }

        if !block.transactions.iter().all(verify_transaction) {
            log::warn!("Invalid transaction sealed in block {}", index + 1);
            return false;
        }
    }

    true
}
