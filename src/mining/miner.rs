//! Proof-of-work search
//!
//! A blocking, CPU-bound brute force over the proof value. There is no
//! timeout and no cancellation; async callers should run it on a blocking
//! thread.

use crate::core::{valid_proof, Transaction};
use log::info;
use std::time::Instant;

/// Mining statistics
#[derive(Debug, Clone)]
pub struct MiningStats {
    /// Number of hash attempts
    pub hash_attempts: u64,
    /// Time taken in milliseconds
    pub time_ms: u128,
    /// Hash rate (hashes per second)
    pub hash_rate: f64,
}

/// Search upward from zero for the first proof satisfying [`valid_proof`]
pub fn proof_of_work(transactions: &[Transaction], last_hash: &str) -> (u64, MiningStats) {
    let start = Instant::now();

    let mut proof = 0u64;
    while !valid_proof(transactions, last_hash, proof) {
        proof += 1;
    }

    let attempts = proof + 1;
    let elapsed = start.elapsed().as_millis();
    let hash_rate = if elapsed > 0 {
        (attempts as f64) / (elapsed as f64 / 1000.0)
    } else {
        attempts as f64
    };

    info!(
        "Proof {} found over {} transactions in {}ms ({} attempts, {:.2} H/s)",
        proof,
        transactions.len(),
        elapsed,
        attempts,
        hash_rate
    );

    (
        proof,
        MiningStats {
            hash_attempts: attempts,
            time_ms: elapsed,
            hash_rate,
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Block;
    use serde_json::json;

    #[test]
    fn test_proof_of_work_satisfies_puzzle() {
        let txs = vec![
            Transaction::new("aa", "s1", json!(3)),
            Transaction::new("bb", "s2", json!(8)),
        ];
        let last_hash = Block::genesis().hash();

        let (proof, stats) = proof_of_work(&txs, &last_hash);

        assert!(valid_proof(&txs, &last_hash, proof));
        assert_eq!(stats.hash_attempts, proof + 1);
    }

    #[test]
    fn test_proof_of_work_is_first_solution() {
        let last_hash = Block::genesis().hash();
        let (proof, _) = proof_of_work(&[], &last_hash);

        assert!(valid_proof(&[], &last_hash, proof));
        assert!((0..proof).all(|p| !valid_proof(&[], &last_hash, p)));
    }

    #[test]
    fn test_proof_of_work_is_deterministic() {
        let txs = vec![Transaction::new("aa", "s1", json!(1))];
        assert_eq!(proof_of_work(&txs, "x").0, proof_of_work(&txs, "x").0);
    }
}
