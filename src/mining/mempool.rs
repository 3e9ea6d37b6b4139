//! Pending transaction pool
//!
//! Holds admitted transactions in arrival order until a block seals them.
//! Membership is by full `(owner, signature, payload)` identity.

use crate::core::Transaction;
use serde::{Deserialize, Serialize};

/// Transactions admitted but not yet included in any block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mempool {
    transactions: Vec<Transaction>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an already validated transaction
    pub fn push(&mut self, tx: Transaction) {
        self.transactions.push(tx);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Owned copy in arrival order
    pub fn snapshot(&self) -> Vec<Transaction> {
        self.transactions.clone()
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    /// Drop every pooled transaction that appears in `included`.
    ///
    /// Returns how many were removed.
    pub fn remove_included(&mut self, included: &[Transaction]) -> usize {
        let before = self.transactions.len();
        self.transactions.retain(|tx| !included.contains(tx));
        before - self.transactions.len()
    }
}
