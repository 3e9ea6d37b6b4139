//! Blockchain implementation
//!
//! The append-only sequence of blocks, always rooted at the fixed genesis
//! block. Blocks are never edited in place: the chain grows by appending or
//! is swapped wholesale for a longer valid chain.

use crate::core::block::Block;
use crate::core::validation::verify_chain;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Blockchain-related errors
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Chain has no blocks")]
    Empty,
}

/// The chain of blocks, serialized as a plain JSON array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Block>", into = "Vec<Block>")]
pub struct Blockchain {
    blocks: Vec<Block>,
}

impl Blockchain {
    /// Create a new chain holding only the genesis block
    pub fn new() -> Self {
        Self {
            blocks: vec![Block::genesis()],
        }
    }

    /// Get the latest block
    pub fn tip(&self) -> &Block {
        self.blocks
            .last()
            .expect("Blockchain should have at least genesis block")
    }

    /// Number of blocks including genesis
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Always false: genesis is never removed
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Get a block by index
    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.blocks.get(index as usize)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Append a block the caller has already validated
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Validate hash links, proofs and signatures
    pub fn is_valid(&self) -> bool {
        verify_chain(&self.blocks)
    }
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<Block>> for Blockchain {
    type Error = BlockchainError;

    fn try_from(blocks: Vec<Block>) -> Result<Self, Self::Error> {
        if blocks.is_empty() {
            return Err(BlockchainError::Empty);
        }
        Ok(Self { blocks })
    }
}

impl From<Blockchain> for Vec<Block> {
    fn from(chain: Blockchain) -> Self {
        chain.blocks
    }
}
