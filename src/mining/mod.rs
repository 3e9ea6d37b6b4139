//! Mining module: proof-of-work search and the pending pool

pub mod mempool;
pub mod miner;

pub use mempool::Mempool;
pub use miner::{proof_of_work, MiningStats};
