//! Wallet module: the node's signing identity

pub mod wallet;

pub use wallet::{Wallet, WalletError};
