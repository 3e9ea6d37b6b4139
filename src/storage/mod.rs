//! Storage module for ledger persistence

pub mod persistence;

pub use persistence::{LoadedLedger, Storage, StorageConfig, StorageError, StoredKeys};
