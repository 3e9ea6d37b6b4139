//! Ledger engine
//!
//! The node owns the chain, the pending pool and the peer set, and is the
//! only place they change. Mutating operations are serialized by a single
//! operation lock; chain/pool snapshots only take a short read lock on the
//! state, so they are never blocked by a running proof-of-work search.
//!
//! Peer fan-out happens after the local mutation has been committed and the
//! operation lock released. It is sequential and best effort: unreachable
//! peers are skipped and refusals are collected without short-circuiting.
//! Fanning out concurrently would be an equivalent optimization.

use crate::core::{valid_proof, verify_chain, Block, Blockchain, Transaction, TransactionError};
use crate::mining::{proof_of_work, Mempool, MiningStats};
use crate::network::peer::{
    HttpPeerGateway, PeerError, PeerGateway, PeerResponse, DEFAULT_PEER_TIMEOUT,
};
use crate::storage::Storage;
use crate::wallet::{Wallet, WalletError};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

/// Ledger engine errors
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("No wallet set up")]
    NoIdentity,
    #[error("Conflicts must be resolved before mining")]
    ConflictsPending,
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(#[from] TransactionError),
    #[error("Transaction declined by peers {}, needs resolving", .peers.join(", "))]
    PeerRejected { peers: Vec<String> },
    #[error("Pending transaction from {owner} failed re-verification")]
    PoolTampered { owner: String },
    #[error("Invalid proof of work")]
    InvalidProof,
    #[error("Previous hash does not match local tip")]
    PreviousHashMismatch,
    #[error("Proof-of-work task failed: {0}")]
    MiningAborted(String),
    #[error("Wallet error: {0}")]
    WalletError(#[from] WalletError),
    #[error("No hop-count file configured")]
    NoHopFile,
    #[error("Reading hop-count file failed: {0}")]
    HopFile(#[from] std::io::Error),
}

/// Summary of one pass over the hop-count file
#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Complete lines consumed past the previous offset
    pub lines_read: usize,
    /// Lines admitted to the pending pool
    pub submitted: usize,
    /// Block mined for this batch, if any
    pub block: Option<Block>,
}

/// Result of receiving a block broadcast from a peer
#[derive(Debug)]
pub enum BlockOutcome {
    /// Block extended the local chain
    Accepted,
    /// Block was the next index but failed validation
    Rejected(LedgerError),
    /// Peer is more than one block ahead; conflicts flagged for resolution
    AheadOfLocal,
    /// Block is at or behind the local tip
    Stale,
}

/// Ledger node configuration
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Identifies this node's persisted documents (the listening port by default)
    pub node_id: String,
    /// Per-request timeout for peer calls
    pub peer_timeout: Duration,
    /// Append-only file of hop-count measurements, one per line
    pub hop_file: Option<PathBuf>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "5000".to_string(),
            peer_timeout: DEFAULT_PEER_TIMEOUT,
            hop_file: None,
        }
    }
}

struct LedgerState {
    chain: Blockchain,
    pool: Mempool,
    peers: BTreeSet<String>,
    resolve_conflicts: bool,
}

/// The ledger engine for one node
pub struct Node {
    node_id: String,
    state: RwLock<LedgerState>,
    wallet: RwLock<Option<Wallet>>,
    /// Held for the whole of every mutating operation
    ops: Mutex<()>,
    storage: Storage,
    gateway: Arc<dyn PeerGateway>,
    hop_file: Option<PathBuf>,
    /// Lines of `hop_file` already ingested; also serializes ingestion
    hop_offset: Mutex<usize>,
}

impl Node {
    /// Restore persisted state for `config.node_id` and any saved wallet
    pub fn new(config: NodeConfig, storage: Storage, gateway: Arc<dyn PeerGateway>) -> Self {
        let loaded = storage.load(&config.node_id);
        let wallet = match Wallet::load(&storage, &config.node_id) {
            Ok(wallet) => Some(wallet),
            Err(e) => {
                debug!("Node {} starting without identity: {}", config.node_id, e);
                None
            }
        };

        info!(
            "Node {} loaded {} blocks, {} pending transactions, {} peers",
            config.node_id,
            loaded.chain.len(),
            loaded.pool.len(),
            loaded.peers.len()
        );

        Self {
            node_id: config.node_id,
            state: RwLock::new(LedgerState {
                chain: loaded.chain,
                pool: loaded.pool,
                peers: loaded.peers,
                resolve_conflicts: false,
            }),
            wallet: RwLock::new(wallet),
            ops: Mutex::new(()),
            storage,
            gateway,
            hop_file: config.hop_file,
            hop_offset: Mutex::new(0),
        }
    }

    /// Node talking to its peers over HTTP with `config.peer_timeout`
    pub fn with_http_peers(config: NodeConfig, storage: Storage) -> Result<Self, PeerError> {
        let gateway = HttpPeerGateway::new(config.peer_timeout)?;
        Ok(Self::new(config, storage, Arc::new(gateway)))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub async fn chain_snapshot(&self) -> Vec<Block> {
        self.state.read().await.chain.blocks().to_vec()
    }

    pub async fn pool_snapshot(&self) -> Vec<Transaction> {
        self.state.read().await.pool.snapshot()
    }

    pub async fn peers(&self) -> Vec<String> {
        self.state.read().await.peers.iter().cloned().collect()
    }

    pub async fn conflicts_pending(&self) -> bool {
        self.state.read().await.resolve_conflicts
    }

    /// Public key of the configured wallet, if any
    pub async fn identity(&self) -> Option<String> {
        self.wallet.read().await.as_ref().map(Wallet::public_key)
    }

    // =========================================================================
    // Peers
    // =========================================================================

    pub async fn add_peer(&self, addr: &str) {
        let _guard = self.ops.lock().await;
        let mut state = self.state.write().await;
        if state.peers.insert(addr.to_string()) {
            info!("Added peer {}", addr);
        }
        self.persist(None, None, Some(&state.peers));
    }

    pub async fn remove_peer(&self, addr: &str) {
        let _guard = self.ops.lock().await;
        let mut state = self.state.write().await;
        if state.peers.remove(addr) {
            info!("Removed peer {}", addr);
        }
        self.persist(None, None, Some(&state.peers));
    }

    // =========================================================================
    // Wallet
    // =========================================================================

    /// Generate, persist and adopt a fresh signing identity
    pub async fn create_wallet(&self) -> Result<Wallet, LedgerError> {
        let wallet = Wallet::new();
        wallet.save(&self.storage, &self.node_id)?;
        *self.wallet.write().await = Some(wallet.clone());
        info!("Node {} created wallet {}", self.node_id, wallet.public_key());
        Ok(wallet)
    }

    /// Adopt the identity previously saved for this node
    pub async fn load_wallet(&self) -> Result<Wallet, LedgerError> {
        let wallet = Wallet::load(&self.storage, &self.node_id)?;
        *self.wallet.write().await = Some(wallet.clone());
        Ok(wallet)
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// Sign `payload` with this node's wallet and submit it
    pub async fn submit_hop_count(&self, payload: Value) -> Result<Transaction, LedgerError> {
        let tx = {
            let wallet = self.wallet.read().await;
            let wallet = wallet.as_ref().ok_or(LedgerError::NoIdentity)?;
            wallet.sign_transaction(payload)?
        };
        self.submit_transaction(tx.owner, tx.signature, tx.payload)
            .await
    }

    /// Admit a transaction originated here, relaying it to peers
    pub async fn submit_transaction(
        &self,
        owner: String,
        signature: String,
        payload: Value,
    ) -> Result<Transaction, LedgerError> {
        self.add_transaction(owner, signature, payload, false).await
    }

    /// Admit a transaction relayed by a peer; never re-broadcast
    pub async fn receive_broadcast_transaction(
        &self,
        owner: String,
        signature: String,
        payload: Value,
    ) -> Result<Transaction, LedgerError> {
        self.add_transaction(owner, signature, payload, true).await
    }

    /// Validate and pool a transaction, then fan it out unless it was relayed.
    ///
    /// A peer refusal makes the call fail but the transaction stays pooled
    /// locally; unreachable peers are skipped.
    pub async fn add_transaction(
        &self,
        owner: String,
        signature: String,
        payload: Value,
        is_relayed: bool,
    ) -> Result<Transaction, LedgerError> {
        let tx = Transaction::new(owner, signature, payload);
        if let Err(e) = tx.validate() {
            warn!("Rejected transaction from {}: {}", tx.owner, e);
            return Err(e.into());
        }

        let peers = {
            let _guard = self.ops.lock().await;
            let mut state = self.state.write().await;
            state.pool.push(tx.clone());
            self.persist(None, Some(&state.pool), None);
            state.peers.clone()
        };
        debug!("Pooled transaction from {}", tx.owner);

        if is_relayed {
            return Ok(tx);
        }

        let mut declined = Vec::new();
        for peer in peers {
            match self.gateway.broadcast_transaction(&peer, &tx).await {
                Ok(PeerResponse::Accepted) => {}
                Ok(response) => {
                    warn!("Transaction declined by {} ({:?}), needs resolving", peer, response);
                    declined.push(peer);
                }
                Err(e) => warn!("Error broadcasting transaction: {}", e),
            }
        }

        if declined.is_empty() {
            Ok(tx)
        } else {
            Err(LedgerError::PeerRejected { peers: declined })
        }
    }

    // =========================================================================
    // Mining
    // =========================================================================

    /// Solve the puzzle for the current pool on top of the current tip
    pub async fn proof_of_work(&self) -> Result<u64, LedgerError> {
        let (transactions, last_hash) = {
            let state = self.state.read().await;
            (state.pool.snapshot(), state.chain.tip().hash())
        };
        let (proof, stats) = solve(transactions, last_hash).await?;
        debug!("Proof {} found after {} attempts", proof, stats.hash_attempts);
        Ok(proof)
    }

    /// Seal the pending pool into a new block and broadcast it.
    ///
    /// Refused without a wallet or while conflicts are pending.
    pub async fn mine(&self) -> Result<Block, LedgerError> {
        let guard = self.ops.lock().await;

        if self.wallet.read().await.is_none() {
            return Err(LedgerError::NoIdentity);
        }

        let (transactions, last_hash, index) = {
            let state = self.state.read().await;
            if state.resolve_conflicts {
                return Err(LedgerError::ConflictsPending);
            }
            (
                state.pool.snapshot(),
                state.chain.tip().hash(),
                state.chain.len() as u64,
            )
        };

        let (proof, stats) = solve(transactions.clone(), last_hash.clone()).await?;

        if let Some(tx) = transactions.iter().find(|tx| !tx.verify_signature()) {
            error!("Pending transaction from {} no longer verifies", tx.owner);
            return Err(LedgerError::PoolTampered {
                owner: tx.owner.clone(),
            });
        }

        let block = Block::new(index, last_hash, transactions, proof);
        let peers = {
            let mut state = self.state.write().await;
            state.chain.push(block.clone());
            state.pool.clear();
            self.persist(Some(&state.chain), Some(&state.pool), None);
            state.peers.clone()
        };
        drop(guard);

        info!(
            "Mined block {} with {} transactions (proof {}, {} attempts in {}ms)",
            block.index,
            block.tx_count(),
            block.proof,
            stats.hash_attempts,
            stats.time_ms
        );

        let mut conflict = false;
        for peer in peers {
            match self.gateway.broadcast_block(&peer, &block).await {
                Ok(PeerResponse::Accepted) => {}
                Ok(PeerResponse::Conflict) => {
                    warn!("Peer {} reported a conflicting chain", peer);
                    conflict = true;
                }
                Ok(PeerResponse::Rejected(status)) => {
                    warn!("Block declined by {} (status {}), needs resolving", peer, status);
                }
                Err(e) => warn!("Error broadcasting block: {}", e),
            }
        }

        if conflict {
            self.state.write().await.resolve_conflicts = true;
        }

        Ok(block)
    }

    // =========================================================================
    // Blocks from peers
    // =========================================================================

    /// Append a block mined elsewhere if it solves the puzzle on our tip.
    ///
    /// Pooled transactions sealed by the block leave the pool.
    pub async fn add_block(&self, block: Block) -> Result<(), LedgerError> {
        let _guard = self.ops.lock().await;
        let mut state = self.state.write().await;

        if !valid_proof(&block.transactions, &block.previous_hash, block.proof) {
            return Err(LedgerError::InvalidProof);
        }
        if block.previous_hash != state.chain.tip().hash() {
            return Err(LedgerError::PreviousHashMismatch);
        }

        let index = block.index;
        let included = block.transactions.clone();
        state.chain.push(block);
        let removed = state.pool.remove_included(&included);
        self.persist(Some(&state.chain), Some(&state.pool), None);

        info!(
            "Accepted block {} from peer ({} pooled transactions settled)",
            index, removed
        );
        Ok(())
    }

    /// Route a broadcast block by its index relative to the local tip
    pub async fn receive_broadcast_block(&self, block: Block) -> BlockOutcome {
        let tip_index = self.state.read().await.chain.tip().index;

        if tip_index.checked_add(1) == Some(block.index) {
            match self.add_block(block).await {
                Ok(()) => BlockOutcome::Accepted,
                Err(e) => {
                    warn!("Broadcast block rejected: {}", e);
                    BlockOutcome::Rejected(e)
                }
            }
        } else if block.index > tip_index {
            info!(
                "Block {} is ahead of local tip {}, flagging conflicts",
                block.index, tip_index
            );
            self.state.write().await.resolve_conflicts = true;
            BlockOutcome::AheadOfLocal
        } else {
            BlockOutcome::Stale
        }
    }

    // =========================================================================
    // Hop-count ingestion
    // =========================================================================

    /// Submit every complete line appended to the hop-count file since the
    /// last pass, then mine one block if anything new was read.
    ///
    /// Each line is signed with this node's wallet. A line that parses as
    /// JSON is submitted as that value, anything else as a string. The
    /// first admission failure stops the batch; lines already read are not
    /// revisited. A trailing line without a newline is left for next time.
    pub async fn ingest_hop_file(&self) -> Result<IngestReport, LedgerError> {
        let path = self.hop_file.as_ref().ok_or(LedgerError::NoHopFile)?;
        if self.identity().await.is_none() {
            return Err(LedgerError::NoIdentity);
        }

        let mut offset = self.hop_offset.lock().await;
        let content = tokio::fs::read_to_string(path).await?;
        let fresh: Vec<&str> = content
            .split_inclusive('\n')
            .skip(*offset)
            .take_while(|line| line.ends_with('\n'))
            .collect();
        *offset += fresh.len();

        let mut report = IngestReport {
            lines_read: fresh.len(),
            ..Default::default()
        };
        if fresh.is_empty() {
            return Ok(report);
        }
        debug!("Hop file pointer at line {}", *offset);

        for line in fresh {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let payload = serde_json::from_str::<Value>(line)
                .unwrap_or_else(|_| Value::String(line.to_string()));
            match self.submit_hop_count(payload).await {
                Ok(_) => report.submitted += 1,
                Err(LedgerError::PeerRejected { peers }) => {
                    // Pooled locally all the same
                    warn!("Hop count declined by {:?}", peers);
                    report.submitted += 1;
                }
                Err(e) => {
                    warn!("Hop count {:?} not admitted: {}", line, e);
                    break;
                }
            }
        }

        report.block = Some(self.mine().await?);
        info!(
            "Ingested {} hop counts from {}",
            report.submitted,
            path.display()
        );
        Ok(report)
    }

    // =========================================================================
    // Conflict resolution
    // =========================================================================

    /// Adopt the longest valid peer chain strictly longer than ours.
    ///
    /// On replacement the pending pool is dropped. The conflict flag is
    /// always cleared. Returns whether the chain was replaced.
    pub async fn resolve_conflicts(&self) -> bool {
        let _guard = self.ops.lock().await;
        let (peers, mut best_len) = {
            let state = self.state.read().await;
            (state.peers.clone(), state.chain.len())
        };

        let mut winner: Option<Blockchain> = None;
        for peer in peers {
            let blocks = match self.gateway.fetch_chain(&peer).await {
                Ok(blocks) => blocks,
                Err(e) => {
                    warn!("Skipping peer during resolution: {}", e);
                    continue;
                }
            };

            if blocks.len() > best_len && verify_chain(&blocks) {
                best_len = blocks.len();
                winner = Blockchain::try_from(blocks).ok();
                debug!("Peer {} offers a valid chain of {} blocks", peer, best_len);
            }
        }

        let mut state = self.state.write().await;
        let replaced = match winner {
            Some(chain) => {
                info!("Chain replaced with {} blocks from peers", chain.len());
                state.chain = chain;
                state.pool.clear();
                true
            }
            None => false,
        };
        state.resolve_conflicts = false;
        self.persist(Some(&state.chain), Some(&state.pool), None);

        replaced
    }

    /// Best-effort save; failures are logged and never undo in-memory state
    fn persist(
        &self,
        chain: Option<&Blockchain>,
        pool: Option<&Mempool>,
        peers: Option<&BTreeSet<String>>,
    ) {
        if let Err(e) = self.storage.save(&self.node_id, chain, pool, peers) {
            error!("Saving data for node {} failed: {}", self.node_id, e);
        }
    }
}

/// Run the proof-of-work search on the blocking pool
async fn solve(
    transactions: Vec<Transaction>,
    last_hash: String,
) -> Result<(u64, MiningStats), LedgerError> {
    tokio::task::spawn_blocking(move || proof_of_work(&transactions, &last_hash))
        .await
        .map_err(|e| LedgerError::MiningAborted(e.to_string()))
}
