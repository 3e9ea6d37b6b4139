//! Peer gateway
//!
//! Outbound calls a node makes to its peers: relaying transactions and
//! blocks, and fetching a peer's full chain during conflict resolution.
//! Peers are addressed as `host:port` and spoken to with JSON over HTTP.

use crate::core::{Block, Transaction};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout for peer calls
pub const DEFAULT_PEER_TIMEOUT: Duration = Duration::from_secs(5);

/// Peer call errors
#[derive(Error, Debug)]
pub enum PeerError {
    #[error("Peer {peer} unreachable: {reason}")]
    Unreachable { peer: String, reason: String },
    #[error("Peer {peer} sent an unusable chain: {reason}")]
    InvalidPayload { peer: String, reason: String },
    #[error("HTTP client error: {0}")]
    ClientError(#[from] reqwest::Error),
}

/// How a peer answered a broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerResponse {
    /// Any non-error status
    Accepted,
    /// 409: the peer's chain disagrees with ours
    Conflict,
    /// Any other client or server error status
    Rejected(u16),
}

impl PeerResponse {
    pub fn from_status(status: StatusCode) -> Self {
        if status == StatusCode::CONFLICT {
            PeerResponse::Conflict
        } else if status.is_client_error() || status.is_server_error() {
            PeerResponse::Rejected(status.as_u16())
        } else {
            PeerResponse::Accepted
        }
    }
}

/// Outbound peer operations used by the ledger engine.
///
/// An `Err` means the peer could not be reached or answered with garbage;
/// the engine skips such peers. Application-level refusals come back as
/// `Ok` with a non-accepted [`PeerResponse`].
#[async_trait]
pub trait PeerGateway: Send + Sync {
    async fn broadcast_transaction(
        &self,
        peer: &str,
        tx: &Transaction,
    ) -> Result<PeerResponse, PeerError>;

    async fn broadcast_block(&self, peer: &str, block: &Block) -> Result<PeerResponse, PeerError>;

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError>;
}

#[derive(Serialize)]
struct BlockEnvelope<'a> {
    block: &'a Block,
}

/// Build the URL for `path` on `peer`, accepting bare `host:port` addresses
pub fn peer_url(peer: &str, path: &str) -> String {
    let base = peer.trim_end_matches('/');
    if base.starts_with("http://") || base.starts_with("https://") {
        format!("{}{}", base, path)
    } else {
        format!("http://{}{}", base, path)
    }
}

/// [`PeerGateway`] speaking JSON over HTTP with reqwest
pub struct HttpPeerGateway {
    client: Client,
}

impl HttpPeerGateway {
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn post_json<T: Serialize + Sync>(
        &self,
        peer: &str,
        path: &str,
        body: &T,
    ) -> Result<PeerResponse, PeerError> {
        let response = self
            .client
            .post(peer_url(peer, path))
            .json(body)
            .send()
            .await
            .map_err(|e| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        Ok(PeerResponse::from_status(response.status()))
    }
}

#[async_trait]
impl PeerGateway for HttpPeerGateway {
    async fn broadcast_transaction(
        &self,
        peer: &str,
        tx: &Transaction,
    ) -> Result<PeerResponse, PeerError> {
        self.post_json(peer, "/broadcast-transaction", tx).await
    }

    async fn broadcast_block(&self, peer: &str, block: &Block) -> Result<PeerResponse, PeerError> {
        self.post_json(peer, "/broadcast-block", &BlockEnvelope { block })
            .await
    }

    async fn fetch_chain(&self, peer: &str) -> Result<Vec<Block>, PeerError> {
        let response = self
            .client
            .get(peer_url(peer, "/chain"))
            .send()
            .await
            .map_err(|e| PeerError::Unreachable {
                peer: peer.to_string(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(PeerError::InvalidPayload {
                peer: peer.to_string(),
                reason: format!("status {}", response.status()),
            });
        }

        response
            .json::<Vec<Block>>()
            .await
            .map_err(|e| PeerError::InvalidPayload {
                peer: peer.to_string(),
                reason: e.to_string(),
            })
    }
}
