//! REST API handlers for ledger operations

use crate::core::{Block, Transaction};
use crate::network::{BlockOutcome, LedgerError, Node};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct ApiState {
    pub node: Arc<Node>,
}

type ApiResult<T> = Result<(StatusCode, Json<T>), (StatusCode, Json<MessageResponse>)>;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

fn reply(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<MessageResponse>) {
    (status, Json(MessageResponse::new(message)))
}

#[derive(Serialize)]
pub struct TransactionResponse {
    pub message: String,
    pub transaction: Transaction,
}

#[derive(Serialize)]
pub struct BlockResponse {
    pub message: String,
    pub block: Block,
}

#[derive(Serialize)]
pub struct MineFailedResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wallet_set_up: Option<bool>,
}

#[derive(Serialize)]
pub struct FileCheckResponse {
    pub message: String,
    pub lines_read: usize,
    pub submitted: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block: Option<Block>,
}

#[derive(Serialize)]
pub struct NodesResponse {
    pub message: String,
    pub all_nodes: Vec<String>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub message: String,
    pub public_key: String,
    pub private_key: String,
}

// ============================================================================
// Request Types
// ============================================================================

/// `None` only when the key is absent; an explicit `null` is `Some(Null)`
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

#[derive(Deserialize)]
pub struct NewTransactionRequest {
    #[serde(default, deserialize_with = "present")]
    pub hop_count: Option<Value>,
}

#[derive(Deserialize)]
pub struct BroadcastTransactionRequest {
    #[serde(rename = "dataOwner")]
    pub owner: Option<String>,
    pub signature: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub hop_count: Option<Value>,
}

#[derive(Deserialize)]
pub struct BroadcastBlockRequest {
    pub block: Option<Block>,
}

#[derive(Deserialize)]
pub struct AddNodeRequest {
    pub node: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health - Liveness check
pub async fn health_check() -> &'static str {
    "OK"
}

/// GET /chain - Full chain snapshot
pub async fn get_chain(State(state): State<ApiState>) -> Json<Vec<Block>> {
    Json(state.node.chain_snapshot().await)
}

/// GET /transactions - Pending pool snapshot
pub async fn get_open_transactions(State(state): State<ApiState>) -> Json<Vec<Transaction>> {
    Json(state.node.pool_snapshot().await)
}

/// POST /transaction - Sign a hop count with this node's wallet and submit it
pub async fn add_transaction(
    State(state): State<ApiState>,
    Json(req): Json<NewTransactionRequest>,
) -> ApiResult<TransactionResponse> {
    if state.node.identity().await.is_none() {
        return Err(reply(StatusCode::BAD_REQUEST, "No wallet set up."));
    }
    let payload = req
        .hop_count
        .ok_or_else(|| reply(StatusCode::BAD_REQUEST, "Required data is missing."))?;

    match state.node.submit_hop_count(payload).await {
        Ok(transaction) => Ok((
            StatusCode::CREATED,
            Json(TransactionResponse {
                message: "Successfully added transaction.".to_string(),
                transaction,
            }),
        )),
        Err(e) => {
            log::warn!("Submitting transaction failed: {}", e);
            Err(reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Creating a transaction failed.",
            ))
        }
    }
}

/// POST /broadcast-transaction - Accept a transaction relayed by a peer
pub async fn broadcast_transaction(
    State(state): State<ApiState>,
    Json(req): Json<BroadcastTransactionRequest>,
) -> ApiResult<TransactionResponse> {
    let (owner, signature, payload) = match (req.owner, req.signature, req.hop_count) {
        (Some(owner), Some(signature), Some(payload)) => (owner, signature, payload),
        _ => return Err(reply(StatusCode::BAD_REQUEST, "Some data is missing.")),
    };

    match state
        .node
        .receive_broadcast_transaction(owner, signature, payload)
        .await
    {
        Ok(transaction) => Ok((
            StatusCode::CREATED,
            Json(TransactionResponse {
                message: "Successfully added transaction.".to_string(),
                transaction,
            }),
        )),
        Err(_) => Err(reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Creating a transaction failed.",
        )),
    }
}

/// POST /broadcast-block - Accept a block mined by a peer
pub async fn broadcast_block(
    State(state): State<ApiState>,
    Json(req): Json<BroadcastBlockRequest>,
) -> (StatusCode, Json<MessageResponse>) {
    let Some(block) = req.block else {
        return reply(StatusCode::BAD_REQUEST, "Some data is missing.");
    };

    match state.node.receive_broadcast_block(block).await {
        BlockOutcome::Accepted => reply(StatusCode::CREATED, "Successfully added block."),
        BlockOutcome::Rejected(_) => reply(StatusCode::CONFLICT, "Block seems invalid."),
        BlockOutcome::AheadOfLocal => reply(
            StatusCode::OK,
            "Blockchain seems to differ from local blockchain.",
        ),
        BlockOutcome::Stale => reply(
            StatusCode::CONFLICT,
            "Blockchain seems to be shorter, block not added.",
        ),
    }
}

/// POST /mine - Seal the pending pool into a new block
pub async fn mine(
    State(state): State<ApiState>,
) -> Result<(StatusCode, Json<BlockResponse>), (StatusCode, Json<MineFailedResponse>)> {
    match state.node.mine().await {
        Ok(block) => Ok((
            StatusCode::CREATED,
            Json(BlockResponse {
                message: "Block added successfully.".to_string(),
                block,
            }),
        )),
        Err(LedgerError::ConflictsPending) => Err((
            StatusCode::CONFLICT,
            Json(MineFailedResponse {
                message: "Resolve conflicts first, block not added!".to_string(),
                wallet_set_up: None,
            }),
        )),
        Err(e) => {
            log::warn!("Mining failed: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(MineFailedResponse {
                    message: "Adding a block failed.".to_string(),
                    wallet_set_up: Some(state.node.identity().await.is_some()),
                }),
            ))
        }
    }
}

/// POST /file-check - Ingest new lines of the hop-count file and mine them
pub async fn file_check(State(state): State<ApiState>) -> ApiResult<FileCheckResponse> {
    match state.node.ingest_hop_file().await {
        Ok(report) => Ok((
            StatusCode::OK,
            Json(FileCheckResponse {
                message: "Successfully get checked".to_string(),
                lines_read: report.lines_read,
                submitted: report.submitted,
                block: report.block,
            }),
        )),
        Err(LedgerError::NoHopFile) => Err(reply(
            StatusCode::BAD_REQUEST,
            "No hop-count file configured.",
        )),
        Err(LedgerError::NoIdentity) => Err(reply(StatusCode::BAD_REQUEST, "No wallet set up.")),
        Err(e) => {
            log::error!("Hop-count file check failed: {}", e);
            Err(reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An error occurred during the file check.",
            ))
        }
    }
}

/// POST /resolve-conflicts - Adopt the longest valid peer chain
pub async fn resolve_conflicts(State(state): State<ApiState>) -> Json<MessageResponse> {
    if state.node.resolve_conflicts().await {
        Json(MessageResponse::new("Chain was replaced!"))
    } else {
        Json(MessageResponse::new("Local chain kept!"))
    }
}

/// POST /node - Register a peer
pub async fn add_node(
    State(state): State<ApiState>,
    Json(req): Json<AddNodeRequest>,
) -> ApiResult<NodesResponse> {
    let node = req
        .node
        .filter(|n| !n.is_empty())
        .ok_or_else(|| reply(StatusCode::BAD_REQUEST, "No node data found."))?;

    state.node.add_peer(&node).await;
    Ok((
        StatusCode::CREATED,
        Json(NodesResponse {
            message: "Node added successfully.".to_string(),
            all_nodes: state.node.peers().await,
        }),
    ))
}

/// DELETE /node/{node_url} - Forget a peer
pub async fn remove_node(
    State(state): State<ApiState>,
    Path(node_url): Path<String>,
) -> Json<NodesResponse> {
    state.node.remove_peer(&node_url).await;
    Json(NodesResponse {
        message: "Successfully removed node.".to_string(),
        all_nodes: state.node.peers().await,
    })
}

/// GET /nodes - List peers
pub async fn get_nodes(State(state): State<ApiState>) -> Json<NodesResponse> {
    Json(NodesResponse {
        message: "Successfully get nodes".to_string(),
        all_nodes: state.node.peers().await,
    })
}

/// POST /wallet - Create and persist a new identity
pub async fn create_wallet(State(state): State<ApiState>) -> ApiResult<WalletResponse> {
    match state.node.create_wallet().await {
        Ok(wallet) => Ok((
            StatusCode::CREATED,
            Json(WalletResponse {
                message: "Keys created successfully".to_string(),
                public_key: wallet.public_key(),
                private_key: wallet.private_key(),
            }),
        )),
        Err(e) => {
            log::error!("Saving wallet failed: {}", e);
            Err(reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Saving the keys failed.",
            ))
        }
    }
}

/// GET /wallet - Load the persisted identity
pub async fn load_wallet(State(state): State<ApiState>) -> ApiResult<WalletResponse> {
    match state.node.load_wallet().await {
        Ok(wallet) => Ok((
            StatusCode::CREATED,
            Json(WalletResponse {
                message: "Keys loaded successfully".to_string(),
                public_key: wallet.public_key(),
                private_key: wallet.private_key(),
            }),
        )),
        Err(e) => {
            log::warn!("Loading wallet failed: {}", e);
            Err(reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Loading the keys failed.",
            ))
        }
    }
}
