//! REST API module
//!
//! HTTP surface of a ledger node. Peers use the relay routes; operators use
//! the rest.
//!
//! # Endpoints
//!
//! ## Ledger
//! - `GET /chain` - Full chain
//! - `GET /transactions` - Pending pool
//! - `POST /transaction` - Sign and submit a hop count
//! - `POST /mine` - Mine a block from the pool
//! - `POST /resolve-conflicts` - Adopt the longest valid peer chain
//! - `POST /file-check` - Ingest new hop counts from the configured file
//!
//! ## Peer relay
//! - `POST /broadcast-transaction` - Transaction relayed by a peer
//! - `POST /broadcast-block` - Block mined by a peer
//!
//! ## Peers
//! - `POST /node` - Register a peer
//! - `DELETE /node/{node_url}` - Remove a peer
//! - `GET /nodes` - List peers
//!
//! ## Wallet
//! - `POST /wallet` - Create keys
//! - `GET /wallet` - Load saved keys

pub mod handlers;
pub mod routes;

pub use handlers::ApiState;
pub use routes::create_router;
