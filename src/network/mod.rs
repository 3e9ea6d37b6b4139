//! Networking module
//!
//! - `node`: the ledger engine owning chain, pending pool and peer set
//! - `peer`: outbound peer calls (broadcasts and chain fetches)

pub mod node;
pub mod peer;

pub use node::{BlockOutcome, IngestReport, LedgerError, Node, NodeConfig};
pub use peer::{peer_url, HttpPeerGateway, PeerError, PeerGateway, PeerResponse, DEFAULT_PEER_TIMEOUT};
