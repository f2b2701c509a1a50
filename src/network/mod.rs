// Peers, peer chain queries and conflict resolution

mod client;
mod node;
mod peer;
mod resolver;

pub use client::{ChainResponse, HttpPeerClient, PeerClient};
pub use node::{Node, NodeError, SealedBlock};
pub use peer::{PeerError, PeerSet, parse_peer_host};
pub use resolver::{ConflictResolver, DEFAULT_FETCH_TIMEOUT, ResolutionOutcome};
