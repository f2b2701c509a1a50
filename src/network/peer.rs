// Known peers

use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PeerError {
    #[error("invalid peer address {address:?}: {reason}")]
    InvalidPeer { address: String, reason: String },
    #[error("peer {host} unreachable: {message}")]
    Network { host: String, message: String },
    #[error("peer {host} did not answer within {after:?}")]
    Timeout { host: String, after: Duration },
    #[error("peer {host} sent a malformed chain: {message}")]
    Malformed { host: String, message: String },
}

impl PeerError {
    /// Host the error concerns, when there is one
    pub fn host(&self) -> Option<&str> {
        match self {
            PeerError::InvalidPeer { .. } => None,
            PeerError::Network { host, .. }
            | PeerError::Timeout { host, .. }
            | PeerError::Malformed { host, .. } => Some(host),
        }
    }
}

/// Reduce a peer URL to its `host[:port]`, the identity used for deduplication
pub fn parse_peer_host(address: &str) -> Result<String, PeerError> {
    let invalid = |reason: String| PeerError::InvalidPeer {
        address: address.to_string(),
        reason,
    };

    let url = Url::parse(address.trim()).map_err(|e| invalid(e.to_string()))?;
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| invalid("no host".to_string()))?;

    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Registered peer hosts in registration order.
///
/// Grows only through registration; unreachable peers are never evicted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerSet {
    hosts: Vec<String>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// RegisterPeer(address); `Ok(false)` when the host was already known
    pub fn register(&mut self, address: &str) -> Result<bool, PeerError> {
        let host = parse_peer_host(address)?;
        if self.hosts.contains(&host) {
            return Ok(false);
        }
        log::info!("Registered peer {}", host);
        self.hosts.push(host);
        Ok(true)
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}
