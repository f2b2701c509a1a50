// Peer chain queries

use crate::core::Block;
use crate::network::PeerError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Body of a peer's `GET /chain`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainResponse {
    pub length: u64,
    pub chain: Vec<Block>,
}

impl ChainResponse {
    pub fn new(chain: Vec<Block>) -> Self {
        Self {
            length: chain.len() as u64,
            chain,
        }
    }
}

/// Fetches a peer's current chain
pub trait PeerClient: Send + Sync {
    fn fetch_chain(
        &self,
        host: &str,
    ) -> impl Future<Output = Result<ChainResponse, PeerError>> + Send;
}

/// HTTP client querying `http://<host>/chain`
#[derive(Clone)]
pub struct HttpPeerClient {
    http: reqwest::Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, PeerError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| PeerError::Network {
                host: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;
        Ok(Self { http })
    }
}

impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, host: &str) -> Result<ChainResponse, PeerError> {
        let url = format!("http://{}/chain", host);
        let network = |message: String| PeerError::Network {
            host: host.to_string(),
            message,
        };

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| network(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(network(format!("peer returned HTTP {}", response.status())));
        }

        response
            .json::<ChainResponse>()
            .await
            .map_err(|e| PeerError::Malformed {
                host: host.to_string(),
                message: e.to_string(),
            })
    }
}
