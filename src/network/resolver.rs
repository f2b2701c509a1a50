// Longest-valid-chain conflict resolution

use crate::consensus::ChainValidator;
use crate::core::Block;
use crate::ledger::{Ledger, LedgerError};
use crate::network::{ChainResponse, PeerClient, PeerError, PeerSet};
use futures_util::future::join_all;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::RwLock;

/// Default bound on a single peer fetch
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of one resolution round
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolutionOutcome {
    /// Whether the local chain was replaced
    pub replaced: bool,
    /// Local chain length after resolution
    pub chain_length: usize,
    /// Peer whose chain was adopted
    pub source: Option<String>,
    /// Peers whose answer was excluded because fetching or parsing failed
    pub failed_peers: Vec<String>,
}

/// Compares the local chain with every registered peer and adopts the longest
/// valid one.
///
/// Equal-length candidates are not tie-broken beyond registration order: the
/// first peer to report the winning length keeps it.
pub struct ConflictResolver<C> {
    peers: RwLock<PeerSet>,
    client: C,
    validator: ChainValidator,
    fetch_timeout: Duration,
}

impl<C: PeerClient> ConflictResolver<C> {
    pub fn new(client: C, validator: ChainValidator) -> Self {
        Self {
            peers: RwLock::new(PeerSet::new()),
            client,
            validator,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn validator(&self) -> &ChainValidator {
        &self.validator
    }

    /// RegisterPeer(address)
    pub async fn register_peer(&self, address: &str) -> Result<bool, PeerError> {
        self.peers.write().await.register(address)
    }

    /// Register a batch; stops at the first malformed address, keeping earlier ones
    pub async fn register_peers<S: AsRef<str>>(&self, addresses: &[S]) -> Result<usize, PeerError> {
        let mut peers = self.peers.write().await;
        let mut added = 0;
        for address in addresses {
            if peers.register(address.as_ref())? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Registered hosts in registration order
    pub async fn peers(&self) -> Vec<String> {
        self.peers.read().await.hosts().to_vec()
    }

    /// Query every peer concurrently; answers keep registration order
    pub async fn fetch_candidates(&self) -> (Vec<(String, ChainResponse)>, Vec<(String, PeerError)>) {
        let hosts = self.peers().await;
        let answers = join_all(hosts.iter().map(|host| self.fetch_one(host))).await;

        let mut candidates = Vec::new();
        let mut failures = Vec::new();
        for (host, answer) in hosts.into_iter().zip(answers) {
            match answer {
                Ok(response) => candidates.push((host, response)),
                Err(e) => {
                    log::warn!("Error fetching chain from {}: {}", host, e);
                    failures.push((host, e));
                }
            }
        }
        (candidates, failures)
    }

    async fn fetch_one(&self, host: &str) -> Result<ChainResponse, PeerError> {
        let response = tokio::time::timeout(self.fetch_timeout, self.client.fetch_chain(host))
            .await
            .map_err(|_| PeerError::Timeout {
                host: host.to_string(),
                after: self.fetch_timeout,
            })??;

        if response.length != response.chain.len() as u64 {
            return Err(PeerError::Malformed {
                host: host.to_string(),
                message: format!(
                    "reported length {} but sent {} blocks",
                    response.length,
                    response.chain.len()
                ),
            });
        }
        log::debug!("Fetched chain of length {} from {}", response.length, host);
        Ok(response)
    }

    /// Pick the longest candidate strictly longer than `local_length` that validates
    pub fn select_longest<'a>(
        &self,
        local_length: usize,
        candidates: &'a [(String, ChainResponse)],
    ) -> Option<&'a (String, ChainResponse)> {
        let mut best: Option<&(String, ChainResponse)> = None;
        let mut max_length = local_length as u64;

        for candidate in candidates {
            let (host, response) = candidate;
            if response.length <= max_length {
                continue;
            }
            if !self.validator.is_valid(&response.chain) {
                log::warn!("Ignoring invalid chain of length {} from {}", response.length, host);
                continue;
            }
            log::info!(
                "Found longer chain from {} ({} > {})",
                host,
                response.length,
                max_length
            );
            max_length = response.length;
            best = Some(candidate);
        }

        best
    }

    /// Resolve(local chain) without touching any ledger
    pub async fn resolve_chain(&self, local: &[Block]) -> (Option<(String, Vec<Block>)>, Vec<String>) {
        let (candidates, failures) = self.fetch_candidates().await;
        let winner = self
            .select_longest(local.len(), &candidates)
            .map(|(host, response)| (host.clone(), response.chain.clone()));
        (winner, failures.into_iter().map(|(host, _)| host).collect())
    }

    /// Resolve against a shared ledger.
    ///
    /// Peers are queried without holding the lock; the length comparison and
    /// replacement happen under the write lock so they cannot interleave with
    /// a block being sealed.
    pub async fn resolve(&self, ledger: &RwLock<Ledger>) -> Result<ResolutionOutcome, LedgerError> {
        log::info!(
            "Starting conflict resolution against {} peers",
            self.peers.read().await.len()
        );
        let (candidates, failures) = self.fetch_candidates().await;
        let failed_peers: Vec<String> = failures.into_iter().map(|(host, _)| host).collect();

        let mut ledger = ledger.write().await;
        let local_length = ledger.len();

        match self.select_longest(local_length, &candidates) {
            Some((host, response)) => {
                log::info!("Replacing current chain with chain from {}", host);
                ledger.replace_chain(response.chain.clone())?;
                Ok(ResolutionOutcome {
                    replaced: true,
                    chain_length: ledger.len(),
                    source: Some(host.clone()),
                    failed_peers,
                })
            }
            None => {
                log::info!("Current chain of length {} is authoritative", local_length);
                Ok(ResolutionOutcome {
                    replaced: false,
                    chain_length: local_length,
                    source: None,
                    failed_peers,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consensus::{ProofOfWork, ValidationMode};
    use crate::storage::MemoryStore;
    use std::collections::HashMap;

    #[derive(Default)]
    struct FakePeers {
        answers: HashMap<String, Result<ChainResponse, PeerError>>,
        stalled: Vec<String>,
    }

    impl FakePeers {
        fn answer(mut self, host: &str, chain: Vec<Block>) -> Self {
            self.answers.insert(host.to_string(), Ok(ChainResponse::new(chain)));
            self
        }

        fn raw(mut self, host: &str, response: ChainResponse) -> Self {
            self.answers.insert(host.to_string(), Ok(response));
            self
        }

        fn stall(mut self, host: &str) -> Self {
            self.stalled.push(host.to_string());
            self
        }
    }

    impl PeerClient for FakePeers {
        async fn fetch_chain(&self, host: &str) -> Result<ChainResponse, PeerError> {
            if self.stalled.iter().any(|h| h == host) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.answers.get(host).cloned().unwrap_or_else(|| {
                Err(PeerError::Network {
                    host: host.to_string(),
                    message: "connection refused".to_string(),
                })
            })
        }
    }

    fn pow() -> ProofOfWork {
        ProofOfWork::new(1).unwrap()
    }

    fn mined_chain(length: usize) -> Vec<Block> {
        let mut ledger = Ledger::open(MemoryStore::new()).unwrap();
        while ledger.len() < length {
            let last = ledger.last_block().unwrap().clone();
            let proof = pow().find_proof(last.proof).unwrap();
            ledger.seal_block(proof, Ledger::compute_hash(&last)).unwrap();
        }
        ledger.chain().to_vec()
    }

    fn local_ledger(length: usize) -> RwLock<Ledger> {
        let mut ledger = Ledger::open(MemoryStore::new()).unwrap();
        ledger.replace_chain(mined_chain(length)).unwrap();
        RwLock::new(ledger)
    }

    async fn resolver(peers: FakePeers, hosts: &[&str]) -> ConflictResolver<FakePeers> {
        let resolver = ConflictResolver::new(peers, ChainValidator::strict(pow()))
            .with_fetch_timeout(Duration::from_millis(100));
        let urls: Vec<String> = hosts.iter().map(|h| format!("http://{}", h)).collect();
        resolver.register_peers(&urls).await.unwrap();
        resolver
    }

    #[tokio::test]
    async fn test_adopts_longer_valid_chain() {
        let remote = mined_chain(5);
        let resolver = resolver(FakePeers::default().answer("p1:1", remote.clone()), &["p1:1"]).await;
        let ledger = local_ledger(3);

        let outcome = resolver.resolve(&ledger).await.unwrap();
        assert!(outcome.replaced);
        assert_eq!(outcome.chain_length, 5);
        assert_eq!(outcome.source.as_deref(), Some("p1:1"));
        assert_eq!(ledger.read().await.chain(), &remote[..]);
    }

    #[tokio::test]
    async fn test_rejects_longer_invalid_chain() {
        let mut remote = mined_chain(5);
        remote[2].transactions.clear();
        remote[2].proof = remote[2].proof.wrapping_add(1);
        let resolver = resolver(FakePeers::default().answer("p1:1", remote), &["p1:1"]).await;
        let ledger = local_ledger(3);
        let before = ledger.read().await.chain().to_vec();

        let outcome = resolver.resolve(&ledger).await.unwrap();
        assert!(!outcome.replaced);
        assert_eq!(ledger.read().await.chain(), &before[..]);
    }

    #[tokio::test]
    async fn test_picks_longest_of_many() {
        let five = mined_chain(5);
        let peers = FakePeers::default()
            .answer("p1:1", five.clone())
            .answer("p2:1", mined_chain(4));
        let resolver = resolver(peers, &["p2:1", "p1:1"]).await;
        let ledger = local_ledger(3);

        let outcome = resolver.resolve(&ledger).await.unwrap();
        assert_eq!(outcome.source.as_deref(), Some("p1:1"));
        assert_eq!(ledger.read().await.chain(), &five[..]);
    }

    #[tokio::test]
    async fn test_tie_goes_to_first_registered() {
        let first = mined_chain(4);
        let peers = FakePeers::default()
            .answer("p1:1", first.clone())
            .answer("p2:1", mined_chain(4));
        let resolver = resolver(peers, &["p1:1", "p2:1"]).await;
        let ledger = local_ledger(2);

        let outcome = resolver.resolve(&ledger).await.unwrap();
        assert_eq!(outcome.source.as_deref(), Some("p1:1"));
        assert_eq!(ledger.read().await.chain(), &first[..]);
    }

    #[tokio::test]
    async fn test_equal_length_is_not_adopted() {
        let resolver = resolver(FakePeers::default().answer("p1:1", mined_chain(3)), &["p1:1"]).await;
        let ledger = local_ledger(3);
        assert!(!resolver.resolve(&ledger).await.unwrap().replaced);
    }

    #[tokio::test]
    async fn test_failing_peers_do_not_abort() {
        let remote = mined_chain(4);
        let peers = FakePeers::default()
            .stall("slow:1")
            .answer("good:1", remote.clone());
        let resolver = resolver(peers, &["down:1", "slow:1", "good:1"]).await;
        let ledger = local_ledger(2);

        let outcome = resolver.resolve(&ledger).await.unwrap();
        assert!(outcome.replaced);
        assert_eq!(outcome.failed_peers, vec!["down:1".to_string(), "slow:1".to_string()]);
    }

    #[tokio::test]
    async fn test_lying_length_is_malformed() {
        let mut response = ChainResponse::new(mined_chain(2));
        response.length = 10;
        let resolver = resolver(FakePeers::default().raw("p1:1", response), &["p1:1"]).await;

        let (candidates, failures) = resolver.fetch_candidates().await;
        assert!(candidates.is_empty());
        assert!(matches!(failures[0].1, PeerError::Malformed { .. }));
    }

    #[tokio::test]
    async fn test_timeout_reported() {
        let resolver = resolver(FakePeers::default().stall("slow:1"), &["slow:1"]).await;
        let (_, failures) = resolver.fetch_candidates().await;
        assert!(matches!(failures[0].1, PeerError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_permissive_validator_accepts_broken_chain() {
        let mut remote = mined_chain(4);
        remote[3].previous_hash = "0".to_string();
        let resolver = ConflictResolver::new(
            FakePeers::default().answer("p1:1", remote.clone()),
            ChainValidator::new(pow(), ValidationMode::Permissive),
        );
        resolver.register_peer("http://p1:1").await.unwrap();

        let (winner, failed) = resolver.resolve_chain(&mined_chain(2)).await;
        assert!(failed.is_empty());
        assert_eq!(winner.unwrap().1, remote);
    }

    #[tokio::test]
    async fn test_register_peers_stops_at_malformed() {
        let resolver = ConflictResolver::new(FakePeers::default(), ChainValidator::strict(pow()));
        let result = resolver
            .register_peers(&["http://a:1", "http://a:1/x", "nonsense", "http://b:1"])
            .await;
        assert!(matches!(result, Err(PeerError::InvalidPeer { .. })));
        assert_eq!(resolver.peers().await, vec!["a:1".to_string()]);
    }
}
