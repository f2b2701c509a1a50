// Node - the single writer over a shared ledger

use crate::config::NodeConfig;
use crate::consensus::{
    CancelFlag, ChainIntegrityError, ChainValidator, MiningResult, PowError, ProofOfWork,
    TransactionValidator,
};
use crate::core::{Block, Transaction};
use crate::ledger::{Ledger, LedgerError};
use crate::network::{ChainResponse, ConflictResolver, HttpPeerClient, PeerClient, PeerError, ResolutionOutcome};
use crate::storage::FileStore;
use crate::wallet::{derive_address, verify_attached};
use secp256k1::PublicKey;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Mining(#[from] PowError),
    #[error(transparent)]
    Peer(#[from] PeerError),
    #[error("sender {sender} does not belong to the signing key ({derived})")]
    SenderMismatch { sender: String, derived: String },
    /// Another writer extended or replaced the chain while the proof was searched
    #[error("chain tip moved from {expected} while mining")]
    StaleTip { expected: String },
    #[error("mining worker failed: {0}")]
    Worker(String),
}

/// A freshly sealed block with the search that produced it
#[derive(Debug, Clone)]
pub struct SealedBlock {
    pub block: Block,
    pub mining: MiningResult,
}

/// Owns the shared ledger, the proof-of-work engine and the peer resolver.
///
/// Every mutation goes through the ledger's write lock.
pub struct Node<C = HttpPeerClient> {
    ledger: Arc<RwLock<Ledger>>,
    pow: ProofOfWork,
    resolver: ConflictResolver<C>,
}

impl Node<HttpPeerClient> {
    /// Open the on-disk ledger under `config.data_dir` and register the bootstrap peers
    pub async fn open(config: &NodeConfig) -> Result<Self, NodeError> {
        let pow = ProofOfWork::new(config.difficulty)?;
        let timeout = config.peer_timeout();
        let client = HttpPeerClient::new(timeout)?;
        let ledger = Ledger::open(FileStore::in_dir(&config.data_dir))?;

        let resolver = ConflictResolver::new(client, ChainValidator::new(pow, config.validation))
            .with_fetch_timeout(timeout);
        resolver.register_peers(&config.peers).await?;
        Ok(Self::new(ledger, pow, resolver))
    }
}

impl<C: PeerClient> Node<C> {
    pub fn new(ledger: Ledger, pow: ProofOfWork, resolver: ConflictResolver<C>) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            pow,
            resolver,
        }
    }

    /// Shared handle for readers
    pub fn ledger(&self) -> Arc<RwLock<Ledger>> {
        self.ledger.clone()
    }

    pub fn resolver(&self) -> &ConflictResolver<C> {
        &self.resolver
    }

    pub fn pow(&self) -> &ProofOfWork {
        &self.pow
    }

    /// Admit a signed transaction into the pending pool.
    ///
    /// The key must derive the sender address and verify the attached signature.
    pub async fn submit_transaction(
        &self,
        tx: Transaction,
        public_key: &PublicKey,
    ) -> Result<u64, NodeError> {
        TransactionValidator::validate_fields(&tx).map_err(LedgerError::from)?;

        let derived = derive_address(public_key);
        if !tx.sender.matches(derived.as_str()) {
            return Err(NodeError::SenderMismatch {
                sender: tx.sender.to_string(),
                derived: derived.to_string(),
            });
        }
        verify_attached(public_key, &tx).map_err(LedgerError::from)?;

        let index = self.ledger.write().await.append_transaction(tx)?;
        Ok(index)
    }

    /// Search a proof on the current tip and seal the pending pool with it
    pub async fn mine(&self, cancel: &CancelFlag) -> Result<SealedBlock, NodeError> {
        let (previous_proof, previous_hash) = {
            let ledger = self.ledger.read().await;
            let last = ledger.last_block()?;
            (last.proof, Ledger::compute_hash(last))
        };

        log::info!(
            "Mining on {} at difficulty {}",
            previous_hash,
            self.pow.difficulty()
        );
        let pow = self.pow;
        let flag = cancel.clone();
        let result = tokio::task::spawn_blocking(move || {
            pow.find_proof_cancellable(previous_proof, &flag)
        })
        .await
        .map_err(|e| NodeError::Worker(e.to_string()))??;

        let mut ledger = self.ledger.write().await;
        let tip = Ledger::compute_hash(ledger.last_block()?);
        if tip != previous_hash {
            log::warn!("Discarding proof {}: tip moved to {}", result.proof, tip);
            return Err(NodeError::StaleTip {
                expected: previous_hash,
            });
        }

        let block = ledger.seal_block(result.proof, previous_hash)?;
        log::info!(
            "Mined block {} in {} attempts ({:.2?}, {:.1} KH/s)",
            block.index,
            result.attempts,
            result.duration,
            result.hash_rate() / 1000.0
        );
        Ok(SealedBlock {
            block,
            mining: result,
        })
    }

    /// Admit a transaction and seal it in a block right away
    pub async fn submit_and_seal(
        &self,
        tx: Transaction,
        public_key: &PublicKey,
        cancel: &CancelFlag,
    ) -> Result<SealedBlock, NodeError> {
        self.submit_transaction(tx, public_key).await?;
        self.mine(cancel).await
    }

    /// Run one conflict-resolution round against the registered peers
    pub async fn resolve(&self) -> Result<ResolutionOutcome, NodeError> {
        Ok(self.resolver.resolve(&self.ledger).await?)
    }

    /// The `{length, chain}` body this node would answer a peer with
    pub async fn chain_response(&self) -> ChainResponse {
        ChainResponse::new(self.ledger.read().await.chain().to_vec())
    }

    /// Check the local chain with the configured validator
    pub async fn validate_local(&self) -> Result<(), ChainIntegrityError> {
        let ledger = self.ledger.read().await;
        self.resolver.validator().validate(ledger.chain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Amount, TransactionKind, now_millis};
    use crate::storage::MemoryStore;
    use crate::wallet::KeyPair;

    struct NoPeers;

    impl PeerClient for NoPeers {
        async fn fetch_chain(&self, host: &str) -> Result<ChainResponse, PeerError> {
            Err(PeerError::Network {
                host: host.to_string(),
                message: "offline".to_string(),
            })
        }
    }

    fn node(difficulty: u32) -> Node<NoPeers> {
        let pow = ProofOfWork::new(difficulty).unwrap();
        let ledger = Ledger::open(MemoryStore::new()).unwrap();
        Node::new(ledger, pow, ConflictResolver::new(NoPeers, ChainValidator::strict(pow)))
    }

    fn signed_by(keys: &KeyPair) -> Transaction {
        let mut tx = Transaction::new(
            keys.address.clone(),
            "0xrecipient",
            Amount::parse("2.5").unwrap(),
            TransactionKind::Contribution,
            now_millis(),
        );
        keys.sign(&mut tx);
        tx
    }

    #[tokio::test]
    async fn test_submit_requires_valid_signature() {
        let node = node(1);
        let keys = KeyPair::generate();

        let mut unsigned = signed_by(&keys);
        unsigned.signature = None;
        assert!(matches!(
            node.submit_transaction(unsigned, &keys.public_key).await,
            Err(NodeError::Ledger(LedgerError::Signature(_)))
        ));

        let mut tampered = signed_by(&keys);
        tampered.amount = Amount::parse("25").unwrap();
        assert!(node.submit_transaction(tampered, &keys.public_key).await.is_err());

        assert_eq!(
            node.submit_transaction(signed_by(&keys), &keys.public_key).await.unwrap(),
            2
        );
        assert_eq!(node.ledger().read().await.pending().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_rejects_foreign_key() {
        let node = node(1);
        let owner = KeyPair::generate();
        let other = KeyPair::generate();

        let result = node.submit_transaction(signed_by(&owner), &other.public_key).await;
        assert!(matches!(result, Err(NodeError::SenderMismatch { .. })));
    }

    #[tokio::test]
    async fn test_mine_seals_pending() {
        let node = node(1);
        let keys = KeyPair::generate();
        node.submit_transaction(signed_by(&keys), &keys.public_key).await.unwrap();

        let sealed = node.mine(&CancelFlag::new()).await.unwrap();
        assert_eq!(sealed.block.index, 2);
        assert_eq!(sealed.block.transactions.len(), 1);

        let ledger = node.ledger();
        let ledger = ledger.read().await;
        assert!(ledger.pending().is_empty());
        assert_eq!(sealed.block.previous_hash, Ledger::compute_hash(&ledger.chain()[0]));
        drop(ledger);
        assert!(node.validate_local().await.is_ok());
    }

    #[tokio::test]
    async fn test_cancelled_mining_leaves_ledger_untouched() {
        let node = node(8);
        let cancel = CancelFlag::new();
        cancel.cancel();

        assert!(matches!(
            node.mine(&cancel).await,
            Err(NodeError::Mining(PowError::Cancelled { .. }))
        ));
        assert_eq!(node.ledger().read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submit_and_seal() {
        let node = node(1);
        let keys = KeyPair::generate();
        let tx = signed_by(&keys);
        let sealed = node
            .submit_and_seal(tx.clone(), &keys.public_key, &CancelFlag::new())
            .await
            .unwrap();

        assert_eq!(sealed.block.transactions, vec![tx.clone()]);
        let response = node.chain_response().await;
        assert_eq!(response.length, 2);

        let receipt = tx.receipt_hash(sealed.block.index);
        let found = node.ledger().read().await.find_transaction(&receipt).unwrap();
        assert_eq!(found.block_index, 2);
    }

    #[tokio::test]
    async fn test_resolve_without_reachable_peers_keeps_chain() {
        let node = node(1);
        node.resolver().register_peer("http://10.255.255.1:5000").await.unwrap();

        let outcome = node.resolve().await.unwrap();
        assert!(!outcome.replaced);
        assert_eq!(outcome.chain_length, 1);
        assert_eq!(outcome.failed_peers, vec!["10.255.255.1:5000".to_string()]);
    }
}
