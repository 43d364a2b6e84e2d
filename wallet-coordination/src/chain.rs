//! The on-chain state provider (spec.md §6, "Chain provider (consumed)").
//!
//! This crate only consumes this interface; no concrete implementation
//! (RPC client, indexer, whatever) ships here. A real node wires a
//! concrete `ChainProvider` up to its own block source.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use thiserror::Error;
use tokio::sync::{mpsc, watch};

/// 20-byte canonical operator address (`chain.signing().publicKeyToAddress`).
pub type OperatorAddress = [u8; 20];

/// `HASH160` of an uncompressed secp256k1 point.
pub type PublicKeyHash = [u8; 20];

/// A block hash, in the chain's native (internal) byte order.
pub type BlockHash = [u8; 32];

/// Cooperative-cancellation handle passed to [`ChainProvider::watch_blocks`]
/// (spec.md §6's `watchBlocks(ctx)`), wrapping a
/// `tokio::sync::watch::Receiver<bool>` in a newtype so it has a `Debug`
/// impl of its own — mockall's generated expectations format arguments on
/// a mismatch, and `watch::Receiver` doesn't derive `Debug`.
#[derive(Clone)]
pub struct StopSignal(pub watch::Receiver<bool>);

impl std::fmt::Debug for StopSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StopSignal(stopped={})", *self.0.borrow())
    }
}

impl StopSignal {
    pub fn new(receiver: watch::Receiver<bool>) -> Self {
        Self(receiver)
    }

    pub fn is_stopped(&self) -> bool {
        *self.0.borrow()
    }
}

/// A wallet as seen by the chain: its public key and the operators holding
/// seats in its signing group (spec.md §3 `Wallet`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Wallet {
    /// Uncompressed secp256k1 point.
    pub public_key: Vec<u8>,
    /// Ordered list of operator addresses, one per seat. Duplicates are
    /// permitted and meaningful: an operator may control multiple seats.
    pub signing_group_operators: Vec<OperatorAddress>,
}

impl Wallet {
    pub fn new(public_key: Vec<u8>, signing_group_operators: Vec<OperatorAddress>) -> Self {
        Self {
            public_key,
            signing_group_operators,
        }
    }

    /// `publicKeyHash = HASH160(publicKey)`.
    pub fn public_key_hash(&self) -> PublicKeyHash {
        hash160(&self.public_key)
    }
}

/// `HASH160(data) = RIPEMD160(SHA256(data))`, Bitcoin's usual address hash.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    use bitcoin::hashes::Hash;
    bitcoin::hashes::hash160::Hash::hash(data).into_inner()
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("chain provider unreachable: {0}")]
    Unreachable(String),
    #[error("block {0} has no hash yet (not mined or pruned)")]
    NoSuchBlock(u64),
    #[error("unknown wallet {0:?}")]
    UnknownWallet(PublicKeyHash),
}

/// The on-chain state provider (spec.md §6).
///
/// Safe to call concurrently from multiple wallet executors (spec.md §5,
/// "Shared resources").
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// `blockCounter.currentBlock()`.
    async fn current_block(&self) -> Result<u64, ChainError>;

    /// `blockCounter.watchBlocks(ctx)`: starts streaming block numbers as
    /// they are observed (monotone, may skip, may duplicate — the window
    /// watcher dedupes by strict-monotone window) until `stop` fires.
    /// Returns the receiving half of the stream; the provider owns
    /// pushing to the paired sender on whatever schedule its underlying
    /// block source ticks at (poll loop, websocket subscription, etc).
    async fn watch_blocks(&self, stop: StopSignal) -> Result<mpsc::Receiver<u64>, ChainError>;

    /// `chain.getBlockHashByNumber`.
    async fn block_hash_by_number(&self, number: u64) -> Result<BlockHash, ChainError>;

    /// `chain.signing().publicKeyToAddress`.
    fn operator_address(&self, public_key: &[u8]) -> OperatorAddress;

    /// Current wallet state (public key and signing group), looked up by
    /// its public key hash. Not named individually in spec.md §6 but
    /// required by every caller that only knows the hash (the executor is
    /// constructed per-wallet and needs the operator roster to elect a
    /// leader and run follower validation).
    async fn wallet(&self, public_key_hash: PublicKeyHash) -> Result<Wallet, ChainError>;
}
