//! Seed derivation (spec.md §4.3).

use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::chain::{BlockHash, ChainError, ChainProvider, PublicKeyHash};
use crate::config::Config;
use crate::window::Window;

/// `Seed = SHA256(walletPublicKeyHash ‖ safeBlockHash)`.
///
/// A 32-byte digest, deterministic for a fixed `(walletPublicKeyHash,
/// safeBlockHash)` pair (spec.md §8 invariant 4).
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Seed(pub [u8; 32]);

impl Seed {
    /// The first 8 bytes, interpreted big-endian, as used by leader
    /// election (spec.md §4.4 step 3) and the heartbeat predicate
    /// (spec.md §4.5).
    pub fn leading_u64(&self) -> u64 {
        u64::from_be_bytes(self.0[..8].try_into().expect("8 bytes"))
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Seed({})", hex::encode(self.0))
    }
}

/// Pure seed derivation, no I/O: `SHA256(wallet_public_key_hash ‖
/// safe_block_hash)`.
pub fn derive(wallet_public_key_hash: PublicKeyHash, safe_block_hash: BlockHash) -> Seed {
    let mut hasher = Sha256::new();
    hasher.update(wallet_public_key_hash);
    hasher.update(safe_block_hash);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 32];
    bytes.copy_from_slice(&digest);
    Seed(bytes)
}

#[derive(Error, Debug)]
pub enum Error {
    /// Reading the safe-block hash failed. Spec.md §7: "surfaced; the
    /// window is skipped; no fault recorded" — this is retriable, not a
    /// protocol fault.
    #[error("could not read safe block hash: {0}")]
    SafeBlockUnavailable(#[from] ChainError),
}

/// Fetches the safe-block hash and derives the seed for `(wallet,
/// window)`. The only suspension point in this module (spec.md §5,
/// "reading the safe block hash from the chain provider").
pub async fn derive_for_window(
    chain: &dyn ChainProvider,
    cfg: &Config,
    window: &Window,
    wallet_public_key_hash: PublicKeyHash,
) -> Result<Seed, Error> {
    let safe_block = window.safe_block(cfg);
    let safe_block_hash = chain.block_hash_by_number(safe_block).await?;
    let seed = derive(wallet_public_key_hash, safe_block_hash);
    debug!(
        safe_block,
        seed = %hex::encode(seed.0),
        "derived coordination seed"
    );
    Ok(seed)
}
