//! The proposal generator (spec.md §6, "Proposal generator (consumed)").
//!
//! Opaque to coordination: given a wallet and the window's checklist, it
//! produces the first viable proposal (or `Noop`). No concrete
//! implementation ships in this crate.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use thiserror::Error;

use crate::chain::PublicKeyHash;
use crate::proposal::{Proposal, WalletActionType};

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("proposal generator failed: {0}")]
    Failed(String),
}

/// `generate(walletPublicKeyHash, [WalletActionType]) -> Proposal | error`
/// (spec.md §6). Must return `Proposal::Noop` when no action in the
/// checklist is viable, never an error, for that case.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ProposalGenerator: Send + Sync {
    async fn generate(
        &self,
        wallet_public_key_hash: PublicKeyHash,
        checklist: &[WalletActionType],
    ) -> Result<Proposal, GeneratorError>;
}
