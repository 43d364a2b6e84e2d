//! The proposal validator bank (spec.md §6, "Proposal validator (consumed)").
//!
//! Per-action semantic checks against chain and Bitcoin state (e.g.
//! required funding-tx confirmations for deposit sweeps). The
//! coordination core only runs the cheap structural/checklist checks in
//! [`crate::executor`]; a validator registered here runs downstream,
//! after `coordinate()` returns — design note §9's "registry of
//! per-variant ... validator tables".

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use crate::chain::PublicKeyHash;
use crate::proposal::{Proposal, WalletActionType};

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("proposal rejected: {0}")]
    Rejected(String),
    #[error("validator unavailable: {0}")]
    Unavailable(String),
}

/// A per-action semantic validator (spec.md §6).
#[async_trait]
pub trait ProposalValidator: Send + Sync {
    async fn validate(
        &self,
        wallet_public_key_hash: PublicKeyHash,
        proposal: &Proposal,
    ) -> Result<(), ValidationError>;
}

/// A closed registry of validators keyed by the action type they handle.
/// Adding a new action variant means registering a validator here too
/// (design note §9).
#[derive(Default)]
pub struct ValidatorBank {
    validators: HashMap<WalletActionType, Box<dyn ProposalValidator>>,
}

impl ValidatorBank {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, action: WalletActionType, validator: Box<dyn ProposalValidator>) {
        self.validators.insert(action, validator);
    }

    /// Runs the registered validator for `proposal`'s action type. A
    /// `Noop` proposal always validates trivially: the core never submits
    /// it downstream, so there is nothing to check.
    pub async fn validate(
        &self,
        wallet_public_key_hash: PublicKeyHash,
        proposal: &Proposal,
    ) -> Result<(), ValidationError> {
        let action = proposal.action_type();
        if action == WalletActionType::Noop {
            return Ok(());
        }
        match self.validators.get(&action) {
            Some(validator) => validator.validate(wallet_public_key_hash, proposal).await,
            None => Err(ValidationError::Unavailable(format!(
                "no validator registered for {action:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::Proposal;

    struct AlwaysOk;

    #[async_trait]
    impl ProposalValidator for AlwaysOk {
        async fn validate(
            &self,
            _wallet_public_key_hash: PublicKeyHash,
            _proposal: &Proposal,
        ) -> Result<(), ValidationError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn noop_always_validates() {
        let bank = ValidatorBank::new();
        assert!(bank.validate([0; 20], &Proposal::Noop).await.is_ok());
    }

    #[tokio::test]
    async fn missing_validator_is_unavailable() {
        let bank = ValidatorBank::new();
        let proposal = Proposal::Heartbeat {
            message: vec![1, 2, 3],
        };
        let err = bank.validate([0; 20], &proposal).await.unwrap_err();
        assert!(matches!(err, ValidationError::Unavailable(_)));
    }

    #[tokio::test]
    async fn registered_validator_runs() {
        let mut bank = ValidatorBank::new();
        bank.register(WalletActionType::Heartbeat, Box::new(AlwaysOk));
        let proposal = Proposal::Heartbeat {
            message: vec![1, 2, 3],
        };
        assert!(bank.validate([0; 20], &proposal).await.is_ok());
    }
}
