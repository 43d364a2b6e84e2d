//! `CoordinationMessage` wire format and codec (spec.md §6, §3).
//!
//! Encoded with `bincode` over `serde`-derived types, matching the
//! teacher's wire codec (`frost_signer::net::Message` is also a
//! `bincode`-over-`serde` struct).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::chain::PublicKeyHash;
use crate::proposal::Proposal;

/// A leader's single broadcast for a window (spec.md §3, §6).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinationMessage {
    /// Group seat index, `1..=255`.
    pub sender_id: u8,
    pub coordination_block: u64,
    pub wallet_public_key_hash: PublicKeyHash,
    pub proposal: Proposal,
}

impl CoordinationMessage {
    pub fn new(
        sender_id: u8,
        coordination_block: u64,
        wallet_public_key_hash: PublicKeyHash,
        proposal: Proposal,
    ) -> Self {
        Self {
            sender_id,
            coordination_block,
            wallet_public_key_hash,
            proposal,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        let bytes = bincode::serialize(self)?;
        debug!(bytes = bytes.len(), "encoded coordination message");
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("coordination message codec error: {0}")]
    Codec(#[from] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proposal::DepositKey;

    fn roundtrip(msg: CoordinationMessage) {
        let bytes = msg.encode().unwrap();
        let decoded = CoordinationMessage::decode(&bytes).unwrap();
        assert_eq!(msg, decoded);
    }

    #[test]
    fn roundtrips_every_proposal_variant() {
        roundtrip(CoordinationMessage::new(1, 900, [1; 20], Proposal::Noop));
        roundtrip(CoordinationMessage::new(
            2,
            900,
            [2; 20],
            Proposal::Redemption {
                output_scripts: vec![vec![1, 2, 3], vec![4, 5]],
                tx_fee: 10_000,
            },
        ));
        roundtrip(CoordinationMessage::new(
            3,
            900,
            [3; 20],
            Proposal::DepositSweep {
                tx_fee: 5_000,
                deposit_keys: vec![DepositKey {
                    funding_tx_hash: [7; 32],
                    output_index: 1,
                }],
            },
        ));
        roundtrip(CoordinationMessage::new(
            4,
            900,
            [4; 20],
            Proposal::MovingFunds {
                target_wallets: vec![[8; 20]],
                tx_fee: 2_500,
            },
        ));
        roundtrip(CoordinationMessage::new(
            5,
            900,
            [5; 20],
            Proposal::MovedFundsSweep {
                tx_fee: 1_000,
                moving_funds_tx_hash: [9; 32],
                output_index: 0,
            },
        ));
        roundtrip(CoordinationMessage::new(
            6,
            900,
            [6; 20],
            Proposal::Heartbeat {
                message: b"ping".to_vec(),
            },
        ));
    }

    #[test]
    fn decode_rejects_garbage() {
        let err = CoordinationMessage::decode(&[0xff, 0x00, 0x01]);
        assert!(err.is_err());
    }
}
