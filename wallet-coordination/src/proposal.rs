//! Proposals and the wallet action checklist (spec.md §3 `Proposal`, §4.5).

use serde::{Deserialize, Serialize};

use crate::chain::OperatorAddress;

/// The closed set of wallet action kinds (spec.md §3).
///
/// Adding a variant means touching this enum, [`crate::checklist`] (if it
/// should participate in full windows), and the codec/validator tables in
/// [`crate::message`] and [`crate::validator`] — design note §9.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletActionType {
    Redemption,
    DepositSweep,
    MovingFunds,
    MovedFundsSweep,
    Heartbeat,
    /// No action was viable. Never placed on a checklist; only ever
    /// appears as the action type of a [`Proposal::Noop`].
    Noop,
}

/// A funding UTXO being swept in a deposit sweep.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositKey {
    /// Internal (non-reversed) byte order, per spec.md §6.
    pub funding_tx_hash: [u8; 32],
    pub output_index: u32,
}

/// A leader's proposal for this window's wallet action (spec.md §3, §6).
///
/// Each variant carries its own action-specific parameters. `Noop` carries
/// none and must never be submitted to the downstream signing executor
/// (spec.md §3: "A `Noop` proposal has no validity blocks").
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proposal {
    Noop,
    Redemption {
        output_scripts: Vec<Vec<u8>>,
        tx_fee: u64,
    },
    DepositSweep {
        tx_fee: u64,
        deposit_keys: Vec<DepositKey>,
    },
    MovingFunds {
        target_wallets: Vec<OperatorAddress>,
        tx_fee: u64,
    },
    MovedFundsSweep {
        tx_fee: u64,
        moving_funds_tx_hash: [u8; 32],
        output_index: u32,
    },
    Heartbeat {
        message: Vec<u8>,
    },
}

impl Proposal {
    pub fn action_type(&self) -> WalletActionType {
        match self {
            Proposal::Noop => WalletActionType::Noop,
            Proposal::Redemption { .. } => WalletActionType::Redemption,
            Proposal::DepositSweep { .. } => WalletActionType::DepositSweep,
            Proposal::MovingFunds { .. } => WalletActionType::MovingFunds,
            Proposal::MovedFundsSweep { .. } => WalletActionType::MovedFundsSweep,
            Proposal::Heartbeat { .. } => WalletActionType::Heartbeat,
        }
    }

    /// Number of blocks the proposal remains valid for downstream signing.
    /// `Noop` has none, per spec.md §3.
    ///
    /// These windows are conservative defaults for the coordination layer
    /// itself; the per-action validator bank (out of scope here) may apply
    /// tighter, chain-state-dependent bounds before signing.
    pub fn validity_blocks(&self) -> Option<u64> {
        match self {
            Proposal::Noop => None,
            Proposal::Redemption { .. } => Some(REDEMPTION_VALIDITY_BLOCKS),
            Proposal::DepositSweep { .. } => Some(SWEEP_VALIDITY_BLOCKS),
            Proposal::MovingFunds { .. } => Some(SWEEP_VALIDITY_BLOCKS),
            Proposal::MovedFundsSweep { .. } => Some(SWEEP_VALIDITY_BLOCKS),
            Proposal::Heartbeat { .. } => Some(HEARTBEAT_VALIDITY_BLOCKS),
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Proposal::Noop)
    }
}

const REDEMPTION_VALIDITY_BLOCKS: u64 = 900;
const SWEEP_VALIDITY_BLOCKS: u64 = 900;
const HEARTBEAT_VALIDITY_BLOCKS: u64 = 100;
