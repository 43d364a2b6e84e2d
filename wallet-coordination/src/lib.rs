//! Wallet coordination core: the distributed protocol by which a
//! threshold-signature Bitcoin custodian's signing group agrees, once per
//! coordination window, on a wallet action and its parameters before any
//! threshold-ECDSA signing takes place.
//!
//! This crate is the coordination layer only. The on-chain state
//! provider, the broadcast transport, the proposal generator/validator
//! bank, and the downstream signing executor are all external
//! collaborators, represented here as traits ([`chain::ChainProvider`],
//! [`channel::ChannelSend`]/[`channel::ChannelRecv`],
//! [`generator::ProposalGenerator`], [`validator::ProposalValidator`])
//! with no concrete chain/network implementation shipped.

pub mod chain;
pub mod channel;
pub mod checklist;
pub mod config;
pub mod executor;
pub mod fault;
pub mod generator;
pub mod leader;
pub mod message;
pub mod proposal;
pub mod seed;
pub mod supervisor;
pub mod validator;
pub mod watcher;
pub mod window;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;
