//! Hand-written fakes for the external collaborator traits, for use by
//! this crate's own tests and by `tests/` integration suites.
//!
//! Complements the `mockall`-generated `Mock*` types (one per trait, via
//! `#[cfg_attr(any(test, feature = "test-utils"), automock)]`) with fakes
//! that hold actual state — closer to the teacher's own
//! `HttpNetListen`/`HttpNet` split than to a strict-expectation mock, and
//! a better fit for the end-to-end leader/follower scenarios in spec.md
//! §8 where several messages flow through one shared channel.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::chain::{
    BlockHash, ChainError, ChainProvider, OperatorAddress, PublicKeyHash, StopSignal, Wallet,
};
use crate::channel::{ChannelError, ChannelRecv, ChannelSend, Envelope, MembershipValidator};
use crate::generator::{GeneratorError, ProposalGenerator};
use crate::message::CoordinationMessage;
use crate::proposal::{Proposal, WalletActionType};

/// A chain provider backed by plain in-memory maps. Every block number
/// not explicitly inserted returns [`ChainError::NoSuchBlock`].
#[derive(Default)]
pub struct FakeChainProvider {
    block_hashes: Mutex<HashMap<u64, BlockHash>>,
    wallets: Mutex<HashMap<PublicKeyHash, Wallet>>,
    current_block: Mutex<u64>,
    /// Blocks `watch_blocks` feeds into its returned receiver, in order,
    /// as fast as the receiver drains them.
    blocks_to_watch: Mutex<Vec<u64>>,
}

impl FakeChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_hash(self, number: u64, hash: BlockHash) -> Self {
        self.block_hashes.lock().unwrap().insert(number, hash);
        self
    }

    pub fn with_wallet(self, public_key_hash: PublicKeyHash, wallet: Wallet) -> Self {
        self.wallets.lock().unwrap().insert(public_key_hash, wallet);
        self
    }

    pub fn with_current_block(self, block: u64) -> Self {
        *self.current_block.lock().unwrap() = block;
        self
    }

    /// Configures the sequence of block numbers `watch_blocks` streams.
    pub fn with_watched_blocks(self, blocks: impl IntoIterator<Item = u64>) -> Self {
        *self.blocks_to_watch.lock().unwrap() = blocks.into_iter().collect();
        self
    }
}

#[async_trait]
impl ChainProvider for FakeChainProvider {
    async fn current_block(&self) -> Result<u64, ChainError> {
        Ok(*self.current_block.lock().unwrap())
    }

    async fn watch_blocks(&self, mut stop: StopSignal) -> Result<mpsc::Receiver<u64>, ChainError> {
        let blocks = self.blocks_to_watch.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(blocks.len().max(1));
        tokio::spawn(async move {
            for block in blocks {
                if stop.is_stopped() {
                    return;
                }
                tokio::select! {
                    biased;
                    _ = stop.0.changed() => {
                        if stop.is_stopped() {
                            return;
                        }
                    }
                    sent = tx.send(block) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn block_hash_by_number(&self, number: u64) -> Result<BlockHash, ChainError> {
        self.block_hashes
            .lock()
            .unwrap()
            .get(&number)
            .copied()
            .ok_or(ChainError::NoSuchBlock(number))
    }

    fn operator_address(&self, public_key: &[u8]) -> OperatorAddress {
        crate::chain::hash160(public_key)
    }

    async fn wallet(&self, public_key_hash: PublicKeyHash) -> Result<Wallet, ChainError> {
        self.wallets
            .lock()
            .unwrap()
            .get(&public_key_hash)
            .cloned()
            .ok_or(ChainError::UnknownWallet(public_key_hash))
    }
}

/// A membership validator over a fixed roster of `(seat, public key)`
/// pairs.
#[derive(Default)]
pub struct FakeMembershipValidator {
    roster: HashMap<u8, Vec<u8>>,
}

impl FakeMembershipValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seat(mut self, seat: u8, public_key: Vec<u8>) -> Self {
        self.roster.insert(seat, public_key);
        self
    }
}

impl MembershipValidator for FakeMembershipValidator {
    fn is_member(&self, sender_id: u8, sender_public_key: &[u8]) -> bool {
        self.roster
            .get(&sender_id)
            .map(|key| key.as_slice() == sender_public_key)
            .unwrap_or(false)
    }
}

/// A proposal generator that always returns a fixed, pre-configured
/// proposal (or `Noop` if none was configured).
pub struct FakeProposalGenerator {
    proposal: Proposal,
}

impl FakeProposalGenerator {
    pub fn always(proposal: Proposal) -> Self {
        Self { proposal }
    }

    pub fn noop() -> Self {
        Self {
            proposal: Proposal::Noop,
        }
    }
}

#[async_trait]
impl ProposalGenerator for FakeProposalGenerator {
    async fn generate(
        &self,
        _wallet_public_key_hash: PublicKeyHash,
        checklist: &[WalletActionType],
    ) -> Result<Proposal, GeneratorError> {
        if checklist.contains(&self.proposal.action_type()) || self.proposal.is_noop() {
            Ok(self.proposal.clone())
        } else {
            Ok(Proposal::Noop)
        }
    }
}

/// An in-process broadcast bus: every [`FakeChannelSend`]/[`FakeChannelRecv`]
/// pair produced from the same [`FakeBroadcast`] sees every message sent
/// by any of them, modelling the shared-channel semantics spec.md §5
/// describes ("the per-wallet broadcast channel is shared by the leader
/// ... and the follower").
pub struct FakeBroadcast {
    sender: tokio::sync::broadcast::Sender<(Vec<u8>, CoordinationMessage)>,
}

impl FakeBroadcast {
    pub fn new() -> Self {
        let (sender, _rx) = tokio::sync::broadcast::channel(256);
        Self { sender }
    }

    /// A send handle stamped with `sender_public_key` as its transport
    /// identity.
    pub fn sender(&self, sender_public_key: Vec<u8>) -> FakeChannelSend {
        FakeChannelSend {
            sender_public_key,
            bus: self.sender.clone(),
        }
    }

    pub fn receiver(&self) -> FakeChannelRecv {
        FakeChannelRecv {
            bus: self.sender.subscribe(),
        }
    }
}

impl Default for FakeBroadcast {
    fn default() -> Self {
        Self::new()
    }
}

pub struct FakeChannelSend {
    sender_public_key: Vec<u8>,
    bus: tokio::sync::broadcast::Sender<(Vec<u8>, CoordinationMessage)>,
}

#[async_trait]
impl ChannelSend for FakeChannelSend {
    async fn send(&self, message: CoordinationMessage) -> Result<(), ChannelError> {
        self.bus
            .send((self.sender_public_key.clone(), message))
            .map(|_| ())
            .map_err(|err| ChannelError::Send(err.to_string()))
    }
}

pub struct FakeChannelRecv {
    bus: tokio::sync::broadcast::Receiver<(Vec<u8>, CoordinationMessage)>,
}

#[async_trait]
impl ChannelRecv for FakeChannelRecv {
    async fn recv(&mut self) -> Result<Envelope, ChannelError> {
        loop {
            match self.bus.recv().await {
                Ok((sender_public_key, message)) => {
                    return Ok(Envelope {
                        sender_public_key,
                        message,
                    })
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                    return Err(ChannelError::Closed)
                }
                // A slow receiver that lagged behind just catches up on
                // the next message; it never corrupts correctness here
                // since every message still carries its own window/wallet
                // hash for the follower to filter on.
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
            }
        }
    }
}

