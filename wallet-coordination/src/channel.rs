//! The broadcast channel (spec.md §6, "Broadcast channel (consumed)").
//!
//! Split into two one-way traits per design note §9 of spec.md, so the
//! executor can be both a sender and a receiver without a cyclic
//! dependency between the two halves.

use async_trait::async_trait;
#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;
use thiserror::Error;

use crate::message::CoordinationMessage;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("broadcast send failed: {0}")]
    Send(String),
    #[error("broadcast channel closed")]
    Closed,
    #[error("failed to decode incoming message: {0}")]
    Decode(#[from] crate::message::Error),
}

/// A message as delivered off the wire, still carrying the transport
/// sender's identity (needed by the follower routine to map `sender_id`
/// to an operator address and to check membership before trusting
/// anything in the decoded payload).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Transport-level sender identity (e.g. the signing/auth key that
    /// stamped the broadcast envelope), independent of the `sender_id`
    /// seat index carried inside the decoded message.
    pub sender_public_key: Vec<u8>,
    pub message: CoordinationMessage,
}

/// Best-effort, no-ack broadcast send (spec.md §6 `send(msg)`).
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChannelSend: Send + Sync {
    async fn send(&self, message: CoordinationMessage) -> Result<(), ChannelError>;
}

/// Decoded-message receive side (spec.md §6 `recv(ctx, handler)` /
/// `setUnmarshaler`). Decoding is assumed to have already happened by the
/// time an [`Envelope`] reaches the caller — the transport owns the codec
/// registry (`setUnmarshaler`); this crate only needs the decoded result.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait ChannelRecv: Send + Sync {
    /// Waits for and returns the next message. Returns
    /// [`ChannelError::Closed`] once the channel will never yield another
    /// message (e.g. the node is shutting down).
    async fn recv(&mut self) -> Result<Envelope, ChannelError>;
}

/// Read-only group-roster filter (spec.md §6 `setFilter(predicate)`),
/// shareable across wallet executors.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
pub trait MembershipValidator: Send + Sync {
    /// `true` iff `sender_id` (a group seat index) is a legitimate member
    /// whose transport identity matches `sender_public_key`.
    fn is_member(&self, sender_id: u8, sender_public_key: &[u8]) -> bool;
}
