//! The node supervisor (spec.md §2 item 8; filled in under "Supplemental
//! component" in `SPEC_FULL.md` since spec.md names it but gives it no
//! dedicated §4 subsection).
//!
//! Dispatches each window event to every wallet-executor the node
//! controls, modeled after the teacher's `Coordinator::run` dispatch loop
//! (`stacks-coordinator::coordinator::Coordinator`), generalized from "one
//! peg operation at a time" to "one independent task per wallet".

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::chain::{ChainProvider, PublicKeyHash};
use crate::channel::{ChannelRecv, ChannelSend, MembershipValidator};
use crate::executor::{CoordinationExecutor, CoordinationResult, Error as ExecutorError};
use crate::generator::ProposalGenerator;
use crate::window::Window;

/// Owns one [`CoordinationExecutor`] per wallet this node participates
/// in, and fans out each [`Window`] event from the window watcher to all
/// of them concurrently.
pub struct Supervisor<S, R, C, M, G> {
    executors: HashMap<PublicKeyHash, Arc<CoordinationExecutor<S, R, C, M, G>>>,
    results: mpsc::Sender<(PublicKeyHash, Result<CoordinationResult, ExecutorError>)>,
}

impl<S, R, C, M, G> Supervisor<S, R, C, M, G>
where
    S: ChannelSend + 'static,
    R: ChannelRecv + 'static,
    C: ChainProvider + 'static,
    M: MembershipValidator + 'static,
    G: ProposalGenerator + 'static,
{
    /// Builds a supervisor over `executors`, returning it together with
    /// the receiving half of the channel every `coordinate()` outcome is
    /// published to (for the downstream signing executor, out of scope
    /// here, to consume).
    pub fn new(
        executors: HashMap<PublicKeyHash, CoordinationExecutor<S, R, C, M, G>>,
        result_buffer: usize,
    ) -> (
        Self,
        mpsc::Receiver<(PublicKeyHash, Result<CoordinationResult, ExecutorError>)>,
    ) {
        let (results, rx) = mpsc::channel(result_buffer);
        let executors = executors
            .into_iter()
            .map(|(hash, executor)| (hash, Arc::new(executor)))
            .collect();
        (Self { executors, results }, rx)
    }

    /// Fans `window` out to every wallet executor as an independent
    /// spawned task, and returns their join handles (callers that don't
    /// need to wait may drop them).
    pub fn dispatch(&self, window: Window) -> Vec<tokio::task::JoinHandle<()>> {
        self.executors
            .iter()
            .map(|(&wallet_public_key_hash, executor)| {
                let executor = Arc::clone(executor);
                let results = self.results.clone();
                tokio::spawn(async move {
                    let outcome = executor.coordinate(window).await;
                    match &outcome {
                        Ok(result) => info!(
                            block = window.coordination_block,
                            wallet = %hex::encode(wallet_public_key_hash),
                            faults = result.faults.len(),
                            "coordination finished"
                        ),
                        Err(ExecutorError::ExecutorBusy) => {
                            // spec.md §7: must not retry within the same window.
                            warn!(
                                block = window.coordination_block,
                                wallet = %hex::encode(wallet_public_key_hash),
                                "wallet executor busy, skipping this window"
                            );
                        }
                        Err(err) => warn!(
                            block = window.coordination_block,
                            wallet = %hex::encode(wallet_public_key_hash),
                            error = %err,
                            "coordination failed"
                        ),
                    }
                    if results.send((wallet_public_key_hash, outcome)).await.is_err() {
                        warn!("coordination result receiver dropped");
                    }
                })
            })
            .collect()
    }

    pub fn wallet_count(&self) -> usize {
        self.executors.len()
    }
}
