//! The window watcher (spec.md §4.1).
//!
//! Consumes a monotone (but possibly skipping or duplicating) stream of
//! block numbers and emits a [`Window`] exactly once for every block that
//! is a positive multiple of `F` and strictly follows the last window
//! emitted. Callback dispatch is spawned so the watch loop never blocks.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::chain::{ChainError, ChainProvider, StopSignal};
use crate::config::Config;
use crate::window::Window;

/// Runs the watch loop until `blocks` is closed or `stop` fires.
///
/// `on_window` is invoked (on its own spawned task) for every qualifying
/// window, in increasing order; the watcher itself never awaits the
/// callback.
pub async fn watch<F, Fut>(
    cfg: Config,
    mut blocks: mpsc::Receiver<u64>,
    mut stop: tokio::sync::watch::Receiver<bool>,
    on_window: F,
) where
    F: Fn(Window) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let on_window = Arc::new(on_window);
    let mut last_emitted: Option<Window> = None;

    loop {
        tokio::select! {
            biased;
            _ = stop.changed() => {
                if *stop.borrow() {
                    debug!("window watcher stopping");
                    return;
                }
            }
            maybe_block = blocks.recv() => {
                let Some(block) = maybe_block else {
                    debug!("window watcher block stream closed");
                    return;
                };
                let candidate = Window::new(block);
                if !candidate.is_valid(&cfg) {
                    continue;
                }
                if !candidate.is_after(last_emitted.as_ref()) {
                    continue;
                }
                last_emitted = Some(candidate);
                debug!(block = candidate.coordination_block, "emitting window");
                let cb = Arc::clone(&on_window);
                tokio::spawn(async move { cb(candidate).await });
            }
        }
    }
}

/// Wires a [`ChainProvider`]'s block stream (spec.md §6's
/// `blockCounter.watchBlocks(ctx) -> stream<uint64>`) directly into
/// [`watch`], so a caller only needs to supply the chain collaborator and
/// a stop signal instead of manually pumping block numbers into an
/// `mpsc` channel itself.
pub async fn watch_chain<C, F, Fut>(
    chain: &C,
    cfg: Config,
    stop: tokio::sync::watch::Receiver<bool>,
    on_window: F,
) -> Result<(), ChainError>
where
    C: ChainProvider,
    F: Fn(Window) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = ()> + Send + 'static,
{
    let blocks = chain.watch_blocks(StopSignal::new(stop.clone())).await?;
    watch(cfg, blocks, stop, on_window).await;
    Ok(())
}
