//! Scheduled snapshot flush loop (interval-flush mode only).

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use metrel_core::store::{FileSaver, MemStore, Storage};

/// Flushes the store's snapshot to disk on every tick. On cancellation,
/// performs exactly one final flush before returning, so nothing collected
/// since the last tick is lost on clean shutdown. Flush failures are logged;
/// the in-memory store stays authoritative.
pub(crate) async fn flush_loop(
    store: Arc<MemStore>,
    saver: FileSaver,
    period: Duration,
    token: CancellationToken,
) {
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // The first interval tick fires immediately; the first flush is due one
    // full period from now.
    tick.tick().await;

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                match saver.save(&store.snapshot()) {
                    Ok(()) => info!("final snapshot flushed"),
                    Err(e) => error!(error = %e, "final snapshot flush failed"),
                }
                return;
            }
            _ = tick.tick() => {
                match saver.save(&store.snapshot()) {
                    Ok(()) => debug!("snapshot flushed"),
                    Err(e) => error!(error = %e, "scheduled snapshot flush failed"),
                }
            }
        }
    }
}
