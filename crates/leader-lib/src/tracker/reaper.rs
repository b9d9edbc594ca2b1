//! Eviction reaper
//!
//! Drains the eviction queue, sleeping until the earliest live entry's
//! deadline, and removes agents whose heartbeat was not refreshed in time.
//! Every popped entry is checked against the topology before and after the
//! wait, which is what makes the queue's stale entries harmless.

use super::LeaderResourceTracker;
use crate::health::components;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::time::{sleep, sleep_until, Instant};
use tracing::{debug, info};

pub(super) async fn run(tracker: Arc<LeaderResourceTracker>, mut shutdown: broadcast::Receiver<()>) {
    let timeout = tracker.config.eviction_timeout;
    info!(
        timeout_secs = timeout.as_secs_f64(),
        "Starting eviction reaper"
    );
    tracker.mark_component(components::REAPER, true).await;

    loop {
        let Some(entry) = tracker.next_eviction_candidate().await else {
            tokio::select! {
                _ = sleep(timeout) => {}
                _ = tracker.reaper_wake.notified() => {}
                _ = shutdown.recv() => break,
            }
            continue;
        };

        let Some(heartbeat) = tracker.current_heartbeat(&entry.location).await else {
            debug!(location = %entry.location, "Discarding queue entry for removed agent");
            continue;
        };

        // Refreshed since this entry was queued; the refresh queued a newer one.
        if heartbeat > entry.heartbeat {
            continue;
        }

        let Some(deadline) = heartbeat.checked_add(timeout) else {
            debug!(location = %entry.location, "Heartbeat deadline out of range, keeping agent");
            continue;
        };
        if deadline > Instant::now() {
            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = shutdown.recv() => break,
            }
        }

        if tracker.evict_if_expired(&entry.location).await.is_none() {
            debug!(location = %entry.location, "Agent refreshed while waiting, keeping it");
        }
    }

    info!("Shutting down eviction reaper");
    tracker.mark_component(components::REAPER, false).await;
}
