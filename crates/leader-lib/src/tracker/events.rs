//! Resource update event consumer
//!
//! Keeps the bounded event channel drained so publishers never wait for long,
//! logs the rack sums named by each event, and fans the event out to
//! subscribers. Capacity gauges are set by the tracker itself on every change.

use super::LeaderResourceTracker;
use crate::health::components;
use crate::models::ResourceUpdateEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

pub(super) async fn run(
    tracker: Arc<LeaderResourceTracker>,
    mut events: mpsc::Receiver<ResourceUpdateEvent>,
    mut shutdown: broadcast::Receiver<()>,
) {
    info!("Starting resource update consumer");
    tracker.mark_component(components::EVENT_CONSUMER, true).await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => dispatch(&tracker, event).await,
                None => break,
            },
            _ = shutdown.recv() => {
                // Deliver what was already accepted before stopping
                while let Ok(event) = events.try_recv() {
                    dispatch(&tracker, event).await;
                }
                break;
            }
        }
    }

    info!("Shutting down resource update consumer");
    tracker
        .mark_component(components::EVENT_CONSUMER, false)
        .await;
}

async fn dispatch(tracker: &LeaderResourceTracker, event: ResourceUpdateEvent) {
    {
        let topology = tracker.topology().await;
        let (resource, allocated, agents) = topology
            .rack(&event.data_center, &event.rack)
            .map(|rack| (rack.resource(), rack.allocated(), rack.len()))
            .unwrap_or_default();

        debug!(
            data_center = %event.data_center,
            rack = %event.rack,
            agents = agents,
            rack_resource = %resource,
            rack_allocated = %allocated,
            "Rack capacity changed"
        );
    }

    // No receivers is the normal state until someone subscribes
    let _ = tracker.subscribers.send(event);
}
