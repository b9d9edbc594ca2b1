//! Leader resource tracker
//!
//! Owns the topology and the eviction queue behind one `RwLock`. Every
//! structural change (agent insert, refresh, removal, aggregate deltas, queue
//! push and pop) takes it in write mode; lookups and snapshots take it in read
//! mode. Resource update events are published only after the lock has been
//! released, so a consumer that reads the topology can never deadlock against
//! a publisher waiting for channel capacity.

mod eviction;
mod events;
mod reaper;


pub use eviction::{EvictionEntry, EvictionQueue};

use crate::error::{ResourceError, TrackerConfigError};
use crate::health::{components, HealthRegistry};
use crate::models::{AgentInformation, Location, ResourceUpdateEvent};
use crate::observability::{LeaderMetrics, StructuredLogger};
use crate::topology::{Capacity, DataCenter, Rack, Topology, TopologySnapshot};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, Notify, RwLock, RwLockReadGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Default heartbeat timeout after which an agent is evicted
pub const DEFAULT_EVICTION_TIMEOUT: Duration = Duration::from_secs(15);

/// Longest accepted heartbeat timeout (one week)
pub const MAX_EVICTION_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// What a publisher does when the event channel is full
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOverflow {
    /// Wait for the consumer to make room
    #[default]
    Block,
    /// Discard the event and count it
    Drop,
}

/// Configuration for the tracker and its background tasks
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Heartbeat timeout (default: 15 seconds)
    pub eviction_timeout: Duration,
    /// Capacity of the resource update channel (default: 1)
    pub event_channel_capacity: usize,
    /// Behavior when the resource update channel is full
    pub event_overflow: EventOverflow,
    /// Per-subscriber backlog before a slow subscriber starts lagging
    pub subscriber_capacity: usize,
    /// Name used in structured log events
    pub leader_name: String,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            eviction_timeout: DEFAULT_EVICTION_TIMEOUT,
            event_channel_capacity: 1,
            event_overflow: EventOverflow::Block,
            subscriber_capacity: 64,
            leader_name: "leader".to_string(),
        }
    }
}

impl TrackerConfig {
    pub fn with_eviction_timeout(mut self, timeout: Duration) -> Self {
        self.eviction_timeout = timeout;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn with_event_overflow(mut self, overflow: EventOverflow) -> Self {
        self.event_overflow = overflow;
        self
    }

    pub fn with_subscriber_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_capacity = capacity;
        self
    }

    pub fn with_leader_name(mut self, name: impl Into<String>) -> Self {
        self.leader_name = name.into();
        self
    }

    pub fn validate(&self) -> Result<(), TrackerConfigError> {
        if self.eviction_timeout.is_zero() {
            return Err(TrackerConfigError::ZeroEvictionTimeout);
        }
        if self.eviction_timeout > MAX_EVICTION_TIMEOUT {
            return Err(TrackerConfigError::EvictionTimeoutTooLarge {
                max_secs: MAX_EVICTION_TIMEOUT.as_secs(),
            });
        }
        if self.event_channel_capacity == 0 {
            return Err(TrackerConfigError::ZeroEventCapacity);
        }
        if self.subscriber_capacity == 0 {
            return Err(TrackerConfigError::ZeroSubscriberCapacity);
        }
        Ok(())
    }
}

/// What a single update changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    /// The agent was not known before this report
    pub registered: bool,
    pub resource_changed: bool,
    pub allocated_changed: bool,
}

/// Counters kept by the tracker itself, independent of the Prometheus registry
#[derive(Debug, Default)]
struct Counters {
    registrations: AtomicU64,
    heartbeats: AtomicU64,
    removals: AtomicU64,
    evictions: AtomicU64,
    events_published: AtomicU64,
    events_dropped: AtomicU64,
}

/// Point-in-time copy of the tracker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStats {
    pub registrations: u64,
    pub heartbeats: u64,
    pub removals: u64,
    pub evictions: u64,
    pub events_published: u64,
    pub events_dropped: u64,
}

/// Everything guarded by the tracker lock
#[derive(Debug, Default)]
struct TrackerState {
    topology: Topology,
    eviction: EvictionQueue,
}

impl TrackerState {
    fn find(&self, location: &Location) -> Option<&AgentInformation> {
        self.topology
            .get_data_center(&location.data_center)?
            .get_rack(&location.rack)?
            .get_agent(&location.address)
    }

    /// Current sums of the rack, data center and cluster holding `location`
    fn level_sums(&self, location: &Location) -> [(&'static str, Capacity); 3] {
        let dc = self.topology.get_data_center(&location.data_center);
        let rack = dc.and_then(|dc| dc.get_rack(&location.rack));
        [
            ("rack", rack.map(Rack::capacity).unwrap_or_default()),
            ("data center", dc.map(DataCenter::capacity).unwrap_or_default()),
            ("cluster", self.topology.capacity()),
        ]
    }

    /// Insert or refresh an agent and push the resulting delta up the tree
    ///
    /// Every sum is checked before anything is written, so a rejected report
    /// leaves the tree exactly as it was.
    fn apply_update(
        &mut self,
        mut agent: AgentInformation,
        now: Instant,
    ) -> Result<UpdateOutcome, ResourceError> {
        agent.resource.ensure_non_negative("resource")?;
        agent.allocated.ensure_non_negative("allocated")?;
        agent.last_heartbeat = now;
        let location = agent.location.clone();

        let overflow = |level| ResourceError::Overflow {
            location: location.to_string(),
            level,
        };
        let previous = self.find(&location).map(Capacity::of);
        let delta = Capacity::of(&agent)
            .checked_sub(previous.unwrap_or_default())
            .ok_or_else(|| overflow("agent"))?;
        for (level, sum) in self.level_sums(&location) {
            sum.checked_add(delta).ok_or_else(|| overflow(level))?;
        }

        let dc = self.topology.data_center_entry(&location.data_center);
        let rack = dc.rack_entry(&location.rack);
        match rack.get_agent_mut(&location.address) {
            Some(existing) => {
                existing.last_heartbeat = now;
                existing.resource = agent.resource;
                existing.allocated = agent.allocated;
            }
            None => {
                rack.add_agent(agent);
            }
        }
        rack.apply(delta);
        dc.apply(delta);
        self.topology.apply(delta);

        self.eviction.enqueue(location, now);

        Ok(UpdateOutcome {
            registered: previous.is_none(),
            resource_changed: !delta.resource.is_zero(),
            allocated_changed: !delta.allocated.is_zero(),
        })
    }

    /// Remove an agent and subtract its contribution from all three levels
    fn remove_agent(&mut self, location: &Location) -> Option<AgentInformation> {
        let dc = self.topology.get_data_center_mut(&location.data_center)?;
        let rack = dc.get_rack_mut(&location.rack)?;
        let removed = rack.drop_agent(&location.address)?;

        // Every sum includes the removed agent, so none of these can underflow
        let delta = -Capacity::of(&removed);
        rack.apply(delta);
        dc.apply(delta);
        self.topology.apply(delta);

        Some(removed)
    }
}

/// Cluster leader's live resource inventory
pub struct LeaderResourceTracker {
    state: RwLock<TrackerState>,
    config: TrackerConfig,
    events_tx: mpsc::Sender<ResourceUpdateEvent>,
    subscribers: broadcast::Sender<ResourceUpdateEvent>,
    reaper_wake: Notify,
    counters: Counters,
    metrics: LeaderMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl std::fmt::Debug for LeaderResourceTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeaderResourceTracker")
            .field("config", &self.config)
            .field("subscribers", &self.subscribers.receiver_count())
            .finish()
    }
}

impl LeaderResourceTracker {
    /// Create a tracker without starting its background tasks
    ///
    /// The returned receiver is the consuming end of the resource update
    /// channel; it must be drained (see [`LeaderResourceTracker::spawn`]) or
    /// publishers in [`EventOverflow::Block`] mode will wait on it.
    pub fn new(
        config: TrackerConfig,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ResourceUpdateEvent>), TrackerConfigError> {
        Self::with_health(config, None)
    }

    fn with_health(
        config: TrackerConfig,
        health: Option<HealthRegistry>,
    ) -> Result<(Arc<Self>, mpsc::Receiver<ResourceUpdateEvent>), TrackerConfigError> {
        config.validate()?;

        let (events_tx, events_rx) = mpsc::channel(config.event_channel_capacity);
        let (subscribers, _) = broadcast::channel(config.subscriber_capacity);
        let logger = StructuredLogger::new(&config.leader_name);

        let tracker = Arc::new(Self {
            state: RwLock::new(TrackerState::default()),
            config,
            events_tx,
            subscribers,
            reaper_wake: Notify::new(),
            counters: Counters::default(),
            metrics: LeaderMetrics::new(),
            logger,
            health,
        });

        Ok((tracker, events_rx))
    }

    /// Create a tracker and start the eviction reaper and event consumer
    pub fn spawn(config: TrackerConfig) -> Result<TrackerHandle, TrackerConfigError> {
        TrackerHandle::start(config, None)
    }

    /// Like [`LeaderResourceTracker::spawn`], reporting task health to `registry`
    pub fn spawn_with_health(
        config: TrackerConfig,
        registry: HealthRegistry,
    ) -> Result<TrackerHandle, TrackerConfigError> {
        TrackerHandle::start(config, Some(registry))
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Record a heartbeat or resource report for an agent
    ///
    /// Fails without touching the topology if a figure is negative or would
    /// overflow one of the cached sums.
    pub async fn update_agent_information(
        &self,
        agent: AgentInformation,
    ) -> Result<UpdateOutcome, ResourceError> {
        let started = Instant::now();
        let location = agent.location.clone();
        let resource = agent.resource;

        let (outcome, queue_depth, agents) = {
            let mut state = self.state.write().await;
            let outcome = state.apply_update(agent, Instant::now()).map_err(|e| {
                warn!(location = %location, error = %e, "Rejected agent report");
                e
            })?;
            (outcome, state.eviction.len(), state.topology.agent_count())
        };
        self.reaper_wake.notify_one();

        self.counters.heartbeats.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_heartbeats();
        self.metrics.set_eviction_queue_depth(queue_depth as i64);
        if outcome.registered {
            self.counters.registrations.fetch_add(1, Ordering::Relaxed);
            self.metrics.set_agents(agents as i64);
            self.logger.log_agent_registered(&location, resource);
        }

        if outcome.resource_changed || outcome.allocated_changed {
            self.refresh_capacity_gauges(&location).await;
        }
        if outcome.resource_changed {
            self.publish(ResourceUpdateEvent::for_location(&location))
                .await;
        }

        self.metrics
            .observe_update_latency(started.elapsed().as_secs_f64());
        Ok(outcome)
    }

    /// Remove an agent and reverse its contribution to every aggregate
    ///
    /// Returns `None` if the agent (or its rack or data center) is unknown.
    pub async fn delete_agent_information(&self, location: &Location) -> Option<AgentInformation> {
        let (removed, agents) = {
            let mut state = self.state.write().await;
            let removed = state.remove_agent(location)?;
            (removed, state.topology.agent_count())
        };

        self.metrics.set_agents(agents as i64);
        self.counters.removals.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_removals();
        self.logger.log_agent_removed(location);
        self.after_removal(&removed).await;
        Some(removed)
    }

    /// Current record for a location, if the agent is registered
    pub async fn find_agent_information(&self, location: &Location) -> Option<AgentInformation> {
        self.state.read().await.find(location).cloned()
    }

    /// Shared read access to the live topology
    ///
    /// Holding the guard blocks all mutation, keep it short.
    pub async fn topology(&self) -> RwLockReadGuard<'_, Topology> {
        RwLockReadGuard::map(self.state.read().await, |state| &state.topology)
    }

    /// Owned copy of the whole tree
    pub async fn snapshot(&self) -> TopologySnapshot {
        TopologySnapshot::capture(&self.state.read().await.topology)
    }

    pub async fn agent_count(&self) -> usize {
        self.state.read().await.topology.agent_count()
    }

    /// Number of queue entries, stale ones included
    pub async fn eviction_queue_len(&self) -> usize {
        self.state.read().await.eviction.len()
    }

    /// Receive every resource update event processed by the consumer
    pub fn subscribe(&self) -> broadcast::Receiver<ResourceUpdateEvent> {
        self.subscribers.subscribe()
    }

    pub fn stats(&self) -> TrackerStats {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        TrackerStats {
            registrations: load(&self.counters.registrations),
            heartbeats: load(&self.counters.heartbeats),
            removals: load(&self.counters.removals),
            evictions: load(&self.counters.evictions),
            events_published: load(&self.counters.events_published),
            events_dropped: load(&self.counters.events_dropped),
        }
    }

    async fn next_eviction_candidate(&self) -> Option<EvictionEntry> {
        let mut state = self.state.write().await;
        let entry = state.eviction.dequeue();
        self.metrics
            .set_eviction_queue_depth(state.eviction.len() as i64);
        entry
    }

    async fn current_heartbeat(&self, location: &Location) -> Option<Instant> {
        self.state
            .read()
            .await
            .find(location)
            .map(|agent| agent.last_heartbeat)
    }

    /// Remove the agent if its heartbeat is still expired
    ///
    /// The expiry check and the removal share one critical section, so a
    /// heartbeat can never land between them.
    async fn evict_if_expired(&self, location: &Location) -> Option<AgentInformation> {
        let timeout = self.config.eviction_timeout;
        let (removed, agents) = {
            let mut state = self.state.write().await;
            let heartbeat = state.find(location)?.last_heartbeat;
            // A deadline past the end of the clock never expires
            let deadline = heartbeat.checked_add(timeout)?;
            if deadline > Instant::now() {
                return None;
            }
            let removed = state.remove_agent(location)?;
            (removed, state.topology.agent_count())
        };

        self.metrics.set_agents(agents as i64);
        self.counters.evictions.fetch_add(1, Ordering::Relaxed);
        self.metrics.inc_evictions();
        self.logger
            .log_agent_evicted(location, removed.last_heartbeat.elapsed());
        self.after_removal(&removed).await;
        Some(removed)
    }

    /// Set the rack and cluster capacity gauges from the current sums
    async fn refresh_capacity_gauges(&self, location: &Location) {
        let topology = self.topology().await;
        let rack = topology
            .rack(&location.data_center, &location.rack)
            .map(Rack::capacity)
            .unwrap_or_default();
        self.metrics.set_rack_capacity(
            &location.data_center,
            &location.rack,
            rack.resource,
            rack.allocated,
        );
        self.metrics
            .set_cluster_capacity(topology.resource(), topology.allocated());
    }

    async fn after_removal(&self, removed: &AgentInformation) {
        if !Capacity::of(removed).is_zero() {
            self.refresh_capacity_gauges(&removed.location).await;
        }
        if !removed.resource.is_zero() {
            self.publish(ResourceUpdateEvent::for_location(&removed.location))
                .await;
        }
    }

    async fn publish(&self, event: ResourceUpdateEvent) {
        let delivered = match self.config.event_overflow {
            EventOverflow::Block => match self.events_tx.send(event).await {
                Ok(()) => true,
                Err(e) => {
                    debug!(rack = %e.0.rack, "Event consumer stopped, discarding resource update");
                    false
                }
            },
            EventOverflow::Drop => match self.events_tx.try_send(event) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(event)) => {
                    self.counters.events_dropped.fetch_add(1, Ordering::Relaxed);
                    self.metrics.inc_dropped_events();
                    self.logger.log_event_dropped(&event);
                    false
                }
                Err(mpsc::error::TrySendError::Closed(event)) => {
                    debug!(rack = %event.rack, "Event consumer stopped, discarding resource update");
                    false
                }
            },
        };

        if delivered {
            self.counters
                .events_published
                .fetch_add(1, Ordering::Relaxed);
            self.metrics.inc_resource_update_events();
        }
    }

    async fn mark_component(&self, name: &str, running: bool) {
        if let Some(health) = &self.health {
            if running {
                health.set_healthy(name).await;
            } else {
                health.set_unhealthy(name, "stopped").await;
            }
        }
    }
}

/// Owner of a running tracker and its two background tasks
///
/// Dropping the handle signals both tasks to stop without waiting for them.
#[derive(Debug)]
pub struct TrackerHandle {
    tracker: Arc<LeaderResourceTracker>,
    shutdown_tx: broadcast::Sender<()>,
    reaper: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl TrackerHandle {
    fn start(
        config: TrackerConfig,
        health: Option<HealthRegistry>,
    ) -> Result<Self, TrackerConfigError> {
        let (tracker, events_rx) = LeaderResourceTracker::with_health(config, health)?;
        let (shutdown_tx, _) = broadcast::channel(1);

        let reaper = tokio::spawn(reaper::run(tracker.clone(), shutdown_tx.subscribe()));
        let consumer = tokio::spawn(events::run(
            tracker.clone(),
            events_rx,
            shutdown_tx.subscribe(),
        ));

        info!(
            timeout_secs = tracker.config.eviction_timeout.as_secs_f64(),
            overflow = ?tracker.config.event_overflow,
            "Leader resource tracker started"
        );

        Ok(Self {
            tracker,
            shutdown_tx,
            reaper,
            consumer,
        })
    }

    pub fn tracker(&self) -> &Arc<LeaderResourceTracker> {
        &self.tracker
    }

    /// True while both background tasks are alive
    pub fn is_running(&self) -> bool {
        !self.reaper.is_finished() && !self.consumer.is_finished()
    }

    /// Stop both background tasks and wait for them to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(());
        if let Err(e) = (&mut self.reaper).await {
            debug!(error = %e, "Eviction reaper ended abnormally");
        }
        if let Err(e) = (&mut self.consumer).await {
            debug!(error = %e, "Event consumer ended abnormally");
        }
        self.tracker.mark_component(components::TRACKER, false).await;
        info!("Leader resource tracker stopped");
    }
}

impl Drop for TrackerHandle {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(());
    }
}
