//! Observability infrastructure for the leader
//!
//! Provides:
//! - Prometheus metrics (membership, heartbeat traffic, evictions, capacity per rack)
//! - Structured JSON logging of membership events with tracing

use crate::models::{Location, ResourceUpdateEvent, ResourceVector};
use prometheus::{
    register_gauge_vec, register_histogram, register_int_counter, register_int_gauge, GaugeVec,
    Histogram, IntCounter, IntGauge,
};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{info, warn};

/// Histogram buckets for the update critical section (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5,
];

const CPU: &str = "cpu_count";
const MEMORY: &str = "memory_mb";

static GLOBAL_METRICS: OnceLock<LeaderMetricsInner> = OnceLock::new();

struct LeaderMetricsInner {
    agents: IntGauge,
    heartbeats: IntCounter,
    evictions: IntCounter,
    removals: IntCounter,
    resource_update_events: IntCounter,
    dropped_events: IntCounter,
    eviction_queue_depth: IntGauge,
    update_latency_seconds: Histogram,
    rack_resource: GaugeVec,
    rack_allocated: GaugeVec,
    cluster_resource: GaugeVec,
    cluster_allocated: GaugeVec,
}

impl LeaderMetricsInner {
    fn new() -> Self {
        Self {
            agents: register_int_gauge!(
                "fleet_leader_agents",
                "Number of agents currently registered"
            )
            .expect("Failed to register agents"),

            heartbeats: register_int_counter!(
                "fleet_leader_heartbeats_total",
                "Agent heartbeat reports processed"
            )
            .expect("Failed to register heartbeats_total"),

            evictions: register_int_counter!(
                "fleet_leader_evictions_total",
                "Agents evicted after missing their heartbeat deadline"
            )
            .expect("Failed to register evictions_total"),

            removals: register_int_counter!(
                "fleet_leader_removals_total",
                "Agents removed by explicit request"
            )
            .expect("Failed to register removals_total"),

            resource_update_events: register_int_counter!(
                "fleet_leader_resource_update_events_total",
                "Resource update events accepted by the event channel"
            )
            .expect("Failed to register resource_update_events_total"),

            dropped_events: register_int_counter!(
                "fleet_leader_resource_update_events_dropped_total",
                "Resource update events discarded because the channel was full"
            )
            .expect("Failed to register resource_update_events_dropped_total"),

            eviction_queue_depth: register_int_gauge!(
                "fleet_leader_eviction_queue_depth",
                "Entries in the eviction queue, stale entries included"
            )
            .expect("Failed to register eviction_queue_depth"),

            update_latency_seconds: register_histogram!(
                "fleet_leader_update_latency_seconds",
                "Time spent applying one agent report",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register update_latency_seconds"),

            rack_resource: register_gauge_vec!(
                "fleet_leader_rack_resource",
                "Registered capacity per rack",
                &["data_center", "rack", "dimension"]
            )
            .expect("Failed to register rack_resource"),

            rack_allocated: register_gauge_vec!(
                "fleet_leader_rack_allocated",
                "Allocated capacity per rack",
                &["data_center", "rack", "dimension"]
            )
            .expect("Failed to register rack_allocated"),

            cluster_resource: register_gauge_vec!(
                "fleet_leader_cluster_resource",
                "Registered capacity across the cluster",
                &["dimension"]
            )
            .expect("Failed to register cluster_resource"),

            cluster_allocated: register_gauge_vec!(
                "fleet_leader_cluster_allocated",
                "Allocated capacity across the cluster",
                &["dimension"]
            )
            .expect("Failed to register cluster_allocated"),
        }
    }
}

/// Handle to the process-wide leader metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct LeaderMetrics {
    _private: (),
}

impl Default for LeaderMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LeaderMetrics {
    /// Create a handle, registering the collectors on first use
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(LeaderMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &LeaderMetricsInner {
        GLOBAL_METRICS.get_or_init(LeaderMetricsInner::new)
    }

    pub fn set_agents(&self, count: i64) {
        self.inner().agents.set(count);
    }

    pub fn inc_heartbeats(&self) {
        self.inner().heartbeats.inc();
    }

    pub fn inc_evictions(&self) {
        self.inner().evictions.inc();
    }

    pub fn inc_removals(&self) {
        self.inner().removals.inc();
    }

    pub fn inc_resource_update_events(&self) {
        self.inner().resource_update_events.inc();
    }

    pub fn inc_dropped_events(&self) {
        self.inner().dropped_events.inc();
    }

    pub fn set_eviction_queue_depth(&self, depth: i64) {
        self.inner().eviction_queue_depth.set(depth);
    }

    pub fn observe_update_latency(&self, duration_secs: f64) {
        self.inner().update_latency_seconds.observe(duration_secs);
    }

    pub fn set_rack_capacity(
        &self,
        data_center: &str,
        rack: &str,
        resource: ResourceVector,
        allocated: ResourceVector,
    ) {
        let inner = self.inner();
        for (gauge, value) in [(&inner.rack_resource, resource), (&inner.rack_allocated, allocated)]
        {
            gauge
                .with_label_values(&[data_center, rack, CPU])
                .set(value.cpu_count as f64);
            gauge
                .with_label_values(&[data_center, rack, MEMORY])
                .set(value.memory_mb as f64);
        }
    }

    pub fn set_cluster_capacity(&self, resource: ResourceVector, allocated: ResourceVector) {
        let inner = self.inner();
        for (gauge, value) in [
            (&inner.cluster_resource, resource),
            (&inner.cluster_allocated, allocated),
        ] {
            gauge.with_label_values(&[CPU]).set(value.cpu_count as f64);
            gauge.with_label_values(&[MEMORY]).set(value.memory_mb as f64);
        }
    }
}

/// Structured logger for membership events
#[derive(Clone)]
pub struct StructuredLogger {
    leader_name: String,
}

impl StructuredLogger {
    pub fn new(leader_name: impl Into<String>) -> Self {
        Self {
            leader_name: leader_name.into(),
        }
    }

    pub fn log_agent_registered(&self, location: &Location, resource: ResourceVector) {
        info!(
            event = "agent_registered",
            leader = %self.leader_name,
            data_center = %location.data_center,
            rack = %location.rack,
            address = %location.address,
            cpu_count = resource.cpu_count,
            memory_mb = resource.memory_mb,
            "Agent registered"
        );
    }

    pub fn log_agent_removed(&self, location: &Location) {
        info!(
            event = "agent_removed",
            leader = %self.leader_name,
            data_center = %location.data_center,
            rack = %location.rack,
            address = %location.address,
            "Agent removed on request"
        );
    }

    pub fn log_agent_evicted(&self, location: &Location, silent_for: Duration) {
        warn!(
            event = "agent_evicted",
            leader = %self.leader_name,
            data_center = %location.data_center,
            rack = %location.rack,
            address = %location.address,
            silent_secs = silent_for.as_secs_f64(),
            "Agent evicted after missed heartbeats"
        );
    }

    pub fn log_event_dropped(&self, event: &ResourceUpdateEvent) {
        warn!(
            event = "resource_update_dropped",
            leader = %self.leader_name,
            data_center = %event.data_center,
            rack = %event.rack,
            "Event channel full, resource update dropped"
        );
    }

    pub fn log_startup(&self, version: &str, eviction_timeout: Duration) {
        info!(
            event = "leader_started",
            leader = %self.leader_name,
            version = %version,
            eviction_timeout_secs = eviction_timeout.as_secs_f64(),
            "Fleet leader started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "leader_shutdown",
            leader = %self.leader_name,
            reason = %reason,
            "Fleet leader shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leader_metrics_are_shared_across_handles() {
        let metrics = LeaderMetrics::new();
        let other = metrics.clone();

        other.inc_heartbeats();
        other.observe_update_latency(0.0001);
        metrics.set_rack_capacity(
            "metrics-test-dc",
            "metrics-test-rack",
            ResourceVector::new(4, 1024),
            ResourceVector::new(1, 256),
        );

        let inner = metrics.inner();
        assert_eq!(
            inner
                .rack_resource
                .with_label_values(&["metrics-test-dc", "metrics-test-rack", CPU])
                .get(),
            4.0
        );
        assert!(inner.heartbeats.get() >= 1);
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("leader-0");
        assert_eq!(logger.leader_name, "leader-0");
    }
}
