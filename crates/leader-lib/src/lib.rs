//! Live resource inventory for a fleet leader
//!
//! This crate provides:
//! - The agent → rack → data center → cluster topology with cached capacity sums
//! - The leader resource tracker that serializes all inventory mutation
//! - Heartbeat-based eviction of silent agents
//! - Resource update events for downstream subscribers
//! - Health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod topology;
pub mod tracker;

pub use error::{LocationError, ReportError, ResourceError, TrackerConfigError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{LeaderMetrics, StructuredLogger};
pub use topology::{Capacity, DataCenter, Rack, Topology, TopologySnapshot};
pub use tracker::{
    EventOverflow, LeaderResourceTracker, TrackerConfig, TrackerHandle, TrackerStats,
    UpdateOutcome, DEFAULT_EVICTION_TIMEOUT, MAX_EVICTION_TIMEOUT,
};
