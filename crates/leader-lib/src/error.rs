//! Error types for the leader inventory
//!
//! Absence in the topology is never an error; lookups return `None`. The only
//! failures surfaced are malformed inputs, and reports whose figures would
//! overflow a cached sum.

use thiserror::Error;

/// A reported location that cannot be placed in the topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    #[error("location is missing a data center")]
    MissingDataCenter,

    #[error("location in data center {data_center:?} is missing a rack")]
    MissingRack { data_center: String },

    #[error("location {data_center}/{rack} is missing an agent address")]
    MissingAddress { data_center: String, rack: String },
}

/// Resource figures that cannot be applied to the topology
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("{field} {dimension} must not be negative, got {value}")]
    Negative {
        field: &'static str,
        dimension: &'static str,
        value: i64,
    },

    #[error("report for {location} would overflow the {level} sum")]
    Overflow {
        location: String,
        level: &'static str,
    },
}

/// A report rejected at the transport boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReportError {
    #[error(transparent)]
    Location(#[from] LocationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Tracker settings that would make the background machinery unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackerConfigError {
    #[error("eviction timeout must be greater than zero")]
    ZeroEvictionTimeout,

    #[error("eviction timeout must be at most {max_secs} seconds")]
    EvictionTimeoutTooLarge { max_secs: u64 },

    #[error("event channel capacity must be at least 1")]
    ZeroEventCapacity,

    #[error("subscriber capacity must be at least 1")]
    ZeroSubscriberCapacity,
}
