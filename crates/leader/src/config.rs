//! Leader configuration

use anyhow::{Context, Result};
use leader_lib::{EventOverflow, TrackerConfig};
use serde::Deserialize;
use std::time::Duration;

/// Leader configuration
///
/// Read from an optional `leader.{toml,yaml,json}` file, then overridden by
/// `LEADER_*` environment variables (e.g. `LEADER_EVICTION_TIMEOUT_SECS=30`).
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderConfig {
    /// Name of this leader in structured logs
    #[serde(default = "default_leader_name")]
    pub leader_name: String,

    /// Port for the report, query, health and metrics API
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Seconds without a heartbeat before an agent is evicted
    #[serde(default = "default_eviction_timeout")]
    pub eviction_timeout_secs: u64,

    /// Capacity of the resource update channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// `block` or `drop` when the resource update channel is full
    #[serde(default)]
    pub event_overflow: EventOverflow,

    /// Backlog per event subscriber
    #[serde(default = "default_subscriber_capacity")]
    pub subscriber_capacity: usize,
}

fn default_leader_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "leader".to_string())
}

fn default_api_port() -> u16 {
    8930
}

fn default_eviction_timeout() -> u64 {
    leader_lib::DEFAULT_EVICTION_TIMEOUT.as_secs()
}

fn default_event_channel_capacity() -> usize {
    1
}

fn default_subscriber_capacity() -> usize {
    64
}

impl LeaderConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name("leader").required(false))
            .add_source(config::Environment::with_prefix("LEADER").try_parsing(true));

        Self::from_builder(builder)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        builder
            .build()
            .context("Failed to read leader configuration")?
            .try_deserialize()
            .context("Invalid leader configuration")
    }

    pub fn tracker_config(&self) -> TrackerConfig {
        TrackerConfig {
            eviction_timeout: Duration::from_secs(self.eviction_timeout_secs),
            event_channel_capacity: self.event_channel_capacity,
            event_overflow: self.event_overflow,
            subscriber_capacity: self.subscriber_capacity,
            leader_name: self.leader_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_tracker_defaults() {
        let config = LeaderConfig::from_builder(config::Config::builder()).unwrap();

        assert_eq!(config.api_port, 8930);
        assert_eq!(config.eviction_timeout_secs, 15);

        let tracker = config.tracker_config();
        let defaults = TrackerConfig::default();
        assert_eq!(tracker.eviction_timeout, defaults.eviction_timeout);
        assert_eq!(tracker.event_channel_capacity, defaults.event_channel_capacity);
        assert_eq!(tracker.event_overflow, EventOverflow::Block);
    }

    #[test]
    fn test_overrides_are_applied() {
        let builder = config::Config::builder()
            .set_override("eviction_timeout_secs", 30)
            .unwrap()
            .set_override("event_overflow", "drop")
            .unwrap()
            .set_override("api_port", 9000)
            .unwrap();
        let config = LeaderConfig::from_builder(builder).unwrap();

        assert_eq!(config.api_port, 9000);
        let tracker = config.tracker_config();
        assert_eq!(tracker.eviction_timeout, Duration::from_secs(30));
        assert_eq!(tracker.event_overflow, EventOverflow::Drop);
    }

    #[test]
    fn test_unknown_overflow_policy_is_rejected() {
        let builder = config::Config::builder()
            .set_override("event_overflow", "buffer")
            .unwrap();
        assert!(LeaderConfig::from_builder(builder).is_err());
    }

    #[test]
    fn test_oversized_eviction_timeout_fails_validation() {
        let builder = config::Config::builder()
            .set_override("eviction_timeout_secs", 365 * 24 * 60 * 60)
            .unwrap();
        let config = LeaderConfig::from_builder(builder).unwrap();

        assert_eq!(
            config.tracker_config().validate(),
            Err(leader_lib::TrackerConfigError::EvictionTimeoutTooLarge {
                max_secs: leader_lib::MAX_EVICTION_TIMEOUT.as_secs(),
            })
        );
    }
}
