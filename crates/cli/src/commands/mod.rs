//! CLI command implementations

pub mod agents;
pub mod health;
pub mod topology;
