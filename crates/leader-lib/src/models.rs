//! Core data models for the leader inventory

use crate::error::{LocationError, ReportError, ResourceError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use tokio::time::Instant;

/// Multi-dimensional compute capacity
///
/// Dimensions are signed so the same type carries both absolute values and
/// the deltas propagated through the topology.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceVector {
    #[serde(default)]
    pub cpu_count: i64,
    #[serde(default)]
    pub memory_mb: i64,
}

impl ResourceVector {
    pub const ZERO: ResourceVector = ResourceVector {
        cpu_count: 0,
        memory_mb: 0,
    };

    pub fn new(cpu_count: i64, memory_mb: i64) -> Self {
        Self {
            cpu_count,
            memory_mb,
        }
    }

    /// Returns true if every dimension is exactly zero
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    pub fn checked_add(self, rhs: ResourceVector) -> Option<ResourceVector> {
        Some(ResourceVector {
            cpu_count: self.cpu_count.checked_add(rhs.cpu_count)?,
            memory_mb: self.memory_mb.checked_add(rhs.memory_mb)?,
        })
    }

    pub fn checked_sub(self, rhs: ResourceVector) -> Option<ResourceVector> {
        Some(ResourceVector {
            cpu_count: self.cpu_count.checked_sub(rhs.cpu_count)?,
            memory_mb: self.memory_mb.checked_sub(rhs.memory_mb)?,
        })
    }

    /// Reject reported figures below zero; `field` names the vector in the error
    pub fn ensure_non_negative(&self, field: &'static str) -> Result<(), ResourceError> {
        for (dimension, value) in [("cpu_count", self.cpu_count), ("memory_mb", self.memory_mb)] {
            if value < 0 {
                return Err(ResourceError::Negative {
                    field,
                    dimension,
                    value,
                });
            }
        }
        Ok(())
    }
}

impl Add for ResourceVector {
    type Output = ResourceVector;

    fn add(self, rhs: ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_count: self.cpu_count + rhs.cpu_count,
            memory_mb: self.memory_mb + rhs.memory_mb,
        }
    }
}

impl Sub for ResourceVector {
    type Output = ResourceVector;

    fn sub(self, rhs: ResourceVector) -> ResourceVector {
        ResourceVector {
            cpu_count: self.cpu_count - rhs.cpu_count,
            memory_mb: self.memory_mb - rhs.memory_mb,
        }
    }
}

impl Neg for ResourceVector {
    type Output = ResourceVector;

    fn neg(self) -> ResourceVector {
        ResourceVector::ZERO - self
    }
}

impl AddAssign for ResourceVector {
    fn add_assign(&mut self, rhs: ResourceVector) {
        *self = *self + rhs;
    }
}

impl SubAssign for ResourceVector {
    fn sub_assign(&mut self, rhs: ResourceVector) {
        *self = *self - rhs;
    }
}

impl fmt::Display for ResourceVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cpu={} memory_mb={}", self.cpu_count, self.memory_mb)
    }
}

/// Where an agent lives in the fleet
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub data_center: String,
    pub rack: String,
    /// Endpoint URL of the agent, unique within its rack
    pub address: String,
}

impl Location {
    pub fn new(
        data_center: impl Into<String>,
        rack: impl Into<String>,
        address: impl Into<String>,
    ) -> Self {
        Self {
            data_center: data_center.into(),
            rack: rack.into(),
            address: address.into(),
        }
    }

    /// Reject locations with blank components
    pub fn validate(&self) -> Result<(), LocationError> {
        if self.data_center.trim().is_empty() {
            return Err(LocationError::MissingDataCenter);
        }
        if self.rack.trim().is_empty() {
            return Err(LocationError::MissingRack {
                data_center: self.data_center.clone(),
            });
        }
        if self.address.trim().is_empty() {
            return Err(LocationError::MissingAddress {
                data_center: self.data_center.clone(),
                rack: self.rack.clone(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.data_center, self.rack, self.address)
    }
}

/// Most recently reported state of one worker agent
#[derive(Debug, Clone, PartialEq)]
pub struct AgentInformation {
    pub location: Location,
    pub last_heartbeat: Instant,
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
}

impl AgentInformation {
    pub fn new(location: Location, resource: ResourceVector, allocated: ResourceVector) -> Self {
        Self {
            location,
            last_heartbeat: Instant::now(),
            resource,
            allocated,
        }
    }
}

/// Heartbeat payload as received from the transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentReport {
    pub location: Location,
    pub resource: ResourceVector,
    #[serde(default)]
    pub allocated: ResourceVector,
}

impl AgentReport {
    /// Reject reports with a blank location or negative figures
    pub fn validate(&self) -> Result<(), ReportError> {
        self.location.validate()?;
        self.resource.ensure_non_negative("resource")?;
        self.allocated.ensure_non_negative("allocated")?;
        Ok(())
    }
}

impl From<AgentReport> for AgentInformation {
    fn from(report: AgentReport) -> Self {
        AgentInformation::new(report.location, report.resource, report.allocated)
    }
}

/// Notification that a rack's registered capacity changed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceUpdateEvent {
    pub data_center: String,
    pub rack: String,
}

impl ResourceUpdateEvent {
    pub fn for_location(location: &Location) -> Self {
        Self {
            data_center: location.data_center.clone(),
            rack: location.rack.clone(),
        }
    }
}
