//! Owned, serializable copy of the topology

use super::{DataCenter, Rack, Topology};
use crate::models::{AgentInformation, Location, ResourceVector};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentView {
    pub location: Location,
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
    /// Milliseconds since the last heartbeat, measured when the snapshot was taken
    pub heartbeat_age_ms: u64,
}

impl AgentView {
    pub fn from_agent(agent: &AgentInformation, now: Instant) -> Self {
        Self {
            location: agent.location.clone(),
            resource: agent.resource,
            allocated: agent.allocated,
            heartbeat_age_ms: now.saturating_duration_since(agent.last_heartbeat).as_millis()
                as u64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RackView {
    pub name: String,
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
    pub agents: Vec<AgentView>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataCenterView {
    pub name: String,
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
    pub racks: Vec<RackView>,
}

/// Whole-tree copy, ordered by name at every level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
    pub agent_count: usize,
    pub data_centers: Vec<DataCenterView>,
}

impl TopologySnapshot {
    pub fn capture(topology: &Topology) -> Self {
        let now = Instant::now();
        let mut data_centers: Vec<DataCenterView> = topology
            .data_centers()
            .map(|dc| data_center_view(dc, now))
            .collect();
        data_centers.sort_by(|a, b| a.name.cmp(&b.name));

        Self {
            resource: topology.resource(),
            allocated: topology.allocated(),
            agent_count: topology.agent_count(),
            data_centers,
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentView> {
        self.data_centers
            .iter()
            .flat_map(|dc| dc.racks.iter())
            .flat_map(|rack| rack.agents.iter())
    }
}

fn data_center_view(dc: &DataCenter, now: Instant) -> DataCenterView {
    let mut racks: Vec<RackView> = dc.racks().map(|rack| rack_view(rack, now)).collect();
    racks.sort_by(|a, b| a.name.cmp(&b.name));

    DataCenterView {
        name: dc.name().to_string(),
        resource: dc.resource(),
        allocated: dc.allocated(),
        racks,
    }
}

fn rack_view(rack: &Rack, now: Instant) -> RackView {
    let mut agents: Vec<AgentView> = rack
        .agents()
        .map(|agent| AgentView::from_agent(agent, now))
        .collect();
    agents.sort_by(|a, b| a.location.address.cmp(&b.location.address));

    RackView {
        name: rack.name().to_string(),
        resource: rack.resource(),
        allocated: rack.allocated(),
        agents,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_is_sorted_and_complete() {
        let mut topology = Topology::new();
        for (dc, rack, address) in [
            ("d2", "r1", "http://c"),
            ("d1", "r2", "http://b"),
            ("d1", "r1", "http://a"),
            ("d1", "r1", "http://0"),
        ] {
            topology
                .data_center_entry(dc)
                .rack_entry(rack)
                .add_agent(AgentInformation::new(
                    Location::new(dc, rack, address),
                    ResourceVector::new(1, 512),
                    ResourceVector::ZERO,
                ));
        }

        let snapshot = TopologySnapshot::capture(&topology);
        assert_eq!(snapshot.agent_count, 4);

        let names: Vec<&str> = snapshot.data_centers.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["d1", "d2"]);

        let addresses: Vec<&str> = snapshot
            .agents()
            .map(|a| a.location.address.as_str())
            .collect();
        assert_eq!(addresses, vec!["http://0", "http://a", "http://b", "http://c"]);

        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: TopologySnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.data_centers[0].racks.len(), 2);
    }
}
