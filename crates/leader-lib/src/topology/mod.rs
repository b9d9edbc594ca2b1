//! Hierarchical inventory of the fleet
//!
//! Three container levels (data center, rack, agent) each keep a map of their
//! children and a cached [`Capacity`] sum. The tree only stores and indexes;
//! the sums are moved exclusively by the tracker through the crate-private
//! `apply` helpers, after it has checked the result with
//! [`Capacity::checked_add`]. The tree holds no locks of its own: it
//! always lives behind the tracker's lock, and shared borrows of it are
//! consistent by construction.

mod snapshot;

pub use snapshot::{AgentView, DataCenterView, RackView, TopologySnapshot};

use crate::models::{AgentInformation, ResourceVector};
use std::collections::HashMap;
use std::ops::Neg;

/// Summed capacity and allocation of one level of the tree
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    pub resource: ResourceVector,
    pub allocated: ResourceVector,
}

impl Capacity {
    pub fn new(resource: ResourceVector, allocated: ResourceVector) -> Self {
        Self {
            resource,
            allocated,
        }
    }

    /// What a single agent contributes to every level above it
    pub fn of(agent: &AgentInformation) -> Self {
        Self::new(agent.resource, agent.allocated)
    }

    pub fn is_zero(&self) -> bool {
        self.resource.is_zero() && self.allocated.is_zero()
    }

    /// `self + delta`, or `None` if any dimension overflows
    pub fn checked_add(self, delta: Capacity) -> Option<Capacity> {
        Some(Capacity {
            resource: self.resource.checked_add(delta.resource)?,
            allocated: self.allocated.checked_add(delta.allocated)?,
        })
    }

    /// `self - other`, or `None` if any dimension overflows
    pub fn checked_sub(self, other: Capacity) -> Option<Capacity> {
        Some(Capacity {
            resource: self.resource.checked_sub(other.resource)?,
            allocated: self.allocated.checked_sub(other.allocated)?,
        })
    }

    /// Add a delta the caller has already checked with [`Capacity::checked_add`]
    fn apply(&mut self, delta: Capacity) {
        self.resource += delta.resource;
        self.allocated += delta.allocated;
    }
}

impl Neg for Capacity {
    type Output = Capacity;

    fn neg(self) -> Capacity {
        Capacity::new(-self.resource, -self.allocated)
    }
}

/// A rack and the agents registered in it, keyed by address
#[derive(Debug, Clone, Default)]
pub struct Rack {
    name: String,
    agents: HashMap<String, AgentInformation>,
    capacity: Capacity,
}

impl Rack {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_agent(&self, address: &str) -> Option<&AgentInformation> {
        self.agents.get(address)
    }

    pub(crate) fn get_agent_mut(&mut self, address: &str) -> Option<&mut AgentInformation> {
        self.agents.get_mut(address)
    }

    /// Insert an agent keyed by its address, returning any entry it replaced
    pub fn add_agent(&mut self, agent: AgentInformation) -> Option<AgentInformation> {
        self.agents.insert(agent.location.address.clone(), agent)
    }

    pub fn drop_agent(&mut self, address: &str) -> Option<AgentInformation> {
        self.agents.remove(address)
    }

    pub fn agents(&self) -> impl Iterator<Item = &AgentInformation> {
        self.agents.values()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Summed capacity of all agents in this rack
    pub fn resource(&self) -> ResourceVector {
        self.capacity.resource
    }

    /// Summed allocation of all agents in this rack
    pub fn allocated(&self) -> ResourceVector {
        self.capacity.allocated
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn apply(&mut self, delta: Capacity) {
        self.capacity.apply(delta);
    }
}

/// A data center and its racks, keyed by rack name
#[derive(Debug, Clone, Default)]
pub struct DataCenter {
    name: String,
    racks: HashMap<String, Rack>,
    capacity: Capacity,
}

impl DataCenter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get_rack(&self, name: &str) -> Option<&Rack> {
        self.racks.get(name)
    }

    pub(crate) fn get_rack_mut(&mut self, name: &str) -> Option<&mut Rack> {
        self.racks.get_mut(name)
    }

    /// Return the named rack, creating an empty one on first use
    pub(crate) fn rack_entry(&mut self, name: &str) -> &mut Rack {
        self.racks
            .entry(name.to_string())
            .or_insert_with(|| Rack::new(name))
    }

    pub fn add_rack(&mut self, rack: Rack) {
        self.racks.insert(rack.name.clone(), rack);
    }

    pub fn racks(&self) -> impl Iterator<Item = &Rack> {
        self.racks.values()
    }

    pub fn rack_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.racks.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn agent_count(&self) -> usize {
        self.racks.values().map(Rack::len).sum()
    }

    pub fn resource(&self) -> ResourceVector {
        self.capacity.resource
    }

    pub fn allocated(&self) -> ResourceVector {
        self.capacity.allocated
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn apply(&mut self, delta: Capacity) {
        self.capacity.apply(delta);
    }
}

/// Root of the inventory with cluster-wide sums
#[derive(Debug, Clone, Default)]
pub struct Topology {
    data_centers: HashMap<String, DataCenter>,
    capacity: Capacity,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_data_center(&self, name: &str) -> Option<&DataCenter> {
        self.data_centers.get(name)
    }

    pub(crate) fn get_data_center_mut(&mut self, name: &str) -> Option<&mut DataCenter> {
        self.data_centers.get_mut(name)
    }

    /// Return the named data center, creating an empty one on first use
    pub(crate) fn data_center_entry(&mut self, name: &str) -> &mut DataCenter {
        self.data_centers
            .entry(name.to_string())
            .or_insert_with(|| DataCenter::new(name))
    }

    pub fn add_data_center(&mut self, dc: DataCenter) {
        self.data_centers.insert(dc.name.clone(), dc);
    }

    pub fn data_centers(&self) -> impl Iterator<Item = &DataCenter> {
        self.data_centers.values()
    }

    pub fn data_center_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.data_centers.keys().cloned().collect();
        names.sort();
        names
    }

    /// True if no data center has been registered yet
    pub fn is_empty(&self) -> bool {
        self.data_centers.is_empty()
    }

    pub fn agent_count(&self) -> usize {
        self.data_centers.values().map(DataCenter::agent_count).sum()
    }

    pub fn rack(&self, data_center: &str, rack: &str) -> Option<&Rack> {
        self.get_data_center(data_center)?.get_rack(rack)
    }

    pub fn resource(&self) -> ResourceVector {
        self.capacity.resource
    }

    pub fn allocated(&self) -> ResourceVector {
        self.capacity.allocated
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub(crate) fn apply(&mut self, delta: Capacity) {
        self.capacity.apply(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Location;

    fn agent(dc: &str, rack: &str, address: &str, cpu: i64) -> AgentInformation {
        AgentInformation::new(
            Location::new(dc, rack, address),
            ResourceVector::new(cpu, 0),
            ResourceVector::ZERO,
        )
    }

    #[test]
    fn test_lazy_container_creation() {
        let mut topology = Topology::new();
        assert!(topology.is_empty());

        topology.data_center_entry("d1").rack_entry("r1");
        topology.data_center_entry("d1").rack_entry("r2");

        assert_eq!(topology.data_center_names(), vec!["d1"]);
        let dc = topology.get_data_center("d1").unwrap();
        assert_eq!(dc.rack_names(), vec!["r1", "r2"]);
        assert!(topology.rack("d1", "r1").unwrap().is_empty());
        assert!(topology.rack("d2", "r1").is_none());
    }

    #[test]
    fn test_rack_agents_keyed_by_address() {
        let mut rack = Rack::new("r1");
        assert!(rack.add_agent(agent("d1", "r1", "http://a", 4)).is_none());

        let replaced = rack.add_agent(agent("d1", "r1", "http://a", 6));
        assert_eq!(replaced.unwrap().resource.cpu_count, 4);
        assert_eq!(rack.len(), 1);

        assert!(rack.drop_agent("http://a").is_some());
        assert!(rack.drop_agent("http://a").is_none());
        assert!(rack.get_agent("http://a").is_none());
    }

    #[test]
    fn test_tree_does_not_aggregate_on_insert() {
        let mut topology = Topology::new();
        topology
            .data_center_entry("d1")
            .rack_entry("r1")
            .add_agent(agent("d1", "r1", "http://a", 4));

        assert_eq!(topology.agent_count(), 1);
        assert!(topology.resource().is_zero());
        assert!(topology.rack("d1", "r1").unwrap().resource().is_zero());
    }

    #[test]
    fn test_add_containers_directly() {
        let mut dc = DataCenter::new("d9");
        dc.add_rack(Rack::new("r9"));

        let mut topology = Topology::new();
        topology.add_data_center(dc);

        assert!(topology.rack("d9", "r9").is_some());
        assert_eq!(topology.get_data_center("d9").unwrap().name(), "d9");
    }

    #[test]
    fn test_capacity_checked_math() {
        let near_max = Capacity::new(ResourceVector::new(i64::MAX - 1, 0), ResourceVector::ZERO);
        let one = Capacity::new(ResourceVector::new(1, 0), ResourceVector::ZERO);

        let full = near_max.checked_add(one).unwrap();
        assert_eq!(full.resource.cpu_count, i64::MAX);
        assert_eq!(full.checked_add(one), None);
        assert_eq!(full.checked_sub(one), Some(near_max));
        assert_eq!(-one, Capacity::new(ResourceVector::new(-1, 0), ResourceVector::ZERO));
        assert!(Capacity::default().is_zero());
    }

    #[test]
    fn test_apply_updates_each_level_independently() {
        let mut rack = Rack::new("r1");
        rack.add_agent(agent("d1", "r1", "http://a", 4));
        let delta = Capacity::of(rack.get_agent("http://a").unwrap());

        rack.apply(delta);
        assert_eq!(rack.capacity(), delta);
        rack.apply(-delta);
        assert!(rack.capacity().is_zero());
        assert_eq!(rack.len(), 1);
    }
}
