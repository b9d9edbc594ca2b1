//! Heartbeat-ordered eviction queue
//!
//! Every heartbeat pushes a fresh entry instead of moving the agent's old one,
//! so one agent can own many entries at once. Only the newest reflects its
//! current heartbeat; the rest are stale and get discarded when popped after
//! being checked against the topology.

use crate::models::Location;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tokio::time::Instant;

/// Queue entry pointing at an agent by location
///
/// `heartbeat` is the agent's heartbeat at enqueue time. Heartbeats only move
/// forward, so the key never runs ahead of the agent's current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvictionEntry {
    pub heartbeat: Instant,
    pub location: Location,
    sequence: u64,
}

impl Ord for EvictionEntry {
    // Reversed so the max-heap yields the earliest heartbeat, FIFO on ties
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .heartbeat
            .cmp(&self.heartbeat)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for EvictionEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-priority queue over heartbeat instants
#[derive(Debug, Default)]
pub struct EvictionQueue {
    heap: BinaryHeap<EvictionEntry>,
    next_sequence: u64,
}

impl EvictionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, location: Location, heartbeat: Instant) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.heap.push(EvictionEntry {
            heartbeat,
            location,
            sequence,
        });
    }

    /// Remove and return the entry with the earliest heartbeat
    pub fn dequeue(&mut self) -> Option<EvictionEntry> {
        self.heap.pop()
    }

    pub fn peek(&self) -> Option<&EvictionEntry> {
        self.heap.peek()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn loc(address: &str) -> Location {
        Location::new("d1", "r1", address)
    }

    #[test]
    fn test_dequeues_earliest_heartbeat_first() {
        let base = Instant::now();
        let mut queue = EvictionQueue::new();

        queue.enqueue(loc("http://late"), base + Duration::from_secs(3));
        queue.enqueue(loc("http://early"), base);
        queue.enqueue(loc("http://middle"), base + Duration::from_secs(1));

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek().unwrap().location.address, "http://early");

        let order: Vec<String> = std::iter::from_fn(|| queue.dequeue())
            .map(|e| e.location.address)
            .collect();
        assert_eq!(order, vec!["http://early", "http://middle", "http://late"]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_equal_heartbeats_are_fifo() {
        let now = Instant::now();
        let mut queue = EvictionQueue::new();
        queue.enqueue(loc("http://first"), now);
        queue.enqueue(loc("http://second"), now);

        assert_eq!(queue.dequeue().unwrap().location.address, "http://first");
        assert_eq!(queue.dequeue().unwrap().location.address, "http://second");
    }

    #[test]
    fn test_tolerates_duplicate_entries() {
        let base = Instant::now();
        let mut queue = EvictionQueue::new();
        for secs in 0..5 {
            queue.enqueue(loc("http://a"), base + Duration::from_secs(secs));
        }

        assert_eq!(queue.len(), 5);
        let newest = std::iter::from_fn(|| queue.dequeue()).last().unwrap();
        assert_eq!(newest.heartbeat, base + Duration::from_secs(4));
    }
}
