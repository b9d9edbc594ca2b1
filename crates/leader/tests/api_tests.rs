//! Wire-format tests for the payloads the leader API exchanges with agents
//! and with fleetctl

use leader_lib::{
    AgentReport, LeaderResourceTracker, Location, ResourceVector, TopologySnapshot,
    TrackerConfig, UpdateOutcome,
};

#[test]
fn test_report_without_allocation_defaults_to_zero() {
    let report: AgentReport = serde_json::from_str(
        r#"{
            "location": {"data_center": "east", "rack": "r7", "address": "10.0.0.4:7000"},
            "resource": {"cpu_count": 16, "memory_mb": 65536}
        }"#,
    )
    .unwrap();

    assert_eq!(report.location, Location::new("east", "r7", "10.0.0.4:7000"));
    assert_eq!(report.resource, ResourceVector::new(16, 65536));
    assert!(report.allocated.is_zero());
}

#[test]
fn test_report_with_partial_resource_fills_missing_dimensions() {
    let report: AgentReport = serde_json::from_str(
        r#"{
            "location": {"data_center": "east", "rack": "r7", "address": "a"},
            "resource": {"cpu_count": 2},
            "allocated": {"memory_mb": 128}
        }"#,
    )
    .unwrap();

    assert_eq!(report.resource, ResourceVector::new(2, 0));
    assert_eq!(report.allocated, ResourceVector::new(0, 128));
}

#[test]
fn test_update_outcome_field_names() {
    let outcome = UpdateOutcome {
        registered: true,
        resource_changed: true,
        allocated_changed: false,
    };
    let json = serde_json::to_value(outcome).unwrap();

    assert_eq!(json["registered"], true);
    assert_eq!(json["resource_changed"], true);
    assert_eq!(json["allocated_changed"], false);
}

#[tokio::test]
async fn test_snapshot_json_round_trips_for_clients() {
    let handle = LeaderResourceTracker::spawn(TrackerConfig::default()).unwrap();
    let tracker = handle.tracker().clone();

    for (rack, address, cpu) in [("r2", "b", 8), ("r1", "a", 4), ("r1", "c", 2)] {
        let report = AgentReport {
            location: Location::new("west", rack, address),
            resource: ResourceVector::new(cpu, cpu * 1024),
            allocated: ResourceVector::new(1, 0),
        };
        tracker.update_agent_information(report.into()).await.unwrap();
    }

    let snapshot = tracker.snapshot().await;
    let json = serde_json::to_string(&snapshot).unwrap();
    let decoded: TopologySnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(decoded, snapshot);
    assert_eq!(decoded.agent_count, 3);
    assert_eq!(decoded.resource, ResourceVector::new(14, 14 * 1024));
    assert_eq!(decoded.allocated, ResourceVector::new(3, 0));

    let racks: Vec<_> = decoded.data_centers[0]
        .racks
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(racks, vec!["r1", "r2"]);

    handle.shutdown().await;
}
