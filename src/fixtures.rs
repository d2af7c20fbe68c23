//! Hand-built road network shared by the unit tests.
//!
//! ```text
//!                 6
//!                 |
//!   1 --- 2 === 3 --- 4 --- 5          10 --- 11 (disconnected)
//! ```
//!
//! Every street is two-way except the parallel `2 -> 3` (key 1). Node `i` of
//! the corridor sits at lat 50.0, lon `4.000 + 0.001 * (i - 1)`.

use crate::models::Coordinate;
use crate::road_graph::{
    GraphSnapshot, RoadGraph, SnapshotEdge, SnapshotNode, WayField, WaySource,
};
use crate::io::parse_timestamp;

fn node(id: u64, lat: f64, lon: f64) -> SnapshotNode {
    SnapshotNode { id, lat, lon }
}

fn way(id: WayField<u64>, name: WayField<String>, class: WayField<String>, length: Option<f64>) -> WaySource {
    WaySource {
        id,
        name: Some(name),
        road_class: Some(class),
        length,
    }
}

fn scalar(value: &str) -> WayField<String> {
    WayField::Scalar(value.to_string())
}

fn merged(values: &[&str]) -> WayField<String> {
    WayField::Merged(values.iter().map(|v| v.to_string()).collect())
}

fn two_way(a: u64, b: u64, source: WaySource) -> [SnapshotEdge; 2] {
    [
        SnapshotEdge {
            from: a,
            to: b,
            key: 0,
            way: source.clone(),
            geometry: None,
        },
        SnapshotEdge {
            from: b,
            to: a,
            key: 0,
            way: source,
            geometry: None,
        },
    ]
}

pub(crate) fn corridor_snapshot() -> GraphSnapshot {
    let nodes = vec![
        node(1, 50.0, 4.000),
        node(2, 50.0, 4.001),
        node(3, 50.0, 4.002),
        node(4, 50.0, 4.003),
        node(5, 50.0, 4.004),
        node(6, 50.001, 4.002),
        node(10, 51.0, 5.000),
        node(11, 51.0, 5.001),
    ];

    let mut edges = Vec::new();
    edges.extend(two_way(
        1,
        2,
        way(WayField::Scalar(100), scalar("Main St"), scalar("residential"), Some(71.5)),
    ));
    edges.extend(two_way(
        2,
        3,
        way(WayField::Scalar(101), scalar("Main St"), scalar("residential"), Some(71.5)),
    ));
    edges.push(SnapshotEdge {
        from: 2,
        to: 3,
        key: 1,
        way: way(WayField::Scalar(102), scalar("Bus Lane"), scalar("service"), Some(71.5)),
        geometry: Some(vec![[4.001, 50.0], [4.0015, 50.00002], [4.002, 50.0]]),
    });
    edges.extend(two_way(
        3,
        4,
        way(
            WayField::Merged(vec![103, 104]),
            merged(&["Main St", "Elm St"]),
            merged(&["primary", "secondary"]),
            Some(71.5),
        ),
    ));
    edges.extend(two_way(
        4,
        5,
        way(WayField::Scalar(105), scalar("Main St"), scalar("residential"), None),
    ));
    edges.extend(two_way(
        3,
        6,
        way(WayField::Scalar(106), scalar("Side St"), scalar("tertiary"), Some(111.2)),
    ));
    edges.extend(two_way(
        10,
        11,
        way(WayField::Scalar(110), scalar("Far Rd"), scalar("unclassified"), Some(71.5)),
    ));

    GraphSnapshot { nodes, edges }
}

pub(crate) fn corridor_graph() -> RoadGraph {
    RoadGraph::from_snapshot(corridor_snapshot()).expect("fixture graph is consistent")
}

/// Coordinates at `(lat, lon, "HH:MM:SS")` on 2023-06-01, UTC.
pub(crate) fn trace(points: &[(f64, f64, &str)]) -> Vec<Coordinate> {
    points
        .iter()
        .map(|(lat, lon, time)| Coordinate {
            latitude: *lat,
            longitude: *lon,
            timestamp: parse_timestamp(&format!("2023-06-01T{time}.0000000Z"))
                .expect("fixture timestamp"),
        })
        .collect()
}
