use itertools::Itertools;
use log::{debug, trace};
use std::time::Instant;

use crate::error::{Result, RouteError};
use crate::models::Coordinate;
use crate::road_graph::{EdgeKey, RoadNetwork};

/// Snaps every raw fix to its nearest edge, one edge per coordinate.
///
/// No deduplication happens here: the same edge may repeat, consecutively or
/// not, and the output is aligned index-for-index with `coordinates`.
pub fn match_coordinates<N: RoadNetwork>(
    network: &N,
    coordinates: &[Coordinate],
) -> Result<Vec<EdgeKey>> {
    let start_time = Instant::now();

    let matched = coordinates
        .iter()
        .enumerate()
        .map(|(i, coordinate)| {
            if !coordinate.latitude.is_finite() || !coordinate.longitude.is_finite() {
                return Err(RouteError::InvalidInput(format!(
                    "Coordinate {} is not finite ({}, {})",
                    i, coordinate.latitude, coordinate.longitude
                )));
            }

            let edge = network
                .nearest_edge(coordinate.latitude, coordinate.longitude)
                .ok_or_else(|| {
                    RouteError::InvalidInput(format!(
                        "No road edge available for coordinate {}",
                        i
                    ))
                })?;
            trace!("Point {}: matched {:?}", i, edge);
            Ok(edge)
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Matched {} points to edges in {:?}",
        matched.len(),
        start_time.elapsed()
    );
    Ok(matched)
}

/// First-occurrence-ordered distinct edges.
pub fn distinct_edges(edges: &[EdgeKey]) -> Vec<EdgeKey> {
    edges.iter().copied().unique().collect()
}

/// Adds local connectivity around the matched edges.
///
/// For every matched edge the inbound and outbound edges of its `from` node,
/// then of its `to` node, are collected, normalised to parallel index 0 and
/// deduplicated in first-occurrence order.
pub fn bridge<N: RoadNetwork>(network: &N, matched: &[EdgeKey]) -> Vec<EdgeKey> {
    let bridged: Vec<EdgeKey> = matched
        .iter()
        .flat_map(|edge| [edge.from, edge.to])
        .flat_map(|node| network.edges_incident(node))
        .map(|edge| edge.canonical())
        .unique()
        .collect();

    debug!(
        "Bridged {} matched edges with {} incident edges",
        matched.len(),
        bridged.len()
    );
    bridged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{corridor_graph, trace};

    #[test]
    fn matching_keeps_order_and_multiplicity() {
        let graph = corridor_graph();
        let coordinates = trace(&[
            (50.0, 4.0005, "13:00:00"),
            (50.0, 4.0015, "13:00:10"),
            (50.0, 4.0006, "13:00:20"),
            (50.0, 4.0007, "13:00:30"),
        ]);

        let matched = match_coordinates(&graph, &coordinates).unwrap();
        assert_eq!(
            matched,
            vec![
                EdgeKey::new(1, 2, 0),
                EdgeKey::new(2, 3, 0),
                EdgeKey::new(1, 2, 0),
                EdgeKey::new(1, 2, 0),
            ]
        );
        assert_eq!(
            distinct_edges(&matched),
            vec![EdgeKey::new(1, 2, 0), EdgeKey::new(2, 3, 0)]
        );
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let graph = corridor_graph();
        let mut coordinates = trace(&[(50.0, 4.0005, "13:00:00"), (50.0, 4.0015, "13:00:10")]);
        coordinates[1].longitude = f64::INFINITY;

        let err = match_coordinates(&graph, &coordinates).unwrap_err();
        assert_eq!(err.kind(), "InvalidInput");
    }

    #[test]
    fn bridge_is_duplicate_free_and_first_occurrence_ordered() {
        let graph = corridor_graph();
        let matched = [
            EdgeKey::new(1, 2, 0),
            EdgeKey::new(2, 3, 0),
            EdgeKey::new(4, 5, 0),
        ];

        let bridged = bridge(&graph, &matched);
        let expected: Vec<EdgeKey> = [
            (2, 1),
            (1, 2),
            (3, 2),
            (2, 3),
            (4, 3),
            (6, 3),
            (3, 4),
            (3, 6),
            (5, 4),
            (4, 5),
        ]
        .into_iter()
        .map(|(from, to)| EdgeKey::new(from, to, 0))
        .collect();

        assert_eq!(bridged, expected);
        assert!(bridged.iter().all_unique());
    }

    #[test]
    fn bridge_forces_parallel_index_zero() {
        let graph = corridor_graph();
        let bridged = bridge(&graph, &[EdgeKey::new(2, 3, 1)]);
        assert!(bridged.iter().all(|edge| edge.parallel == 0));
        assert!(!bridged.contains(&EdgeKey::new(2, 3, 1)));
    }
}
