use log::{debug, info};

use crate::error::{Result, RouteError};
use crate::models::{Node, Route, Segment, WayAttributes};
use crate::road_graph::{NodeId, RoadNetwork, WayField, WaySource};
use crate::route_matcher::EdgeTableRow;
use crate::time_windows::IndexedWindows;

/// Number of trailing path nodes that never start a segment. The legacy router
/// stopped two nodes short, dropping the final edge; downstream billing was
/// reconciled against that output, so it stays until re-validated.
const TRAILING_NODES_WITHOUT_SEGMENT: usize = 2;

fn collapse_text(field: &Option<WayField<String>>) -> String {
    field
        .as_ref()
        .and_then(|field| field.first())
        .cloned()
        .unwrap_or_default()
}

/// Public, scalar view of a provider way record.
fn way_attributes(
    source: &WaySource,
    fallback_length: impl FnOnce() -> f64,
) -> Result<WayAttributes> {
    let id = *source
        .id
        .first()
        .ok_or_else(|| RouteError::Graph("Way record without an id".to_string()))?;

    Ok(WayAttributes {
        id,
        name: collapse_text(&source.name),
        road_class: collapse_text(&source.road_class),
        length_meters: source.length.unwrap_or_else(fallback_length),
        price: None,
        road_classes: source
            .road_class
            .as_ref()
            .map(|classes| classes.values().to_vec())
            .unwrap_or_default(),
    })
}

fn route_node<N: RoadNetwork>(
    network: &N,
    id: NodeId,
    time: chrono::DateTime<chrono::Utc>,
) -> Result<Node> {
    let position = network
        .node_position(id)
        .ok_or_else(|| RouteError::Graph(format!("Node {} has no position", id)))?;
    Ok(Node {
        id,
        latitude: position.lat,
        longitude: position.lon,
        time,
    })
}

/// Walks the assembled path and emits one segment per node pair.
///
/// Pair `i` takes its way from table row `i` and its times from window `i`:
/// the start node carries the window start, the end node the window end and
/// the segment the window midpoint.
pub fn build_route<N: RoadNetwork>(
    network: &N,
    nodes: &[NodeId],
    table: &[EdgeTableRow],
    windows: &IndexedWindows,
) -> Result<Route> {
    let mut route = Route::new();
    let segment_count = nodes.len().saturating_sub(TRAILING_NODES_WITHOUT_SEGMENT);

    for (index, pair) in nodes.windows(2).take(segment_count).enumerate() {
        let (from, to) = (pair[0], pair[1]);

        let row = table.get(index).ok_or_else(|| {
            RouteError::Graph(format!("No edge table row for path position {}", index))
        })?;
        let window = windows.get(&index).ok_or_else(|| RouteError::UnfillableGap {
            highest_index: table.len().saturating_sub(1),
            resolved: windows.keys().copied().collect(),
        })?;
        let source = network
            .edge_attributes(&row.edge)
            .ok_or_else(|| RouteError::Graph(format!("Edge {:?} has no way record", row.edge)))?;

        let start = route_node(network, from, window.start)?;
        let end = route_node(network, to, window.end)?;
        let way = way_attributes(source, || {
            network
                .node_position(from)
                .zip(network.node_position(to))
                .map(|(a, b)| a.distance_to(&b))
                .unwrap_or_default()
        })?;

        debug!(
            "Segment {}: {} -> {} on way {} ({})",
            index, from, to, way.id, way.name
        );

        route.add_segment(Segment {
            start,
            way,
            end,
            time: window.midpoint(),
            price: 0.0,
        });
    }

    info!(
        "Built route {} with {} segments from {} path nodes",
        route.id,
        route.segments.len(),
        nodes.len()
    );
    Ok(route)
}
