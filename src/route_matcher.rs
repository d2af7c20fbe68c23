use itertools::Itertools;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Instant;

use crate::error::{Result, RouteError};
use crate::mapmatcher::distinct_edges;
use crate::road_graph::{EdgeKey, NodeId, RoadNetwork};

/// One row of the traversal-ordered edge table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeTableRow {
    pub edge: EdgeKey,
    /// Position of the edge's `from` node in the assembled path
    pub order: usize,
}

/// Picks the endpoint of `boundary` that also belongs to `neighbour`, falling
/// back to `boundary.to`.
fn resolve_endpoint(boundary: &EdgeKey, neighbour: &EdgeKey) -> NodeId {
    if neighbour.touches(boundary.from) {
        boundary.from
    } else {
        boundary.to
    }
}

/// Start and end nodes of the path for a deduplicated edge sequence.
pub fn path_endpoints(distinct: &[EdgeKey]) -> Result<(NodeId, NodeId)> {
    let n = distinct.len();
    if n < 2 {
        return Err(RouteError::InsufficientMatches(n));
    }
    let start = resolve_endpoint(&distinct[0], &distinct[1]);
    let end = resolve_endpoint(&distinct[n - 1], &distinct[n - 2]);
    Ok((start, end))
}

/// Reconstructs the travelled node sequence.
///
/// `matched` may contain repeats; it is deduplicated in first-occurrence
/// order before the endpoints are resolved. The solver runs over the matched
/// edges plus `bridged` and minimises hop count, not distance.
pub fn assemble<N: RoadNetwork>(
    network: &N,
    matched: &[EdgeKey],
    bridged: &[EdgeKey],
) -> Result<Vec<NodeId>> {
    let start_time = Instant::now();

    let distinct = distinct_edges(matched);
    let (start, end) = path_endpoints(&distinct)?;
    debug!(
        "Resolved path endpoints {} -> {} from {} distinct edges",
        start,
        end,
        distinct.len()
    );

    let working: Vec<EdgeKey> = distinct
        .iter()
        .chain(bridged.iter())
        .copied()
        .unique()
        .collect();

    let Some(path) = network.shortest_path(&working, start, end) else {
        warn!(
            "No path between {} and {} over {} working edges",
            start,
            end,
            working.len()
        );
        return Err(RouteError::NoPath { start, end });
    };

    info!(
        "Assembled path of {} nodes in {:?}",
        path.len(),
        start_time.elapsed()
    );
    Ok(path)
}

/// Orders the edges of the subgraph induced by `nodes` along the path.
///
/// Row `r` belongs to path position `i` when its `from` node is `nodes[i]` and
/// its `to` node is another path node other than `nodes[i - 1]`. Parallel
/// edges and chords between path nodes therefore produce extra rows.
pub fn edge_table<N: RoadNetwork>(network: &N, nodes: &[NodeId]) -> Vec<EdgeTableRow> {
    let on_path: HashSet<NodeId> = nodes.iter().copied().collect();

    let table: Vec<EdgeTableRow> = nodes
        .iter()
        .enumerate()
        .flat_map(|(order, &node)| {
            let previous = order.checked_sub(1).map(|i| nodes[i]);
            network
                .edges_incident(node)
                .into_iter()
                .filter(move |edge| edge.from == node)
                .unique()
                .filter(|edge| on_path.contains(&edge.to) && Some(edge.to) != previous)
                .map(move |edge| EdgeTableRow { edge, order })
                .collect::<Vec<_>>()
        })
        .collect();

    debug!("Edge table has {} rows for {} nodes", table.len(), nodes.len());
    table
}
