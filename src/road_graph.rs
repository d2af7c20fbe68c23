use geo::{Distance, Haversine, Point};
use itertools::Itertools;
use log::{debug, info};
use ordered_float::OrderedFloat;
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::prelude::DiGraphMap;
use rayon::prelude::*;
use rstar::RTree;
use rstar::primitives::{GeomWithData, Line};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::time::Instant;

use crate::error::{Result, RouteError};

pub type NodeId = u64;

/// Directed edge identity in the road multigraph.
///
/// `parallel` disambiguates several edges joining the same ordered node pair.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct EdgeKey {
    pub from: NodeId,
    pub to: NodeId,
    pub parallel: u32,
}

impl EdgeKey {
    pub fn new(from: NodeId, to: NodeId, parallel: u32) -> Self {
        Self { from, to, parallel }
    }

    /// True when `node` is either endpoint of this edge.
    pub fn touches(&self, node: NodeId) -> bool {
        self.from == node || self.to == node
    }

    /// Same node pair with the parallel index forced to 0.
    pub fn canonical(&self) -> Self {
        Self::new(self.from, self.to, 0)
    }
}

/// Way attribute as delivered by the graph provider: either a single value or
/// the values of several OSM ways merged into one multigraph edge.
#[derive(Debug, Clone, PartialEq)]
pub enum WayField<T> {
    Scalar(T),
    Merged(Vec<T>),
}

impl<T> WayField<T> {
    /// The value downstream consumers see; merged lists collapse to their head.
    pub fn first(&self) -> Option<&T> {
        match self {
            WayField::Scalar(value) => Some(value),
            WayField::Merged(values) => values.first(),
        }
    }

    pub fn values(&self) -> &[T] {
        match self {
            WayField::Scalar(value) => std::slice::from_ref(value),
            WayField::Merged(values) => values,
        }
    }
}

// JSON snapshots carry a bare scalar or a list, binary snapshots need the tag.
#[derive(Serialize)]
#[serde(untagged)]
enum LooseRef<'a, T> {
    Scalar(&'a T),
    Merged(&'a [T]),
}

#[derive(Serialize)]
enum TaggedRef<'a, T> {
    Scalar(&'a T),
    Merged(&'a [T]),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Loose<T> {
    Scalar(T),
    Merged(Vec<T>),
}

#[derive(Deserialize)]
enum Tagged<T> {
    Scalar(T),
    Merged(Vec<T>),
}

impl<T: Serialize> Serialize for WayField<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            match self {
                WayField::Scalar(v) => LooseRef::Scalar(v).serialize(serializer),
                WayField::Merged(v) => LooseRef::Merged(v.as_slice()).serialize(serializer),
            }
        } else {
            match self {
                WayField::Scalar(v) => TaggedRef::Scalar(v).serialize(serializer),
                WayField::Merged(v) => TaggedRef::Merged(v.as_slice()).serialize(serializer),
            }
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for WayField<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            Ok(match Loose::deserialize(deserializer)? {
                Loose::Scalar(v) => WayField::Scalar(v),
                Loose::Merged(v) => WayField::Merged(v),
            })
        } else {
            Ok(match Tagged::deserialize(deserializer)? {
                Tagged::Scalar(v) => WayField::Scalar(v),
                Tagged::Merged(v) => WayField::Merged(v),
            })
        }
    }
}

/// Way record attached to a multigraph edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaySource {
    pub id: WayField<u64>,
    pub name: Option<WayField<String>>,
    #[serde(alias = "highway")]
    pub road_class: Option<WayField<String>>,
    /// Meters
    pub length: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodePosition {
    pub lat: f64,
    pub lon: f64,
}

impl NodePosition {
    pub fn point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    pub fn distance_to(&self, other: &NodePosition) -> f64 {
        Haversine.distance(self.point(), other.point())
    }
}

/// The narrow interface the route pipeline consumes the road network through.
pub trait RoadNetwork {
    /// Nearest edge to a position; `None` only for an edgeless network.
    fn nearest_edge(&self, lat: f64, lon: f64) -> Option<EdgeKey>;

    /// Inbound edges of `node` followed by its outbound edges.
    fn edges_incident(&self, node: NodeId) -> Vec<EdgeKey>;

    /// Fewest-hops node path from `start` to `end` using only `edges`.
    fn shortest_path(&self, edges: &[EdgeKey], start: NodeId, end: NodeId)
    -> Option<Vec<NodeId>>;

    fn edge_attributes(&self, edge: &EdgeKey) -> Option<&WaySource>;

    fn node_position(&self, node: NodeId) -> Option<NodePosition>;
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: NodeId,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub key: u32,
    pub way: WaySource,
    /// Intermediate shape as `[lon, lat]` pairs, endpoints included
    #[serde(default)]
    pub geometry: Option<Vec<[f64; 2]>>,
}

/// Serialisable road network as produced by the external graph builder.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<SnapshotNode>,
    pub edges: Vec<SnapshotEdge>,
}

type EdgeGeometry = GeomWithData<Line<[f64; 2]>, EdgeKey>;

/// Read-only road multigraph with a spatial index over its edge geometry.
pub struct RoadGraph {
    graph: DiGraph<NodeId, EdgeKey>,
    node_index: HashMap<NodeId, NodeIndex>,
    positions: HashMap<NodeId, NodePosition>,
    ways: HashMap<EdgeKey, WaySource>,
    edge_index: RTree<EdgeGeometry>,
}

impl Debug for RoadGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "RoadGraph with Nodes: {}, Edges: {}",
            self.node_count(),
            self.edge_count()
        )
    }
}

impl RoadGraph {
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Result<Self> {
        let start_time = Instant::now();

        let mut graph = DiGraph::with_capacity(snapshot.nodes.len(), snapshot.edges.len());
        let mut node_index = HashMap::with_capacity(snapshot.nodes.len());
        let mut positions = HashMap::with_capacity(snapshot.nodes.len());

        for node in &snapshot.nodes {
            if !node.lat.is_finite() || !node.lon.is_finite() {
                return Err(RouteError::Graph(format!(
                    "Node {} has a non-finite position",
                    node.id
                )));
            }
            if node_index.insert(node.id, graph.add_node(node.id)).is_some() {
                return Err(RouteError::Graph(format!("Duplicate node {}", node.id)));
            }
            positions.insert(
                node.id,
                NodePosition {
                    lat: node.lat,
                    lon: node.lon,
                },
            );
        }

        let mut ways = HashMap::with_capacity(snapshot.edges.len());
        for edge in &snapshot.edges {
            let key = EdgeKey::new(edge.from, edge.to, edge.key);
            let (Some(&source), Some(&target)) =
                (node_index.get(&edge.from), node_index.get(&edge.to))
            else {
                return Err(RouteError::Graph(format!(
                    "Edge {:?} references an unknown node",
                    key
                )));
            };
            if ways.insert(key, edge.way.clone()).is_some() {
                return Err(RouteError::Graph(format!("Duplicate edge {:?}", key)));
            }
            graph.add_edge(source, target, key);
        }

        debug!("Graph assembly took: {:?}", start_time.elapsed());
        let index_start = Instant::now();

        let geometries: Vec<EdgeGeometry> = snapshot
            .edges
            .par_iter()
            .flat_map_iter(|edge| {
                let key = EdgeKey::new(edge.from, edge.to, edge.key);
                let shape = match &edge.geometry {
                    Some(shape) if shape.len() >= 2 => shape.clone(),
                    _ => {
                        let a = positions[&edge.from];
                        let b = positions[&edge.to];
                        vec![[a.lon, a.lat], [b.lon, b.lat]]
                    }
                };
                shape
                    .windows(2)
                    .map(|pair| GeomWithData::new(Line::new(pair[0], pair[1]), key))
                    .collect::<Vec<_>>()
            })
            .collect();

        let edge_index = RTree::bulk_load(geometries);
        debug!("RTree bulk load took: {:?}", index_start.elapsed());

        info!(
            "Road graph ready: {} nodes, {} edges in {}ms",
            graph.node_count(),
            graph.edge_count(),
            start_time.elapsed().as_millis()
        );

        Ok(Self {
            graph,
            node_index,
            positions,
            ways,
            edge_index,
        })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    fn directed_edges(&self, node: NodeId, direction: Direction) -> Vec<EdgeKey> {
        match self.node_index.get(&node) {
            Some(&ix) => self
                .graph
                .edges_directed(ix, direction)
                .map(|edge| *edge.weight())
                .sorted()
                .collect(),
            None => Vec::new(),
        }
    }
}

impl RoadNetwork for RoadGraph {
    fn nearest_edge(&self, lat: f64, lon: f64) -> Option<EdgeKey> {
        let mut candidates = self
            .edge_index
            .nearest_neighbor_iter_with_distance_2(&[lon, lat]);
        let (nearest, best) = candidates.next()?;

        // Opposing directions share geometry, so exact ties are common.
        candidates
            .take_while(|(_, distance)| *distance <= best)
            .chain(std::iter::once((nearest, best)))
            .min_by_key(|(geometry, distance)| (OrderedFloat(*distance), geometry.data))
            .map(|(geometry, _)| geometry.data)
    }

    fn edges_incident(&self, node: NodeId) -> Vec<EdgeKey> {
        let mut edges = self.directed_edges(node, Direction::Incoming);
        edges.extend(self.directed_edges(node, Direction::Outgoing));
        edges
    }

    fn shortest_path(
        &self,
        edges: &[EdgeKey],
        start: NodeId,
        end: NodeId,
    ) -> Option<Vec<NodeId>> {
        let mut subgraph: DiGraphMap<NodeId, ()> = DiGraphMap::new();
        for edge in edges.iter().filter(|edge| self.ways.contains_key(edge)) {
            subgraph.add_edge(edge.from, edge.to, ());
        }

        if !subgraph.contains_node(start) || !subgraph.contains_node(end) {
            return None;
        }

        petgraph::algo::astar(&subgraph, start, |node| node == end, |_| 1u32, |_| 0u32)
            .map(|(_, path)| path)
    }

    fn edge_attributes(&self, edge: &EdgeKey) -> Option<&WaySource> {
        self.ways.get(edge)
    }

    fn node_position(&self, node: NodeId) -> Option<NodePosition> {
        self.positions.get(&node).copied()
    }
}
