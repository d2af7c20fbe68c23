use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::road_graph::NodeId;

/// One raw GPS fix, in the order it was received.
#[derive(Debug, Clone, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
    pub timestamp: DateTime<Utc>,
}

/// Observation window attributed to one traversed edge.
///
/// Windows derived from the raw trace hold `(last seen, first seen)`, so
/// `start` may be later than `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// `start + (end - start) / 2`
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + (self.end - self.start) / 2
    }
}

/// Wire names follow the data service's `RouteDTO` contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WayAttributes {
    #[serde(rename = "osmid")]
    pub id: u64,
    pub name: String,
    #[serde(rename = "highway")]
    pub road_class: String,
    #[serde(rename = "length")]
    pub length_meters: f64,
    pub price: Option<f64>,
    /// Every class of a merged way, head first; used for pricing only
    #[serde(skip)]
    pub road_classes: Vec<String>,
}

impl WayAttributes {
    /// Classes to price the way by; a single-class way prices by `road_class`.
    pub fn pricing_classes(&self) -> &[String] {
        if self.road_classes.is_empty() {
            std::slice::from_ref(&self.road_class)
        } else {
            &self.road_classes
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(rename = "osmid")]
    pub id: NodeId,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
    pub time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Node,
    pub way: WayAttributes,
    pub end: Node,
    pub time: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Route {
    #[serde(rename = "route_id")]
    pub id: Uuid,
    #[serde(rename = "price_total")]
    pub total_price: f64,
    pub segments: Vec<Segment>,
}

impl Route {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            total_price: 0.0,
            segments: Vec::new(),
        }
    }

    pub fn add_segment(&mut self, segment: Segment) {
        self.segments.push(segment);
    }

    /// Segment prices are not summed automatically; call after pricing.
    pub fn recompute_total(&mut self) {
        self.total_price = self.segments.iter().map(|segment| segment.price).sum();
    }
}

impl Default for Route {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceModifier {
    pub id: String,
    #[serde(rename = "priceTitle")]
    pub title: String,
    #[serde(rename = "priceType")]
    pub kind: String,
    #[serde(rename = "valueName")]
    pub name: String,
    #[serde(rename = "valueDescription")]
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    pub id: String,
    pub licence: String,
    pub classification: String,
    pub fuel_type: String,
}
