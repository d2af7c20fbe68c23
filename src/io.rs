use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::{Result, RouteError};

/// ISO-8601 with fractional seconds and a UTC designator, as emitted by the
/// telemetry service (e.g. `2023-06-01T13:04:30.4366085Z`).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| RouteError::InvalidInput(format!("Invalid timestamp {:?}: {}", value, e)))
}

pub mod telemetry {
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    use super::parse_timestamp;
    use crate::error::{Result, RouteError};
    use crate::models::{Coordinate, Route};

    #[derive(Debug, Serialize, Deserialize, Clone)]
    pub struct CoordinatePoint {
        pub lat: f64,

        #[serde(rename = "long")]
        pub lon: f64,

        #[serde(rename = "timeStamp")]
        pub time_stamp: String,
    }

    /// Trace published by the telemetry service for one vehicle.
    #[derive(Debug, Serialize, Deserialize, Clone)]
    pub struct PublishCoordinates {
        #[serde(rename = "vehicleId")]
        pub vehicle_id: Uuid,

        #[serde(alias = "cords")]
        pub coordinates: Vec<CoordinatePoint>,
    }

    impl PublishCoordinates {
        /// Validates and converts the wire points, keeping their order.
        pub fn to_coordinates(&self) -> Result<Vec<Coordinate>> {
            self.coordinates
                .iter()
                .enumerate()
                .map(|(i, point)| {
                    if !point.lat.is_finite() || !point.lon.is_finite() {
                        return Err(RouteError::InvalidInput(format!(
                            "Coordinate {} is not finite ({}, {})",
                            i, point.lat, point.lon
                        )));
                    }
                    Ok(Coordinate {
                        latitude: point.lat,
                        longitude: point.lon,
                        timestamp: parse_timestamp(&point.time_stamp)?,
                    })
                })
                .collect()
        }
    }

    /// Priced route handed to the data service.
    #[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
    pub struct RouteMessage {
        #[serde(rename = "VehicleId")]
        pub vehicle_id: Uuid,

        #[serde(rename = "Route")]
        pub route: Route,
    }
}
