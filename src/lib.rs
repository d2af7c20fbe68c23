pub mod config;
pub mod error;
pub mod io;
pub mod mapmatcher;
pub mod models;
pub mod pricer;
pub mod reference_data;
pub mod road_graph;
pub mod route_handler;
pub mod route_matcher;
pub mod snapshot;
pub mod time_windows;
pub mod transport;
pub mod trip_builder;

#[cfg(test)]
mod fixtures;
