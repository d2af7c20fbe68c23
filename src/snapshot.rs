use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info};
use std::path::Path;
use std::time::{Duration, Instant};

use crate::error::{Result, RouteError};
use crate::road_graph::{GraphSnapshot, RoadGraph};

fn is_json(path: &Path) -> bool {
    path.extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("json"))
}

/// Reads a snapshot; `.json` files are parsed as JSON, anything else as bincode.
pub fn load_snapshot(path: &Path) -> Result<GraphSnapshot> {
    let load_start = Instant::now();
    let bytes = std::fs::read(path)
        .map_err(|e| RouteError::Snapshot(format!("Failed to read {}: {}", path.display(), e)))?;

    let snapshot: GraphSnapshot = if is_json(path) {
        serde_json::from_slice(&bytes)
            .map_err(|e| RouteError::Snapshot(format!("Invalid JSON snapshot {}: {}", path.display(), e)))?
    } else {
        let config = bincode::config::standard();
        let (snapshot, _): (GraphSnapshot, _) = bincode::serde::decode_from_slice(&bytes, config)
            .map_err(|e| RouteError::Snapshot(format!("Invalid snapshot {}: {}", path.display(), e)))?;
        snapshot
    };

    debug!(
        "Read snapshot {} ({} bytes) in {:?}",
        path.display(),
        bytes.len(),
        load_start.elapsed()
    );
    Ok(snapshot)
}

/// Loads and indexes the road graph stored at `path`.
pub fn load_graph(path: &Path) -> Result<RoadGraph> {
    let load_start = Instant::now();
    let graph = RoadGraph::from_snapshot(load_snapshot(path)?)?;
    info!("Loaded {:?} from {} in {:?}", graph, path.display(), load_start.elapsed());
    Ok(graph)
}

/// Encodes `snapshot` with bincode and writes it to `path`, returning the
/// number of bytes written.
pub fn write_binary_snapshot(snapshot: &GraphSnapshot, path: &Path) -> Result<usize> {
    let config = bincode::config::standard();
    let bytes = bincode::serde::encode_to_vec(snapshot, config)
        .map_err(|e| RouteError::Snapshot(format!("Failed to encode snapshot: {}", e)))?;

    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| {
            RouteError::Snapshot(format!("Failed to create {}: {}", dir.display(), e))
        })?;
    }
    std::fs::write(path, &bytes)
        .map_err(|e| RouteError::Snapshot(format!("Failed to write {}: {}", path.display(), e)))?;

    Ok(bytes.len())
}

/// Converts the JSON snapshot at `source` into a binary snapshot at `target`.
///
/// The graph is built once before writing so an inconsistent source never
/// produces a binary snapshot.
pub fn compile_snapshot(source: &Path, target: &Path) -> Result<usize> {
    let pb = ProgressBar::new_spinner();
    pb.enable_steady_tick(Duration::from_millis(120));
    if let Ok(style) = ProgressStyle::default_spinner().template("[{elapsed_precise}] {spinner} {msg}") {
        pb.set_style(style);
    }

    pb.set_message(format!("Reading {}", source.display()));
    let snapshot = load_snapshot(source)?;

    pb.set_message(format!(
        "Validating {} nodes and {} edges",
        snapshot.nodes.len(),
        snapshot.edges.len()
    ));
    RoadGraph::from_snapshot(snapshot.clone())?;

    pb.set_message(format!("Writing {}", target.display()));
    let written = write_binary_snapshot(&snapshot, target)?;
    pb.finish_with_message(format!("Wrote {} bytes to {}", written, target.display()));

    info!(
        "Compiled {} into {} ({} bytes)",
        source.display(),
        target.display(),
        written
    );
    Ok(written)
}
