use log::{debug, error};
use std::collections::{BTreeMap, HashMap};

use crate::error::{Result, RouteError};
use crate::models::{Coordinate, TimeWindow};
use crate::road_graph::EdgeKey;
use crate::route_matcher::EdgeTableRow;

/// Time windows keyed by edge-table index.
pub type IndexedWindows = BTreeMap<usize, TimeWindow>;

/// Window per distinct matched edge, in first-appearance order.
///
/// `matched` and `coordinates` are aligned index for index. Each window is
/// `(last seen, first seen)`: the observed ordering of the legacy router,
/// kept until it is validated against recorded traces.
pub fn edge_windows(
    matched: &[EdgeKey],
    coordinates: &[Coordinate],
) -> Result<Vec<(EdgeKey, TimeWindow)>> {
    if matched.len() != coordinates.len() {
        return Err(RouteError::InvalidInput(format!(
            "{} matched edges for {} coordinates",
            matched.len(),
            coordinates.len()
        )));
    }

    let mut order: Vec<EdgeKey> = Vec::new();
    let mut seen: HashMap<EdgeKey, (usize, usize)> = HashMap::new();
    for (i, edge) in matched.iter().enumerate() {
        seen.entry(*edge)
            .and_modify(|(_, last)| *last = i)
            .or_insert_with(|| {
                order.push(*edge);
                (i, i)
            });
    }

    Ok(order
        .into_iter()
        .map(|edge| {
            let (first, last) = seen[&edge];
            (
                edge,
                TimeWindow::new(coordinates[last].timestamp, coordinates[first].timestamp),
            )
        })
        .collect())
}

/// Copies each matched edge's window onto the table rows carrying that exact
/// edge identity. Rows without a match stay unresolved.
pub fn index_windows(
    table: &[EdgeTableRow],
    windows: &[(EdgeKey, TimeWindow)],
) -> IndexedWindows {
    let by_edge: HashMap<EdgeKey, TimeWindow> = windows.iter().copied().collect();

    table
        .iter()
        .enumerate()
        .filter_map(|(i, row)| by_edge.get(&row.edge).map(|window| (i, *window)))
        .collect()
}

fn unfillable(windows: &IndexedWindows, highest_index: usize) -> RouteError {
    error!(
        "Unable to anchor time windows up to index {}: {:?}",
        highest_index, windows
    );
    RouteError::UnfillableGap {
        highest_index,
        resolved: windows.keys().copied().collect(),
    }
}

/// Resolves every index in `[0, highest_index]`.
///
/// Leading and trailing gaps copy the nearest resolved window verbatim. An
/// interior gap starting at `i` copies the next resolved window into
/// `[i + 1, j - 1]` and gives `i` the window `(end of i - 1, start of i + 1)`,
/// so a single missing index bridges its two neighbours.
pub fn fill_gaps(mut windows: IndexedWindows, highest_index: usize) -> Result<IndexedWindows> {
    let Some(&first_resolved) = windows.keys().next() else {
        return Err(unfillable(&windows, highest_index));
    };

    if !windows.contains_key(&0) {
        let anchor = windows[&first_resolved];
        for i in 0..first_resolved {
            windows.insert(i, anchor);
        }
        debug!("Propagated window of index {} to the start", first_resolved);
    }

    if !windows.contains_key(&highest_index) {
        let Some((&last_resolved, &anchor)) = windows.range(..highest_index).next_back() else {
            return Err(unfillable(&windows, highest_index));
        };
        for i in last_resolved + 1..=highest_index {
            windows.insert(i, anchor);
        }
        debug!("Propagated window of index {} to the end", last_resolved);
    }

    for i in 1..highest_index {
        if windows.contains_key(&i) {
            continue;
        }
        let (Some((&next, &anchor)), Some(&previous)) =
            (windows.range(i + 1..).next(), windows.get(&(i - 1)))
        else {
            return Err(unfillable(&windows, highest_index));
        };
        for j in i + 1..next {
            windows.insert(j, anchor);
        }
        let following = windows[&(i + 1)];
        windows.insert(i, TimeWindow::new(previous.end, following.start));
    }

    Ok(windows)
}

/// Steps A to C for one assembled path.
pub fn resolve_windows(
    matched: &[EdgeKey],
    coordinates: &[Coordinate],
    table: &[EdgeTableRow],
) -> Result<IndexedWindows> {
    let windows = edge_windows(matched, coordinates)?;
    let indexed = index_windows(table, &windows);
    debug!(
        "{} of {} table rows carry an observed window",
        indexed.len(),
        table.len()
    );

    let Some(highest_index) = table.len().checked_sub(1) else {
        return Err(unfillable(&indexed, 0));
    };
    fill_gaps(indexed, highest_index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::trace;
    use crate::io::parse_timestamp;
    use chrono::{DateTime, Utc};

    fn at(seconds: u32) -> DateTime<Utc> {
        parse_timestamp(&format!("2023-06-01T13:{:02}:{:02}.0Z", seconds / 60, seconds % 60))
            .unwrap()
    }

    fn window(start: u32, end: u32) -> TimeWindow {
        TimeWindow::new(at(start), at(end))
    }

    #[test]
    fn edge_windows_put_last_sighting_first() {
        let a = EdgeKey::new(1, 2, 0);
        let b = EdgeKey::new(2, 3, 0);
        let coordinates = trace(&[
            (50.0, 4.0, "13:00:00"),
            (50.0, 4.0, "13:00:10"),
            (50.0, 4.0, "13:00:20"),
            (50.0, 4.0, "13:00:30"),
        ]);

        let windows = edge_windows(&[a, b, a, b], &coordinates).unwrap();
        assert_eq!(windows, vec![(a, window(20, 0)), (b, window(30, 10))]);
    }

    #[test]
    fn edge_windows_require_aligned_inputs() {
        let coordinates = trace(&[(50.0, 4.0, "13:00:00")]);
        assert!(edge_windows(&[], &coordinates).is_err());
    }

    #[test]
    fn index_windows_match_exact_identity_only() {
        let table = [
            EdgeTableRow {
                edge: EdgeKey::new(2, 3, 0),
                order: 0,
            },
            EdgeTableRow {
                edge: EdgeKey::new(2, 3, 1),
                order: 0,
            },
        ];
        let indexed = index_windows(&table, &[(EdgeKey::new(2, 3, 0), window(5, 1))]);
        assert_eq!(indexed.len(), 1);
        assert_eq!(indexed[&0], window(5, 1));
    }

    #[test_log::test]
    fn filling_resolved_map_is_a_no_op() {
        let full: IndexedWindows = (0..5).map(|i| (i, window(i as u32 * 10, i as u32 * 10 + 5))).collect();
        assert_eq!(fill_gaps(full.clone(), 4).unwrap(), full);
    }

    #[test_log::test]
    fn single_interior_gap_bridges_neighbours() {
        let mut windows = IndexedWindows::new();
        for i in 0..=8 {
            if i != 5 {
                windows.insert(i, window(i as u32 * 10, i as u32 * 10 + 5));
            }
        }
        windows.insert(4, window(40, 45));
        windows.insert(6, window(60, 65));

        let filled = fill_gaps(windows, 8).unwrap();
        assert_eq!(filled[&5], window(45, 60));
    }

    #[test_log::test]
    fn leading_gap_is_copied_verbatim() {
        let mut windows = IndexedWindows::new();
        windows.insert(2, window(100, 90));
        windows.insert(9, window(200, 190));

        let filled = fill_gaps(windows, 9).unwrap();
        assert_eq!(filled[&0], window(100, 90));
        assert_eq!(filled[&1], window(100, 90));
    }

    #[test_log::test]
    fn trailing_gap_is_copied_verbatim() {
        let mut windows = IndexedWindows::new();
        windows.insert(0, window(0, 5));
        windows.insert(3, window(30, 35));

        let filled = fill_gaps(windows, 6).unwrap();
        for i in 4..=6 {
            assert_eq!(filled[&i], window(30, 35));
        }
    }

    #[test_log::test]
    fn long_interior_gap_takes_next_window_and_bridges_its_head() {
        let mut windows = IndexedWindows::new();
        windows.insert(0, window(0, 5));
        windows.insert(4, window(40, 45));

        let filled = fill_gaps(windows, 4).unwrap();
        assert_eq!(filled[&1], window(5, 40));
        assert_eq!(filled[&2], window(40, 45));
        assert_eq!(filled[&3], window(40, 45));
    }

    #[test_log::test]
    fn every_partial_map_is_completed() {
        let highest = 7;
        // Every non-empty proper subset of [0, 7].
        for mask in 1u32..(1 << (highest + 1)) - 1 {
            let windows: IndexedWindows = (0..=highest)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| (i, window(i as u32 * 10, i as u32 * 10 + 5)))
                .collect();

            let filled = fill_gaps(windows, highest).unwrap();
            assert_eq!(
                filled.keys().copied().collect::<Vec<_>>(),
                (0..=highest).collect::<Vec<_>>(),
                "mask {mask:#b}"
            );
        }
    }

    #[test_log::test]
    fn empty_map_is_unfillable() {
        let err = fill_gaps(IndexedWindows::new(), 3).unwrap_err();
        assert!(matches!(
            err,
            RouteError::UnfillableGap {
                highest_index: 3,
                ..
            }
        ));
    }

    #[test]
    fn empty_table_is_unfillable() {
        let coordinates = trace(&[(50.0, 4.0, "13:00:00")]);
        let err = resolve_windows(&[EdgeKey::new(1, 2, 0)], &coordinates, &[]).unwrap_err();
        assert_eq!(err.kind(), "UnfillableGap");
    }
}
