//! A routing engine that never leaves the process.
//!
//! Uses the same math as the degraded-mode fallback, but as the provider's
//! normal mode, so results are not flagged as fallback data. Useful for
//! air-gapped runs and deterministic tests.

use crate::geo::Point;
use crate::osrm::{fallback, DistanceTable, RoadNetwork, RoadPath, SnappedPoint};

#[derive(Debug, Clone, Copy, Default)]
pub struct StraightLineNetwork;

impl RoadNetwork for StraightLineNetwork {
    async fn table(&self, points: &[Point], _exclude_tolls: bool) -> DistanceTable {
        let mut table = fallback::straight_line_table(points);
        table.fallback = false;
        table
    }

    async fn route(&self, points: &[Point], _exclude_tolls: bool) -> RoadPath {
        if points.len() < 2 {
            return RoadPath {
                polyline: Vec::new(),
                distance: 0.0,
                duration: 0.0,
                legs: Vec::new(),
                fallback: false,
            };
        }
        let mut path = fallback::straight_line_path(points);
        path.fallback = false;
        path
    }

    async fn snap(&self, point: Point, _max_distance: f64) -> SnappedPoint {
        // There is no road network to consult; the point is its own stop.
        SnappedPoint {
            original: point,
            snapped: point,
            walking_distance: 0.0,
            road_name: String::new(),
            valid: true,
        }
    }
}
