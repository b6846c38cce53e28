//! Straight-line estimates used when the routing engine is unavailable.
//!
//! Durations assume a 30 km/h average scaled by a 1.4 road-tortuosity factor
//! over the great-circle distance.

use crate::geo::Point;
use crate::osrm::{DistanceTable, PathLeg, RoadPath};

pub const AVERAGE_SPEED_MPS: f64 = 30.0 * 1000.0 / 3600.0;
pub const ROAD_TORTUOSITY: f64 = 1.4;

pub fn straight_line_table(points: &[Point]) -> DistanceTable {
    let n = points.len();
    let mut distances = vec![vec![0.0; n]; n];
    let mut durations = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            let d = points[i].distance_m(points[j]);
            distances[i][j] = d;
            durations[i][j] = d * ROAD_TORTUOSITY / AVERAGE_SPEED_MPS;
        }
    }

    DistanceTable {
        distances,
        durations,
        fallback: true,
    }
}

pub fn straight_line_path(points: &[Point]) -> RoadPath {
    let mut legs = Vec::new();
    let mut total_distance = 0.0;
    let mut total_duration = 0.0;

    for pair in points.windows(2) {
        let d = pair[0].distance_m(pair[1]) * ROAD_TORTUOSITY;
        let t = d / AVERAGE_SPEED_MPS;
        legs.push(PathLeg {
            distance: d,
            duration: t,
        });
        total_distance += d;
        total_duration += t;
    }

    RoadPath {
        polyline: points.to_vec(),
        distance: total_distance,
        duration: total_duration,
        legs,
        fallback: true,
    }
}
