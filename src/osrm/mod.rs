//! Road-Network Adapter - distance/duration matrices, route geometry and
//! nearest-road snapping against an OSRM instance, with straight-line
//! fallbacks when the engine is unreachable or returns garbage.

pub mod client;
pub mod fallback;
pub mod offline;
pub mod snap;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::geo::Point;

pub use client::OsrmClient;
pub use offline::StraightLineNetwork;
pub use snap::RoadKeywords;

/// N x N travel costs over a point set. Self-distances are zero; asymmetry is
/// allowed. `fallback` marks data produced by the straight-line estimate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistanceTable {
    /// Meters.
    pub distances: Vec<Vec<f64>>,
    /// Seconds.
    pub durations: Vec<Vec<f64>>,
    pub fallback: bool,
}

/// Travel cost of one leg between consecutive coordinates of a path.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PathLeg {
    pub distance: f64,
    pub duration: f64,
}

/// Road geometry through an ordered coordinate sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoadPath {
    pub polyline: Vec<Point>,
    pub distance: f64,
    pub duration: f64,
    pub legs: Vec<PathLeg>,
    pub fallback: bool,
}

/// Result of snapping one point to the road network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnappedPoint {
    pub original: Point,
    pub snapped: Point,
    /// Meters from the original point to the snapped position.
    pub walking_distance: f64,
    pub road_name: String,
    /// False when the engine could not be asked and the original point was
    /// returned unchanged.
    pub valid: bool,
}

/// The routing engine as seen by the planning core. Implementations never
/// fail: transport errors degrade to fallback data instead.
#[allow(async_fn_in_trait)]
pub trait RoadNetwork {
    /// Distance and duration matrix over `points`.
    async fn table(&self, points: &[Point], exclude_tolls: bool) -> DistanceTable;

    /// Route geometry with per-leg metrics through `points` in order.
    async fn route(&self, points: &[Point], exclude_tolls: bool) -> RoadPath;

    /// Snap one point to a road, preferring main roads within an extended
    /// radius of `3 * max_distance`.
    async fn snap(&self, point: Point, max_distance: f64) -> SnappedPoint;

    /// Snap a batch concurrently. `results[i]` corresponds to `points[i]`.
    async fn snap_many(&self, points: &[Point], max_distance: f64) -> Vec<SnappedPoint> {
        join_all(points.iter().map(|p| self.snap(*p, max_distance))).await
    }
}
