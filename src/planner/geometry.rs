//! Route-type aware coordinate sequences, per-stop remaining distances and
//! depot endpoint guarantees.

use tracing::debug;

use crate::config::RouteType;
use crate::domain::Stop;
use crate::geo::Point;
use crate::osrm::PathLeg;

/// Coordinate sequence to send to the routing engine for one route.
pub(crate) fn route_coords(route_type: RouteType, depot: Point, stops: &[Stop]) -> Vec<Point> {
    let mut coords = Vec::with_capacity(stops.len() + 2);
    if route_type.starts_at_depot() {
        coords.push(depot);
    }
    coords.extend(stops.iter().map(|s| s.location));
    if route_type.ends_at_depot() {
        coords.push(depot);
    }
    coords
}

/// Fill each stop's remaining-distance fields from the path legs.
///
/// Leg `j` runs between consecutive coordinates of the sequence built by
/// [`route_coords`], so the leg count is stops+1 for a ring and stops for the
/// one-way types. Durations get the traffic factor applied.
pub(crate) fn apply_leg_metrics(
    route_type: RouteType,
    stops: &mut [Stop],
    legs: &[PathLeg],
    traffic_factor: f64,
) {
    let expected = match route_type {
        RouteType::Ring => stops.len() + 1,
        RouteType::ToHome | RouteType::ToDepot => stops.len(),
    };
    if legs.len() != expected {
        debug!(
            "Leg count {} does not match {} stops for {:?}; skipping remaining-distance fields",
            legs.len(),
            stops.len(),
            route_type
        );
        return;
    }

    match route_type {
        RouteType::Ring => {
            // legs[0] = depot -> stop 0, legs[i+1] leaves stop i. Remaining
            // to depot is everything after the stop.
            for i in 0..stops.len() {
                let distance: f64 = legs[i + 1..].iter().map(|l| l.distance).sum();
                let duration: f64 = legs[i + 1..].iter().map(|l| l.duration).sum();
                stops[i].distance_to_depot = Some(distance.round());
                stops[i].duration_to_depot = Some((duration * traffic_factor).round());
            }
        }
        RouteType::ToDepot => {
            // legs[i] leaves stop i; the last leg arrives at the depot.
            for i in 0..stops.len() {
                let distance: f64 = legs[i..].iter().map(|l| l.distance).sum();
                let duration: f64 = legs[i..].iter().map(|l| l.duration).sum();
                stops[i].distance_to_depot = Some(distance.round());
                stops[i].duration_to_depot = Some((duration * traffic_factor).round());
            }
        }
        RouteType::ToHome => {
            // legs[0] = depot -> stop 0; cumulative sums measure from the
            // depot out.
            for i in 0..stops.len() {
                let distance: f64 = legs[..=i].iter().map(|l| l.distance).sum();
                let duration: f64 = legs[..=i].iter().map(|l| l.duration).sum();
                stops[i].distance_from_depot = Some(distance.round());
                stops[i].duration_from_depot = Some((duration * traffic_factor).round());
            }
        }
    }
}

/// The engine snaps endpoints to the road network; pin the exact depot point
/// back onto the polyline where the route type requires it.
pub(crate) fn ensure_depot_endpoints(route_type: RouteType, depot: Point, polyline: &mut Vec<Point>) {
    if polyline.is_empty() {
        return;
    }
    if route_type.starts_at_depot() && polyline[0] != depot {
        polyline.insert(0, depot);
    }
    if route_type.ends_at_depot() && polyline[polyline.len() - 1] != depot {
        polyline.push(depot);
    }
}
