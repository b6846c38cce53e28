//! Clustering Engine - groups employee homes into candidate shuttle stops
//! under a walking-distance cap.

pub mod dbscan;
pub mod kmeans;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::{Employee, Stop, WalkDistance};
use crate::geo::{centroid, Point};

/// Seed for the capacity method's k-means so reruns are reproducible.
const KMEANS_SEED: u64 = 42;

/// Individual stops get keys in a separate range so they are easy to spot in
/// saved plans. The `individual` flag on the stop is what code should check.
const INDIVIDUAL_KEY_BASE: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterMethod {
    /// DBSCAN with eps = walking cap over the geodesic distance matrix.
    #[default]
    Density,
    /// k-means with k derived from the largest vehicle capacity.
    Capacity,
}

/// Group employees into stops. Every employee lands in exactly one stop:
/// clustered members share a centroid stop, outliers are first attached to an
/// existing stop within the cap and otherwise become individual stops.
pub fn cluster_employees(
    employees: &[Employee],
    walking_cap_m: f64,
    method: ClusterMethod,
    max_cluster_size: usize,
) -> Vec<Stop> {
    if employees.is_empty() {
        return Vec::new();
    }

    let mut residual: Vec<usize> = Vec::new();
    let mut stops = match method {
        ClusterMethod::Density => density_stops(employees, walking_cap_m, &mut residual),
        ClusterMethod::Capacity => {
            capacity_stops(employees, walking_cap_m, max_cluster_size, &mut residual)
        }
    };

    attach_residual(employees, walking_cap_m, &mut stops, &mut residual);

    // Whoever is still left gets a personal pickup point at their home.
    for (i, &emp_idx) in residual.iter().enumerate() {
        let employee = &employees[emp_idx];
        let mut stop = Stop::new(INDIVIDUAL_KEY_BASE + i as u32, employee.home);
        stop.employee_ids.push(employee.id);
        stop.employee_names.push(employee.name.clone());
        stop.walking_distances.push(WalkDistance {
            employee_id: employee.id,
            walking_distance: 0.0,
        });
        stop.individual = true;
        stops.push(stop);
    }

    info!(
        "Clustering produced {} stops for {} employees ({} individual)",
        stops.len(),
        employees.len(),
        stops.iter().filter(|s| s.individual).count()
    );

    stops
}

fn density_stops(
    employees: &[Employee],
    walking_cap_m: f64,
    residual: &mut Vec<usize>,
) -> Vec<Stop> {
    let points: Vec<Point> = employees.iter().map(|e| e.home).collect();

    debug!("Building {}x{} geodesic distance matrix", points.len(), points.len());
    let distances = pairwise_distances(&points);

    let labels = dbscan::cluster(&distances, walking_cap_m, 2);

    let cluster_count = labels.iter().copied().max().unwrap_or(dbscan::NOISE) + 1;
    let mut clusters: Vec<Vec<usize>> = vec![Vec::new(); cluster_count.max(0) as usize];
    for (idx, &label) in labels.iter().enumerate() {
        if label == dbscan::NOISE {
            residual.push(idx);
        } else {
            clusters[label as usize].push(idx);
        }
    }

    let mut stops = Vec::new();
    for (key, members) in clusters.into_iter().enumerate() {
        if let Some(stop) = build_stop(key as u32, members, employees, walking_cap_m, residual) {
            stops.push(stop);
        }
    }
    stops
}

fn capacity_stops(
    employees: &[Employee],
    walking_cap_m: f64,
    max_cluster_size: usize,
    residual: &mut Vec<usize>,
) -> Vec<Stop> {
    let points: Vec<Point> = employees.iter().map(|e| e.home).collect();
    let n = points.len();

    let k = n.div_ceil(max_cluster_size.max(1)).max(2).min(n);
    debug!("Running k-means with k={k} for {n} employees");

    let (labels, centroids) = kmeans::cluster(&points, k, KMEANS_SEED);

    let mut stops = Vec::new();
    for c in 0..k {
        let mut members = Vec::new();
        for (idx, &label) in labels.iter().enumerate() {
            if label != c {
                continue;
            }
            // Reject members the k-means centroid put out of walking reach.
            if points[idx].distance_m(centroids[c]) > walking_cap_m {
                residual.push(idx);
            } else {
                members.push(idx);
            }
        }
        if let Some(stop) = build_stop(c as u32, members, employees, walking_cap_m, residual) {
            stops.push(stop);
        }
    }
    stops
}

/// Turn a member set into a stop at its centroid, shedding the farthest
/// member to the residual until every member is within the cap. A set
/// trimmed down to one member trivially satisfies the cap.
fn build_stop(
    key: u32,
    mut members: Vec<usize>,
    employees: &[Employee],
    walking_cap_m: f64,
    residual: &mut Vec<usize>,
) -> Option<Stop> {
    loop {
        let points: Vec<Point> = members.iter().map(|&i| employees[i].home).collect();
        let center = centroid(&points)?;

        let mut far_pos = 0;
        let mut far_dist = 0.0;
        for (pos, &idx) in members.iter().enumerate() {
            let d = employees[idx].home.distance_m(center);
            if d > far_dist {
                far_dist = d;
                far_pos = pos;
            }
        }

        if far_dist > walking_cap_m && members.len() > 1 {
            residual.push(members.remove(far_pos));
            continue;
        }

        let mut stop = Stop::new(key, center);
        for &idx in &members {
            let employee = &employees[idx];
            let walk = employee.home.distance_m(center).round();
            stop.employee_ids.push(employee.id);
            stop.employee_names.push(employee.name.clone());
            stop.walking_distances.push(WalkDistance {
                employee_id: employee.id,
                walking_distance: walk,
            });
            stop.max_walking_distance = stop.max_walking_distance.max(walk);
        }
        stop.individual = members.len() == 1;
        return Some(stop);
    }
}

/// Try to place each residual employee on the first existing stop within the
/// cap, updating that stop's walk bookkeeping. Leftovers stay in `residual`.
fn attach_residual(
    employees: &[Employee],
    walking_cap_m: f64,
    stops: &mut [Stop],
    residual: &mut Vec<usize>,
) {
    let mut still_left = Vec::new();
    for &emp_idx in residual.iter() {
        let employee = &employees[emp_idx];
        let spot = stops
            .iter_mut()
            .find(|s| employee.home.distance_m(s.location) <= walking_cap_m);
        match spot {
            Some(stop) => {
                let walk = employee.home.distance_m(stop.location).round();
                stop.employee_ids.push(employee.id);
                stop.employee_names.push(employee.name.clone());
                stop.walking_distances.push(WalkDistance {
                    employee_id: employee.id,
                    walking_distance: walk,
                });
                stop.max_walking_distance = stop.max_walking_distance.max(walk);
                stop.individual = false;
            }
            None => still_left.push(emp_idx),
        }
    }
    *residual = still_left;
}

pub(crate) fn pairwise_distances(points: &[Point]) -> Vec<Vec<f64>> {
    points
        .par_iter()
        .map(|a| points.iter().map(|b| a.distance_m(*b)).collect())
        .collect()
}
