//! Plan Orchestrator - the end-to-end pipeline from employee homes to a
//! persisted plan: cluster, snap, matrix, solve (with fleet-escalation
//! retries), geometry enrichment, single-transaction persist.

pub mod editor;
pub mod fleet;
mod geometry;

use std::collections::HashMap;
use std::time::Duration;

use chrono::Local;
use tracing::{info, warn};

use crate::cluster::{cluster_employees, ClusterMethod};
use crate::config::{PlanRequest, VehiclePriority};
use crate::db::PlanRepository;
use crate::domain::{NewPlan, NewRoute, Plan, Stop};
use crate::error::{Error, Result};
use crate::geo::Point;
use crate::osrm::RoadNetwork;
use crate::solver::{self, CvrpProblem, CvrpSolution, SolverStatus};

pub use editor::{PlanEditor, RouteEdit, StopMove};
pub use fleet::{build_fleet, Fleet};

/// Fleet-escalation attempts before the run is declared infeasible.
const MAX_SOLVE_ATTEMPTS: u32 = 5;

pub struct Planner<R> {
    road: R,
    repo: PlanRepository,
}

impl<R: RoadNetwork> Planner<R> {
    pub fn new(road: R, repo: PlanRepository) -> Self {
        Planner { road, repo }
    }

    pub async fn create_plan(&self, request: &PlanRequest) -> Result<Plan> {
        request.validate()?;

        // Step 1: Load employees, optionally filtered by shift.
        let shift_name = match request.shift_id {
            Some(shift_id) => Some(self.repo.load_shift(shift_id).await?.name),
            None => None,
        };
        let employees = self.repo.load_employees(request.shift_id).await?;
        if employees.is_empty() {
            return Err(Error::InputInvalid(match &shift_name {
                Some(name) => format!("no employees found in shift '{name}'"),
                None => "no employees found".to_string(),
            }));
        }
        info!(
            "Planning for {} employees{}",
            employees.len(),
            shift_name
                .as_deref()
                .map(|n| format!(" (shift: {n})"))
                .unwrap_or_default()
        );

        // Step 2: Cluster homes into candidate stops.
        let mut stops = cluster_employees(
            &employees,
            request.max_walking_distance as f64,
            ClusterMethod::Density,
            request.large_capacity.max(request.small_capacity) as usize,
        );
        if stops.is_empty() {
            return Err(Error::InputInvalid("could not create any stops".to_string()));
        }

        let homes: HashMap<i64, Point> = employees.iter().map(|e| (e.id, e.home)).collect();

        // Step 3: Snap stops onto roads a minibus can serve, then rebase the
        // walk distances on the snapped positions.
        let stop_points: Vec<Point> = stops.iter().map(|s| s.location).collect();
        let snapped = self
            .road
            .snap_many(&stop_points, request.max_walking_distance as f64)
            .await;
        let mut degraded = false;
        for (stop, snap) in stops.iter_mut().zip(&snapped) {
            if snap.valid {
                stop.original_location = Some(stop.location);
                stop.location = snap.snapped;
                stop.road_name = snap.road_name.clone();
                stop.recompute_walks(&homes);
            } else {
                degraded = true;
            }
        }

        // Step 4: Distance and duration matrix over depot + stops.
        let mut points = Vec::with_capacity(stops.len() + 1);
        points.push(request.depot);
        points.extend(stops.iter().map(|s| s.location));
        let table = self.road.table(&points, request.exclude_tolls).await;
        degraded |= table.fallback;

        // Step 5: Traffic scaling, applied to the matrix and the soft bound
        // alike so the solver sees one consistent time unit.
        let traffic_factor = request.traffic_mode.factor();
        if traffic_factor != 1.0 {
            info!(
                "Traffic mode {} scales durations by {traffic_factor}x",
                request.traffic_mode.as_str()
            );
        }
        let distances: Vec<Vec<i64>> = table
            .distances
            .iter()
            .map(|row| row.iter().map(|d| d.round() as i64).collect())
            .collect();
        let durations: Vec<Vec<i64>> = table
            .durations
            .iter()
            .map(|row| row.iter().map(|d| (d * traffic_factor).round() as i64).collect())
            .collect();
        let max_route_duration =
            (request.max_travel_time as f64 * 60.0 * traffic_factor).round() as i64;

        // Step 6: Solver budget grows with the stop count.
        let time_limit = solver_time_limit(stops.len());
        info!("Optimizing {} stops with a {:?} budget", stops.len(), time_limit);

        let mut demands = Vec::with_capacity(stops.len() + 1);
        demands.push(0);
        demands.extend(stops.iter().map(|s| s.passengers() as i64));

        // Step 7: Solve, enlarging the fleet on failure.
        let mut num_small = request.num_small;
        let mut num_large = request.num_large;
        let mut solved: Option<(CvrpSolution, Fleet)> = None;

        for attempt in 0..MAX_SOLVE_ATTEMPTS {
            let fleet = build_fleet(
                num_small,
                num_large,
                request.small_capacity,
                request.large_capacity,
                request.buffer_seats,
                request.vehicle_priority,
            );
            let problem = CvrpProblem {
                distances: distances.clone(),
                durations: durations.clone(),
                demands: demands.clone(),
                capacities: fleet.capacities.clone(),
                priority_count: fleet.priority_count,
                depot: 0,
                time_limit,
                max_route_duration,
            };
            let solution = tokio::task::spawn_blocking(move || solver::solve(&problem))
                .await
                .map_err(|e| Error::Internal(format!("solver task failed: {e}")))?;

            if solution.status != SolverStatus::NoSolution && solution.vehicles_used > 0 {
                if attempt > 0 {
                    info!(
                        "Solution found on attempt {} with {} vehicles available",
                        attempt + 1,
                        num_small + num_large
                    );
                }
                solved = Some((solution, fleet));
                break;
            }

            warn!(
                "No solution within the time bound (attempt {}); enlarging fleet",
                attempt + 1
            );
            match request.vehicle_priority {
                VehiclePriority::Small => num_small += 2,
                VehiclePriority::Large => num_large += 2,
                VehiclePriority::Auto => {
                    num_small += 1;
                    num_large += 1;
                }
            }
        }

        let Some((solution, fleet)) = solved else {
            return Err(Error::TimeConstraintInfeasible {
                max_travel_time: request.max_travel_time,
            });
        };

        // Step 8: Geometry enrichment per route.
        let mut routes = Vec::with_capacity(solution.vehicles_used);
        for (vehicle, node_route) in solution.routes.iter().enumerate() {
            if node_route.is_empty() {
                continue;
            }

            // Interior nodes map to stops; node 0 is the depot.
            let mut route_stops: Vec<Stop> = node_route
                .iter()
                .filter(|&&n| n != 0)
                .map(|&n| stops[n - 1].clone())
                .collect();

            let coords = geometry::route_coords(request.route_type, request.depot, &route_stops);
            let path = self.road.route(&coords, request.exclude_tolls).await;
            degraded |= path.fallback;

            geometry::apply_leg_metrics(
                request.route_type,
                &mut route_stops,
                &path.legs,
                traffic_factor,
            );

            // Step 9: Pin the exact depot onto the polyline ends.
            let mut polyline = path.polyline;
            geometry::ensure_depot_endpoints(request.route_type, request.depot, &mut polyline);

            routes.push(NewRoute {
                vehicle_id: vehicle as u32,
                vehicle_type: fleet.vehicle_types[vehicle].clone(),
                capacity: fleet.capacities[vehicle] as u32,
                passengers: solution.loads[vehicle] as u32,
                distance: path.distance,
                duration: path.duration * traffic_factor,
                polyline,
                stops: route_stops,
            });
        }

        // Step 10: Persist plan, routes and stop assignments atomically.
        let total_distance: f64 = routes.iter().map(|r| r.distance).sum();
        let total_duration: f64 = routes.iter().map(|r| r.duration).sum();
        let total_passengers: u32 = routes.iter().map(|r| r.passengers).sum();

        let name = request
            .name
            .clone()
            .unwrap_or_else(|| format!("Plan #{}", Local::now().format("%d.%m.%Y %H:%M")));

        let assignments: Vec<(i64, u32)> = stops
            .iter()
            .flat_map(|s| s.employee_ids.iter().map(|&id| (id, s.cluster_key)))
            .collect();

        let plan = NewPlan {
            name,
            total_vehicles: solution.vehicles_used as u32,
            total_distance,
            total_duration,
            total_passengers,
            max_walking_distance: request.max_walking_distance,
            depot: request.depot,
            traffic_mode: request.traffic_mode,
            buffer_seats: request.buffer_seats,
            vehicle_priority: request.vehicle_priority,
            max_travel_time: request.max_travel_time,
            num_small,
            num_large,
            shift_id: request.shift_id,
            shift_name,
            route_type: request.route_type,
            exclude_tolls: request.exclude_tolls,
            degraded,
        };

        let saved = self.repo.save_plan(&plan, &routes, &assignments).await?;
        info!(
            "Plan {} saved: {} vehicles, {:.0} m, {} passengers{}",
            saved.id,
            saved.total_vehicles,
            saved.total_distance,
            saved.total_passengers,
            if degraded { " (degraded routing data)" } else { "" }
        );
        Ok(saved)
    }
}

/// 30 s up to 20 stops, 45 s up to 40, 60 s beyond.
fn solver_time_limit(stop_count: usize) -> Duration {
    if stop_count <= 20 {
        Duration::from_secs(30)
    } else if stop_count <= 40 {
        Duration::from_secs(45)
    } else {
        Duration::from_secs(60)
    }
}
