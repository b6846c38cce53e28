//! Plan Editor - incremental edits on a persisted plan.
//!
//! Every operation exists in preview form (compute the diff, write nothing)
//! and commit form (update the route row and the plan totals in one
//! transaction). The route is always re-routed through the engine with the
//! plan's own route type and traffic mode.

use std::collections::HashMap;

use tracing::info;

use crate::db::{PlanRepository, PlanTotals, RouteUpdate};
use crate::domain::{Plan, PlanRoute, Stop, WalkDistance};
use crate::error::{Error, Result};
use crate::geo::Point;
use crate::osrm::RoadNetwork;
use crate::planner::geometry;

/// A stop of a route is within reach of a new member's home at this radius.
const ATTACH_RADIUS_M: f64 = 400.0;

/// Road-name marker for stops placed by hand rather than by snapping.
const MANUAL_ROAD_NAME: &str = "manually adjusted";

/// Relocation of one stop of a route.
#[derive(Debug, Clone, Copy)]
pub struct StopMove {
    pub stop_index: usize,
    pub location: Point,
}

/// Outcome of an edit. Previews carry `committed = false` and no totals;
/// commits carry the recomputed plan aggregates.
#[derive(Debug, Clone)]
pub struct RouteEdit {
    pub plan_id: i64,
    pub route_id: i64,
    pub old_distance: f64,
    pub new_distance: f64,
    pub distance_diff: f64,
    pub distance_diff_percent: f64,
    pub old_duration: f64,
    pub new_duration: f64,
    pub duration_diff: f64,
    pub duration_diff_percent: f64,
    pub passengers: u32,
    pub polyline: Vec<Point>,
    pub stops: Vec<Stop>,
    pub committed: bool,
    pub plan_totals: Option<PlanTotals>,
}

pub struct PlanEditor<R> {
    road: R,
    repo: PlanRepository,
}

impl<R: RoadNetwork> PlanEditor<R> {
    pub fn new(road: R, repo: PlanRepository) -> Self {
        PlanEditor { road, repo }
    }

    /// Relocate one or more stops and recompute their members' walks.
    pub async fn move_stops(
        &self,
        plan_id: i64,
        route_id: i64,
        moves: &[StopMove],
        commit: bool,
    ) -> Result<RouteEdit> {
        let (plan, route) = self.load(plan_id, route_id).await?;
        let mut stops = route.stops.clone();

        let mut touched_members = Vec::new();
        for mv in moves {
            if !mv.location.is_valid() {
                return Err(Error::InputInvalid(format!(
                    "target location ({}, {}) is outside WGS84 bounds",
                    mv.location.lat, mv.location.lng
                )));
            }
            let stop = stops.get_mut(mv.stop_index).ok_or_else(|| {
                Error::InputInvalid(format!("route has no stop at index {}", mv.stop_index))
            })?;
            stop.original_location = Some(stop.location);
            stop.location = mv.location;
            stop.road_name = MANUAL_ROAD_NAME.to_string();
            touched_members.extend(stop.employee_ids.iter().copied());
        }

        let homes = self.homes(&touched_members).await?;
        for mv in moves {
            stops[mv.stop_index].recompute_walks(&homes);
        }

        self.recompute(&plan, &route, stops, commit).await
    }

    /// Rotate the stop sequence so `first_stop_index` is picked up first.
    pub async fn reorder_stops(
        &self,
        plan_id: i64,
        route_id: i64,
        first_stop_index: usize,
        commit: bool,
    ) -> Result<RouteEdit> {
        let (plan, route) = self.load(plan_id, route_id).await?;
        let mut stops = route.stops.clone();
        if first_stop_index >= stops.len() {
            return Err(Error::InputInvalid(format!(
                "route has no stop at index {first_stop_index}"
            )));
        }
        stops.rotate_left(first_stop_index);
        self.recompute(&plan, &route, stops, commit).await
    }

    /// Put an employee on this route: onto a stop within 400 m of home, or
    /// onto a new individual stop appended at the end.
    pub async fn add_employee(
        &self,
        plan_id: i64,
        route_id: i64,
        employee_id: i64,
        commit: bool,
    ) -> Result<RouteEdit> {
        let (plan, route) = self.load(plan_id, route_id).await?;
        let employee = self.repo.load_employee(employee_id).await?;

        if route.stops.iter().any(|s| s.contains_employee(employee_id)) {
            return Err(Error::EditorConflict(format!(
                "employee {} is already on this route",
                employee.name
            )));
        }
        if route.passengers + 1 > route.capacity {
            return Err(Error::EditorConflict(format!(
                "route is at capacity ({} seats)",
                route.capacity
            )));
        }

        let mut stops = route.stops.clone();
        let nearest = stops
            .iter_mut()
            .map(|s| (employee.home.distance_m(s.location), s))
            .filter(|(d, _)| *d <= ATTACH_RADIUS_M)
            .min_by(|a, b| a.0.total_cmp(&b.0));

        match nearest {
            Some((walk, stop)) => {
                let walk = walk.round();
                stop.employee_ids.push(employee.id);
                stop.employee_names.push(employee.name.clone());
                stop.walking_distances.push(WalkDistance {
                    employee_id: employee.id,
                    walking_distance: walk,
                });
                stop.max_walking_distance = stop.max_walking_distance.max(walk);
                stop.individual = false;
            }
            None => {
                let key = stops
                    .iter()
                    .map(|s| s.cluster_key + 1)
                    .max()
                    .unwrap_or(0)
                    .max(1000);
                let mut stop = Stop::new(key, employee.home);
                stop.employee_ids.push(employee.id);
                stop.employee_names.push(employee.name.clone());
                stop.walking_distances.push(WalkDistance {
                    employee_id: employee.id,
                    walking_distance: 0.0,
                });
                stop.individual = true;
                stops.push(stop);
            }
        }

        self.recompute(&plan, &route, stops, commit).await
    }

    /// Take an employee off this route, dropping their stop if it empties.
    pub async fn remove_employee(
        &self,
        plan_id: i64,
        route_id: i64,
        employee_id: i64,
        commit: bool,
    ) -> Result<RouteEdit> {
        let (plan, route) = self.load(plan_id, route_id).await?;
        let mut stops = route.stops.clone();

        let position = stops
            .iter()
            .position(|s| s.contains_employee(employee_id))
            .ok_or_else(|| {
                Error::EditorConflict(format!("employee {employee_id} is not on this route"))
            })?;

        stops[position].remove_employee(employee_id);
        if stops[position].employee_ids.is_empty() {
            stops.remove(position);
        }

        self.recompute(&plan, &route, stops, commit).await
    }

    async fn load(&self, plan_id: i64, route_id: i64) -> Result<(Plan, PlanRoute)> {
        let plan = self.repo.fetch_plan(plan_id).await?;
        let route = self.repo.fetch_route(plan_id, route_id).await?;
        Ok((plan, route))
    }

    async fn homes(&self, employee_ids: &[i64]) -> Result<HashMap<i64, Point>> {
        Ok(self
            .repo
            .load_employees_by_ids(employee_ids)
            .await?
            .into_iter()
            .map(|(id, e)| (id, e.home))
            .collect())
    }

    /// Re-route the edited stop sequence and build the diff; write it out
    /// when committing.
    async fn recompute(
        &self,
        plan: &Plan,
        route: &PlanRoute,
        mut stops: Vec<Stop>,
        commit: bool,
    ) -> Result<RouteEdit> {
        let traffic_factor = plan.traffic_mode.factor();

        let (new_distance, new_duration, polyline) = if stops.is_empty() {
            (0.0, 0.0, Vec::new())
        } else {
            let coords = geometry::route_coords(plan.route_type, plan.depot, &stops);
            let path = self.road.route(&coords, plan.exclude_tolls).await;
            geometry::apply_leg_metrics(plan.route_type, &mut stops, &path.legs, traffic_factor);
            let mut polyline = path.polyline;
            geometry::ensure_depot_endpoints(plan.route_type, plan.depot, &mut polyline);
            (path.distance, path.duration * traffic_factor, polyline)
        };

        let passengers: u32 = stops.iter().map(|s| s.passengers()).sum();

        let mut edit = RouteEdit {
            plan_id: plan.id,
            route_id: route.id,
            old_distance: route.distance,
            new_distance,
            distance_diff: new_distance - route.distance,
            distance_diff_percent: diff_percent(route.distance, new_distance),
            old_duration: route.duration,
            new_duration,
            duration_diff: new_duration - route.duration,
            duration_diff_percent: diff_percent(route.duration, new_duration),
            passengers,
            polyline,
            stops,
            committed: false,
            plan_totals: None,
        };

        if commit {
            let totals = self
                .repo
                .update_route(
                    plan.id,
                    route.id,
                    &RouteUpdate {
                        distance: edit.new_distance,
                        duration: edit.new_duration,
                        polyline: edit.polyline.clone(),
                        stops: edit.stops.clone(),
                        passengers: edit.passengers,
                    },
                )
                .await?;
            info!(
                "Route {} updated: {:.1} km, {:.0} min",
                route.id,
                edit.new_distance / 1000.0,
                edit.new_duration / 60.0
            );
            edit.committed = true;
            edit.plan_totals = Some(totals);
        }

        Ok(edit)
    }
}

fn diff_percent(old: f64, new: f64) -> f64 {
    if old == 0.0 {
        0.0
    } else {
        (new - old) / old * 100.0
    }
}
