use crate::config::{RouteType, TrafficMode, VehiclePriority};
use crate::domain::stop::Stop;
use crate::geo::Point;

/// Insert payload for a plan row. Totals are already the sums over the
/// enriched routes; the fleet counts are the (possibly escalated) final ones.
#[derive(Debug, Clone)]
pub struct NewPlan {
    pub name: String,
    pub total_vehicles: u32,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_passengers: u32,
    pub max_walking_distance: u32,
    pub depot: Point,
    pub traffic_mode: TrafficMode,
    pub buffer_seats: u32,
    pub vehicle_priority: VehiclePriority,
    pub max_travel_time: u32,
    pub num_small: u32,
    pub num_large: u32,
    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,
    pub route_type: RouteType,
    pub exclude_tolls: bool,
    /// Set when any routing-engine result came from the straight-line
    /// fallback or a snap failed.
    pub degraded: bool,
}

/// Insert payload for one route row. `capacity` is the effective capacity
/// (buffer seats already subtracted).
#[derive(Debug, Clone)]
pub struct NewRoute {
    pub vehicle_id: u32,
    pub vehicle_type: String,
    pub capacity: u32,
    pub passengers: u32,
    pub distance: f64,
    pub duration: f64,
    pub polyline: Vec<Point>,
    pub stops: Vec<Stop>,
}

/// A persisted plan row.
#[derive(Debug, Clone)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub total_vehicles: u32,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_passengers: u32,
    pub max_walking_distance: u32,
    pub depot: Point,
    pub traffic_mode: TrafficMode,
    pub buffer_seats: u32,
    pub vehicle_priority: VehiclePriority,
    pub max_travel_time: u32,
    pub num_small: u32,
    pub num_large: u32,
    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,
    pub route_type: RouteType,
    pub exclude_tolls: bool,
    pub degraded: bool,
    pub created_at: String,
}

/// A persisted route row with its JSON columns parsed.
#[derive(Debug, Clone)]
pub struct PlanRoute {
    pub id: i64,
    pub plan_id: i64,
    pub vehicle_id: u32,
    pub vehicle_type: String,
    pub capacity: u32,
    pub passengers: u32,
    pub distance: f64,
    pub duration: f64,
    pub polyline: Vec<Point>,
    pub stops: Vec<Stop>,
}

/// List view of a plan.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub id: i64,
    pub name: String,
    pub total_vehicles: u32,
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_passengers: u32,
    pub route_count: u32,
    pub traffic_mode: TrafficMode,
    pub vehicle_priority: VehiclePriority,
    pub max_travel_time: u32,
    pub max_walking_distance: u32,
    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,
    pub degraded: bool,
    pub created_at: String,
}

/// A plan with all of its routes.
#[derive(Debug, Clone)]
pub struct PlanDetail {
    pub plan: Plan,
    pub routes: Vec<PlanRoute>,
}
