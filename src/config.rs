use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::Point;

/// Congestion profile applied to the duration matrix and the per-route time
/// bound before the solver runs, and to leg durations afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficMode {
    #[default]
    None,
    Morning,
    Evening,
}

impl TrafficMode {
    pub fn factor(self) -> f64 {
        match self {
            TrafficMode::None => 1.0,
            TrafficMode::Morning => 1.4,
            TrafficMode::Evening => 1.6,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrafficMode::None => "none",
            TrafficMode::Morning => "morning",
            TrafficMode::Evening => "evening",
        }
    }

    pub fn parse(s: &str) -> TrafficMode {
        match s {
            "morning" => TrafficMode::Morning,
            "evening" => TrafficMode::Evening,
            _ => TrafficMode::None,
        }
    }
}

/// Which end of the fleet gets the lower fixed cost in the solver objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehiclePriority {
    Small,
    Large,
    #[default]
    Auto,
}

impl VehiclePriority {
    pub fn as_str(self) -> &'static str {
        match self {
            VehiclePriority::Small => "small",
            VehiclePriority::Large => "large",
            VehiclePriority::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> VehiclePriority {
        match s {
            "small" => VehiclePriority::Small,
            "large" => VehiclePriority::Large,
            _ => VehiclePriority::Auto,
        }
    }
}

/// Shape of a route relative to the depot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    /// depot -> stops -> depot
    #[default]
    Ring,
    /// depot -> stops (evening outbound)
    ToHome,
    /// stops -> depot (morning inbound)
    ToDepot,
}

impl RouteType {
    pub fn as_str(self) -> &'static str {
        match self {
            RouteType::Ring => "ring",
            RouteType::ToHome => "to_home",
            RouteType::ToDepot => "to_depot",
        }
    }

    pub fn parse(s: &str) -> RouteType {
        match s {
            "to_home" => RouteType::ToHome,
            "to_depot" => RouteType::ToDepot,
            _ => RouteType::Ring,
        }
    }

    pub fn starts_at_depot(self) -> bool {
        matches!(self, RouteType::Ring | RouteType::ToHome)
    }

    pub fn ends_at_depot(self) -> bool {
        matches!(self, RouteType::Ring | RouteType::ToDepot)
    }
}

/// Everything a single plan run needs. Snapshotted onto the plan row so a
/// saved plan stays interpretable after the defaults change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanRequest {
    pub name: Option<String>,
    pub depot: Point,
    /// Clustering epsilon and snap acceptance radius, meters.
    pub max_walking_distance: u32,
    pub num_small: u32,
    pub num_large: u32,
    pub small_capacity: u32,
    pub large_capacity: u32,
    /// Seats left empty per vehicle.
    pub buffer_seats: u32,
    /// Per-route soft duration bound, minutes.
    pub max_travel_time: u32,
    pub vehicle_priority: VehiclePriority,
    pub traffic_mode: TrafficMode,
    pub exclude_tolls: bool,
    pub route_type: RouteType,
    pub shift_id: Option<i64>,
}

impl PlanRequest {
    pub fn new(depot: Point) -> Self {
        PlanRequest {
            name: None,
            depot,
            max_walking_distance: 200,
            num_small: 5,
            num_large: 5,
            small_capacity: 16,
            large_capacity: 27,
            buffer_seats: 0,
            max_travel_time: 65,
            vehicle_priority: VehiclePriority::Auto,
            traffic_mode: TrafficMode::None,
            exclude_tolls: false,
            route_type: RouteType::Ring,
            shift_id: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.depot.is_valid() {
            return Err(Error::InputInvalid(format!(
                "depot location ({}, {}) is outside WGS84 bounds",
                self.depot.lat, self.depot.lng
            )));
        }
        if !(50..=2000).contains(&self.max_walking_distance) {
            return Err(Error::InputInvalid(format!(
                "max walking distance must be between 50 and 2000 m, got {}",
                self.max_walking_distance
            )));
        }
        if self.num_small > 50 || self.num_large > 50 {
            return Err(Error::InputInvalid(
                "fleet size is limited to 50 vehicles per type".into(),
            ));
        }
        if self.num_small + self.num_large == 0 {
            return Err(Error::InputInvalid("fleet has no vehicles".into()));
        }
        if self.small_capacity == 0 || self.large_capacity == 0 {
            return Err(Error::InputInvalid("vehicle capacity must be positive".into()));
        }
        if self.buffer_seats > 5 {
            return Err(Error::InputInvalid(format!(
                "buffer seats must be between 0 and 5, got {}",
                self.buffer_seats
            )));
        }
        if !(15..=180).contains(&self.max_travel_time) {
            return Err(Error::InputInvalid(format!(
                "max travel time must be between 15 and 180 minutes, got {}",
                self.max_travel_time
            )));
        }
        Ok(())
    }
}
