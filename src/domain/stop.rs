use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::geo::Point;

/// Walk from one member's home to the stop position, rounded meters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalkDistance {
    pub employee_id: i64,
    pub walking_distance: f64,
}

/// A pickup/dropoff point aggregating one or more employees.
///
/// Produced transiently by clustering, then snapped to a road, then persisted
/// denormalized inside the route's `stops` JSON. Member names and walk
/// distances are copied in at plan time so later employee edits do not
/// rewrite history. An outlier employee becomes an `individual` stop with a
/// single member and zero walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stop {
    pub cluster_key: u32,
    pub location: Point,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_location: Option<Point>,
    #[serde(default)]
    pub road_name: String,
    pub employee_ids: Vec<i64>,
    #[serde(default)]
    pub employee_names: Vec<String>,
    #[serde(default)]
    pub walking_distances: Vec<WalkDistance>,
    pub max_walking_distance: f64,
    #[serde(default)]
    pub individual: bool,
    // Remaining-distance fields, filled during geometry enrichment. Which
    // pair is present depends on the plan's route type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_to_depot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_to_depot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_from_depot: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_from_depot: Option<f64>,
}

impl Stop {
    pub fn new(cluster_key: u32, location: Point) -> Self {
        Stop {
            cluster_key,
            location,
            original_location: None,
            road_name: String::new(),
            employee_ids: Vec::new(),
            employee_names: Vec::new(),
            walking_distances: Vec::new(),
            max_walking_distance: 0.0,
            individual: false,
            distance_to_depot: None,
            duration_to_depot: None,
            distance_from_depot: None,
            duration_from_depot: None,
        }
    }

    pub fn passengers(&self) -> u32 {
        self.employee_ids.len() as u32
    }

    pub fn contains_employee(&self, employee_id: i64) -> bool {
        self.employee_ids.contains(&employee_id)
    }

    /// Recompute every member's walk against the current stop position.
    /// Members whose home is unknown keep no walk entry.
    pub fn recompute_walks(&mut self, homes: &HashMap<i64, Point>) {
        let mut walks = Vec::with_capacity(self.employee_ids.len());
        let mut max_walk: f64 = 0.0;
        for &id in &self.employee_ids {
            if let Some(home) = homes.get(&id) {
                let dist = home.distance_m(self.location).round();
                max_walk = max_walk.max(dist);
                walks.push(WalkDistance {
                    employee_id: id,
                    walking_distance: dist,
                });
            }
        }
        self.walking_distances = walks;
        self.max_walking_distance = max_walk;
    }

    /// Drop one member (id, name, walk entry). Returns false if absent.
    pub fn remove_employee(&mut self, employee_id: i64) -> bool {
        let Some(pos) = self.employee_ids.iter().position(|&id| id == employee_id) else {
            return false;
        };
        self.employee_ids.remove(pos);
        if pos < self.employee_names.len() {
            self.employee_names.remove(pos);
        }
        self.walking_distances.retain(|w| w.employee_id != employee_id);
        self.max_walking_distance = self
            .walking_distances
            .iter()
            .map(|w| w.walking_distance)
            .fold(0.0, f64::max);
        true
    }
}
