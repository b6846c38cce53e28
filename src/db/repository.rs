//! Plan Repository - reads employees and shifts, persists plan snapshots.
//!
//! Every write that spans rows runs in one transaction: a failed plan save or
//! route edit leaves nothing behind.

use std::collections::HashMap;

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::config::{RouteType, TrafficMode, VehiclePriority};
use crate::domain::{Employee, NewPlan, NewRoute, Plan, PlanDetail, PlanRoute, PlanSummary, Shift, Stop};
use crate::error::{Error, Result};
use crate::geo::Point;

/// New metrics for one route, written together with the plan totals.
#[derive(Debug, Clone)]
pub struct RouteUpdate {
    pub distance: f64,
    pub duration: f64,
    pub polyline: Vec<Point>,
    pub stops: Vec<Stop>,
    pub passengers: u32,
}

/// Plan aggregates recomputed from its routes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanTotals {
    pub total_distance: f64,
    pub total_duration: f64,
    pub total_passengers: u32,
}

#[derive(Clone)]
pub struct PlanRepository {
    pool: SqlitePool,
}

impl PlanRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PlanRepository { pool }
    }

    pub async fn load_employees(&self, shift_id: Option<i64>) -> Result<Vec<Employee>> {
        let rows = match shift_id {
            Some(shift) => {
                sqlx::query(
                    "SELECT id, name, home_lat, home_lng, address, shift_id \
                     FROM employees WHERE shift_id = ?",
                )
                .bind(shift)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, name, home_lat, home_lng, address, shift_id FROM employees",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(employee_from_row).collect()
    }

    pub async fn load_employee(&self, employee_id: i64) -> Result<Employee> {
        let row = sqlx::query(
            "SELECT id, name, home_lat, home_lng, address, shift_id FROM employees WHERE id = ?",
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => employee_from_row(&row),
            None => Err(Error::EmployeeNotFound(employee_id)),
        }
    }

    pub async fn load_employees_by_ids(&self, ids: &[i64]) -> Result<HashMap<i64, Employee>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, home_lat, home_lng, address, shift_id \
             FROM employees WHERE id IN ({placeholders})"
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&self.pool).await?;

        let mut employees = HashMap::with_capacity(rows.len());
        for row in &rows {
            let employee = employee_from_row(row)?;
            employees.insert(employee.id, employee);
        }
        Ok(employees)
    }

    pub async fn load_shift(&self, shift_id: i64) -> Result<Shift> {
        let row = sqlx::query("SELECT id, name, color, start_time, end_time FROM shifts WHERE id = ?")
            .bind(shift_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Shift {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                color: row.try_get("color")?,
                start_time: row.try_get("start_time")?,
                end_time: row.try_get("end_time")?,
            }),
            None => Err(Error::ShiftNotFound(shift_id)),
        }
    }

    /// Persist a plan with its routes and the employee stop assignments in a
    /// single transaction.
    pub async fn save_plan(
        &self,
        plan: &NewPlan,
        routes: &[NewRoute],
        assignments: &[(i64, u32)],
    ) -> Result<Plan> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "INSERT INTO plans \
             (name, total_vehicles, total_distance, total_duration, total_passengers, \
              max_walking_distance, depot_lat, depot_lng, traffic_mode, buffer_seats, \
              vehicle_priority, max_travel_time, num_small, num_large, shift_id, shift_name, \
              route_type, exclude_tolls, degraded) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             RETURNING id, created_at",
        )
        .bind(&plan.name)
        .bind(plan.total_vehicles as i64)
        .bind(plan.total_distance)
        .bind(plan.total_duration)
        .bind(plan.total_passengers as i64)
        .bind(plan.max_walking_distance as i64)
        .bind(plan.depot.lat)
        .bind(plan.depot.lng)
        .bind(plan.traffic_mode.as_str())
        .bind(plan.buffer_seats as i64)
        .bind(plan.vehicle_priority.as_str())
        .bind(plan.max_travel_time as i64)
        .bind(plan.num_small as i64)
        .bind(plan.num_large as i64)
        .bind(plan.shift_id)
        .bind(&plan.shift_name)
        .bind(plan.route_type.as_str())
        .bind(plan.exclude_tolls as i64)
        .bind(plan.degraded as i64)
        .fetch_one(&mut *tx)
        .await?;

        let plan_id: i64 = row.try_get("id")?;
        let created_at: String = row.try_get("created_at")?;

        for route in routes {
            sqlx::query(
                "INSERT INTO plan_routes \
                 (plan_id, vehicle_id, vehicle_type, capacity, passengers, distance, duration, \
                  polyline, stops) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(plan_id)
            .bind(route.vehicle_id as i64)
            .bind(&route.vehicle_type)
            .bind(route.capacity as i64)
            .bind(route.passengers as i64)
            .bind(route.distance)
            .bind(route.duration)
            .bind(serde_json::to_string(&route.polyline)?)
            .bind(serde_json::to_string(&route.stops)?)
            .execute(&mut *tx)
            .await?;
        }

        for (employee_id, stop_key) in assignments {
            sqlx::query("UPDATE employees SET assigned_stop_id = ? WHERE id = ?")
                .bind(*stop_key as i64)
                .bind(*employee_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!("Saved plan {plan_id} with {} routes", routes.len());

        Ok(Plan {
            id: plan_id,
            name: plan.name.clone(),
            total_vehicles: plan.total_vehicles,
            total_distance: plan.total_distance,
            total_duration: plan.total_duration,
            total_passengers: plan.total_passengers,
            max_walking_distance: plan.max_walking_distance,
            depot: plan.depot,
            traffic_mode: plan.traffic_mode,
            buffer_seats: plan.buffer_seats,
            vehicle_priority: plan.vehicle_priority,
            max_travel_time: plan.max_travel_time,
            num_small: plan.num_small,
            num_large: plan.num_large,
            shift_id: plan.shift_id,
            shift_name: plan.shift_name.clone(),
            route_type: plan.route_type,
            exclude_tolls: plan.exclude_tolls,
            degraded: plan.degraded,
            created_at,
        })
    }

    pub async fn fetch_plan(&self, plan_id: i64) -> Result<Plan> {
        let row = sqlx::query("SELECT * FROM plans WHERE id = ?")
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => plan_from_row(&row),
            None => Err(Error::PlanNotFound(plan_id)),
        }
    }

    pub async fn fetch_route(&self, plan_id: i64, route_id: i64) -> Result<PlanRoute> {
        let row = sqlx::query("SELECT * FROM plan_routes WHERE id = ? AND plan_id = ?")
            .bind(route_id)
            .bind(plan_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => route_from_row(&row),
            None => Err(Error::RouteNotFound(route_id)),
        }
    }

    pub async fn fetch_plan_detail(&self, plan_id: i64) -> Result<PlanDetail> {
        let plan = self.fetch_plan(plan_id).await?;
        let rows = sqlx::query("SELECT * FROM plan_routes WHERE plan_id = ? ORDER BY vehicle_id")
            .bind(plan_id)
            .fetch_all(&self.pool)
            .await?;
        let routes = rows.iter().map(route_from_row).collect::<Result<Vec<_>>>()?;
        Ok(PlanDetail { plan, routes })
    }

    pub async fn list_plans(&self, limit: i64, offset: i64) -> Result<Vec<PlanSummary>> {
        let rows = sqlx::query(
            "SELECT p.id, p.name, p.total_vehicles, p.total_distance, p.total_duration, \
                    p.total_passengers, p.traffic_mode, p.vehicle_priority, p.max_travel_time, \
                    p.max_walking_distance, p.shift_id, p.shift_name, p.degraded, p.created_at, \
                    COUNT(r.id) AS route_count \
             FROM plans p LEFT JOIN plan_routes r ON r.plan_id = p.id \
             GROUP BY p.id \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(PlanSummary {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    total_vehicles: row.try_get::<i64, _>("total_vehicles")? as u32,
                    total_distance: row.try_get("total_distance")?,
                    total_duration: row.try_get("total_duration")?,
                    total_passengers: row.try_get::<i64, _>("total_passengers")? as u32,
                    route_count: row.try_get::<i64, _>("route_count")? as u32,
                    traffic_mode: TrafficMode::parse(&row.try_get::<String, _>("traffic_mode")?),
                    vehicle_priority: VehiclePriority::parse(
                        &row.try_get::<String, _>("vehicle_priority")?,
                    ),
                    max_travel_time: row.try_get::<i64, _>("max_travel_time")? as u32,
                    max_walking_distance: row.try_get::<i64, _>("max_walking_distance")? as u32,
                    shift_id: row.try_get("shift_id")?,
                    shift_name: row.try_get("shift_name")?,
                    degraded: row.try_get::<i64, _>("degraded")? != 0,
                    created_at: row.try_get("created_at")?,
                })
            })
            .collect()
    }

    /// Delete a plan; its routes go with it via the cascade.
    pub async fn delete_plan(&self, plan_id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(plan_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::PlanNotFound(plan_id));
        }
        info!("Deleted plan {plan_id}");
        Ok(())
    }

    /// Commit one route edit: update the route row, then recompute the plan
    /// totals from the sums over its routes. One transaction.
    pub async fn update_route(
        &self,
        plan_id: i64,
        route_id: i64,
        update: &RouteUpdate,
    ) -> Result<PlanTotals> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE plan_routes \
             SET distance = ?, duration = ?, polyline = ?, stops = ?, passengers = ? \
             WHERE id = ? AND plan_id = ?",
        )
        .bind(update.distance)
        .bind(update.duration)
        .bind(serde_json::to_string(&update.polyline)?)
        .bind(serde_json::to_string(&update.stops)?)
        .bind(update.passengers as i64)
        .bind(route_id)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::RouteNotFound(route_id));
        }

        let row = sqlx::query(
            "SELECT COALESCE(SUM(distance), 0.0) AS total_distance, \
                    COALESCE(SUM(duration), 0.0) AS total_duration, \
                    COALESCE(SUM(passengers), 0) AS total_passengers \
             FROM plan_routes WHERE plan_id = ?",
        )
        .bind(plan_id)
        .fetch_one(&mut *tx)
        .await?;
        let totals = PlanTotals {
            total_distance: row.try_get("total_distance")?,
            total_duration: row.try_get("total_duration")?,
            total_passengers: row.try_get::<i64, _>("total_passengers")? as u32,
        };

        sqlx::query(
            "UPDATE plans SET total_distance = ?, total_duration = ?, total_passengers = ? \
             WHERE id = ?",
        )
        .bind(totals.total_distance)
        .bind(totals.total_duration)
        .bind(totals.total_passengers as i64)
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(totals)
    }
}

fn employee_from_row(row: &SqliteRow) -> Result<Employee> {
    Ok(Employee {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        home: Point::new(row.try_get("home_lat")?, row.try_get("home_lng")?),
        address: row.try_get("address")?,
        shift_id: row.try_get("shift_id")?,
    })
}

fn plan_from_row(row: &SqliteRow) -> Result<Plan> {
    Ok(Plan {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        total_vehicles: row.try_get::<i64, _>("total_vehicles")? as u32,
        total_distance: row.try_get("total_distance")?,
        total_duration: row.try_get("total_duration")?,
        total_passengers: row.try_get::<i64, _>("total_passengers")? as u32,
        max_walking_distance: row.try_get::<i64, _>("max_walking_distance")? as u32,
        depot: Point::new(row.try_get("depot_lat")?, row.try_get("depot_lng")?),
        traffic_mode: TrafficMode::parse(&row.try_get::<String, _>("traffic_mode")?),
        buffer_seats: row.try_get::<i64, _>("buffer_seats")? as u32,
        vehicle_priority: VehiclePriority::parse(&row.try_get::<String, _>("vehicle_priority")?),
        max_travel_time: row.try_get::<i64, _>("max_travel_time")? as u32,
        num_small: row.try_get::<i64, _>("num_small")? as u32,
        num_large: row.try_get::<i64, _>("num_large")? as u32,
        shift_id: row.try_get("shift_id")?,
        shift_name: row.try_get("shift_name")?,
        route_type: RouteType::parse(&row.try_get::<String, _>("route_type")?),
        exclude_tolls: row.try_get::<i64, _>("exclude_tolls")? != 0,
        degraded: row.try_get::<i64, _>("degraded")? != 0,
        created_at: row.try_get("created_at")?,
    })
}

fn route_from_row(row: &SqliteRow) -> Result<PlanRoute> {
    let polyline: Vec<Point> = serde_json::from_str(&row.try_get::<String, _>("polyline")?)?;
    let stops: Vec<Stop> = serde_json::from_str(&row.try_get::<String, _>("stops")?)?;
    Ok(PlanRoute {
        id: row.try_get("id")?,
        plan_id: row.try_get("plan_id")?,
        vehicle_id: row.try_get::<i64, _>("vehicle_id")? as u32,
        vehicle_type: row.try_get("vehicle_type")?,
        capacity: row.try_get::<i64, _>("capacity")? as u32,
        passengers: row.try_get::<i64, _>("passengers")? as u32,
        distance: row.try_get("distance")?,
        duration: row.try_get("duration")?,
        polyline,
        stops,
    })
}
