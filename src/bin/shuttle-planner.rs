use std::env;
use std::error::Error;

use colored::*;
use dotenv::dotenv;
use itertools::Itertools;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use shuttleplan::config::{PlanRequest, RouteType, TrafficMode, VehiclePriority};
use shuttleplan::db::{self, PlanRepository};
use shuttleplan::geo::Point;
use shuttleplan::osrm::OsrmClient;
use shuttleplan::Planner;

/// Kadikoy, Istanbul - replace with your depot via DEPOT_LAT / DEPOT_LNG.
const DEFAULT_DEPOT: (f64, f64) = (40.9901, 29.0254);

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(
            fmt::layer()
                .with_span_events(fmt::format::FmtSpan::NEW | fmt::format::FmtSpan::CLOSE)
                .compact(),
        )
        .init();

    dotenv().ok();

    let pool = db::db_connection().await?;
    let repo = PlanRepository::new(pool);
    let road = OsrmClient::from_env();
    let planner = Planner::new(road, repo.clone());

    let depot = Point::new(
        env_f64("DEPOT_LAT", DEFAULT_DEPOT.0),
        env_f64("DEPOT_LNG", DEFAULT_DEPOT.1),
    );

    let mut request = PlanRequest::new(depot);
    request.max_walking_distance = env_u32("MAX_WALKING_DISTANCE", request.max_walking_distance);
    request.num_small = env_u32("NUM_SMALL", request.num_small);
    request.num_large = env_u32("NUM_LARGE", request.num_large);
    request.buffer_seats = env_u32("BUFFER_SEATS", request.buffer_seats);
    request.max_travel_time = env_u32("MAX_TRAVEL_TIME", request.max_travel_time);
    request.vehicle_priority =
        VehiclePriority::parse(&env::var("VEHICLE_PRIORITY").unwrap_or_default());
    request.traffic_mode = TrafficMode::parse(&env::var("TRAFFIC_MODE").unwrap_or_default());
    request.route_type = RouteType::parse(&env::var("ROUTE_TYPE").unwrap_or_default());
    request.exclude_tolls = env::var("EXCLUDE_TOLLS").is_ok_and(|v| v == "1" || v == "true");
    request.shift_id = env::var("SHIFT_ID").ok().and_then(|v| v.parse().ok());

    info!(
        "Creating plan: depot ({}, {}), fleet {}x{} + {}x{}",
        depot.lat,
        depot.lng,
        request.num_small,
        request.small_capacity,
        request.num_large,
        request.large_capacity
    );

    let plan = planner.create_plan(&request).await?;

    println!(
        "{}",
        format!(
            "Plan '{}' saved (id {}): {} vehicles, {:.1} km, {:.0} min, {} passengers",
            plan.name,
            plan.id,
            plan.total_vehicles,
            plan.total_distance / 1000.0,
            plan.total_duration / 60.0,
            plan.total_passengers
        )
        .green()
    );
    if plan.degraded {
        println!("{}", "Computed with degraded (straight-line) routing data".yellow());
    }

    let detail = repo.fetch_plan_detail(plan.id).await?;
    for route in &detail.routes {
        println!(
            "  Route {} ({}): {} passengers / {} seats, {:.1} km, {:.0} min",
            route.vehicle_id,
            route.vehicle_type,
            route.passengers,
            route.capacity,
            route.distance / 1000.0,
            route.duration / 60.0
        );
        for stop in &route.stops {
            let members = stop.employee_names.iter().join(", ");
            println!(
                "    - stop {} ({:.5}, {:.5}) {} [{}]",
                stop.cluster_key,
                stop.location.lat,
                stop.location.lng,
                if stop.road_name.is_empty() {
                    "unnamed road".to_string()
                } else {
                    stop.road_name.clone()
                },
                members
            );
        }
    }

    let recent = repo.list_plans(10, 0).await?;
    println!("\n{} saved plan(s):", recent.len());
    for summary in recent {
        println!(
            "  #{} {} - {} vehicles, {:.1} km ({})",
            summary.id,
            summary.name,
            summary.total_vehicles,
            summary.total_distance / 1000.0,
            summary.created_at
        );
    }

    Ok(())
}

fn env_f64(key: &str, default: f64) -> f64 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
