//! End-to-end pipeline scenarios over an in-memory database and a
//! deterministic in-process road network.

use sqlx::SqlitePool;

use shuttleplan::config::{PlanRequest, RouteType, VehiclePriority};
use shuttleplan::db::{connect, PlanRepository};
use shuttleplan::domain::PlanDetail;
use shuttleplan::error::Error;
use shuttleplan::geo::Point;
use shuttleplan::osrm::{fallback, DistanceTable, RoadNetwork, RoadPath, SnappedPoint, StraightLineNetwork};
use shuttleplan::planner::{PlanEditor, StopMove};
use shuttleplan::Planner;

async fn test_pool() -> SqlitePool {
    connect("sqlite::memory:").await.unwrap()
}

async fn seed_employee(pool: &SqlitePool, id: i64, lat: f64, lng: f64) {
    sqlx::query("INSERT INTO employees (id, name, home_lat, home_lng) VALUES (?, ?, ?, ?)")
        .bind(id)
        .bind(format!("Employee {id}"))
        .bind(lat)
        .bind(lng)
        .execute(pool)
        .await
        .unwrap();
}

fn planner(pool: &SqlitePool) -> Planner<StraightLineNetwork> {
    Planner::new(StraightLineNetwork, PlanRepository::new(pool.clone()))
}

fn editor(pool: &SqlitePool) -> PlanEditor<StraightLineNetwork> {
    PlanEditor::new(StraightLineNetwork, PlanRepository::new(pool.clone()))
}

fn assert_totals_match_routes(detail: &PlanDetail) {
    let distance: f64 = detail.routes.iter().map(|r| r.distance).sum();
    let duration: f64 = detail.routes.iter().map(|r| r.duration).sum();
    let passengers: u32 = detail.routes.iter().map(|r| r.passengers).sum();
    assert!((detail.plan.total_distance - distance).abs() <= 1.0);
    assert!((detail.plan.total_duration - duration).abs() <= 1.0);
    assert_eq!(detail.plan.total_passengers, passengers);
}

/// Three close homes, one vehicle, ring route: a single stop carrying
/// everyone, polyline anchored on the depot at both ends.
#[tokio::test]
async fn three_neighbours_share_one_route() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.0005, 29.0005).await;
    seed_employee(&pool, 3, 41.0010, 29.0000).await;

    let depot = Point::new(41.00, 29.05);
    let mut request = PlanRequest::new(depot);
    request.num_small = 1;
    request.num_large = 0;

    let plan = planner(&pool).create_plan(&request).await.unwrap();
    assert_eq!(plan.total_vehicles, 1);
    assert_eq!(plan.total_passengers, 3);

    let detail = PlanRepository::new(pool.clone())
        .fetch_plan_detail(plan.id)
        .await
        .unwrap();
    assert_eq!(detail.routes.len(), 1);

    let route = &detail.routes[0];
    assert_eq!(route.passengers, 3);
    assert_eq!(route.stops.len(), 1);
    let mut members = route.stops[0].employee_ids.clone();
    members.sort_unstable();
    assert_eq!(members, vec![1, 2, 3]);
    assert!(route.stops[0].max_walking_distance <= 200.0);

    assert_eq!(route.polyline.first(), Some(&depot));
    assert_eq!(route.polyline.last(), Some(&depot));

    assert_totals_match_routes(&detail);
}

/// Four tight clusters of ten. Stop integrality makes two vehicles
/// impossible (a 27-seater holds two stops, a 16-seater one), so the
/// cheapest cover is three; capacity and coverage must hold throughout.
#[tokio::test]
async fn four_clusters_pack_into_minimal_fleet() {
    let pool = test_pool().await;
    let centers = [
        (41.000, 29.000),
        (41.020, 29.000),
        (41.000, 29.030),
        (41.020, 29.030),
    ];
    for (g, &(lat, lng)) in centers.iter().enumerate() {
        for i in 0..10 {
            seed_employee(&pool, (g * 10 + i + 1) as i64, lat + i as f64 * 0.0001, lng).await;
        }
    }

    let mut request = PlanRequest::new(Point::new(41.010, 29.015));
    request.max_walking_distance = 150;
    request.num_small = 3;
    request.num_large = 1;
    request.vehicle_priority = VehiclePriority::Auto;

    let plan = planner(&pool).create_plan(&request).await.unwrap();
    assert_eq!(plan.total_passengers, 40);
    assert!(plan.total_vehicles <= 3, "expected at most 3 vehicles, got {}", plan.total_vehicles);

    let detail = PlanRepository::new(pool.clone())
        .fetch_plan_detail(plan.id)
        .await
        .unwrap();

    let total_stops: usize = detail.routes.iter().map(|r| r.stops.len()).sum();
    assert_eq!(total_stops, 4);

    for route in &detail.routes {
        assert!(route.passengers <= route.capacity, "capacity violated");
    }

    // Coverage: every employee appears exactly once across all routes.
    let mut all_members: Vec<i64> = detail
        .routes
        .iter()
        .flat_map(|r| r.stops.iter().flat_map(|s| s.employee_ids.clone()))
        .collect();
    all_members.sort_unstable();
    assert_eq!(all_members, (1..=40).collect::<Vec<i64>>());

    assert_totals_match_routes(&detail);
}

/// Ten homes five kilometers apart: everyone is an outlier and rides from
/// their own door.
#[tokio::test]
async fn outliers_become_individual_stops() {
    let pool = test_pool().await;
    for i in 0..10 {
        seed_employee(&pool, i + 1, 41.0 + i as f64 * 0.045, 29.0).await;
    }

    let mut request = PlanRequest::new(Point::new(41.0, 29.1));
    request.max_travel_time = 180;

    let plan = planner(&pool).create_plan(&request).await.unwrap();
    let detail = PlanRepository::new(pool.clone())
        .fetch_plan_detail(plan.id)
        .await
        .unwrap();

    let stops: Vec<_> = detail.routes.iter().flat_map(|r| r.stops.iter()).collect();
    assert_eq!(stops.len(), 10);
    assert!(stops.iter().all(|s| s.individual));
    assert!(stops.iter().all(|s| s.max_walking_distance == 0.0));
}

/// A 15-minute bound against clusters a dozen kilometers out is hopeless:
/// after the fleet escalations the run must fail and persist nothing.
#[tokio::test]
async fn hopeless_time_budget_is_infeasible() {
    let pool = test_pool().await;
    let centers = [(41.110, 29.000), (41.130, 29.000), (41.110, 29.030), (41.130, 29.030)];
    for (g, &(lat, lng)) in centers.iter().enumerate() {
        for i in 0..10 {
            seed_employee(&pool, (g * 10 + i + 1) as i64, lat + i as f64 * 0.0001, lng).await;
        }
    }

    let mut request = PlanRequest::new(Point::new(41.000, 29.015));
    request.max_walking_distance = 150;
    request.num_small = 3;
    request.num_large = 1;
    request.max_travel_time = 15;

    let result = planner(&pool).create_plan(&request).await;
    assert!(matches!(
        result,
        Err(Error::TimeConstraintInfeasible { max_travel_time: 15 })
    ));

    let plans = PlanRepository::new(pool.clone()).list_plans(10, 0).await.unwrap();
    assert!(plans.is_empty(), "no plan may be persisted on failure");
}

/// Moving a stop 300 m sideways changes the route metrics, refreshes the
/// polyline and reflows the plan totals; membership stays put.
#[tokio::test]
async fn moving_a_stop_updates_route_and_totals() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.0005, 29.0005).await;
    seed_employee(&pool, 3, 41.0010, 29.0000).await;

    let mut request = PlanRequest::new(Point::new(41.00, 29.05));
    request.num_small = 1;
    request.num_large = 0;
    let plan = planner(&pool).create_plan(&request).await.unwrap();

    let repo = PlanRepository::new(pool.clone());
    let before = repo.fetch_plan_detail(plan.id).await.unwrap();
    let route = &before.routes[0];
    let old_location = route.stops[0].location;
    let target = Point::new(old_location.lat + 0.0027, old_location.lng); // ~300 m north

    let edit = editor(&pool)
        .move_stops(plan.id, route.id, &[StopMove { stop_index: 0, location: target }], true)
        .await
        .unwrap();

    assert!(edit.committed);
    assert_ne!(edit.new_distance, edit.old_distance);
    assert!(edit.polyline.contains(&target));
    assert_eq!(edit.stops[0].employee_ids, route.stops[0].employee_ids);
    assert_eq!(edit.stops[0].road_name, "manually adjusted");
    // Walks were rebased on the new position.
    assert!(edit.stops[0].max_walking_distance > 200.0);

    let after = repo.fetch_plan_detail(plan.id).await.unwrap();
    assert_totals_match_routes(&after);
    assert!((after.plan.total_distance - edit.new_distance).abs() < 1e-6);
}

/// Removing the last member of a single-member stop drops the stop; once
/// the final stop goes, the route zeroes out.
#[tokio::test]
async fn removing_last_member_drops_stop_then_route() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.045, 29.000).await; // ~5 km away

    let mut request = PlanRequest::new(Point::new(41.02, 29.02));
    request.num_small = 1;
    request.num_large = 0;
    let plan = planner(&pool).create_plan(&request).await.unwrap();
    assert_eq!(plan.total_passengers, 2);

    let repo = PlanRepository::new(pool.clone());
    let route_id = repo.fetch_plan_detail(plan.id).await.unwrap().routes[0].id;
    let ed = editor(&pool);

    let first = ed.remove_employee(plan.id, route_id, 2, true).await.unwrap();
    assert_eq!(first.stops.len(), 1);
    assert_eq!(first.passengers, 1);
    assert!(first.new_distance > 0.0);

    let second = ed.remove_employee(plan.id, route_id, 1, true).await.unwrap();
    assert!(second.stops.is_empty());
    assert_eq!(second.passengers, 0);
    assert_eq!(second.new_distance, 0.0);
    assert_eq!(second.new_duration, 0.0);
    assert!(second.polyline.is_empty());

    let detail = repo.fetch_plan_detail(plan.id).await.unwrap();
    assert_eq!(detail.plan.total_passengers, 0);
    assert_eq!(detail.plan.total_distance, 0.0);
}

/// Previews never write: two previews agree with each other, and the commit
/// lands exactly on the previewed numbers.
#[tokio::test]
async fn preview_is_idempotent_and_commit_matches() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.0005, 29.0005).await;

    let mut request = PlanRequest::new(Point::new(41.00, 29.05));
    request.num_small = 1;
    request.num_large = 0;
    let plan = planner(&pool).create_plan(&request).await.unwrap();

    let repo = PlanRepository::new(pool.clone());
    let route_id = repo.fetch_plan_detail(plan.id).await.unwrap().routes[0].id;
    let ed = editor(&pool);
    let moves = [StopMove {
        stop_index: 0,
        location: Point::new(41.003, 29.001),
    }];

    let p1 = ed.move_stops(plan.id, route_id, &moves, false).await.unwrap();
    let p2 = ed.move_stops(plan.id, route_id, &moves, false).await.unwrap();
    assert!(!p1.committed);
    assert_eq!(p1.new_distance, p2.new_distance);
    assert_eq!(p1.new_duration, p2.new_duration);
    assert_eq!(p1.distance_diff, p2.distance_diff);
    assert_eq!(p1.stops, p2.stops);

    // The previews left the stored route untouched.
    let stored = repo.fetch_route(plan.id, route_id).await.unwrap();
    assert!((stored.distance - p1.old_distance).abs() < 1e-6);

    let committed = ed.move_stops(plan.id, route_id, &moves, true).await.unwrap();
    assert_eq!(committed.new_distance, p1.new_distance);
    let totals = committed.plan_totals.unwrap();
    assert!((totals.total_distance - p1.new_distance).abs() < 1e-6);
}

/// Route-type policy: outbound polylines start at the depot only, inbound
/// polylines end there only.
#[tokio::test]
async fn polyline_endpoints_follow_route_type() {
    for (route_type, starts, ends) in [
        (RouteType::ToHome, true, false),
        (RouteType::ToDepot, false, true),
    ] {
        let pool = test_pool().await;
        seed_employee(&pool, 1, 41.000, 29.000).await;
        seed_employee(&pool, 2, 41.0005, 29.0005).await;

        let depot = Point::new(41.00, 29.05);
        let mut request = PlanRequest::new(depot);
        request.num_small = 1;
        request.num_large = 0;
        request.route_type = route_type;

        let plan = planner(&pool).create_plan(&request).await.unwrap();
        let detail = PlanRepository::new(pool.clone())
            .fetch_plan_detail(plan.id)
            .await
            .unwrap();
        let route = &detail.routes[0];

        assert_eq!(route.polyline.first() == Some(&depot), starts);
        assert_eq!(route.polyline.last() == Some(&depot), ends);

        let stop = &route.stops[0];
        match route_type {
            RouteType::ToHome => {
                assert!(stop.distance_from_depot.is_some());
                assert!(stop.distance_to_depot.is_none());
            }
            _ => {
                assert!(stop.distance_to_depot.is_some());
                assert!(stop.distance_from_depot.is_none());
            }
        }
    }
}

/// Adding an employee attaches to a nearby stop or creates an individual
/// stop, and refuses duplicates and full vehicles.
#[tokio::test]
async fn add_employee_attachment_rules() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.0005, 29.0005).await;
    // Near the pair's stop (inside 400 m) but not part of the plan's shift
    // of clustered members - added later by hand.
    seed_employee(&pool, 3, 41.002, 29.000).await;
    // Far from everything.
    seed_employee(&pool, 4, 41.100, 29.100).await;

    let mut request = PlanRequest::new(Point::new(41.00, 29.05));
    request.num_small = 1;
    request.num_large = 0;
    request.shift_id = None;

    // Plan over employees 1 and 2 only: park the others in a shift first.
    sqlx::query("INSERT INTO shifts (id, name) VALUES (9, 'Night')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE employees SET shift_id = 9 WHERE id IN (3, 4)")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO shifts (id, name) VALUES (8, 'Day')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE employees SET shift_id = 8 WHERE id IN (1, 2)")
        .execute(&pool)
        .await
        .unwrap();
    request.shift_id = Some(8);

    let plan = planner(&pool).create_plan(&request).await.unwrap();
    let repo = PlanRepository::new(pool.clone());
    let route_id = repo.fetch_plan_detail(plan.id).await.unwrap().routes[0].id;
    let ed = editor(&pool);

    // Employee 3 lives within 400 m of the existing stop: attach.
    let attached = ed.add_employee(plan.id, route_id, 3, true).await.unwrap();
    assert_eq!(attached.stops.len(), 1);
    assert!(attached.stops[0].contains_employee(3));
    assert_eq!(attached.passengers, 3);

    // Employee 4 is far away: individual stop appended at the end.
    let appended = ed.add_employee(plan.id, route_id, 4, true).await.unwrap();
    assert_eq!(appended.stops.len(), 2);
    let last = appended.stops.last().unwrap();
    assert!(last.individual);
    assert!(last.contains_employee(4));

    // Duplicates are a conflict.
    let dup = ed.add_employee(plan.id, route_id, 3, false).await;
    assert!(matches!(dup, Err(Error::EditorConflict(_))));
}

#[tokio::test]
async fn add_employee_rejects_full_vehicle() {
    let pool = test_pool().await;
    for i in 0..4 {
        seed_employee(&pool, i + 1, 41.0 + i as f64 * 0.0002, 29.0).await;
    }
    seed_employee(&pool, 99, 41.05, 29.05).await;
    sqlx::query("INSERT INTO shifts (id, name) VALUES (1, 'Day')")
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("UPDATE employees SET shift_id = 1 WHERE id <= 4")
        .execute(&pool)
        .await
        .unwrap();

    let mut request = PlanRequest::new(Point::new(41.00, 29.05));
    request.num_small = 1;
    request.num_large = 0;
    request.small_capacity = 4;
    request.shift_id = Some(1);

    let plan = planner(&pool).create_plan(&request).await.unwrap();
    let repo = PlanRepository::new(pool.clone());
    let route_id = repo.fetch_plan_detail(plan.id).await.unwrap().routes[0].id;

    let full = editor(&pool).add_employee(plan.id, route_id, 99, false).await;
    assert!(matches!(full, Err(Error::EditorConflict(_))));
}

/// Empty workforce is a validation error, not a crash.
#[tokio::test]
async fn empty_workforce_is_rejected() {
    let pool = test_pool().await;
    let request = PlanRequest::new(Point::new(41.0, 29.0));
    let result = planner(&pool).create_plan(&request).await;
    assert!(matches!(result, Err(Error::InputInvalid(_))));
}

/// A network that always degrades marks the plan accordingly.
struct BrokenNetwork;

impl RoadNetwork for BrokenNetwork {
    async fn table(&self, points: &[Point], _exclude_tolls: bool) -> DistanceTable {
        fallback::straight_line_table(points)
    }

    async fn route(&self, points: &[Point], _exclude_tolls: bool) -> RoadPath {
        fallback::straight_line_path(points)
    }

    async fn snap(&self, point: Point, _max_distance: f64) -> SnappedPoint {
        SnappedPoint {
            original: point,
            snapped: point,
            walking_distance: 0.0,
            road_name: String::new(),
            valid: false,
        }
    }
}

#[tokio::test]
async fn fallback_data_marks_plan_degraded() {
    let pool = test_pool().await;
    seed_employee(&pool, 1, 41.000, 29.000).await;
    seed_employee(&pool, 2, 41.0005, 29.0005).await;

    let mut request = PlanRequest::new(Point::new(41.00, 29.05));
    request.num_small = 1;
    request.num_large = 0;

    let planner = Planner::new(BrokenNetwork, PlanRepository::new(pool.clone()));
    let plan = planner.create_plan(&request).await.unwrap();
    assert!(plan.degraded);
}

/// Snap fan-out keeps result order aligned with input order even when later
/// inputs answer first.
struct SlowSnapNetwork;

impl RoadNetwork for SlowSnapNetwork {
    async fn table(&self, points: &[Point], _exclude_tolls: bool) -> DistanceTable {
        fallback::straight_line_table(points)
    }

    async fn route(&self, points: &[Point], _exclude_tolls: bool) -> RoadPath {
        fallback::straight_line_path(points)
    }

    async fn snap(&self, point: Point, _max_distance: f64) -> SnappedPoint {
        // Southern points answer slower than northern ones.
        let delay = ((41.010 - point.lat) * 10_000.0).max(0.0) as u64;
        tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        SnappedPoint {
            original: point,
            snapped: point,
            walking_distance: 0.0,
            road_name: String::new(),
            valid: true,
        }
    }
}

#[tokio::test]
async fn snap_batch_results_line_up_with_inputs() {
    let points: Vec<Point> = (0..6).map(|i| Point::new(41.0 + i as f64 * 0.001, 29.0)).collect();
    let results = SlowSnapNetwork.snap_many(&points, 500.0).await;
    assert_eq!(results.len(), points.len());
    for (input, result) in points.iter().zip(&results) {
        assert_eq!(result.original, *input);
    }
}
