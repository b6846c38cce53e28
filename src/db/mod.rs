//! SQLite persistence - pool construction and schema bootstrap.

pub mod repository;

use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::info;

use crate::error::Result;

pub use repository::{PlanRepository, PlanTotals, RouteUpdate};

/// Open the pool from `DATABASE_URL` (default: a local SQLite file) and make
/// sure the schema exists.
pub async fn db_connection() -> Result<SqlitePool> {
    dotenv().ok();
    let database_url = std::env::var("DATABASE_URL").unwrap_or_else(|_| {
        tracing::warn!("DATABASE_URL not set, using default SQLite file");
        "sqlite:shuttleplan.sqlite".to_string()
    });
    connect(&database_url).await
}

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        // Cascading plan -> route deletes rely on this.
        .foreign_keys(true);

    // An in-memory database lives inside a single connection; a wider pool
    // would hand out empty databases.
    let pool = if database_url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?
    };

    info!("Connected to SQLite database at {database_url}");
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Idempotent schema bootstrap, run at every connect.
async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS shifts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            color TEXT NOT NULL DEFAULT '#1E88E5',
            start_time TEXT,
            end_time TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS employees (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            home_lat REAL NOT NULL,
            home_lng REAL NOT NULL,
            address TEXT,
            shift_id INTEGER REFERENCES shifts(id),
            assigned_stop_id INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            total_vehicles INTEGER NOT NULL,
            total_distance REAL NOT NULL,
            total_duration REAL NOT NULL DEFAULT 0,
            total_passengers INTEGER NOT NULL,
            max_walking_distance INTEGER NOT NULL,
            depot_lat REAL NOT NULL,
            depot_lng REAL NOT NULL,
            traffic_mode TEXT NOT NULL DEFAULT 'none',
            buffer_seats INTEGER NOT NULL DEFAULT 0,
            vehicle_priority TEXT NOT NULL DEFAULT 'auto',
            max_travel_time INTEGER NOT NULL DEFAULT 65,
            num_small INTEGER NOT NULL DEFAULT 5,
            num_large INTEGER NOT NULL DEFAULT 5,
            shift_id INTEGER,
            shift_name TEXT,
            route_type TEXT NOT NULL DEFAULT 'ring',
            exclude_tolls INTEGER NOT NULL DEFAULT 0,
            degraded INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS plan_routes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            plan_id INTEGER NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
            vehicle_id INTEGER NOT NULL,
            vehicle_type TEXT NOT NULL,
            capacity INTEGER NOT NULL,
            passengers INTEGER NOT NULL,
            distance REAL NOT NULL,
            duration REAL NOT NULL DEFAULT 0,
            polyline TEXT NOT NULL DEFAULT '[]',
            stops TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
