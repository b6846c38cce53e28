//! HTTP client for the OSRM table/route/nearest services.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::geo::Point;
use crate::osrm::snap::{select_waypoint, RoadKeywords, Waypoint};
use crate::osrm::{fallback, DistanceTable, PathLeg, RoadPath, RoadNetwork, SnappedPoint};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// How many nearest candidates to request so main roads show up in the list.
const NEAREST_CANDIDATES: u32 = 100;

pub struct OsrmClient {
    base_url: String,
    profile: String,
    keywords: RoadKeywords,
    client: Client,
}

impl OsrmClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .expect("failed to build HTTP client");
        OsrmClient {
            base_url: base_url.into(),
            profile: "driving".to_string(),
            keywords: RoadKeywords::default(),
            client,
        }
    }

    /// Reads `OSRM_URL`, defaulting to a local instance.
    pub fn from_env() -> Self {
        let base_url = std::env::var("OSRM_URL").unwrap_or_else(|_| {
            warn!("OSRM_URL not set, using http://localhost:5000");
            "http://localhost:5000".to_string()
        });
        OsrmClient::new(base_url)
    }

    pub fn with_keywords(mut self, keywords: RoadKeywords) -> Self {
        self.keywords = keywords;
        self
    }

    /// OSRM wants longitude,latitude in that order.
    fn coords_param(points: &[Point]) -> String {
        points
            .iter()
            .map(|p| format!("{},{}", p.lng, p.lat))
            .collect::<Vec<String>>()
            .join(";")
    }

    async fn fetch_table(
        &self,
        points: &[Point],
        exclude_tolls: bool,
    ) -> Option<(Vec<Vec<f64>>, Vec<Vec<f64>>)> {
        let url = format!(
            "{}/table/v1/{}/{}",
            self.base_url,
            self.profile,
            Self::coords_param(points)
        );
        let mut params = vec![("annotations", "distance,duration")];
        if exclude_tolls {
            params.push(("exclude", "toll"));
        }

        debug!("GET {url}");
        let response = match self.client.get(&url).query(&params).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("table request failed: {e}");
                return None;
            }
        };

        let body: TableResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("table response unreadable: {e}");
                return None;
            }
        };

        if body.code != "Ok" {
            warn!("table returned code {}", body.code);
            return None;
        }

        let n = points.len();
        let distances = dense_matrix(body.distances?, n)?;
        let durations = dense_matrix(body.durations?, n)?;
        Some((distances, durations))
    }

    async fn fetch_route(&self, points: &[Point], exclude_tolls: bool) -> Option<RoadPath> {
        let url = format!(
            "{}/route/v1/{}/{}",
            self.base_url,
            self.profile,
            Self::coords_param(points)
        );
        let mut params = vec![
            ("overview", "full"),
            ("geometries", "geojson"),
            ("steps", "true"),
        ];
        if exclude_tolls {
            params.push(("exclude", "toll"));
        }

        debug!("GET {url}");
        let response = match self.client.get(&url).query(&params).send().await {
            Ok(resp) => resp,
            Err(e) => {
                warn!("route request failed: {e}");
                return None;
            }
        };

        let body: RouteResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("route response unreadable: {e}");
                return None;
            }
        };

        if body.code != "Ok" {
            warn!("route returned code {}", body.code);
            return None;
        }
        let route = body.routes.into_iter().next()?;

        Some(RoadPath {
            polyline: route
                .geometry
                .coordinates
                .iter()
                .map(|c| Point::new(c[1], c[0]))
                .collect(),
            distance: route.distance,
            duration: route.duration,
            legs: route
                .legs
                .iter()
                .map(|l| PathLeg {
                    distance: l.distance,
                    duration: l.duration,
                })
                .collect(),
            fallback: false,
        })
    }

    async fn fetch_nearest(&self, point: Point) -> Option<Vec<Waypoint>> {
        let url = format!(
            "{}/nearest/v1/{}/{},{}",
            self.base_url, self.profile, point.lng, point.lat
        );

        debug!("GET {url}");
        let response = match self
            .client
            .get(&url)
            .query(&[("number", NEAREST_CANDIDATES)])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("nearest request failed: {e}");
                return None;
            }
        };

        let body: NearestResponse = match response.json().await {
            Ok(body) => body,
            Err(e) => {
                warn!("nearest response unreadable: {e}");
                return None;
            }
        };

        if body.code != "Ok" || body.waypoints.is_empty() {
            return None;
        }
        Some(body.waypoints)
    }
}

impl RoadNetwork for OsrmClient {
    async fn table(&self, points: &[Point], exclude_tolls: bool) -> DistanceTable {
        let n = points.len();
        if n < 2 {
            return DistanceTable {
                distances: vec![vec![0.0; n]; n],
                durations: vec![vec![0.0; n]; n],
                fallback: false,
            };
        }

        match self.fetch_table(points, exclude_tolls).await {
            Some((distances, durations)) => DistanceTable {
                distances,
                durations,
                fallback: false,
            },
            None => {
                warn!("Using straight-line fallback for {n}x{n} matrix");
                fallback::straight_line_table(points)
            }
        }
    }

    async fn route(&self, points: &[Point], exclude_tolls: bool) -> RoadPath {
        if points.len() < 2 {
            return RoadPath {
                polyline: Vec::new(),
                distance: 0.0,
                duration: 0.0,
                legs: Vec::new(),
                fallback: false,
            };
        }

        match self.fetch_route(points, exclude_tolls).await {
            Some(path) => path,
            None => {
                warn!("Using straight-line fallback for route geometry");
                fallback::straight_line_path(points)
            }
        }
    }

    async fn snap(&self, point: Point, max_distance: f64) -> SnappedPoint {
        if let Some(waypoints) = self.fetch_nearest(point).await {
            if let Some(wp) = select_waypoint(&waypoints, &self.keywords, max_distance) {
                return SnappedPoint {
                    original: point,
                    snapped: Point::new(wp.location[1], wp.location[0]),
                    walking_distance: wp.distance,
                    road_name: wp.name.clone().unwrap_or_default(),
                    valid: true,
                };
            }
        }

        // Snap fallback keeps the point where it was.
        SnappedPoint {
            original: point,
            snapped: point,
            walking_distance: 0.0,
            road_name: String::new(),
            valid: false,
        }
    }
}

/// Reject ragged or null-bearing matrices; the solver cannot use them.
fn dense_matrix(rows: Vec<Vec<Option<f64>>>, n: usize) -> Option<Vec<Vec<f64>>> {
    if rows.len() != n {
        return None;
    }
    let mut out = Vec::with_capacity(n);
    for row in rows {
        if row.len() != n {
            return None;
        }
        let mut dense = Vec::with_capacity(n);
        for value in row {
            dense.push(value?);
        }
        out.push(dense);
    }
    Some(out)
}

#[derive(Debug, Deserialize)]
struct NearestResponse {
    code: String,
    #[serde(default)]
    waypoints: Vec<Waypoint>,
}

#[derive(Debug, Deserialize)]
struct TableResponse {
    code: String,
    distances: Option<Vec<Vec<Option<f64>>>>,
    durations: Option<Vec<Vec<Option<f64>>>>,
}

#[derive(Debug, Deserialize)]
struct RouteResponse {
    code: String,
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    geometry: Geometry,
    distance: f64,
    duration: f64,
    #[serde(default)]
    legs: Vec<OsrmLeg>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    /// (lng, lat) pairs - GeoJSON order.
    coordinates: Vec<[f64; 2]>,
}

#[derive(Debug, Deserialize)]
struct OsrmLeg {
    distance: f64,
    duration: f64,
}
