//! Waypoint selection for nearest-road snapping.
//!
//! Shuttle stops must sit on roads a minibus can actually serve. Street
//! names are classified with configurable keyword lists; the defaults follow
//! Turkish naming (Cadde/Bulvar are main roads, Sokak is residential).

use serde::Deserialize;
use tracing::{debug, warn};

/// How much farther than the acceptance radius a main road may be.
pub const MAIN_ROAD_RADIUS_FACTOR: f64 = 3.0;

/// One candidate from the engine's nearest-road response.
#[derive(Debug, Clone, Deserialize)]
pub struct Waypoint {
    /// (lng, lat) - wire order.
    pub location: [f64; 2],
    #[serde(default)]
    pub distance: f64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Keyword lists for road classification, lowercase substrings.
#[derive(Debug, Clone)]
pub struct RoadKeywords {
    pub main_roads: Vec<String>,
    pub residential: Vec<String>,
}

impl Default for RoadKeywords {
    fn default() -> Self {
        let main_roads = [
            "cadde", "caddesi", "cad.", "cad ", "bulvar", "bulvarı", "blv.", "blv ", "bağlantı",
            "ana yol", "anayol", "otoyol", "devlet yolu", "d-", "e-", "o-",
        ];
        let residential = [
            "sokak", "sokağı", "sokaği", " sk.", " sk ", "sk.", " sok.", " sok ", "sok.",
            "ara yol", "arayol",
        ];
        RoadKeywords {
            main_roads: main_roads.iter().map(|s| s.to_string()).collect(),
            residential: residential.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RoadKeywords {
    pub fn is_main_road(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let lower = name.to_lowercase();
        self.main_roads.iter().any(|k| lower.contains(k.as_str()))
    }

    pub fn is_residential(&self, name: &str) -> bool {
        if name.is_empty() {
            return false;
        }
        let lower = name.to_lowercase();
        self.residential.iter().any(|k| lower.contains(k.as_str()))
    }
}

/// Pick the waypoint a stop should snap to.
///
/// Priority: nearest main road within `3 * max_distance`, then the nearest
/// named non-residential road within `max_distance`, then the absolute
/// nearest candidate (logged, since the stop ends up on a small street).
pub fn select_waypoint<'a>(
    waypoints: &'a [Waypoint],
    keywords: &RoadKeywords,
    max_distance: f64,
) -> Option<&'a Waypoint> {
    if waypoints.is_empty() {
        return None;
    }

    let main_radius = max_distance * MAIN_ROAD_RADIUS_FACTOR;

    let main_road = waypoints
        .iter()
        .filter(|wp| wp.distance <= main_radius && keywords.is_main_road(wp.name.as_deref().unwrap_or("")))
        .min_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(wp) = main_road {
        debug!(
            "Snapped to main road {} ({:.0} m away)",
            wp.name.as_deref().unwrap_or("?"),
            wp.distance
        );
        return Some(wp);
    }

    let named_road = waypoints
        .iter()
        .filter(|wp| {
            let name = wp.name.as_deref().unwrap_or("");
            !name.is_empty() && wp.distance <= max_distance && !keywords.is_residential(name)
        })
        .min_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(wp) = named_road {
        debug!(
            "Snapped to named road {} ({:.0} m away)",
            wp.name.as_deref().unwrap_or("?"),
            wp.distance
        );
        return Some(wp);
    }

    let nearest = waypoints
        .iter()
        .min_by(|a, b| a.distance.total_cmp(&b.distance));
    if let Some(wp) = nearest {
        warn!(
            "No main road near stop, using nearest {} ({:.0} m away)",
            wp.name.as_deref().unwrap_or("(unnamed)"),
            wp.distance
        );
    }
    nearest
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wp(name: Option<&str>, distance: f64) -> Waypoint {
        Waypoint {
            location: [29.0, 41.0],
            distance,
            name: name.map(|s| s.to_string()),
        }
    }

    #[test]
    fn classifies_turkish_road_names() {
        let kw = RoadKeywords::default();
        assert!(kw.is_main_road("Atatürk Caddesi"));
        assert!(kw.is_main_road("Barbaros Bulvarı"));
        assert!(kw.is_residential("Gül Sokak"));
        assert!(!kw.is_main_road("Gül Sokak"));
        assert!(!kw.is_residential("Atatürk Caddesi"));
    }

    #[test]
    fn prefers_main_road_within_extended_radius() {
        let kw = RoadKeywords::default();
        let wps = vec![
            wp(Some("Gül Sokak"), 20.0),
            wp(Some("Atatürk Caddesi"), 900.0),
        ];
        // 900 m is beyond max_distance but within 3x.
        let chosen = select_waypoint(&wps, &kw, 500.0).unwrap();
        assert_eq!(chosen.name.as_deref(), Some("Atatürk Caddesi"));
    }

    #[test]
    fn main_road_beyond_extended_radius_is_ignored() {
        let kw = RoadKeywords::default();
        let wps = vec![
            wp(Some("Gül Sokak"), 20.0),
            wp(Some("Atatürk Caddesi"), 2000.0),
        ];
        let chosen = select_waypoint(&wps, &kw, 500.0).unwrap();
        // Falls through to the last resort: the nearest candidate.
        assert_eq!(chosen.name.as_deref(), Some("Gül Sokak"));
    }

    #[test]
    fn falls_back_to_named_non_residential() {
        let kw = RoadKeywords::default();
        let wps = vec![
            wp(Some("Gül Sokak"), 20.0),
            wp(Some("Orhan Veli Yolu"), 120.0),
        ];
        let chosen = select_waypoint(&wps, &kw, 500.0).unwrap();
        assert_eq!(chosen.name.as_deref(), Some("Orhan Veli Yolu"));
    }

    #[test]
    fn unnamed_roads_never_win_the_named_tier() {
        let kw = RoadKeywords::default();
        let wps = vec![wp(None, 10.0), wp(Some("Gül Sokak"), 30.0)];
        let chosen = select_waypoint(&wps, &kw, 500.0).unwrap();
        // Neither qualifies as named non-residential; nearest wins.
        assert!(chosen.name.is_none());
    }

    #[test]
    fn empty_waypoints() {
        assert!(select_waypoint(&[], &RoadKeywords::default(), 500.0).is_none());
    }
}
