//! Plain Lloyd k-means on raw (lat, lng) coordinates.
//!
//! Seeded with a fixed ChaCha8 stream so repeated runs over the same input
//! produce the same assignment.

use rand::seq::index::sample;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::geo::Point;

const MAX_ITERATIONS: usize = 300;

/// Returns (labels, centroids). `k` must be in 1..=points.len().
pub fn cluster(points: &[Point], k: usize, seed: u64) -> (Vec<usize>, Vec<Point>) {
    assert!(k >= 1 && k <= points.len(), "k out of range");

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut centroids: Vec<Point> = sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut labels = vec![0usize; points.len()];

    for _ in 0..MAX_ITERATIONS {
        let mut changed = false;

        for (i, p) in points.iter().enumerate() {
            let nearest = nearest_centroid(*p, &centroids);
            if labels[i] != nearest {
                labels[i] = nearest;
                changed = true;
            }
        }

        // Recenter each cluster on the mean of its members. An emptied
        // cluster keeps its previous centroid.
        for (c, centroid) in centroids.iter_mut().enumerate() {
            let mut lat = 0.0;
            let mut lng = 0.0;
            let mut count = 0usize;
            for (i, p) in points.iter().enumerate() {
                if labels[i] == c {
                    lat += p.lat;
                    lng += p.lng;
                    count += 1;
                }
            }
            if count > 0 {
                *centroid = Point::new(lat / count as f64, lng / count as f64);
            }
        }

        if !changed {
            break;
        }
    }

    (labels, centroids)
}

fn nearest_centroid(p: Point, centroids: &[Point]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = (p.lat - centroid.lat).powi(2) + (p.lng - centroid.lng).powi(2);
        // Strict < keeps ties on the lowest centroid index.
        if d < best_dist {
            best = c;
            best_dist = d;
        }
    }
    best
}
