//! Density-based clustering over a precomputed distance matrix.
//!
//! Deterministic given the input order: points are visited in index order and
//! clusters are numbered in discovery order.

pub const NOISE: i64 = -1;
const UNVISITED: i64 = -2;

/// Label each point with a cluster id, or NOISE for outliers.
///
/// `min_points` counts the point itself, so `min_points = 2` means "at least
/// one other point within `eps`".
pub fn cluster(distances: &[Vec<f64>], eps: f64, min_points: usize) -> Vec<i64> {
    let n = distances.len();
    let mut labels = vec![UNVISITED; n];
    let mut next_cluster: i64 = 0;

    for point in 0..n {
        if labels[point] != UNVISITED {
            continue;
        }

        let neighbours = region_query(distances, point, eps);
        if neighbours.len() < min_points {
            labels[point] = NOISE;
            continue;
        }

        let cluster_id = next_cluster;
        next_cluster += 1;
        labels[point] = cluster_id;

        // Expand the cluster breadth-first from the seed's neighbourhood.
        let mut queue = neighbours;
        let mut head = 0;
        while head < queue.len() {
            let q = queue[head];
            head += 1;

            if labels[q] == NOISE {
                // Border point previously dismissed as noise.
                labels[q] = cluster_id;
                continue;
            }
            if labels[q] != UNVISITED {
                continue;
            }
            labels[q] = cluster_id;

            let q_neighbours = region_query(distances, q, eps);
            if q_neighbours.len() >= min_points {
                queue.extend(q_neighbours);
            }
        }
    }

    labels
}

fn region_query(distances: &[Vec<f64>], point: usize, eps: f64) -> Vec<usize> {
    distances[point]
        .iter()
        .enumerate()
        .filter(|&(_, &d)| d <= eps)
        .map(|(i, _)| i)
        .collect()
}
