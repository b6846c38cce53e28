//! Initial solution by cheapest feasible insertion.
//!
//! Nodes are placed in decreasing-demand order so tight capacities pack the
//! way best-fit-decreasing would, then each node goes to the cheapest
//! position across all vehicles (activation fixed cost and overtime penalty
//! included in the insertion price).

use std::cmp::Reverse;

use tracing::debug;

use crate::solver::assignment::{route_metrics, Assignment};
use crate::solver::problem::CvrpProblem;

/// Build a starting assignment, or `None` when some node cannot be placed
/// without breaking capacity or the duration ceiling.
pub(crate) fn cheapest_insertion(problem: &CvrpProblem) -> Option<Assignment> {
    let mut assignment = Assignment::empty(problem.num_vehicles());

    let mut nodes: Vec<usize> = (0..problem.num_locations())
        .filter(|&i| i != problem.depot)
        .collect();
    nodes.sort_by_key(|&i| (Reverse(problem.demands[i]), i));

    for node in nodes {
        let mut best: Option<(i64, usize, usize)> = None;

        for vehicle in 0..problem.num_vehicles() {
            let current = assignment.metrics(problem, vehicle);
            if current.load + problem.demands[node] > problem.capacities[vehicle] {
                continue;
            }

            let route = &assignment.routes[vehicle];
            for pos in 0..=route.len() {
                let Some(delta) = insertion_delta(problem, vehicle, route, pos, node) else {
                    continue;
                };
                // Strict < keeps ties on the lowest (vehicle, position).
                if best.map_or(true, |(cost, _, _)| delta < cost) {
                    best = Some((delta, vehicle, pos));
                }
            }
        }

        match best {
            Some((_, vehicle, pos)) => assignment.routes[vehicle].insert(pos, node),
            None => {
                debug!("Node {node} has no feasible insertion; instance is infeasible");
                return None;
            }
        }
    }

    Some(assignment)
}

/// Objective delta of inserting `node` at `pos`, or `None` when the resulting
/// route would blow the duration ceiling.
fn insertion_delta(
    problem: &CvrpProblem,
    vehicle: usize,
    route: &[usize],
    pos: usize,
    node: usize,
) -> Option<i64> {
    let depot = problem.depot;
    let prev = if pos == 0 { depot } else { route[pos - 1] };
    let next = if pos == route.len() { depot } else { route[pos] };

    let current = route_metrics(problem, route);

    let duration_delta =
        problem.time(prev, node) + problem.time(node, next) - problem.time(prev, next);
    let new_duration = current.duration + duration_delta;
    if new_duration > problem.duration_ceiling() {
        return None;
    }

    let distance_delta =
        problem.dist(prev, node) + problem.dist(node, next) - problem.dist(prev, next);
    let activation = if route.is_empty() {
        problem.fixed_cost(vehicle)
    } else {
        0
    };
    let penalty_delta =
        problem.overtime_penalty(new_duration) - problem.overtime_penalty(current.duration);

    Some(distance_delta + activation + penalty_delta)
}
