//! CVRP Solver - capacity- and duration-constrained routing over a
//! heterogeneous fleet with vehicle-preference cost shaping.
//!
//! Construction by cheapest feasible insertion, refinement by perturbed
//! best-improvement local search under a hard wall-clock budget. The
//! per-route duration bound is soft (heavily penalized, not forbidden) so a
//! plan always comes back when capacity suffices; only the 3x ceiling makes
//! an instance infeasible on time grounds.

mod assignment;
mod construction;
mod local_search;
pub mod problem;

use std::time::Instant;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::info;

use assignment::Assignment;
pub use problem::{CvrpProblem, CvrpSolution, SolverStatus};

/// Seed for the perturbation stream; fixed so reruns of the same instance
/// walk the same path.
const SEARCH_SEED: u64 = 67;

pub fn solve(problem: &CvrpProblem) -> CvrpSolution {
    let deadline = Instant::now() + problem.time_limit;
    let customers = (0..problem.num_locations())
        .filter(|&i| i != problem.depot)
        .count();

    info!(
        "Solving CVRP: {} customers, {} vehicles, priority count {}",
        customers,
        problem.num_vehicles(),
        problem.priority_count
    );

    if customers == 0 {
        return extract(problem, &Assignment::empty(problem.num_vehicles()), SolverStatus::Optimal);
    }

    let Some(mut assignment) = construction::cheapest_insertion(problem) else {
        info!("No feasible assignment exists for this fleet and time ceiling");
        return no_solution(problem);
    };

    let mut rng = ChaCha8Rng::seed_from_u64(SEARCH_SEED);
    let converged = local_search::improve(&mut assignment, problem, deadline, &mut rng);

    let status = if converged {
        SolverStatus::Optimal
    } else {
        SolverStatus::Feasible
    };
    let solution = extract(problem, &assignment, status);

    info!(
        "CVRP solved: {} vehicles, {} m total distance",
        solution.vehicles_used, solution.total_distance
    );
    solution
}

fn no_solution(problem: &CvrpProblem) -> CvrpSolution {
    CvrpSolution {
        routes: vec![Vec::new(); problem.num_vehicles()],
        distances: vec![0; problem.num_vehicles()],
        loads: vec![0; problem.num_vehicles()],
        total_distance: 0,
        vehicles_used: 0,
        status: SolverStatus::NoSolution,
    }
}

fn extract(problem: &CvrpProblem, assignment: &Assignment, status: SolverStatus) -> CvrpSolution {
    let mut routes = Vec::with_capacity(problem.num_vehicles());
    let mut distances = Vec::with_capacity(problem.num_vehicles());
    let mut loads = Vec::with_capacity(problem.num_vehicles());
    let mut total_distance = 0;
    let mut vehicles_used = 0;

    for vehicle in 0..problem.num_vehicles() {
        let nodes = &assignment.routes[vehicle];
        if nodes.is_empty() {
            routes.push(Vec::new());
            distances.push(0);
            loads.push(0);
            continue;
        }

        let metrics = assignment.metrics(problem, vehicle);
        let mut route = Vec::with_capacity(nodes.len() + 2);
        route.push(problem.depot);
        route.extend_from_slice(nodes);
        route.push(problem.depot);

        routes.push(route);
        distances.push(metrics.distance);
        loads.push(metrics.load);
        total_distance += metrics.distance;
        vehicles_used += 1;
    }

    CvrpSolution {
        routes,
        distances,
        loads,
        total_distance,
        vehicles_used,
        status,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    /// Symmetric instance from explicit coordinates on a line; distance in
    /// meters = |a - b|, duration = distance / 10.
    fn line_problem(
        positions: &[i64],
        demands: Vec<i64>,
        capacities: Vec<i64>,
        priority_count: usize,
        max_route_duration: i64,
    ) -> CvrpProblem {
        let n = positions.len();
        let distances: Vec<Vec<i64>> = (0..n)
            .map(|i| (0..n).map(|j| (positions[i] - positions[j]).abs()).collect())
            .collect();
        let durations = distances
            .iter()
            .map(|row| row.iter().map(|d| d / 10).collect())
            .collect();
        CvrpProblem {
            distances,
            durations,
            demands,
            capacities,
            priority_count,
            depot: 0,
            time_limit: Duration::from_millis(500),
            max_route_duration,
        }
    }

    fn visited_nodes(solution: &CvrpSolution, depot: usize) -> Vec<usize> {
        let mut nodes: Vec<usize> = solution
            .routes
            .iter()
            .flatten()
            .copied()
            .filter(|&n| n != depot)
            .collect();
        nodes.sort_unstable();
        nodes
    }

    #[test]
    fn trivial_instance_uses_no_vehicles() {
        let p = line_problem(&[0], vec![0], vec![16], 0, 3_900);
        let s = solve(&p);
        assert_eq!(s.vehicles_used, 0);
        assert_eq!(s.status, SolverStatus::Optimal);
        assert_eq!(s.total_distance, 0);
    }

    #[test]
    fn single_stop_round_trip() {
        let p = line_problem(&[0, 1_000], vec![0, 3], vec![16], 0, 3_900);
        let s = solve(&p);
        assert_eq!(s.vehicles_used, 1);
        assert_eq!(s.routes[0], vec![0, 1, 0]);
        assert_eq!(s.distances[0], 2_000);
        assert_eq!(s.loads[0], 3);
        assert_ne!(s.status, SolverStatus::NoSolution);
    }

    #[test]
    fn every_node_visited_exactly_once() {
        let p = line_problem(
            &[0, 500, 1_000, 1_500, 2_000, 2_500],
            vec![0, 2, 3, 4, 2, 1],
            vec![8, 8, 8],
            0,
            100_000,
        );
        let s = solve(&p);
        assert_eq!(visited_nodes(&s, 0), vec![1, 2, 3, 4, 5]);
        for route in s.routes.iter().filter(|r| !r.is_empty()) {
            assert_eq!(route[0], 0);
            assert_eq!(*route.last().unwrap(), 0);
        }
    }

    #[test]
    fn capacity_forces_a_split() {
        let p = line_problem(&[0, 100, 200], vec![0, 10, 10], vec![10, 10], 0, 100_000);
        let s = solve(&p);
        assert_eq!(s.vehicles_used, 2);
        for (v, &load) in s.loads.iter().enumerate() {
            assert!(load <= p.capacities[v]);
        }
    }

    #[test]
    fn insufficient_capacity_is_no_solution() {
        let p = line_problem(&[0, 100], vec![0, 20], vec![10], 0, 100_000);
        let s = solve(&p);
        assert_eq!(s.status, SolverStatus::NoSolution);
        assert_eq!(s.vehicles_used, 0);
    }

    #[test]
    fn priority_vehicle_is_filled_first() {
        // Both stops fit either vehicle; the non-priority one costs 5x more
        // to activate, so everything rides vehicle 0.
        let p = line_problem(&[0, 100, 200], vec![0, 2, 2], vec![16, 27], 1, 100_000);
        let s = solve(&p);
        assert_eq!(s.vehicles_used, 1);
        assert!(!s.routes[0].is_empty());
        assert!(s.routes[1].is_empty());
    }

    #[test]
    fn overtime_penalty_splits_routes() {
        // One vehicle serving both far stops runs ~2x the soft bound; the
        // penalty dwarfs a second activation, so the solver splits.
        let p = line_problem(
            &[0, 10_000, -10_000],
            vec![0, 2, 2],
            vec![16, 16],
            0,
            2_000, // soft bound 2 000 s; combined route ~4 000 s
        );
        let s = solve(&p);
        assert_eq!(s.vehicles_used, 2);
    }

    #[test]
    fn duration_ceiling_makes_instance_infeasible() {
        // Round trip 2 000 s against a ceiling of 3 * 500 = 1 500 s.
        let p = line_problem(&[0, 100_000], vec![0, 1], vec![16], 0, 500);
        let s = solve(&p);
        assert_eq!(s.status, SolverStatus::NoSolution);
    }

    #[test]
    fn deterministic_given_same_instance() {
        let p = line_problem(
            &[0, 300, 600, 900, 1_200],
            vec![0, 1, 2, 3, 1],
            vec![4, 4, 4],
            0,
            100_000,
        );
        let a = solve(&p);
        let b = solve(&p);
        assert_eq!(a.routes, b.routes);
        assert_eq!(a.total_distance, b.total_distance);
    }

    #[test]
    fn nonzero_depot_index() {
        let p = CvrpProblem {
            distances: vec![
                vec![0, 100, 200],
                vec![100, 0, 100],
                vec![200, 100, 0],
            ],
            durations: vec![vec![0, 10, 20], vec![10, 0, 10], vec![20, 10, 0]],
            demands: vec![1, 0, 1],
            capacities: vec![4],
            priority_count: 0,
            depot: 1,
            time_limit: Duration::from_millis(200),
            max_route_duration: 10_000,
        };
        let s = solve(&p);
        assert_eq!(visited_nodes(&s, 1), vec![0, 2]);
        assert_eq!(s.routes[0][0], 1);
        assert_eq!(*s.routes[0].last().unwrap(), 1);
    }
}
