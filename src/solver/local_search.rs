//! Local-search refinement of a constructed assignment.
//!
//! Best-improvement descent over relocate / swap / intra-route reversal,
//! restarted through seeded random perturbations until the search stagnates
//! or the wall-clock budget runs out. Hard constraints (capacity, duration
//! ceiling) are never violated; the soft duration bound participates in the
//! objective only.

use std::time::Instant;

use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::solver::assignment::{route_cost, route_feasible, route_metrics, Assignment};
use crate::solver::problem::CvrpProblem;

/// Perturbation rounds without improvement before the search is declared
/// converged.
const MAX_STAGNANT_ROUNDS: usize = 8;

/// Random relocations applied per perturbation.
const PERTURBATION_MOVES: usize = 3;

#[derive(Debug, Clone, Copy)]
enum Move {
    Relocate {
        from_vehicle: usize,
        from_index: usize,
        to_vehicle: usize,
        to_index: usize,
    },
    Swap {
        first: (usize, usize),
        second: (usize, usize),
    },
    Reverse {
        vehicle: usize,
        start: usize,
        end: usize,
    },
}

/// Refine `assignment` in place. Returns true when the search converged
/// before the deadline, false when the budget cut it short.
pub(crate) fn improve(
    assignment: &mut Assignment,
    problem: &CvrpProblem,
    deadline: Instant,
    rng: &mut ChaCha8Rng,
) -> bool {
    descend(assignment, problem, deadline);

    let mut best = assignment.clone();
    let mut best_cost = best.total_cost(problem);
    let mut stagnant = 0;

    while stagnant < MAX_STAGNANT_ROUNDS {
        if Instant::now() >= deadline {
            *assignment = best;
            return false;
        }

        perturb(assignment, problem, rng);
        descend(assignment, problem, deadline);

        let cost = assignment.total_cost(problem);
        if cost < best_cost {
            debug!("Perturbation improved objective to {cost}");
            best = assignment.clone();
            best_cost = cost;
            stagnant = 0;
        } else {
            stagnant += 1;
            *assignment = best.clone();
        }
    }

    *assignment = best;
    true
}

fn descend(assignment: &mut Assignment, problem: &CvrpProblem, deadline: Instant) {
    loop {
        if Instant::now() >= deadline {
            return;
        }
        match best_improving_move(assignment, problem) {
            Some(mv) => apply_move(assignment, mv),
            None => return,
        }
    }
}

/// Objective contribution of one candidate route, or `None` if it breaks a
/// hard constraint.
fn candidate_cost(problem: &CvrpProblem, vehicle: usize, nodes: &[usize]) -> Option<i64> {
    if nodes.is_empty() {
        return Some(0);
    }
    let metrics = route_metrics(problem, nodes);
    if !route_feasible(problem, vehicle, &metrics) {
        return None;
    }
    Some(route_cost(problem, vehicle, &metrics))
}

fn current_cost(problem: &CvrpProblem, assignment: &Assignment, vehicle: usize) -> i64 {
    if assignment.routes[vehicle].is_empty() {
        0
    } else {
        route_cost(problem, vehicle, &assignment.metrics(problem, vehicle))
    }
}

fn best_improving_move(assignment: &Assignment, problem: &CvrpProblem) -> Option<Move> {
    let num_vehicles = assignment.routes.len();
    let mut best: Option<(i64, Move)> = None;
    let mut consider = |delta: i64, mv: Move, best: &mut Option<(i64, Move)>| {
        if delta < 0 && best.map_or(true, |(d, _)| delta < d) {
            *best = Some((delta, mv));
        }
    };

    // Relocate a node anywhere else.
    for v1 in 0..num_vehicles {
        for i in 0..assignment.routes[v1].len() {
            let node = assignment.routes[v1][i];
            let mut donor = assignment.routes[v1].clone();
            donor.remove(i);
            let Some(donor_cost) = candidate_cost(problem, v1, &donor) else {
                continue;
            };

            for v2 in 0..num_vehicles {
                if v2 == v1 {
                    for j in 0..=donor.len() {
                        if j == i {
                            continue;
                        }
                        let mut moved = donor.clone();
                        moved.insert(j, node);
                        let Some(new_cost) = candidate_cost(problem, v1, &moved) else {
                            continue;
                        };
                        let delta = new_cost - current_cost(problem, assignment, v1);
                        consider(
                            delta,
                            Move::Relocate {
                                from_vehicle: v1,
                                from_index: i,
                                to_vehicle: v2,
                                to_index: j,
                            },
                            &mut best,
                        );
                    }
                } else {
                    let old = current_cost(problem, assignment, v1)
                        + current_cost(problem, assignment, v2);
                    for j in 0..=assignment.routes[v2].len() {
                        let mut receiver = assignment.routes[v2].clone();
                        receiver.insert(j, node);
                        let Some(receiver_cost) = candidate_cost(problem, v2, &receiver) else {
                            continue;
                        };
                        let delta = donor_cost + receiver_cost - old;
                        consider(
                            delta,
                            Move::Relocate {
                                from_vehicle: v1,
                                from_index: i,
                                to_vehicle: v2,
                                to_index: j,
                            },
                            &mut best,
                        );
                    }
                }
            }
        }
    }

    // Exchange two nodes.
    for v1 in 0..num_vehicles {
        for i in 0..assignment.routes[v1].len() {
            for v2 in v1..num_vehicles {
                let j_start = if v1 == v2 { i + 1 } else { 0 };
                for j in j_start..assignment.routes[v2].len() {
                    let delta = swap_delta(assignment, problem, (v1, i), (v2, j));
                    if let Some(delta) = delta {
                        consider(
                            delta,
                            Move::Swap {
                                first: (v1, i),
                                second: (v2, j),
                            },
                            &mut best,
                        );
                    }
                }
            }
        }
    }

    // Reverse a segment within one route (classic 2-opt).
    for v in 0..num_vehicles {
        let len = assignment.routes[v].len();
        for start in 0..len {
            for end in (start + 1)..len {
                let mut reversed = assignment.routes[v].clone();
                reversed[start..=end].reverse();
                let Some(new_cost) = candidate_cost(problem, v, &reversed) else {
                    continue;
                };
                let delta = new_cost - current_cost(problem, assignment, v);
                consider(delta, Move::Reverse { vehicle: v, start, end }, &mut best);
            }
        }
    }

    best.map(|(_, mv)| mv)
}

fn swap_delta(
    assignment: &Assignment,
    problem: &CvrpProblem,
    first: (usize, usize),
    second: (usize, usize),
) -> Option<i64> {
    let (v1, i) = first;
    let (v2, j) = second;

    if v1 == v2 {
        let mut swapped = assignment.routes[v1].clone();
        swapped.swap(i, j);
        let new_cost = candidate_cost(problem, v1, &swapped)?;
        return Some(new_cost - current_cost(problem, assignment, v1));
    }

    let mut r1 = assignment.routes[v1].clone();
    let mut r2 = assignment.routes[v2].clone();
    std::mem::swap(&mut r1[i], &mut r2[j]);
    let new_cost = candidate_cost(problem, v1, &r1)? + candidate_cost(problem, v2, &r2)?;
    let old = current_cost(problem, assignment, v1) + current_cost(problem, assignment, v2);
    Some(new_cost - old)
}

fn apply_move(assignment: &mut Assignment, mv: Move) {
    match mv {
        Move::Relocate {
            from_vehicle,
            from_index,
            to_vehicle,
            to_index,
        } => {
            let node = assignment.routes[from_vehicle].remove(from_index);
            assignment.routes[to_vehicle].insert(to_index, node);
        }
        Move::Swap { first, second } => {
            let (v1, i) = first;
            let (v2, j) = second;
            if v1 == v2 {
                assignment.routes[v1].swap(i, j);
            } else {
                let a = assignment.routes[v1][i];
                let b = assignment.routes[v2][j];
                assignment.routes[v1][i] = b;
                assignment.routes[v2][j] = a;
            }
        }
        Move::Reverse { vehicle, start, end } => {
            assignment.routes[vehicle][start..=end].reverse();
        }
    }
}

/// Kick the solution with a few random feasible relocations so the next
/// descent explores a different basin.
fn perturb(assignment: &mut Assignment, problem: &CvrpProblem, rng: &mut ChaCha8Rng) {
    for _ in 0..PERTURBATION_MOVES {
        let occupied: Vec<usize> = (0..assignment.routes.len())
            .filter(|&v| !assignment.routes[v].is_empty())
            .collect();
        if occupied.is_empty() {
            return;
        }

        let from_vehicle = occupied[rng.gen_range(0..occupied.len())];
        let from_index = rng.gen_range(0..assignment.routes[from_vehicle].len());
        let to_vehicle = rng.gen_range(0..assignment.routes.len());

        let node = assignment.routes[from_vehicle][from_index];
        let mut receiver = assignment.routes[to_vehicle].clone();
        if to_vehicle == from_vehicle {
            receiver.remove(from_index);
        }
        let to_index = if receiver.is_empty() {
            0
        } else {
            rng.gen_range(0..=receiver.len())
        };
        receiver.insert(to_index, node);

        if candidate_cost(problem, to_vehicle, &receiver).is_some() {
            apply_move(
                assignment,
                Move::Relocate {
                    from_vehicle,
                    from_index,
                    to_vehicle,
                    to_index,
                },
            );
        }
    }
}
