use std::time::Duration;

/// Fixed cost charged when a vehicle leaves the depot. Priority vehicles are
/// cheap so the search fills them first.
pub const PRIORITY_VEHICLE_COST: i64 = 100_000;
pub const NON_PRIORITY_VEHICLE_COST: i64 = 500_000;

/// Cost per second a route runs over the soft duration bound.
pub const OVERTIME_PENALTY_PER_SECOND: i64 = 10_000;

/// Routes may exceed the soft bound up to this multiple; beyond it the node
/// placement is rejected outright, which is what turns a hopeless time budget
/// into `NoSolution` instead of an unbounded route.
pub const DURATION_CEILING_FACTOR: i64 = 3;

/// A capacitated vehicle routing instance over integer matrices.
///
/// Durations are expected to be traffic-scaled before they get here, and
/// `max_route_duration` with them, so the solver works in one time unit.
#[derive(Debug, Clone)]
pub struct CvrpProblem {
    /// Meters, N x N.
    pub distances: Vec<Vec<i64>>,
    /// Seconds, N x N.
    pub durations: Vec<Vec<i64>>,
    /// Passengers per node; the depot entry is zero.
    pub demands: Vec<i64>,
    /// Effective capacity per vehicle, fleet order.
    pub capacities: Vec<i64>,
    /// The first `priority_count` vehicles get the low fixed cost. Zero means
    /// every vehicle is priced as priority.
    pub priority_count: usize,
    pub depot: usize,
    /// Hard wall-clock budget for the search.
    pub time_limit: Duration,
    /// Soft per-route duration bound, seconds.
    pub max_route_duration: i64,
}

impl CvrpProblem {
    pub fn num_vehicles(&self) -> usize {
        self.capacities.len()
    }

    pub fn num_locations(&self) -> usize {
        self.distances.len()
    }

    pub fn fixed_cost(&self, vehicle: usize) -> i64 {
        if self.priority_count == 0 || vehicle < self.priority_count {
            PRIORITY_VEHICLE_COST
        } else {
            NON_PRIORITY_VEHICLE_COST
        }
    }

    pub fn duration_ceiling(&self) -> i64 {
        self.max_route_duration * DURATION_CEILING_FACTOR
    }

    pub fn overtime_penalty(&self, route_duration: i64) -> i64 {
        (route_duration - self.max_route_duration).max(0) * OVERTIME_PENALTY_PER_SECOND
    }

    pub(crate) fn dist(&self, from: usize, to: usize) -> i64 {
        self.distances[from][to]
    }

    pub(crate) fn time(&self, from: usize, to: usize) -> i64 {
        self.durations[from][to]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverStatus {
    /// The search converged before the time limit.
    Optimal,
    /// The time limit cut the search short; the solution is valid.
    Feasible,
    /// No assignment satisfies the capacity and duration-ceiling constraints.
    NoSolution,
}

/// Solver output in node-index terms; the orchestrator maps indices back to
/// stops. Unused vehicles keep an empty route.
#[derive(Debug, Clone)]
pub struct CvrpSolution {
    /// Per vehicle: depot, visited nodes, depot - or empty when unused.
    pub routes: Vec<Vec<usize>>,
    /// Meters per vehicle, from the arc evaluator.
    pub distances: Vec<i64>,
    /// Passengers per vehicle.
    pub loads: Vec<i64>,
    pub total_distance: i64,
    pub vehicles_used: usize,
    pub status: SolverStatus,
}
