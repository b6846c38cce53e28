use crate::solver::problem::CvrpProblem;

/// Interior node sequences per vehicle - no depot markers. The depot legs
/// are implicit in every metric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Assignment {
    pub routes: Vec<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct RouteMetrics {
    pub load: i64,
    pub distance: i64,
    pub duration: i64,
}

impl Assignment {
    pub fn empty(num_vehicles: usize) -> Self {
        Assignment {
            routes: vec![Vec::new(); num_vehicles],
        }
    }

    pub fn metrics(&self, problem: &CvrpProblem, vehicle: usize) -> RouteMetrics {
        route_metrics(problem, &self.routes[vehicle])
    }

    /// Full objective: fixed costs of used vehicles, arc distances, and
    /// overtime penalties.
    pub fn total_cost(&self, problem: &CvrpProblem) -> i64 {
        (0..self.routes.len())
            .map(|v| {
                if self.routes[v].is_empty() {
                    0
                } else {
                    route_cost(problem, v, &self.metrics(problem, v))
                }
            })
            .sum()
    }
}

pub(crate) fn route_metrics(problem: &CvrpProblem, nodes: &[usize]) -> RouteMetrics {
    if nodes.is_empty() {
        return RouteMetrics::default();
    }

    let depot = problem.depot;
    let mut load = 0;
    let mut distance = problem.dist(depot, nodes[0]);
    let mut duration = problem.time(depot, nodes[0]);

    for pair in nodes.windows(2) {
        distance += problem.dist(pair[0], pair[1]);
        duration += problem.time(pair[0], pair[1]);
    }
    for &node in nodes {
        load += problem.demands[node];
    }

    let last = nodes[nodes.len() - 1];
    distance += problem.dist(last, depot);
    duration += problem.time(last, depot);

    RouteMetrics {
        load,
        distance,
        duration,
    }
}

/// Cost contribution of one non-empty route. Callers pass 0 for empty routes.
pub(crate) fn route_cost(problem: &CvrpProblem, vehicle: usize, metrics: &RouteMetrics) -> i64 {
    problem.fixed_cost(vehicle) + metrics.distance + problem.overtime_penalty(metrics.duration)
}

/// Hard-constraint check for a candidate route.
pub(crate) fn route_feasible(
    problem: &CvrpProblem,
    vehicle: usize,
    metrics: &RouteMetrics,
) -> bool {
    metrics.load <= problem.capacities[vehicle] && metrics.duration <= problem.duration_ceiling()
}
