use thiserror::Error;

/// Error kinds surfaced by the planning core. Lower layers signal by kind;
/// the orchestrator and editor own the user-visible wording.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    InputInvalid(String),

    /// The solver stayed infeasible after the fleet-escalation retries.
    #[error("no feasible plan within the {max_travel_time} min route limit; add vehicles or relax the limit")]
    TimeConstraintInfeasible { max_travel_time: u32 },

    #[error("{0}")]
    EditorConflict(String),

    #[error("plan {0} not found")]
    PlanNotFound(i64),

    #[error("route {0} not found")]
    RouteNotFound(i64),

    #[error("employee {0} not found")]
    EmployeeNotFound(i64),

    #[error("shift {0} not found")]
    ShiftNotFound(i64),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("database error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
