use thiserror::Error;

/// Reasons a run terminated before proving optimality.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    #[error("wall time limit reached")]
    TimeLimit,
    #[error("node limit reached")]
    NodeLimit,
    #[error("gap tolerance reached")]
    GapLimit,
    #[error("column generation iteration limit reached")]
    IterationLimit,
}

/// The single error type for the branch-and-price core.
///
/// `InvalidInstance` is the only variant a valid, already-loaded instance can avoid entirely;
/// the rest guard invariants that the core itself is responsible for upholding.
#[derive(Error, Debug)]
pub enum BpError {
    #[error("invalid instance: {0}")]
    InvalidInstance(String),

    #[error("pattern infeasible for pool (weight {weight} exceeds capacity {capacity})")]
    InfeasiblePattern { weight: u64, capacity: u64 },

    #[error("dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("conversion to a classic solution requires an integral relaxation")]
    IntegralityRequired,

    #[error("external solver failure: {0}")]
    SolverFailure(String),

    #[error("terminated: {0}")]
    Limit(#[from] LimitKind),
}

pub type BpResult<T> = Result<T, BpError>;
