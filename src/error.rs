//! Error types for chain construction and execution.
//!
//! Numeric divergences and max-depth cutoffs are *not* errors: they
//! truncate the current trajectory and show up as counters in
//! [`crate::stats::RunStats`]. The variants here are the fatal cases.

use thiserror::Error;

/// Error type targets may return from log-density or gradient evaluation.
///
/// Any such error is treated as unrecoverable and terminates the run;
/// non-finite *values* inside a trajectory are divergences instead.
pub type TargetError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum NutsError {
    /// Rejected before any iteration executes.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The initial position has a non-finite log-density or gradient.
    #[error("non-finite log-density or gradient at the initial position")]
    BadInitialPosition,

    /// The step-size heuristic exhausted its iteration cap without a
    /// finite acceptance ratio.
    #[error("no finite leapfrog step found after {0} search iterations")]
    StepSizeSearch(usize),

    /// The target's log-density or gradient evaluation failed.
    #[error("target evaluation failed")]
    TargetFailure(#[from] TargetError),
}

pub type Result<T> = std::result::Result<T, NutsError>;
