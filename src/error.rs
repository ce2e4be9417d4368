//! Crate-level error type.
//!
//! Mirrors the error kinds laid out for the engine: most variants are
//! recovered from locally (the offending node, polygon, or vertex is
//! dropped and counted in [`crate::diagnostics::Diagnostics`]) rather than
//! aborting a multi-step computation. Only [`ReachError::ConfigInvalid`],
//! [`ReachError::BadHorizon`], and [`ReachError::BadCorridorArgs`] are ever
//! returned to a caller; the rest are constructed purely so drop sites can
//! record *why* something was dropped.

use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ReachError {
    /// Raised at construction: non-finite parameter, `dt <= 0`, or a
    /// malformed horizon.
    ConfigInvalid(String),
    /// A polygon operation collapsed to fewer than 3 non-collinear
    /// vertices.
    Degenerate,
    /// The one-step LTI image of a reach node came back empty.
    PropagationEmpty,
    /// `compute(step_start, step_end)` was called with `step_start >=
    /// step_end` or `step_start < 0`.
    BadHorizon,
    /// A vertex or shape could not be converted into the curvilinear
    /// frame.
    OutsideProjectionDomain,
    /// Corridor extraction received exactly one of
    /// `longitudinal_positions`/`longitudinal_corridor` instead of both.
    BadCorridorArgs,
    /// A step was queried before `compute` reached it. Callers should
    /// treat this as an empty result with a logged warning, not a fault.
    UninitialisedQuery,
}

impl fmt::Display for ReachError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReachError::ConfigInvalid(msg) => write!(f, "invalid configuration: {msg}"),
            ReachError::Degenerate => write!(f, "polygon degenerated to fewer than 3 vertices"),
            ReachError::PropagationEmpty => write!(f, "propagated reach set is empty"),
            ReachError::BadHorizon => write!(f, "step_start must be >= 0 and < step_end"),
            ReachError::OutsideProjectionDomain => {
                write!(f, "vertex lies outside the curvilinear projection domain")
            }
            ReachError::BadCorridorArgs => write!(
                f,
                "longitudinal_positions and longitudinal_corridor must be given together"
            ),
            ReachError::UninitialisedQuery => {
                write!(f, "queried a step the engine has not computed yet")
            }
        }
    }
}

impl std::error::Error for ReachError {}

pub type Result<T> = std::result::Result<T, ReachError>;
