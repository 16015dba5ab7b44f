use thiserror::Error;

/// Failure surface of a planning session.
///
/// Strategy-level "no connector found for this root right now" is not an
/// error and is expressed as `Option::None` at the strategy boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScaffoldError {
    /// A defensive invariant was violated, either by a misbehaving strategy
    /// or by a bug in the incremental maintenance itself. Never retried;
    /// aborts the planning session.
    #[error("internal inconsistency: {0}")]
    InternalInconsistency(String),

    /// A full pass over all current roots produced no usable connector path.
    /// A legitimate terminal outcome, distinct from a contract violation.
    #[error("schematic cannot be fully connected: no root admits a connector path")]
    Unconnectable,
}

pub type ScaffoldResult<T> = std::result::Result<T, ScaffoldError>;
