//! Refiner error types.

use thiserror::Error;

/// Unrecoverable conditions detected while building or refining a model.
///
/// None of these are retried inside the refiner. The process boundary
/// decides how to terminate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefineError {
    #[error("snapshot has no processors")]
    EmptySnapshot,

    #[error("no processor available")]
    NoAvailableProcessor,

    #[error("object {object} was on processor {processor}, outside 0..{processors} in a complete snapshot")]
    InvalidAssignmentIndex {
        object: usize,
        processor: i64,
        processors: usize,
    },

    #[error("{what}: expected {expected} entries, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("processor {processor} reports speed 0")]
    ZeroSpeed { processor: usize },
}

pub type RefineResult<T> = Result<T, RefineError>;
