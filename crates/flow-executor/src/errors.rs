//! Executor error taxonomy.

use thiserror::Error;

/// Precondition and infrastructure errors for a run.
///
/// A step whose expectation goes unmet is not an `ExecutorError`; it produces
/// a failed [`questline_core_types::ExecutionResult`] instead.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("flow {id} has no steps")]
    EmptyFlow { id: String },

    #[error("flow {id} was already executed; executor runs are single-use")]
    AlreadyRan { id: String },
}
