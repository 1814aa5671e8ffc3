//! Reconciliation error types.

use thiserror::Error;

use monguard_state::StateError;

/// Errors that end a reconciliation pass.
///
/// Progress made before the error is kept; the next periodic pass
/// continues from wherever this one stopped.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Uninitialized state or an invalid desired spec. Nothing was mutated.
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("quorum status query failed: {0:#}")]
    RemoteQuery(anyhow::Error),

    #[error("failed to schedule member {id}: {source:#}")]
    Scheduling {
        id: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("workload operation on {resource} failed: {source:#}")]
    Workload {
        resource: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("config store error: {0}")]
    Persistence(#[from] StateError),
}

pub type ReconcileResult<T> = Result<T, ReconcileError>;

impl ReconcileError {
    pub(crate) fn workload(resource: impl Into<String>) -> impl FnOnce(anyhow::Error) -> Self {
        let resource = resource.into();
        move |source| ReconcileError::Workload { resource, source }
    }
}
