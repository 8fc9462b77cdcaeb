use crate::route::TableRef;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

/// Failures reported by a route store backend
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("API error {status} ({code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("HTTP transport error: {0}")]
    Http(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Credential error: {0}")]
    Credential(String),

    #[error("Long-running operation error: {0}")]
    Operation(String),

    #[error("Route table not found: {0}")]
    NotFound(TableRef),
}

/// Errors that abort a single reconciliation pass
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Failed to fetch route table {table}: {source}")]
    Fetch {
        table: TableRef,
        #[source]
        source: StoreError,
    },

    #[error("Failed to apply route table {table}: {source}")]
    Apply {
        table: TableRef,
        #[source]
        source: StoreError,
    },
}

impl ReconcileError {
    /// Short label used for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            ReconcileError::Fetch { .. } => "fetch_error",
            ReconcileError::Apply { .. } => "apply_error",
        }
    }
}

/// Errors that stop the control loop
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("Node cache failed to sync before the event source stopped")]
    CacheSync,
}
