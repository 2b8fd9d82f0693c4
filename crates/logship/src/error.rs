use crate::store::StoreError;

/// Errors surfaced by the shipper to the host application.
///
/// Transient infrastructure failures never reach producers through
/// [`submit`](crate::batch::BatchManager::submit); they are absorbed by the
/// retry and dead-letter machinery. This enum covers what the host can
/// actually observe: startup validation, fast-failed acquires, and
/// shutdown outcomes.
#[derive(Debug, thiserror::Error)]
pub enum ShipperError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("circuit breaker is open")]
    CircuitOpen,

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("shipper is shut down")]
    ShutDown,

    #[error("graceful shutdown timed out")]
    ShutdownTimeout,
}
