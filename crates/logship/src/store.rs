//! Driver-agnostic seam between the shipper and the document database.
//!
//! The engine only ever talks to a [`DocumentStore`], obtained through a
//! [`StoreConnector`]. The MongoDB binding lives in [`crate::mongo`]; tests
//! substitute in-memory implementations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::config::Config;

/// One rejected document inside a bulk write, by position in the submitted
/// batch.
#[derive(Debug, Clone)]
pub struct WriteFailure {
    /// Index of the rejected document in the batch handed to `insert_many`.
    pub index: usize,
    pub code: i32,
    pub message: String,
}

/// Errors produced by a store, classified by how the engine reacts.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store accepted the batch but rejected individual documents.
    /// Documents not listed were persisted. Rejected ones go to the DLQ.
    #[error("bulk write rejected {} document(s)", failures.len())]
    Bulk { failures: Vec<WriteFailure> },

    /// The store could not be reached. Feeds the circuit breaker.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Anything else. Treated as a whole-batch transient failure.
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// Whether the whole batch should be re-staged and retried.
    pub fn is_transient(&self) -> bool {
        !matches!(self, StoreError::Bulk { .. })
    }
}

/// A connected handle to a document database.
///
/// `insert_many` must behave unordered: implementations keep writing past a
/// rejected document and report the rejects through
/// [`StoreError::Bulk`].
#[async_trait]
pub trait DocumentStore: Send + Sync + std::fmt::Debug {
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<(), StoreError>;

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<(), StoreError>;

    /// Lightweight reachability probe.
    async fn ping(&self) -> Result<(), StoreError>;

    /// Whether the handle believes its connection is still usable.
    /// Implementations flip this on connection-class operation failures;
    /// the connection manager discards unhealthy handles and reconnects.
    fn is_healthy(&self) -> bool {
        true
    }

    /// Release driver resources. Called once, on shutdown.
    async fn close(&self) {}
}

/// Factory opening [`DocumentStore`] handles from configuration.
#[async_trait]
pub trait StoreConnector: Send + Sync {
    async fn connect(&self, config: &Config) -> Result<Arc<dyn DocumentStore>, StoreError>;
}
