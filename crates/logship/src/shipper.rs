//! Application-facing surface.
//!
//! [`LogShipper`] wires the connection manager and the batch manager
//! together and exposes the four producer operations: `log`, `log_error`,
//! `flush` and `shutdown`. It performs no I/O of its own; ingress is pure
//! data-shaping.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::warn;

use crate::batch::manager::BatchManager;
use crate::batch::metrics::BatchMetricsSnapshot;
use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionMetrics};
use crate::entry::LogEntry;
use crate::error::ShipperError;
use crate::health::{HealthReport, HealthReporter};
use crate::mongo::MongoConnector;
use crate::store::StoreConnector;

pub struct LogShipper {
    connection: Arc<ConnectionManager>,
    batcher: Arc<BatchManager>,
    health: HealthReporter,
}

impl LogShipper {
    /// Start a shipper against MongoDB.
    ///
    /// Configuration problems are fatal here. An unreachable database is
    /// not: the initial connect is attempted so the breaker starts counting,
    /// and staging simply holds entries until the store comes up.
    pub async fn start(config: Config) -> Result<Self, ShipperError> {
        let shipper = Self::with_connector(config, Arc::new(MongoConnector))?;
        if let Err(err) = shipper.connection.acquire().await {
            warn!("SHIPPER | Initial connect failed, will retry on flush: {}", err);
        }
        Ok(shipper)
    }

    /// Start a shipper against any [`StoreConnector`] implementation.
    ///
    /// Must be called inside a Tokio runtime; the flush timer is spawned
    /// here.
    pub fn with_connector(
        config: Config,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, ShipperError> {
        config.validate()?;
        let config = Arc::new(config);
        let connection = Arc::new(ConnectionManager::new(Arc::clone(&config), connector));
        let batcher = Arc::new(BatchManager::new(
            Arc::clone(&config),
            Arc::clone(&connection),
        ));
        let health = HealthReporter::new(
            Arc::clone(&config),
            Arc::clone(&connection),
            Arc::clone(&batcher),
        );
        Ok(Self {
            connection,
            batcher,
            health,
        })
    }

    /// Stamp and stage an entry for `collection`.
    ///
    /// The ingress timestamp always wins: a caller-supplied `timestamp` is
    /// overwritten. Never fails for infrastructure reasons.
    pub fn log(&self, collection: &str, mut entry: LogEntry) {
        entry.timestamp = Utc::now();
        entry.collection = Some(collection.to_string());
        self.batcher.submit(entry);
    }

    /// Shape an error into an entry and stage it.
    ///
    /// The message comes from the error's display form and the stack from
    /// its cause chain. An error that renders empty is recorded as unknown,
    /// with its debug form attached.
    pub fn log_error(
        &self,
        collection: &str,
        error: &dyn std::error::Error,
        metadata: Option<Map<String, Value>>,
    ) {
        let mut entry = LogEntry::default();
        entry.level = Some("error".to_string());

        let message = error.to_string();
        if message.is_empty() {
            entry.message = Some("An unknown error occurred".to_string());
            entry
                .attrs
                .insert("errorDetails".to_string(), Value::String(format!("{error:?}")));
        } else {
            entry.message = Some(message);
            entry.stack = render_cause_chain(error);
        }
        entry.metadata = metadata;

        self.log(collection, entry);
    }

    /// Flush every staged batch and wait for the attempts to finish.
    pub async fn flush(&self) {
        self.batcher.flush_all().await;
    }

    /// Drain staged batches and close the store handle.
    ///
    /// The drain is bounded by `timeout`, defaulting to the configured
    /// graceful shutdown timeout. The connection is closed either way.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), ShipperError> {
        let drained = self.batcher.shutdown(timeout).await;
        self.connection.shutdown().await;
        drained
    }

    pub async fn health(&self) -> HealthReport {
        self.health.report().await
    }

    pub fn batch_metrics(&self) -> BatchMetricsSnapshot {
        self.batcher.metrics()
    }

    pub fn connection_metrics(&self) -> ConnectionMetrics {
        self.connection.metrics()
    }
}

fn render_cause_chain(error: &dyn std::error::Error) -> Option<String> {
    let mut frames = Vec::new();
    let mut source = error.source();
    while let Some(cause) = source {
        frames.push(cause.to_string());
        source = cause.source();
    }
    if frames.is_empty() {
        None
    } else {
        Some(format!("caused by: {}", frames.join("\ncaused by: ")))
    }
}
