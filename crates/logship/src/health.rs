//! Aggregated health view over the connection and batch subsystems.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::batch::manager::BatchManager;
use crate::batch::metrics::BatchMetricsSnapshot;
use crate::config::Config;
use crate::connection::{ConnectionManager, ConnectionMetrics, HealthProbe};

/// Flush failure ratio above which batching is reported degraded.
const FAILURE_RATIO_THRESHOLD: f64 = 0.1;

/// Staged-memory ratio above which batching is reported degraded.
const MEMORY_RATIO_THRESHOLD: f64 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Up,
    Degraded,
    Down,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Structured health report: overall status, both component statuses, and
/// the raw metrics they were derived from.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub timestamp: DateTime<Utc>,
    pub status: HealthStatus,
    pub database: ComponentHealth,
    pub batching: ComponentHealth,
    pub connection_metrics: ConnectionMetrics,
    pub batch_metrics: BatchMetricsSnapshot,
}

pub struct HealthReporter {
    config: Arc<Config>,
    connection: Arc<ConnectionManager>,
    batcher: Arc<BatchManager>,
}

impl HealthReporter {
    pub fn new(
        config: Arc<Config>,
        connection: Arc<ConnectionManager>,
        batcher: Arc<BatchManager>,
    ) -> Self {
        Self {
            config,
            connection,
            batcher,
        }
    }

    /// Assemble the current health view. Metric reads are individually
    /// atomic; slightly stale values across fields are acceptable here.
    pub async fn report(&self) -> HealthReport {
        let probe = self.connection.health_probe().await;
        let database = match probe {
            HealthProbe::Up => ComponentHealth {
                status: HealthStatus::Up,
                reason: None,
            },
            HealthProbe::Down { reason } => ComponentHealth {
                status: HealthStatus::Down,
                reason: Some(reason),
            },
        };

        let batch_metrics = self.batcher.metrics();
        let batching = batch_health(&batch_metrics, self.config.max_memory_usage);

        let status = if database.status == HealthStatus::Down {
            HealthStatus::Down
        } else if batching.status == HealthStatus::Degraded {
            HealthStatus::Degraded
        } else {
            HealthStatus::Up
        };

        HealthReport {
            timestamp: Utc::now(),
            status,
            database,
            batching,
            connection_metrics: self.connection.metrics(),
            batch_metrics,
        }
    }
}

/// Batching is degraded when flushes keep failing or staged memory is close
/// to the cap.
fn batch_health(metrics: &BatchMetricsSnapshot, max_memory_usage: usize) -> ComponentHealth {
    let failure_ratio =
        metrics.total_flush_failures as f64 / metrics.total_batches_flushed.max(1) as f64;
    let memory_ratio = metrics.current_memory_usage as f64 / max_memory_usage.max(1) as f64;

    if failure_ratio > FAILURE_RATIO_THRESHOLD {
        ComponentHealth {
            status: HealthStatus::Degraded,
            reason: Some(format!("flush failure ratio {failure_ratio:.2}")),
        }
    } else if memory_ratio > MEMORY_RATIO_THRESHOLD {
        ComponentHealth {
            status: HealthStatus::Degraded,
            reason: Some(format!("staged memory at {:.0}% of cap", memory_ratio * 100.0)),
        }
    } else {
        ComponentHealth {
            status: HealthStatus::Up,
            reason: None,
        }
    }
}
