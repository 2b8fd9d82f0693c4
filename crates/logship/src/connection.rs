//! Connection manager: owns the single store handle.
//!
//! `acquire` hands out a cached handle when one is live, otherwise runs a
//! connect attempt. Attempts are serialized on an async mutex, so callers
//! arriving mid-connect suspend until the in-flight attempt resolves.
//! Repeated failures trip the circuit breaker, after which `acquire` fails
//! fast without touching the driver until the open window elapses and the
//! next call runs the half-open trial.
//!
//! A handle that marks itself unhealthy (the driver lost its connection) is
//! discarded on the next `acquire`, the disconnect is recorded, and a fresh
//! connect attempt follows.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::breaker::{BreakerState, CircuitBreaker, Decision};
use crate::config::Config;
use crate::error::ShipperError;
use crate::store::{DocumentStore, StoreConnector};

/// Observable connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Snapshot of connection bookkeeping.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionMetrics {
    pub successes: u64,
    pub failures: u64,
    pub reconnects: u64,
    pub last_connection_time: Option<DateTime<Utc>>,
    pub last_disconnect_time: Option<DateTime<Utc>>,
    pub state: ConnectionState,
    pub breaker_state: BreakerState,
}

/// Result of the lightweight health probe.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum HealthProbe {
    Up,
    Down { reason: String },
}

impl HealthProbe {
    pub fn is_up(&self) -> bool {
        matches!(self, HealthProbe::Up)
    }
}

struct MetricsInner {
    successes: u64,
    failures: u64,
    reconnects: u64,
    last_connection_time: Option<DateTime<Utc>>,
    last_disconnect_time: Option<DateTime<Utc>>,
    state: ConnectionState,
}

pub struct ConnectionManager {
    config: Arc<Config>,
    connector: Arc<dyn StoreConnector>,
    breaker: CircuitBreaker,
    /// Cached live handle. Guarded by a sync mutex; never held across await.
    handle: Mutex<Option<Arc<dyn DocumentStore>>>,
    /// Serializes connect attempts; waiters suspend until the attempt
    /// in flight resolves.
    connect_lock: tokio::sync::Mutex<()>,
    metrics: Mutex<MetricsInner>,
    shut_down: AtomicBool,
}

impl ConnectionManager {
    pub fn new(config: Arc<Config>, connector: Arc<dyn StoreConnector>) -> Self {
        Self::with_breaker(config, connector, CircuitBreaker::default())
    }

    pub(crate) fn with_breaker(
        config: Arc<Config>,
        connector: Arc<dyn StoreConnector>,
        breaker: CircuitBreaker,
    ) -> Self {
        Self {
            config,
            connector,
            breaker,
            handle: Mutex::new(None),
            connect_lock: tokio::sync::Mutex::new(()),
            metrics: Mutex::new(MetricsInner {
                successes: 0,
                failures: 0,
                reconnects: 0,
                last_connection_time: None,
                last_disconnect_time: None,
                state: ConnectionState::Disconnected,
            }),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Hand out a ready-to-use store handle, connecting if necessary.
    ///
    /// Fails fast with [`ShipperError::CircuitOpen`] while the breaker is
    /// inside its open window. Connect failures are counted against the
    /// breaker and re-raised; callers treat them as non-fatal.
    pub async fn acquire(&self) -> Result<Arc<dyn DocumentStore>, ShipperError> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ShipperError::ShutDown);
        }
        if self.breaker.check() == Decision::Reject {
            return Err(ShipperError::CircuitOpen);
        }
        if let Some(store) = self.cached_healthy() {
            return Ok(store);
        }

        let _attempt = self.connect_lock.lock().await;
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(ShipperError::ShutDown);
        }
        // Another caller may have finished connecting while we waited.
        if let Some(store) = self.cached_healthy() {
            return Ok(store);
        }
        // The breaker may have opened while we waited on a failing attempt.
        if self.breaker.check() == Decision::Reject {
            return Err(ShipperError::CircuitOpen);
        }
        self.connect_attempt().await
    }

    async fn connect_attempt(&self) -> Result<Arc<dyn DocumentStore>, ShipperError> {
        let reconnecting = {
            let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
            let reconnecting = metrics.successes > 0;
            metrics.state = if reconnecting {
                ConnectionState::Reconnecting
            } else {
                ConnectionState::Connecting
            };
            reconnecting
        };
        debug!("CONN | Opening store connection");

        match self.connector.connect(&self.config).await {
            Ok(store) => {
                self.breaker.record_success();
                {
                    let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                    metrics.successes += 1;
                    if reconnecting {
                        metrics.reconnects += 1;
                    }
                    metrics.last_connection_time = Some(Utc::now());
                    metrics.state = ConnectionState::Connected;
                }
                *self.handle.lock().expect("handle lock poisoned") = Some(Arc::clone(&store));
                info!("CONN | Store connection established");
                Ok(store)
            }
            Err(err) => {
                self.breaker.record_failure();
                {
                    let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                    metrics.failures += 1;
                    metrics.state = ConnectionState::Disconnected;
                }
                warn!("CONN | Connect attempt failed: {}", err);
                Err(err.into())
            }
        }
    }

    /// Return the cached handle if it is still usable. A handle that went
    /// unhealthy is dropped here, with disconnect bookkeeping.
    fn cached_healthy(&self) -> Option<Arc<dyn DocumentStore>> {
        let mut slot = self.handle.lock().expect("handle lock poisoned");
        match slot.as_ref().map(|store| store.is_healthy()) {
            Some(true) => slot.as_ref().map(Arc::clone),
            Some(false) => {
                *slot = None;
                drop(slot);
                warn!("CONN | Store connection lost, will reconnect on demand");
                let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
                metrics.last_disconnect_time = Some(Utc::now());
                metrics.state = ConnectionState::Disconnected;
                None
            }
            None => None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.cached_healthy().is_some()
    }

    /// Whether an `acquire` made right now would fail fast.
    pub fn is_circuit_open(&self) -> bool {
        self.breaker.is_open()
    }

    /// Ping the store. Down when not connected or when the ping fails.
    pub async fn health_probe(&self) -> HealthProbe {
        let Some(store) = self.cached_healthy() else {
            return HealthProbe::Down {
                reason: "not connected".to_string(),
            };
        };
        match store.ping().await {
            Ok(()) => HealthProbe::Up,
            Err(err) => HealthProbe::Down {
                reason: err.to_string(),
            },
        }
    }

    pub fn metrics(&self) -> ConnectionMetrics {
        let metrics = self.metrics.lock().expect("metrics lock poisoned");
        ConnectionMetrics {
            successes: metrics.successes,
            failures: metrics.failures,
            reconnects: metrics.reconnects,
            last_connection_time: metrics.last_connection_time,
            last_disconnect_time: metrics.last_disconnect_time,
            state: metrics.state,
            breaker_state: self.breaker.state(),
        }
    }

    /// Close the handle. Subsequent `acquire` calls fail with
    /// [`ShipperError::ShutDown`].
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let store = self.handle.lock().expect("handle lock poisoned").take();
        if let Some(store) = store {
            store.close().await;
        }
        let mut metrics = self.metrics.lock().expect("metrics lock poisoned");
        metrics.last_disconnect_time = Some(Utc::now());
        metrics.state = ConnectionState::Disconnected;
        info!("CONN | Connection manager shut down");
    }
}
