//! Asynchronous, batched log shipping to MongoDB-compatible document
//! stores.
//!
//! Producers hand entries to a [`LogShipper`]; the shipper stamps and
//! routes them, stages them per destination collection, and delivers them
//! in unordered bulk inserts. Delivery survives transient database failure
//! through staged retry with backoff and a circuit-broken connection
//! manager; documents the store rejects permanently are diverted to a
//! per-collection dead-letter collection.
//!
//! # Pipeline
//!
//! ```text
//!   producer ──> LogShipper ──> BatchManager ──> ConnectionManager ──> store
//!                (ingress)       (staging,         (handle cache,
//!                                 flushing)         circuit breaker)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use logship::{Config, LogEntry, LogShipper};
//!
//! # async fn run() -> Result<(), logship::ShipperError> {
//! let shipper = LogShipper::start(Config::new("mongodb://localhost:27017/app")).await?;
//!
//! shipper.log("requests", LogEntry::message("GET /health").with_level("info"));
//!
//! shipper.shutdown(None).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Guarantees and non-guarantees
//!
//! Entries are buffered in memory: an abrupt process termination loses
//! whatever is staged beyond the graceful-shutdown drain. Intra-collection
//! submission order is preserved into each bulk write on a best-effort
//! basis; no ordering holds across collections. There is no read path.

pub mod batch;
mod breaker;
pub mod config;
pub mod connection;
pub mod entry;
pub mod error;
pub mod health;
pub mod mongo;
pub mod shipper;
pub mod store;

pub use batch::{BatchManager, BatchMetricsSnapshot};
pub use breaker::BreakerState;
pub use config::{Config, ConnectionOptions};
pub use connection::{ConnectionManager, ConnectionMetrics, ConnectionState, HealthProbe};
pub use entry::{DeadLetterRecord, LogEntry};
pub use error::ShipperError;
pub use health::{ComponentHealth, HealthReport, HealthReporter, HealthStatus};
pub use mongo::MongoConnector;
pub use shipper::LogShipper;
pub use store::{DocumentStore, StoreConnector, StoreError, WriteFailure};
