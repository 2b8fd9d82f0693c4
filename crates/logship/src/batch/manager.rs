//! Per-collection staging and bulk flushing.
//!
//! Entries are staged in one batch per destination collection. A flush is
//! triggered by batch size, by the global memory cap, or by the periodic
//! timer once a batch is older than the flush interval. Flushes run as
//! spawned tasks, at most one per collection at a time, concurrently across
//! collections.
//!
//! ```text
//!   submit ──> collection batch ──(size/time/memory)──> flush task
//!                   ^                                       │
//!                   │ re-stage on transient failure         v
//!                   └────────────────────────────── store.insert_many
//!                                                           │
//!                                  rejected documents ──> <collection>_dlq
//! ```
//!
//! The flush start performs an atomic swap: under the state lock the live
//! batch is replaced with a fresh empty one and the old batch is handed to
//! the flush task. Producers arriving after the swap can only see the new
//! batch, so no entry is lost or flushed twice regardless of interleaving.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use serde_json::json;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::batch::metrics::{BatchMetrics, BatchMetricsSnapshot};
use crate::config::Config;
use crate::connection::ConnectionManager;
use crate::entry::{DeadLetterRecord, LogEntry, StagedEntry};
use crate::error::ShipperError;
use crate::store::StoreError;

/// Ceiling for the per-collection retry backoff.
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(30);

/// Staged state for one destination collection. Created on the first entry
/// routed to the collection and reused for the life of the process.
struct CollectionBatch {
    entries: Vec<StagedEntry>,
    /// When the last flush of this collection started.
    last_flush: Instant,
    /// Estimated bytes staged in `entries`.
    memory_bytes: usize,
    /// Consecutive transient flush failures in the current episode.
    retries: u32,
    last_failure: Option<Instant>,
}

impl CollectionBatch {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            last_flush: Instant::now(),
            memory_bytes: 0,
            retries: 0,
            last_failure: None,
        }
    }
}

struct BatchState {
    batches: HashMap<String, CollectionBatch>,
    /// Collections with a flush task currently running.
    in_flight: HashSet<String>,
    /// Sum of `memory_bytes` across all batches.
    total_memory: usize,
}

struct ManagerInner {
    config: Arc<Config>,
    connection: Arc<ConnectionManager>,
    state: Mutex<BatchState>,
    metrics: BatchMetrics,
    cancel: CancellationToken,
    shutting_down: AtomicBool,
}

/// Stages entries per destination collection and flushes them in bulk.
///
/// Must be created inside a Tokio runtime; the flush timer and every flush
/// run as spawned tasks.
pub struct BatchManager {
    inner: Arc<ManagerInner>,
}

impl BatchManager {
    pub fn new(config: Arc<Config>, connection: Arc<ConnectionManager>) -> Self {
        let inner = Arc::new(ManagerInner {
            config,
            connection,
            state: Mutex::new(BatchState {
                batches: HashMap::new(),
                in_flight: HashSet::new(),
                total_memory: 0,
            }),
            metrics: BatchMetrics::default(),
            cancel: CancellationToken::new(),
            shutting_down: AtomicBool::new(false),
        });
        ManagerInner::spawn_timer(Arc::clone(&inner));
        Self { inner }
    }

    /// Stage an entry. Never blocks beyond the local queueing work and never
    /// fails for infrastructure reasons; a triggered flush runs concurrently.
    ///
    /// After shutdown has begun, entries bypass batching and are written as
    /// single inserts; if the store is unavailable they are dropped with a
    /// diagnostic.
    pub fn submit(&self, mut entry: LogEntry) {
        let inner = &self.inner;
        let collection = match entry.collection.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => inner.config.default_collection.clone(),
        };
        entry.collection = Some(collection.clone());

        if inner.shutting_down.load(Ordering::SeqCst) {
            inner.submit_direct(collection, entry);
            return;
        }

        let staged = StagedEntry::new(entry);
        let size = staged.size_bytes;
        let (should_flush, already_flushing) = {
            let mut guard = inner.state.lock().expect("batch state lock poisoned");
            let state = &mut *guard;
            let batch = state
                .batches
                .entry(collection.clone())
                .or_insert_with(CollectionBatch::new);
            batch.entries.push(staged);
            batch.memory_bytes += size;
            let batch_len = batch.entries.len();
            state.total_memory += size;

            let should_flush = batch_len >= inner.config.batch_size
                || state.total_memory >= inner.config.max_memory_usage;
            (should_flush, state.in_flight.contains(&collection))
        };
        inner.metrics.entries_processed.fetch_add(1, Ordering::Relaxed);

        if should_flush && !already_flushing {
            tokio::spawn(Arc::clone(inner).flush_collection(collection));
        }
    }

    /// Flush every non-empty collection batch and wait for the attempts to
    /// finish. Collections already being flushed by another task are left to
    /// that task. A no-op on a quiescent manager.
    pub async fn flush_all(&self) {
        let names: Vec<String> = {
            let guard = self.inner.state.lock().expect("batch state lock poisoned");
            guard
                .batches
                .iter()
                .filter(|(_, batch)| !batch.entries.is_empty())
                .map(|(name, _)| name.clone())
                .collect()
        };
        join_all(
            names
                .into_iter()
                .map(|name| Arc::clone(&self.inner).flush_collection(name)),
        )
        .await;
    }

    pub fn metrics(&self) -> BatchMetricsSnapshot {
        let (memory, active) = {
            let guard = self.inner.state.lock().expect("batch state lock poisoned");
            (guard.total_memory, guard.batches.len())
        };
        self.inner.metrics.snapshot(memory, active)
    }

    /// Begin shutdown: stop the timer, drain every staged batch, and bound
    /// the drain by `timeout` (the configured graceful shutdown timeout when
    /// `None`). Idempotent.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> Result<(), ShipperError> {
        if self.inner.shutting_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.inner.cancel.cancel();
        info!("BATCH | Shutting down, draining staged batches");

        let limit = timeout.unwrap_or(self.inner.config.graceful_shutdown_timeout);
        match tokio::time::timeout(limit, self.flush_all()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                warn!("BATCH | Shutdown drain exceeded {:?}", limit);
                Err(ShipperError::ShutdownTimeout)
            }
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.shutting_down.load(Ordering::SeqCst)
    }
}

impl ManagerInner {
    fn spawn_timer(inner: Arc<Self>) {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => ManagerInner::periodic_pass(&inner),
                    () = inner.cancel.cancelled() => {
                        debug!("BATCH | Flush timer stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Schedule a flush for every stale, non-empty, not-in-flight batch.
    /// Ticks are fire-and-forget; flushes from one tick may still be running
    /// on the next, in which case the in-flight set skips them.
    fn periodic_pass(inner: &Arc<Self>) {
        let due: Vec<String> = {
            let guard = inner.state.lock().expect("batch state lock poisoned");
            guard
                .batches
                .iter()
                .filter(|(name, batch)| {
                    !batch.entries.is_empty()
                        && !guard.in_flight.contains(*name)
                        && batch.last_flush.elapsed() >= inner.config.flush_interval
                        && batch
                            .last_failure
                            .map(|at| {
                                at.elapsed()
                                    >= backoff_delay(inner.config.retry_delay, batch.retries)
                            })
                            .unwrap_or(true)
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        for name in due {
            tokio::spawn(Arc::clone(inner).flush_collection(name));
        }
    }

    /// Flush one collection.
    ///
    /// Skips out when the circuit is open, when another flush for this
    /// collection is running, or when the batch is empty. Otherwise swaps
    /// the live batch out atomically and writes it.
    fn flush_collection(
        self: Arc<Self>,
        collection: String,
    ) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.flush_collection_inner(collection).await })
    }

    async fn flush_collection_inner(self: Arc<Self>, collection: String) {
        if self.connection.is_circuit_open() {
            debug!(
                "BATCH | Circuit open, leaving {} staged for the next tick",
                collection
            );
            return;
        }

        let swapped = {
            let mut guard = self.state.lock().expect("batch state lock poisoned");
            let state = &mut *guard;
            if state.in_flight.contains(&collection) {
                None
            } else {
                match state.batches.get_mut(&collection) {
                    Some(batch) if !batch.entries.is_empty() => {
                        let entries = std::mem::take(&mut batch.entries);
                        let bytes = std::mem::replace(&mut batch.memory_bytes, 0);
                        batch.last_flush = Instant::now();
                        state.total_memory = state.total_memory.saturating_sub(bytes);
                        state.in_flight.insert(collection.clone());
                        Some((entries, bytes))
                    }
                    _ => None,
                }
            }
        };
        let Some((to_flush, bytes)) = swapped else {
            return;
        };

        let mut failed_transiently = false;
        match self.write_batch(&collection, &to_flush).await {
            Ok(()) => {
                self.metrics.record_flush(to_flush.len() as u64);
                self.clear_retry_state(&collection);
                debug!(
                    "BATCH | Flushed {} entries to {}",
                    to_flush.len(),
                    collection
                );
            }
            Err(ShipperError::Store(StoreError::Bulk { failures })) => {
                // The store kept everything it did not list. Listed documents
                // are permanently bad for this collection; route them to the
                // DLQ instead of retrying.
                let records = build_dead_letters(&collection, &to_flush, &failures);
                let persisted = to_flush.len() - records.len();
                self.metrics.record_flush(persisted as u64);
                self.metrics
                    .entries_dead_lettered
                    .fetch_add(records.len() as u64, Ordering::Relaxed);
                self.clear_retry_state(&collection);
                warn!(
                    "BATCH | {} of {} entries rejected by {}, dead-lettering",
                    records.len(),
                    to_flush.len(),
                    collection
                );
                self.dead_letter(&collection, records).await;
            }
            Err(err) => {
                failed_transiently = true;
                self.requeue(&collection, to_flush, bytes);
                self.metrics.record_transient_failure();
                warn!(
                    "BATCH | Flush of {} failed, entries re-staged for retry: {}",
                    collection, err
                );
            }
        }

        let refill_ready = {
            let mut guard = self.state.lock().expect("batch state lock poisoned");
            let state = &mut *guard;
            state.in_flight.remove(&collection);
            state
                .batches
                .get(&collection)
                .map(|batch| batch.entries.len() >= self.config.batch_size)
                .unwrap_or(false)
        };
        // Entries that piled up past the threshold while this flush ran
        // would otherwise wait for the timer. Not done after a transient
        // failure; those wait for the backoff gate.
        if refill_ready && !failed_transiently && !self.shutting_down.load(Ordering::SeqCst) {
            tokio::spawn(Arc::clone(&self).flush_collection(collection));
        }
    }

    async fn write_batch(
        &self,
        collection: &str,
        staged: &[StagedEntry],
    ) -> Result<(), ShipperError> {
        let store = self.connection.acquire().await?;
        let docs = staged.iter().map(|s| s.entry.to_document()).collect();
        store.insert_many(collection, docs).await?;
        Ok(())
    }

    /// Put a transiently failed batch back at the front of the live batch,
    /// preserving original submission order, and restore its bytes.
    fn requeue(&self, collection: &str, mut entries: Vec<StagedEntry>, bytes: usize) {
        for staged in &mut entries {
            staged.retry_count += 1;
        }
        let mut guard = self.state.lock().expect("batch state lock poisoned");
        let state = &mut *guard;
        let batch = state
            .batches
            .entry(collection.to_string())
            .or_insert_with(CollectionBatch::new);
        let newer = std::mem::take(&mut batch.entries);
        entries.extend(newer);
        batch.entries = entries;
        batch.memory_bytes += bytes;
        batch.retries += 1;
        batch.last_failure = Some(Instant::now());
        state.total_memory += bytes;
    }

    fn clear_retry_state(&self, collection: &str) {
        let mut guard = self.state.lock().expect("batch state lock poisoned");
        if let Some(batch) = guard.batches.get_mut(collection) {
            batch.retries = 0;
            batch.last_failure = None;
        }
    }

    /// Write dead-letter records to `<collection>_dlq`. A failure here is
    /// logged at error severity and the records are dropped; there is no
    /// secondary dead-letter path.
    async fn dead_letter(&self, collection: &str, records: Vec<DeadLetterRecord>) {
        if records.is_empty() {
            return;
        }
        let dlq = format!("{collection}_dlq");
        let docs = records.iter().map(|r| r.to_document()).collect();
        let result = match self.connection.acquire().await {
            Ok(store) => store
                .insert_many(&dlq, docs)
                .await
                .map_err(ShipperError::from),
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            error!(
                "BATCH | Failed to write {} dead-letter record(s) to {}, dropping them: {}",
                records.len(),
                dlq,
                err
            );
        }
    }

    /// Shutdown bypass: write the entry on its own, or drop it.
    fn submit_direct(&self, collection: String, entry: LogEntry) {
        let connection = Arc::clone(&self.connection);
        let doc = entry.to_document();
        tokio::spawn(async move {
            let result = match connection.acquire().await {
                Ok(store) => store.insert_one(&collection, doc).await.map_err(ShipperError::from),
                Err(err) => Err(err),
            };
            if let Err(err) = result {
                warn!(
                    "BATCH | Dropping entry submitted during shutdown for {}: {}",
                    collection, err
                );
            }
        });
    }
}

/// Exponential backoff for a collection in a failure episode, from the
/// configured base delay, capped at [`MAX_RETRY_BACKOFF`].
fn backoff_delay(base: Duration, retries: u32) -> Duration {
    if retries == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32 << (retries - 1).min(5);
    (base * factor).min(MAX_RETRY_BACKOFF)
}

fn build_dead_letters(
    collection: &str,
    staged: &[StagedEntry],
    failures: &[crate::store::WriteFailure],
) -> Vec<DeadLetterRecord> {
    failures
        .iter()
        .filter_map(|failure| staged.get(failure.index).map(|entry| (failure, entry)))
        .map(|(failure, entry)| DeadLetterRecord {
            original_log: entry.entry.clone(),
            error_details: json!({
                "code": failure.code,
                "message": failure.message,
                "batchId": entry.batch_id.to_string(),
            }),
            failed_at: Utc::now(),
            source_collection: collection.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{DocumentStore, StoreConnector, WriteFailure};
    use async_trait::async_trait;
    use serde_json::Value;
    use std::collections::VecDeque;

    #[derive(Debug)]
    struct RecordingStore {
        collections: Mutex<HashMap<String, Vec<Value>>>,
        planned_failures: Mutex<VecDeque<StoreError>>,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                collections: Mutex::new(HashMap::new()),
                planned_failures: Mutex::new(VecDeque::new()),
            })
        }

        fn plan_failure(&self, error: StoreError) {
            self.planned_failures.lock().unwrap().push_back(error);
        }

        fn docs(&self, collection: &str) -> Vec<Value> {
            self.collections
                .lock()
                .unwrap()
                .get(collection)
                .cloned()
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl DocumentStore for RecordingStore {
        async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<(), StoreError> {
            if let Some(error) = self.planned_failures.lock().unwrap().pop_front() {
                if let StoreError::Bulk { failures } = &error {
                    // Unordered semantics: keep everything not listed.
                    let rejected: HashSet<usize> =
                        failures.iter().map(|f| f.index).collect();
                    let mut collections = self.collections.lock().unwrap();
                    let slot = collections.entry(collection.to_string()).or_default();
                    for (index, doc) in docs.into_iter().enumerate() {
                        if !rejected.contains(&index) {
                            slot.push(doc);
                        }
                    }
                }
                return Err(error);
            }
            let mut collections = self.collections.lock().unwrap();
            collections
                .entry(collection.to_string())
                .or_default()
                .extend(docs);
            Ok(())
        }

        async fn insert_one(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
            self.insert_many(collection, vec![doc]).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct RecordingConnector {
        store: Arc<RecordingStore>,
    }

    #[async_trait]
    impl StoreConnector for RecordingConnector {
        async fn connect(&self, _: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
            Ok(Arc::clone(&self.store) as Arc<dyn DocumentStore>)
        }
    }

    fn test_config(batch_size: usize, flush_interval_ms: u64) -> Arc<Config> {
        let mut config = Config::new("mongodb://localhost:27017/test");
        config.batch_size = batch_size;
        config.flush_interval = Duration::from_millis(flush_interval_ms);
        config.retry_delay = Duration::from_millis(20);
        Arc::new(config)
    }

    fn build_manager(
        batch_size: usize,
        flush_interval_ms: u64,
    ) -> (BatchManager, Arc<RecordingStore>) {
        let store = RecordingStore::new();
        let config = test_config(batch_size, flush_interval_ms);
        let connection = Arc::new(ConnectionManager::new(
            Arc::clone(&config),
            Arc::new(RecordingConnector {
                store: Arc::clone(&store),
            }) as Arc<dyn StoreConnector>,
        ));
        (BatchManager::new(config, connection), store)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_below_threshold_stays_staged() {
        let (manager, store) = build_manager(10, 60_000);
        for i in 0..9 {
            manager.submit(LogEntry::message(format!("entry {i}")));
        }
        settle().await;

        assert!(store.docs("logs").is_empty());
        let metrics = manager.metrics();
        assert_eq!(metrics.total_entries_processed, 9);
        assert_eq!(metrics.total_batches_flushed, 0);
        assert!(metrics.current_memory_usage > 0);
    }

    #[tokio::test]
    async fn test_batch_size_triggers_flush() {
        let (manager, store) = build_manager(10, 60_000);
        for i in 0..10 {
            manager.submit(LogEntry::message(format!("entry {i}")));
        }
        settle().await;

        assert_eq!(store.docs("logs").len(), 10);
        let metrics = manager.metrics();
        assert_eq!(metrics.total_batches_flushed, 1);
        assert_eq!(metrics.current_memory_usage, 0);
        assert_eq!(metrics.average_batch_size, 10.0);
    }

    #[tokio::test]
    async fn test_flushed_documents_have_no_bookkeeping_fields() {
        let (manager, store) = build_manager(1, 60_000);
        manager.submit(LogEntry::message("solo").with_level("info"));
        settle().await;

        let docs = store.docs("logs");
        assert_eq!(docs.len(), 1);
        let text = docs[0].to_string();
        assert!(!text.contains("batchId"));
        assert!(!text.contains("retryCount"));
        assert_eq!(docs[0]["message"], "solo");
        assert_eq!(docs[0]["collection"], "logs");
    }

    #[tokio::test]
    async fn test_memory_cap_forces_flush() {
        let store = RecordingStore::new();
        // A one-byte cap makes any single entry trip the memory trigger.
        let config = {
            let mut config = Config::new("mongodb://localhost:27017/test");
            config.batch_size = 1_000;
            config.flush_interval = Duration::from_secs(60);
            config.max_memory_usage = 1;
            Arc::new(config)
        };
        let connection = Arc::new(ConnectionManager::new(
            Arc::clone(&config),
            Arc::new(RecordingConnector {
                store: Arc::clone(&store),
            }) as Arc<dyn StoreConnector>,
        ));
        let manager = BatchManager::new(config, connection);

        manager.submit(LogEntry::message("big enough"));
        settle().await;
        assert_eq!(store.docs("logs").len(), 1);
    }

    #[tokio::test]
    async fn test_transient_failure_restages_and_retries() {
        let (manager, store) = build_manager(3, 50);
        store.plan_failure(StoreError::Other("transient".to_string()));

        for i in 0..3 {
            manager.submit(LogEntry::message(format!("entry {i}")));
        }
        // First attempt fails; the timer retries after the backoff gate.
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(store.docs("logs").len(), 3);
        let metrics = manager.metrics();
        assert_eq!(metrics.total_retries, 1);
        assert_eq!(metrics.total_flush_failures, 1);
        assert_eq!(metrics.total_batches_flushed, 1);
        assert_eq!(metrics.current_memory_usage, 0);
    }

    #[tokio::test]
    async fn test_partial_failure_routes_to_dlq() {
        let (manager, store) = build_manager(5, 60_000);
        store.plan_failure(StoreError::Bulk {
            failures: vec![
                WriteFailure {
                    index: 1,
                    code: 121,
                    message: "validation failed".to_string(),
                },
                WriteFailure {
                    index: 3,
                    code: 121,
                    message: "validation failed".to_string(),
                },
            ],
        });

        for i in 0..5 {
            manager.submit(LogEntry::message(format!("entry {i}")).with_attr("i", i));
        }
        settle().await;

        assert_eq!(store.docs("logs").len(), 3);
        let dead = store.docs("logs_dlq");
        assert_eq!(dead.len(), 2);
        assert_eq!(dead[0]["sourceCollection"], "logs");
        assert_eq!(dead[0]["originalLog"]["i"], 1);
        assert_eq!(dead[1]["originalLog"]["i"], 3);

        let metrics = manager.metrics();
        assert_eq!(metrics.total_batches_flushed, 1);
        assert_eq!(metrics.total_entries_dead_lettered, 2);
    }

    #[tokio::test]
    async fn test_routing_by_collection() {
        let (manager, store) = build_manager(2, 60_000);
        manager.submit(LogEntry::message("a1").with_collection("audit"));
        manager.submit(LogEntry::message("a2").with_collection("audit"));
        manager.submit(LogEntry::message("m1"));
        settle().await;

        assert_eq!(store.docs("audit").len(), 2);
        assert!(store.docs("logs").is_empty());
        assert_eq!(manager.metrics().collections_active, 2);
    }

    #[tokio::test]
    async fn test_flush_all_drains_everything() {
        let (manager, store) = build_manager(100, 60_000);
        manager.submit(LogEntry::message("one").with_collection("a"));
        manager.submit(LogEntry::message("two").with_collection("b"));

        manager.flush_all().await;
        settle().await;
        assert_eq!(store.docs("a").len(), 1);
        assert_eq!(store.docs("b").len(), 1);

        // Idempotent on a quiescent manager.
        let flushed_before = manager.metrics().total_batches_flushed;
        manager.flush_all().await;
        assert_eq!(manager.metrics().total_batches_flushed, flushed_before);
    }

    #[tokio::test]
    async fn test_shutdown_drains_and_redirects_submissions() {
        let (manager, store) = build_manager(100, 60_000);
        manager.submit(LogEntry::message("staged"));

        manager.shutdown(None).await.expect("shutdown should drain");
        assert_eq!(store.docs("logs").len(), 1);
        assert!(manager.is_shutting_down());

        manager.submit(LogEntry::message("late"));
        settle().await;
        assert_eq!(store.docs("logs").len(), 2);
    }

    #[test]
    fn test_backoff_delay_growth() {
        let base = Duration::from_millis(100);
        assert_eq!(backoff_delay(base, 0), Duration::ZERO);
        assert_eq!(backoff_delay(base, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(base, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(base, 3), Duration::from_millis(400));
        assert_eq!(backoff_delay(Duration::from_secs(10), 4), MAX_RETRY_BACKOFF);
    }
}
