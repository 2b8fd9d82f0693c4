//! Shared in-memory store doubles for the integration tests.
#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use logship::{Config, DocumentStore, StoreConnector, StoreError, WriteFailure};
use serde_json::Value;

/// Outcome scripted for one upcoming `insert_many` call, popped in call
/// order.
#[derive(Debug)]
pub enum PlannedOutcome {
    /// Fail the whole call with a transient error.
    Transient,
    /// Reject the documents at these batch indices, keep the rest.
    RejectIndices(Vec<usize>),
}

/// In-memory document store with scripted failures.
#[derive(Debug)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Value>>>,
    planned: Mutex<VecDeque<PlannedOutcome>>,
    insert_calls: AtomicUsize,
    healthy: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            collections: Mutex::new(HashMap::new()),
            planned: Mutex::new(VecDeque::new()),
            insert_calls: AtomicUsize::new(0),
            healthy: AtomicBool::new(true),
        })
    }

    pub fn plan_transient(&self) {
        self.planned
            .lock()
            .unwrap()
            .push_back(PlannedOutcome::Transient);
    }

    pub fn plan_reject(&self, indices: Vec<usize>) {
        self.planned
            .lock()
            .unwrap()
            .push_back(PlannedOutcome::RejectIndices(indices));
    }

    pub fn docs(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<(), StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        match self.planned.lock().unwrap().pop_front() {
            Some(PlannedOutcome::Transient) => {
                Err(StoreError::Other("simulated transient failure".to_string()))
            }
            Some(PlannedOutcome::RejectIndices(indices)) => {
                // Unordered write semantics: everything not listed lands.
                let rejected: HashSet<usize> = indices.iter().copied().collect();
                {
                    let mut collections = self.collections.lock().unwrap();
                    let slot = collections.entry(collection.to_string()).or_default();
                    for (index, doc) in docs.into_iter().enumerate() {
                        if !rejected.contains(&index) {
                            slot.push(doc);
                        }
                    }
                }
                Err(StoreError::Bulk {
                    failures: indices
                        .into_iter()
                        .map(|index| WriteFailure {
                            index,
                            code: 121,
                            message: "Document failed validation".to_string(),
                        })
                        .collect(),
                })
            }
            None => {
                let mut collections = self.collections.lock().unwrap();
                collections
                    .entry(collection.to_string())
                    .or_default()
                    .extend(docs);
                Ok(())
            }
        }
    }

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
        self.insert_many(collection, vec![doc]).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Connection("simulated ping failure".to_string()))
        }
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}

/// Connector that always hands out the same [`MemoryStore`].
pub struct MemoryConnector {
    store: Arc<MemoryStore>,
    pub attempts: AtomicUsize,
}

impl MemoryConnector {
    pub fn new(store: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            store,
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryConnector {
    async fn connect(&self, _: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::clone(&self.store) as Arc<dyn DocumentStore>)
    }
}

/// Connector simulating a database that refuses every connection.
pub struct RefusingConnector {
    pub attempts: AtomicUsize,
}

impl RefusingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for RefusingConnector {
    async fn connect(&self, _: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::Connection("connection refused".to_string()))
    }
}

/// Config tuned for fast test turnaround.
pub fn test_config(batch_size: usize, flush_interval_ms: u64) -> Config {
    let mut config = Config::new("mongodb://localhost:27017/test");
    config.batch_size = batch_size;
    config.flush_interval = Duration::from_millis(flush_interval_ms);
    config.retry_delay = Duration::from_millis(50);
    config
}

pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(80)).await;
}
