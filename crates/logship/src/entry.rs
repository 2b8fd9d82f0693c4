//! Log entry shapes moving through the pipeline.
//!
//! A [`LogEntry`] is open-shaped: the fixed fields below plus an arbitrary
//! attribute bag, flattened into one document on serialization. While staged
//! it is wrapped in a [`StagedEntry`] carrying the batch id and retry count;
//! those live outside the entry itself, so the persisted document never
//! contains them. Entries the store rejects permanently are wrapped in a
//! [`DeadLetterRecord`] and written to `<collection>_dlq`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Size assumed for an entry whose serialization fails, so memory accounting
/// never undercounts a staged entry to zero.
const FALLBACK_ENTRY_SIZE: usize = 256;

/// A single log entry as submitted by a producer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    /// Wall-clock instant, assigned on ingress.
    pub timestamp: DateTime<Utc>,
    /// Destination collection. Resolved to the configured default before
    /// batching when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,
    /// Severity tag: `error`, `warn`, `info` and friends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Open-shaped attributes attached by the producer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Rendered cause chain, attached by the error-logging path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Any additional top-level attributes.
    #[serde(flatten)]
    pub attrs: Map<String, Value>,
}

impl Default for LogEntry {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            collection: None,
            level: None,
            message: None,
            metadata: None,
            stack: None,
            attrs: Map::new(),
        }
    }
}

impl LogEntry {
    /// Entry with just a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = Some(level.into());
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// Cheap upper bound on the entry's staged size: the JSON-serialized
    /// length doubled.
    pub fn estimated_size(&self) -> usize {
        serde_json::to_vec(self)
            .map(|bytes| bytes.len() * 2)
            .unwrap_or(FALLBACK_ENTRY_SIZE)
    }

    /// The document that will be written to the store.
    pub(crate) fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}

/// A staged entry awaiting flush.
///
/// The batch id and retry count ride alongside the entry rather than inside
/// it, so handing the entry to the store needs no stripping pass.
#[derive(Debug, Clone)]
pub(crate) struct StagedEntry {
    /// Unique id assigned at enqueue, for cross-referencing in diagnostics.
    pub batch_id: Uuid,
    /// Consecutive transient flush failures this entry has ridden through.
    pub retry_count: u32,
    /// Cached size estimate, so re-prepending restores exact accounting.
    pub size_bytes: usize,
    pub entry: LogEntry,
}

impl StagedEntry {
    pub fn new(entry: LogEntry) -> Self {
        let size_bytes = entry.estimated_size();
        Self {
            batch_id: Uuid::new_v4(),
            retry_count: 0,
            size_bytes,
            entry,
        }
    }
}

/// Document written to `<collection>_dlq` for a permanently rejected entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterRecord {
    pub original_log: LogEntry,
    pub error_details: Value,
    pub failed_at: DateTime<Utc>,
    pub source_collection: String,
}

impl DeadLetterRecord {
    pub(crate) fn to_document(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }
}
