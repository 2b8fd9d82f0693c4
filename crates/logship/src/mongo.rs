//! MongoDB binding for the store seam.
//!
//! Thin translation layer: the engine speaks [`DocumentStore`], this module
//! speaks the driver. Bulk-write rejections are mapped to
//! [`StoreError::Bulk`] with their batch indices; server-selection and I/O
//! failures mark the handle unhealthy so the connection manager reconnects.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bson::{doc, Document};
use mongodb::error::ErrorKind;
use mongodb::options::{ClientOptions, InsertManyOptions};
use mongodb::{Client, Database};
use serde_json::Value;
use tracing::debug;

use crate::config::{Config, DEFAULT_COLLECTION};
use crate::store::{DocumentStore, StoreConnector, StoreError, WriteFailure};

/// Opens [`MongoStore`] handles from the configured URI.
///
/// The database name comes from the URI path segment, falling back to
/// `logs`. Pool parameters come from
/// [`ConnectionOptions`](crate::config::ConnectionOptions).
pub struct MongoConnector;

#[async_trait]
impl StoreConnector for MongoConnector {
    async fn connect(&self, config: &Config) -> Result<Arc<dyn DocumentStore>, StoreError> {
        let mut options = ClientOptions::parse(&config.uri)
            .await
            .map_err(|err| StoreError::Connection(err.to_string()))?;

        let pool = &config.connection_options;
        options.max_pool_size = Some(pool.max_pool_size);
        options.min_pool_size = Some(pool.min_pool_size);
        options.max_idle_time = Some(pool.idle_timeout);
        options.server_selection_timeout = Some(pool.server_selection_timeout);
        options.connect_timeout = Some(pool.socket_timeout);

        let client =
            Client::with_options(options).map_err(|err| StoreError::Connection(err.to_string()))?;
        let database = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_COLLECTION));
        debug!("CONN | Using database {}", database.name());

        let store = MongoStore {
            client,
            database,
            healthy: AtomicBool::new(true),
        };
        // The driver connects lazily; ping now so a bad target fails the
        // connect attempt instead of the first flush.
        store.ping().await?;
        Ok(Arc::new(store))
    }
}

#[derive(Debug)]
pub struct MongoStore {
    client: Client,
    database: Database,
    healthy: AtomicBool,
}

impl MongoStore {
    fn classify(&self, err: mongodb::error::Error) -> StoreError {
        match *err.kind {
            ErrorKind::BulkWrite(ref failure) => {
                if let Some(write_errors) = &failure.write_errors {
                    return StoreError::Bulk {
                        failures: write_errors
                            .iter()
                            .map(|write_error| WriteFailure {
                                index: write_error.index,
                                code: write_error.code,
                                message: write_error.message.clone(),
                            })
                            .collect(),
                    };
                }
                StoreError::Other(err.to_string())
            }
            ErrorKind::ServerSelection { .. } | ErrorKind::Io(_) => {
                self.healthy.store(false, Ordering::SeqCst);
                StoreError::Connection(err.to_string())
            }
            _ => StoreError::Other(err.to_string()),
        }
    }

    fn to_bson_documents(docs: Vec<Value>) -> Result<Vec<Document>, StoreError> {
        docs.into_iter()
            .map(|doc| bson::to_document(&doc).map_err(|err| StoreError::Other(err.to_string())))
            .collect()
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert_many(&self, collection: &str, docs: Vec<Value>) -> Result<(), StoreError> {
        let docs = Self::to_bson_documents(docs)?;
        let options = InsertManyOptions::builder().ordered(false).build();
        self.database
            .collection::<Document>(collection)
            .insert_many(docs, options)
            .await
            .map(|_| ())
            .map_err(|err| self.classify(err))
    }

    async fn insert_one(&self, collection: &str, doc: Value) -> Result<(), StoreError> {
        let doc = bson::to_document(&doc).map_err(|err| StoreError::Other(err.to_string()))?;
        self.database
            .collection::<Document>(collection)
            .insert_one(doc, None)
            .await
            .map(|_| ())
            .map_err(|err| self.classify(err))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map(|_| ())
            .map_err(|err| self.classify(err))
    }

    fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    async fn close(&self) {
        self.client.clone().shutdown().await;
    }
}
