//! Execution backend seam.
//!
//! The template talks to storage only through [`ExecutionBackend`]. Implementations are
//! asynchronous; the template drives them to completion so its own API stays blocking.

mod memory;

pub use memory::{MemoryBackend, MemoryBackendOptions};

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::QuerySpec;
use crate::types::{PartitionKey, Record};

/// Status codes the error translator distinguishes.
pub mod status {
    pub const BAD_REQUEST: u16 = 400;
    pub const NOT_FOUND: u16 = 404;
    pub const REQUEST_TIMEOUT: u16 = 408;
    pub const CONFLICT: u16 = 409;
    pub const PRECONDITION_FAILED: u16 = 412;
    pub const TOO_MANY_REQUESTS: u16 = 429;
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// Failure signalled by a backend call.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("status {status}: {message}")]
pub struct BackendError {
    status: u16,
    message: String,
    retry_after: Option<Duration>,
}

impl BackendError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), retry_after: None }
    }

    #[must_use]
    pub const fn with_retry_after(mut self, after: Duration) -> Self {
        self.retry_after = Some(after);
        self
    }

    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub const fn retry_after(&self) -> Option<Duration> {
        self.retry_after
    }
}

/// Options for a query execution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedOptions {
    pub enable_cross_partition: bool,
    /// Upper bound on items per response; `None` returns the whole result set.
    pub max_item_count: Option<usize>,
    pub continuation: Option<String>,
    pub populate_query_metrics: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessCondition {
    /// Succeed only when the stored version token equals this one.
    IfMatch(String),
}

/// Options for a point read/write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemOptions {
    pub partition_key: PartitionKey,
    pub access_condition: Option<AccessCondition>,
}

impl ItemOptions {
    #[must_use]
    pub const fn new(partition_key: PartitionKey) -> Self {
        Self { partition_key, access_condition: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QueryMetrics {
    pub retrieved_document_count: u64,
    pub output_document_count: u64,
    pub execution_time: Duration,
}

/// One page of raw query results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedResponse {
    pub results: Vec<Record>,
    /// Resume point for the next page; `None` when the result set is exhausted.
    pub continuation: Option<String>,
    pub request_charge: f64,
    pub activity_id: String,
    pub query_metrics: Option<QueryMetrics>,
}

/// Result of a point read or write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemResponse {
    /// Stored record as echoed by the backend; empty for deletes.
    pub record: Option<Record>,
    pub request_charge: f64,
    pub activity_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionProperties {
    pub name: String,
    /// Dotted path of the partition key field, if the collection is partitioned.
    pub partition_key_path: Option<String>,
    pub request_units: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CollectionResponse {
    pub properties: CollectionProperties,
    pub request_charge: f64,
    pub activity_id: String,
}

/// Storage backend executing compiled queries and point operations.
pub trait ExecutionBackend: Send + Sync {
    fn query_items(
        &self,
        collection: &str,
        spec: &QuerySpec,
        options: &FeedOptions,
    ) -> impl Future<Output = Result<FeedResponse, BackendError>> + Send;

    fn create_item(
        &self,
        collection: &str,
        record: Record,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send;

    fn upsert_item(
        &self,
        collection: &str,
        record: Record,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send;

    fn read_item(
        &self,
        collection: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send;

    fn delete_item(
        &self,
        collection: &str,
        id: &str,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send;

    fn create_collection_if_not_exists(
        &self,
        properties: &CollectionProperties,
    ) -> impl Future<Output = Result<CollectionResponse, BackendError>> + Send;

    fn delete_collection(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<CollectionResponse, BackendError>> + Send;
}

impl<B: ExecutionBackend> ExecutionBackend for Arc<B> {
    fn query_items(
        &self,
        collection: &str,
        spec: &QuerySpec,
        options: &FeedOptions,
    ) -> impl Future<Output = Result<FeedResponse, BackendError>> + Send {
        (**self).query_items(collection, spec, options)
    }

    fn create_item(
        &self,
        collection: &str,
        record: Record,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send {
        (**self).create_item(collection, record, options)
    }

    fn upsert_item(
        &self,
        collection: &str,
        record: Record,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send {
        (**self).upsert_item(collection, record, options)
    }

    fn read_item(
        &self,
        collection: &str,
        id: &str,
        partition_key: &PartitionKey,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send {
        (**self).read_item(collection, id, partition_key)
    }

    fn delete_item(
        &self,
        collection: &str,
        id: &str,
        options: &ItemOptions,
    ) -> impl Future<Output = Result<ItemResponse, BackendError>> + Send {
        (**self).delete_item(collection, id, options)
    }

    fn create_collection_if_not_exists(
        &self,
        properties: &CollectionProperties,
    ) -> impl Future<Output = Result<CollectionResponse, BackendError>> + Send {
        (**self).create_collection_if_not_exists(properties)
    }

    fn delete_collection(
        &self,
        collection: &str,
    ) -> impl Future<Output = Result<CollectionResponse, BackendError>> + Send {
        (**self).delete_collection(collection)
    }
}
