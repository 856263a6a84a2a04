//! In-process [`ExecutionBackend`] over a locked map of collections.
//!
//! Understands the compiler's query dialect, stamps `_etag`/`_ts` on every write and
//! enforces partition, duplicate and version preconditions with the same status codes
//! a remote document store would return.

mod eval;
mod sql;

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use bson::Bson;
use log::{debug, trace};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{
    AccessCondition, BackendError, CollectionProperties, CollectionResponse, ExecutionBackend,
    FeedOptions, FeedResponse, ItemOptions, ItemResponse, QueryMetrics, status,
};
use crate::query::QuerySpec;
use crate::types::{ETAG_FIELD, ID_FIELD, PartitionKey, Record, TIMESTAMP_FIELD, record_etag, record_id};
use sql::Projection;

const CONTINUATION_PREFIX: &str = "mem:";
const QUERY_BASE_CHARGE: f64 = 2.5;
const QUERY_CHARGE_PER_DOC: f64 = 0.1;
const READ_CHARGE: f64 = 1.0;
const WRITE_CHARGE: f64 = 5.0;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryBackendOptions {
    /// Cap on items per query response regardless of the requested page size.
    pub max_items_per_response: Option<usize>,
    /// Create a collection on first write instead of answering 404.
    pub auto_create_collections: bool,
}

#[derive(Debug)]
struct StoredCollection {
    properties: CollectionProperties,
    items: Vec<Record>,
}

impl StoredCollection {
    fn partition_of(&self, record: &Record) -> PartitionKey {
        match &self.properties.partition_key_path {
            Some(path) => {
                let segments: Vec<&str> = path.trim_start_matches('/').split(['.', '/']).collect();
                PartitionKey::from_field(eval::get_path(record, segments.as_slice()))
            }
            None => PartitionKey::None,
        }
    }

    fn position(&self, id: &str, pk: &PartitionKey) -> Option<usize> {
        let partitioned = self.properties.partition_key_path.is_some();
        self.items.iter().position(|r| {
            record_id(r) == Some(id) && (!partitioned || same_partition(&self.partition_of(r), pk))
        })
    }
}

fn same_partition(a: &PartitionKey, b: &PartitionKey) -> bool {
    match (a.as_value(), b.as_value()) {
        (None, None) => true,
        (Some(x), Some(y)) => eval::values_equal(x, y),
        _ => false,
    }
}

#[derive(Debug, Default)]
pub struct MemoryBackend {
    collections: RwLock<HashMap<String, StoredCollection>>,
    options: MemoryBackendOptions,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_options(options: MemoryBackendOptions) -> Self {
        Self { collections: RwLock::new(HashMap::new()), options }
    }

    /// Registers a collection up front; an existing collection is left untouched.
    #[must_use]
    pub fn with_collection(self, name: &str, partition_key_path: Option<&str>) -> Self {
        self.collections.write().entry(name.to_string()).or_insert_with(|| StoredCollection {
            properties: CollectionProperties {
                name: name.to_string(),
                partition_key_path: partition_key_path.map(str::to_string),
                request_units: 400,
            },
            items: Vec::new(),
        });
        self
    }

    /// Bulk-loads records without preconditions, stamping version and timestamp.
    ///
    /// # Errors
    /// 404 when the collection is unknown and auto-creation is off, 400 for a record
    /// without an `id`, 409 for an id already present in the same partition.
    pub fn seed(&self, collection: &str, records: impl IntoIterator<Item = Record>) -> Result<usize, BackendError> {
        let mut guard = self.collections.write();
        let coll = self.collection_mut(&mut guard, collection)?;
        let mut loaded = 0;
        for record in records {
            insert_new(coll, record)?;
            loaded += 1;
        }
        debug!("seeded {loaded} record(s) into '{collection}'");
        Ok(loaded)
    }

    /// Snapshot of a collection's records in insertion order.
    #[must_use]
    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.collections.read().get(collection).map(|c| c.items.clone()).unwrap_or_default()
    }

    fn collection_mut<'a>(
        &self,
        guard: &'a mut HashMap<String, StoredCollection>,
        name: &str,
    ) -> Result<&'a mut StoredCollection, BackendError> {
        if self.options.auto_create_collections && !guard.contains_key(name) {
            guard.insert(
                name.to_string(),
                StoredCollection {
                    properties: CollectionProperties {
                        name: name.to_string(),
                        partition_key_path: None,
                        request_units: 400,
                    },
                    items: Vec::new(),
                },
            );
        }
        guard.get_mut(name).ok_or_else(|| collection_missing(name))
    }

    fn run_query(&self, collection: &str, spec: &QuerySpec, options: &FeedOptions) -> Result<FeedResponse, BackendError> {
        let started = Instant::now();
        let parsed = sql::parse(spec.text()).map_err(|m| BackendError::new(status::BAD_REQUEST, m))?;
        let guard = self.collections.read();
        let coll = guard.get(collection).ok_or_else(|| collection_missing(collection))?;

        let mut matched: Vec<&Record> = Vec::new();
        for record in &coll.items {
            let keep = match &parsed.filter {
                Some(expr) => eval::eval(record, expr, spec)
                    .map_err(|m| BackendError::new(status::BAD_REQUEST, m))?
                    == Some(true),
                None => true,
            };
            if keep {
                matched.push(record);
            }
        }

        if !options.enable_cross_partition && coll.properties.partition_key_path.is_some() {
            let partitions: BTreeSet<String> =
                matched.iter().map(|r| coll.partition_of(r).to_string()).collect();
            if partitions.len() > 1 {
                return Err(BackendError::new(
                    status::BAD_REQUEST,
                    "cross partition query is required but disabled; set enable_cross_partition",
                ));
            }
        }

        let scanned = coll.items.len() as u64;
        let (results, continuation) = match parsed.projection {
            Projection::Count { alias } => {
                let mut row = Record::new();
                row.insert(alias, Bson::Int64(matched.len() as i64));
                (vec![row], None)
            }
            Projection::All => {
                if !parsed.order_by.is_empty() {
                    matched.sort_by(|a, b| eval::compare_docs(a, b, &parsed.order_by));
                }
                let offset = match options.continuation.as_deref() {
                    Some(token) => decode_continuation(token)?,
                    None => 0,
                };
                let limit = match (options.max_item_count, self.options.max_items_per_response) {
                    (Some(a), Some(b)) => Some(a.min(b)),
                    (a, b) => a.or(b),
                };
                let end = limit.map_or(matched.len(), |n| offset.saturating_add(n).min(matched.len()));
                let start = offset.min(end);
                let page: Vec<Record> = matched[start..end].iter().map(|r| (*r).clone()).collect();
                let next = (end < matched.len()).then(|| encode_continuation(end));
                (page, next)
            }
        };
        trace!("query on '{collection}' matched {} of {scanned}", matched.len());

        let query_metrics = options.populate_query_metrics.then(|| QueryMetrics {
            retrieved_document_count: scanned,
            output_document_count: results.len() as u64,
            execution_time: started.elapsed(),
        });
        Ok(FeedResponse {
            request_charge: QUERY_BASE_CHARGE + QUERY_CHARGE_PER_DOC * scanned as f64,
            results,
            continuation,
            activity_id: activity_id(),
            query_metrics,
        })
    }

    fn write_item(&self, collection: &str, record: Record, options: &ItemOptions, upsert: bool) -> Result<ItemResponse, BackendError> {
        let mut guard = self.collections.write();
        let coll = self.collection_mut(&mut guard, collection)?;
        let id = require_id(&record)?.to_string();
        let pk = coll.partition_of(&record);
        if coll.properties.partition_key_path.is_some() && !same_partition(&pk, &options.partition_key) {
            return Err(BackendError::new(
                status::BAD_REQUEST,
                format!("partition key {} does not match the record's {pk}", options.partition_key),
            ));
        }
        let stored = match (coll.position(&id, &pk), upsert) {
            (Some(_), false) => {
                return Err(BackendError::new(status::CONFLICT, format!("item '{id}' already exists")));
            }
            (Some(idx), true) => {
                check_access(options.access_condition.as_ref(), Some(&coll.items[idx]), &id)?;
                let stamped = stamp(record);
                coll.items[idx] = stamped.clone();
                stamped
            }
            (None, true) => {
                check_access(options.access_condition.as_ref(), None, &id)?;
                insert_new(coll, record)?
            }
            (None, false) => insert_new(coll, record)?,
        };
        Ok(ItemResponse { record: Some(stored), request_charge: WRITE_CHARGE, activity_id: activity_id() })
    }
}

fn collection_missing(name: &str) -> BackendError {
    BackendError::new(status::NOT_FOUND, format!("collection '{name}' does not exist"))
}

fn item_missing(id: &str) -> BackendError {
    BackendError::new(status::NOT_FOUND, format!("item '{id}' does not exist"))
}

fn require_id(record: &Record) -> Result<&str, BackendError> {
    match record_id(record) {
        Some(id) if !id.is_empty() => Ok(id),
        _ => Err(BackendError::new(status::BAD_REQUEST, format!("record is missing a string '{ID_FIELD}'"))),
    }
}

fn insert_new(coll: &mut StoredCollection, record: Record) -> Result<Record, BackendError> {
    let id = require_id(&record)?;
    if coll.position(id, &coll.partition_of(&record)).is_some() {
        return Err(BackendError::new(status::CONFLICT, format!("item '{id}' already exists")));
    }
    let stamped = stamp(record);
    coll.items.push(stamped.clone());
    Ok(stamped)
}

fn check_access(condition: Option<&AccessCondition>, current: Option<&Record>, id: &str) -> Result<(), BackendError> {
    let Some(AccessCondition::IfMatch(expected)) = condition else { return Ok(()) };
    match current.and_then(record_etag) {
        Some(actual) if actual == expected => Ok(()),
        Some(_) => Err(BackendError::new(
            status::PRECONDITION_FAILED,
            format!("item '{id}' was modified; version {expected} is stale"),
        )),
        None => Err(BackendError::new(
            status::PRECONDITION_FAILED,
            format!("item '{id}' no longer exists at version {expected}"),
        )),
    }
}

fn stamp(mut record: Record) -> Record {
    record.insert(ETAG_FIELD, format!("\"{}\"", Uuid::new_v4()));
    record.insert(TIMESTAMP_FIELD, chrono::Utc::now().timestamp());
    record
}

fn activity_id() -> String {
    Uuid::new_v4().to_string()
}

fn encode_continuation(offset: usize) -> String {
    format!("{CONTINUATION_PREFIX}{offset}")
}

fn decode_continuation(token: &str) -> Result<usize, BackendError> {
    token
        .strip_prefix(CONTINUATION_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| BackendError::new(status::BAD_REQUEST, format!("malformed continuation token '{token}'")))
}

impl ExecutionBackend for MemoryBackend {
    async fn query_items(&self, collection: &str, spec: &QuerySpec, options: &FeedOptions) -> Result<FeedResponse, BackendError> {
        self.run_query(collection, spec, options)
    }

    async fn create_item(&self, collection: &str, record: Record, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        self.write_item(collection, record, options, false)
    }

    async fn upsert_item(&self, collection: &str, record: Record, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        self.write_item(collection, record, options, true)
    }

    async fn read_item(&self, collection: &str, id: &str, partition_key: &PartitionKey) -> Result<ItemResponse, BackendError> {
        let guard = self.collections.read();
        let coll = guard.get(collection).ok_or_else(|| collection_missing(collection))?;
        let idx = coll.position(id, partition_key).ok_or_else(|| item_missing(id))?;
        Ok(ItemResponse {
            record: Some(coll.items[idx].clone()),
            request_charge: READ_CHARGE,
            activity_id: activity_id(),
        })
    }

    async fn delete_item(&self, collection: &str, id: &str, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        let mut guard = self.collections.write();
        let coll = guard.get_mut(collection).ok_or_else(|| collection_missing(collection))?;
        let idx = coll.position(id, &options.partition_key).ok_or_else(|| item_missing(id))?;
        check_access(options.access_condition.as_ref(), Some(&coll.items[idx]), id)?;
        coll.items.remove(idx);
        Ok(ItemResponse { record: None, request_charge: WRITE_CHARGE, activity_id: activity_id() })
    }

    async fn create_collection_if_not_exists(&self, properties: &CollectionProperties) -> Result<CollectionResponse, BackendError> {
        if properties.name.trim().is_empty() {
            return Err(BackendError::new(status::BAD_REQUEST, "collection name is empty"));
        }
        let mut guard = self.collections.write();
        let coll = guard.entry(properties.name.clone()).or_insert_with(|| {
            debug!("creating collection '{}'", properties.name);
            StoredCollection { properties: properties.clone(), items: Vec::new() }
        });
        Ok(CollectionResponse {
            properties: coll.properties.clone(),
            request_charge: READ_CHARGE,
            activity_id: activity_id(),
        })
    }

    async fn delete_collection(&self, collection: &str) -> Result<CollectionResponse, BackendError> {
        let removed = self.collections.write().remove(collection).ok_or_else(|| collection_missing(collection))?;
        Ok(CollectionResponse { properties: removed.properties, request_charge: WRITE_CHARGE, activity_id: activity_id() })
    }
}
