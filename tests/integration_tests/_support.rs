use std::sync::Arc;

use nexus_access::backend::{
    CollectionProperties, CollectionResponse, FeedOptions, FeedResponse, ItemOptions, ItemResponse, status,
};
use nexus_access::{
    BackendError, DocumentTemplate, Entity, ExecutionBackend, MemoryBackend, MemoryBackendOptions, MemoryDiagnostics,
    PartitionKey, QuerySpec, Record, TemplateConfig,
};
use serde::{Deserialize, Serialize};

/// Partitioned by `city`, not versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub id: String,
    pub name: String,
    pub city: String,
    pub age: i32,
}

impl Person {
    pub fn new(id: &str, name: &str, city: &str, age: i32) -> Self {
        Self { id: id.into(), name: name.into(), city: city.into(), age }
    }
}

impl Entity for Person {
    fn collection_name() -> String {
        "people".into()
    }

    fn partition_key_fields() -> &'static [&'static str] {
        &["city"]
    }
}

/// Unpartitioned and versioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub balance: i64,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl Entity for Account {
    fn collection_name() -> String {
        "accounts".into()
    }

    fn is_versioned() -> bool {
        true
    }
}

/// Unpartitioned, unversioned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub status: String,
}

impl Ticket {
    pub fn new(id: &str, status: &str) -> Self {
        Self { id: id.into(), status: status.into() }
    }
}

impl Entity for Ticket {
    fn collection_name() -> String {
        "tickets".into()
    }
}

pub struct Harness {
    pub backend: Arc<MemoryBackend>,
    pub diagnostics: Arc<MemoryDiagnostics>,
    pub template: DocumentTemplate<Arc<MemoryBackend>>,
}

pub fn harness() -> Harness {
    harness_with(MemoryBackendOptions::default())
}

pub fn harness_with(options: MemoryBackendOptions) -> Harness {
    let backend = Arc::new(MemoryBackend::with_options(options));
    let diagnostics = Arc::new(MemoryDiagnostics::new());
    let config = TemplateConfig { database_name: "testdb".into(), ..TemplateConfig::default() };
    let template = DocumentTemplate::builder(Arc::clone(&backend))
        .diagnostics(diagnostics.clone())
        .config(config)
        .build()
        .unwrap();
    template.create_collection_for::<Person>().unwrap();
    template.create_collection_for::<Account>().unwrap();
    template.create_collection_for::<Ticket>().unwrap();
    diagnostics.clear();
    Harness { backend, diagnostics, template }
}

/// Wraps a [`MemoryBackend`], logs the options of every `delete_item` call, and can
/// fail the n-th delete (zero-based) with a 503.
pub struct RecordingBackend {
    pub inner: Arc<MemoryBackend>,
    pub fail_delete_at: Option<usize>,
    pub deletes: parking_lot::Mutex<Vec<(String, ItemOptions)>>,
}

impl RecordingBackend {
    pub fn new(inner: Arc<MemoryBackend>, fail_delete_at: Option<usize>) -> Self {
        Self { inner, fail_delete_at, deletes: parking_lot::Mutex::new(Vec::new()) }
    }
}

impl ExecutionBackend for RecordingBackend {
    async fn query_items(&self, collection: &str, spec: &QuerySpec, options: &FeedOptions) -> Result<FeedResponse, BackendError> {
        self.inner.query_items(collection, spec, options).await
    }

    async fn create_item(&self, collection: &str, record: Record, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        self.inner.create_item(collection, record, options).await
    }

    async fn upsert_item(&self, collection: &str, record: Record, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        self.inner.upsert_item(collection, record, options).await
    }

    async fn read_item(&self, collection: &str, id: &str, partition_key: &PartitionKey) -> Result<ItemResponse, BackendError> {
        self.inner.read_item(collection, id, partition_key).await
    }

    async fn delete_item(&self, collection: &str, id: &str, options: &ItemOptions) -> Result<ItemResponse, BackendError> {
        let n = {
            let mut log = self.deletes.lock();
            log.push((id.to_string(), options.clone()));
            log.len() - 1
        };
        if self.fail_delete_at == Some(n) {
            return Err(BackendError::new(status::SERVICE_UNAVAILABLE, format!("injected failure deleting '{id}'")));
        }
        self.inner.delete_item(collection, id, options).await
    }

    async fn create_collection_if_not_exists(&self, properties: &CollectionProperties) -> Result<CollectionResponse, BackendError> {
        self.inner.create_collection_if_not_exists(properties).await
    }

    async fn delete_collection(&self, collection: &str) -> Result<CollectionResponse, BackendError> {
        self.inner.delete_collection(collection).await
    }
}

/// Template over a [`RecordingBackend`] sharing `inner` with the caller.
pub fn recording_template(inner: Arc<MemoryBackend>, fail_delete_at: Option<usize>) -> DocumentTemplate<Arc<RecordingBackend>> {
    let backend = Arc::new(RecordingBackend::new(inner, fail_delete_at));
    let template = DocumentTemplate::new(backend).unwrap();
    template.create_collection_for::<Person>().unwrap();
    template.create_collection_for::<Account>().unwrap();
    template.create_collection_for::<Ticket>().unwrap();
    template
}
