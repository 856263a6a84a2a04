//! Per-type entity metadata and its memoizing cache.
//!
//! The cache is an explicit object owned by a template; there is no process-wide registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::backend::CollectionProperties;
use crate::errors::{AccessError, require_text};

/// Default provisioned throughput for new collections.
pub const DEFAULT_REQUEST_UNITS: u32 = 400;

/// A domain type stored as one record per value.
///
/// The serialized form must carry a string `id`. Versioned types should also map
/// the `_etag` system field so the token read from storage flows back into writes.
pub trait Entity: Serialize + DeserializeOwned + 'static {
    /// Collection the type lives in; defaults to the lowercased type name.
    fn collection_name() -> String {
        let full = std::any::type_name::<Self>();
        let base = full.split('<').next().unwrap_or(full);
        base.rsplit("::").next().unwrap_or(base).to_ascii_lowercase()
    }

    fn partition_key_fields() -> &'static [&'static str] {
        &[]
    }

    fn is_versioned() -> bool {
        false
    }

    fn request_units() -> u32 {
        DEFAULT_REQUEST_UNITS
    }
}

/// Raw records: collection `record`, unpartitioned, unversioned.
impl Entity for crate::types::Record {
    fn collection_name() -> String {
        "record".to_string()
    }
}

/// Zero or one field carrying the partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionKeyDescriptor {
    field: Option<String>,
}

impl PartitionKeyDescriptor {
    #[must_use]
    pub const fn none() -> Self {
        Self { field: None }
    }

    /// # Errors
    /// `InvalidArgument` for more than one field or a blank field name.
    pub fn from_fields(fields: &[&str]) -> Result<Self, AccessError> {
        match fields {
            [] => Ok(Self::none()),
            [one] => {
                require_text(one, "partition key field")?;
                Ok(Self { field: Some((*one).to_string()) })
            }
            many => Err(AccessError::InvalidArgument(format!(
                "at most one partition key field is supported, got {}",
                many.len()
            ))),
        }
    }

    #[must_use]
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Field list in the form cross-partition inference expects.
    #[must_use]
    pub fn fields(&self) -> Vec<String> {
        self.field.iter().cloned().collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityInformation {
    collection_name: String,
    partition_key: PartitionKeyDescriptor,
    versioned: bool,
    request_units: u32,
}

impl EntityInformation {
    /// Metadata for an ad-hoc collection: unpartitioned, unversioned.
    ///
    /// # Errors
    /// `InvalidArgument` for a blank collection name.
    pub fn new(collection_name: impl Into<String>) -> Result<Self, AccessError> {
        let collection_name = collection_name.into();
        require_text(&collection_name, "collection name")?;
        Ok(Self {
            collection_name,
            partition_key: PartitionKeyDescriptor::none(),
            versioned: false,
            request_units: DEFAULT_REQUEST_UNITS,
        })
    }

    /// Derives metadata from the type's [`Entity`] implementation.
    ///
    /// # Errors
    /// `InvalidArgument` for a blank collection name or more than one partition key field.
    pub fn of<T: Entity>() -> Result<Self, AccessError> {
        Ok(Self::new(T::collection_name())?
            .with_partition_key(PartitionKeyDescriptor::from_fields(T::partition_key_fields())?)
            .with_versioning(T::is_versioned())
            .with_request_units(T::request_units()))
    }

    #[must_use]
    pub fn with_partition_key(mut self, partition_key: PartitionKeyDescriptor) -> Self {
        self.partition_key = partition_key;
        self
    }

    #[must_use]
    pub const fn with_versioning(mut self, versioned: bool) -> Self {
        self.versioned = versioned;
        self
    }

    #[must_use]
    pub const fn with_request_units(mut self, request_units: u32) -> Self {
        self.request_units = request_units;
        self
    }

    #[must_use]
    pub fn collection_name(&self) -> &str {
        &self.collection_name
    }

    #[must_use]
    pub const fn partition_key(&self) -> &PartitionKeyDescriptor {
        &self.partition_key
    }

    #[must_use]
    pub const fn is_versioned(&self) -> bool {
        self.versioned
    }

    #[must_use]
    pub const fn request_units(&self) -> u32 {
        self.request_units
    }

    #[must_use]
    pub fn collection_properties(&self) -> CollectionProperties {
        CollectionProperties {
            name: self.collection_name.clone(),
            partition_key_path: self.partition_key.field().map(str::to_string),
            request_units: self.request_units,
        }
    }
}

/// Lazily populated `TypeId -> EntityInformation` map.
#[derive(Debug, Default)]
pub struct MetadataCache {
    entries: RwLock<HashMap<TypeId, Arc<EntityInformation>>>,
    derivations: AtomicU64,
}

impl MetadataCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Errors
    /// Propagates derivation failures; a failed derivation is not cached.
    pub fn get<T: Entity>(&self) -> Result<Arc<EntityInformation>, AccessError> {
        let key = TypeId::of::<T>();
        if let Some(hit) = self.entries.read().get(&key) {
            return Ok(Arc::clone(hit));
        }
        let derived = Arc::new(EntityInformation::of::<T>()?);
        self.derivations.fetch_add(1, Ordering::Relaxed);
        debug!("derived entity metadata for {}: {:?}", std::any::type_name::<T>(), derived);
        let mut w = self.entries.write();
        Ok(Arc::clone(w.entry(key).or_insert(derived)))
    }

    /// Number of times metadata had to be derived rather than served from the cache.
    #[must_use]
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}
