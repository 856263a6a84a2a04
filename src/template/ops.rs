use bson::Bson;
use log::{debug, info};

use super::translate::{Operation, recover};
use super::versioning::{item_options, require_record_id};
use super::DocumentTemplate;
use crate::backend::{BackendError, CollectionProperties, ExecutionBackend, FeedOptions, ItemOptions, status};
use crate::criteria::{Criteria, DocumentQuery};
use crate::errors::{AccessError, require_text};
use crate::mapping::ResultMapper;
use crate::metadata::{Entity, EntityInformation};
use crate::query::{COUNT_VALUE_KEY, QuerySpec, compile_count, compile_find};
use crate::types::{ID_FIELD, PartitionKey, Record, record_id};

impl<B: ExecutionBackend, M: ResultMapper> DocumentTemplate<B, M> {
    /// Collection the entity type is stored in.
    ///
    /// # Errors
    /// Metadata derivation failures.
    pub fn collection_name<T: Entity>(&self) -> Result<String, AccessError> {
        Ok(self.metadata.get::<T>()?.collection_name().to_string())
    }

    /// # Errors
    /// `InvalidArgument` for a missing id or partition key, translated backend errors
    /// (`BackendExecution` for a duplicate id).
    pub fn insert<T: Entity>(&self, entity: &T, partition_key: Option<PartitionKey>) -> Result<T, AccessError> {
        let collection = self.collection_name::<T>()?;
        self.insert_into(&collection, entity, partition_key)
    }

    /// # Errors
    /// See [`Self::insert`].
    pub fn insert_into<T: Entity>(
        &self,
        collection: &str,
        entity: &T,
        partition_key: Option<PartitionKey>,
    ) -> Result<T, AccessError> {
        self.write(Operation::Insert, collection, entity, partition_key)
    }

    /// Creates or replaces the entity; versioned entities carrying a token are conditional on it.
    ///
    /// # Errors
    /// `PreconditionFailed` when the stored version moved on.
    pub fn upsert<T: Entity>(&self, entity: &T, partition_key: Option<PartitionKey>) -> Result<T, AccessError> {
        let collection = self.collection_name::<T>()?;
        self.upsert_into(&collection, entity, partition_key)
    }

    /// # Errors
    /// See [`Self::upsert`].
    pub fn upsert_into<T: Entity>(
        &self,
        collection: &str,
        entity: &T,
        partition_key: Option<PartitionKey>,
    ) -> Result<T, AccessError> {
        self.write(Operation::Upsert, collection, entity, partition_key)
    }

    fn write<T: Entity>(
        &self,
        op: Operation,
        collection: &str,
        entity: &T,
        partition_key: Option<PartitionKey>,
    ) -> Result<T, AccessError> {
        require_text(collection, "collection name")?;
        let info = self.metadata.get::<T>()?;
        let record = self.mapper.write(entity)?;
        let id = require_record_id(&record)?;
        let options = item_options(&info, &record, partition_key)?;
        debug!("{} '{id}' into '{collection}' (partition {})", op.name(), options.partition_key);
        let echo = record.clone();
        let response = if op == Operation::Insert {
            self.call(op, collection, self.backend.create_item(collection, record, &options))?
        } else {
            self.call(op, collection, self.backend.upsert_item(collection, record, &options))?
        };
        self.mapper.read(response.record.unwrap_or(echo))
    }

    /// Looks an entity up by id.
    ///
    /// With a partition key this is a point read; without one it is a parameterized
    /// cross-partition query on `id`. Absence is `Ok(None)`.
    ///
    /// # Errors
    /// `InvalidArgument` for a blank id, translated backend errors other than not-found.
    pub fn find_by_id<T: Entity>(&self, id: &str, partition_key: Option<PartitionKey>) -> Result<Option<T>, AccessError> {
        require_text(id, "id")?;
        let collection = self.collection_name::<T>()?;
        let Some(pk) = partition_key else {
            return self.find_by_id_in(&collection, id);
        };
        let result = self
            .call(Operation::FindById, &collection, self.backend.read_item(&collection, id, &pk))
            .map(|r| r.record);
        match recover(Operation::FindById, result, || None)? {
            Some(record) => Ok(Some(self.mapper.read(record)?)),
            None => Ok(None),
        }
    }

    /// Query-form lookup by id against a named collection.
    ///
    /// # Errors
    /// See [`Self::find_by_id`].
    pub fn find_by_id_in<T: Entity>(&self, collection: &str, id: &str) -> Result<Option<T>, AccessError> {
        require_text(collection, "collection name")?;
        require_text(id, "id")?;
        let spec = compile_find(&DocumentQuery::new(Criteria::eq(ID_FIELD, id)))?;
        let records = self.query_all(Operation::FindById, collection, &spec, true)?;
        records.into_iter().next().map(|r| self.mapper.read(r)).transpose()
    }

    /// Batch lookup by ids; an empty id list never reaches the backend.
    ///
    /// # Errors
    /// Translated backend errors other than not-found.
    pub fn find_by_ids<T: Entity, S: AsRef<str>>(&self, ids: &[S], collection: &str) -> Result<Vec<T>, AccessError> {
        require_text(collection, "collection name")?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let criteria = Criteria::is_in(ID_FIELD, ids.iter().map(|s| s.as_ref().to_string()));
        self.find(&DocumentQuery::new(criteria), collection)
    }

    /// # Errors
    /// Translated backend errors other than not-found.
    pub fn find_all<T: Entity>(&self) -> Result<Vec<T>, AccessError> {
        let collection = self.collection_name::<T>()?;
        self.find_all_in(&collection)
    }

    /// # Errors
    /// See [`Self::find_all`].
    pub fn find_all_in<T: Entity>(&self, collection: &str) -> Result<Vec<T>, AccessError> {
        self.find(&DocumentQuery::all(), collection)
    }

    /// Every record matching the query, following continuations until exhausted.
    ///
    /// # Errors
    /// `QueryCompilation` for malformed criteria, translated backend errors other than not-found.
    pub fn find<T: Entity>(&self, query: &DocumentQuery, collection: &str) -> Result<Vec<T>, AccessError> {
        require_text(collection, "collection name")?;
        let info = self.metadata.get::<T>()?;
        let spec = compile_find(query)?;
        let cross = query.is_cross_partition(&info.partition_key().fields());
        self.query_all(Operation::Find, collection, &spec, cross)?
            .into_iter()
            .map(|r| self.mapper.read(r))
            .collect()
    }

    /// # Errors
    /// See [`Self::find`].
    pub fn exists<T: Entity>(&self, query: &DocumentQuery, collection: &str) -> Result<bool, AccessError> {
        require_text(collection, "collection name")?;
        let info = self.metadata.get::<T>()?;
        let spec = compile_find(query)?;
        let options = FeedOptions {
            enable_cross_partition: query.is_cross_partition(&info.partition_key().fields()),
            max_item_count: Some(1),
            continuation: None,
            populate_query_metrics: self.config.populate_query_metrics,
        };
        let result = self
            .call(Operation::Exists, collection, self.backend.query_items(collection, &spec, &options))
            .map(|r| !r.results.is_empty());
        recover(Operation::Exists, result, || false)
    }

    /// Number of records in the collection.
    ///
    /// # Errors
    /// Translated backend errors, including not-found for a missing collection.
    pub fn count_all(&self, collection: &str) -> Result<u64, AccessError> {
        require_text(collection, "collection name")?;
        let spec = compile_count(&DocumentQuery::all())?;
        self.count_spec(collection, &spec, true)
    }

    /// # Errors
    /// See [`Self::count_all`]; `BackendExecution` when the result carries no count.
    pub fn count<T: Entity>(&self, query: &DocumentQuery, collection: &str) -> Result<u64, AccessError> {
        require_text(collection, "collection name")?;
        let info = self.metadata.get::<T>()?;
        let spec = compile_count(query)?;
        self.count_spec(collection, &spec, query.is_cross_partition(&info.partition_key().fields()))
    }

    pub(crate) fn count_spec(&self, collection: &str, spec: &QuerySpec, cross: bool) -> Result<u64, AccessError> {
        let options = FeedOptions {
            enable_cross_partition: cross,
            populate_query_metrics: self.config.populate_query_metrics,
            ..FeedOptions::default()
        };
        let response = self.call(Operation::Count, collection, self.backend.query_items(collection, spec, &options))?;
        let value = response.results.first().and_then(|r| r.get(COUNT_VALUE_KEY));
        value
            .and_then(|v| match v {
                Bson::Int32(n) => u64::try_from(*n).ok(),
                Bson::Int64(n) => u64::try_from(*n).ok(),
                _ => None,
            })
            .ok_or_else(|| AccessError::BackendExecution {
                operation: Operation::Count.description().to_string(),
                source: BackendError::new(
                    status::INTERNAL_SERVER_ERROR,
                    format!("count result has no integer '{COUNT_VALUE_KEY}' value: {value:?}"),
                ),
            })
    }

    /// Runs a find-shaped query to exhaustion.
    pub(crate) fn query_all(
        &self,
        op: Operation,
        collection: &str,
        spec: &QuerySpec,
        cross: bool,
    ) -> Result<Vec<Record>, AccessError> {
        let mut options = FeedOptions {
            enable_cross_partition: cross,
            max_item_count: None,
            continuation: None,
            populate_query_metrics: self.config.populate_query_metrics,
        };
        let mut records = Vec::new();
        loop {
            let result = self.call(op, collection, self.backend.query_items(collection, spec, &options));
            let Some(response) = recover(op, result.map(Some), || None)? else { break };
            records.extend(response.results);
            match response.continuation {
                Some(token) => options.continuation = Some(token),
                None => break,
            }
        }
        Ok(records)
    }

    /// Deletes one record; without a partition key the unpartitioned sentinel is used.
    ///
    /// # Errors
    /// `InvalidArgument` for a blank id, `NotFound` when nothing was deleted.
    pub fn delete_by_id(&self, collection: &str, id: &str, partition_key: Option<PartitionKey>) -> Result<(), AccessError> {
        require_text(collection, "collection name")?;
        require_text(id, "id")?;
        let options = ItemOptions::new(partition_key.unwrap_or_default());
        self.call(Operation::DeleteById, collection, self.backend.delete_item(collection, id, &options))?;
        Ok(())
    }

    /// Deletes the stored counterpart of `entity`, conditional on its version when versioned.
    ///
    /// # Errors
    /// `PreconditionFailed` for a stale version, `NotFound` when nothing was deleted.
    pub fn delete_entity<T: Entity>(&self, entity: &T, partition_key: Option<PartitionKey>) -> Result<(), AccessError> {
        let info = self.metadata.get::<T>()?;
        let record = self.mapper.write(entity)?;
        let id = require_record_id(&record)?;
        let options = item_options(&info, &record, partition_key)?;
        let collection = info.collection_name();
        self.call(Operation::DeleteById, collection, self.backend.delete_item(collection, &id, &options))?;
        Ok(())
    }

    /// Find-then-delete: returns the deleted entities.
    ///
    /// Deletes run one by one in result order. The first failure stops the batch;
    /// records already deleted stay deleted.
    ///
    /// # Errors
    /// `QueryCompilation`, `Mapping`, `InvalidArgument` for a matched record without its
    /// partition key field (raised before any delete is issued), or the first translated
    /// delete failure.
    pub fn delete<T: Entity>(&self, query: &DocumentQuery, collection: &str) -> Result<Vec<T>, AccessError> {
        require_text(collection, "collection name")?;
        let info = self.metadata.get::<T>()?;
        let spec = compile_find(query)?;
        let cross = query.is_cross_partition(&info.partition_key().fields());
        let records = self.query_all(Operation::Find, collection, &spec, cross)?;

        let mut planned = Vec::with_capacity(records.len());
        for record in &records {
            let id = record_id(record)
                .ok_or_else(|| AccessError::Mapping(format!("record in '{collection}' has no '{ID_FIELD}'")))?
                .to_string();
            planned.push((id, item_options(&info, record, None)?));
        }
        let entities = records.into_iter().map(|r| self.mapper.read(r)).collect::<Result<Vec<T>, _>>()?;

        for (id, options) in &planned {
            self.call(Operation::Delete, collection, self.backend.delete_item(collection, id, options))?;
        }
        info!("deleted {} record(s) from '{collection}'", planned.len());
        Ok(entities)
    }

    /// # Errors
    /// See [`Self::delete`].
    pub fn delete_all<T: Entity>(&self, collection: &str) -> Result<Vec<T>, AccessError> {
        self.delete(&DocumentQuery::all(), collection)
    }

    /// # Errors
    /// Translated backend errors.
    pub fn create_collection_if_not_exists(&self, info: &EntityInformation) -> Result<CollectionProperties, AccessError> {
        let props = info.collection_properties();
        let response = self.call(
            Operation::CreateCollection,
            &props.name,
            self.backend.create_collection_if_not_exists(&props),
        )?;
        Ok(response.properties)
    }

    /// # Errors
    /// See [`Self::create_collection_if_not_exists`].
    pub fn create_collection_for<T: Entity>(&self) -> Result<CollectionProperties, AccessError> {
        let info = self.metadata.get::<T>()?;
        self.create_collection_if_not_exists(&info)
    }

    /// # Errors
    /// `NotFound` for an unknown collection.
    pub fn delete_collection(&self, collection: &str) -> Result<(), AccessError> {
        require_text(collection, "collection name")?;
        self.call(Operation::DeleteCollection, collection, self.backend.delete_collection(collection))?;
        Ok(())
    }
}
