use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::errors::AccessError;
use crate::types::Record;

/// Converts between raw records and typed entities. Implementations must be pure.
pub trait ResultMapper: Send + Sync {
    /// # Errors
    /// `Mapping` when the record does not fit the target type.
    fn read<T: DeserializeOwned>(&self, record: Record) -> Result<T, AccessError>;

    /// # Errors
    /// `Mapping` when the entity does not serialize to a document.
    fn write<T: Serialize>(&self, entity: &T) -> Result<Record, AccessError>;
}

/// Default mapper going through serde's BSON data model.
///
/// Fields the target type does not declare (such as `_ts`) are ignored on read.
#[derive(Debug, Clone, Copy, Default)]
pub struct BsonMapper;

impl ResultMapper for BsonMapper {
    fn read<T: DeserializeOwned>(&self, record: Record) -> Result<T, AccessError> {
        Ok(bson::from_document(record)?)
    }

    fn write<T: Serialize>(&self, entity: &T) -> Result<Record, AccessError> {
        Ok(bson::to_document(entity)?)
    }
}
