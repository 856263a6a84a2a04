use bson::Bson;

use crate::backend::{AccessCondition, ItemOptions};
use crate::errors::AccessError;
use crate::metadata::EntityInformation;
use crate::types::{PartitionKey, Record, record_etag, record_id};

/// IF-MATCH on the record's own version token, for versioned types only.
///
/// A versioned record without a token (never stored yet) is written unconditionally.
pub(crate) fn access_condition(info: &EntityInformation, record: &Record) -> Option<AccessCondition> {
    if !info.is_versioned() {
        return None;
    }
    record_etag(record).map(|etag| AccessCondition::IfMatch(etag.to_string()))
}

/// Partition key for a write or delete of `record`.
///
/// An explicit key wins. Otherwise a partitioned type reads it from the record and
/// an unpartitioned type uses the sentinel.
pub(crate) fn partition_key(
    info: &EntityInformation,
    record: &Record,
    explicit: Option<PartitionKey>,
) -> Result<PartitionKey, AccessError> {
    if let Some(pk) = explicit {
        return Ok(pk);
    }
    let Some(field) = info.partition_key().field() else {
        return Ok(PartitionKey::None);
    };
    match field_value(record, field) {
        Some(value) if *value != Bson::Null => Ok(PartitionKey::Value(value.clone())),
        _ => Err(AccessError::InvalidArgument(format!(
            "partition key field '{field}' is missing from the record for collection '{}'",
            info.collection_name()
        ))),
    }
}

/// Item options carrying the partition key and, when versioned, the IF-MATCH condition.
pub(crate) fn item_options(
    info: &EntityInformation,
    record: &Record,
    explicit: Option<PartitionKey>,
) -> Result<ItemOptions, AccessError> {
    Ok(ItemOptions {
        partition_key: partition_key(info, record, explicit)?,
        access_condition: access_condition(info, record),
    })
}

pub(crate) fn require_record_id(record: &Record) -> Result<String, AccessError> {
    match record_id(record) {
        Some(id) if !id.trim().is_empty() => Ok(id.to_string()),
        _ => Err(AccessError::InvalidArgument("entity id should not be empty or only whitespaces".into())),
    }
}

fn field_value<'a>(record: &'a Record, dotted: &str) -> Option<&'a Bson> {
    let mut segments = dotted.split('.');
    let mut current = record.get(segments.next()?)?;
    for seg in segments {
        current = current.as_document()?.get(seg)?;
    }
    Some(current)
}
