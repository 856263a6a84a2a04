use bson::Bson;
use serde::{Deserialize, Serialize};

pub type CollectionName = String;
pub type DocumentId = String;

/// A raw stored record. Top-level is always a document carrying an `id`.
pub type Record = bson::Document;

/// Identifier field every record carries.
pub const ID_FIELD: &str = "id";
/// Version token written by the backend on every successful write.
pub const ETAG_FIELD: &str = "_etag";
/// Last-write timestamp (seconds since epoch).
pub const TIMESTAMP_FIELD: &str = "_ts";

/// Partition key value for point operations.
///
/// `None` is the backend's sentinel for records that live outside any partition.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum PartitionKey {
    #[default]
    None,
    Value(Bson),
}

impl PartitionKey {
    pub fn new(value: impl Into<Bson>) -> Self {
        Self::Value(value.into())
    }

    /// Builds a key from a record field value; a missing field maps to the sentinel.
    #[must_use]
    pub fn from_field(value: Option<&Bson>) -> Self {
        match value {
            Some(Bson::Null) | None => Self::None,
            Some(v) => Self::Value(v.clone()),
        }
    }

    #[must_use]
    pub const fn as_value(&self) -> Option<&Bson> {
        match self {
            Self::None => None,
            Self::Value(v) => Some(v),
        }
    }
}

impl std::fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "<none>"),
            Self::Value(v) => write!(f, "{v}"),
        }
    }
}

/// Reads the version token carried by a record.
#[must_use]
pub fn record_etag(record: &Record) -> Option<&str> {
    record.get_str(ETAG_FIELD).ok()
}

/// Reads the identifier carried by a record.
#[must_use]
pub fn record_id(record: &Record) -> Option<&str> {
    record.get_str(ID_FIELD).ok()
}
