//! Typed, criteria-driven access to a partitioned document store.
//!
//! Callers build a [`Criteria`] tree, wrap it in a [`DocumentQuery`], and hand it to a
//! [`DocumentTemplate`], which compiles it into a parameterized [`QuerySpec`], runs it
//! on an [`ExecutionBackend`], maps raw records to entities, and translates failures
//! into [`AccessError`].

pub mod backend;
pub mod config;
pub mod criteria;
pub mod diagnostics;
pub mod errors;
pub mod logger;
pub mod mapping;
pub mod metadata;
pub mod page;
pub mod query;
pub mod template;
pub mod types;

pub use backend::{BackendError, ExecutionBackend, MemoryBackend, MemoryBackendOptions};
pub use config::TemplateConfig;
pub use criteria::{Criteria, CriteriaType, DocumentQuery, Order, Sort, SortSpec};
pub use diagnostics::{DiagnosticsSink, LogDiagnostics, MemoryDiagnostics, ResponseDiagnostics};
pub use errors::AccessError;
pub use mapping::{BsonMapper, ResultMapper};
pub use metadata::{Entity, EntityInformation, MetadataCache, PartitionKeyDescriptor};
pub use page::{Page, PageState, PageStatus};
pub use query::{QuerySpec, compile_count, compile_find};
pub use template::{DocumentTemplate, DocumentTemplateBuilder};
pub use types::{PartitionKey, Record};
