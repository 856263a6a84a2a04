//! Typed document operations over an [`ExecutionBackend`].
//!
//! Every public operation blocks until the backend pipeline finishes. Each backend
//! round trip is timed, reported to the diagnostics sink (success or failure) and its
//! failure translated into [`AccessError`] before the operation decides what to do.

mod ops;
mod paging;
mod translate;
mod versioning;

pub use translate::{Operation, translate};

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, warn};

use crate::backend::{BackendError, ExecutionBackend};
use crate::config::TemplateConfig;
use crate::diagnostics::{DiagnosticsSink, LogDiagnostics, Observed, ResponseDiagnostics};
use crate::errors::AccessError;
use crate::mapping::{BsonMapper, ResultMapper};
use crate::metadata::MetadataCache;

/// Synchronous entry point for typed reads and writes against one backend.
///
/// # Panics
/// Every operation drives its backend call on the template's own current-thread
/// runtime with `block_on`, so calling one from inside an async context (for example
/// a `#[tokio::main]` function or a task) panics. Use `tokio::task::spawn_blocking`
/// or a dedicated thread there.
pub struct DocumentTemplate<B: ExecutionBackend, M: ResultMapper = BsonMapper> {
    backend: B,
    mapper: M,
    metadata: Arc<MetadataCache>,
    diagnostics: Arc<dyn DiagnosticsSink>,
    config: TemplateConfig,
    runtime: tokio::runtime::Runtime,
}

impl<B: ExecutionBackend> DocumentTemplate<B> {
    /// Template with the default mapper, a fresh metadata cache and log diagnostics.
    ///
    /// # Errors
    /// `Io` when the internal runtime cannot be started.
    pub fn new(backend: B) -> Result<Self, AccessError> {
        Self::builder(backend).build()
    }

    #[must_use]
    pub fn builder(backend: B) -> DocumentTemplateBuilder<B> {
        DocumentTemplateBuilder {
            backend,
            mapper: BsonMapper,
            metadata: None,
            diagnostics: None,
            config: TemplateConfig::default(),
        }
    }
}

pub struct DocumentTemplateBuilder<B: ExecutionBackend, M: ResultMapper = BsonMapper> {
    backend: B,
    mapper: M,
    metadata: Option<Arc<MetadataCache>>,
    diagnostics: Option<Arc<dyn DiagnosticsSink>>,
    config: TemplateConfig,
}

impl<B: ExecutionBackend, M: ResultMapper> DocumentTemplateBuilder<B, M> {
    #[must_use]
    pub fn mapper<N: ResultMapper>(self, mapper: N) -> DocumentTemplateBuilder<B, N> {
        DocumentTemplateBuilder {
            backend: self.backend,
            mapper,
            metadata: self.metadata,
            diagnostics: self.diagnostics,
            config: self.config,
        }
    }

    /// Shares a metadata cache, e.g. between templates over the same entity types.
    #[must_use]
    pub fn metadata_cache(mut self, cache: Arc<MetadataCache>) -> Self {
        self.metadata = Some(cache);
        self
    }

    #[must_use]
    pub fn diagnostics(mut self, sink: Arc<dyn DiagnosticsSink>) -> Self {
        self.diagnostics = Some(sink);
        self
    }

    #[must_use]
    pub fn config(mut self, config: TemplateConfig) -> Self {
        self.config = config;
        self
    }

    /// # Errors
    /// `InvalidArgument` for a blank database name, `Io` when the runtime cannot start.
    pub fn build(self) -> Result<DocumentTemplate<B, M>, AccessError> {
        crate::errors::require_text(&self.config.database_name, "database name")?;
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
        Ok(DocumentTemplate {
            backend: self.backend,
            mapper: self.mapper,
            metadata: self.metadata.unwrap_or_default(),
            diagnostics: self.diagnostics.unwrap_or_else(|| Arc::new(LogDiagnostics)),
            config: self.config,
            runtime,
        })
    }
}

impl<B: ExecutionBackend, M: ResultMapper> DocumentTemplate<B, M> {
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    #[must_use]
    pub fn metadata(&self) -> &MetadataCache {
        &self.metadata
    }

    #[must_use]
    pub const fn config(&self) -> &TemplateConfig {
        &self.config
    }

    /// Drives one backend call to completion, reports it, and translates its failure.
    ///
    /// Must not be called from inside another tokio runtime.
    pub(crate) fn call<R, F>(&self, op: Operation, collection: &str, pipeline: F) -> Result<R, AccessError>
    where
        R: Observed,
        F: Future<Output = Result<R, BackendError>>,
    {
        let started = Instant::now();
        let outcome = self.runtime.block_on(pipeline);
        let elapsed = started.elapsed();
        let db = &self.config.database_name;
        match outcome {
            Ok(response) => {
                self.diagnostics.record(&ResponseDiagnostics::success(db, op.name(), collection, &response, elapsed));
                debug!("{} on '{collection}' done in {elapsed:?}", op.name());
                Ok(response)
            }
            Err(e) => {
                self.diagnostics.record(&ResponseDiagnostics::failure(db, op.name(), collection, &e, elapsed));
                warn!("{} on '{collection}' failed: {e}", op.name());
                Err(translate(op, e))
            }
        }
    }
}
