use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};
use parking_lot::RwLock;
use serde::Serialize;

use crate::backend::{BackendError, CollectionResponse, FeedResponse, ItemResponse, QueryMetrics};

/// Log target receiving one structured line per backend call.
pub const METRICS_TARGET: &str = "nexus_access::metrics";

const STATUS_OK: u16 = 200;

/// Observation of one backend round trip, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseDiagnostics {
    pub database: String,
    pub operation: String,
    pub collection: String,
    pub status: u16,
    pub request_charge: f64,
    pub item_count: usize,
    pub has_continuation: bool,
    pub query_metrics: Option<QueryMetrics>,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

impl ResponseDiagnostics {
    pub(crate) fn success<R: Observed>(
        database: &str,
        operation: &str,
        collection: &str,
        response: &R,
        elapsed: Duration,
    ) -> Self {
        Self {
            database: database.to_string(),
            operation: operation.to_string(),
            collection: collection.to_string(),
            status: STATUS_OK,
            request_charge: response.request_charge(),
            item_count: response.item_count(),
            has_continuation: response.has_continuation(),
            query_metrics: response.query_metrics().cloned(),
            duration_ms: millis(elapsed),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub(crate) fn failure(
        database: &str,
        operation: &str,
        collection: &str,
        error: &BackendError,
        elapsed: Duration,
    ) -> Self {
        Self {
            database: database.to_string(),
            operation: operation.to_string(),
            collection: collection.to_string(),
            status: error.status(),
            request_charge: 0.0,
            item_count: 0,
            has_continuation: false,
            query_metrics: None,
            duration_ms: millis(elapsed),
            timestamp: Utc::now(),
            error: Some(error.message().to_string()),
        }
    }

    #[must_use]
    pub const fn is_failure(&self) -> bool {
        self.error.is_some()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Response shapes diagnostics can summarise.
pub(crate) trait Observed {
    fn request_charge(&self) -> f64;
    fn item_count(&self) -> usize;
    fn has_continuation(&self) -> bool {
        false
    }
    fn query_metrics(&self) -> Option<&QueryMetrics> {
        None
    }
}

impl Observed for FeedResponse {
    fn request_charge(&self) -> f64 {
        self.request_charge
    }
    fn item_count(&self) -> usize {
        self.results.len()
    }
    fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }
    fn query_metrics(&self) -> Option<&QueryMetrics> {
        self.query_metrics.as_ref()
    }
}

impl Observed for ItemResponse {
    fn request_charge(&self) -> f64 {
        self.request_charge
    }
    fn item_count(&self) -> usize {
        usize::from(self.record.is_some())
    }
}

impl Observed for CollectionResponse {
    fn request_charge(&self) -> f64 {
        self.request_charge
    }
    fn item_count(&self) -> usize {
        0
    }
}

/// Receives every backend observation. Purely observational.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, diagnostics: &ResponseDiagnostics);
}

/// Writes each observation as a JSON line on [`METRICS_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogDiagnostics;

impl DiagnosticsSink for LogDiagnostics {
    fn record(&self, diagnostics: &ResponseDiagnostics) {
        match serde_json::to_string(diagnostics) {
            Ok(line) if diagnostics.is_failure() => warn!(target: METRICS_TARGET, "{line}"),
            Ok(line) => info!(target: METRICS_TARGET, "{line}"),
            Err(e) => warn!(target: METRICS_TARGET, "unserializable diagnostics for {}: {e}", diagnostics.operation),
        }
    }
}

/// Keeps observations in memory, mostly for assertions in tests.
#[derive(Debug, Default)]
pub struct MemoryDiagnostics {
    records: RwLock<Vec<ResponseDiagnostics>>,
}

impl MemoryDiagnostics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn records(&self) -> Vec<ResponseDiagnostics> {
        self.records.read().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn clear(&self) {
        self.records.write().clear();
    }
}

impl DiagnosticsSink for MemoryDiagnostics {
    fn record(&self, diagnostics: &ResponseDiagnostics) {
        self.records.write().push(diagnostics.clone());
    }
}
