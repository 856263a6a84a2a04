use log::debug;

use super::DocumentTemplate;
use super::translate::{Operation, recover};
use crate::backend::{ExecutionBackend, FeedOptions, FeedResponse};
use crate::criteria::DocumentQuery;
use crate::errors::{AccessError, require_text};
use crate::mapping::ResultMapper;
use crate::metadata::Entity;
use crate::page::{Page, PageState};
use crate::query::{compile_count, compile_find};

impl<B: ExecutionBackend, M: ResultMapper> DocumentTemplate<B, M> {
    /// Fetches the page the query's [`PageState`] points at.
    ///
    /// Issues one bounded find plus one full count over the same predicate. The
    /// returned page carries the backend continuation; pass `page.next_page()` back
    /// in to continue.
    ///
    /// # Errors
    /// `InvalidArgument` when the query has no page state or its size is zero,
    /// `QueryCompilation` for malformed criteria, translated backend errors.
    pub fn paginate<T: Entity>(&self, query: &DocumentQuery, collection: &str) -> Result<Page<T>, AccessError> {
        require_text(collection, "collection name")?;
        let state = query
            .page()
            .cloned()
            .ok_or_else(|| AccessError::InvalidArgument("paginated query needs a page state".into()))?;
        if state.size() == 0 {
            return Err(AccessError::InvalidArgument("page size should be greater than 0".into()));
        }
        let info = self.metadata.get::<T>()?;
        let cross = query.is_cross_partition(&info.partition_key().fields());
        let find = compile_find(query)?;
        let count = compile_count(query)?;

        let options = FeedOptions {
            enable_cross_partition: cross,
            max_item_count: Some(state.size()),
            continuation: state.continuation().map(str::to_string),
            populate_query_metrics: self.config.populate_query_metrics,
        };
        let result = self.call(Operation::Paginate, collection, self.backend.query_items(collection, &find, &options));
        let response = recover(Operation::Paginate, result, FeedResponse::default)?;
        let mut records = response.results;
        records.truncate(state.size());
        let content = records.into_iter().map(|r| self.mapper.read(r)).collect::<Result<Vec<T>, _>>()?;

        let total = if content.is_empty() && response.continuation.is_none() && state.continuation().is_none() {
            0
        } else {
            self.count_spec(collection, &count, cross)?
        };
        debug!(
            "page {} of '{collection}': {} item(s), {total} total, more={}",
            state.page_number(),
            content.len(),
            response.continuation.is_some()
        );
        Ok(Page::new(content, state, response.continuation, total))
    }

    /// Pages through the whole collection.
    ///
    /// # Errors
    /// See [`Self::paginate`].
    pub fn find_all_paged<T: Entity>(&self, state: PageState, collection: &str) -> Result<Page<T>, AccessError> {
        self.paginate(&DocumentQuery::all().with_page(state), collection)
    }
}
