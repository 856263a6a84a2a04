use bson::Bson;

use super::types::{Criteria, CriteriaType, Sort};
use crate::page::PageState;

/// A criteria tree plus optional paging and an explicit sort.
///
/// Built per call and consumed by the compiler; never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentQuery {
    criteria: Criteria,
    page: Option<PageState>,
    sort: Sort,
}

impl DocumentQuery {
    #[must_use]
    pub fn new(criteria: Criteria) -> Self {
        Self { criteria, page: None, sort: Sort::unsorted() }
    }

    #[must_use]
    pub fn all() -> Self {
        Self::new(Criteria::all())
    }

    #[must_use]
    pub fn with_page(mut self, page: PageState) -> Self {
        self.page = Some(page);
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Sort) -> Self {
        self.sort = sort;
        self
    }

    #[must_use]
    pub const fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    #[must_use]
    pub const fn page(&self) -> Option<&PageState> {
        self.page.as_ref()
    }

    /// The explicit sort when present, otherwise the sort carried by the page state.
    #[must_use]
    pub fn effective_sort(&self) -> &Sort {
        if self.sort.is_sorted() {
            return &self.sort;
        }
        self.page.as_ref().map_or(&self.sort, PageState::sort)
    }

    /// Whether executing this query needs a fan-out across all partitions.
    ///
    /// Only a single-valued equality on the partition key field, reachable from the
    /// root through `And` nodes, pins the query to one partition.
    #[must_use]
    pub fn is_cross_partition(&self, partition_key_fields: &[String]) -> bool {
        partition_key_fields.is_empty()
            || partition_key_fields.iter().any(|f| self.partition_key_value(f).is_none())
    }

    /// The partition key value this query pins, if any.
    #[must_use]
    pub fn partition_key_value(&self, field: &str) -> Option<&Bson> {
        pinned_value(&self.criteria, field)
    }
}

fn pinned_value<'a>(criteria: &'a Criteria, field: &str) -> Option<&'a Bson> {
    match criteria.kind() {
        CriteriaType::And => criteria.children().iter().find_map(|c| pinned_value(c, field)),
        CriteriaType::Equal | CriteriaType::In if criteria.subject() == Some(field) => {
            match criteria.operands() {
                [single] => Some(single),
                _ => None,
            }
        }
        _ => None,
    }
}

impl From<Criteria> for DocumentQuery {
    fn from(criteria: Criteria) -> Self {
        Self::new(criteria)
    }
}
