// Submodules for separation of concerns
mod parse;
mod query;
mod types;

pub use parse::{CriteriaNodeSerde, CriteriaSerde, parse_criteria_json, parse_sort};
pub use query::DocumentQuery;
pub use types::{Criteria, CriteriaType, Order, Sort, SortSpec};
