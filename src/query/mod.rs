// Criteria-to-query compiler
mod compile;
mod spec;

pub use compile::{COUNT_VALUE_KEY, QueryShape, ROOT_ALIAS, compile, compile_count, compile_find};
pub use spec::{QueryParameter, QuerySpec};
