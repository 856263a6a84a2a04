use bson::Bson;
use serde::Serialize;

/// A named value bound to a placeholder in the query text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Bson,
}

/// Compiled query: text with `@pN` placeholders plus the ordered bindings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    text: String,
    parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    pub fn new(text: impl Into<String>, parameters: Vec<QueryParameter>) -> Self {
        Self { text: text.into(), parameters }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn parameters(&self) -> &[QueryParameter] {
        &self.parameters
    }

    /// Looks up a bound value by placeholder name (including the `@`).
    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Bson> {
        self.parameters.iter().find(|p| p.name == name).map(|p| &p.value)
    }
}

impl std::fmt::Display for QuerySpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
