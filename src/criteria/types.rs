use bson::Bson;
use serde::{Deserialize, Serialize};

/// Predicate kinds a [`Criteria`] node can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CriteriaType {
    All,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanEqual,
    LessThan,
    LessThanEqual,
    In,
    StartsWith,
    Contains,
    IsNull,
    IsNotNull,
    And,
    Or,
    Not,
}

impl CriteriaType {
    #[must_use]
    pub const fn is_combinator(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Not)
    }

    /// Infix operator for binary comparisons.
    #[must_use]
    pub const fn operator(self) -> Option<&'static str> {
        match self {
            Self::Equal => Some("="),
            Self::NotEqual => Some("!="),
            Self::GreaterThan => Some(">"),
            Self::GreaterThanEqual => Some(">="),
            Self::LessThan => Some("<"),
            Self::LessThanEqual => Some("<="),
            _ => None,
        }
    }

    /// Number of operands the kind expects; `None` means any count (membership).
    #[must_use]
    pub const fn arity(self) -> Option<usize> {
        match self {
            Self::In => None,
            Self::All | Self::IsNull | Self::IsNotNull | Self::And | Self::Or | Self::Not => {
                Some(0)
            }
            _ => Some(1),
        }
    }
}

/// Immutable filter tree node.
///
/// Leaves carry a subject (field path) and operands; `And`/`Or` carry children,
/// `Not` carries exactly one child. `All` carries nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    kind: CriteriaType,
    subject: Option<String>,
    operands: Vec<Bson>,
    children: Vec<Criteria>,
}

impl Criteria {
    fn leaf(kind: CriteriaType, subject: impl Into<String>, operands: Vec<Bson>) -> Self {
        Self { kind, subject: Some(subject.into()), operands, children: Vec::new() }
    }

    fn node(kind: CriteriaType, children: Vec<Self>) -> Self {
        Self { kind, subject: None, operands: Vec::new(), children }
    }

    #[must_use]
    pub const fn all() -> Self {
        Self { kind: CriteriaType::All, subject: None, operands: Vec::new(), children: Vec::new() }
    }

    pub fn eq(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::Equal, subject, vec![value.into()])
    }

    pub fn ne(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::NotEqual, subject, vec![value.into()])
    }

    pub fn gt(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::GreaterThan, subject, vec![value.into()])
    }

    pub fn gte(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::GreaterThanEqual, subject, vec![value.into()])
    }

    pub fn lt(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::LessThan, subject, vec![value.into()])
    }

    pub fn lte(subject: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self::leaf(CriteriaType::LessThanEqual, subject, vec![value.into()])
    }

    /// Membership test. An empty value list is accepted here and rejected at compile time.
    pub fn is_in<I, V>(subject: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Bson>,
    {
        Self::leaf(CriteriaType::In, subject, values.into_iter().map(Into::into).collect())
    }

    pub fn starts_with(subject: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self::leaf(CriteriaType::StartsWith, subject, vec![Bson::String(prefix.into())])
    }

    pub fn contains(subject: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::leaf(CriteriaType::Contains, subject, vec![Bson::String(needle.into())])
    }

    pub fn is_null(subject: impl Into<String>) -> Self {
        Self::leaf(CriteriaType::IsNull, subject, Vec::new())
    }

    pub fn is_not_null(subject: impl Into<String>) -> Self {
        Self::leaf(CriteriaType::IsNotNull, subject, Vec::new())
    }

    #[must_use]
    pub fn and(children: Vec<Self>) -> Self {
        Self::node(CriteriaType::And, children)
    }

    #[must_use]
    pub fn or(children: Vec<Self>) -> Self {
        Self::node(CriteriaType::Or, children)
    }

    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(child: Self) -> Self {
        Self::node(CriteriaType::Not, vec![child])
    }

    /// Folds filter clauses supplied together with AND semantics.
    #[must_use]
    pub fn from_clauses(mut clauses: Vec<Self>) -> Self {
        match clauses.len() {
            0 => Self::all(),
            1 => clauses.remove(0),
            _ => Self::and(clauses),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> CriteriaType {
        self.kind
    }

    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    #[must_use]
    pub fn operands(&self) -> &[Bson] {
        &self.operands
    }

    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Total operand count across every leaf of the tree.
    #[must_use]
    pub fn operand_count(&self) -> usize {
        self.operands.len() + self.children.iter().map(Self::operand_count).sum::<usize>()
    }

    /// True when any node of the tree has the given subject.
    #[must_use]
    pub fn mentions(&self, subject: &str) -> bool {
        self.subject() == Some(subject) || self.children.iter().any(|c| c.mentions(subject))
    }
}

impl Default for Criteria {
    fn default() -> Self {
        Self::all()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    pub order: Order,
}

/// Ordered sort directives; the first entry is the primary key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    orders: Vec<SortSpec>,
}

impl Sort {
    #[must_use]
    pub const fn unsorted() -> Self {
        Self { orders: Vec::new() }
    }

    pub fn by(field: impl Into<String>, order: Order) -> Self {
        Self::unsorted().and(field, order)
    }

    #[must_use]
    pub fn and(mut self, field: impl Into<String>, order: Order) -> Self {
        self.orders.push(SortSpec { field: field.into(), order });
        self
    }

    #[must_use]
    pub fn is_sorted(&self) -> bool {
        !self.orders.is_empty()
    }

    #[must_use]
    pub fn orders(&self) -> &[SortSpec] {
        &self.orders
    }
}

impl From<Vec<SortSpec>> for Sort {
    fn from(orders: Vec<SortSpec>) -> Self {
        Self { orders }
    }
}
