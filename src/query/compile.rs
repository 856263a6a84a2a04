use bson::Bson;

use super::spec::{QueryParameter, QuerySpec};
use crate::criteria::{Criteria, CriteriaType, DocumentQuery, Order, Sort};
use crate::errors::AccessError;

/// Result key the count shape stores its scalar under.
pub const COUNT_VALUE_KEY: &str = "_aggregate";
/// Alias the compiled text uses for the collection root.
pub const ROOT_ALIAS: &str = "r";

const KEYWORDS: &[&str] = &[
    "AND", "AS", "ASC", "BETWEEN", "BY", "COUNT", "DESC", "FALSE", "FROM", "IN", "JOIN", "LIKE",
    "NOT", "NULL", "OR", "ORDER", "ROOT", "SELECT", "TOP", "TRUE", "UNDEFINED", "VALUE", "WHERE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    /// Select every field of every matching record.
    Find,
    /// Select the aggregate match count under [`COUNT_VALUE_KEY`].
    Count,
}

/// # Errors
/// Fails with `QueryCompilation` on an empty combinator, an empty membership set,
/// a missing subject, an operand count that does not fit the predicate, or an empty sort field.
pub fn compile(query: &DocumentQuery, shape: QueryShape) -> Result<QuerySpec, AccessError> {
    let mut r = Renderer::default();
    let mut text = match shape {
        QueryShape::Find => format!("SELECT * FROM ROOT {ROOT_ALIAS}"),
        QueryShape::Count => format!("SELECT COUNT(1) AS {COUNT_VALUE_KEY} FROM ROOT {ROOT_ALIAS}"),
    };
    if query.criteria().kind() != CriteriaType::All {
        let predicate = r.render(query.criteria())?;
        text.push_str(" WHERE ");
        text.push_str(&predicate);
    }
    if shape == QueryShape::Find {
        append_order(&mut text, query.effective_sort())?;
    }
    Ok(QuerySpec::new(text, r.params))
}

/// # Errors
/// See [`compile`].
pub fn compile_find(query: &DocumentQuery) -> Result<QuerySpec, AccessError> {
    compile(query, QueryShape::Find)
}

/// # Errors
/// See [`compile`].
pub fn compile_count(query: &DocumentQuery) -> Result<QuerySpec, AccessError> {
    compile(query, QueryShape::Count)
}

fn append_order(sql: &mut String, sort: &Sort) -> Result<(), AccessError> {
    if !sort.is_sorted() {
        return Ok(());
    }
    let mut clauses = Vec::with_capacity(sort.orders().len());
    for spec in sort.orders() {
        let field = field_ref(&spec.field)?;
        match spec.order {
            Order::Asc => clauses.push(format!("{field} ASC")),
            Order::Desc => clauses.push(format!("{field} DESC")),
        }
    }
    sql.push_str(" ORDER BY ");
    sql.push_str(&clauses.join(", "));
    Ok(())
}

#[derive(Default)]
struct Renderer {
    params: Vec<QueryParameter>,
}

impl Renderer {
    fn bind(&mut self, value: &Bson) -> String {
        let name = format!("@p{}", self.params.len());
        self.params.push(QueryParameter { name: name.clone(), value: value.clone() });
        name
    }

    fn render(&mut self, c: &Criteria) -> Result<String, AccessError> {
        match c.kind() {
            CriteriaType::All => Ok("true".to_string()),
            CriteriaType::And | CriteriaType::Or => {
                if c.children().is_empty() {
                    return Err(malformed(format!("{:?} needs at least one child", c.kind())));
                }
                let joiner = if c.kind() == CriteriaType::And { " AND " } else { " OR " };
                let parts =
                    c.children().iter().map(|child| self.render(child)).collect::<Result<Vec<_>, _>>()?;
                Ok(format!("({})", parts.join(joiner)))
            }
            CriteriaType::Not => match c.children() {
                [child] => Ok(format!("NOT ({})", self.render(child)?)),
                other => Err(malformed(format!("Not needs exactly one child, got {}", other.len()))),
            },
            kind => self.render_leaf(kind, c),
        }
    }

    fn render_leaf(&mut self, kind: CriteriaType, c: &Criteria) -> Result<String, AccessError> {
        let subject = c.subject().unwrap_or_default();
        if subject.trim().is_empty() {
            return Err(malformed(format!("{kind:?} needs a subject")));
        }
        let field = field_ref(subject)?;
        let operands = c.operands();
        match kind.arity() {
            Some(n) if operands.len() != n => {
                return Err(malformed(format!(
                    "{kind:?} on '{subject}' takes {n} operand(s), got {}",
                    operands.len()
                )));
            }
            None if operands.is_empty() => {
                return Err(malformed(format!("In on '{subject}' has no values")));
            }
            _ => {}
        }
        if let Some(op) = kind.operator() {
            let p = self.bind(&operands[0]);
            return Ok(format!("{field} {op} {p}"));
        }
        Ok(match kind {
            CriteriaType::In => {
                let placeholders: Vec<_> = operands.iter().map(|v| self.bind(v)).collect();
                format!("{field} IN ({})", placeholders.join(", "))
            }
            CriteriaType::StartsWith => format!("STARTSWITH({field}, {})", self.bind(&operands[0])),
            CriteriaType::Contains => format!("CONTAINS({field}, {})", self.bind(&operands[0])),
            CriteriaType::IsNull => format!("IS_NULL({field})"),
            CriteriaType::IsNotNull => format!("NOT IS_NULL({field})"),
            other => return Err(malformed(format!("{other:?} is not a leaf predicate"))),
        })
    }
}

fn malformed(msg: String) -> AccessError {
    AccessError::QueryCompilation(msg)
}

/// Renders a dotted field path against the root alias.
///
/// Plain identifiers use dot access; anything else (including keywords) uses bracket access.
fn field_ref(path: &str) -> Result<String, AccessError> {
    if path.trim().is_empty() {
        return Err(malformed("empty field path".to_string()));
    }
    let mut out = String::from(ROOT_ALIAS);
    for segment in path.split('.') {
        if segment.is_empty() {
            return Err(malformed(format!("empty segment in field path '{path}'")));
        }
        if is_plain_identifier(segment) {
            out.push('.');
            out.push_str(segment);
        } else {
            out.push_str("[\"");
            for ch in segment.chars() {
                if ch == '"' || ch == '\\' {
                    out.push('\\');
                }
                out.push(ch);
            }
            out.push_str("\"]");
        }
    }
    Ok(out)
}

fn is_plain_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(segment))
}
