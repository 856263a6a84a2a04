use bson::Bson;
use serde::{Deserialize, Serialize};

use super::types::{Criteria, Order, Sort};
use crate::errors::AccessError;

// Serde-facing structures for safe JSON parsing of criteria
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CriteriaSerde {
    Literal(bool),
    Node(Box<CriteriaNodeSerde>),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CriteriaNodeSerde {
    #[serde(default, rename = "$and", skip_serializing_if = "Option::is_none")]
    pub and: Option<Vec<CriteriaSerde>>,
    #[serde(default, rename = "$or", skip_serializing_if = "Option::is_none")]
    pub or: Option<Vec<CriteriaSerde>>,
    #[serde(default, rename = "$not", skip_serializing_if = "Option::is_none")]
    pub not: Option<CriteriaSerde>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, rename = "$eq", skip_serializing_if = "Option::is_none")]
    pub eq: Option<Bson>,
    #[serde(default, rename = "$ne", skip_serializing_if = "Option::is_none")]
    pub ne: Option<Bson>,
    #[serde(default, rename = "$gt", skip_serializing_if = "Option::is_none")]
    pub gt: Option<Bson>,
    #[serde(default, rename = "$gte", skip_serializing_if = "Option::is_none")]
    pub gte: Option<Bson>,
    #[serde(default, rename = "$lt", skip_serializing_if = "Option::is_none")]
    pub lt: Option<Bson>,
    #[serde(default, rename = "$lte", skip_serializing_if = "Option::is_none")]
    pub lte: Option<Bson>,
    #[serde(default, rename = "$in", skip_serializing_if = "Option::is_none")]
    pub in_vals: Option<Vec<Bson>>,
    #[serde(default, rename = "$startsWith", skip_serializing_if = "Option::is_none")]
    pub starts_with: Option<String>,
    #[serde(default, rename = "$contains", skip_serializing_if = "Option::is_none")]
    pub contains: Option<String>,
    #[serde(default, rename = "$null", skip_serializing_if = "Option::is_none")]
    pub null: Option<bool>,
}

fn invalid(msg: &str) -> AccessError {
    AccessError::QueryCompilation(msg.to_string())
}

impl TryFrom<CriteriaSerde> for Criteria {
    type Error = AccessError;
    fn try_from(cs: CriteriaSerde) -> Result<Self, Self::Error> {
        match cs {
            CriteriaSerde::Literal(true) => Ok(Self::all()),
            CriteriaSerde::Literal(false) => Ok(Self::not(Self::all())),
            CriteriaSerde::Node(node) => Self::try_from(*node),
        }
    }
}

impl TryFrom<CriteriaNodeSerde> for Criteria {
    type Error = AccessError;
    fn try_from(n: CriteriaNodeSerde) -> Result<Self, Self::Error> {
        let convert = |items: Vec<CriteriaSerde>| {
            items.into_iter().map(Self::try_from).collect::<Result<Vec<_>, _>>()
        };
        if let Some(and) = n.and {
            return Ok(Self::and(convert(and)?));
        }
        if let Some(or) = n.or {
            return Ok(Self::or(convert(or)?));
        }
        if let Some(not) = n.not {
            return Ok(Self::not(Self::try_from(not)?));
        }
        let field = n.field.ok_or_else(|| invalid("criteria object needs \"field\" or a combinator"))?;
        if field.trim().is_empty() {
            return Err(invalid("criteria field must not be empty"));
        }
        Ok(if let Some(v) = n.eq {
            Self::eq(field, v)
        } else if let Some(v) = n.ne {
            Self::ne(field, v)
        } else if let Some(v) = n.gt {
            Self::gt(field, v)
        } else if let Some(v) = n.gte {
            Self::gte(field, v)
        } else if let Some(v) = n.lt {
            Self::lt(field, v)
        } else if let Some(v) = n.lte {
            Self::lte(field, v)
        } else if let Some(vals) = n.in_vals {
            Self::is_in(field, vals)
        } else if let Some(s) = n.starts_with {
            Self::starts_with(field, s)
        } else if let Some(s) = n.contains {
            Self::contains(field, s)
        } else if let Some(null) = n.null {
            if null { Self::is_null(field) } else { Self::is_not_null(field) }
        } else {
            return Err(invalid("No comparison operator provided (use $null for null checks)"));
        })
    }
}

/// # Errors
/// Returns an error if the JSON string cannot be parsed into a criteria tree.
pub fn parse_criteria_json(json: &str) -> Result<Criteria, AccessError> {
    let cs: CriteriaSerde = serde_json::from_str(json)?;
    Criteria::try_from(cs)
}

/// Parses `field[:asc|:desc]` entries separated by commas.
///
/// # Errors
/// Returns an error on an empty field name or an unknown direction.
pub fn parse_sort(spec: &str) -> Result<Sort, AccessError> {
    let mut sort = Sort::unsorted();
    for part in spec.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (field, dir) = part.split_once(':').unwrap_or((part, "asc"));
        if field.trim().is_empty() {
            return Err(AccessError::InvalidArgument(format!("empty sort field in '{part}'")));
        }
        let order = match dir.trim().to_ascii_lowercase().as_str() {
            "asc" => Order::Asc,
            "desc" => Order::Desc,
            other => {
                return Err(AccessError::InvalidArgument(format!("unknown sort direction '{other}'")));
            }
        };
        sort = sort.and(field.trim(), order);
    }
    Ok(sort)
}
