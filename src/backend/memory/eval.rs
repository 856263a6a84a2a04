use std::cmp::Ordering;

use bson::{Bson, Document};

use super::sql::{CmpOp, Expr, Func, Operand};
use crate::criteria::Order;
use crate::query::QuerySpec;

const MAX_PATH_DEPTH: usize = 32;

/// Three-valued predicate evaluation: `None` is "undefined" and never matches.
pub(crate) fn eval(doc: &Document, expr: &Expr, spec: &QuerySpec) -> Result<Option<bool>, String> {
    Ok(match expr {
        Expr::Value(op) => match resolve(doc, op, spec)? {
            Some(Bson::Boolean(b)) => Some(*b),
            _ => None,
        },
        Expr::Not(inner) => eval(doc, inner, spec)?.map(|b| !b),
        Expr::And(a, b) => match (eval(doc, a, spec)?, eval(doc, b, spec)?) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        Expr::Or(a, b) => match (eval(doc, a, spec)?, eval(doc, b, spec)?) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
        Expr::Compare { left, op, right } => {
            let (Some(l), Some(r)) = (resolve(doc, left, spec)?, resolve(doc, right, spec)?) else {
                return Ok(None);
            };
            compare(l, *op, r)
        }
        Expr::In { target, values } => {
            let Some(t) = resolve(doc, target, spec)? else { return Ok(None) };
            let mut hit = false;
            for v in values {
                if resolve(doc, v, spec)?.is_some_and(|v| values_equal(t, v)) {
                    hit = true;
                    break;
                }
            }
            Some(hit)
        }
        Expr::Call { func, args } => {
            let vals = args.iter().map(|a| resolve(doc, a, spec)).collect::<Result<Vec<_>, _>>()?;
            match (func, vals.as_slice()) {
                (Func::IsNull, [v]) => Some(matches!(v, Some(Bson::Null))),
                (Func::StartsWith, [Some(Bson::String(s)), Some(Bson::String(p))]) => {
                    Some(s.starts_with(p.as_str()))
                }
                (Func::Contains, [Some(Bson::String(s)), Some(Bson::String(p))]) => {
                    Some(s.contains(p.as_str()))
                }
                _ => None,
            }
        }
    })
}

fn resolve<'a>(doc: &'a Document, op: &'a Operand, spec: &'a QuerySpec) -> Result<Option<&'a Bson>, String> {
    match op {
        Operand::Path(path) => Ok(get_path(doc, path.as_slice())),
        Operand::Literal(v) => Ok(Some(v)),
        Operand::Param(name) => {
            spec.parameter(name).map(Some).ok_or_else(|| format!("parameter {name} is not bound"))
        }
    }
}

/// Walks nested documents; `None` when any segment is missing.
pub(crate) fn get_path<'a, S: AsRef<str>>(doc: &'a Document, path: &[S]) -> Option<&'a Bson> {
    if path.is_empty() || path.len() > MAX_PATH_DEPTH {
        return None;
    }
    let (last, parents) = path.split_last()?;
    let mut cur = doc;
    for seg in parents {
        match cur.get(seg.as_ref()) {
            Some(Bson::Document(d)) => cur = d,
            _ => return None,
        }
    }
    cur.get(last.as_ref())
}

fn compare(l: &Bson, op: CmpOp, r: &Bson) -> Option<bool> {
    match op {
        CmpOp::Eq => Some(values_equal(l, r)),
        CmpOp::Ne => Some(!values_equal(l, r)),
        _ => {
            if !comparable(l, r) {
                return None;
            }
            let ord = compare_bson(l, r);
            Some(match op {
                CmpOp::Gt => ord == Ordering::Greater,
                CmpOp::Gte => ord != Ordering::Less,
                CmpOp::Lt => ord == Ordering::Less,
                _ => ord != Ordering::Greater,
            })
        }
    }
}

fn is_num(v: &Bson) -> bool {
    matches!(v, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_))
}

fn as_f64(v: &Bson) -> f64 {
    match v {
        Bson::Int32(i) => f64::from(*i),
        Bson::Int64(i) => *i as f64,
        Bson::Double(f) => *f,
        Bson::Decimal128(d) => d.to_string().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

const fn as_int(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(i) => Some(*i as i64),
        Bson::Int64(i) => Some(*i),
        _ => None,
    }
}

/// Integer pairs compare exactly; anything involving a float or decimal widens to `f64`.
fn numeric_cmp(a: &Bson, b: &Bson) -> Option<Ordering> {
    match (as_int(a), as_int(b)) {
        (Some(x), Some(y)) => Some(x.cmp(&y)),
        _ => as_f64(a).partial_cmp(&as_f64(b)),
    }
}

fn comparable(l: &Bson, r: &Bson) -> bool {
    (is_num(l) && is_num(r))
        || matches!((l, r), (Bson::String(_), Bson::String(_)) | (Bson::Boolean(_), Bson::Boolean(_)))
}

/// Equality with numeric widening, so `Int32(5)` equals `Int64(5)` and `Double(5.0)`.
pub(crate) fn values_equal(a: &Bson, b: &Bson) -> bool {
    if is_num(a) && is_num(b) {
        return numeric_cmp(a, b) == Some(Ordering::Equal);
    }
    a == b
}

/// Total order used for ORDER BY: numbers by value, strings and booleans naturally,
/// otherwise by type rank.
pub(crate) fn compare_bson(a: &Bson, b: &Bson) -> Ordering {
    if is_num(a) && is_num(b) {
        return numeric_cmp(a, b).unwrap_or_else(|| as_f64(a).total_cmp(&as_f64(b)));
    }
    match (a, b) {
        (Bson::String(x), Bson::String(y)) => x.cmp(y),
        (Bson::Boolean(x), Bson::Boolean(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

const fn type_rank(v: &Bson) -> u8 {
    match v {
        Bson::Null => 0,
        Bson::Boolean(_) => 1,
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => 2,
        Bson::String(_) => 3,
        Bson::Array(_) => 4,
        Bson::Document(_) => 5,
        Bson::DateTime(_) | Bson::Timestamp(_) => 6,
        _ => 7,
    }
}

/// Orders two records by the given paths; a missing value sorts before any present one.
pub(crate) fn compare_docs(a: &Document, b: &Document, order_by: &[(Vec<String>, Order)]) -> Ordering {
    for (path, order) in order_by {
        let ord = match (get_path(a, path.as_slice()), get_path(b, path.as_slice())) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => compare_bson(x, y),
        };
        let ord = if *order == Order::Desc { ord.reverse() } else { ord };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}
