//! Query evaluation over an in-memory collection.
//!
//! Ordering follows the usual document-store rules: records without the
//! ordering field come first, then `false`, `true`, numbers ascending,
//! strings lexicographically, and finally arrays/objects. Ties are broken by
//! key. Keys that parse as integers sort numerically before other keys.

use std::cmp::Ordering;

use serde_json::Value;
use storefront_storage::{Document, Limit, OrderBy, Query, StorageError};

fn rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(false)) => 1,
        Some(Value::Bool(true)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_) | Value::Object(_)) => 5,
    }
}

/// Total order over optional JSON values used for `order_by_child`.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    rank(a).cmp(&rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        _ => Ordering::Equal,
    })
}

/// Order over record keys.
pub fn compare_keys(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

fn ordering_value(order_by: &OrderBy, key: &str, record: &Value) -> Option<Value> {
    match order_by {
        OrderBy::Key => Some(Value::String(key.to_string())),
        OrderBy::Child(field) => record.get(field.as_str()).cloned(),
    }
}

fn matches(query: &Query, key: &str, record: &Value) -> bool {
    let value = ordering_value(&query.order_by, key, record);
    let value = value.as_ref();
    if let Some(expected) = &query.equal_to
        && compare_values(value, Some(expected)) != Ordering::Equal
    {
        return false;
    }
    if let Some(start) = &query.start_at
        && compare_values(value, Some(start)) == Ordering::Less
    {
        return false;
    }
    if let Some(end) = &query.end_at
        && compare_values(value, Some(end)) == Ordering::Greater
    {
        return false;
    }
    true
}

/// Runs `query` over `records` and returns the matching documents in query
/// order.
pub fn execute<'a, I>(query: &Query, records: I) -> Result<Vec<Document>, StorageError>
where
    I: IntoIterator<Item = (&'a String, &'a Value)>,
{
    query.validate()?;

    let mut rows: Vec<(&String, &Value)> = records
        .into_iter()
        .filter(|(key, record)| matches(query, key, record))
        .collect();

    rows.sort_by(|(ka, va), (kb, vb)| match &query.order_by {
        OrderBy::Key => compare_keys(ka, kb),
        OrderBy::Child(field) => {
            compare_values(va.get(field.as_str()), vb.get(field.as_str()))
                .then_with(|| compare_keys(ka, kb))
        }
    });

    let rows: &[(&String, &Value)] = match query.limit {
        Some(Limit::First(n)) => &rows[..n.min(rows.len())],
        Some(Limit::Last(n)) => &rows[rows.len().saturating_sub(n)..],
        None => &rows,
    };

    Ok(rows
        .iter()
        .map(|(key, record)| Document::new(key.as_str(), (*record).clone()))
        .collect())
}
