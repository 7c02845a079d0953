//! Filter builders for Qdrant scroll, delete, and query requests.

use serde_json::{Value, json};

use crate::index::FilterValue;

fn match_value(key: &str, value: impl Into<Value>) -> Value {
    json!({
        "key": key,
        "match": { "value": value.into() }
    })
}

/// Every chunk of one entry.
pub fn entry_filter(namespace: &str, entry_id: &str) -> Value {
    json!({
        "must": [
            match_value("namespace", namespace),
            match_value("entry_id", entry_id),
        ]
    })
}

/// Chunks of one entry at or past `first_stale_index`, left over from a longer previous version.
pub fn stale_chunks_filter(namespace: &str, entry_id: &str, first_stale_index: usize) -> Value {
    json!({
        "must": [
            match_value("namespace", namespace),
            match_value("entry_id", entry_id),
            {
                "key": "chunk_index",
                "range": { "gte": first_stale_index }
            }
        ]
    })
}

/// First chunk of each entry in a namespace; one point per logical entry.
pub fn entry_heads_filter(namespace: &str) -> Value {
    json!({
        "must": [
            match_value("namespace", namespace),
            match_value("chunk_index", 0),
        ]
    })
}

/// Namespace constraint plus an exact match on every supplied filter value.
pub fn build_search_filter(namespace: &str, filter_values: &[FilterValue]) -> Value {
    let mut must = vec![match_value("namespace", namespace)];
    for filter in filter_values {
        let name = filter.name.trim();
        let value = filter.value.trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        must.push(match_value(&format!("filter_values.{name}"), value));
    }
    json!({ "must": must })
}
