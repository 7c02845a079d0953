//! Helpers for constructing, identifying, and decoding chunk payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use uuid::{Builder, Uuid};

use crate::index::{FilterValue, IndexEntry};

/// Payload fields describing one stored chunk.
pub(crate) struct ChunkPayload<'a> {
    pub(crate) namespace: &'a str,
    pub(crate) entry_key: &'a str,
    pub(crate) entry_id: &'a str,
    pub(crate) chunk_index: usize,
    pub(crate) text: &'a str,
    pub(crate) filter_values: &'a [FilterValue],
    pub(crate) metadata: &'a Map<String, Value>,
    pub(crate) timestamp: &'a str,
}

/// Build the payload object stored alongside each indexed chunk.
pub(crate) fn build_payload(chunk: &ChunkPayload<'_>) -> Value {
    let filters: Map<String, Value> = chunk
        .filter_values
        .iter()
        .map(|filter| (filter.name.clone(), Value::String(filter.value.clone())))
        .collect();

    let mut payload = Map::new();
    payload.insert("namespace".into(), Value::String(chunk.namespace.to_string()));
    payload.insert("entry_key".into(), Value::String(chunk.entry_key.to_string()));
    payload.insert("entry_id".into(), Value::String(chunk.entry_id.to_string()));
    payload.insert("chunk_index".into(), Value::from(chunk.chunk_index));
    payload.insert("text".into(), Value::String(chunk.text.to_string()));
    payload.insert("filter_values".into(), Value::Object(filters));
    payload.insert("metadata".into(), Value::Object(chunk.metadata.clone()));
    payload.insert("timestamp".into(), Value::String(chunk.timestamp.to_string()));
    Value::Object(payload)
}

/// Stable entry identifier: SHA-256 hex of `namespace:key`.
pub fn compute_entry_id(namespace: &str, key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Deterministic point identifier for one chunk of an entry.
pub(crate) fn compute_point_id(entry_id: &str, chunk_index: usize) -> Uuid {
    let mut hasher = Sha256::new();
    hasher.update(entry_id.as_bytes());
    hasher.update(chunk_index.to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0_u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    Builder::from_random_bytes(bytes).into_uuid()
}

/// Current timestamp formatted for payload storage.
pub(crate) fn current_timestamp_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Rebuild an entry description from a chunk payload.
pub(crate) fn entry_from_payload(payload: &Map<String, Value>) -> Option<IndexEntry> {
    let text = |field: &str| payload.get(field).and_then(Value::as_str).map(str::to_string);

    let filter_values = match payload.get("filter_values") {
        Some(Value::Object(filters)) => filters
            .iter()
            .filter_map(|(name, value)| {
                value
                    .as_str()
                    .map(|value| FilterValue::new(name.clone(), value))
            })
            .collect(),
        _ => Vec::new(),
    };
    let metadata = match payload.get("metadata") {
        Some(Value::Object(metadata)) => metadata.clone(),
        _ => Map::new(),
    };

    let updated_at = payload
        .get("timestamp")
        .and_then(Value::as_str)
        .and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok());

    Some(IndexEntry {
        entry_id: text("entry_id")?,
        namespace: text("namespace")?,
        key: text("entry_key")?,
        filter_values,
        metadata,
        updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::BILL_NAMESPACE;

    #[test]
    fn entry_id_is_sha256_of_namespace_and_key() {
        let id = compute_entry_id("bills", "119-hr-1");
        assert_eq!(id.len(), 64);
        assert_eq!(id, compute_entry_id("bills", "119-hr-1"));
        assert_ne!(id, compute_entry_id("bills", "119-hr-2"));
    }

    #[test]
    fn point_ids_are_stable_per_chunk() {
        let entry = compute_entry_id("bills", "119-hr-1");
        assert_eq!(compute_point_id(&entry, 0), compute_point_id(&entry, 0));
        assert_ne!(compute_point_id(&entry, 0), compute_point_id(&entry, 1));
    }

    #[test]
    fn timestamp_is_rfc3339_like() {
        let ts = current_timestamp_rfc3339();
        assert!(ts.contains('T') && ts.ends_with('Z'));
    }

    #[test]
    fn payload_round_trips_into_entry() {
        let mut metadata = Map::new();
        metadata.insert("versionCode".into(), Value::String("ih".into()));
        let filters = vec![FilterValue::new("billIdentifier", "119-hr-1")];
        let entry_id = compute_entry_id(BILL_NAMESPACE, "119-hr-1");
        let payload = build_payload(&ChunkPayload {
            namespace: BILL_NAMESPACE,
            entry_key: "119-hr-1",
            entry_id: &entry_id,
            chunk_index: 0,
            text: "sample",
            filter_values: &filters,
            metadata: &metadata,
            timestamp: "2025-01-01T00:00:00Z",
        });
        assert_eq!(payload["chunk_index"], 0);
        assert_eq!(payload["filter_values"]["billIdentifier"], "119-hr-1");

        let entry = entry_from_payload(payload.as_object().expect("object")).expect("entry");
        assert_eq!(entry.key, "119-hr-1");
        assert_eq!(entry.entry_id, entry_id);
        assert_eq!(entry.filter_values, filters);
        assert_eq!(entry.metadata, metadata);
        assert_eq!(entry.updated_at, Some(time::macros::datetime!(2025-01-01 00:00 UTC)));
    }

    #[test]
    fn payload_without_identity_is_ignored() {
        let mut payload = Map::new();
        payload.insert("text".into(), Value::String("orphan".into()));
        assert!(entry_from_payload(&payload).is_none());
    }
}
