//! Primary table row format
//!
//! Item rows are stored as JSON `{"value": ..., "created": ..., "updated": ...}`
//! with timestamps already rendered in their canonical string form.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Store;
use crate::storage::{StorageError, StorageResult};

/// One stored item, without its key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemRecord {
    pub value: Value,
    pub created: String,
    pub updated: String,
}

impl ItemRecord {
    pub fn new(value: Value, created: String, updated: String) -> Self {
        Self {
            value,
            created,
            updated,
        }
    }

    pub fn encode(&self) -> StorageResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| StorageError::data_corruption(format!("failed to encode item: {}", e)))
    }

    pub fn decode(table: &str, key: &str, bytes: &[u8]) -> StorageResult<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StorageError::corruption_in_row(table, key, e.to_string()))
    }
}

/// Decodes every row of a primary table, in key order.
pub fn decode_items(store: &Store, table: &str) -> StorageResult<Vec<(String, ItemRecord)>> {
    let Some(rows) = store.table(table) else {
        return Ok(Vec::new());
    };
    rows.iter()
        .map(|(key, bytes)| ItemRecord::decode(table, key, bytes).map(|record| (key.clone(), record)))
        .collect()
}

/// Decodes one row of a primary table.
pub fn decode_item(store: &Store, table: &str, key: &str) -> StorageResult<Option<ItemRecord>> {
    store
        .get(table, key)
        .map(|bytes| ItemRecord::decode(table, key, bytes))
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_json_layout() {
        let record = ItemRecord::new(json!({"a": 1}), "c".into(), "u".into());
        let bytes = record.encode().unwrap();
        let raw: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(raw, json!({"value": {"a": 1}, "created": "c", "updated": "u"}));
        assert_eq!(ItemRecord::decode("t", "k", &bytes).unwrap(), record);
    }

    #[test]
    fn test_bad_row_is_corruption() {
        let err = ItemRecord::decode("t", "k", b"not json").unwrap_err();
        assert!(err.is_fatal());
    }
}
