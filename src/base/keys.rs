//! Item key handling
//!
//! Keys come from the explicit argument, else from a top-level `"key"` entry
//! of a mapping value, else they are generated.

use std::collections::BTreeSet;

use rand::Rng;
use serde_json::Value;

use crate::errors::{OakError, OakResult};
use crate::store::Store;

/// Characters used for generated keys
pub const KEY_ALPHABET: &[u8] = b"abcdefhiklmnorstuvwxz1234567890";

/// Field of a mapping value that carries the item key
pub const KEY_FIELD: &str = "key";

/// Removes a top-level `"key"` entry from `value` and picks the item key.
///
/// The explicit key wins over the embedded one. Returns `None` when a key
/// must be generated.
pub fn take_key(value: &mut Value, explicit: Option<&str>) -> OakResult<Option<String>> {
    let embedded = match value {
        Value::Object(map) => map.shift_remove(KEY_FIELD),
        _ => None,
    };

    if let Some(key) = explicit {
        if key.is_empty() {
            return Err(OakError::invalid("key must not be empty"));
        }
        return Ok(Some(key.to_string()));
    }

    match embedded {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Err(OakError::invalid("key must not be empty")),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(OakError::invalid(format!(
            "key must be a string or a number, got {}",
            other
        ))),
    }
}

/// Generates a key absent from `table` and from `taken`.
pub fn generate_key(store: &Store, table: &str, taken: &BTreeSet<String>, length: usize) -> String {
    let mut rng = rand::thread_rng();
    loop {
        let key: String = (0..length)
            .map(|_| KEY_ALPHABET[rng.gen_range(0..KEY_ALPHABET.len())] as char)
            .collect();
        if !store.contains(table, &key) && !taken.contains(&key) {
            return key;
        }
    }
}
