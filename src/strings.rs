//! String intern table for wire-delivered names
//!
//! Module, function and GPU timeline names are large and highly repeated,
//! so the remote side sends each once with a small integer key and events
//! reference the key. Keys arrive incrementally over the whole capture.

use std::collections::HashMap;
use std::sync::Mutex;

/// Process-wide intern table mapping keys to strings. First writer wins;
/// re-sending a key is a no-op, which makes ingestion retries harmless.
#[derive(Debug, Default)]
pub struct StringManager {
    key_to_string: Mutex<HashMap<u64, String>>,
}

impl StringManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `string` under `key` unless the key is already present.
    /// Returns true if the string was inserted.
    pub fn add_if_not_present(&self, key: u64, string: String) -> bool {
        let mut map = self.key_to_string.lock().unwrap();
        if map.contains_key(&key) {
            return false;
        }
        map.insert(key, string);
        true
    }

    #[must_use]
    pub fn get(&self, key: u64) -> Option<String> {
        self.key_to_string.lock().unwrap().get(&key).cloned()
    }

    #[must_use]
    pub fn contains(&self, key: u64) -> bool {
        self.key_to_string.lock().unwrap().contains_key(&key)
    }

    /// Snapshot of the whole table, used as serializer input.
    #[must_use]
    pub fn key_to_string_map(&self) -> HashMap<u64, String> {
        self.key_to_string.lock().unwrap().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.key_to_string.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
