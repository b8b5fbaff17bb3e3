//! Key-Value Store
//!
//! A `String -> String` table behind a single `RwLock`. It has no notion of
//! time: expiration lives in [`TtlScheduler`](crate::storage::TtlScheduler),
//! which calls back into [`Store::delete`] when a key's deadline passes.

use glob_match::glob_match;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe key-value table, shared between connections behind an `Arc`.
///
/// # Example
///
/// ```
/// use radish::storage::Store;
///
/// let store = Store::new();
/// store.set("name", "Ariz");
/// assert_eq!(store.get("name"), Some("Ariz".to_string()));
/// assert!(store.delete("name"));
/// assert!(!store.delete("name"));
/// ```
#[derive(Debug, Default)]
pub struct Store {
    data: RwLock<HashMap<String, String>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated
    // (every operation is a single HashMap call), so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sets a key, overwriting any previous value.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) {
        self.write().insert(key.into(), value.into());
    }

    /// Gets the value for a key.
    pub fn get(&self, key: &str) -> Option<String> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    /// Removes a key. Returns `true` if it existed.
    ///
    /// Deleting an absent key is a no-op, which makes this safe to use as
    /// the expiration callback for keys that were already removed.
    pub fn delete(&self, key: &str) -> bool {
        self.write().remove(key).is_some()
    }

    /// Returns every key matching a shell-style glob, sorted.
    ///
    /// Supported patterns:
    /// - `*` matches any run of characters
    /// - `?` matches exactly one character
    /// - `[ae]` / `[a-z]` / `[!a]` match character classes
    /// - `{foo,bar}` matches alternatives
    pub fn matches(&self, pattern: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .read()
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect();
        keys.sort_unstable();
        keys
    }

    /// Removes every key.
    pub fn flush_all(&self) {
        self.write().clear();
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let store = Store::new();
        store.set("name", "Ariz");
        assert_eq!(store.get("name").as_deref(), Some("Ariz"));

        store.set("name", "Bob");
        assert_eq!(store.get("name").as_deref(), Some("Bob"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_get_nonexistent() {
        let store = Store::new();
        assert_eq!(store.get("missing"), None);
        assert!(!store.contains("missing"));
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = Store::new();
        store.set("key", "value");
        assert!(store.delete("key"));
        assert!(!store.delete("key"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_matches_pattern() {
        let store = Store::new();
        for key in ["hello", "hallo", "hxllo", "hllo", "world"] {
            store.set(key, "1");
        }

        assert_eq!(store.matches("*").len(), 5);
        assert_eq!(store.matches("h*llo"), ["hallo", "hello", "hllo", "hxllo"]);
        assert_eq!(store.matches("h?llo"), ["hallo", "hello", "hxllo"]);
        assert_eq!(store.matches("h[ae]llo"), ["hallo", "hello"]);
        assert!(store.matches("nothing*").is_empty());
    }

    #[test]
    fn test_flush_all() {
        let store = Store::new();
        store.set("key1", "value1");
        store.set("key2", "value2");

        store.flush_all();

        assert!(store.is_empty());
        assert_eq!(store.get("key1"), None);
    }

    #[test]
    fn test_concurrent_access() {
        let store = Arc::new(Store::new());
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for j in 0..100 {
                        let key = format!("key-{}-{}", i, j);
                        store.set(key.clone(), "value");
                        assert!(store.get(&key).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }
}
