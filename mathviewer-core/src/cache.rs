//! Conversion memo table keyed by formula text.
//!
//! Entries live as long as the cache itself: there is no eviction, no TTL and
//! no size bound. Keys are used verbatim, without normalization.

use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TextCache {
    entries: RwLock<HashMap<String, String>>,
}

impl TextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Store `value` under `key`; an existing entry is overwritten.
    pub fn populate(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.write().insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn populate_then_get() {
        let cache = TextCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get("x^2"), None);

        cache.populate("x^2", "<math><msup><mi>x</mi><mn>2</mn></msup></math>");
        assert_eq!(
            cache.get("x^2").as_deref(),
            Some("<math><msup><mi>x</mi><mn>2</mn></msup></math>")
        );
        assert!(cache.contains("x^2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn last_write_wins() {
        let cache = TextCache::new();
        cache.populate("a", "1");
        cache.populate("a", "2");
        assert_eq!(cache.get("a").as_deref(), Some("2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_are_not_normalized() {
        let cache = TextCache::new();
        cache.populate("x ", "spaced");
        assert_eq!(cache.get("x"), None);
    }
}
