//! Compiled template cache

use std::sync::Arc;

use dashmap::DashMap;

/// Compiled templates keyed by type name or ad-hoc text hash
///
/// No expiry and no size bound. Concurrent misses on the same key may both
/// compile and insert; the later insert wins and both values are equivalent.
#[derive(Debug)]
pub struct TemplateCache<T> {
    entries: DashMap<String, Arc<T>>,
}

impl<T> Default for TemplateCache<T> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl<T> TemplateCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Arc<T>> {
        self.entries.get(key).map(|entry| Arc::clone(entry.value()))
    }

    /// Store `template` under `key`, replacing any previous entry
    pub fn insert(&self, key: impl Into<String>, template: Arc<T>) {
        self.entries.insert(key.into(), template);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
