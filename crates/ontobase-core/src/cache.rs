//! # Cache Service
//!
//! The shared cache fronting hot ontology entities. Any key/value service
//! that can get, set, delete and flush JSON values can back it.

use crate::{OntobaseError, Value};
use std::collections::HashMap;

/// A key/value cache. Failures surface as `CacheError`.
pub trait CacheService {
    /// Prepare the service for use.
    fn open(&mut self) -> Result<(), OntobaseError> {
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<Value>, OntobaseError>;

    fn set(&mut self, key: &str, value: Value) -> Result<(), OntobaseError>;

    /// Remove `key`. Returns whether it was present.
    fn delete(&mut self, key: &str) -> Result<bool, OntobaseError>;

    /// Remove every entry.
    fn flush(&mut self) -> Result<(), OntobaseError>;
}

/// A process-local cache.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<String, Value>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CacheService for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Value>, OntobaseError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: Value) -> Result<(), OntobaseError> {
        self.entries.insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<bool, OntobaseError> {
        Ok(self.entries.remove(key).is_some())
    }

    fn flush(&mut self) -> Result<(), OntobaseError> {
        self.entries.clear();
        Ok(())
    }
}
