//! # In-Memory Driver
//!
//! A volatile store kept in process memory. Stores are registered per host
//! name in a thread-local registry, so disconnecting and reconnecting to the
//! same `memory://host` sees the same data for the life of the thread.
//!
//! Records keep insertion order.

use super::{
    CollectionMeta, CollectionPath, Driver, DriverStats, apply_modification,
    check_modification, counter_value, keep_identity, prepare_record,
};
use crate::primitives::offsets;
use crate::query::matches;
use crate::{CollectionKind, OntobaseError, Record, Value};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Protocol selecting this driver.
pub const PROTOCOL: &str = "memory";

thread_local! {
    static REGISTRY: RefCell<BTreeMap<String, Rc<MemoryStore>>> = RefCell::new(BTreeMap::new());
}

#[derive(Debug, Default)]
struct MemoryCollection {
    meta: CollectionMeta,
    records: Vec<Record>,
}

impl MemoryCollection {
    fn position(&self, key: &str) -> Option<usize> {
        self.records
            .iter()
            .position(|record| record.get(offsets::KEY).and_then(Value::as_str) == Some(key))
    }
}

type Databases = BTreeMap<String, BTreeMap<String, MemoryCollection>>;

/// A volatile in-process store.
#[derive(Debug)]
pub struct MemoryStore {
    host: String,
    databases: RefCell<Databases>,
    stats: Cell<DriverStats>,
}

impl MemoryStore {
    /// Create a detached store not visible through the registry.
    #[must_use]
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            databases: RefCell::new(BTreeMap::new()),
            stats: Cell::new(DriverStats::default()),
        }
    }

    /// Get the store registered for `host`, creating it on first use.
    pub fn attach(host: &str) -> Rc<Self> {
        REGISTRY.with(|registry| {
            registry
                .borrow_mut()
                .entry(host.to_string())
                .or_insert_with(|| Rc::new(Self::new(host)))
                .clone()
        })
    }

    /// Forget the store registered for `host`. Open connections keep their data.
    pub fn detach(host: &str) -> bool {
        REGISTRY.with(|registry| registry.borrow_mut().remove(host).is_some())
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    fn record_read(&self) {
        let mut stats = self.stats.get();
        stats.reads = stats.reads.saturating_add(1);
        self.stats.set(stats);
    }

    fn record_write(&self) {
        let mut stats = self.stats.get();
        stats.writes = stats.writes.saturating_add(1);
        self.stats.set(stats);
    }

    /// Run `f` against an existing collection.
    fn with_collection<T>(
        &self,
        path: &CollectionPath,
        f: impl FnOnce(&mut MemoryCollection) -> Result<T, OntobaseError>,
    ) -> Result<T, OntobaseError> {
        let mut databases = self.databases.borrow_mut();
        let collection = databases
            .get_mut(&path.database)
            .and_then(|collections| collections.get_mut(&path.collection))
            .ok_or_else(|| OntobaseError::ResourceNotFound(path.to_string()))?;
        f(collection)
    }
}

impl Driver for MemoryStore {
    fn list_databases(&self) -> Result<Vec<String>, OntobaseError> {
        self.record_read();
        Ok(self
            .databases
            .borrow()
            .iter()
            .filter(|(_, collections)| !collections.is_empty())
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn drop_database(&self, database: &str) -> Result<bool, OntobaseError> {
        self.record_write();
        Ok(self.databases.borrow_mut().remove(database).is_some())
    }

    fn list_collections(&self, database: &str) -> Result<Vec<String>, OntobaseError> {
        self.record_read();
        Ok(self
            .databases
            .borrow()
            .get(database)
            .map(|collections| collections.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn collection_meta(
        &self,
        path: &CollectionPath,
    ) -> Result<Option<CollectionMeta>, OntobaseError> {
        self.record_read();
        Ok(self
            .databases
            .borrow()
            .get(&path.database)
            .and_then(|collections| collections.get(&path.collection))
            .map(|collection| collection.meta))
    }

    fn create_collection(
        &self,
        path: &CollectionPath,
        kind: CollectionKind,
    ) -> Result<CollectionMeta, OntobaseError> {
        let mut databases = self.databases.borrow_mut();
        let collection = databases
            .entry(path.database.clone())
            .or_default()
            .entry(path.collection.clone())
            .or_insert_with(|| {
                self.record_write();
                MemoryCollection {
                    meta: CollectionMeta { kind, next_key: 0 },
                    records: Vec::new(),
                }
            });
        Ok(collection.meta)
    }

    fn drop_collection(&self, path: &CollectionPath) -> Result<bool, OntobaseError> {
        self.record_write();
        Ok(self
            .databases
            .borrow_mut()
            .get_mut(&path.database)
            .and_then(|collections| collections.remove(&path.collection))
            .is_some())
    }

    fn insert(
        &self,
        path: &CollectionPath,
        records: Vec<Record>,
    ) -> Result<Vec<String>, OntobaseError> {
        self.record_write();
        self.with_collection(path, |collection| {
            let mut meta = collection.meta;
            let mut prepared = Vec::with_capacity(records.len());
            for record in records {
                let taken = |key: &str| {
                    collection.position(key).is_some()
                        || prepared.iter().any(|(k, _): &(String, Record)| k == key)
                };
                let (key, record) = prepare_record(path, &mut meta, record, |k| Ok(taken(k)))?;
                let collides = taken(&key);
                if collides {
                    return Err(OntobaseError::DuplicateKey {
                        collection: path.collection.clone(),
                        key,
                    });
                }
                prepared.push((key, record));
            }

            collection.meta = meta;
            let mut keys = Vec::with_capacity(prepared.len());
            for (key, record) in prepared {
                collection.records.push(record);
                keys.push(key);
            }
            Ok(keys)
        })
    }

    fn update(
        &self,
        path: &CollectionPath,
        modification: &Record,
        filter: &Record,
        all: bool,
    ) -> Result<usize, OntobaseError> {
        check_modification(modification)?;
        self.record_write();
        self.with_collection(path, |collection| {
            let mut modified = 0;
            for record in collection
                .records
                .iter_mut()
                .filter(|record| matches(record, filter))
            {
                apply_modification(record, modification);
                modified += 1;
                if !all {
                    break;
                }
            }
            Ok(modified)
        })
    }

    fn replace(
        &self,
        path: &CollectionPath,
        record: Record,
        filter: &Record,
    ) -> Result<usize, OntobaseError> {
        self.record_write();
        self.with_collection(path, |collection| {
            match collection
                .records
                .iter_mut()
                .find(|existing| matches(existing, filter))
            {
                Some(existing) => {
                    *existing = keep_identity(existing, record);
                    Ok(1)
                }
                None => Ok(0),
            }
        })
    }

    fn delete(
        &self,
        path: &CollectionPath,
        filter: &Record,
        all: bool,
    ) -> Result<usize, OntobaseError> {
        self.record_write();
        self.with_collection(path, |collection| {
            let before = collection.records.len();
            if all {
                collection.records.retain(|record| !matches(record, filter));
            } else if let Some(index) = collection
                .records
                .iter()
                .position(|record| matches(record, filter))
            {
                collection.records.remove(index);
            }
            Ok(before - collection.records.len())
        })
    }

    fn scan(&self, path: &CollectionPath, filter: &Record) -> Result<Vec<Record>, OntobaseError> {
        self.record_read();
        self.with_collection(path, |collection| {
            Ok(collection
                .records
                .iter()
                .filter(|record| matches(record, filter))
                .cloned()
                .collect())
        })
    }

    fn fetch_add(
        &self,
        path: &CollectionPath,
        key: &str,
        offset: &str,
        by: i64,
    ) -> Result<i64, OntobaseError> {
        self.record_write();
        self.with_collection(path, |collection| {
            let index = collection
                .position(key)
                .ok_or_else(|| OntobaseError::ResourceNotFound(format!("{}/{}", path, key)))?;
            let record = &mut collection.records[index];
            let current = counter_value(record, offset)?;
            record.insert(offset.to_string(), Value::from(current.saturating_add(by)));
            Ok(current)
        })
    }

    fn stats(&self) -> DriverStats {
        self.stats.get()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object")
    }

    fn store_with_collection() -> (MemoryStore, CollectionPath) {
        let store = MemoryStore::new("test");
        let path = CollectionPath::new("db", "things");
        store
            .create_collection(&path, CollectionKind::Document)
            .expect("create");
        (store, path)
    }

    #[test]
    fn insert_and_scan_preserve_order() {
        let (store, path) = store_with_collection();
        let keys = store
            .insert(
                &path,
                vec![record(json!({"n": 2})), record(json!({"_key": "a", "n": 1}))],
            )
            .expect("insert");
        assert_eq!(keys, vec!["1".to_string(), "a".to_string()]);

        let all = store.scan(&path, &Record::new()).expect("scan");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0]["_id"], json!("things/1"));
        assert_eq!(all[1]["n"], json!(1));
    }

    #[test]
    fn duplicate_key_rejects_whole_batch() {
        let (store, path) = store_with_collection();
        store
            .insert(&path, vec![record(json!({"_key": "a"}))])
            .expect("insert");
        let result = store.insert(
            &path,
            vec![record(json!({"_key": "b"})), record(json!({"_key": "a"}))],
        );
        assert!(matches!(result, Err(OntobaseError::DuplicateKey { .. })));
        assert_eq!(store.count(&path, &Record::new()).expect("count"), 1);
    }

    #[test]
    fn update_first_or_all() {
        let (store, path) = store_with_collection();
        store
            .insert(
                &path,
                vec![record(json!({"t": 1})), record(json!({"t": 1})), record(json!({"t": 2}))],
            )
            .expect("insert");

        let filter = record(json!({"t": 1}));
        let modification = record(json!({"seen": true}));
        assert_eq!(store.update(&path, &modification, &filter, false).expect("one"), 1);
        assert_eq!(store.update(&path, &modification, &filter, true).expect("all"), 2);
        assert_eq!(
            store.count(&path, &record(json!({"seen": true}))).expect("count"),
            2
        );
    }

    #[test]
    fn replace_keeps_identity() {
        let (store, path) = store_with_collection();
        store
            .insert(&path, vec![record(json!({"_key": "k", "old": 1}))])
            .expect("insert");
        let replaced = store
            .replace(&path, record(json!({"new": 2})), &record(json!({"_key": "k"})))
            .expect("replace");
        assert_eq!(replaced, 1);

        let stored = store.scan(&path, &Record::new()).expect("scan");
        assert_eq!(stored[0], record(json!({"new": 2, "_key": "k", "_id": "things/k"})));
    }

    #[test]
    fn delete_first_or_all() {
        let (store, path) = store_with_collection();
        store
            .insert(&path, vec![record(json!({"t": 1})), record(json!({"t": 1}))])
            .expect("insert");
        let filter = record(json!({"t": 1}));
        assert_eq!(store.delete(&path, &filter, false).expect("delete"), 1);
        assert_eq!(store.delete(&path, &filter, true).expect("delete"), 1);
        assert_eq!(store.delete(&path, &filter, true).expect("delete"), 0);
    }

    #[test]
    fn fetch_add_returns_previous_value() {
        let (store, path) = store_with_collection();
        store
            .insert(&path, vec![record(json!({"_key": "serials", "serial": 5}))])
            .expect("insert");
        assert_eq!(store.fetch_add(&path, "serials", "serial", 1).expect("add"), 5);
        assert_eq!(store.fetch_add(&path, "serials", "serial", 1).expect("add"), 6);
        assert!(matches!(
            store.fetch_add(&path, "missing", "serial", 1),
            Err(OntobaseError::ResourceNotFound(_))
        ));
    }

    #[test]
    fn missing_collection_is_not_found() {
        let store = MemoryStore::new("test");
        let path = CollectionPath::new("db", "nope");
        assert!(matches!(
            store.scan(&path, &Record::new()),
            Err(OntobaseError::ResourceNotFound(_))
        ));
        assert!(store.collection_meta(&path).expect("meta").is_none());
    }

    #[test]
    fn registry_shares_store_per_host() {
        let a = MemoryStore::attach("registry-shared");
        let b = MemoryStore::attach("registry-shared");
        assert!(Rc::ptr_eq(&a, &b));
        assert!(MemoryStore::detach("registry-shared"));
        let c = MemoryStore::attach("registry-shared");
        assert!(!Rc::ptr_eq(&a, &c));
    }

    #[test]
    fn drop_database_removes_collections() {
        let (store, path) = store_with_collection();
        assert_eq!(store.list_databases().expect("list"), vec!["db".to_string()]);
        assert!(store.drop_database("db").expect("drop"));
        assert!(store.list_collections("db").expect("list").is_empty());
        assert!(!store.drop_collection(&path).expect("drop"));
    }
}
