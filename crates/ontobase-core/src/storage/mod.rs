//! # Storage Drivers
//!
//! The boundary between the persistence framework and the engines that store
//! records. A [`Driver`] provides the server-, database- and collection-level
//! operations; a [`Connection`] selects the driver by protocol.
//!
//! ## Reference drivers
//!
//! - `memory://host`: [`MemoryStore`], volatile, shared per host within a thread
//! - `redb://host?dir=PATH`: [`RedbStore`], one redb file per database
//!
//! Handles are `Rc`-based and therefore confined to the thread that opened them.

pub mod memory;
pub mod redb_store;

pub use memory::MemoryStore;
pub use redb_store::RedbStore;

use crate::query::{self, Pipeline, Query};
use crate::{CollectionKind, DataSource, OntobaseError, Record, Value};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::rc::Rc;

// =============================================================================
// ADDRESSING AND METADATA
// =============================================================================

/// The fully qualified name of a collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CollectionPath {
    pub database: String,
    pub collection: String,
}

impl CollectionPath {
    #[must_use]
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// Per-collection bookkeeping kept by drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CollectionMeta {
    pub kind: CollectionKind,
    /// Last generated key; the next one is the first free key above it.
    pub next_key: u64,
}

/// Operation counters, used to observe backend traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DriverStats {
    pub reads: u64,
    pub writes: u64,
}

// =============================================================================
// DRIVER TRAIT
// =============================================================================

/// Operations a storage engine provides to the framework.
///
/// Collection-level operations address their collection by [`CollectionPath`]
/// and fail with `ResourceNotFound` if it does not exist. Filters are example
/// records (see [`crate::query::matches`]).
pub trait Driver {
    // --- server level ---

    /// Names of every database holding at least one collection.
    fn list_databases(&self) -> Result<Vec<String>, OntobaseError>;

    /// Drop a database and all its collections. Returns whether it existed.
    fn drop_database(&self, database: &str) -> Result<bool, OntobaseError>;

    // --- database level ---

    /// Names of the collections in `database`.
    fn list_collections(&self, database: &str) -> Result<Vec<String>, OntobaseError>;

    /// Metadata of a collection, `None` if it does not exist.
    fn collection_meta(&self, path: &CollectionPath)
    -> Result<Option<CollectionMeta>, OntobaseError>;

    /// Create a collection if absent. Returns its metadata.
    fn create_collection(
        &self,
        path: &CollectionPath,
        kind: CollectionKind,
    ) -> Result<CollectionMeta, OntobaseError>;

    /// Drop a collection. Returns whether it existed.
    fn drop_collection(&self, path: &CollectionPath) -> Result<bool, OntobaseError>;

    // --- collection level ---

    /// Insert records, generating keys where `_key` is absent.
    ///
    /// Returns the keys in input order. The batch is rejected as a whole if
    /// any key collides.
    fn insert(
        &self,
        path: &CollectionPath,
        records: Vec<Record>,
    ) -> Result<Vec<String>, OntobaseError>;

    /// Merge `modification` into matching records (null unsets).
    fn update(
        &self,
        path: &CollectionPath,
        modification: &Record,
        filter: &Record,
        all: bool,
    ) -> Result<usize, OntobaseError>;

    /// Replace the first matching record, keeping its identity.
    fn replace(
        &self,
        path: &CollectionPath,
        record: Record,
        filter: &Record,
    ) -> Result<usize, OntobaseError>;

    /// Delete matching records.
    fn delete(
        &self,
        path: &CollectionPath,
        filter: &Record,
        all: bool,
    ) -> Result<usize, OntobaseError>;

    /// Every record matching `filter`, in the driver's natural order.
    fn scan(&self, path: &CollectionPath, filter: &Record) -> Result<Vec<Record>, OntobaseError>;

    /// Add `by` to the integer at `offset` of the record `key` and return the
    /// value it held before. The read and the write happen atomically.
    fn fetch_add(
        &self,
        path: &CollectionPath,
        key: &str,
        offset: &str,
        by: i64,
    ) -> Result<i64, OntobaseError>;

    /// Traffic counters.
    fn stats(&self) -> DriverStats;

    // --- provided ---

    /// Matching records from `start`, at most `limit` of them.
    fn find(
        &self,
        path: &CollectionPath,
        filter: &Record,
        start: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, OntobaseError> {
        let records = self.scan(path, filter)?;
        Ok(records
            .into_iter()
            .skip(start)
            .take(limit.unwrap_or(usize::MAX))
            .collect())
    }

    fn count(&self, path: &CollectionPath, filter: &Record) -> Result<usize, OntobaseError> {
        Ok(self.scan(path, filter)?.len())
    }

    fn distinct(
        &self,
        path: &CollectionPath,
        field: &str,
        filter: &Record,
    ) -> Result<Vec<Value>, OntobaseError> {
        Ok(query::distinct(&self.scan(path, filter)?, field))
    }

    fn query(&self, path: &CollectionPath, query: &Query) -> Result<Vec<Record>, OntobaseError> {
        Ok(query.apply(self.scan(path, &query.filter)?))
    }

    fn aggregate(
        &self,
        path: &CollectionPath,
        pipeline: &Pipeline,
    ) -> Result<Vec<Record>, OntobaseError> {
        Ok(pipeline.run(self.scan(path, &Record::new())?))
    }
}

// =============================================================================
// CONNECTION
// =============================================================================

/// An open native connection, selected by the data source protocol.
#[derive(Clone)]
pub enum Connection {
    Memory(Rc<MemoryStore>),
    Redb(Rc<RedbStore>),
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory(store) => f.debug_tuple("Memory").field(&store.host()).finish(),
            Self::Redb(store) => f.debug_tuple("Redb").field(&store.directory()).finish(),
        }
    }
}

impl Connection {
    /// Open the engine named by `source`'s protocol.
    ///
    /// # Errors
    ///
    /// `ConnectionError` for unknown protocols or when the engine cannot open.
    pub fn open(source: &DataSource) -> Result<Self, OntobaseError> {
        match source.protocol() {
            memory::PROTOCOL => Ok(Self::Memory(MemoryStore::attach(source.host()))),
            redb_store::PROTOCOL => {
                let directory = source
                    .query_param(redb_store::DIRECTORY_PARAM)
                    .unwrap_or(redb_store::DEFAULT_DIRECTORY);
                let store = RedbStore::open(directory)
                    .map_err(|e| OntobaseError::ConnectionError(e.to_string()))?;
                Ok(Self::Redb(Rc::new(store)))
            }
            other => Err(OntobaseError::ConnectionError(format!(
                "unsupported protocol '{}'",
                other
            ))),
        }
    }

    /// The driver behind this connection.
    #[must_use]
    pub fn driver(&self) -> &dyn Driver {
        match self {
            Self::Memory(store) => store.as_ref(),
            Self::Redb(store) => store.as_ref(),
        }
    }
}

// =============================================================================
// SHARED DRIVER HELPERS
// =============================================================================

/// Offsets drivers own; modifications may not touch them.
pub(crate) const IDENTITY_OFFSETS: [&str; 2] = [crate::primitives::offsets::KEY, crate::primitives::offsets::ID];

/// Reject modifications that would rewrite identity offsets.
pub(crate) fn check_modification(modification: &Record) -> Result<(), OntobaseError> {
    match IDENTITY_OFFSETS
        .iter()
        .find(|offset| modification.contains_key(**offset))
    {
        Some(offset) => Err(OntobaseError::LockedOffset((*offset).to_string())),
        None => Ok(()),
    }
}

/// Merge a modification into a record with delete-on-null.
pub(crate) fn apply_modification(record: &mut Record, modification: &Record) {
    for (offset, value) in modification {
        if value.is_null() {
            record.shift_remove(offset);
        } else {
            record.insert(offset.clone(), value.clone());
        }
    }
}

/// Assign the key (generated when absent) and identifier of a new record.
///
/// Generated keys skip any key for which `taken` answers true, so explicit
/// numeric keys never collide with later keyless inserts.
/// Edge collections require both vertex offsets.
pub(crate) fn prepare_record(
    path: &CollectionPath,
    meta: &mut CollectionMeta,
    mut record: Record,
    taken: impl Fn(&str) -> Result<bool, OntobaseError>,
) -> Result<(String, Record), OntobaseError> {
    use crate::primitives::offsets;

    if meta.kind == CollectionKind::Edge {
        for offset in [offsets::FROM, offsets::TO] {
            if !record.get(offset).is_some_and(Value::is_string) {
                return Err(OntobaseError::MissingRequiredOffset(offset.to_string()));
            }
        }
    }

    let key = match record.get(offsets::KEY) {
        Some(Value::String(key)) if !key.is_empty() => key.clone(),
        Some(Value::Null) | None => loop {
            meta.next_key = meta.next_key.checked_add(1).ok_or_else(|| {
                OntobaseError::InvalidOption(format!(
                    "key space of '{}' exhausted",
                    path.collection
                ))
            })?;
            let candidate = meta.next_key.to_string();
            if !taken(&candidate)? {
                break candidate;
            }
        },
        Some(other) => {
            return Err(OntobaseError::invalid_value(
                offsets::KEY,
                format!("expected non-empty string, got {}", other),
            ));
        }
    };
    let id = crate::Identity::new(&path.collection, key.clone()).id;
    record.insert(offsets::KEY.to_string(), Value::String(key.clone()));
    record.insert(offsets::ID.to_string(), Value::String(id));
    Ok((key, record))
}

/// Restore identity offsets on a replacement record.
pub(crate) fn keep_identity(original: &Record, mut replacement: Record) -> Record {
    for offset in IDENTITY_OFFSETS {
        match original.get(offset) {
            Some(value) => {
                replacement.insert(offset.to_string(), value.clone());
            }
            None => {
                replacement.shift_remove(offset);
            }
        }
    }
    replacement
}

/// Read the integer counter at `offset`, defaulting to zero.
pub(crate) fn counter_value(record: &Record, offset: &str) -> Result<i64, OntobaseError> {
    match record.get(offset) {
        None | Some(Value::Null) => Ok(0),
        Some(value) => value
            .as_i64()
            .ok_or_else(|| OntobaseError::invalid_value(offset, "expected integer counter")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        value.as_object().cloned().expect("object")
    }

    #[test]
    fn unknown_protocol_fails_to_connect() {
        let source = DataSource::parse("mongodb://localhost").expect("parse");
        assert!(matches!(
            Connection::open(&source),
            Err(OntobaseError::ConnectionError(_))
        ));
    }

    #[test]
    fn prepare_record_generates_sequential_keys() {
        let path = CollectionPath::new("db", "things");
        let mut meta = CollectionMeta::default();
        let free = |_: &str| Ok(false);
        let (first, record1) = prepare_record(&path, &mut meta, Record::new(), free).expect("first");
        let (second, _) = prepare_record(&path, &mut meta, Record::new(), free).expect("second");

        assert_eq!(first, "1");
        assert_eq!(second, "2");
        assert_eq!(record1["_id"], json!("things/1"));
    }

    #[test]
    fn prepare_record_skips_taken_keys() {
        let path = CollectionPath::new("db", "things");
        let mut meta = CollectionMeta::default();
        let taken = |key: &str| Ok(key == "1" || key == "2");
        let (key, _) = prepare_record(&path, &mut meta, Record::new(), taken).expect("key");

        assert_eq!(key, "3");
        assert_eq!(meta.next_key, 3);
    }

    #[test]
    fn prepare_record_requires_edge_vertices() {
        let path = CollectionPath::new("db", "links");
        let mut meta = CollectionMeta {
            kind: CollectionKind::Edge,
            next_key: 0,
        };
        let result = prepare_record(&path, &mut meta, record(json!({"_from": "a/1"})), |_| {
            Ok(false)
        });
        assert!(matches!(result, Err(OntobaseError::MissingRequiredOffset(o)) if o == "_to"));
    }

    #[test]
    fn modification_cannot_touch_identity() {
        assert!(matches!(
            check_modification(&record(json!({"_key": "x"}))),
            Err(OntobaseError::LockedOffset(_))
        ));
        assert!(check_modification(&record(json!({"name": "x"}))).is_ok());
    }
}
