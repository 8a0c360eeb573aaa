//! # redb-backed Document Storage
//!
//! A disk-backed driver using the redb embedded database, providing:
//! - ACID transactions
//! - Crash safety (copy-on-write B-trees)
//! - A single writer, which makes `fetch_add` atomic
//!
//! ## Layout
//!
//! Each database is one file, `<dir>/<database>.redb`, holding:
//! - `collections`: collection name -> postcard `CollectionMeta`
//! - `records/<collection>`: key -> JSON record bytes
//!
//! Records iterate in key order.

use super::{
    CollectionMeta, CollectionPath, Driver, DriverStats, apply_modification,
    check_modification, counter_value, keep_identity, prepare_record,
};
use crate::query::matches;
use crate::{CollectionKind, OntobaseError, Record, Value};
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Protocol selecting this driver.
pub const PROTOCOL: &str = "redb";

/// Query parameter naming the data directory.
pub const DIRECTORY_PARAM: &str = "dir";

/// Data directory used when the connection string names none.
pub const DEFAULT_DIRECTORY: &str = ".";

/// File extension of database files.
const FILE_EXTENSION: &str = "redb";

/// Table for collections: name -> serialized CollectionMeta
const COLLECTIONS: TableDefinition<&str, &[u8]> = TableDefinition::new("collections");

/// Prefix of per-collection record tables.
const RECORDS_PREFIX: &str = "records/";

fn io_err(e: impl std::fmt::Display) -> OntobaseError {
    OntobaseError::IoError(e.to_string())
}

fn encode_record(record: &Record) -> Result<Vec<u8>, OntobaseError> {
    serde_json::to_vec(record).map_err(|e| OntobaseError::SerializationError(e.to_string()))
}

fn decode_record(bytes: &[u8]) -> Result<Record, OntobaseError> {
    serde_json::from_slice(bytes).map_err(|e| OntobaseError::SerializationError(e.to_string()))
}

fn encode_meta(meta: &CollectionMeta) -> Result<Vec<u8>, OntobaseError> {
    postcard::to_allocvec(meta).map_err(|e| OntobaseError::SerializationError(e.to_string()))
}

fn decode_meta(bytes: &[u8]) -> Result<CollectionMeta, OntobaseError> {
    postcard::from_bytes(bytes).map_err(|e| OntobaseError::SerializationError(e.to_string()))
}

/// Database and collection names become file and table names.
fn validate_name(kind: &str, name: &str) -> Result<(), OntobaseError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':'));
    if !valid {
        return Err(OntobaseError::invalid_value(
            kind,
            format!("'{}' is not a valid name", name),
        ));
    }
    Ok(())
}

/// A disk-backed store using one redb file per database.
pub struct RedbStore {
    directory: PathBuf,
    /// Database files opened so far.
    databases: RefCell<BTreeMap<String, Rc<Database>>>,
    stats: Cell<DriverStats>,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore")
            .field("directory", &self.directory)
            .field("open_databases", &self.databases.borrow().len())
            .finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Open a store rooted at `directory`, creating the directory if needed.
    pub fn open(directory: impl AsRef<Path>) -> Result<Self, OntobaseError> {
        let directory = directory.as_ref().to_path_buf();
        std::fs::create_dir_all(&directory).map_err(io_err)?;
        Ok(Self {
            directory,
            databases: RefCell::new(BTreeMap::new()),
            stats: Cell::new(DriverStats::default()),
        })
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn file_path(&self, database: &str) -> PathBuf {
        self.directory
            .join(format!("{}.{}", database, FILE_EXTENSION))
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

    /// Open the file of `database`. Missing files are created only if `create`.
    fn database(&self, database: &str, create: bool) -> Result<Option<Rc<Database>>, OntobaseError> {
        validate_name("database", database)?;
        if let Some(db) = self.databases.borrow().get(database) {
            return Ok(Some(Rc::clone(db)));
        }

        let path = self.file_path(database);
        if !create && !path.exists() {
            return Ok(None);
        }

        let db = Database::create(&path).map_err(io_err)?;
        // Initialize the collections table if it doesn't exist
        {
            let write_txn = db.begin_write().map_err(io_err)?;
            let _ = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
            write_txn.commit().map_err(io_err)?;
        }

        let db = Rc::new(db);
        self.databases
            .borrow_mut()
            .insert(database.to_string(), Rc::clone(&db));
        Ok(Some(db))
    }

    /// Open the database of `path`, failing if it does not exist.
    fn existing(&self, path: &CollectionPath) -> Result<Rc<Database>, OntobaseError> {
        self.database(&path.database, false)?
            .ok_or_else(|| OntobaseError::ResourceNotFound(path.to_string()))
    }

    /// Run `f` inside one write transaction against an existing collection.
    ///
    /// The transaction commits only if `f` succeeds.
    fn write<T>(
        &self,
        path: &CollectionPath,
        f: impl FnOnce(&WriteTransaction, &mut CollectionMeta) -> Result<T, OntobaseError>,
    ) -> Result<T, OntobaseError> {
        self.record_write();
        let db = self.existing(path)?;
        let write_txn = db.begin_write().map_err(io_err)?;
        let result = {
            let mut meta = {
                let collections = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
                let bytes = collections
                    .get(path.collection.as_str())
                    .map_err(io_err)?
                    .map(|guard| guard.value().to_vec())
                    .ok_or_else(|| OntobaseError::ResourceNotFound(path.to_string()))?;
                decode_meta(&bytes)?
            };
            let before = meta;
            let result = f(&write_txn, &mut meta)?;
            if meta != before {
                let mut collections = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
                collections
                    .insert(path.collection.as_str(), encode_meta(&meta)?.as_slice())
                    .map_err(io_err)?;
            }
            result
        };
        write_txn.commit().map_err(io_err)?;
        Ok(result)
    }

    /// Read every `(key, record)` of a table inside a write transaction.
    fn load_records(
        write_txn: &WriteTransaction,
        table_name: &str,
    ) -> Result<Vec<(String, Record)>, OntobaseError> {
        let table = write_txn
            .open_table(records_table(table_name))
            .map_err(io_err)?;
        let mut records = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, value) = entry.map_err(io_err)?;
            records.push((key.value().to_string(), decode_record(value.value())?));
        }
        Ok(records)
    }
}

fn records_table_name(collection: &str) -> String {
    format!("{}{}", RECORDS_PREFIX, collection)
}

fn records_table(name: &str) -> TableDefinition<'_, &'static str, &'static [u8]> {
    TableDefinition::new(name)
}

// =============================================================================
// DRIVER TRAIT IMPLEMENTATION
// =============================================================================

impl Driver for RedbStore {
    fn list_databases(&self) -> Result<Vec<String>, OntobaseError> {
        self.record_read();
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.directory).map_err(io_err)? {
            let path = entry.map_err(io_err)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(FILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn drop_database(&self, database: &str) -> Result<bool, OntobaseError> {
        validate_name("database", database)?;
        self.record_write();
        // Release our handle before removing the file
        self.databases.borrow_mut().remove(database);
        let path = self.file_path(database);
        if !path.exists() {
            return Ok(false);
        }
        std::fs::remove_file(&path).map_err(io_err)?;
        Ok(true)
    }

    fn list_collections(&self, database: &str) -> Result<Vec<String>, OntobaseError> {
        self.record_read();
        let Some(db) = self.database(database, false)? else {
            return Ok(Vec::new());
        };
        let read_txn = db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(COLLECTIONS).map_err(io_err)?;
        let mut names = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (key, _) = entry.map_err(io_err)?;
            names.push(key.value().to_string());
        }
        Ok(names)
    }

    fn collection_meta(
        &self,
        path: &CollectionPath,
    ) -> Result<Option<CollectionMeta>, OntobaseError> {
        self.record_read();
        let Some(db) = self.database(&path.database, false)? else {
            return Ok(None);
        };
        let read_txn = db.begin_read().map_err(io_err)?;
        let table = read_txn.open_table(COLLECTIONS).map_err(io_err)?;
        match table.get(path.collection.as_str()).map_err(io_err)? {
            Some(bytes) => Ok(Some(decode_meta(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn create_collection(
        &self,
        path: &CollectionPath,
        kind: CollectionKind,
    ) -> Result<CollectionMeta, OntobaseError> {
        validate_name("collection", &path.collection)?;
        let db = self
            .database(&path.database, true)?
            .ok_or_else(|| OntobaseError::ResourceNotFound(path.database.clone()))?;

        let write_txn = db.begin_write().map_err(io_err)?;
        let meta = {
            let mut collections = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
            let existing = collections
                .get(path.collection.as_str())
                .map_err(io_err)?
                .map(|guard| guard.value().to_vec());
            match existing {
                Some(bytes) => decode_meta(&bytes)?,
                None => {
                    self.record_write();
                    let meta = CollectionMeta { kind, next_key: 0 };
                    collections
                        .insert(path.collection.as_str(), encode_meta(&meta)?.as_slice())
                        .map_err(io_err)?;
                    let table_name = records_table_name(&path.collection);
                    let _ = write_txn
                        .open_table(records_table(&table_name))
                        .map_err(io_err)?;
                    meta
                }
            }
        };
        write_txn.commit().map_err(io_err)?;
        Ok(meta)
    }

    fn drop_collection(&self, path: &CollectionPath) -> Result<bool, OntobaseError> {
        self.record_write();
        let Some(db) = self.database(&path.database, false)? else {
            return Ok(false);
        };
        let write_txn = db.begin_write().map_err(io_err)?;
        let existed = {
            let mut collections = write_txn.open_table(COLLECTIONS).map_err(io_err)?;
            collections
                .remove(path.collection.as_str())
                .map_err(io_err)?
                .is_some()
        };
        if existed {
            let table_name = records_table_name(&path.collection);
            write_txn
                .delete_table(records_table(&table_name))
                .map_err(io_err)?;
        }
        write_txn.commit().map_err(io_err)?;
        Ok(existed)
    }

    fn insert(
        &self,
        path: &CollectionPath,
        records: Vec<Record>,
    ) -> Result<Vec<String>, OntobaseError> {
        let table_name = records_table_name(&path.collection);
        self.write(path, |write_txn, meta| {
            let mut table = write_txn
                .open_table(records_table(&table_name))
                .map_err(io_err)?;
            let mut keys = Vec::with_capacity(records.len());
            for record in records {
                let (key, record) = prepare_record(path, meta, record, |k| {
                    Ok(table.get(k).map_err(io_err)?.is_some())
                })?;
                let collides = table.get(key.as_str()).map_err(io_err)?.is_some();
                if collides {
                    // Dropping the uncommitted transaction rolls the batch back
                    return Err(OntobaseError::DuplicateKey {
                        collection: path.collection.clone(),
                        key,
                    });
                }
                table
                    .insert(key.as_str(), encode_record(&record)?.as_slice())
                    .map_err(io_err)?;
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
        let table_name = records_table_name(&path.collection);
        self.write(path, |write_txn, _| {
            let matching: Vec<(String, Record)> = Self::load_records(write_txn, &table_name)?
                .into_iter()
                .filter(|(_, record)| matches(record, filter))
                .take(if all { usize::MAX } else { 1 })
                .collect();

            let mut table = write_txn
                .open_table(records_table(&table_name))
                .map_err(io_err)?;
            for (key, mut record) in matching.iter().cloned() {
                apply_modification(&mut record, modification);
                table
                    .insert(key.as_str(), encode_record(&record)?.as_slice())
                    .map_err(io_err)?;
            }
            Ok(matching.len())
        })
    }

    fn replace(
        &self,
        path: &CollectionPath,
        record: Record,
        filter: &Record,
    ) -> Result<usize, OntobaseError> {
        let table_name = records_table_name(&path.collection);
        self.write(path, |write_txn, _| {
            let first = Self::load_records(write_txn, &table_name)?
                .into_iter()
                .find(|(_, existing)| matches(existing, filter));
            let Some((key, existing)) = first else {
                return Ok(0);
            };
            let replacement = keep_identity(&existing, record);
            let mut table = write_txn
                .open_table(records_table(&table_name))
                .map_err(io_err)?;
            table
                .insert(key.as_str(), encode_record(&replacement)?.as_slice())
                .map_err(io_err)?;
            Ok(1)
        })
    }

    fn delete(
        &self,
        path: &CollectionPath,
        filter: &Record,
        all: bool,
    ) -> Result<usize, OntobaseError> {
        let table_name = records_table_name(&path.collection);
        self.write(path, |write_txn, _| {
            let doomed: Vec<String> = Self::load_records(write_txn, &table_name)?
                .into_iter()
                .filter(|(_, record)| matches(record, filter))
                .take(if all { usize::MAX } else { 1 })
                .map(|(key, _)| key)
                .collect();

            let mut table = write_txn
                .open_table(records_table(&table_name))
                .map_err(io_err)?;
            let mut deleted = 0;
            for key in &doomed {
                if table.remove(key.as_str()).map_err(io_err)?.is_some() {
                    deleted += 1;
                }
            }
            Ok(deleted)
        })
    }

    fn scan(&self, path: &CollectionPath, filter: &Record) -> Result<Vec<Record>, OntobaseError> {
        self.record_read();
        let db = self.existing(path)?;
        if self.collection_meta(path)?.is_none() {
            return Err(OntobaseError::ResourceNotFound(path.to_string()));
        }
        let table_name = records_table_name(&path.collection);
        let read_txn = db.begin_read().map_err(io_err)?;
        let table = read_txn
            .open_table(records_table(&table_name))
            .map_err(io_err)?;

        let mut records = Vec::new();
        for entry in table.iter().map_err(io_err)? {
            let (_, value) = entry.map_err(io_err)?;
            let record = decode_record(value.value())?;
            if matches(&record, filter) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn count(&self, path: &CollectionPath, filter: &Record) -> Result<usize, OntobaseError> {
        if !filter.is_empty() {
            return Ok(self.scan(path, filter)?.len());
        }
        self.record_read();
        let db = self.existing(path)?;
        if self.collection_meta(path)?.is_none() {
            return Err(OntobaseError::ResourceNotFound(path.to_string()));
        }
        let table_name = records_table_name(&path.collection);
        let read_txn = db.begin_read().map_err(io_err)?;
        let table = read_txn
            .open_table(records_table(&table_name))
            .map_err(io_err)?;
        Ok(table.len().map_err(io_err)? as usize)
    }

    fn fetch_add(
        &self,
        path: &CollectionPath,
        key: &str,
        offset: &str,
        by: i64,
    ) -> Result<i64, OntobaseError> {
        let table_name = records_table_name(&path.collection);
        self.write(path, |write_txn, _| {
            let mut table = write_txn
                .open_table(records_table(&table_name))
                .map_err(io_err)?;
            let bytes = table
                .get(key)
                .map_err(io_err)?
                .map(|guard| guard.value().to_vec())
                .ok_or_else(|| OntobaseError::ResourceNotFound(format!("{}/{}", path, key)))?;
            let mut record = decode_record(&bytes)?;
            let current = counter_value(&record, offset)?;
            record.insert(offset.to_string(), Value::from(current.saturating_add(by)));
            table
                .insert(key, encode_record(&record)?.as_slice())
                .map_err(io_err)?;
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
