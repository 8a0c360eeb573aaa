//! # Collection Module
//!
//! The persistence gateway over one backend collection.
//!
//! Options are normalized here before the driver sees them:
//!
//! | Operation  | `apply_to_all` default | Other options          |
//! |------------|------------------------|------------------------|
//! | insert     | `false`                |                        |
//! | update     | `true`                 |                        |
//! | replace    | first match only       |                        |
//! | delete     | `true`                 |                        |
//! | find       |                        | `start` = 0, `limit`   |
//!
//! Collections never connect on their own: a disconnected server makes every
//! operation fail with `NotConnected`.

use crate::cursor::Cursor;
use crate::primitives::offsets;
use crate::query::{Pipeline, Query};
use crate::server::Server;
use crate::storage::{CollectionPath, Connection, Driver};
use crate::{CollectionKind, OntobaseError, Record, Value};

/// Operation options. Unset fields take the operation's default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    /// Apply to every matching document (or accept a list on insert).
    pub apply_to_all: Option<bool>,
    /// Number of matches to skip.
    pub start: Option<usize>,
    /// Maximum number of matches to return.
    pub limit: Option<usize>,
    /// Kind given to a newly created collection.
    pub kind: Option<CollectionKind>,
}

impl Options {
    /// Options with `apply_to_all` set.
    #[must_use]
    pub fn apply_to_all(all: bool) -> Self {
        Self {
            apply_to_all: Some(all),
            ..Self::default()
        }
    }

    /// Options selecting a window of results.
    #[must_use]
    pub fn window(start: usize, limit: Option<usize>) -> Self {
        Self {
            start: Some(start),
            limit,
            ..Self::default()
        }
    }
}

/// What to insert: one document or a list.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    One(Record),
    Many(Vec<Record>),
}

impl From<Record> for Payload {
    fn from(record: Record) -> Self {
        Self::One(record)
    }
}

impl From<Vec<Record>> for Payload {
    fn from(records: Vec<Record>) -> Self {
        Self::Many(records)
    }
}

/// Keys produced by an insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inserted {
    One(String),
    Many(Vec<String>),
}

impl Inserted {
    /// The inserted keys in input order.
    #[must_use]
    pub fn into_keys(self) -> Vec<String> {
        match self {
            Self::One(key) => vec![key],
            Self::Many(keys) => keys,
        }
    }
}

/// A handle to one collection of a database.
#[derive(Debug, Clone)]
pub struct Collection {
    server: Server,
    path: CollectionPath,
    kind: CollectionKind,
}

impl Collection {
    pub(crate) fn new(server: Server, path: CollectionPath, kind: CollectionKind) -> Self {
        Self { server, path, kind }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.path.collection
    }

    #[must_use]
    pub fn database_name(&self) -> &str {
        &self.path.database
    }

    #[must_use]
    pub fn path(&self) -> &CollectionPath {
        &self.path
    }

    #[must_use]
    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    /// The database-unique identifier of `key` in this collection.
    #[must_use]
    pub fn id_of(&self, key: &str) -> String {
        crate::Identity::new(self.name(), key).id
    }

    fn connection(&self) -> Result<Connection, OntobaseError> {
        self.server.connection()
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Insert one document or a list of documents.
    ///
    /// With `apply_to_all` false (the default) exactly one document is
    /// accepted and its key returned; with `true` the keys of all documents
    /// are returned in input order.
    pub fn insert(
        &self,
        payload: impl Into<Payload>,
        options: &Options,
    ) -> Result<Inserted, OntobaseError> {
        let all = options.apply_to_all.unwrap_or(false);
        let records = match payload.into() {
            Payload::One(record) => vec![record],
            Payload::Many(records) if all || records.len() == 1 => records,
            Payload::Many(records) => {
                return Err(OntobaseError::InvalidOption(format!(
                    "insert of {} documents requires apply_to_all",
                    records.len()
                )));
            }
        };

        let mut keys = self.connection()?.driver().insert(&self.path, records)?;
        if all {
            Ok(Inserted::Many(keys))
        } else {
            keys.pop()
                .map(Inserted::One)
                .ok_or_else(|| OntobaseError::InvalidOption("nothing to insert".to_string()))
        }
    }

    /// Insert one document and return its key.
    pub fn insert_one(&self, record: Record) -> Result<String, OntobaseError> {
        match self.insert(record, &Options::default())? {
            Inserted::One(key) => Ok(key),
            Inserted::Many(mut keys) => keys
                .pop()
                .ok_or_else(|| OntobaseError::InvalidOption("nothing inserted".to_string())),
        }
    }

    /// Insert a list of documents and return their keys in order.
    pub fn insert_many(&self, records: Vec<Record>) -> Result<Vec<String>, OntobaseError> {
        Ok(self
            .insert(records, &Options::apply_to_all(true))?
            .into_keys())
    }

    /// Merge `modification` into documents matching `filter`.
    ///
    /// Null values in `modification` unset the field. Updates every match
    /// unless `apply_to_all` is false. Returns the number modified.
    pub fn update(
        &self,
        modification: &Record,
        filter: &Record,
        options: &Options,
    ) -> Result<usize, OntobaseError> {
        let all = options.apply_to_all.unwrap_or(true);
        self.connection()?
            .driver()
            .update(&self.path, modification, filter, all)
    }

    /// Replace the first document matching `filter`. Returns 0 or 1.
    pub fn replace(&self, record: Record, filter: &Record) -> Result<usize, OntobaseError> {
        self.connection()?
            .driver()
            .replace(&self.path, record, filter)
    }

    /// Delete documents matching `filter`. Returns the number deleted.
    pub fn delete(&self, filter: &Record, options: &Options) -> Result<usize, OntobaseError> {
        let all = options.apply_to_all.unwrap_or(true);
        self.connection()?.driver().delete(&self.path, filter, all)
    }

    /// Drop this collection from its database.
    pub fn drop(&self) -> Result<bool, OntobaseError> {
        self.connection()?.driver().drop_collection(&self.path)
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// Documents matching `example`, from `start` (default 0) up to `limit`.
    ///
    /// The cursor runs when iterated, and again on every iteration.
    #[must_use]
    pub fn find_by_example(&self, example: Record, options: &Options) -> Cursor {
        Cursor::by_example(
            self.clone(),
            example,
            options.start.unwrap_or(0),
            options.limit,
        )
    }

    /// Run a native query.
    #[must_use]
    pub fn query(&self, query: Query) -> Cursor {
        Cursor::by_query(self.clone(), query)
    }

    /// Run an aggregation pipeline.
    #[must_use]
    pub fn aggregate(&self, pipeline: Pipeline) -> Cursor {
        Cursor::by_pipeline(self.clone(), pipeline)
    }

    /// The document with key `key`, if any.
    pub fn find_by_key(&self, key: &str) -> Result<Option<Record>, OntobaseError> {
        let mut filter = Record::new();
        filter.insert(offsets::KEY.to_string(), Value::from(key));
        Ok(self
            .connection()?
            .driver()
            .find(&self.path, &filter, 0, Some(1))?
            .pop())
    }

    /// Number of documents matching `filter`.
    pub fn count(&self, filter: &Record) -> Result<usize, OntobaseError> {
        self.connection()?.driver().count(&self.path, filter)
    }

    /// Distinct values of `field` among documents matching `filter`.
    pub fn distinct(&self, field: &str, filter: &Record) -> Result<Vec<Value>, OntobaseError> {
        self.connection()?
            .driver()
            .distinct(&self.path, field, filter)
    }

    /// Atomically add `by` to a counter and return its previous value.
    pub fn fetch_add(&self, key: &str, offset: &str, by: i64) -> Result<i64, OntobaseError> {
        self.connection()?
            .driver()
            .fetch_add(&self.path, key, offset, by)
    }

    pub(crate) fn run_find(
        &self,
        filter: &Record,
        start: usize,
        limit: Option<usize>,
    ) -> Result<Vec<Record>, OntobaseError> {
        self.connection()?
            .driver()
            .find(&self.path, filter, start, limit)
    }

    pub(crate) fn run_query(&self, query: &Query) -> Result<Vec<Record>, OntobaseError> {
        self.connection()?.driver().query(&self.path, query)
    }

    pub(crate) fn run_pipeline(&self, pipeline: &Pipeline) -> Result<Vec<Record>, OntobaseError> {
        self.connection()?.driver().aggregate(&self.path, pipeline)
    }
}

// =============================================================================
// TESTS
// =============================================================================
