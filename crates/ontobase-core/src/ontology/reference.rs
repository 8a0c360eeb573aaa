//! # References
//!
//! A typed pointer to a document by collection and key, resolved explicitly
//! against a database.

use crate::collection::Collection;
use crate::database::Database;
use crate::document::Document;
use crate::{DocumentHandle, OntobaseError, Record};
use std::fmt;
use std::marker::PhantomData;

/// Variants that can be rebuilt from a stored record.
pub trait Resolvable: Sized {
    fn from_stored(collection: &Collection, record: Record) -> Self;
}

impl Resolvable for Document {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Document::from_record(collection, record)
    }
}

/// A reference to a `T` stored under `key` in `collection`.
pub struct Reference<T> {
    collection: String,
    key: String,
    marker: PhantomData<fn() -> T>,
}

impl<T> Reference<T> {
    #[must_use]
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            marker: PhantomData,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &str {
        &self.collection
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    #[must_use]
    pub fn handle(&self) -> DocumentHandle {
        DocumentHandle::new(self.collection.clone(), self.key.clone())
    }
}

impl<T: Resolvable> Reference<T> {
    /// Read the referenced document. `None` if it or its collection is absent.
    pub fn resolve(&self, database: &Database) -> Result<Option<T>, OntobaseError> {
        let Some(collection) = database.get_collection(&self.collection)? else {
            return Ok(None);
        };
        Ok(collection
            .find_by_key(&self.key)?
            .map(|record| T::from_stored(&collection, record)))
    }
}

impl<T> From<DocumentHandle> for Reference<T> {
    fn from(handle: DocumentHandle) -> Self {
        Self::new(handle.collection, handle.key)
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self::new(self.collection.clone(), self.key.clone())
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.collection == other.collection && self.key == other.key
    }
}

impl<T> Eq for Reference<T> {}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("collection", &self.collection)
            .field("key", &self.key)
            .finish()
    }
}

impl<T> fmt::Display for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.handle().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Options, Server};
    use serde_json::json;

    #[test]
    fn resolve_finds_document_or_none() {
        let db = Server::new("memory://reference-resolve")
            .expect("server")
            .database("db");
        let things = db
            .new_collection("things", &Options::default())
            .expect("collection");
        let key = things
            .insert_one(json!({"n": 1}).as_object().cloned().expect("object"))
            .expect("insert");

        let found: Reference<Document> = Reference::new("things", key);
        let doc = found.resolve(&db).expect("resolve").expect("exists");
        assert_eq!(doc.value("n"), json!(1));

        let missing: Reference<Document> = Reference::new("things", "nope");
        assert!(missing.resolve(&db).expect("resolve").is_none());

        let elsewhere: Reference<Document> = Reference::new("absent", "1");
        assert!(elsewhere.resolve(&db).expect("resolve").is_none());
    }

    #[test]
    fn display_renders_identifier() {
        let reference: Reference<Document> = Reference::new("things", "42");
        assert_eq!(reference.to_string(), "things/42");
    }
}
