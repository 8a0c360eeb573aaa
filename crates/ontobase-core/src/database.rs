//! # Database Module
//!
//! A named database on a [`Server`], with a cached working set of
//! [`Collection`] handles. Every operation connects on demand.

use crate::collection::{Collection, Options};
use crate::server::Server;
use crate::storage::{CollectionMeta, CollectionPath, Driver};
use crate::OntobaseError;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// A database handle. Clones share the collection cache.
#[derive(Debug, Clone)]
pub struct Database {
    server: Server,
    name: String,
    collections: Rc<RefCell<BTreeMap<String, Collection>>>,
}

impl Database {
    pub(crate) fn new(server: Server, name: &str) -> Self {
        Self {
            server,
            name: name.to_string(),
            collections: Rc::new(RefCell::new(BTreeMap::new())),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn server(&self) -> &Server {
        &self.server
    }

    fn path(&self, collection: &str) -> CollectionPath {
        CollectionPath::new(self.name.clone(), collection)
    }

    fn forget(&self, name: &str) {
        self.collections.borrow_mut().remove(name);
    }

    /// The working-set handle for `path` if it still matches stored `meta`,
    /// else a fresh handle that replaces it.
    fn handle(&self, path: CollectionPath, meta: &CollectionMeta) -> Collection {
        let cached = self.collections.borrow().get(&path.collection).cloned();
        match cached {
            Some(collection) if collection.kind() == meta.kind => collection,
            _ => self.remember(Collection::new(self.server.clone(), path, meta.kind)),
        }
    }

    fn remember(&self, collection: Collection) -> Collection {
        self.collections
            .borrow_mut()
            .insert(collection.name().to_string(), collection.clone());
        collection
    }

    /// Return the collection `name`, creating it if absent.
    ///
    /// New collections get `options.kind`, or the document kind by default.
    /// An existing collection keeps its kind. Storage is consulted on every
    /// call, so a collection dropped through another handle is re-created
    /// rather than served stale from the working set.
    pub fn new_collection(&self, name: &str, options: &Options) -> Result<Collection, OntobaseError> {
        let connection = self.server.ensure_connection()?;
        let path = self.path(name);
        let meta = match connection.driver().collection_meta(&path)? {
            Some(meta) => meta,
            None => {
                self.forget(name);
                let kind = options.kind.unwrap_or_default();
                tracing::debug!(collection = %path, %kind, "creating collection");
                connection.driver().create_collection(&path, kind)?
            }
        };
        Ok(self.handle(path, &meta))
    }

    /// Return the collection `name` without creating it.
    ///
    /// A cached handle whose collection is gone is evicted.
    pub fn get_collection(&self, name: &str) -> Result<Option<Collection>, OntobaseError> {
        let connection = self.server.ensure_connection()?;
        let path = self.path(name);
        match connection.driver().collection_meta(&path)? {
            Some(meta) => Ok(Some(self.handle(path, &meta))),
            None => {
                self.forget(name);
                Ok(None)
            }
        }
    }

    /// Drop the collection `name` and evict it from the cache.
    ///
    /// Returns `Some(true)` if it was dropped, `None` if it did not exist.
    pub fn del_collection(&self, name: &str) -> Result<Option<bool>, OntobaseError> {
        let connection = self.server.ensure_connection()?;
        self.forget(name);
        if connection.driver().drop_collection(&self.path(name))? {
            Ok(Some(true))
        } else {
            Ok(None)
        }
    }

    /// Names of the collections in this database.
    pub fn list_collections(&self) -> Result<Vec<String>, OntobaseError> {
        self.server
            .ensure_connection()?
            .driver()
            .list_collections(&self.name)
    }

    /// Drop the whole database and clear the collection cache.
    pub fn drop_database(&self) -> Result<bool, OntobaseError> {
        self.collections.borrow_mut().clear();
        self.server.drop_database(&self.name)
    }

    /// Names of the collections currently held in the working set.
    #[must_use]
    pub fn working_set(&self) -> Vec<String> {
        self.collections.borrow().keys().cloned().collect()
    }

    /// Empty the working set without touching storage.
    pub fn clear_working_set(&self) {
        self.collections.borrow_mut().clear();
    }
}

// =============================================================================
// TESTS
// =============================================================================
