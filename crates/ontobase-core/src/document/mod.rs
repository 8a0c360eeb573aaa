//! # Document Module
//!
//! A [`PropertyContainer`] bound to a collection, with identity and a
//! persistence state machine.
//!
//! ```text
//! new --store--> persistent --set--> persistent+modified --store--> persistent
//! ```
//!
//! Each document variant declares a [`Layout`]:
//! - **locked** offsets cannot change once the document has been stored
//! - **required** offsets must be present when it is stored
//!
//! `_key` and `_id` are always locked. Variants compose the capability traits
//! ([`Identifiable`], [`Validatable`], [`NativeSerializable`]) by exposing
//! their inner document through [`AsDocument`].

pub mod set;

pub use set::DocumentSet;

use crate::collection::Collection;
use crate::container::PropertyContainer;
use crate::primitives::offsets;
use crate::storage::IDENTITY_OFFSETS;
use crate::{DocumentHandle, Identity, OntobaseError, Record, Value};

// =============================================================================
// LAYOUT AND CAPABILITIES
// =============================================================================

/// Offsets a document variant locks and requires.
#[derive(Debug, PartialEq, Eq)]
pub struct Layout {
    pub locked: &'static [&'static str],
    pub required: &'static [&'static str],
}

/// Layout of a plain document: only identity is locked.
pub static DOCUMENT_LAYOUT: Layout = Layout {
    locked: &[],
    required: &[],
};

/// Access to the document inside a variant.
pub trait AsDocument {
    fn document(&self) -> &Document;
    fn document_mut(&mut self) -> &mut Document;
}

/// Things with a collection key and a database identifier.
pub trait Identifiable {
    fn key(&self) -> Option<&str>;
    fn id(&self) -> Option<&str>;
}

/// Things that check locked and required offsets.
pub trait Validatable {
    fn locked_offsets(&self) -> &'static [&'static str];
    fn required_offsets(&self) -> &'static [&'static str];
    /// Fail with `MissingRequiredOffset` for the first absent required offset.
    fn validate(&self) -> Result<(), OntobaseError>;
}

/// Things that render to a backend-native record.
pub trait NativeSerializable {
    fn record(&self) -> Record;
}

impl<T: AsDocument> Identifiable for T {
    fn key(&self) -> Option<&str> {
        self.document().properties.get_str(offsets::KEY)
    }

    fn id(&self) -> Option<&str> {
        self.document().properties.get_str(offsets::ID)
    }
}

impl<T: AsDocument> Validatable for T {
    fn locked_offsets(&self) -> &'static [&'static str] {
        self.document().layout.locked
    }

    fn required_offsets(&self) -> &'static [&'static str] {
        self.document().layout.required
    }

    fn validate(&self) -> Result<(), OntobaseError> {
        let document = self.document();
        match document
            .layout
            .required
            .iter()
            .find(|offset| !document.properties.contains(offset))
        {
            Some(offset) => Err(OntobaseError::MissingRequiredOffset((*offset).to_string())),
            None => Ok(()),
        }
    }
}

impl<T: AsDocument> NativeSerializable for T {
    fn record(&self) -> Record {
        self.document().properties.flatten()
    }
}

// =============================================================================
// DOCUMENT
// =============================================================================

/// A persisted (or to-be-persisted) record of one collection.
#[derive(Debug, Clone)]
pub struct Document {
    collection: Collection,
    properties: PropertyContainer,
    layout: &'static Layout,
    persistent: bool,
    modified: bool,
}

impl AsDocument for Document {
    fn document(&self) -> &Document {
        self
    }

    fn document_mut(&mut self) -> &mut Document {
        self
    }
}

impl Document {
    /// Create an empty, unstored document.
    #[must_use]
    pub fn new(collection: &Collection) -> Self {
        Self::with_layout(collection, &DOCUMENT_LAYOUT)
    }

    /// Create an empty, unstored document with a custom layout.
    #[must_use]
    pub fn with_layout(collection: &Collection, layout: &'static Layout) -> Self {
        Self {
            collection: collection.clone(),
            properties: PropertyContainer::new(),
            layout,
            persistent: false,
            modified: false,
        }
    }

    /// Wrap a record read from `collection`.
    ///
    /// Records carrying a key are treated as persistent and unmodified.
    #[must_use]
    pub fn from_record(collection: &Collection, record: Record) -> Self {
        Self::from_record_with_layout(collection, record, &DOCUMENT_LAYOUT)
    }

    pub(crate) fn from_record_with_layout(
        collection: &Collection,
        record: Record,
        layout: &'static Layout,
    ) -> Self {
        let properties = PropertyContainer::from_record(record);
        let persistent = properties.get_str(offsets::KEY).is_some();
        Self {
            collection: collection.clone(),
            properties,
            layout,
            persistent,
            modified: false,
        }
    }

    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    #[must_use]
    pub fn properties(&self) -> &PropertyContainer {
        &self.properties
    }

    #[must_use]
    pub fn layout(&self) -> &'static Layout {
        self.layout
    }

    /// Whether the document has been stored (or was read from storage).
    #[must_use]
    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// Whether the document changed since it was last stored.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// The identity of a keyed document.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.properties
            .get_str(offsets::KEY)
            .map(|key| Identity::new(self.collection.name(), key))
    }

    /// The handle of a keyed document.
    #[must_use]
    pub fn handle(&self) -> Option<DocumentHandle> {
        self.identity().map(|identity| DocumentHandle::from(&identity))
    }

    fn is_locked(&self, offset: &str) -> bool {
        IDENTITY_OFFSETS.contains(&offset) || self.layout.locked.contains(&offset)
    }

    /// Fail if changing `offset` to `value` would alter a locked offset.
    fn guard(&self, offset: &str, value: &Value) -> Result<(), OntobaseError> {
        if self.persistent && self.is_locked(offset) && self.properties.value(offset) != *value {
            return Err(OntobaseError::LockedOffset(offset.to_string()));
        }
        Ok(())
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    #[must_use]
    pub fn get(&self, offset: &str) -> Option<&Value> {
        self.properties.get(offset)
    }

    /// The value at `offset`, `Value::Null` when absent.
    #[must_use]
    pub fn value(&self, offset: &str) -> Value {
        self.properties.value(offset)
    }

    #[must_use]
    pub fn get_str(&self, offset: &str) -> Option<&str> {
        self.properties.get_str(offset)
    }

    /// Assign `value` to `offset`; null deletes.
    ///
    /// Fails with `LockedOffset` when a locked offset of a stored document
    /// would change. Re-assigning the current value is always allowed.
    pub fn set(&mut self, offset: &str, value: impl Into<Value>) -> Result<(), OntobaseError> {
        let value = value.into();
        match offset {
            offsets::KEY => match value {
                Value::Null => self.delete_key(),
                Value::String(key) => self.set_key(&key),
                other => Err(OntobaseError::invalid_value(
                    offsets::KEY,
                    format!("expected string, got {}", other),
                )),
            },
            offsets::ID => match value {
                Value::Null => self.delete_key(),
                Value::String(id) => self.set_id(&id),
                other => Err(OntobaseError::invalid_value(
                    offsets::ID,
                    format!("expected string, got {}", other),
                )),
            },
            _ => {
                self.guard(offset, &value)?;
                if self.properties.value(offset) != value {
                    self.properties.set(offset, value);
                    self.modified = true;
                }
                Ok(())
            }
        }
    }

    /// Remove `offset`, returning its value.
    pub fn delete(&mut self, offset: &str) -> Result<Option<Value>, OntobaseError> {
        if !self.properties.contains(offset) {
            return Ok(None);
        }
        if offset == offsets::KEY || offset == offsets::ID {
            let previous = self.properties.get(offset).cloned();
            self.delete_key()?;
            return Ok(previous);
        }
        self.guard(offset, &Value::Null)?;
        self.modified = true;
        Ok(self.properties.delete(offset))
    }

    /// Merge a set of changes with delete-on-null, checking locks first.
    pub fn merge(&mut self, changes: Record) -> Result<(), OntobaseError> {
        for (offset, value) in &changes {
            self.guard(offset, value)?;
        }
        for (offset, value) in changes {
            self.set(&offset, value)?;
        }
        Ok(())
    }

    // =========================================================================
    // IDENTITY
    // =========================================================================

    /// Assign the key; the identifier follows as `collection/key`.
    pub fn set_key(&mut self, key: &str) -> Result<(), OntobaseError> {
        if key.is_empty() {
            return Err(OntobaseError::invalid_value(offsets::KEY, "empty key"));
        }
        self.guard(offsets::KEY, &Value::from(key))?;
        if self.properties.get_str(offsets::KEY) == Some(key) {
            return Ok(());
        }
        self.properties.set(offsets::KEY, key);
        self.properties.set(offsets::ID, self.collection.id_of(key));
        self.modified = true;
        Ok(())
    }

    /// Assign the identifier; its collection part must name this collection.
    pub fn set_id(&mut self, id: &str) -> Result<(), OntobaseError> {
        let handle = DocumentHandle::parse(id)
            .filter(|handle| handle.collection == self.collection.name())
            .ok_or_else(|| {
                OntobaseError::invalid_value(
                    offsets::ID,
                    format!("'{}' is not an identifier in {}", id, self.collection.name()),
                )
            })?;
        self.set_key(&handle.key)
    }

    /// Remove key and identifier from an unstored document.
    pub fn delete_key(&mut self) -> Result<(), OntobaseError> {
        if self.persistent && self.properties.contains(offsets::KEY) {
            return Err(OntobaseError::LockedOffset(offsets::KEY.to_string()));
        }
        self.properties.delete(offsets::KEY);
        self.properties.delete(offsets::ID);
        Ok(())
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    fn key_filter(key: &str) -> Record {
        let mut filter = Record::new();
        filter.insert(offsets::KEY.to_string(), Value::from(key));
        filter
    }

    /// Persist the document and return its identity.
    ///
    /// A stored, unmodified document is not written again.
    pub fn store(&mut self) -> Result<Identity, OntobaseError> {
        if self.persistent && !self.modified {
            if let Some(identity) = self.identity() {
                return Ok(identity);
            }
        }
        self.validate()?;

        let record = self.record();
        let key = match self.properties.get_str(offsets::KEY) {
            Some(key) if self.persistent => {
                let key = key.to_string();
                if self.collection.replace(record, &Self::key_filter(&key))? == 0 {
                    return Err(OntobaseError::ResourceNotFound(self.collection.id_of(&key)));
                }
                key
            }
            _ => self.collection.insert_one(record)?,
        };

        self.properties.set(offsets::KEY, key.as_str());
        self.properties.set(offsets::ID, self.collection.id_of(&key));
        self.persistent = true;
        self.modified = false;
        tracing::trace!(collection = self.collection.name(), key = %key, "stored document");
        Ok(Identity::new(self.collection.name(), key))
    }

    /// Delete the stored document. Returns whether anything was deleted.
    ///
    /// The properties are kept; storing again inserts a new document.
    pub fn remove(&mut self) -> Result<bool, OntobaseError> {
        let Some(key) = self.properties.get_str(offsets::KEY).map(str::to_string) else {
            return Ok(false);
        };
        if !self.persistent {
            return Ok(false);
        }
        let deleted = self
            .collection
            .delete(&Self::key_filter(&key), &crate::Options::apply_to_all(false))?;
        self.persistent = false;
        self.modified = true;
        Ok(deleted > 0)
    }

    /// Re-read the document from its collection.
    ///
    /// Returns `false` (and marks the document unstored) if it no longer exists.
    pub fn reload(&mut self) -> Result<bool, OntobaseError> {
        let Some(key) = self.properties.get_str(offsets::KEY).map(str::to_string) else {
            return Ok(false);
        };
        match self.collection.find_by_key(&key)? {
            Some(record) => {
                self.properties = PropertyContainer::from_record(record);
                self.persistent = true;
                self.modified = false;
                Ok(true)
            }
            None => {
                self.persistent = false;
                self.modified = true;
                Ok(false)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
