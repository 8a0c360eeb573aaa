//! # Core Type Definitions
//!
//! This module contains the types shared by every layer of Ontobase:
//! - Value representation (`Value`, `Record`)
//! - Identity (`Identity`, `DocumentHandle`)
//! - Collection flavour (`CollectionKind`)
//! - Error types (`OntobaseError`)
//!
//! Values are JSON values; a record is the flat, insertion-ordered JSON object
//! that drivers persist.

use crate::primitives::offsets;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use serde_json::{Map, Value};

/// The backend-native representation of a document.
pub type Record = Map<String, Value>;

// =============================================================================
// IDENTITY
// =============================================================================

/// The identity of a persisted document.
///
/// `key` is unique within the collection, `id` is unique within the database.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Identity {
    pub key: String,
    pub id: String,
}

impl Identity {
    /// Build the identity of `key` in `collection`.
    #[must_use]
    pub fn new(collection: &str, key: impl Into<String>) -> Self {
        let key = key.into();
        let id = format!("{}{}{}", collection, offsets::ID_SEPARATOR, key);
        Self { key, id }
    }
}

/// A handle to a document anywhere in a database, rendered `collection/key`.
///
/// Edge vertices are stored as handles.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentHandle {
    pub collection: String,
    pub key: String,
}

impl DocumentHandle {
    /// Create a handle from its parts.
    #[must_use]
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
        }
    }

    /// Parse a `collection/key` identifier.
    ///
    /// Returns `None` when either side of the separator is empty.
    #[must_use]
    pub fn parse(id: &str) -> Option<Self> {
        let (collection, key) = id.split_once(offsets::ID_SEPARATOR)?;
        if collection.is_empty() || key.is_empty() {
            return None;
        }
        Some(Self::new(collection, key))
    }

    /// Render the handle as a database-unique identifier.
    #[must_use]
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DocumentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.collection, offsets::ID_SEPARATOR, self.key)
    }
}

impl From<&Identity> for DocumentHandle {
    fn from(identity: &Identity) -> Self {
        Self::parse(&identity.id).unwrap_or_else(|| Self::new("", identity.key.clone()))
    }
}

// =============================================================================
// COLLECTION KIND
// =============================================================================

/// Whether a collection holds plain documents or edges.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub enum CollectionKind {
    #[default]
    Document,
    Edge,
}

impl fmt::Display for CollectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Edge => f.write_str("edge"),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in Ontobase.
///
/// - Structural and validation errors are raised at the violating call
/// - Driver errors propagate unchanged in meaning
/// - "Not found" is never an error; lookups return `Option`
#[derive(Debug, Error)]
pub enum OntobaseError {
    /// The connection string is empty, unparsable, or lacks protocol or host.
    #[error("Invalid connection string: {0}")]
    InvalidConnectionString(String),

    /// A port is not numeric or does not line up with the host list.
    #[error("Invalid port: {0}")]
    InvalidPort(String),

    /// The backend failed to open a connection.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// An operation asserted a connection that is not open.
    #[error("Not connected")]
    NotConnected,

    /// A connection coordinate was modified while the connection is open.
    #[error("Cannot modify {0} while connected")]
    LockedWhileConnected(&'static str),

    /// A locked offset was modified after the document was persisted.
    #[error("Locked offset: {0}")]
    LockedOffset(String),

    /// A required offset is missing at commit time.
    #[error("Missing required offset: {0}")]
    MissingRequiredOffset(String),

    /// A descriptor still referenced by data was deleted.
    #[error("Descriptor {key} is in use ({count} references)")]
    DescriptorInUse { key: String, count: u64 },

    /// A built-in descriptor was deleted.
    #[error("Built-in descriptor cannot be deleted: {0}")]
    BuiltinDescriptor(String),

    /// A collection or database required by the operation is absent.
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// The shared cache service failed.
    #[error("Cache error: {0}")]
    CacheError(String),

    /// Structured data could not be serialized or deserialized.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A record key collides with an existing record of the collection.
    #[error("Duplicate key {key} in {collection}")]
    DuplicateKey { collection: String, key: String },

    /// Operation options cannot be normalized.
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// A stored value does not have the shape its accessor expects.
    #[error("Invalid value for {offset}: {reason}")]
    InvalidValue { offset: String, reason: String },

    /// The storage engine reported an I/O failure.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl OntobaseError {
    /// Shorthand for an `InvalidValue` error.
    pub fn invalid_value(offset: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            offset: offset.to_string(),
            reason: reason.into(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_renders_collection_and_key() {
        let identity = Identity::new("terms", "abc");
        assert_eq!(identity.key, "abc");
        assert_eq!(identity.id, "terms/abc");
    }

    #[test]
    fn handle_parse_splits_on_first_separator() {
        let handle = DocumentHandle::parse("nodes/a/b").expect("parse");
        assert_eq!(handle.collection, "nodes");
        assert_eq!(handle.key, "a/b");
        assert_eq!(handle.id(), "nodes/a/b");
    }

    #[test]
    fn handle_parse_rejects_missing_parts() {
        assert!(DocumentHandle::parse("nodes").is_none());
        assert!(DocumentHandle::parse("/key").is_none());
        assert!(DocumentHandle::parse("nodes/").is_none());
    }

    #[test]
    fn descriptor_in_use_message() {
        let err = OntobaseError::DescriptorInUse {
            key: "12".to_string(),
            count: 3,
        };
        assert_eq!(err.to_string(), "Descriptor 12 is in use (3 references)");
    }
}
