//! # ontobase-core
//!
//! A backend-agnostic document persistence framework with an ontology on
//! top - THE LIBRARY.
//!
//! ## Layers
//!
//! - `container`: property containers with delete-on-null semantics
//! - `datasource`: connection strings and their coordinates
//! - `server` / `database` / `collection`: the connection lifecycle and the
//!   persistence gateway, over a pluggable `storage` driver
//! - `document`: identity, locked/required offsets and buffered writes
//! - `ontology`: terms, descriptors, the graph model and the bootstrapping
//!   `Wrapper`
//!
//! ## Constraints
//!
//! - Synchronous and single-threaded: handles are `Rc`-based and `!Send`
//! - "Not found" is `None`; only invariant violations are errors
//! - No network dependencies: drivers ship for `memory://` and `redb://`

// =============================================================================
// MODULES
// =============================================================================

pub mod cache;
pub mod collection;
pub mod container;
pub mod cursor;
pub mod database;
pub mod datasource;
pub mod document;
pub mod formats;
pub mod ontology;
pub mod primitives;
pub mod query;
pub mod server;
pub mod storage;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{CollectionKind, DocumentHandle, Identity, Map, OntobaseError, Record, Value};

// =============================================================================
// RE-EXPORTS: Persistence
// =============================================================================

pub use cache::{CacheService, MemoryCache};
pub use collection::{Collection, Inserted, Options, Payload};
pub use container::PropertyContainer;
pub use cursor::Cursor;
pub use database::Database;
pub use datasource::{DataSource, UrlPart};
pub use document::{
    AsDocument, Document, DocumentSet, Identifiable, Layout, NativeSerializable, Validatable,
};
pub use query::{Order, Pipeline, Query, Sort, Stage};
pub use server::{ConnectFlag, Server};
pub use storage::{Connection, Driver, DriverStats, MemoryStore, RedbStore};

// =============================================================================
// RE-EXPORTS: Ontology
// =============================================================================

pub use ontology::{
    DataKind, DataType, Descriptor, Edge, Node, NodeKind, Predicate, Reference, Relation,
    Resolvable, Term, Wrapper, WrapperState,
};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, ServerImage, image_from_bytes, image_to_bytes};
