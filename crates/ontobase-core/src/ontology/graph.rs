//! # Graph Documents
//!
//! Directed-graph variants of [`Document`]:
//! - [`Edge`] (alias [`Relation`]): a source and a destination handle
//! - [`Predicate`]: an edge typed by a term, stored as the term key
//! - [`Node`]: a typed proxy aliasing another document
//!
//! Every identifying offset is required before storing and locked after.

use super::reference::{Reference, Resolvable};
use super::term::Term;
use crate::collection::Collection;
use crate::database::Database;
use crate::document::{AsDocument, Document, Layout};
use crate::primitives::{TERMS_COLLECTION, offsets};
use crate::{DocumentHandle, Identity, OntobaseError, Record, Value};
use std::fmt;
use std::str::FromStr;

pub static EDGE_LAYOUT: Layout = Layout {
    locked: &[offsets::FROM, offsets::TO],
    required: &[offsets::FROM, offsets::TO],
};

pub static PREDICATE_LAYOUT: Layout = Layout {
    locked: &[offsets::FROM, offsets::TO, offsets::PREDICATE],
    required: &[offsets::FROM, offsets::TO, offsets::PREDICATE],
};

pub static NODE_LAYOUT: Layout = Layout {
    locked: &[offsets::ALIAS],
    required: &[offsets::ALIAS],
};

fn handle_at(document: &Document, offset: &str) -> Option<DocumentHandle> {
    document.get_str(offset).and_then(DocumentHandle::parse)
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed relationship between two documents.
#[derive(Debug, Clone)]
pub struct Edge {
    document: Document,
}

/// Edges and relations are the same variant.
pub type Relation = Edge;

impl AsDocument for Edge {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

impl Resolvable for Edge {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Self {
            document: Document::from_record_with_layout(collection, record, &EDGE_LAYOUT),
        }
    }
}

impl Edge {
    /// Create an unstored edge from `source` to `destination`.
    pub fn new(
        collection: &Collection,
        source: &DocumentHandle,
        destination: &DocumentHandle,
    ) -> Result<Self, OntobaseError> {
        let mut edge = Self {
            document: Document::with_layout(collection, &EDGE_LAYOUT),
        };
        edge.set_source(source)?;
        edge.set_destination(destination)?;
        Ok(edge)
    }

    #[must_use]
    pub fn source(&self) -> Option<DocumentHandle> {
        handle_at(&self.document, offsets::FROM)
    }

    #[must_use]
    pub fn destination(&self) -> Option<DocumentHandle> {
        handle_at(&self.document, offsets::TO)
    }

    pub fn set_source(&mut self, source: &DocumentHandle) -> Result<(), OntobaseError> {
        self.document.set(offsets::FROM, source.id())
    }

    pub fn set_destination(&mut self, destination: &DocumentHandle) -> Result<(), OntobaseError> {
        self.document.set(offsets::TO, destination.id())
    }

    pub fn store(&mut self) -> Result<Identity, OntobaseError> {
        self.document.store()
    }
}

// =============================================================================
// PREDICATE
// =============================================================================

/// An edge typed by a predicate term.
#[derive(Debug, Clone)]
pub struct Predicate {
    edge: Edge,
}

impl AsDocument for Predicate {
    fn document(&self) -> &Document {
        &self.edge.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.edge.document
    }
}

impl Resolvable for Predicate {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Self {
            edge: Edge {
                document: Document::from_record_with_layout(
                    collection,
                    record,
                    &PREDICATE_LAYOUT,
                ),
            },
        }
    }
}

impl From<&Term> for Reference<Term> {
    fn from(term: &Term) -> Self {
        term.reference()
    }
}

impl From<&str> for Reference<Term> {
    fn from(key: &str) -> Self {
        Reference::new(TERMS_COLLECTION, key)
    }
}

impl Predicate {
    /// Create an unstored predicate edge.
    ///
    /// `predicate` is a term or a term key; `extra` properties are merged in.
    pub fn new_predicate(
        collection: &Collection,
        predicate: impl Into<Reference<Term>>,
        source: &DocumentHandle,
        destination: &DocumentHandle,
        extra: Record,
    ) -> Result<Self, OntobaseError> {
        let mut predicate_edge = Self {
            edge: Edge {
                document: Document::with_layout(collection, &PREDICATE_LAYOUT),
            },
        };
        predicate_edge.edge.set_source(source)?;
        predicate_edge.edge.set_destination(destination)?;
        predicate_edge.set_predicate(predicate)?;
        predicate_edge.edge.document.merge(extra)?;
        Ok(predicate_edge)
    }

    /// The edge half of the predicate.
    #[must_use]
    pub fn edge(&self) -> &Edge {
        &self.edge
    }

    #[must_use]
    pub fn source(&self) -> Option<DocumentHandle> {
        self.edge.source()
    }

    #[must_use]
    pub fn destination(&self) -> Option<DocumentHandle> {
        self.edge.destination()
    }

    /// Set the predicate term. Only its key is stored.
    pub fn set_predicate(
        &mut self,
        predicate: impl Into<Reference<Term>>,
    ) -> Result<(), OntobaseError> {
        let reference = predicate.into();
        if reference.collection() != TERMS_COLLECTION {
            return Err(OntobaseError::invalid_value(
                offsets::PREDICATE,
                format!("{} is not a term", reference),
            ));
        }
        if reference.key().is_empty() {
            return Err(OntobaseError::invalid_value(offsets::PREDICATE, "empty term key"));
        }
        self.edge
            .document
            .set(offsets::PREDICATE, reference.key())
    }

    /// Reference to the predicate term.
    #[must_use]
    pub fn predicate(&self) -> Option<Reference<Term>> {
        self.edge
            .document
            .get_str(offsets::PREDICATE)
            .map(|key| Reference::new(TERMS_COLLECTION, key))
    }

    /// Read the predicate term from the terms collection of `database`.
    ///
    /// `None` if the predicate is unset or the term does not exist.
    pub fn get_predicate(&self, database: &Database) -> Result<Option<Term>, OntobaseError> {
        match self.predicate() {
            Some(reference) => reference.resolve(database),
            None => Ok(None),
        }
    }

    pub fn store(&mut self) -> Result<Identity, OntobaseError> {
        self.edge.document.store()
    }
}

// =============================================================================
// NODE
// =============================================================================

/// The role a node plays in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Root,
    Type,
    Category,
    Enumeration,
    Form,
    Structure,
    Property,
}

impl NodeKind {
    pub const ALL: [NodeKind; 7] = [
        Self::Root,
        Self::Type,
        Self::Category,
        Self::Enumeration,
        Self::Form,
        Self::Structure,
        Self::Property,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Type => "type",
            Self::Category => "category",
            Self::Enumeration => "enumeration",
            Self::Form => "form",
            Self::Structure => "structure",
            Self::Property => "property",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = OntobaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                OntobaseError::invalid_value(offsets::NODE_KIND, format!("unknown node kind '{}'", s))
            })
    }
}

/// A graph vertex standing in for another document.
#[derive(Debug, Clone)]
pub struct Node {
    document: Document,
}

impl AsDocument for Node {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

impl Resolvable for Node {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Self {
            document: Document::from_record_with_layout(collection, record, &NODE_LAYOUT),
        }
    }
}

impl Node {
    /// Create an unstored node aliasing `alias`.
    pub fn new(
        collection: &Collection,
        alias: &DocumentHandle,
        kind: Option<NodeKind>,
    ) -> Result<Self, OntobaseError> {
        let mut node = Self {
            document: Document::with_layout(collection, &NODE_LAYOUT),
        };
        node.set_alias(alias)?;
        node.set_kind(kind)?;
        Ok(node)
    }

    /// Reference to the aliased document.
    #[must_use]
    pub fn alias(&self) -> Option<Reference<Document>> {
        handle_at(&self.document, offsets::ALIAS).map(Reference::from)
    }

    pub fn set_alias(&mut self, alias: &DocumentHandle) -> Result<(), OntobaseError> {
        self.document.set(offsets::ALIAS, alias.id())
    }

    pub fn kind(&self) -> Result<Option<NodeKind>, OntobaseError> {
        self.document
            .get_str(offsets::NODE_KIND)
            .map(str::parse)
            .transpose()
    }

    pub fn set_kind(&mut self, kind: Option<NodeKind>) -> Result<(), OntobaseError> {
        let value = kind.map_or(Value::Null, |kind| Value::from(kind.as_str()));
        self.document.set(offsets::NODE_KIND, value)
    }

    pub fn store(&mut self) -> Result<Identity, OntobaseError> {
        self.document.store()
    }
}

// =============================================================================
// TESTS
// =============================================================================
