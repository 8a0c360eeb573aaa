//! # Terms and Namespaces
//!
//! A term is identified by a local identifier (LID) within a namespace, which
//! is itself a term. The global identifier (GID) composes both:
//!
//! ```text
//! GID = LID                          (no namespace)
//! GID = GID(namespace) + ":" + LID   (namespaced)
//! ```
//!
//! A stored term is keyed by its GID. The default namespace has an empty LID
//! and GID and the reserved key `:`, so every term defined in it gets a GID
//! starting with `:`.

use super::reference::{Reference, Resolvable};
use crate::collection::Collection;
use crate::document::{AsDocument, Document, Identifiable, Layout};
use crate::primitives::{
    DEFAULT_LANGUAGE, DEFAULT_NAMESPACE_KEY, TERMS_COLLECTION, TOKEN_NAMESPACE_SEPARATOR, offsets,
};
use crate::{Identity, OntobaseError, Record, Value};

pub static TERM_LAYOUT: Layout = Layout {
    locked: &[offsets::NAMESPACE, offsets::LID, offsets::GID],
    required: &[offsets::LID, offsets::GID, offsets::NAME],
};

/// Compose a global identifier.
#[must_use]
pub fn compose_gid(namespace_gid: Option<&str>, lid: &str) -> String {
    match namespace_gid {
        Some(namespace) => format!("{}{}{}", namespace, TOKEN_NAMESPACE_SEPARATOR, lid),
        None => lid.to_string(),
    }
}

/// The storage key of a term with the given GID.
#[must_use]
pub fn key_for_gid(gid: &str) -> String {
    if gid.is_empty() {
        DEFAULT_NAMESPACE_KEY.to_string()
    } else {
        gid.to_string()
    }
}

/// An ontology term.
#[derive(Debug, Clone)]
pub struct Term {
    document: Document,
    /// GID of the namespace, kept to recompose the GID when the LID changes.
    namespace_gid: Option<String>,
}

impl AsDocument for Term {
    fn document(&self) -> &Document {
        &self.document
    }

    fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }
}

impl Resolvable for Term {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Self::from_document(Document::from_record_with_layout(
            collection,
            record,
            &TERM_LAYOUT,
        ))
    }
}

impl Term {
    /// Create an unstored term `lid` in `namespace`.
    pub fn new(
        collection: &Collection,
        namespace: Option<&Term>,
        lid: &str,
    ) -> Result<Self, OntobaseError> {
        let mut term = Self::with_layout(collection, &TERM_LAYOUT);
        term.set_namespace(namespace)?;
        term.set_lid(lid)?;
        Ok(term)
    }

    pub(crate) fn with_layout(collection: &Collection, layout: &'static Layout) -> Self {
        Self {
            document: Document::with_layout(collection, layout),
            namespace_gid: None,
        }
    }

    /// Rebuild a term from a stored document, recovering the namespace GID
    /// from its own GID.
    pub(crate) fn from_document(document: Document) -> Self {
        let namespace_gid = match (
            document.get_str(offsets::NAMESPACE),
            document.get_str(offsets::GID),
            document.get_str(offsets::LID),
        ) {
            (Some(_), Some(gid), Some(lid)) => gid
                .strip_suffix(lid)
                .and_then(|rest| rest.strip_suffix(TOKEN_NAMESPACE_SEPARATOR))
                .map(str::to_string),
            _ => None,
        };
        Self {
            document,
            namespace_gid,
        }
    }

    // =========================================================================
    // IDENTIFIERS
    // =========================================================================

    #[must_use]
    pub fn lid(&self) -> Option<&str> {
        self.document.get_str(offsets::LID)
    }

    #[must_use]
    pub fn gid(&self) -> Option<&str> {
        self.document.get_str(offsets::GID)
    }

    /// Key of the namespace term, if any.
    #[must_use]
    pub fn namespace_key(&self) -> Option<&str> {
        self.document.get_str(offsets::NAMESPACE)
    }

    /// Reference to the namespace term, if any.
    #[must_use]
    pub fn namespace(&self) -> Option<Reference<Term>> {
        self.namespace_key()
            .map(|key| Reference::new(TERMS_COLLECTION, key))
    }

    /// Move the term to `namespace` (or to none) and recompute its GID.
    pub fn set_namespace(&mut self, namespace: Option<&Term>) -> Result<(), OntobaseError> {
        let (key, gid) = match namespace {
            Some(namespace) => {
                let gid = namespace
                    .gid()
                    .ok_or_else(|| OntobaseError::MissingRequiredOffset(offsets::GID.to_string()))?;
                let key = namespace
                    .key()
                    .map(str::to_string)
                    .unwrap_or_else(|| key_for_gid(gid));
                (Value::from(key), Some(gid.to_string()))
            }
            None => (Value::Null, None),
        };
        let previous = self.namespace_gid.clone();
        self.document.set(offsets::NAMESPACE, key)?;
        self.namespace_gid = gid;
        if let Err(e) = self.recompute_gid() {
            self.namespace_gid = previous;
            return Err(e);
        }
        Ok(())
    }

    /// Set the local identifier and recompute the GID.
    pub fn set_lid(&mut self, lid: &str) -> Result<(), OntobaseError> {
        self.document.set(offsets::LID, lid)?;
        self.recompute_gid()
    }

    fn recompute_gid(&mut self) -> Result<(), OntobaseError> {
        let Some(lid) = self.lid().map(str::to_string) else {
            return Ok(());
        };
        let gid = compose_gid(self.namespace_gid.as_deref(), &lid);
        self.document.set(offsets::GID, gid)
    }

    /// Reference to this term in the terms collection.
    ///
    /// Unstored terms are referenced by the key their GID will give them.
    #[must_use]
    pub fn reference(&self) -> Reference<Term> {
        let key = self
            .key()
            .map(str::to_string)
            .or_else(|| self.gid().map(key_for_gid))
            .unwrap_or_default();
        Reference::new(self.document.collection().name(), key)
    }

    // =========================================================================
    // LABELS
    // =========================================================================

    /// The name in `language`.
    #[must_use]
    pub fn name(&self, language: &str) -> Option<&str> {
        label(&self.document, offsets::NAME, language)
    }

    /// Set the name in `language`; `None` removes that language.
    pub fn set_name(&mut self, language: &str, text: Option<&str>) -> Result<(), OntobaseError> {
        set_label(&mut self.document, offsets::NAME, language, text)
    }

    /// The description in `language`.
    #[must_use]
    pub fn description(&self, language: &str) -> Option<&str> {
        label(&self.document, offsets::DESCRIPTION, language)
    }

    pub fn set_description(
        &mut self,
        language: &str,
        text: Option<&str>,
    ) -> Result<(), OntobaseError> {
        set_label(&mut self.document, offsets::DESCRIPTION, language, text)
    }

    /// The name in the default language.
    #[must_use]
    pub fn default_name(&self) -> Option<&str> {
        self.name(DEFAULT_LANGUAGE)
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Give an unkeyed term the key derived from its GID.
    pub(crate) fn assign_key(&mut self) -> Result<(), OntobaseError> {
        if self.key().is_none() {
            if let Some(gid) = self.gid().map(key_for_gid) {
                self.document.set_key(&gid)?;
            }
        }
        Ok(())
    }

    /// Store the term under its GID-derived key.
    pub fn store(&mut self) -> Result<Identity, OntobaseError> {
        self.assign_key()?;
        self.document.store()
    }
}

// =============================================================================
// PER-LANGUAGE LABELS
// =============================================================================

pub(crate) fn label<'a>(document: &'a Document, offset: &str, language: &str) -> Option<&'a str> {
    document
        .get(offset)
        .and_then(Value::as_object)
        .and_then(|labels| labels.get(language))
        .and_then(Value::as_str)
}

pub(crate) fn set_label(
    document: &mut Document,
    offset: &str,
    language: &str,
    text: Option<&str>,
) -> Result<(), OntobaseError> {
    let mut labels = document
        .get(offset)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    match text {
        Some(text) => {
            labels.insert(language.to_string(), Value::from(text));
        }
        None => {
            labels.shift_remove(language);
        }
    }
    if labels.is_empty() {
        document.set(offset, Value::Null)
    } else {
        document.set(offset, Value::Object(labels))
    }
}

// =============================================================================
// TESTS
// =============================================================================
