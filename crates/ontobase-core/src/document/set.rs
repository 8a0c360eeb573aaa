//! # Document Set
//!
//! A write buffer that bulk-inserts documents into one collection.
//!
//! Documents are validated when pushed and inserted in batches once the
//! buffer exceeds its size, so a batch holds `size + 1` documents. Whatever is left is inserted on [`finish`] or
//! when the set is dropped. A failed flush keeps the buffer intact.
//!
//! [`finish`]: DocumentSet::finish

use super::{AsDocument, NativeSerializable, Validatable};
use crate::collection::Collection;
use crate::primitives::DEFAULT_BUFFER_SIZE;
use crate::{OntobaseError, Record};

/// Buffered bulk inserter.
#[derive(Debug)]
pub struct DocumentSet {
    collection: Collection,
    buffer: Vec<Record>,
    size: usize,
    keys: Vec<String>,
}

impl DocumentSet {
    /// Create a set with the default buffer size.
    #[must_use]
    pub fn new(collection: &Collection) -> Self {
        Self::with_size(collection, DEFAULT_BUFFER_SIZE)
    }

    /// Create a set that flushes once more than `size` documents (at least
    /// one) are buffered.
    #[must_use]
    pub fn with_size(collection: &Collection, size: usize) -> Self {
        let size = size.max(1);
        Self {
            collection: collection.clone(),
            buffer: Vec::with_capacity(size.saturating_add(1)),
            size,
            keys: Vec::new(),
        }
    }

    /// Number of buffered, not yet inserted documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.size
    }

    /// Keys inserted so far, in insertion order.
    #[must_use]
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Buffer a document, flushing if the buffer now exceeds its size.
    pub fn push<D: AsDocument>(&mut self, document: &D) -> Result<(), OntobaseError> {
        document.validate()?;
        self.buffer.push(document.record());
        if self.buffer.len() > self.size {
            self.flush()?;
        }
        Ok(())
    }

    /// Insert every buffered document. Returns the keys of this batch.
    pub fn flush(&mut self) -> Result<Vec<String>, OntobaseError> {
        if self.buffer.is_empty() {
            return Ok(Vec::new());
        }
        let keys = self.collection.insert_many(self.buffer.clone())?;
        tracing::debug!(
            collection = self.collection.name(),
            count = keys.len(),
            "flushed document set"
        );
        self.buffer.clear();
        self.keys.extend(keys.iter().cloned());
        Ok(keys)
    }

    /// Flush the remainder and return every key inserted by this set.
    pub fn finish(mut self) -> Result<Vec<String>, OntobaseError> {
        self.flush()?;
        Ok(std::mem::take(&mut self.keys))
    }
}

impl Drop for DocumentSet {
    fn drop(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        if let Err(e) = self.flush() {
            tracing::error!(
                collection = self.collection.name(),
                pending = self.buffer.len(),
                error = %e,
                "failed to flush document set"
            );
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Document, Layout};
    use crate::{Options, Server};

    static NAMED: Layout = Layout {
        locked: &[],
        required: &["name"],
    };

    fn collection(host: &str) -> Collection {
        Server::new(&format!("memory://{}", host))
            .expect("server")
            .database("db")
            .new_collection("things", &Options::default())
            .expect("collection")
    }

    fn named(collection: &Collection, name: &str) -> Document {
        let mut doc = Document::with_layout(collection, &NAMED);
        doc.set("name", name).expect("set");
        doc
    }

    #[test]
    fn flushes_once_buffer_exceeds_size() {
        let things = collection("set-threshold");
        let mut set = DocumentSet::with_size(&things, 2);

        set.push(&named(&things, "a")).expect("push");
        set.push(&named(&things, "b")).expect("push");
        // At exactly the size nothing is written yet
        assert_eq!(things.count(&Record::new()).expect("count"), 0);
        assert_eq!(set.len(), 2);

        set.push(&named(&things, "c")).expect("push");
        assert_eq!(things.count(&Record::new()).expect("count"), 3);
        assert!(set.is_empty());
        assert_eq!(set.keys().len(), 3);
    }

    #[test]
    fn drop_flushes_remainder() {
        let things = collection("set-drop");
        {
            let mut set = DocumentSet::with_size(&things, 10);
            set.push(&named(&things, "a")).expect("push");
            set.push(&named(&things, "b")).expect("push");
        }
        assert_eq!(things.count(&Record::new()).expect("count"), 2);
    }

    #[test]
    fn finish_returns_all_keys() {
        let things = collection("set-finish");
        let mut set = DocumentSet::with_size(&things, 2);
        for name in ["a", "b", "c"] {
            set.push(&named(&things, name)).expect("push");
        }
        let keys = set.finish().expect("finish");
        assert_eq!(keys, vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    }

    #[test]
    fn invalid_documents_are_rejected_on_push() {
        let things = collection("set-invalid");
        let mut set = DocumentSet::new(&things);
        let result = set.push(&Document::with_layout(&things, &NAMED));
        assert!(matches!(result, Err(OntobaseError::MissingRequiredOffset(_))));
        assert!(set.is_empty());
    }

    #[test]
    fn failed_flush_keeps_buffer() {
        let things = collection("set-failure");
        let mut set = DocumentSet::with_size(&things, 10);
        let mut doc = named(&things, "a");
        doc.set_key("dup").expect("key");
        set.push(&doc).expect("push");
        set.push(&doc).expect("push");

        assert!(matches!(set.flush(), Err(OntobaseError::DuplicateKey { .. })));
        assert_eq!(set.len(), 2);
        // Drop logs the failure instead of panicking
    }
}
