//! # Cursor
//!
//! A lazy, restartable result sequence. Creating a cursor touches nothing;
//! each call to [`Cursor::iter`] runs the underlying read again.

use crate::collection::Collection;
use crate::document::Document;
use crate::query::{Pipeline, Query};
use crate::{OntobaseError, Record};

#[derive(Debug, Clone)]
enum Source {
    Example {
        filter: Record,
        start: usize,
        limit: Option<usize>,
    },
    Query(Query),
    Pipeline(Pipeline),
}

/// Results of a find, query or aggregation on one collection.
#[derive(Debug, Clone)]
pub struct Cursor {
    collection: Collection,
    source: Source,
}

impl Cursor {
    pub(crate) fn by_example(
        collection: Collection,
        filter: Record,
        start: usize,
        limit: Option<usize>,
    ) -> Self {
        Self {
            collection,
            source: Source::Example {
                filter,
                start,
                limit,
            },
        }
    }

    pub(crate) fn by_query(collection: Collection, query: Query) -> Self {
        Self {
            collection,
            source: Source::Query(query),
        }
    }

    pub(crate) fn by_pipeline(collection: Collection, pipeline: Pipeline) -> Self {
        Self {
            collection,
            source: Source::Pipeline(pipeline),
        }
    }

    /// Run the read and collect its records.
    pub fn fetch(&self) -> Result<Vec<Record>, OntobaseError> {
        match &self.source {
            Source::Example {
                filter,
                start,
                limit,
            } => self.collection.run_find(filter, *start, *limit),
            Source::Query(query) => self.collection.run_query(query),
            Source::Pipeline(pipeline) => self.collection.run_pipeline(pipeline),
        }
    }

    /// Run the read and iterate its records.
    pub fn iter(&self) -> Result<std::vec::IntoIter<Record>, OntobaseError> {
        Ok(self.fetch()?.into_iter())
    }

    /// Run the read and wrap each record as a persistent [`Document`].
    pub fn documents(&self) -> Result<impl Iterator<Item = Document> + use<>, OntobaseError> {
        let collection = self.collection.clone();
        Ok(self
            .fetch()?
            .into_iter()
            .map(move |record| Document::from_record(&collection, record)))
    }

    /// The first record, if any.
    pub fn first(&self) -> Result<Option<Record>, OntobaseError> {
        Ok(self.iter()?.next())
    }

    /// The collection this cursor reads.
    #[must_use]
    pub fn collection(&self) -> &Collection {
        &self.collection
    }
}
