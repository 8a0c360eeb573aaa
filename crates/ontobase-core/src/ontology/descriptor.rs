//! # Descriptors
//!
//! A descriptor is a term that defines a data field: the symbol values are
//! tagged with, their data type and kinds, and usage statistics kept up to
//! date by the framework.
//!
//! Keys:
//! - built-in descriptors are keyed by their GID, which starts with `:`
//! - user descriptors are keyed by a serial issued by the [`Wrapper`]
//!
//! [`Wrapper`]: super::wrapper::Wrapper

use super::reference::Resolvable;
use super::term::Term;
use super::wrapper::Wrapper;
use crate::collection::Collection;
use crate::document::{AsDocument, Document, Identifiable, Layout, Validatable};
use crate::primitives::{BUILTIN_KEY_PREFIX, offsets};
use crate::query::compare_values;
use crate::{Identity, OntobaseError, Record, Value};
use enumset::{EnumSet, EnumSetType};
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;

pub static DESCRIPTOR_LAYOUT: Layout = Layout {
    locked: &[
        offsets::NAMESPACE,
        offsets::LID,
        offsets::GID,
        offsets::SYMBOL,
        offsets::DATA_TYPE,
        offsets::DATA_KIND,
    ],
    required: &[
        offsets::LID,
        offsets::GID,
        offsets::NAME,
        offsets::SYMBOL,
        offsets::DATA_TYPE,
    ],
};

// =============================================================================
// DATA TYPES AND KINDS
// =============================================================================

/// The type of values a descriptor defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Mixed,
    String,
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Reference,
    Enum,
    Set,
    Struct,
    Array,
    LangString,
    Url,
}

impl DataType {
    pub const ALL: [DataType; 14] = [
        Self::Mixed,
        Self::String,
        Self::Text,
        Self::Integer,
        Self::Float,
        Self::Boolean,
        Self::Date,
        Self::Reference,
        Self::Enum,
        Self::Set,
        Self::Struct,
        Self::Array,
        Self::LangString,
        Self::Url,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mixed => "mixed",
            Self::String => "string",
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Reference => "reference",
            Self::Enum => "enum",
            Self::Set => "set",
            Self::Struct => "struct",
            Self::Array => "array",
            Self::LangString => "lang-string",
            Self::Url => "url",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = OntobaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|data_type| data_type.as_str() == s)
            .ok_or_else(|| {
                OntobaseError::invalid_value(offsets::DATA_TYPE, format!("unknown type '{}'", s))
            })
    }
}

/// How values of a descriptor are used.
#[derive(EnumSetType, Debug, Hash)]
pub enum DataKind {
    Discrete,
    Categorical,
    Quantitative,
    Range,
    Private,
    Summary,
}

impl DataKind {
    pub const ALL: [DataKind; 6] = [
        Self::Discrete,
        Self::Categorical,
        Self::Quantitative,
        Self::Range,
        Self::Private,
        Self::Summary,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Discrete => "discrete",
            Self::Categorical => "categorical",
            Self::Quantitative => "quantitative",
            Self::Range => "range",
            Self::Private => "private",
            Self::Summary => "summary",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = OntobaseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                OntobaseError::invalid_value(offsets::DATA_KIND, format!("unknown kind '{}'", s))
            })
    }
}

// =============================================================================
// DESCRIPTOR
// =============================================================================

/// A term defining a data field.
#[derive(Debug, Clone)]
pub struct Descriptor {
    term: Term,
}

impl AsDocument for Descriptor {
    fn document(&self) -> &Document {
        self.term.document()
    }

    fn document_mut(&mut self) -> &mut Document {
        self.term.document_mut()
    }
}

impl Resolvable for Descriptor {
    fn from_stored(collection: &Collection, record: Record) -> Self {
        Self {
            term: Term::from_document(Document::from_record_with_layout(
                collection,
                record,
                &DESCRIPTOR_LAYOUT,
            )),
        }
    }
}

/// Read access to the term half of a descriptor.
impl Deref for Descriptor {
    type Target = Term;

    fn deref(&self) -> &Term {
        &self.term
    }
}

/// The usage counter stored in a descriptor record.
pub(crate) fn usage_of(record: &Record) -> u64 {
    record
        .get(offsets::REF_COUNT)
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

impl Descriptor {
    /// Create an unstored descriptor.
    pub fn new(
        collection: &Collection,
        namespace: Option<&Term>,
        lid: &str,
        symbol: &str,
        data_type: DataType,
    ) -> Result<Self, OntobaseError> {
        let mut descriptor = Self {
            term: Term::with_layout(collection, &DESCRIPTOR_LAYOUT),
        };
        descriptor.term.set_namespace(namespace)?;
        descriptor.term.set_lid(lid)?;
        descriptor.set_symbol(symbol)?;
        descriptor.set_data_type(data_type)?;
        Ok(descriptor)
    }

    /// The term half of the descriptor.
    #[must_use]
    pub fn term(&self) -> &Term {
        &self.term
    }

    /// Whether the descriptor is part of the built-in vocabulary.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.key()
            .is_some_and(|key| key.starts_with(BUILTIN_KEY_PREFIX))
    }

    pub fn set_namespace(&mut self, namespace: Option<&Term>) -> Result<(), OntobaseError> {
        self.term.set_namespace(namespace)
    }

    pub fn set_lid(&mut self, lid: &str) -> Result<(), OntobaseError> {
        self.term.set_lid(lid)
    }

    pub fn set_name(&mut self, language: &str, text: Option<&str>) -> Result<(), OntobaseError> {
        self.term.set_name(language, text)
    }

    pub fn set_description(
        &mut self,
        language: &str,
        text: Option<&str>,
    ) -> Result<(), OntobaseError> {
        self.term.set_description(language, text)
    }

    // =========================================================================
    // DEFINITION
    // =========================================================================

    #[must_use]
    pub fn symbol(&self) -> Option<&str> {
        self.document().get_str(offsets::SYMBOL)
    }

    pub fn set_symbol(&mut self, symbol: &str) -> Result<(), OntobaseError> {
        self.document_mut().set(offsets::SYMBOL, symbol)
    }

    /// Alternative symbols.
    #[must_use]
    pub fn synonyms(&self) -> Vec<&str> {
        self.document()
            .get(offsets::SYNONYMS)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// Add a synonym; duplicates are ignored.
    pub fn add_synonym(&mut self, synonym: &str) -> Result<(), OntobaseError> {
        let mut synonyms: Vec<Value> = self
            .synonyms()
            .into_iter()
            .map(Value::from)
            .collect();
        if synonyms.iter().any(|s| s.as_str() == Some(synonym)) {
            return Ok(());
        }
        synonyms.push(Value::from(synonym));
        self.document_mut().set(offsets::SYNONYMS, synonyms)
    }

    pub fn data_type(&self) -> Result<Option<DataType>, OntobaseError> {
        self.document()
            .get_str(offsets::DATA_TYPE)
            .map(str::parse)
            .transpose()
    }

    pub fn set_data_type(&mut self, data_type: DataType) -> Result<(), OntobaseError> {
        self.document_mut().set(offsets::DATA_TYPE, data_type.as_str())
    }

    pub fn data_kinds(&self) -> Result<EnumSet<DataKind>, OntobaseError> {
        let Some(value) = self.document().get(offsets::DATA_KIND) else {
            return Ok(EnumSet::empty());
        };
        let items = value
            .as_array()
            .ok_or_else(|| OntobaseError::invalid_value(offsets::DATA_KIND, "expected array"))?;
        items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| OntobaseError::invalid_value(offsets::DATA_KIND, "expected string"))
                    .and_then(str::parse::<DataKind>)
            })
            .collect()
    }

    /// Set the data kinds; an empty set removes the offset.
    pub fn set_data_kinds(&mut self, kinds: EnumSet<DataKind>) -> Result<(), OntobaseError> {
        let value = if kinds.is_empty() {
            Value::Null
        } else {
            Value::Array(kinds.iter().map(|kind| Value::from(kind.as_str())).collect())
        };
        self.document_mut().set(offsets::DATA_KIND, value)
    }

    #[must_use]
    pub fn pattern(&self) -> Option<&str> {
        self.document().get_str(offsets::PATTERN)
    }

    /// Set (or with `None` remove) the validation pattern.
    pub fn set_pattern(&mut self, pattern: Option<&str>) -> Result<(), OntobaseError> {
        self.document_mut()
            .set(offsets::PATTERN, pattern.map_or(Value::Null, Value::from))
    }

    /// The expected `[min, max]` range, if set.
    #[must_use]
    pub fn range(&self) -> Option<(Value, Value)> {
        match self.document().get(offsets::RANGE)?.as_array()?.as_slice() {
            [min, max] => Some((min.clone(), max.clone())),
            _ => None,
        }
    }

    pub fn set_range(&mut self, range: Option<(Value, Value)>) -> Result<(), OntobaseError> {
        let value = match range {
            Some((min, max)) => Value::Array(vec![min, max]),
            None => Value::Null,
        };
        self.document_mut().set(offsets::RANGE, value)
    }

    // =========================================================================
    // USAGE ACCOUNTING
    // =========================================================================

    /// Number of values tagged with this descriptor.
    #[must_use]
    pub fn usage(&self) -> u64 {
        usage_of(self.document().properties().as_record())
    }

    #[must_use]
    pub fn min_value(&self) -> Option<&Value> {
        self.document().get(offsets::MIN_VALUE)
    }

    #[must_use]
    pub fn max_value(&self) -> Option<&Value> {
        self.document().get(offsets::MAX_VALUE)
    }

    /// Count one more use of `value` and widen the observed min/max.
    ///
    /// Only numbers and strings take part in the min/max.
    pub fn record_usage(&mut self, value: &Value) -> Result<(), OntobaseError> {
        let usage = self.usage().saturating_add(1);
        self.document_mut().set(offsets::REF_COUNT, usage)?;

        if !(value.is_number() || value.is_string()) {
            return Ok(());
        }
        let lower = self
            .min_value()
            .is_none_or(|min| compare_values(value, min) == Ordering::Less);
        if lower {
            self.document_mut().set(offsets::MIN_VALUE, value.clone())?;
        }
        let higher = self
            .max_value()
            .is_none_or(|max| compare_values(value, max) == Ordering::Greater);
        if higher {
            self.document_mut().set(offsets::MAX_VALUE, value.clone())?;
        }
        Ok(())
    }

    /// Forget `count` uses. The counter stops at zero.
    pub fn release_usage(&mut self, count: u64) -> Result<(), OntobaseError> {
        let usage = self.usage().saturating_sub(count);
        let value = if usage == 0 {
            Value::Null
        } else {
            Value::from(usage)
        };
        self.document_mut().set(offsets::REF_COUNT, value)
    }

    // =========================================================================
    // PERSISTENCE
    // =========================================================================

    /// Store the descriptor, requesting a key from `wrapper` if it has none.
    pub fn store(&mut self, wrapper: &Wrapper) -> Result<Identity, OntobaseError> {
        self.validate()?;
        if self.key().is_none() {
            let key = wrapper.new_descriptor_key()?;
            self.document_mut().set_key(&key)?;
        }
        let identity = self.document_mut().store()?;
        wrapper.cache_descriptor(self)?;
        Ok(identity)
    }

    /// Delete the descriptor through `wrapper`.
    pub fn delete(&mut self, wrapper: &Wrapper) -> Result<bool, OntobaseError> {
        wrapper.delete_descriptor(self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
