//! # Primitives
//!
//! Hardcoded constants for the Ontobase core: reserved tokens, well-known
//! collection names, document offsets and format identifiers.
//!
//! These are compiled into the binary and are immutable at runtime. Stores
//! written with different values are not compatible.

/// Token joining a namespace global identifier to a local identifier.
pub const TOKEN_NAMESPACE_SEPARATOR: &str = ":";

/// Prefix reserved for built-in ontology keys.
///
/// The default namespace has an empty global identifier, so every term it
/// contains has a global identifier (and key) starting with the separator.
pub const BUILTIN_KEY_PREFIX: &str = TOKEN_NAMESPACE_SEPARATOR;

/// Key of the default namespace term (its global identifier is empty).
pub const DEFAULT_NAMESPACE_KEY: &str = TOKEN_NAMESPACE_SEPARATOR;

/// Language used for names and descriptions when the caller does not pick one.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Magic bytes for the serialized server image.
pub const MAGIC_BYTES: &[u8; 4] = b"ONTB";

/// Current serialization format version.
///
/// Increment this when making breaking changes to the server image format.
pub const FORMAT_VERSION: u8 = 1;

/// `DocumentSet` buffer size; a flush runs once it is exceeded.
pub const DEFAULT_BUFFER_SIZE: usize = 1000;

// =============================================================================
// WELL-KNOWN COLLECTIONS
// =============================================================================

/// Collection holding namespaces, terms and vocabulary entries.
pub const TERMS_COLLECTION: &str = "_terms";

/// Collection holding descriptors.
pub const DESCRIPTORS_COLLECTION: &str = "_descriptors";

/// Collection holding serial counters and other bookkeeping records.
pub const RESOURCES_COLLECTION: &str = "_resources";

/// Key of the resources record that issues descriptor serials.
pub const DESCRIPTOR_SERIAL_KEY: &str = "descriptors";

/// Offset of the counter value in a serial record.
pub const SERIAL_OFFSET: &str = "serial";

/// First serial handed out to user descriptors.
pub const FIRST_DESCRIPTOR_SERIAL: i64 = 1;

// =============================================================================
// OFFSETS
// =============================================================================

/// Property names with a fixed meaning in native records.
pub mod offsets {
    /// Collection-unique key.
    pub const KEY: &str = "_key";
    /// Database-unique identifier, `collection/key`.
    pub const ID: &str = "_id";
    /// Separator between collection and key in an identifier.
    pub const ID_SEPARATOR: &str = "/";
    /// Edge source vertex handle.
    pub const FROM: &str = "_from";
    /// Edge destination vertex handle.
    pub const TO: &str = "_to";
    /// Predicate term key.
    pub const PREDICATE: &str = "_predicate";
    /// Node alias target handle.
    pub const ALIAS: &str = "_alias";

    /// Namespace term key.
    pub const NAMESPACE: &str = "nid";
    /// Local identifier.
    pub const LID: &str = "lid";
    /// Global identifier.
    pub const GID: &str = "gid";
    /// Per-language label.
    pub const NAME: &str = "name";
    /// Per-language description.
    pub const DESCRIPTION: &str = "descr";

    /// Descriptor symbol.
    pub const SYMBOL: &str = "sym";
    /// Descriptor synonyms.
    pub const SYNONYMS: &str = "syn";
    /// Descriptor data type.
    pub const DATA_TYPE: &str = "type";
    /// Descriptor data kinds.
    pub const DATA_KIND: &str = "kind";
    /// Managed usage counter.
    pub const REF_COUNT: &str = "ref-cnt";
    /// Managed minimum observed value.
    pub const MIN_VALUE: &str = "min";
    /// Managed maximum observed value.
    pub const MAX_VALUE: &str = "max";
    /// Validation regular expression.
    pub const PATTERN: &str = "pattern";
    /// Expected value range, `[min, max]`.
    pub const RANGE: &str = "range";

    /// Node function tag.
    pub const NODE_KIND: &str = "node-kind";
}
