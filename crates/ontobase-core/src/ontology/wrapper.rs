//! # Wrapper
//!
//! The database that owns the ontology. Bootstrap is an explicit state
//! machine:
//!
//! ```text
//! Uninitialized --init_cache--> CacheReady --init_data_dictionary--> Ready
//!                                    |
//!                                    +-- store not initialized:
//!                                        erase_data_dictionary
//!                                        build_data_dictionary
//! ```
//!
//! Whether the dictionary exists is read from the store (the descriptor
//! serial record in `_resources`), so several processes opening the same
//! database converge on one dictionary. [`Wrapper::ensure_ready`] is the
//! idempotent entry point.
//!
//! Hot terms and descriptors are served from a [`CacheService`], which is
//! flushed wholesale when the dictionary is rebuilt.

use super::descriptor::{DataType, Descriptor, usage_of};
use super::reference::Resolvable;
use super::term::Term;
use super::vocabulary;
use crate::cache::{CacheService, MemoryCache};
use crate::collection::{Collection, Options};
use crate::database::Database;
use crate::document::{AsDocument, DocumentSet, Identifiable, NativeSerializable};
use crate::primitives::{
    BUILTIN_KEY_PREFIX, DEFAULT_LANGUAGE, DEFAULT_NAMESPACE_KEY, DESCRIPTORS_COLLECTION,
    DESCRIPTOR_SERIAL_KEY, FIRST_DESCRIPTOR_SERIAL, RESOURCES_COLLECTION, SERIAL_OFFSET,
    TERMS_COLLECTION, offsets,
};
use crate::{Identity, OntobaseError, Record, Value};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ops::Deref;

/// Bootstrap state of a [`Wrapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapperState {
    Uninitialized,
    CacheReady,
    Ready,
}

const TERM_CACHE_PREFIX: &str = "term/";
const DESCRIPTOR_CACHE_PREFIX: &str = "descriptor/";
const SYMBOL_CACHE_PREFIX: &str = "symbol/";

fn cache_error(error: OntobaseError) -> OntobaseError {
    match error {
        OntobaseError::CacheError(_) => error,
        other => OntobaseError::CacheError(other.to_string()),
    }
}

/// A database specialized to hold the ontology.
pub struct Wrapper {
    database: Database,
    cache: RefCell<Box<dyn CacheService>>,
    state: Cell<WrapperState>,
}

impl fmt::Debug for Wrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wrapper")
            .field("database", &self.database.name())
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

impl Deref for Wrapper {
    type Target = Database;

    fn deref(&self) -> &Database {
        &self.database
    }
}

impl Wrapper {
    /// Wrap `database`, fronting the ontology with `cache`.
    #[must_use]
    pub fn new(database: Database, cache: Box<dyn CacheService>) -> Self {
        Self {
            database,
            cache: RefCell::new(cache),
            state: Cell::new(WrapperState::Uninitialized),
        }
    }

    /// Wrap `database` with a process-local cache.
    #[must_use]
    pub fn with_memory_cache(database: Database) -> Self {
        Self::new(database, Box::new(MemoryCache::new()))
    }

    #[must_use]
    pub fn state(&self) -> WrapperState {
        self.state.get()
    }

    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    // =========================================================================
    // BOOTSTRAP
    // =========================================================================

    /// Open the cache service.
    pub fn init_cache(&self) -> Result<(), OntobaseError> {
        self.cache.borrow_mut().open().map_err(cache_error)?;
        self.state.set(WrapperState::CacheReady);
        tracing::debug!(database = self.database.name(), "ontology cache ready");
        Ok(())
    }

    /// Whether the store already holds a data dictionary.
    pub fn is_initialized(&self) -> Result<bool, OntobaseError> {
        match self.database.get_collection(RESOURCES_COLLECTION)? {
            Some(resources) => Ok(resources.find_by_key(DESCRIPTOR_SERIAL_KEY)?.is_some()),
            None => Ok(false),
        }
    }

    /// Build the data dictionary if the store has none, then become ready.
    pub fn init_data_dictionary(&self) -> Result<(), OntobaseError> {
        if self.state.get() == WrapperState::Uninitialized {
            self.init_cache()?;
        }
        if !self.is_initialized()? {
            self.erase_data_dictionary()?;
            self.build_data_dictionary()?;
        }
        self.state.set(WrapperState::Ready);
        tracing::info!(database = self.database.name(), "ontology ready");
        Ok(())
    }

    /// Flush the cache, drop the database and clear the working set.
    pub fn erase_data_dictionary(&self) -> Result<(), OntobaseError> {
        self.cache.borrow_mut().flush().map_err(cache_error)?;
        self.database.drop_database()?;
        self.database.clear_working_set();
        if self.state.get() == WrapperState::Ready {
            self.state.set(WrapperState::CacheReady);
        }
        tracing::info!(database = self.database.name(), "erased data dictionary");
        Ok(())
    }

    /// Seed the default namespace, the built-in vocabulary and finally the
    /// descriptor serial. A build that fails partway leaves no serial, so the
    /// next [`Wrapper::init_data_dictionary`] erases and starts over.
    pub fn build_data_dictionary(&self) -> Result<(), OntobaseError> {
        let terms = self.terms()?;
        let descriptors = self.descriptors()?;
        let resources = self.resources()?;

        let mut default = Term::new(&terms, None, "")?;
        default.set_name(DEFAULT_LANGUAGE, Some("Default namespace"))?;
        default.store()?;

        let mut term_set = DocumentSet::new(&terms);
        let mut namespaces = Vec::with_capacity(vocabulary::NAMESPACES.len());
        for (lid, name) in vocabulary::NAMESPACES {
            let namespace = builtin_term(&terms, Some(&default), lid, name)?;
            term_set.push(&namespace)?;
            namespaces.push(namespace);
        }
        let namespace = |lid: &str| {
            namespaces
                .iter()
                .find(|namespace| namespace.lid() == Some(lid))
                .ok_or_else(|| OntobaseError::ResourceNotFound(format!("namespace {}", lid)))
        };

        let predicates = namespace(vocabulary::PREDICATE_NAMESPACE)?;
        for (lid, name) in vocabulary::PREDICATES {
            term_set.push(&builtin_term(&terms, Some(predicates), lid, name)?)?;
        }
        for (namespace_lid, members) in vocabulary::enumerations() {
            let parent = namespace(namespace_lid)?;
            for lid in members {
                term_set.push(&builtin_term(&terms, Some(parent), lid, lid)?)?;
            }
        }
        let term_count = term_set.finish()?.len();

        let mut descriptor_set = DocumentSet::new(&descriptors);
        for builtin in vocabulary::DESCRIPTORS {
            let mut descriptor = Descriptor::new(
                &descriptors,
                Some(&default),
                builtin.lid,
                builtin.symbol,
                builtin.data_type,
            )?;
            descriptor.set_name(DEFAULT_LANGUAGE, Some(builtin.name))?;
            descriptor.set_data_kinds(builtin.kinds.iter().copied().collect())?;
            if let Some(gid) = descriptor.gid().map(str::to_string) {
                descriptor.document_mut().set_key(&gid)?;
            }
            descriptor_set.push(&descriptor)?;
        }
        let descriptor_count = descriptor_set.finish()?.len();

        // The serial record marks the dictionary as built, so it goes last
        let mut serial = Record::new();
        serial.insert(offsets::KEY.to_string(), Value::from(DESCRIPTOR_SERIAL_KEY));
        serial.insert(SERIAL_OFFSET.to_string(), Value::from(FIRST_DESCRIPTOR_SERIAL));
        resources.insert_one(serial)?;

        tracing::info!(
            database = self.database.name(),
            terms = term_count + 1,
            descriptors = descriptor_count,
            "built data dictionary"
        );
        Ok(())
    }

    /// Bring the wrapper to `Ready`. Cheap once ready.
    pub fn ensure_ready(&self) -> Result<(), OntobaseError> {
        if self.state.get() == WrapperState::Ready {
            return Ok(());
        }
        self.init_data_dictionary()
    }

    /// Issue the next descriptor key and advance the serial by one.
    pub fn new_descriptor_key(&self) -> Result<String, OntobaseError> {
        self.ensure_ready()?;
        let serial = self
            .resources()?
            .fetch_add(DESCRIPTOR_SERIAL_KEY, SERIAL_OFFSET, 1)?;
        tracing::trace!(serial, "issued descriptor key");
        Ok(serial.to_string())
    }

    /// The current value of the descriptor serial counter.
    pub fn descriptor_serial(&self) -> Result<Option<i64>, OntobaseError> {
        Ok(self
            .resources()?
            .find_by_key(DESCRIPTOR_SERIAL_KEY)?
            .and_then(|record| record.get(SERIAL_OFFSET).and_then(Value::as_i64)))
    }

    // =========================================================================
    // COLLECTIONS
    // =========================================================================

    pub fn terms(&self) -> Result<Collection, OntobaseError> {
        self.database
            .new_collection(TERMS_COLLECTION, &Options::default())
    }

    pub fn descriptors(&self) -> Result<Collection, OntobaseError> {
        self.database
            .new_collection(DESCRIPTORS_COLLECTION, &Options::default())
    }

    pub fn resources(&self) -> Result<Collection, OntobaseError> {
        self.database
            .new_collection(RESOURCES_COLLECTION, &Options::default())
    }

    // =========================================================================
    // CACHED LOOKUPS
    // =========================================================================

    /// Cache key of `key` under `prefix`, scoped to this database so that
    /// dictionaries sharing one cache service stay apart.
    fn cache_key(&self, prefix: &str, key: &str) -> String {
        format!("{}/{}{}", self.database.name(), prefix, key)
    }

    fn cached<T: Resolvable>(
        &self,
        collection: &Collection,
        cache_key: &str,
        key: &str,
    ) -> Result<Option<T>, OntobaseError> {
        let hit = self.cache.borrow().get(cache_key).map_err(cache_error)?;
        if let Some(Value::Object(record)) = hit {
            return Ok(Some(T::from_stored(collection, record)));
        }
        match collection.find_by_key(key)? {
            Some(record) => {
                self.cache
                    .borrow_mut()
                    .set(cache_key, Value::Object(record.clone()))
                    .map_err(cache_error)?;
                Ok(Some(T::from_stored(collection, record)))
            }
            None => Ok(None),
        }
    }

    /// The term with key `key`.
    pub fn term(&self, key: &str) -> Result<Option<Term>, OntobaseError> {
        self.ensure_ready()?;
        let terms = self.terms()?;
        self.cached(&terms, &self.cache_key(TERM_CACHE_PREFIX, key), key)
    }

    /// The default namespace term.
    pub fn default_namespace(&self) -> Result<Option<Term>, OntobaseError> {
        self.term(DEFAULT_NAMESPACE_KEY)
    }

    /// The descriptor with key `key`.
    pub fn descriptor(&self, key: &str) -> Result<Option<Descriptor>, OntobaseError> {
        self.ensure_ready()?;
        let descriptors = self.descriptors()?;
        self.cached(
            &descriptors,
            &self.cache_key(DESCRIPTOR_CACHE_PREFIX, key),
            key,
        )
    }

    /// The descriptor defining `symbol`.
    pub fn descriptor_by_symbol(&self, symbol: &str) -> Result<Option<Descriptor>, OntobaseError> {
        self.ensure_ready()?;
        let symbol_key = self.cache_key(SYMBOL_CACHE_PREFIX, symbol);
        let hit = self.cache.borrow().get(&symbol_key).map_err(cache_error)?;
        if let Some(Value::String(key)) = hit {
            return self.descriptor(&key);
        }

        let mut example = Record::new();
        example.insert(offsets::SYMBOL.to_string(), Value::from(symbol));
        let Some(record) = self
            .descriptors()?
            .find_by_example(example, &Options::window(0, Some(1)))
            .first()?
        else {
            return Ok(None);
        };
        let descriptor = Descriptor::from_stored(&self.descriptors()?, record);
        self.cache_descriptor(&descriptor)?;
        Ok(Some(descriptor))
    }

    /// Put a stored descriptor in the cache, under its key and its symbol.
    pub(crate) fn cache_descriptor(&self, descriptor: &Descriptor) -> Result<(), OntobaseError> {
        let Some(key) = descriptor.key() else {
            return Ok(());
        };
        let mut cache = self.cache.borrow_mut();
        cache
            .set(
                &self.cache_key(DESCRIPTOR_CACHE_PREFIX, key),
                Value::Object(descriptor.record()),
            )
            .map_err(cache_error)?;
        if let Some(symbol) = descriptor.symbol() {
            cache
                .set(
                    &self.cache_key(SYMBOL_CACHE_PREFIX, symbol),
                    Value::from(key),
                )
                .map_err(cache_error)?;
        }
        Ok(())
    }

    /// Whether the descriptor `key` is currently cached.
    pub fn is_descriptor_cached(&self, key: &str) -> Result<bool, OntobaseError> {
        Ok(self
            .cache
            .borrow()
            .get(&self.cache_key(DESCRIPTOR_CACHE_PREFIX, key))
            .map_err(cache_error)?
            .is_some())
    }

    // =========================================================================
    // ONTOLOGY CONSTRUCTORS
    // =========================================================================

    /// Create and store a term.
    pub fn new_term(
        &self,
        namespace: Option<&Term>,
        lid: &str,
        name: &str,
    ) -> Result<Term, OntobaseError> {
        self.ensure_ready()?;
        let mut term = Term::new(&self.terms()?, namespace, lid)?;
        term.set_name(DEFAULT_LANGUAGE, Some(name))?;
        term.store()?;
        self.cache
            .borrow_mut()
            .set(
                &self.cache_key(TERM_CACHE_PREFIX, term.key().unwrap_or_default()),
                Value::Object(term.record()),
            )
            .map_err(cache_error)?;
        Ok(term)
    }

    /// Create and store a namespace, which is a term other terms live in.
    pub fn new_namespace(
        &self,
        parent: Option<&Term>,
        lid: &str,
        name: &str,
    ) -> Result<Term, OntobaseError> {
        self.new_term(parent, lid, name)
    }

    /// Create an unstored descriptor in the descriptors collection.
    pub fn new_descriptor(
        &self,
        namespace: Option<&Term>,
        lid: &str,
        symbol: &str,
        data_type: DataType,
        name: &str,
    ) -> Result<Descriptor, OntobaseError> {
        self.ensure_ready()?;
        let mut descriptor =
            Descriptor::new(&self.descriptors()?, namespace, lid, symbol, data_type)?;
        descriptor.set_name(DEFAULT_LANGUAGE, Some(name))?;
        Ok(descriptor)
    }

    /// Store a descriptor, issuing its key if it has none.
    pub fn store_descriptor(&self, descriptor: &mut Descriptor) -> Result<Identity, OntobaseError> {
        descriptor.store(self)
    }

    /// Delete a descriptor and evict it from the cache.
    ///
    /// Built-in descriptors are never deleted; others only once their stored
    /// usage counter is zero.
    pub fn delete_descriptor(&self, descriptor: &mut Descriptor) -> Result<bool, OntobaseError> {
        let Some(key) = descriptor.key().map(str::to_string) else {
            return Ok(false);
        };
        if key.starts_with(BUILTIN_KEY_PREFIX) {
            return Err(OntobaseError::BuiltinDescriptor(key));
        }
        let count = match self.descriptors()?.find_by_key(&key)? {
            Some(record) => usage_of(&record),
            None => descriptor.usage(),
        };
        if count > 0 {
            return Err(OntobaseError::DescriptorInUse { key, count });
        }

        let removed = descriptor.document_mut().remove()?;
        let mut cache = self.cache.borrow_mut();
        cache
            .delete(&self.cache_key(DESCRIPTOR_CACHE_PREFIX, &key))
            .map_err(cache_error)?;
        if let Some(symbol) = descriptor.symbol() {
            cache
                .delete(&self.cache_key(SYMBOL_CACHE_PREFIX, symbol))
                .map_err(cache_error)?;
        }
        tracing::info!(key = %key, "deleted descriptor");
        Ok(removed)
    }
}

/// A vocabulary term with its English name, keyed by GID.
fn builtin_term(
    terms: &Collection,
    namespace: Option<&Term>,
    lid: &str,
    name: &str,
) -> Result<Term, OntobaseError> {
    let mut term = Term::new(terms, namespace, lid)?;
    term.set_name(DEFAULT_LANGUAGE, Some(name))?;
    term.assign_key()?;
    Ok(term)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Server;
    use std::rc::Rc;

    fn wrapper(host: &str) -> Wrapper {
        let db = Server::new(&format!("memory://{}", host))
            .expect("server")
            .database("ontology");
        Wrapper::with_memory_cache(db)
    }

    struct BrokenCache;

    impl CacheService for BrokenCache {
        fn open(&mut self) -> Result<(), OntobaseError> {
            Err(OntobaseError::IoError("connection refused".to_string()))
        }

        fn get(&self, _key: &str) -> Result<Option<Value>, OntobaseError> {
            Ok(None)
        }

        fn set(&mut self, _key: &str, _value: Value) -> Result<(), OntobaseError> {
            Ok(())
        }

        fn delete(&mut self, _key: &str) -> Result<bool, OntobaseError> {
            Ok(false)
        }

        fn flush(&mut self) -> Result<(), OntobaseError> {
            Ok(())
        }
    }

    #[test]
    fn bootstrap_walks_the_states() {
        let wrapper = wrapper("wrapper-states");
        assert_eq!(wrapper.state(), WrapperState::Uninitialized);
        wrapper.init_cache().expect("cache");
        assert_eq!(wrapper.state(), WrapperState::CacheReady);
        assert!(!wrapper.is_initialized().expect("check"));

        wrapper.init_data_dictionary().expect("dictionary");
        assert_eq!(wrapper.state(), WrapperState::Ready);
        assert!(wrapper.is_initialized().expect("check"));
        assert_eq!(
            wrapper.descriptor_serial().expect("serial"),
            Some(FIRST_DESCRIPTOR_SERIAL)
        );
    }

    #[test]
    fn cache_failure_is_fatal() {
        let db = Server::new("memory://wrapper-broken-cache")
            .expect("server")
            .database("ontology");
        let wrapper = Wrapper::new(db, Box::new(BrokenCache));
        assert!(matches!(
            wrapper.ensure_ready(),
            Err(OntobaseError::CacheError(_))
        ));
        assert_eq!(wrapper.state(), WrapperState::Uninitialized);
    }

    #[test]
    fn builtin_vocabulary_is_seeded() {
        let wrapper = wrapper("wrapper-vocabulary");
        wrapper.ensure_ready().expect("ready");

        let default = wrapper.default_namespace().expect("lookup").expect("default");
        assert_eq!(default.gid(), Some(""));

        let enum_of = wrapper
            .term(":predicate:enum-of")
            .expect("lookup")
            .expect("predicate");
        assert_eq!(enum_of.default_name(), Some("Enumeration of"));
        assert!(wrapper.term(":type:lang-string").expect("lookup").is_some());

        let name = wrapper
            .descriptor_by_symbol(offsets::NAME)
            .expect("lookup")
            .expect("descriptor");
        assert_eq!(name.key(), Some(":name"));
        assert!(name.is_builtin());
        assert_eq!(name.data_type().expect("type"), Some(DataType::LangString));
    }

    #[test]
    fn second_wrapper_reuses_dictionary() {
        let first = wrapper("wrapper-reuse");
        first.ensure_ready().expect("ready");
        first.new_descriptor_key().expect("key");

        let second = wrapper("wrapper-reuse");
        second.ensure_ready().expect("ready");
        // The serial survived, so the dictionary was not rebuilt
        assert_eq!(
            second.descriptor_serial().expect("serial"),
            Some(FIRST_DESCRIPTOR_SERIAL + 1)
        );
    }

    #[test]
    fn builtin_descriptors_cannot_be_deleted() {
        let wrapper = wrapper("wrapper-builtin-delete");
        let mut symbol = wrapper
            .descriptor(":sym")
            .expect("lookup")
            .expect("descriptor");
        assert!(matches!(
            wrapper.delete_descriptor(&mut symbol),
            Err(OntobaseError::BuiltinDescriptor(key)) if key == ":sym"
        ));
    }

    #[test]
    fn failed_build_is_rebuilt_on_next_init() {
        let wrapper = wrapper("wrapper-failed-build");
        wrapper.init_cache().expect("cache");
        let mut squatter = Record::new();
        squatter.insert(offsets::KEY.to_string(), Value::from(":predicate:enum-of"));
        wrapper.terms().expect("terms").insert_one(squatter).expect("insert");

        assert!(matches!(
            wrapper.build_data_dictionary(),
            Err(OntobaseError::DuplicateKey { .. })
        ));
        assert!(!wrapper.is_initialized().expect("check"));

        wrapper.init_data_dictionary().expect("rebuild");
        assert!(wrapper.is_initialized().expect("check"));
        let enum_of = wrapper
            .term(":predicate:enum-of")
            .expect("lookup")
            .expect("predicate");
        assert_eq!(enum_of.default_name(), Some("Enumeration of"));
        assert!(wrapper.descriptor(":sym").expect("lookup").is_some());
    }

    /// Cache handle shared between wrappers.
    struct SharedCache(Rc<RefCell<MemoryCache>>);

    impl CacheService for SharedCache {
        fn get(&self, key: &str) -> Result<Option<Value>, OntobaseError> {
            self.0.borrow().get(key)
        }

        fn set(&mut self, key: &str, value: Value) -> Result<(), OntobaseError> {
            self.0.borrow_mut().set(key, value)
        }

        fn delete(&mut self, key: &str) -> Result<bool, OntobaseError> {
            self.0.borrow_mut().delete(key)
        }

        fn flush(&mut self) -> Result<(), OntobaseError> {
            self.0.borrow_mut().flush()
        }
    }

    #[test]
    fn shared_cache_keeps_dictionaries_apart() {
        let server = Server::new("memory://wrapper-shared-cache").expect("server");
        let cache = Rc::new(RefCell::new(MemoryCache::new()));
        let left = Wrapper::new(
            server.database("left"),
            Box::new(SharedCache(Rc::clone(&cache))),
        );
        let right = Wrapper::new(
            server.database("right"),
            Box::new(SharedCache(Rc::clone(&cache))),
        );
        left.ensure_ready().expect("left ready");
        right.ensure_ready().expect("right ready");

        left.new_term(None, "unit", "Left unit").expect("term");
        right.new_term(None, "unit", "Right unit").expect("term");
        let found = left.term("unit").expect("lookup").expect("term");
        assert_eq!(found.default_name(), Some("Left unit"));

        // Both serials start at the same value, so the keys coincide
        let mut color = left
            .new_descriptor(None, "color", "color", DataType::String, "Color")
            .expect("descriptor");
        let key = color.store(&left).expect("store").key;
        let mut size = right
            .new_descriptor(None, "size", "size", DataType::Integer, "Size")
            .expect("descriptor");
        assert_eq!(size.store(&right).expect("store").key, key);

        let cached = left.descriptor(&key).expect("lookup").expect("descriptor");
        assert_eq!(cached.symbol(), Some("color"));
        assert!(left.descriptor_by_symbol("size").expect("lookup").is_none());
    }

    #[test]
    fn new_term_is_cached_and_namespaced() {
        let wrapper = wrapper("wrapper-new-term");
        let geo = wrapper.new_namespace(None, "geo", "Geography").expect("ns");
        let country = wrapper
            .new_term(Some(&geo), "country", "Country")
            .expect("term");
        assert_eq!(country.key(), Some("geo:country"));

        let found = wrapper.term("geo:country").expect("lookup").expect("term");
        assert_eq!(found.namespace_key(), Some("geo"));
    }
}
