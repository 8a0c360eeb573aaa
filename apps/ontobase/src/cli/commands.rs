//! # CLI Command Implementations
//!
//! Each command works on a connected [`Wrapper`] and returns a JSON report;
//! printing is left to [`super::execute`].

use ontobase_core::ontology::key_for_gid;
use ontobase_core::primitives::{DEFAULT_LANGUAGE, offsets};
use ontobase_core::{
    AsDocument, CollectionKind, DataKind, DataType, Descriptor, DocumentHandle, DocumentSet,
    NativeSerializable, OntobaseError, Options, Predicate, Record, Term, Value, Wrapper,
};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::Path;

/// Maximum file size for term import (16 MB).
const MAX_IMPORT_FILE_SIZE: u64 = 16 * 1024 * 1024;

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Build the data dictionary, rebuilding an existing one only with `force`.
pub fn cmd_init(wrapper: &Wrapper, force: bool) -> Result<Value, OntobaseError> {
    if wrapper.is_initialized()? {
        if !force {
            return Err(OntobaseError::InvalidOption(
                "Ontology already initialized. Use --force to rebuild.".to_string(),
            ));
        }
        wrapper.erase_data_dictionary()?;
    }
    wrapper.init_data_dictionary()?;

    Ok(json!({
        "database": wrapper.name(),
        "initialized": true,
        "descriptor_serial": wrapper.descriptor_serial()?,
    }))
}

// =============================================================================
// STATUS COMMANDS
// =============================================================================

/// Connection and dictionary summary. The password is shadowed.
pub fn cmd_status(wrapper: &Wrapper) -> Result<Value, OntobaseError> {
    let server = wrapper.server();
    let everything = Record::new();

    Ok(json!({
        "source": server.source().to_string(),
        "database": wrapper.name(),
        "state": format!("{:?}", wrapper.state()),
        "connections_opened": server.connections_opened(),
        "terms": wrapper.terms()?.count(&everything)?,
        "descriptors": wrapper.descriptors()?.count(&everything)?,
        "descriptor_serial": wrapper.descriptor_serial()?,
    }))
}

/// Every collection of the database with its kind and size.
pub fn cmd_collections(wrapper: &Wrapper) -> Result<Value, OntobaseError> {
    let everything = Record::new();
    let mut collections = Vec::new();
    for name in wrapper.list_collections()? {
        if let Some(collection) = wrapper.get_collection(&name)? {
            collections.push(json!({
                "name": name,
                "kind": collection.kind().to_string(),
                "count": collection.count(&everything)?,
            }));
        }
    }
    Ok(json!({ "collections": collections }))
}

// =============================================================================
// TERM COMMANDS
// =============================================================================

/// One entry of a term import file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TermEntry {
    pub lid: String,
    #[serde(default)]
    pub namespace: Option<String>,
    pub name: String,
}

fn require_term(wrapper: &Wrapper, key: &str) -> Result<Term, OntobaseError> {
    wrapper
        .term(key)?
        .ok_or_else(|| OntobaseError::ResourceNotFound(format!("term '{}'", key)))
}

fn optional_term(wrapper: &Wrapper, key: Option<&str>) -> Result<Option<Term>, OntobaseError> {
    match key {
        Some(key) => require_term(wrapper, key).map(Some),
        None => Ok(None),
    }
}

pub fn cmd_term_get(wrapper: &Wrapper, key: &str) -> Result<Value, OntobaseError> {
    Ok(Value::Object(require_term(wrapper, key)?.record()))
}

pub fn cmd_term_add(
    wrapper: &Wrapper,
    lid: &str,
    namespace: Option<&str>,
    name: &str,
) -> Result<Value, OntobaseError> {
    let namespace = optional_term(wrapper, namespace)?;
    let term = wrapper.new_term(namespace.as_ref(), lid, name)?;
    Ok(Value::Object(term.record()))
}

/// Store terms from a JSON array, bulk-inserting whenever more than
/// `buffer_size` are buffered.
///
/// Namespaces must already exist; entries are keyed by GID like any term.
pub fn cmd_term_import(
    wrapper: &Wrapper,
    file: &Path,
    buffer_size: usize,
) -> Result<Value, OntobaseError> {
    let metadata = std::fs::metadata(file)
        .map_err(|e| OntobaseError::IoError(format!("Cannot read file metadata: {}", e)))?;
    if metadata.len() > MAX_IMPORT_FILE_SIZE {
        return Err(OntobaseError::SerializationError(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            MAX_IMPORT_FILE_SIZE
        )));
    }
    let text = std::fs::read_to_string(file)
        .map_err(|e| OntobaseError::IoError(format!("Read file: {}", e)))?;
    let entries: Vec<TermEntry> = serde_json::from_str(&text)
        .map_err(|e| OntobaseError::SerializationError(format!("Invalid term list: {}", e)))?;

    let terms = wrapper.terms()?;
    let mut namespaces: BTreeMap<String, Term> = BTreeMap::new();
    let mut set = DocumentSet::with_size(&terms, buffer_size);
    for entry in &entries {
        if let Some(key) = &entry.namespace {
            if !namespaces.contains_key(key) {
                namespaces.insert(key.clone(), require_term(wrapper, key)?);
            }
        }
        let parent = entry.namespace.as_ref().and_then(|key| namespaces.get(key));

        let mut term = Term::new(&terms, parent, &entry.lid)?;
        term.set_name(DEFAULT_LANGUAGE, Some(&entry.name))?;
        if let Some(gid) = term.gid().map(str::to_string) {
            term.document_mut().set_key(&key_for_gid(&gid))?;
        }
        set.push(&term)?;
    }
    let keys = set.finish()?;
    tracing::info!(count = keys.len(), "imported terms");

    Ok(json!({ "imported": keys.len(), "keys": keys }))
}

// =============================================================================
// DESCRIPTOR COMMANDS
// =============================================================================

/// Arguments of `descriptor add`, still as typed on the command line.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorArgs<'a> {
    pub lid: &'a str,
    pub symbol: &'a str,
    pub data_type: &'a str,
    pub kinds: &'a [String],
    pub namespace: Option<&'a str>,
    pub name: &'a str,
}

fn find_descriptor(wrapper: &Wrapper, key: &str) -> Result<Descriptor, OntobaseError> {
    if let Some(descriptor) = wrapper.descriptor(key)? {
        return Ok(descriptor);
    }
    wrapper
        .descriptor_by_symbol(key)?
        .ok_or_else(|| OntobaseError::ResourceNotFound(format!("descriptor '{}'", key)))
}

pub fn cmd_descriptor_add(
    wrapper: &Wrapper,
    args: &DescriptorArgs<'_>,
) -> Result<Value, OntobaseError> {
    let data_type: DataType = args.data_type.parse()?;
    let kinds = args
        .kinds
        .iter()
        .map(|kind| kind.parse::<DataKind>())
        .collect::<Result<Vec<_>, _>>()?;
    let namespace = optional_term(wrapper, args.namespace)?;

    let mut descriptor = wrapper.new_descriptor(
        namespace.as_ref(),
        args.lid,
        args.symbol,
        data_type,
        args.name,
    )?;
    descriptor.set_data_kinds(kinds.into_iter().collect())?;
    wrapper.store_descriptor(&mut descriptor)?;
    Ok(Value::Object(descriptor.record()))
}

/// Look a descriptor up by key, then by symbol.
pub fn cmd_descriptor_get(wrapper: &Wrapper, key: &str) -> Result<Value, OntobaseError> {
    Ok(Value::Object(find_descriptor(wrapper, key)?.record()))
}

pub fn cmd_descriptor_delete(wrapper: &Wrapper, key: &str) -> Result<Value, OntobaseError> {
    let mut descriptor = find_descriptor(wrapper, key)?;
    let deleted = wrapper.delete_descriptor(&mut descriptor)?;
    Ok(json!({ "key": key, "deleted": deleted }))
}

// =============================================================================
// RELATE COMMAND
// =============================================================================

fn parse_handle(offset: &str, id: &str) -> Result<DocumentHandle, OntobaseError> {
    DocumentHandle::parse(id).ok_or_else(|| {
        OntobaseError::invalid_value(offset, format!("expected collection/key, got '{}'", id))
    })
}

/// Store a predicate edge from `from` to `to` in the edge collection `collection`.
pub fn cmd_relate(
    wrapper: &Wrapper,
    predicate: &str,
    from: &str,
    to: &str,
    collection: &str,
) -> Result<Value, OntobaseError> {
    let term = require_term(wrapper, predicate)?;
    let source = parse_handle(offsets::FROM, from)?;
    let destination = parse_handle(offsets::TO, to)?;

    let edges = wrapper.new_collection(
        collection,
        &Options {
            kind: Some(CollectionKind::Edge),
            ..Options::default()
        },
    )?;
    if edges.kind() != CollectionKind::Edge {
        return Err(OntobaseError::InvalidOption(format!(
            "collection '{}' is not an edge collection",
            collection
        )));
    }

    let mut relation = Predicate::new_predicate(&edges, &term, &source, &destination, Record::new())?;
    relation.store()?;
    Ok(Value::Object(relation.record()))
}

// =============================================================================
// TEXT RENDERING
// =============================================================================

/// Render a report as indented `key: value` lines.
pub fn render_text(report: &Value) -> String {
    let mut out = String::new();
    render_into(&mut out, report, 0);
    out
}

fn render_into(out: &mut String, value: &Value, depth: usize) {
    let indent = "  ".repeat(depth);
    match value {
        Value::Object(map) => {
            for (key, item) in map {
                if is_nested(item) {
                    out.push_str(&format!("{}{}:\n", indent, key));
                    render_into(out, item, depth + 1);
                } else {
                    out.push_str(&format!("{}{}: {}\n", indent, key, scalar(item)));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                if is_nested(item) {
                    out.push_str(&format!("{}-\n", indent));
                    render_into(out, item, depth + 1);
                } else {
                    out.push_str(&format!("{}- {}\n", indent, scalar(item)));
                }
            }
        }
        other => out.push_str(&format!("{}{}\n", indent, scalar(other))),
    }
}

fn is_nested(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
