//! # Built-in Vocabulary
//!
//! The terms and descriptors seeded into every new data dictionary. All of
//! them live under the default namespace, so their GIDs (and keys) start with
//! the reserved `:` prefix.

use super::descriptor::{DataKind, DataType};
use super::graph::NodeKind;
use crate::primitives::offsets;

/// Namespaces under the default namespace: `(lid, name)`.
pub const NAMESPACES: &[(&str, &str)] = &[
    (PREDICATE_NAMESPACE, "Predicates"),
    (TYPE_NAMESPACE, "Data types"),
    (KIND_NAMESPACE, "Data kinds"),
    (NODE_NAMESPACE, "Node kinds"),
];

pub const PREDICATE_NAMESPACE: &str = "predicate";
pub const TYPE_NAMESPACE: &str = "type";
pub const KIND_NAMESPACE: &str = "kind";
pub const NODE_NAMESPACE: &str = "node";

/// Predicates in the predicate namespace: `(lid, name)`.
pub const PREDICATES: &[(&str, &str)] = &[
    ("enum-of", "Enumeration of"),
    ("subclass-of", "Subclass of"),
    ("property-of", "Property of"),
    ("type-of", "Type of"),
    ("instance-of", "Instance of"),
];

/// A descriptor of the ontology's own fields.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinDescriptor {
    pub lid: &'static str,
    pub symbol: &'static str,
    pub data_type: DataType,
    pub kinds: &'static [DataKind],
    pub name: &'static str,
}

pub const DESCRIPTORS: &[BuiltinDescriptor] = &[
    BuiltinDescriptor {
        lid: "lid",
        symbol: offsets::LID,
        data_type: DataType::String,
        kinds: &[DataKind::Discrete],
        name: "Local identifier",
    },
    BuiltinDescriptor {
        lid: "gid",
        symbol: offsets::GID,
        data_type: DataType::String,
        kinds: &[DataKind::Discrete],
        name: "Global identifier",
    },
    BuiltinDescriptor {
        lid: "nid",
        symbol: offsets::NAMESPACE,
        data_type: DataType::Reference,
        kinds: &[DataKind::Categorical],
        name: "Namespace",
    },
    BuiltinDescriptor {
        lid: "name",
        symbol: offsets::NAME,
        data_type: DataType::LangString,
        kinds: &[],
        name: "Name",
    },
    BuiltinDescriptor {
        lid: "descr",
        symbol: offsets::DESCRIPTION,
        data_type: DataType::LangString,
        kinds: &[],
        name: "Description",
    },
    BuiltinDescriptor {
        lid: "sym",
        symbol: offsets::SYMBOL,
        data_type: DataType::String,
        kinds: &[DataKind::Discrete],
        name: "Symbol",
    },
    BuiltinDescriptor {
        lid: "syn",
        symbol: offsets::SYNONYMS,
        data_type: DataType::Set,
        kinds: &[DataKind::Discrete],
        name: "Synonyms",
    },
    BuiltinDescriptor {
        lid: "type",
        symbol: offsets::DATA_TYPE,
        data_type: DataType::Enum,
        kinds: &[DataKind::Categorical],
        name: "Data type",
    },
    BuiltinDescriptor {
        lid: "kind",
        symbol: offsets::DATA_KIND,
        data_type: DataType::Set,
        kinds: &[DataKind::Categorical],
        name: "Data kind",
    },
    BuiltinDescriptor {
        lid: "ref-cnt",
        symbol: offsets::REF_COUNT,
        data_type: DataType::Integer,
        kinds: &[DataKind::Quantitative, DataKind::Private],
        name: "Reference count",
    },
    BuiltinDescriptor {
        lid: "node-kind",
        symbol: offsets::NODE_KIND,
        data_type: DataType::Enum,
        kinds: &[DataKind::Categorical],
        name: "Node kind",
    },
];

/// Enumerated terms per namespace: `(namespace lid, member lids)`.
#[must_use]
pub fn enumerations() -> Vec<(&'static str, Vec<&'static str>)> {
    vec![
        (
            TYPE_NAMESPACE,
            DataType::ALL.iter().map(|t| t.as_str()).collect(),
        ),
        (
            KIND_NAMESPACE,
            DataKind::ALL.iter().map(|k| k.as_str()).collect(),
        ),
        (
            NODE_NAMESPACE,
            NodeKind::ALL.iter().map(|k| k.as_str()).collect(),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn descriptor_symbols_are_unique() {
        let symbols: BTreeSet<&str> = DESCRIPTORS.iter().map(|d| d.symbol).collect();
        assert_eq!(symbols.len(), DESCRIPTORS.len());
    }

    #[test]
    fn enumerations_cover_every_variant() {
        let counts: Vec<usize> = enumerations().iter().map(|(_, lids)| lids.len()).collect();
        assert_eq!(counts, vec![DataType::ALL.len(), DataKind::ALL.len(), NodeKind::ALL.len()]);
    }
}
