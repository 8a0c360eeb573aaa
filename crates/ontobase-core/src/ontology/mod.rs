//! # Ontology
//!
//! The data dictionary built on top of documents:
//! - [`Term`]: namespaced concepts with composed global identifiers
//! - [`Descriptor`]: terms that define typed data fields
//! - [`Edge`], [`Predicate`], [`Node`]: the directed-graph model
//! - [`Wrapper`]: the database owning and bootstrapping it all

pub mod descriptor;
pub mod graph;
pub mod reference;
pub mod term;
pub mod vocabulary;
pub mod wrapper;

pub use descriptor::{DataKind, DataType, Descriptor};
pub use graph::{Edge, Node, NodeKind, Predicate, Relation};
pub use reference::{Reference, Resolvable};
pub use term::{Term, compose_gid, key_for_gid};
pub use wrapper::{Wrapper, WrapperState};
