//! # ontobase
//!
//! The library half of the Ontobase binary: configuration layering and the
//! CLI commands, kept out of `main.rs` so they can be tested directly.

pub mod cli;
pub mod config;

pub use config::{CacheKind, Config};
