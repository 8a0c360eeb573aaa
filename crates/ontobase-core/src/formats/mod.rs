//! # Formats
//!
//! Binary images of framework state. File I/O belongs to callers.

pub mod persistence;

pub use persistence::{
    MAX_IMAGE_SIZE, PersistenceHeader, ServerImage, image_from_bytes, image_to_bytes,
};
