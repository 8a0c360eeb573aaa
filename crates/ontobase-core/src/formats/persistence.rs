//! # Server Image Format
//!
//! Binary serialization of a [`Server`](crate::Server): its data source and
//! whether it was connected. The native connection itself is never part of
//! the image.
//!
//! Format: Header (5 bytes) + postcard-serialized [`ServerImage`].
//! - 4 bytes: Magic ("ONTB")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded.

use crate::{DataSource, OntobaseError, primitives};
use serde::{Deserialize, Serialize};

/// Maximum accepted image size. Images hold connection coordinates only.
pub const MAX_IMAGE_SIZE: usize = 64 * 1024;

/// Length of the header.
const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header preceding every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    pub fn validate(&self) -> Result<(), OntobaseError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(OntobaseError::SerializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(OntobaseError::SerializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, OntobaseError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(OntobaseError::SerializationError(
                "Header too short".to_string(),
            ));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[0..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// IMAGE
// =============================================================================

/// What a frozen server remembers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerImage {
    pub source: DataSource,
    pub was_connected: bool,
}

/// Serialize an image (header + payload).
pub fn image_to_bytes(image: &ServerImage) -> Result<Vec<u8>, OntobaseError> {
    let payload =
        postcard::to_stdvec(image).map_err(|e| OntobaseError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_SIZE + payload.len());
    result.extend_from_slice(&PersistenceHeader::new().to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize an image, validating size and header first.
pub fn image_from_bytes(bytes: &[u8]) -> Result<ServerImage, OntobaseError> {
    if bytes.len() > MAX_IMAGE_SIZE {
        return Err(OntobaseError::SerializationError(format!(
            "Image size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_IMAGE_SIZE
        )));
    }

    let header = PersistenceHeader::from_bytes(bytes)?;
    header.validate()?;

    postcard::from_bytes(&bytes[HEADER_SIZE..]).map_err(|e| {
        OntobaseError::SerializationError(format!("Failed to deserialize server image: {}", e))
    })
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> ServerImage {
        ServerImage {
            source: DataSource::parse("redb://alice:pw@localhost:9/db?dir=data").expect("parse"),
            was_connected: true,
        }
    }

    #[test]
    fn image_survives_bytes() {
        let bytes = image_to_bytes(&image()).expect("serialize");
        assert_eq!(&bytes[0..4], primitives::MAGIC_BYTES);
        assert_eq!(image_from_bytes(&bytes).expect("deserialize"), image());
    }

    #[test]
    fn serialization_is_deterministic() {
        let first = image_to_bytes(&image()).expect("first");
        let second = image_to_bytes(&image_from_bytes(&first).expect("decode")).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = image_to_bytes(&image()).expect("serialize");
        bytes[0..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            image_from_bytes(&bytes),
            Err(OntobaseError::SerializationError(_))
        ));
    }

    #[test]
    fn truncated_image_rejected() {
        assert!(image_from_bytes(b"ONT").is_err());
        let bytes = image_to_bytes(&image()).expect("serialize");
        assert!(image_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }

    #[test]
    fn future_version_rejected() {
        let mut bytes = image_to_bytes(&image()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(image_from_bytes(&bytes).is_err());
    }
}
