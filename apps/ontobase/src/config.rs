//! # Configuration
//!
//! Settings are layered, later layers winning:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `ontobase.toml` in the working directory)
//! 3. the `ONTOBASE_SOURCE` environment variable
//! 4. command-line flags
//!
//! ```toml
//! source = "redb://localhost/ontology?dir=data"
//! database = "ontology"
//! buffer_size = 500
//! cache = "memory"
//! ```

use ontobase_core::primitives::DEFAULT_BUFFER_SIZE;
use ontobase_core::{CacheService, DataSource, MemoryCache, OntobaseError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// File looked up in the working directory when no `--config` is given.
pub const CONFIG_FILE: &str = "ontobase.toml";

/// Environment variable overriding the configured data source.
pub const SOURCE_ENV: &str = "ONTOBASE_SOURCE";

/// Data source used when nothing else is configured.
pub const DEFAULT_SOURCE: &str = "redb://localhost/ontology?dir=ontobase-data";

/// Database used when neither the config nor the source path names one.
pub const DEFAULT_DATABASE: &str = "ontology";

// =============================================================================
// CACHE SELECTION
// =============================================================================

/// Cache service backing the ontology wrapper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheKind {
    #[default]
    Memory,
}

impl CacheKind {
    /// Instantiate the selected cache service.
    pub fn build(self) -> Box<dyn CacheService> {
        match self {
            Self::Memory => Box::new(MemoryCache::new()),
        }
    }
}

// =============================================================================
// CONFIG
// =============================================================================

/// Resolved application settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Connection string of the backing store.
    pub source: String,
    /// Database holding the ontology. Falls back to the source path.
    pub database: Option<String>,
    /// Documents buffered per bulk write.
    pub buffer_size: usize,
    pub cache: CacheKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE.to_string(),
            database: None,
            buffer_size: DEFAULT_BUFFER_SIZE,
            cache: CacheKind::Memory,
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing keys take their defaults.
    pub fn from_toml(text: &str) -> Result<Self, OntobaseError> {
        toml::from_str(text)
            .map_err(|e| OntobaseError::SerializationError(format!("Invalid config: {}", e)))
    }

    /// Load the file layer.
    ///
    /// An explicit path must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, OntobaseError> {
        let path = match path {
            Some(path) => path,
            None if Path::new(CONFIG_FILE).is_file() => Path::new(CONFIG_FILE),
            None => {
                tracing::debug!("no config file, using defaults");
                return Ok(Self::default());
            }
        };
        tracing::debug!("reading config from {:?}", path);
        let text = std::fs::read_to_string(path).map_err(|e| {
            OntobaseError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Replace the source when `source` is set.
    #[must_use]
    pub fn with_source(mut self, source: Option<String>) -> Self {
        if let Some(source) = source {
            self.source = source;
        }
        self
    }

    /// Replace the database when `database` is set.
    #[must_use]
    pub fn with_database(mut self, database: Option<String>) -> Self {
        if database.is_some() {
            self.database = database;
        }
        self
    }

    /// Full resolution: file, then environment, then flags.
    pub fn resolve(
        path: Option<&Path>,
        source: Option<String>,
        database: Option<String>,
    ) -> Result<Self, OntobaseError> {
        let config = Self::load(path)?
            .with_source(std::env::var(SOURCE_ENV).ok())
            .with_source(source)
            .with_database(database);
        config.validate()?;
        Ok(config)
    }

    /// Check the source parses and the buffer is usable.
    pub fn validate(&self) -> Result<(), OntobaseError> {
        DataSource::parse(&self.source)?;
        if self.buffer_size == 0 {
            return Err(OntobaseError::InvalidOption(
                "buffer_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// The database to use: configured, else the first source path segment.
    pub fn database_name(&self) -> Result<String, OntobaseError> {
        if let Some(database) = &self.database {
            return Ok(database.clone());
        }
        let source = DataSource::parse(&self.source)?;
        Ok(source
            .path_segments()
            .first()
            .map_or_else(|| DEFAULT_DATABASE.to_string(), |segment| (*segment).to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_default() {
        assert_eq!(Config::from_toml("").expect("parse"), Config::default());
    }

    #[test]
    fn database_falls_back_to_source_path() {
        let config = Config::default().with_source(Some("memory://x/library".to_string()));
        assert_eq!(config.database_name().expect("name"), "library");

        let bare = Config::default().with_source(Some("memory://x".to_string()));
        assert_eq!(bare.database_name().expect("name"), DEFAULT_DATABASE);

        let explicit = config.with_database(Some("other".to_string()));
        assert_eq!(explicit.database_name().expect("name"), "other");
    }

    #[test]
    fn unset_override_keeps_value() {
        let config = Config::default()
            .with_source(Some("memory://a".to_string()))
            .with_source(None);
        assert_eq!(config.source, "memory://a");
    }
}
