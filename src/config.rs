//! Instance configuration
//!
//! Loaded from a JSON file with [`OakConfig::load`] or built in code. Every
//! field except `path` has a default.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{OakError, OakResult};
use crate::query::QueryLimits;
use crate::store::MEMORY_PATH;

/// Configuration of one Oak instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OakConfig {
    /// Database file, or `:memory:` (required)
    pub path: String,

    /// fsync after every commit (default: true)
    #[serde(default = "default_sync_on_commit")]
    pub sync_on_commit: bool,

    /// Length of generated keys (default: 12)
    #[serde(default = "default_key_length")]
    pub key_length: usize,

    /// Default page size for fetch (default: 1000)
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,

    /// Default page size for search (default: 10)
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Default page size for similar (default: 3)
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,

    /// Installs the built-in hashing embedder with this many dimensions
    #[serde(default)]
    pub hashing_embedder_dims: Option<usize>,
}

fn default_sync_on_commit() -> bool {
    true
}
fn default_key_length() -> usize {
    12
}
fn default_fetch_limit() -> usize {
    1000
}
fn default_search_limit() -> usize {
    10
}
fn default_similar_limit() -> usize {
    3
}

impl OakConfig {
    /// Defaults for a database at `path`
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            sync_on_commit: default_sync_on_commit(),
            key_length: default_key_length(),
            fetch_limit: default_fetch_limit(),
            search_limit: default_search_limit(),
            similar_limit: default_similar_limit(),
            hashing_embedder_dims: None,
        }
    }

    /// Defaults for a volatile database
    pub fn in_memory() -> Self {
        Self::new(MEMORY_PATH)
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> OakResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| OakError::Config(format!("Failed to read config: {}", e)))?;

        let config: OakConfig = serde_json::from_str(&content)
            .map_err(|e| OakError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> OakResult<()> {
        if self.path.trim().is_empty() {
            return Err(OakError::Config("path must not be empty".into()));
        }
        for (name, value) in [
            ("key_length", self.key_length),
            ("fetch_limit", self.fetch_limit),
            ("search_limit", self.search_limit),
            ("similar_limit", self.similar_limit),
        ] {
            if value == 0 {
                return Err(OakError::Config(format!("{} must be > 0", name)));
            }
        }
        if self.hashing_embedder_dims == Some(0) {
            return Err(OakError::Config("hashing_embedder_dims must be > 0".into()));
        }
        Ok(())
    }

    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            fetch: self.fetch_limit,
            search: self.search_limit,
            similar: self.similar_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_applies_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"path": "data/oak.db", "search_limit": 25}}"#).unwrap();

        let config = OakConfig::load(file.path()).unwrap();
        assert_eq!(config.path, "data/oak.db");
        assert!(config.sync_on_commit);
        assert_eq!(config.key_length, 12);
        assert_eq!(config.search_limit, 25);
        assert_eq!(config.limits().similar, 3);
        assert_eq!(config.hashing_embedder_dims, None);
    }

    #[test]
    fn test_validate_rejects_zeros_and_empty_path() {
        let mut config = OakConfig::in_memory();
        assert!(config.validate().is_ok());

        config.fetch_limit = 0;
        assert_eq!(config.validate().unwrap_err().code(), "OAK_CONFIG_INVALID");

        let mut config = OakConfig::new("  ");
        assert!(config.validate().is_err());
        config.path = "x.db".into();
        config.hashing_embedder_dims = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_path_is_invalid_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"key_length": 8}}"#).unwrap();
        let err = OakConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid config JSON"));
    }
}
