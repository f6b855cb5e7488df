//! Configuration file support for the engine.
//!
//! Config files are loaded in order (later overrides earlier):
//! 1. `~/.config/tracker-engine/config.toml` (user defaults)
//! 2. `.tracker-engine.toml` in the working directory (project overrides)
//!
//! Caller-supplied `EngineOptions` override all config file values.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration options loaded from config files.
///
/// Every field is `Option` so a layer that doesn't mention a key can be
/// told apart from one that sets it to its default value — `override_with`
/// needs that distinction to merge layers field-by-field.
///
/// # Example
///
/// ```toml
/// # ~/.config/tracker-engine/config.toml or .tracker-engine.toml
/// min_index_bucket_count = 1024
/// max_index_bucket_count = 1048576
/// index_bucket_ratio = 2.0
/// statement_cache_size = 128
/// max_index_file_size = 4294967296
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum bucket count the inverted index will ever shrink to.
    pub min_index_bucket_count: Option<u32>,
    /// Maximum bucket count; `optimize()` never grows past this.
    pub max_index_bucket_count: Option<u32>,
    /// Target buckets-per-record ratio used by `get_preferred_bucket_count`.
    pub index_bucket_ratio: Option<f32>,
    /// Size of the prepared-statement LRU cache, per sublist (SELECT/UPDATE).
    pub statement_cache_size: Option<usize>,
    /// Refuse further indexing once the posting file exceeds this size.
    pub max_index_file_size: Option<u64>,
    /// Minimum term length kept by the term parser.
    pub min_term_length: Option<usize>,
    /// Maximum term length kept by the term parser.
    pub max_term_length: Option<usize>,
    /// Index pure-digit terms at least this long (`0` disables numeric indexing).
    pub min_numeric_term_length: Option<usize>,
    /// Enable stemming for alphabetic terms.
    pub enable_stemming: Option<bool>,
}

impl Config {
    /// Load configuration from user and project config files, falling back
    /// to defaults when neither is present or parseable.
    pub fn load(project_root: &Path) -> Self {
        let user_config = dirs::config_dir()
            .map(|d| d.join("tracker-engine/config.toml"))
            .and_then(|p| Self::load_file(&p))
            .unwrap_or_default();

        let project_config =
            Self::load_file(&project_root.join(".tracker-engine.toml")).unwrap_or_default();

        let merged = user_config.override_with(project_config);

        tracing::debug!(
            min_buckets = ?merged.min_index_bucket_count,
            max_buckets = ?merged.max_index_bucket_count,
            bucket_ratio = ?merged.index_bucket_ratio,
            "Effective config after merge"
        );
        merged
    }

    fn load_file(path: &Path) -> Option<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("Failed to read config {}: {}", path.display(), e);
                return None;
            }
        };

        match toml::from_str::<Self>(&content) {
            Ok(config) => {
                tracing::debug!(path = %path.display(), "Loaded config");
                Some(config)
            }
            Err(e) => {
                tracing::warn!("Failed to parse config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Layer another config on top (other overrides self field-by-field;
    /// a field absent from `other`'s TOML source falls back to `self`).
    fn override_with(self, other: Self) -> Self {
        Config {
            min_index_bucket_count: other.min_index_bucket_count.or(self.min_index_bucket_count),
            max_index_bucket_count: other.max_index_bucket_count.or(self.max_index_bucket_count),
            index_bucket_ratio: other.index_bucket_ratio.or(self.index_bucket_ratio),
            statement_cache_size: other.statement_cache_size.or(self.statement_cache_size),
            max_index_file_size: other.max_index_file_size.or(self.max_index_file_size),
            min_term_length: other.min_term_length.or(self.min_term_length),
            max_term_length: other.max_term_length.or(self.max_term_length),
            min_numeric_term_length: other
                .min_numeric_term_length
                .or(self.min_numeric_term_length),
            enable_stemming: other.enable_stemming.or(self.enable_stemming),
        }
    }

    // ===== Accessors with defaults =====

    pub const DEFAULT_MIN_BUCKETS: u32 = 1024;
    pub const DEFAULT_MAX_BUCKETS: u32 = 1 << 20;
    pub const DEFAULT_BUCKET_RATIO: f32 = 2.0;
    pub const DEFAULT_STATEMENT_CACHE_SIZE: usize = 128;
    /// 4 GiB, mirrors the original's db-size refusal threshold.
    pub const DEFAULT_MAX_INDEX_FILE_SIZE: u64 = 4 * 1024 * 1024 * 1024;
    pub const DEFAULT_MIN_TERM_LENGTH: usize = 3;
    pub const DEFAULT_MAX_TERM_LENGTH: usize = 30;
    pub const DEFAULT_MIN_NUMERIC_TERM_LENGTH: usize = 5;

    pub fn min_index_bucket_count_or_default(&self) -> u32 {
        self.min_index_bucket_count.unwrap_or(Self::DEFAULT_MIN_BUCKETS)
    }

    pub fn max_index_bucket_count_or_default(&self) -> u32 {
        self.max_index_bucket_count.unwrap_or(Self::DEFAULT_MAX_BUCKETS)
    }

    pub fn index_bucket_ratio_or_default(&self) -> f32 {
        self.index_bucket_ratio.unwrap_or(Self::DEFAULT_BUCKET_RATIO)
    }

    pub fn statement_cache_size_or_default(&self) -> usize {
        self.statement_cache_size
            .unwrap_or(Self::DEFAULT_STATEMENT_CACHE_SIZE)
    }

    pub fn max_index_file_size_or_default(&self) -> u64 {
        self.max_index_file_size
            .unwrap_or(Self::DEFAULT_MAX_INDEX_FILE_SIZE)
    }

    pub fn min_term_length_or_default(&self) -> usize {
        self.min_term_length.unwrap_or(Self::DEFAULT_MIN_TERM_LENGTH)
    }

    pub fn max_term_length_or_default(&self) -> usize {
        self.max_term_length.unwrap_or(Self::DEFAULT_MAX_TERM_LENGTH)
    }

    pub fn min_numeric_term_length_or_default(&self) -> usize {
        self.min_numeric_term_length
            .unwrap_or(Self::DEFAULT_MIN_NUMERIC_TERM_LENGTH)
    }

    pub fn enable_stemming_or_default(&self) -> bool {
        self.enable_stemming.unwrap_or(true)
    }
}

/// Resolve the default database file path for a project root.
pub fn default_db_path(project_root: &Path) -> PathBuf {
    project_root.join(".tracker-engine").join("meta.db")
}

/// Resolve the default inverted-index file path for a project root.
pub fn default_index_path(project_root: &Path) -> PathBuf {
    project_root.join(".tracker-engine").join("word-index.db")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_file_missing_returns_none() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load_file(&dir.path().join("nonexistent.toml")).is_none());
    }

    #[test]
    fn load_file_malformed_returns_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".tracker-engine.toml");
        std::fs::write(&path, "not valid [[[").unwrap();
        assert!(Config::load_file(&path).is_none());
    }

    #[test]
    fn override_with_keeps_user_fields_absent_from_project() {
        let user = Config {
            min_index_bucket_count: Some(2048),
            statement_cache_size: Some(64),
            ..Default::default()
        };
        let project = Config {
            statement_cache_size: Some(256),
            ..Default::default()
        };

        let merged = user.override_with(project);
        assert_eq!(merged.min_index_bucket_count, Some(2048));
        assert_eq!(merged.statement_cache_size, Some(256));
    }

    #[test]
    fn unset_fields_fall_back_to_defaults() {
        let config = Config::default();
        assert_eq!(
            config.min_index_bucket_count_or_default(),
            Config::DEFAULT_MIN_BUCKETS
        );
        assert!(config.enable_stemming_or_default());
    }
}
