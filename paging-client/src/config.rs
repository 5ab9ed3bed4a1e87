//! Configuration for a pager.
//!
//! Configuration is usually built in code, but can also be loaded from a
//! TOML file:
//!
//! ```toml
//! page_size = 30
//! initial_page_size = 60
//! skip_empty_page_with_next_key = true
//! auto_retry_append_failure = false
//! append_prefetch = { item_count = 5 }
//! ```

use pagekit_core::FetchPolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// When an item becoming visible triggers an append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendPrefetch {
    /// Only when the last item becomes visible.
    None,
    /// Half a page before the end.
    #[default]
    Default,
    /// This many items before the end.
    ItemCount(usize),
}

/// Pager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PagingConfig {
    /// Items requested per append (default: 20).
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Items requested by refresh (default: `page_size`).
    #[serde(default)]
    pub initial_page_size: Option<usize>,
    /// Skip an empty page that still names a next key (default: true).
    /// When off, such a page fails the load.
    #[serde(default = "default_true")]
    pub skip_empty_page_with_next_key: bool,
    /// Let the next append trigger re-enter a failed append (default: true).
    #[serde(default = "default_true")]
    pub auto_retry_append_failure: bool,
    /// Append trigger distance from the end of the list.
    #[serde(default)]
    pub append_prefetch: AppendPrefetch,
    /// Consecutive empty pages one load may skip (default: 64).
    #[serde(default = "default_max_empty_page_skips")]
    pub max_empty_page_skips: u32,
}

// Default value functions
fn default_page_size() -> usize {
    20
}

fn default_true() -> bool {
    true
}

fn default_max_empty_page_skips() -> u32 {
    64
}

impl Default for PagingConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            initial_page_size: None,
            skip_empty_page_with_next_key: true,
            auto_retry_append_failure: true,
            append_prefetch: AppendPrefetch::Default,
            max_empty_page_skips: default_max_empty_page_skips(),
        }
    }
}

impl PagingConfig {
    /// Parse configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this config or
    /// the values fail [`PagingConfig::validate`].
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Set the append page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the refresh page size.
    pub fn with_initial_page_size(mut self, initial_page_size: usize) -> Self {
        self.initial_page_size = Some(initial_page_size);
        self
    }

    /// Enable or disable empty-page skipping.
    pub fn with_skip_empty_page_with_next_key(mut self, skip: bool) -> Self {
        self.skip_empty_page_with_next_key = skip;
        self
    }

    /// Enable or disable append auto-retry.
    pub fn with_auto_retry_append_failure(mut self, auto_retry: bool) -> Self {
        self.auto_retry_append_failure = auto_retry;
        self
    }

    /// Set the append trigger distance.
    pub fn with_append_prefetch(mut self, prefetch: AppendPrefetch) -> Self {
        self.append_prefetch = prefetch;
        self
    }

    /// Set the empty-page skip bound.
    pub fn with_max_empty_page_skips(mut self, max: u32) -> Self {
        self.max_empty_page_skips = max;
        self
    }

    /// Check that page sizes are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::Invalid("page_size must be positive".into()));
        }
        if self.initial_page_size == Some(0) {
            return Err(ConfigError::Invalid(
                "initial_page_size must be positive".into(),
            ));
        }
        Ok(())
    }

    /// The fetch policy sessions run with.
    pub fn fetch_policy(&self) -> FetchPolicy {
        FetchPolicy {
            page_size: self.page_size,
            initial_page_size: self.initial_page_size,
            skip_empty_page_with_next_key: self.skip_empty_page_with_next_key,
            auto_retry_append_failure: self.auto_retry_append_failure,
            max_empty_page_skips: self.max_empty_page_skips,
        }
    }

    /// Items between the trigger position and the last item.
    pub fn prefetch_distance(&self) -> usize {
        match self.append_prefetch {
            AppendPrefetch::None => 0,
            AppendPrefetch::Default => self.page_size / 2,
            AppendPrefetch::ItemCount(count) => count,
        }
    }

    /// Whether `index` becoming visible in a list of `len` items should
    /// trigger an append.
    pub fn should_append(&self, index: usize, len: usize) -> bool {
        len > 0 && index.saturating_add(self.prefetch_distance()) + 1 >= len
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The configuration parsed but cannot be used.
    #[error("invalid config: {0}")]
    Invalid(String),
}
