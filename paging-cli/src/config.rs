//! Configuration loading for pagekit.

use anyhow::{Context, Result};
use pagekit_client::PagingConfig;
use std::path::Path;

/// Load the paging configuration, falling back to defaults without a file.
pub fn load(path: Option<&Path>) -> Result<PagingConfig> {
    match path {
        Some(path) => PagingConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(PagingConfig::default()),
    }
}

/// Render a configuration as TOML.
pub fn render(config: &PagingConfig) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagekit_client::AppendPrefetch;
    use tempfile::tempdir;

    #[test]
    fn defaults_without_file() {
        let config = load(None).unwrap();
        assert_eq!(config, PagingConfig::default());
    }

    #[test]
    fn loads_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paging.toml");
        std::fs::write(&path, "page_size = 7\nappend_prefetch = \"none\"\n").unwrap();

        let config = load(Some(&path)).unwrap();

        assert_eq!(config.page_size, 7);
        assert_eq!(config.append_prefetch, AppendPrefetch::None);
    }

    #[test]
    fn missing_file_names_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");

        let err = load(Some(&path)).unwrap_err();

        assert!(format!("{:#}", err).contains("missing.toml"));
    }

    #[test]
    fn invalid_file_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("paging.toml");
        std::fs::write(&path, "page_size = 0\n").unwrap();

        assert!(load(Some(&path)).is_err());
    }

    #[test]
    fn render_round_trips() {
        let config = PagingConfig::default()
            .with_page_size(12)
            .with_append_prefetch(AppendPrefetch::ItemCount(3));

        let rendered = render(&config).unwrap();

        assert_eq!(PagingConfig::from_toml_str(&rendered).unwrap(), config);
    }
}
