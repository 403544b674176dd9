//! Bundled install-time resources
//!
//! Config templates and small data files ship in an `installed_files`
//! directory next to the configuration. When that directory is missing (or
//! lacks a file) the same relative path is fetched from a remote checkout.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ProvisionError, Result};

/// Remote checkout used when no bundled copy exists
pub const DEFAULT_RESOURCE_URL: &str = "https://raw.github.com/chapmanb/cloudbiolinux/master/";

/// Where templates and data files are loaded from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStore {
    bundled: Option<PathBuf>,
    remote_base: String,
}

impl Default for ResourceStore {
    fn default() -> Self {
        Self::remote(DEFAULT_RESOURCE_URL)
    }
}

impl ResourceStore {
    /// A store backed by a local `installed_files` directory with remote fallback
    pub fn new(bundled: impl Into<PathBuf>, remote_base: impl Into<String>) -> Self {
        Self {
            bundled: Some(bundled.into()),
            remote_base: remote_base.into(),
        }
    }

    /// A store with no bundled directory
    pub fn remote(remote_base: impl Into<String>) -> Self {
        Self {
            bundled: None,
            remote_base: remote_base.into(),
        }
    }

    /// The bundled directory, if configured
    pub fn bundled_dir(&self) -> Option<&Path> {
        self.bundled.as_deref()
    }

    /// Local path of `name` if it is bundled
    pub fn bundled_path(&self, name: &str) -> Option<PathBuf> {
        self.bundled
            .as_ref()
            .map(|dir| dir.join(name))
            .filter(|path| path.is_file())
    }

    /// URL `name` is fetched from when not bundled
    pub fn remote_url(&self, name: &str) -> String {
        format!(
            "{}/installed_files/{}",
            self.remote_base.trim_end_matches('/'),
            name
        )
    }

    /// Read `name`, falling back to the remote copy
    pub fn read(&self, name: &str) -> Result<String> {
        if let Some(path) = self.bundled_path(name) {
            debug!("Using bundled resource {}", path.display());
            return Ok(std::fs::read_to_string(path)?);
        }

        let url = self.remote_url(name);
        debug!("Fetching resource {}", url);
        let response = reqwest::blocking::get(&url)?;
        if !response.status().is_success() {
            return Err(ProvisionError::resource(
                name,
                format!("GET {} returned {}", url, response.status()),
            ));
        }
        Ok(response.text()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_url_joins_cleanly() {
        let store = ResourceStore::default();
        assert_eq!(
            store.remote_url("nginx.conf.template"),
            "https://raw.github.com/chapmanb/cloudbiolinux/master/installed_files/nginx.conf.template"
        );

        let store = ResourceStore::remote("http://mirror.local/cbl");
        assert_eq!(store.remote_url("a/b.txt"), "http://mirror.local/cbl/installed_files/a/b.txt");
    }

    #[test]
    fn test_bundled_resources_are_read_locally() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("motd"), "welcome\n").unwrap();
        let store = ResourceStore::new(dir.path(), "http://unused.invalid/");

        assert!(store.bundled_path("motd").is_some());
        assert!(store.bundled_path("absent").is_none());
        assert_eq!(store.read("motd").unwrap(), "welcome\n");
    }
}
