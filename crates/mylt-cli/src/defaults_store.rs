//! Persisted default values
//!
//! Stores key/value defaults for the tunnel client in a single JSON document
//! (`defaults.json`) that is rewritten atomically on every mutation.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// File name of the defaults document inside the store directory
pub const STORE_FILE: &str = "defaults.json";

/// Directory holding the store, next to the installed executable
pub const STORE_DIR_NAME: &str = ".storage";

/// Key written by `mylt trust`
pub const TRUST_KEY: &str = "trust";

/// Key written by the default-host setter
pub const HOST_KEY: &str = "host";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read defaults file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write defaults file {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse defaults file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid key '{0}': keys must be non-empty, contain no whitespace and not start with '-'")]
    InvalidKey(String),
}

/// Default store directory: `.storage` beside the running executable
pub fn default_store_dir() -> std::io::Result<PathBuf> {
    let exe = std::env::current_exe()?;
    let install_dir = exe.parent().map(Path::to_path_buf).unwrap_or_default();
    Ok(install_dir.join(STORE_DIR_NAME))
}

/// A single persisted default
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    entries: Vec<ConfigEntry>,
}

/// Defaults store backed by `<base_dir>/defaults.json`
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    entries: Vec<ConfigEntry>,
}

impl ConfigStore {
    /// Open the store rooted at `base_dir`, loading any existing defaults.
    ///
    /// A missing file is an empty store. The directory itself is only created
    /// on the first write.
    pub fn open(base_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = base_dir.as_ref().join(STORE_FILE);

        let entries = match fs::read_to_string(&path) {
            Ok(json) => {
                let doc: StoreDocument =
                    serde_json::from_str(&json).map_err(|source| StoreError::Parse {
                        path: path.clone(),
                        source,
                    })?;
                doc.entries
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(source) => return Err(StoreError::Read { path, source }),
        };

        debug!(path = %path.display(), entries = entries.len(), "Loaded defaults store");

        Ok(Self { path, entries })
    }

    /// Path of the backing file (for display purposes)
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Create or overwrite `key`. The change is on disk before this returns.
    ///
    /// Overwriting keeps the key's original position in iteration order.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        Self::validate_key(key)?;

        let mut next = self.entries.clone();
        match next.iter_mut().find(|e| e.key == key) {
            Some(entry) => entry.value = value.to_string(),
            None => next.push(ConfigEntry {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }

        self.persist(&next)?;
        self.entries = next;
        Ok(())
    }

    /// Remove `key`. Returns whether it was present; removing an absent key
    /// is not an error and does not touch the file.
    pub fn unset(&mut self, key: &str) -> Result<bool, StoreError> {
        if !self.entries.iter().any(|e| e.key == key) {
            return Ok(false);
        }

        let next: Vec<ConfigEntry> = self
            .entries
            .iter()
            .filter(|e| e.key != key)
            .cloned()
            .collect();

        self.persist(&next)?;
        self.entries = next;
        Ok(true)
    }

    /// Trust self-signed certificates by default
    pub fn trust(&mut self) -> Result<(), StoreError> {
        self.set(TRUST_KEY, "true")
    }

    /// Persist the default tunnel server host
    pub fn set_default_host(&mut self, host: &str) -> Result<(), StoreError> {
        self.set(HOST_KEY, host)
    }

    /// Iterate over `(key, value)` pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries
            .iter()
            .map(|e| (e.key.as_str(), e.value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn validate_key(key: &str) -> Result<(), StoreError> {
        if key.is_empty() || key.starts_with('-') || key.chars().any(char::is_whitespace) {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(())
    }

    /// Write `entries` to a sibling temp file, fsync it, then rename it over
    /// the store file.
    fn persist(&self, entries: &[ConfigEntry]) -> Result<(), StoreError> {
        let write_err = |source: std::io::Error| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let doc = StoreDocument {
            entries: entries.to_vec(),
        };
        let json = serde_json::to_string_pretty(&doc)
            .map_err(|e| write_err(std::io::Error::other(e)))?;

        let tmp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path).map_err(write_err)?;
            file.write_all(json.as_bytes()).map_err(write_err)?;
            file.sync_all().map_err(write_err)?;
        }
        fs::rename(&tmp_path, &self.path).map_err(write_err)?;

        debug!(path = %self.path.display(), entries = entries.len(), "Saved defaults store");
        Ok(())
    }
}
