// src/key/cache.rs
// =============================================================================
// This module persists IndexNow keys between runs.
//
// Storage format:
// - One JSON object mapping host names to key tokens
// - Lives at a fixed per-user location (~/.config/indexnow-submitter/keys.json)
//
// The store is append/update-only from this program's point of view: keys
// are written after successful acquisition and never deleted here.
// =============================================================================

use anyhow::{anyhow, Context, Result};
use log::debug;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

// Anything that can look up and persist a key for a host
//
// Production uses FileKeyStore; tests use MemoryKeyStore so no run ever
// touches the developer's real cache file.
pub trait KeyStore {
    /// Returns the cached key for a host, if one exists (exact host match)
    fn load(&self, host: &str) -> Option<String>;

    /// Persists a key for a host, overwriting any previous entry
    fn save(&mut self, host: &str, key: &str) -> Result<()>;
}

// A key store backed by one JSON file
pub struct FileKeyStore {
    path: PathBuf,
    keys: HashMap<String, String>,
}

impl FileKeyStore {
    // Opens the store at the default per-user location
    //
    // The file does not have to exist yet; an empty store is returned and
    // the file is created on the first save.
    pub fn open_default() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| anyhow!("could not determine a per-user config directory"))?;
        Self::open(base.join("indexnow-submitter").join("keys.json"))
    }

    // Opens the store at an explicit path (used by tests)
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let keys = Self::read_map(&path)?;
        debug!("key cache at {} holds {} entries", path.display(), keys.len());
        Ok(FileKeyStore { path, keys })
    }

    fn read_map(path: &Path) -> Result<HashMap<String, String>> {
        if !path.exists() {
            return Ok(HashMap::new());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading key cache {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("parsing key cache {}", path.display()))
    }
}

impl KeyStore for FileKeyStore {
    fn load(&self, host: &str) -> Option<String> {
        self.keys.get(host).cloned()
    }

    fn save(&mut self, host: &str, key: &str) -> Result<()> {
        self.keys.insert(host.to_string(), key.to_string());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(&self.keys)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("writing key cache {}", self.path.display()))?;
        Ok(())
    }
}

// In-memory store for tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryKeyStore {
    keys: HashMap<String, String>,
}

#[cfg(test)]
impl KeyStore for MemoryKeyStore {
    fn load(&self, host: &str) -> Option<String> {
        self.keys.get(host).cloned()
    }

    fn save(&mut self, host: &str, key: &str) -> Result<()> {
        self.keys.insert(host.to_string(), key.to_string());
        Ok(())
    }
}
