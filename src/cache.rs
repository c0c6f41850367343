//! Expiring key-value cache for external API responses.
//!
//! Author paper lists (`pubs:<member id>`) and DOI enrichment results
//! (`doi:<doi>`) are kept in a JSON file so repeated runs do not hit
//! Semantic Scholar or Crossref again until the entries expire.

use crate::error::{LabsiteError, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Default time-to-live for cached entries.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// Default cache file path: `<cache dir>/labsite/cache.json`
pub fn default_cache_path() -> Result<PathBuf> {
    dirs::cache_dir()
        .map(|p| p.join("labsite").join("cache.json"))
        .ok_or_else(|| LabsiteError::Config("Cannot determine cache directory".to_string()))
}

/// Cache key for a member's fetched publication list.
pub fn member_key(member_id: &str) -> String {
    format!("pubs:{}", member_id)
}

/// Cache key for DOI enrichment data.
pub fn doi_key(doi: &str) -> String {
    format!("doi:{}", doi.trim().to_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    value: Value,
    stored_at: DateTime<Utc>,
}

/// JSON-file backed cache with a fixed time-to-live.
pub struct ExpiringCache {
    path: PathBuf,
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ExpiringCache {
    /// Open the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: PathBuf, ttl: Duration) -> Self {
        let entries = load_entries(&path);
        Self {
            path,
            ttl,
            entries: Mutex::new(entries),
        }
    }

    /// Open the cache at the default location.
    pub fn open_default(ttl: Duration) -> Result<Self> {
        Ok(Self::open(default_cache_path()?, ttl))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live entry.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_at(key, Utc::now())
    }

    fn get_at<T: DeserializeOwned>(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let entries = self.entries.lock().ok()?;
        let entry = entries.get(key)?;
        if now - entry.stored_at >= self.ttl {
            debug!(key = key, "Cache entry expired");
            return None;
        }
        match serde_json::from_value(entry.value.clone()) {
            Ok(value) => {
                debug!(key = key, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key = key, error = %e, "Cache entry has unexpected shape");
                None
            }
        }
    }

    /// Store a value, stamped with the current time.
    pub fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        self.put_at(key, value, Utc::now())
    }

    fn put_at<T: Serialize>(&self, key: &str, value: &T, now: DateTime<Utc>) -> Result<()> {
        let value = serde_json::to_value(value)?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| LabsiteError::Config("cache lock poisoned".to_string()))?;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                stored_at: now,
            },
        );
        Ok(())
    }

    /// Number of entries held, expired or not.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write live entries back to disk, dropping expired ones.
    pub fn save(&self) -> Result<()> {
        let now = Utc::now();
        let content = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| LabsiteError::Config("cache lock poisoned".to_string()))?;
            entries.retain(|_, entry| now - entry.stored_at < self.ttl);
            serde_json::to_string_pretty(&*entries)?
        };

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        debug!(path = ?self.path, "Saved cache");
        Ok(())
    }

    /// Remove all entries and the cache file.
    pub fn clear(&self) -> Result<()> {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
        if self.path.exists() {
            std::fs::remove_file(&self.path)?;
            info!("Cleared cache at {:?}", self.path);
        }
        Ok(())
    }
}

fn load_entries(path: &Path) -> HashMap<String, CacheEntry> {
    if !path.exists() {
        debug!("Cache file not found: {:?}", path);
        return HashMap::new();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to parse cache file: {}", e);
                HashMap::new()
            }
        },
        Err(e) => {
            warn!("Failed to read cache file: {}", e);
            HashMap::new()
        }
    }
}
