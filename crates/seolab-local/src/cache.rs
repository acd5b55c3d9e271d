//! Content-addressed on-disk cache for generated text.

use crate::store::write_json_atomic;
use seolab_core::{Error, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Seven days.
pub const DEFAULT_TTL_S: u64 = 7 * 24 * 60 * 60;

fn epoch_s(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_secs()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    created_at: u64,
    ttl: u64,
    response: CachedResponse,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    prompt: &'a str,
    options: &'a serde_json::Value,
    model: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_files: usize,
    pub total_size_bytes: u64,
    pub oldest_timestamp: Option<u64>,
    pub newest_timestamp: Option<u64>,
}

/// `ai-hf-cache/<sha256>.json` entries with a per-entry TTL. No locking.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl_s: u64,
}

impl ResponseCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join("ai-hf-cache"),
            ttl_s: DEFAULT_TTL_S,
        }
    }

    pub fn with_ttl(mut self, ttl_s: u64) -> Self {
        self.ttl_s = ttl_s;
        self
    }

    /// SHA-256 hex of the JSON `{prompt, options, model}`.
    pub fn key(prompt: &str, options: &serde_json::Value, model: &str) -> String {
        let material = KeyMaterial {
            prompt,
            options,
            model,
        };
        let bytes = serde_json::to_vec(&material).unwrap_or_default();
        hex::encode(Sha256::digest(&bytes))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Cached text for `key`; an expired entry is deleted and reported as a miss.
    pub fn get(&self, key: &str) -> Result<Option<CachedResponse>> {
        let path = self.path(key);
        let bytes = match fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Cache(e.to_string())),
        };
        let Ok(entry) = serde_json::from_slice::<Entry>(&bytes) else {
            return Ok(None);
        };
        let now = epoch_s(SystemTime::now());
        if now.saturating_sub(entry.created_at) > entry.ttl {
            tracing::debug!(key, "cache entry expired");
            let _ = fs::remove_file(&path);
            return Ok(None);
        }
        Ok(Some(entry.response))
    }

    pub fn set(&self, key: &str, response: &CachedResponse) -> Result<()> {
        self.set_at(key, response, SystemTime::now())
    }

    fn set_at(&self, key: &str, response: &CachedResponse, created: SystemTime) -> Result<()> {
        let entry = Entry {
            created_at: epoch_s(created),
            ttl: self.ttl_s,
            response: response.clone(),
        };
        write_json_atomic(&self.path(key), &entry).map_err(|e| Error::Cache(e.to_string()))
    }

    fn entries(&self) -> Result<Vec<PathBuf>> {
        let rd = match fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Cache(e.to_string())),
        };
        Ok(rd
            .flatten()
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|x| x.to_str()) == Some("json"))
            .collect())
    }

    /// Delete every entry; returns how many files were removed.
    pub fn clear(&self) -> Result<usize> {
        let removed = self
            .entries()?
            .iter()
            .filter(|p| fs::remove_file(p).is_ok())
            .count();
        tracing::info!(removed, dir = %self.dir.display(), "response cache cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let mut stats = CacheStats::default();
        for p in self.entries()? {
            let Ok(meta) = fs::metadata(&p) else { continue };
            stats.total_files += 1;
            stats.total_size_bytes += meta.len();
            if let Ok(m) = meta.modified() {
                let t = epoch_s(m);
                stats.oldest_timestamp = Some(stats.oldest_timestamp.map_or(t, |o| o.min(t)));
                stats.newest_timestamp = Some(stats.newest_timestamp.map_or(t, |n| n.max(t)));
            }
        }
        Ok(stats)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
