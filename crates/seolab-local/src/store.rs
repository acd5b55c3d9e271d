//! Keyword-addressed JSON persistence for research runs.

use seolab_core::{Error, ResearchRun, ResearchSummary, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Lowercase, runs of anything outside `[a-z0-9]` become one `-`, edges trimmed.
pub fn slugify(keyword: &str) -> Result<String> {
    let mut out = String::with_capacity(keyword.len());
    let mut pending_dash = false;
    for ch in keyword.to_lowercase().chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if out.is_empty() {
        return Err(Error::Validation(format!(
            "keyword {keyword:?} has no usable characters"
        )));
    }
    Ok(out)
}

/// Current UTC time as `YYYY-MM-DD HH:MM:SS`.
pub fn now_timestamp() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Pretty-print `value` into `path` through a sibling temp file and rename.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| Error::Store(format!("{} has no parent directory", path.display())))?;
    fs::create_dir_all(dir).map_err(|e| Error::Store(e.to_string()))?;
    let bytes = serde_json::to_vec_pretty(value).map_err(|e| Error::Store(e.to_string()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| Error::Store(e.to_string()))?;
    tmp.write_all(&bytes)
        .map_err(|e| Error::Store(e.to_string()))?;
    tmp.persist(path)
        .map_err(|e| Error::Store(e.error.to_string()))?;
    Ok(())
}

/// `Ok(None)` when the file does not exist.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(Error::Store(e.to_string())),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// `seo-research/<slug>.json`, one file per keyword; last writer wins.
#[derive(Debug, Clone)]
pub struct ResearchStore {
    dir: PathBuf,
}

impl ResearchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            dir: root.into().join("seo-research"),
        }
    }

    pub fn path_for(&self, keyword: &str) -> Result<PathBuf> {
        Ok(self.dir.join(format!("{}.json", slugify(keyword)?)))
    }

    pub fn save(&self, run: &ResearchRun) -> Result<PathBuf> {
        let path = self.path_for(&run.keyword)?;
        write_json_atomic(&path, run)?;
        tracing::info!(keyword = %run.keyword, path = %path.display(), "saved research run");
        Ok(path)
    }

    pub fn load(&self, keyword: &str) -> Result<Option<ResearchRun>> {
        read_json(&self.path_for(keyword)?)
    }

    /// Summaries of every stored run, most recently completed first.
    ///
    /// Unreadable files are skipped with a warning.
    pub fn list(&self) -> Result<Vec<ResearchSummary>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Store(e.to_string())),
        };
        let mut out = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match read_json::<ResearchRun>(&path) {
                Ok(Some(run)) => out.push(run.summary()),
                Ok(None) => {}
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable run"),
            }
        }
        // Fixed-width timestamps order correctly as strings; missing ones sort last.
        out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
        Ok(out)
    }

    /// Returns whether a file was removed.
    pub fn delete(&self, keyword: &str) -> Result<bool> {
        let path = self.path_for(keyword)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Store(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use seolab_core::RunStatus;

    fn completed(keyword: &str, at: &str) -> ResearchRun {
        let mut run = ResearchRun::new(keyword, "2024-01-01 00:00:00").unwrap();
        run.status = RunStatus::Completed;
        run.completed_at = Some(at.to_string());
        run.pages_analyzed = 3;
        run
    }

    #[test]
    fn slugify_examples() {
        assert_eq!(slugify("Best Running Shoes 2024").unwrap(), "best-running-shoes-2024");
        assert_eq!(slugify("  --C++ & Rust!! ").unwrap(), "c-rust");
        assert_eq!(slugify("café au lait").unwrap(), "caf-au-lait");
        assert!(slugify("!!!").is_err());
        assert!(slugify("").is_err());
    }

    #[test]
    fn save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(tmp.path());
        let run = completed("DNS Records", "2024-02-01 10:00:00");
        let path = store.save(&run).unwrap();
        assert!(path.ends_with("seo-research/dns-records.json"));

        let loaded = store.load("dns   records").unwrap().unwrap();
        assert_eq!(loaded, run);
        assert!(store.load("missing keyword").unwrap().is_none());
    }

    #[test]
    fn saving_twice_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(tmp.path());
        store.save(&completed("seo", "2024-02-01 10:00:00")).unwrap();
        let mut second = completed("seo", "2024-03-01 10:00:00");
        second.pages_analyzed = 9;
        store.save(&second).unwrap();
        assert_eq!(store.load("seo").unwrap().unwrap().pages_analyzed, 9);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn list_is_newest_first_and_skips_garbage() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(tmp.path());
        store.save(&completed("older", "2024-01-05 09:00:00")).unwrap();
        store.save(&completed("newer", "2024-06-05 09:00:00")).unwrap();
        fs::write(tmp.path().join("seo-research/broken.json"), b"{not json").unwrap();

        let list = store.list().unwrap();
        let kws: Vec<&str> = list.iter().map(|s| s.keyword.as_str()).collect();
        assert_eq!(kws, vec!["newer", "older"]);
        assert_eq!(list[0].status, RunStatus::Completed);
    }

    #[test]
    fn delete_reports_presence() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ResearchStore::new(tmp.path());
        assert!(store.list().unwrap().is_empty());
        store.save(&completed("seo", "2024-02-01 10:00:00")).unwrap();
        assert!(store.delete("seo").unwrap());
        assert!(!store.delete("seo").unwrap());
    }

    proptest! {
        #[test]
        fn slugify_is_idempotent_and_clean(s in ".{0,40}") {
            if let Ok(slug) = slugify(&s) {
                prop_assert_eq!(slugify(&slug).unwrap(), slug.clone());
                prop_assert!(!slug.starts_with('-') && !slug.ends_with('-'));
                prop_assert!(!slug.contains("--"));
                prop_assert!(slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            }
        }
    }
}
