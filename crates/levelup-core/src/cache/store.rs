use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::entry::CachedData;
use super::request::Response;

/// Directory under the cache dir holding one subdirectory per region
const REGIONS_DIR: &str = "regions";

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Stored entry: the URL is kept so the region can be listed
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StoredEntry {
    url: String,
    #[serde(flatten)]
    cached: CachedData<Response>,
}

/// A named cache region keyed by request URL.
///
/// Implementations must make each `put` atomic per key so concurrent
/// requests never observe a half-written entry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Region name, including its version tag
    fn name(&self) -> &str;

    async fn get(&self, url: &str) -> Result<Option<CachedData<Response>>, CacheError>;

    async fn put(&self, url: &str, response: &Response) -> Result<(), CacheError>;

    /// Stored URLs with their entry, sorted by URL
    async fn entries(&self) -> Result<Vec<(String, CachedData<Response>)>, CacheError>;
}

/// In-process region, lost when the process exits
pub struct MemoryCacheStore {
    name: String,
    entries: RwLock<HashMap<String, CachedData<Response>>>,
}

impl MemoryCacheStore {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, url: &str) -> Result<Option<CachedData<Response>>, CacheError> {
        Ok(self.entries.read().await.get(url).cloned())
    }

    async fn put(&self, url: &str, response: &Response) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(url.to_string(), CachedData::new(response.clone()));
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, CachedData<Response>)>, CacheError> {
        let mut entries: Vec<_> = self
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

/// Region persisted as one JSON file per URL under
/// `<cache_dir>/regions/<name>/<sha256(url)>.json`.
pub struct DiskCacheStore {
    name: String,
    dir: PathBuf,
    tmp_counter: AtomicU64,
}

impl DiskCacheStore {
    /// Open (creating if needed) the region `name` under `cache_dir`
    pub async fn open(cache_dir: &Path, name: &str) -> Result<Self, CacheError> {
        let dir = cache_dir.join(REGIONS_DIR).join(name);
        tokio::fs::create_dir_all(&dir).await?;
        debug!(region = name, dir = %dir.display(), "Opened cache region");
        Ok(Self {
            name: name.to_string(),
            dir,
            tmp_counter: AtomicU64::new(0),
        })
    }

    fn entry_path(&self, url: &str) -> PathBuf {
        let digest = Sha256::digest(url.as_bytes());
        self.dir.join(format!("{}.json", hex::encode(digest)))
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, url: &str) -> Result<Option<CachedData<Response>>, CacheError> {
        let path = self.entry_path(url);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stored: StoredEntry = serde_json::from_str(&contents)?;
        // A digest collision would hand back someone else's response
        if stored.url != url {
            return Ok(None);
        }
        Ok(Some(stored.cached))
    }

    async fn put(&self, url: &str, response: &Response) -> Result<(), CacheError> {
        let stored = StoredEntry {
            url: url.to_string(),
            cached: CachedData::new(response.clone()),
        };
        let contents = serde_json::to_vec(&stored)?;

        // Write aside then rename, so readers see the old or the new entry
        let path = self.entry_path(url);
        let n = self.tmp_counter.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_extension(format!("{}.{}.tmp", std::process::id(), n));
        tokio::fs::write(&tmp, contents).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn entries(&self) -> Result<Vec<(String, CachedData<Response>)>, CacheError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.dir).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let contents = tokio::fs::read_to_string(&path).await?;
            match serde_json::from_str::<StoredEntry>(&contents) {
                Ok(stored) => entries.push((stored.url, stored.cached)),
                Err(e) => debug!(path = %path.display(), error = %e, "Skipping unreadable cache entry"),
            }
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }
}

/// Names of all regions present under `cache_dir`, sorted
pub async fn list_regions(cache_dir: &Path) -> Result<Vec<String>, CacheError> {
    let root = cache_dir.join(REGIONS_DIR);
    let mut names = Vec::new();
    let mut dir = match tokio::fs::read_dir(&root).await {
        Ok(dir) => dir,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
        Err(e) => return Err(e.into()),
    };
    while let Some(item) = dir.next_entry().await? {
        if item.file_type().await?.is_dir() {
            names.push(item.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// Delete every region except `keep`. Returns the removed region names.
///
/// Nothing calls this implicitly: a version bump only orphans old regions.
pub async fn prune_regions(cache_dir: &Path, keep: &str) -> Result<Vec<String>, CacheError> {
    let root = cache_dir.join(REGIONS_DIR);
    let mut removed = Vec::new();
    for name in list_regions(cache_dir).await? {
        if name == keep {
            continue;
        }
        tokio::fs::remove_dir_all(root.join(&name)).await?;
        info!(region = %name, "Removed stale cache region");
        removed.push(name);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_put_get() {
        let store = MemoryCacheStore::new("levelup-cache-v1");
        assert!(store.get("https://app.test/").await.unwrap().is_none());
        store.put("https://app.test/", &Response::ok("home")).await.unwrap();
        store.put("https://app.test/", &Response::ok("home v2")).await.unwrap();
        let cached = store.get("https://app.test/").await.unwrap().unwrap();
        assert_eq!(cached.data.text(), "home v2");
        assert_eq!(store.entries().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_disk_store_persists_across_open() {
        let tmp = tempfile::tempdir().unwrap();
        let url = "https://app.test/assets/app.js";
        {
            let store = DiskCacheStore::open(tmp.path(), "levelup-cache-v1").await.unwrap();
            let response = Response::ok(vec![1u8, 2, 3]).with_header("content-type", "text/javascript");
            store.put(url, &response).await.unwrap();
        }
        let store = DiskCacheStore::open(tmp.path(), "levelup-cache-v1").await.unwrap();
        let cached = store.get(url).await.unwrap().unwrap();
        assert_eq!(cached.data.body, vec![1u8, 2, 3]);
        assert_eq!(cached.data.header("Content-Type"), Some("text/javascript"));
        assert!(store.get("https://app.test/other.js").await.unwrap().is_none());

        let entries = store.entries().await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, url);
    }

    #[tokio::test]
    async fn test_regions_are_isolated_by_version() {
        let tmp = tempfile::tempdir().unwrap();
        let v1 = DiskCacheStore::open(tmp.path(), "levelup-cache-v1").await.unwrap();
        v1.put("https://app.test/", &Response::ok("old")).await.unwrap();
        let v2 = DiskCacheStore::open(tmp.path(), "levelup-cache-v2").await.unwrap();
        assert!(v2.get("https://app.test/").await.unwrap().is_none());

        assert_eq!(
            list_regions(tmp.path()).await.unwrap(),
            vec!["levelup-cache-v1".to_string(), "levelup-cache-v2".to_string()]
        );
        let removed = prune_regions(tmp.path(), "levelup-cache-v2").await.unwrap();
        assert_eq!(removed, vec!["levelup-cache-v1".to_string()]);
        assert_eq!(list_regions(tmp.path()).await.unwrap(), vec!["levelup-cache-v2".to_string()]);
    }

    #[tokio::test]
    async fn test_list_regions_without_cache_dir() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(list_regions(&tmp.path().join("missing")).await.unwrap().is_empty());
    }
}
