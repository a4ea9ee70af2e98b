//! Persistent URL → captured page cache.
//!
//! The cache file is a versioned JSON document holding exactly the captured
//! pages. It is read once at startup and written once at the end of a run,
//! always through a temp file that is renamed over the target, so a crash
//! mid-write leaves the previous file intact.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::models::CapturedPage;

/// Current on-disk format version.
pub const CACHE_VERSION: u32 = 1;

#[derive(Serialize)]
struct CacheFileRef<'a> {
    version: u32,
    pages: &'a BTreeMap<String, CapturedPage>,
}

#[derive(Deserialize)]
struct CacheFile {
    version: u32,
    #[serde(default)]
    pages: BTreeMap<String, CapturedPage>,
}

/// How a load attempt went.
#[derive(Debug)]
pub enum CacheStatus {
    /// No cache file existed.
    Missing,
    /// Restored this many pages.
    Loaded(usize),
    /// The file existed but could not be used; the cache starts empty.
    Degraded(CacheError),
}

/// Captured pages keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScrapeCache {
    pages: BTreeMap<String, CapturedPage>,
}

impl ScrapeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the cache at `path`, degrading to an empty cache when the file
    /// is missing or unusable.
    pub fn load(path: &Path) -> Self {
        Self::load_with_status(path).0
    }

    /// Like [`ScrapeCache::load`], also reporting what happened.
    pub fn load_with_status(path: &Path) -> (Self, CacheStatus) {
        match Self::read(path) {
            Ok(Some(cache)) => {
                info!("Restored {} cached pages from {}", cache.len(), path.display());
                let count = cache.len();
                (cache, CacheStatus::Loaded(count))
            }
            Ok(None) => {
                debug!("No cache at {}, starting empty", path.display());
                (Self::new(), CacheStatus::Missing)
            }
            Err(e) => {
                warn!("Ignoring unusable cache {}: {}", path.display(), e);
                (Self::new(), CacheStatus::Degraded(e))
            }
        }
    }

    fn read(path: &Path) -> Result<Option<Self>, CacheError> {
        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(CacheError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(CacheError::Empty(path.to_path_buf()));
        }

        let file: CacheFile = serde_json::from_slice(&bytes)?;
        if file.version != CACHE_VERSION {
            return Err(CacheError::UnsupportedVersion(file.version));
        }

        Ok(Some(Self { pages: file.pages }))
    }

    /// Atomically write the whole cache to `path`.
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(
            &mut tmp,
            &CacheFileRef {
                version: CACHE_VERSION,
                pages: &self.pages,
            },
        )?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;

        info!("Saved {} cached pages to {}", self.len(), path.display());
        Ok(())
    }

    /// Requested URLs that are not cached yet.
    pub fn pending<'a, I>(&self, requested: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        requested
            .into_iter()
            .filter(|url| !self.pages.contains_key(*url))
            .cloned()
            .collect()
    }

    /// Insert or replace the page for `url`.
    pub fn put(&mut self, url: impl Into<String>, page: CapturedPage) {
        self.pages.insert(url.into(), page);
    }

    pub fn get(&self, url: &str) -> Option<&CapturedPage> {
        self.pages.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.pages.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &CapturedPage)> {
        self.pages.iter()
    }
}
