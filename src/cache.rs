//! Read-through metadata cache for unchanged input files.
//!
//! Parsing a large export is dominated by re-reading files that have not
//! changed since the previous run. [`MetadataCache`] stores an opaque JSON
//! payload per input file, keyed by relative path and guarded by a
//! modification fingerprint (mtime truncated to seconds, plus byte size).
//! A lookup hits only while the fingerprint matches the live file exactly;
//! any drift evicts the entry immediately and reports a miss.
//!
//! Persistence is a single JSON document written atomically (temp file,
//! then rename) so a crash can never leave a half-written cache. Stores
//! auto-flush every [`FLUSH_INTERVAL`] entries and once on the final flush.
//! Every cache I/O failure degrades to a miss or a skipped persist; the
//! cache never aborts a run.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::timestamp::now_ms;

/// Document format version; a mismatch discards the whole cache.
const CACHE_VERSION: u32 = 1;

/// Number of stores between automatic disk flushes.
pub const FLUSH_INTERVAL: usize = 50;

const MS_PER_DAY: i64 = 86_400_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    /// Modification fingerprint: `"{mtime_secs}:{byte_size}"`.
    file_hash: String,
    /// Opaque payload stored by the caller.
    metadata: Value,
    /// Unix milliseconds when the entry was stored.
    cached_at: i64,
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheDocument {
    cache_version: u32,
    last_updated: i64,
    files: HashMap<String, CacheEntry>,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, CacheEntry>,
    unflushed: usize,
    flush_failures: usize,
    hits: usize,
    misses: usize,
}

/// File-fingerprint-keyed metadata cache.
///
/// Relative keys resolve against the base directory given at open time,
/// so the cache file can move with the output while entries keep pointing
/// at the input files they describe.
#[derive(Debug)]
pub struct MetadataCache {
    path: PathBuf,
    base_dir: PathBuf,
    inner: Mutex<Inner>,
}

impl MetadataCache {
    /// Opens a cache backed by `path`, resolving keys against `base_dir`.
    ///
    /// A missing, unreadable, corrupt, or version-mismatched cache file
    /// yields an empty cache; persistence problems never block a run.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>, base_dir: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let files = fs::read_to_string(&path)
            .ok()
            .and_then(|contents| serde_json::from_str::<CacheDocument>(&contents).ok())
            .filter(|doc| doc.cache_version == CACHE_VERSION)
            .map(|doc| doc.files)
            .unwrap_or_default();

        Self {
            path,
            base_dir: base_dir.into(),
            inner: Mutex::new(Inner {
                files,
                ..Inner::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up the cached metadata for a file.
    ///
    /// Hits require exact fingerprint equality against the live file. A
    /// stale or unstatable entry is evicted on the spot and reported as a
    /// miss.
    #[must_use]
    pub fn get(&self, file_key: &str) -> Option<Value> {
        let live = fingerprint(&self.base_dir.join(file_key));
        let mut inner = self.lock();

        let cached = inner
            .files
            .get(file_key)
            .map(|e| (e.file_hash.clone(), e.metadata.clone()));

        match cached {
            Some((hash, metadata)) if live.as_deref() == Some(hash.as_str()) => {
                inner.hits += 1;
                Some(metadata)
            }
            Some(_) => {
                inner.files.remove(file_key);
                inner.misses += 1;
                None
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Stores metadata for a file under its current fingerprint.
    ///
    /// Skipped silently when the file cannot be fingerprinted.
    pub fn put(&self, file_key: &str, metadata: Value) {
        let Some(file_hash) = fingerprint(&self.base_dir.join(file_key)) else {
            return;
        };

        let mut inner = self.lock();
        inner.files.insert(
            file_key.to_string(),
            CacheEntry {
                file_hash,
                metadata,
                cached_at: now_ms(),
            },
        );
        inner.unflushed += 1;
        if inner.unflushed >= FLUSH_INTERVAL {
            if Self::write_document(&self.path, &inner.files).is_err() {
                inner.flush_failures += 1;
            }
            inner.unflushed = 0;
        }
    }

    /// Removes entries whose backing file is gone or older than
    /// `max_age_days`. Returns how many entries were dropped.
    pub fn invalidate_stale(&self, max_age_days: u32) -> usize {
        let cutoff = now_ms() - i64::from(max_age_days) * MS_PER_DAY;

        let mut inner = self.lock();
        let before = inner.files.len();
        inner
            .files
            .retain(|key, entry| self.base_dir.join(key).exists() && entry.cached_at >= cutoff);
        let removed = before - inner.files.len();
        inner.unflushed += removed;
        removed
    }

    /// Writes the cache document to disk immediately.
    ///
    /// # Errors
    ///
    /// Returns an error when the document cannot be serialized or the
    /// atomic write fails. In-memory state is unaffected.
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.lock();
        Self::write_document(&self.path, &inner.files)?;
        inner.unflushed = 0;
        Ok(())
    }

    fn write_document(path: &Path, files: &HashMap<String, CacheEntry>) -> Result<()> {
        let document = CacheDocument {
            cache_version: CACHE_VERSION,
            last_updated: now_ms(),
            files: files.clone(),
        };
        let json = serde_json::to_string_pretty(&document)?;

        // Write-then-rename keeps the previous document intact on failure.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Returns the number of cached entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().files.len()
    }

    /// Returns `true` when the cache holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().files.is_empty()
    }

    /// Returns `(hits, misses)` counted since open.
    #[must_use]
    pub fn hit_stats(&self) -> (usize, usize) {
        let inner = self.lock();
        (inner.hits, inner.misses)
    }

    /// Returns how many automatic flushes failed so far.
    #[must_use]
    pub fn flush_failures(&self) -> usize {
        self.lock().flush_failures
    }
}

/// Computes the modification fingerprint of a live file.
fn fingerprint(path: &Path) -> Option<String> {
    let meta = fs::metadata(path).ok()?;
    let mtime_secs = meta
        .modified()
        .ok()?
        .duration_since(UNIX_EPOCH)
        .ok()?
        .as_secs();
    Some(format!("{mtime_secs}:{}", meta.len()))
}
