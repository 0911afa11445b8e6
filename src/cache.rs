// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Response cache: classification results keyed by file signature

use chrono::{DateTime, Utc};
use lru::LruCache;
use serde::Serialize;
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tracing::debug;

use crate::classifier::ClassificationResult;
use crate::signature::FileSignature;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub result: ClassificationResult,
    pub last_used: DateTime<Utc>,
}

/// Counters exposed in the run report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entries: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

struct Inner {
    entries: LruCache<FileSignature, CacheEntry>,
    stats: CacheStats,
}

/// Bounded LRU mapping from signature to result.
///
/// Entries are immutable: a `put` for a signature that is already cached
/// keeps the existing result (and refreshes its recency).
pub struct ResponseCache {
    inner: Mutex<Inner>,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(Inner {
                entries: LruCache::new(capacity),
                stats: CacheStats {
                    capacity: capacity.get(),
                    ..CacheStats::default()
                },
            }),
        }
    }

    /// Look up a result, marking the entry most recently used
    pub fn get(&self, signature: &FileSignature) -> Option<ClassificationResult> {
        let mut inner = self.lock();
        let found = inner.entries.get_mut(signature).map(|entry| {
            entry.last_used = Utc::now();
            entry.result.clone()
        });
        if found.is_some() {
            inner.stats.hits += 1;
        } else {
            inner.stats.misses += 1;
        }
        found
    }

    /// Store a result. Returns the signature evicted to make room, if any.
    pub fn put(&self, signature: FileSignature, result: ClassificationResult) -> Option<FileSignature> {
        let mut inner = self.lock();

        if let Some(existing) = inner.entries.get_mut(&signature) {
            existing.last_used = Utc::now();
            return None;
        }

        let entry = CacheEntry {
            result,
            last_used: Utc::now(),
        };
        let evicted = inner.entries.push(signature, entry).map(|(key, _)| key);
        if let Some(key) = &evicted {
            inner.stats.evictions += 1;
            debug!("Evicted cache entry {}", key.short_hex());
        }
        evicted
    }

    /// Presence test that does not touch recency or counters
    pub fn contains(&self, signature: &FileSignature) -> bool {
        self.lock().entries.contains(signature)
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            ..inner.stats
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the LRU half-updated
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}
