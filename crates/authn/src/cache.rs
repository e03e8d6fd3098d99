//! Verification result cache.
//!
//! Maps a raw token string to the [`Service`] it verified as, for as long as
//! the token would still pass its `exp` and freshness checks. Only successful
//! verifications are stored.
//!
//! The cache is bounded: when an insert finds it full, the `prune_size`
//! oldest entries are evicted in one batch. Lookups use `peek`, so "oldest"
//! means earliest inserted. A capacity of zero disables the cache entirely;
//! nothing is stored and every lookup misses.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::{Duration, Instant},
};

use chrono::Utc;
use lru::LruCache;
use parking_lot::Mutex;

use crate::{config::AuthConfig, error::AuthError, jwt::Verified, registry::Service};

struct CacheEntry {
    service: Arc<Service>,
    expires_at: Instant,
}

struct Bounded {
    entries: Mutex<LruCache<String, CacheEntry>>,
    capacity: usize,
    prune_size: usize,
}

/// Snapshot of cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that fell through to verification.
    pub misses: u64,
    /// Entries currently stored, including expired ones not yet evicted.
    pub entries: usize,
}

/// Thread-safe TTL cache of verified tokens.
pub struct VerificationCache {
    inner: Option<Bounded>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl VerificationCache {
    /// Creates a cache holding up to `capacity` tokens and evicting
    /// `prune_size` of them at a time. `capacity == 0` disables caching.
    #[must_use]
    pub fn new(capacity: usize, prune_size: usize) -> Self {
        let inner = (capacity > 0).then(|| Bounded {
            entries: Mutex::new(LruCache::unbounded()),
            capacity,
            prune_size: prune_size.max(1),
        });
        Self { inner, hits: AtomicU64::new(0), misses: AtomicU64::new(0) }
    }

    /// Creates a cache sized from `config`.
    #[must_use]
    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.cache_size(), config.prune_size())
    }

    /// Creates a cache that never stores anything.
    #[must_use]
    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    /// Whether this cache stores entries at all.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Returns the cached service for `token` if present and unexpired.
    ///
    /// An expired entry found here is removed.
    pub fn get(&self, token: &str) -> Option<Arc<Service>> {
        let inner = self.inner.as_ref()?;
        let mut entries = inner.entries.lock();
        let entry = entries.peek(token)?;
        if entry.expires_at > Instant::now() {
            return Some(Arc::clone(&entry.service));
        }
        entries.pop(token);
        tracing::trace!("evicted expired cache entry");
        None
    }

    /// Stores `service` for `token` for `ttl`.
    ///
    /// A zero `ttl` stores nothing. If the cache is full the oldest
    /// `prune_size` entries are evicted first.
    pub fn set(&self, token: &str, service: Arc<Service>, ttl: Duration) {
        let Some(inner) = self.inner.as_ref() else {
            return;
        };
        if ttl.is_zero() {
            return;
        }
        let Some(expires_at) = Instant::now().checked_add(ttl) else {
            return;
        };

        let mut entries = inner.entries.lock();
        if !entries.contains(token) && entries.len() >= inner.capacity {
            let mut pruned = 0;
            while pruned < inner.prune_size && entries.pop_lru().is_some() {
                pruned += 1;
            }
            tracing::debug!(pruned, capacity = inner.capacity, "pruned verification cache");
        }
        entries.put(token.to_owned(), CacheEntry { service, expires_at });
    }

    /// Returns the cached service for `token`, or runs `verify` and caches
    /// its result until [`Verified::valid_until`].
    ///
    /// Failures are never cached. Concurrent callers that miss on the same
    /// token each run `verify`; the lock is not held while verifying.
    ///
    /// # Errors
    ///
    /// Whatever `verify` returns.
    pub fn get_or_verify<F>(&self, token: &str, verify: F) -> Result<Arc<Service>, AuthError>
    where
        F: FnOnce(&str) -> Result<Verified, AuthError>,
    {
        if !self.is_enabled() {
            return verify(token).map(|verified| verified.service);
        }

        if let Some(service) = self.get(token) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            tracing::trace!(service = service.id(), "verification cache hit");
            return Ok(service);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::trace!("verification cache miss");

        let verified = verify(token)?;
        let remaining =
            verified.valid_until.saturating_mul(1000).saturating_sub(Utc::now().timestamp_millis());
        if let Ok(millis) = u64::try_from(remaining) {
            self.set(token, Arc::clone(&verified.service), Duration::from_millis(millis));
        }
        Ok(verified.service)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.inner.as_ref().map_or(0, |inner| inner.entries.lock().len())
    }

    /// Removes every entry. Counters are kept.
    pub fn clear(&self) {
        if let Some(inner) = self.inner.as_ref() {
            inner.entries.lock().clear();
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entry_count(),
        }
    }
}

impl std::fmt::Debug for VerificationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("VerificationCache");
        match self.inner.as_ref() {
            Some(inner) => s
                .field("capacity", &inner.capacity)
                .field("prune_size", &inner.prune_size)
                .field("entries", &self.entry_count()),
            None => s.field("enabled", &false),
        };
        s.finish()
    }
}
