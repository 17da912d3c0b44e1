//! Bounded image cache with request deduplication and cancellation.
//!
//! Structure:
//! - `entries`: LRU map key -> decoded image (unbounded `LruCache`, bounds are
//!   enforced here so both count and cost limits apply)
//! - `in_flight`: at most one fetch per key, with the ordered waiters to notify
//!
//! Ownership model: the cache is owned by a single loop. Fetches run on a
//! `FetchExecutor` and send their outcome back over a channel; nothing touches
//! the tables until the owner calls `pump()`. Every fetch carries an id, so a
//! result that arrives after its request was cancelled (or superseded by a
//! retry) no longer matches and is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexMap;
use log::{debug, trace, warn};
use lru::LruCache;
use serde::{Deserialize, Serialize};

use crate::entities::{CancelToken, DecodedImage, FetchError, FetchExecutor, ImageFetcher};

/// Outcome delivered to waiters
pub type FetchResult = Result<DecodedImage, FetchError>;

/// Completion callback, invoked on the owning loop during `pump()`
pub type Waiter = Box<dyn FnOnce(FetchResult) + Send + 'static>;

/// Dual bound on live entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheLimits {
    /// Maximum number of live entries
    pub max_count: usize,
    /// Maximum cumulative cost (decoded bytes)
    #[serde(rename = "max_cost_bytes")]
    pub max_cost: usize,
}

impl Default for CacheLimits {
    fn default() -> Self {
        Self {
            max_count: 50,
            max_cost: 50 * 1024 * 1024,
        }
    }
}

/// Cache counters for monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Fetches actually dispatched (misses minus dedup joins)
    pub fetches: u64,
    pub evictions: u64,
    /// Results dropped because their request no longer existed
    pub stale_discarded: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

/// Result of `resolve`
#[derive(Debug)]
pub enum Resolution {
    /// Cache hit, available now. The waiter is dropped without being called.
    Ready(DecodedImage),
    /// Waiter attached to a fetch; keep the handle to cancel interest.
    Pending(RequestHandle),
}

/// Identifies one waiter's interest in one key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestHandle {
    key: String,
    waiter_id: u64,
}

impl RequestHandle {
    pub fn key(&self) -> &str {
        &self.key
    }
}

struct Entry {
    image: DecodedImage,
    cost: usize,
}

struct InFlight {
    fetch_id: u64,
    cancel: CancelToken,
    waiters: IndexMap<u64, Waiter>,
}

struct FetchOutcome {
    key: String,
    fetch_id: u64,
    result: FetchResult,
}

/// Key -> decoded image store bounded by count and cost, LRU eviction.
pub struct ImageCache {
    entries: LruCache<String, Entry>,
    total_cost: usize,
    limits: CacheLimits,
    in_flight: HashMap<String, InFlight>,
    executor: Arc<dyn FetchExecutor>,
    outcome_tx: Sender<FetchOutcome>,
    outcome_rx: Receiver<FetchOutcome>,
    next_id: u64,
    stats: CacheStats,
}

impl std::fmt::Debug for ImageCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageCache")
            .field("len", &self.entries.len())
            .field("total_cost", &self.total_cost)
            .field("limits", &self.limits)
            .field("in_flight", &self.in_flight.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ImageCache {
    /// Create an empty cache dispatching fetches to `executor`.
    pub fn new(limits: CacheLimits, executor: Arc<dyn FetchExecutor>) -> Self {
        debug!(
            "ImageCache created: max_count={}, max_cost={} MB",
            limits.max_count,
            limits.max_cost / 1024 / 1024
        );
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();
        Self {
            entries: LruCache::unbounded(),
            total_cost: 0,
            limits,
            in_flight: HashMap::new(),
            executor,
            outcome_tx,
            outcome_rx,
            next_id: 0,
            stats: CacheStats::default(),
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    /// Resolve `key` to a decoded image.
    ///
    /// - live entry: `Ready` immediately, recency refreshed
    /// - fetch already running for `key`: `waiter` joins it
    /// - otherwise `fetcher` is dispatched to the executor
    ///
    /// `waiter` is only ever called from `pump()`, never from inside `resolve`.
    pub fn resolve<W>(&mut self, key: &str, fetcher: Arc<dyn ImageFetcher>, waiter: W) -> Resolution
    where
        W: FnOnce(FetchResult) + Send + 'static,
    {
        if let Some(entry) = self.entries.get(key) {
            self.stats.hits += 1;
            trace!("Cache hit: {}", key);
            return Resolution::Ready(entry.image.clone());
        }
        self.stats.misses += 1;

        let waiter_id = self.next_id();
        let handle = RequestHandle {
            key: key.to_string(),
            waiter_id,
        };

        if let Some(flight) = self.in_flight.get_mut(key) {
            flight.waiters.insert(waiter_id, Box::new(waiter));
            debug!("Joined in-flight fetch {} for {} ({} waiters)", flight.fetch_id, key, flight.waiters.len());
            return Resolution::Pending(handle);
        }

        let fetch_id = self.next_id();
        let cancel = CancelToken::new();
        let mut waiters: IndexMap<u64, Waiter> = IndexMap::new();
        waiters.insert(waiter_id, Box::new(waiter));
        self.in_flight.insert(
            key.to_string(),
            InFlight {
                fetch_id,
                cancel: cancel.clone(),
                waiters,
            },
        );
        self.stats.fetches += 1;
        debug!("Fetch {} dispatched: {}", fetch_id, key);

        let tx = self.outcome_tx.clone();
        let key = key.to_string();
        self.executor.execute(Box::new(move || {
            // Last waiter left before a worker picked this up.
            if cancel.is_cancelled() {
                trace!("Fetch {} skipped (cancelled): {}", fetch_id, key);
                return;
            }
            let result = fetcher.fetch(&key, &cancel);
            // Receiver gone means the cache was dropped; nothing to report to.
            let _ = tx.send(FetchOutcome { key, fetch_id, result });
        }));

        Resolution::Pending(handle)
    }

    /// Withdraw one waiter's interest.
    ///
    /// When the last waiter of a fetch leaves, the fetch is cancelled
    /// (advisory) and its eventual result will be discarded. Returns false if
    /// the handle was already completed or cancelled.
    pub fn cancel(&mut self, handle: &RequestHandle) -> bool {
        let Some(flight) = self.in_flight.get_mut(&handle.key) else {
            return false;
        };
        if flight.waiters.shift_remove(&handle.waiter_id).is_none() {
            return false;
        }
        if flight.waiters.is_empty() {
            if let Some(flight) = self.in_flight.remove(&handle.key) {
                flight.cancel.cancel();
                debug!("Fetch {} cancelled: {}", flight.fetch_id, handle.key);
            }
        }
        true
    }

    /// Apply every fetch outcome that has arrived since the last call.
    ///
    /// Must be called from the owning loop. Returns the number of outcomes
    /// delivered to waiters (stale outcomes are not counted).
    pub fn pump(&mut self) -> usize {
        let mut delivered = 0;
        while let Ok(outcome) = self.outcome_rx.try_recv() {
            if self.complete(outcome) {
                delivered += 1;
            }
        }
        delivered
    }

    fn complete(&mut self, outcome: FetchOutcome) -> bool {
        let FetchOutcome { key, fetch_id, result } = outcome;

        let live = matches!(self.in_flight.get(&key), Some(f) if f.fetch_id == fetch_id);
        if !live {
            self.stats.stale_discarded += 1;
            debug!("Discarded stale result of fetch {}: {}", fetch_id, key);
            return false;
        }
        let Some(flight) = self.in_flight.remove(&key) else {
            return false;
        };

        match &result {
            Ok(image) => {
                self.admit(key.clone(), image.clone());
            }
            Err(e) => warn!("Fetch {} failed for {}: {}", fetch_id, key, e),
        }

        let count = flight.waiters.len();
        for (_, waiter) in flight.waiters {
            waiter(result.clone());
        }
        trace!("Fetch {} delivered to {} waiters", fetch_id, count);
        true
    }

    /// Insert an image directly, evicting as needed.
    ///
    /// Returns false if the image alone exceeds the cost bound; it is then not
    /// stored at all.
    pub fn insert(&mut self, key: &str, image: DecodedImage) -> bool {
        self.admit(key.to_string(), image)
    }

    fn admit(&mut self, key: String, image: DecodedImage) -> bool {
        let cost = image.cost();
        if self.limits.max_count == 0 || cost > self.limits.max_cost {
            debug!(
                "Not caching {}: cost {} bytes exceeds limit {}",
                key, cost, self.limits.max_cost
            );
            return false;
        }

        if let Some(old) = self.entries.pop(&key) {
            self.total_cost -= old.cost;
        }

        self.evict_until(self.limits.max_count - 1, self.limits.max_cost - cost);

        self.entries.put(key.clone(), Entry { image, cost });
        self.total_cost += cost;
        debug!("Cached {} ({} bytes, total {} bytes)", key, cost, self.total_cost);
        true
    }

    /// Evict least recently used entries until `len <= max_count` and
    /// `total_cost <= max_cost`.
    fn evict_until(&mut self, max_count: usize, max_cost: usize) {
        while self.entries.len() > max_count || self.total_cost > max_cost {
            let Some((key, evicted)) = self.entries.pop_lru() else {
                break;
            };
            self.total_cost -= evicted.cost;
            self.stats.evictions += 1;
            debug!("LRU evicted: {} (freed {} bytes)", key, evicted.cost);
        }
    }

    /// Change bounds, evicting immediately if the cache is now over them.
    pub fn set_limits(&mut self, limits: CacheLimits) {
        self.limits = limits;
        self.evict_until(limits.max_count, limits.max_cost);
    }

    /// Drop every live entry (memory pressure).
    ///
    /// In-flight fetches are left alone; they repopulate the cache when they
    /// complete.
    pub fn clear_all(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.total_cost = 0;
        debug!("Cleared entire cache ({} entries, {} fetches still in flight)", dropped, self.in_flight.len());
    }

    /// Remove one entry, returns true if it was cached.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.pop(key) {
            Some(entry) => {
                self.total_cost -= entry.cost;
                true
            }
            None => false,
        }
    }

    /// Lookup without fetching. Refreshes recency on hit.
    pub fn get(&mut self, key: &str) -> Option<DecodedImage> {
        self.entries.get(key).map(|e| e.image.clone())
    }

    /// Check presence without touching recency.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains(key)
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.in_flight.contains_key(key)
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_cost(&self) -> usize {
        self.total_cost
    }

    pub fn limits(&self) -> CacheLimits {
        self.limits
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}
