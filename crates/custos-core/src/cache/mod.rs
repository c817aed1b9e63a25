//! Thread-safe memoization store with TTL expiry and bounded size.
//!
//! Expired entries are evicted lazily on access and swept periodically by a
//! detached background thread. When the store is at capacity, the entry with
//! the lowest `(access_count, last_access)` wins eviction.

mod query;
mod ui;

pub use query::QueryCache;
pub use ui::UiCache;

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

/// Interval between background sweeps of expired entries.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

struct Entry<T> {
    value: T,
    created: Instant,
    ttl: Duration,
    access_count: u64,
    last_access: Instant,
}

impl<T> Entry<T> {
    fn expired(&self, now: Instant) -> bool {
        now.duration_since(self.created) > self.ttl
    }
}

struct State<T> {
    entries: HashMap<String, Entry<T>>,
    hits: u64,
    misses: u64,
    evictions: u64,
    total_requests: u64,
}

impl<T> Default for State<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
            total_requests: 0,
        }
    }
}

/// Aggregate cache statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub max_size: usize,
    /// Hit percentage over all requests; 0 when no requests were made.
    pub hit_rate: f64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub total_requests: u64,
}

/// Generic key/value store with per-entry TTL and frequency-based eviction.
/// Cloning shares the underlying store.
pub struct Cache<T> {
    state: Arc<Mutex<State<T>>>,
    max_size: usize,
    default_ttl: Duration,
}

impl<T> Clone for Cache<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            max_size: self.max_size,
            default_ttl: self.default_ttl,
        }
    }
}

impl<T: Clone + Send + 'static> Cache<T> {
    /// Create a cache and start its background expiry sweeper. The sweeper
    /// holds only a weak handle and exits once every clone of the cache is
    /// gone.
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        let state = Arc::new(Mutex::new(State::default()));
        spawn_sweeper(Arc::downgrade(&state));
        Self {
            state,
            max_size,
            default_ttl,
        }
    }

    /// Look up a key. Expired entries are removed and count as misses.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut state = self.lock();
        state.total_requests += 1;
        let now = Instant::now();
        if state.entries.get(key).is_some_and(|e| e.expired(now)) {
            state.entries.remove(key);
        }
        if let Some(entry) = state.entries.get_mut(key) {
            entry.access_count += 1;
            entry.last_access = now;
            let value = entry.value.clone();
            state.hits += 1;
            Some(value)
        } else {
            state.misses += 1;
            None
        }
    }

    /// Insert or overwrite using the default TTL.
    pub fn set(&self, key: &str, value: T) {
        self.set_with_ttl(key, value, self.default_ttl);
    }

    /// Insert or overwrite with an explicit TTL. When the store is full and
    /// the key is new, exactly one entry is evicted first: the one with the
    /// lowest access count, ties broken by oldest access.
    pub fn set_with_ttl(&self, key: &str, value: T, ttl: Duration) {
        let mut state = self.lock();
        if state.entries.len() >= self.max_size && !state.entries.contains_key(key) {
            evict_least_used(&mut state);
        }
        let now = Instant::now();
        state.entries.insert(
            key.to_string(),
            Entry {
                value,
                created: now,
                ttl,
                access_count: 0,
                last_access: now,
            },
        );
    }

    /// Remove a key. Returns `true` when an entry was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    /// Drop every entry and reset all statistics.
    pub fn clear(&self) {
        *self.lock() = State::default();
    }

    /// Membership check honoring TTL. Does not touch access statistics.
    pub fn exists(&self, key: &str) -> bool {
        let state = self.lock();
        let now = Instant::now();
        state.entries.get(key).is_some_and(|e| !e.expired(now))
    }

    /// Return the cached value, or compute it via `factory`, store it, and
    /// return it. Not guarded against duplicate concurrent computation: two
    /// racing callers may both invoke `factory`; the later store wins.
    pub fn get_or_set(&self, key: &str, factory: impl FnOnce() -> T) -> T {
        self.get_or_set_with_ttl(key, factory, self.default_ttl)
    }

    /// `get_or_set` with an explicit TTL for the computed value.
    pub fn get_or_set_with_ttl(
        &self,
        key: &str,
        factory: impl FnOnce() -> T,
        ttl: Duration,
    ) -> T {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = factory();
        self.set_with_ttl(key, value.clone(), ttl);
        value
    }

    /// Remove every key containing `fragment`. Linear scan over all keys.
    /// Returns the number of entries removed.
    pub fn invalidate_matching(&self, fragment: &str) -> usize {
        let mut state = self.lock();
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.contains(fragment));
        before - state.entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        let hit_rate = if state.total_requests > 0 {
            state.hits as f64 * 100.0 / state.total_requests as f64
        } else {
            0.0
        };
        CacheStats {
            size: state.entries.len(),
            max_size: self.max_size,
            hit_rate,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            total_requests: state.total_requests,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn evict_least_used<T>(state: &mut State<T>) {
    let victim = state
        .entries
        .iter()
        .min_by_key(|(_, e)| (e.access_count, e.last_access))
        .map(|(key, _)| key.clone());
    if let Some(key) = victim {
        state.entries.remove(&key);
        state.evictions += 1;
    }
}

/// Periodic sweep of expired entries, independent of `get` traffic. The
/// thread exits once the cache it serves has been dropped; a failed spawn
/// leaves expiry lazy-only.
fn spawn_sweeper<T: Send + 'static>(state: Weak<Mutex<State<T>>>) {
    let _ = thread::Builder::new()
        .name("cache-sweeper".into())
        .spawn(move || loop {
            thread::sleep(SWEEP_INTERVAL);
            let Some(state) = state.upgrade() else { break };
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            let now = Instant::now();
            let before = state.entries.len();
            state.entries.retain(|_, e| !e.expired(now));
            let removed = before - state.entries.len();
            if removed > 0 {
                debug!(removed, "cache sweep removed expired entries");
            }
        });
}
