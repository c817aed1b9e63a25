//! On-demand and background computation of named values with dependency
//! ordering and bounded parallelism.
//!
//! Each registered item moves through `NotLoaded -> Loading -> Loaded`, or
//! `Loading -> Error` when its loader fails. `NotLoaded` and `Error` are
//! re-enterable; `Loaded` is stable until an explicit unload.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::error::Result;

/// How long `get` blocks on a load already in flight before giving up. The
/// load may still complete later and populate the value for subsequent
/// callers.
const WAIT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cap on concurrently running background loads.
const DEFAULT_MAX_CONCURRENT_LOADS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    NotLoaded,
    Loading,
    Loaded,
    Error,
}

impl LoadState {
    pub fn as_str(self) -> &'static str {
        match self {
            LoadState::NotLoaded => "not_loaded",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Error => "error",
        }
    }
}

type LoaderFn<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;

struct Item<T> {
    loader: LoaderFn<T>,
    state: LoadState,
    value: Option<T>,
    error: Option<String>,
    load_time: Option<Duration>,
    access_count: u64,
    last_access: Option<Instant>,
    dependencies: Vec<String>,
    priority: i32,
}

/// Per-item introspection snapshot.
#[derive(Debug, Clone)]
pub struct ItemInfo {
    pub key: String,
    pub state: LoadState,
    pub access_count: u64,
    pub load_time: Option<Duration>,
    pub dependencies: Vec<String>,
    pub priority: i32,
    pub error: Option<String>,
}

/// Aggregate loader statistics.
#[derive(Debug, Clone, Default)]
pub struct LoaderStats {
    pub total_items: usize,
    pub loaded: usize,
    pub loading: usize,
    pub errored: usize,
    pub not_loaded: usize,
    pub max_concurrent_loads: usize,
    pub avg_load_time: Option<Duration>,
    pub max_load_time: Option<Duration>,
    pub max_access_count: u64,
}

type StartCallback = Box<dyn Fn(&str) + Send + Sync>;
type CompleteCallback<T> = Box<dyn Fn(&str, &T) + Send + Sync>;
type ErrorCallback = Box<dyn Fn(&str, &str) + Send + Sync>;

struct Callbacks<T> {
    on_load_start: Option<StartCallback>,
    on_load_complete: Option<CompleteCallback<T>>,
    on_load_error: Option<ErrorCallback>,
}

impl<T> Default for Callbacks<T> {
    fn default() -> Self {
        Self {
            on_load_start: None,
            on_load_complete: None,
            on_load_error: None,
        }
    }
}

struct Shared<T> {
    items: Mutex<HashMap<String, Item<T>>>,
    /// Signalled whenever an item leaves the `Loading` state.
    load_done: Condvar,
    slots: Semaphore,
    callbacks: Mutex<Callbacks<T>>,
    max_concurrent_loads: usize,
}

/// Registry of named deferred computations. Cloning shares the registry.
pub struct LazyLoader<T> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for LazyLoader<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone + Send + Sync + 'static> Default for LazyLoader<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync + 'static> LazyLoader<T> {
    pub fn new() -> Self {
        Self::with_concurrency(DEFAULT_MAX_CONCURRENT_LOADS)
    }

    pub fn with_concurrency(max_concurrent_loads: usize) -> Self {
        let max_concurrent_loads = max_concurrent_loads.max(1);
        Self {
            shared: Arc::new(Shared {
                items: Mutex::new(HashMap::new()),
                load_done: Condvar::new(),
                slots: Semaphore::new(max_concurrent_loads),
                callbacks: Mutex::new(Callbacks::default()),
                max_concurrent_loads,
            }),
        }
    }

    /// Register a deferred computation. Returns `false` when the key is
    /// already registered.
    ///
    /// Dependency graphs are not cycle-checked: a self-referential or
    /// mutually-dependent registration will recurse until stack exhaustion.
    pub fn register(
        &self,
        key: &str,
        loader: impl Fn() -> Result<T> + Send + Sync + 'static,
        dependencies: &[&str],
        priority: i32,
    ) -> bool {
        let mut items = self.lock_items();
        if items.contains_key(key) {
            return false;
        }
        items.insert(
            key.to_string(),
            Item {
                loader: Arc::new(loader),
                state: LoadState::NotLoaded,
                value: None,
                error: None,
                load_time: None,
                access_count: 0,
                last_access: None,
                dependencies: dependencies.iter().map(|d| d.to_string()).collect(),
                priority,
            },
        );
        true
    }

    pub fn set_on_load_start(&self, callback: impl Fn(&str) + Send + Sync + 'static) {
        self.lock_callbacks().on_load_start = Some(Box::new(callback));
    }

    pub fn set_on_load_complete(&self, callback: impl Fn(&str, &T) + Send + Sync + 'static) {
        self.lock_callbacks().on_load_complete = Some(Box::new(callback));
    }

    pub fn set_on_load_error(&self, callback: impl Fn(&str, &str) + Send + Sync + 'static) {
        self.lock_callbacks().on_load_error = Some(Box::new(callback));
    }

    /// Fetch a value, loading it inline when needed. Returns `None` for
    /// unknown keys, failed loads, and waits that exceed the in-flight
    /// timeout.
    pub fn get(&self, key: &str) -> Option<T> {
        self.get_with(key, false)
    }

    /// `get`, optionally discarding an already-loaded value and re-running
    /// the loader.
    pub fn get_with(&self, key: &str, force_reload: bool) -> Option<T> {
        let mut items = self.lock_items();
        let item = items.get_mut(key)?;
        item.access_count += 1;
        item.last_access = Some(Instant::now());
        let state = item.state;
        match state {
            LoadState::Loaded if !force_reload => item.value.clone(),
            LoadState::Loading => {
                let items = self.wait_while_loading(items, key);
                loaded_value(&items, key)
            }
            _ => {
                drop(items);
                self.load_item(key, force_reload);
                loaded_value(&self.lock_items(), key)
            }
        }
    }

    /// Schedule a background load. Returns `false` for unknown keys. The
    /// per-loader thread blocks on a semaphore slot, so at most
    /// `max_concurrent_loads` loaders run at once; excess requests queue.
    pub fn preload(&self, key: &str) -> bool {
        {
            let items = self.lock_items();
            match items.get(key) {
                None => return false,
                Some(item) if matches!(item.state, LoadState::Loaded | LoadState::Loading) => {
                    return true;
                }
                Some(_) => {}
            }
        }
        let loader = self.clone();
        let key = key.to_string();
        thread::Builder::new()
            .name(format!("lazy-load-{key}"))
            .spawn(move || {
                let _slot = loader.shared.slots.acquire();
                loader.load_item(&key, false);
            })
            .is_ok()
    }

    /// Schedule background loads for several keys. Returns how many were
    /// accepted.
    pub fn preload_multiple(&self, keys: &[&str]) -> usize {
        keys.iter().filter(|key| self.preload(key)).count()
    }

    /// Preload up to `max_items` not-yet-loaded entries, highest
    /// `(priority, access_count)` first.
    pub fn preload_by_priority(&self, max_items: usize) -> usize {
        let mut candidates: Vec<(String, i32, u64)> = {
            let items = self.lock_items();
            items
                .iter()
                .filter(|(_, item)| item.state == LoadState::NotLoaded)
                .map(|(key, item)| (key.clone(), item.priority, item.access_count))
                .collect()
        };
        candidates.sort_by(|a, b| (b.1, b.2).cmp(&(a.1, a.2)));
        candidates
            .into_iter()
            .take(max_items)
            .filter(|(key, _, _)| self.preload(key))
            .count()
    }

    /// Reset an entry to `NotLoaded`, discarding its cached value.
    pub fn unload(&self, key: &str) -> bool {
        let mut items = self.lock_items();
        let Some(item) = items.get_mut(key) else {
            return false;
        };
        item.value = None;
        item.error = None;
        item.state = LoadState::NotLoaded;
        true
    }

    pub fn unload_multiple(&self, keys: &[&str]) -> usize {
        keys.iter().filter(|key| self.unload(key)).count()
    }

    /// Unload `Loaded` entries whose last access is older than `max_age`.
    /// Returns the number of entries unloaded.
    pub fn unload_unused(&self, max_age: Duration) -> usize {
        let now = Instant::now();
        let stale: Vec<String> = {
            let items = self.lock_items();
            items
                .iter()
                .filter(|(_, item)| {
                    item.state == LoadState::Loaded
                        && item
                            .last_access
                            .is_some_and(|at| now.duration_since(at) > max_age)
                })
                .map(|(key, _)| key.clone())
                .collect()
        };
        stale.iter().filter(|key| self.unload(key)).count()
    }

    pub fn set_priority(&self, key: &str, priority: i32) -> bool {
        let mut items = self.lock_items();
        match items.get_mut(key) {
            Some(item) => {
                item.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn item_info(&self, key: &str) -> Option<ItemInfo> {
        let items = self.lock_items();
        items.get(key).map(|item| ItemInfo {
            key: key.to_string(),
            state: item.state,
            access_count: item.access_count,
            load_time: item.load_time,
            dependencies: item.dependencies.clone(),
            priority: item.priority,
            error: item.error.clone(),
        })
    }

    pub fn stats(&self) -> LoaderStats {
        let items = self.lock_items();
        let mut stats = LoaderStats {
            total_items: items.len(),
            max_concurrent_loads: self.shared.max_concurrent_loads,
            ..Default::default()
        };
        let mut load_times = Vec::new();
        for item in items.values() {
            match item.state {
                LoadState::Loaded => stats.loaded += 1,
                LoadState::Loading => stats.loading += 1,
                LoadState::Error => stats.errored += 1,
                LoadState::NotLoaded => stats.not_loaded += 1,
            }
            stats.max_access_count = stats.max_access_count.max(item.access_count);
            if let Some(t) = item.load_time {
                load_times.push(t);
            }
        }
        if !load_times.is_empty() {
            let total: Duration = load_times.iter().sum();
            stats.avg_load_time = Some(total / load_times.len() as u32);
            stats.max_load_time = load_times.iter().max().copied();
        }
        stats
    }

    /// Load `key` on the calling thread, resolving dependencies first. A
    /// dependency that fails to reach `Loaded` abandons the load without
    /// running this item's loader.
    fn load_item(&self, key: &str, force: bool) {
        let dependencies = {
            let items = self.lock_items();
            match items.get(key) {
                Some(item) => item.dependencies.clone(),
                None => return,
            }
        };
        for dependency in &dependencies {
            let state = self.lock_items().get(dependency).map(|item| item.state);
            match state {
                None => {
                    warn!(key, %dependency, "dependency not registered; load abandoned");
                    return;
                }
                Some(LoadState::Loaded) => continue,
                Some(_) => self.load_item(dependency, false),
            }
            let satisfied = self
                .lock_items()
                .get(dependency)
                .is_some_and(|item| item.state == LoadState::Loaded);
            if !satisfied {
                warn!(key, %dependency, "dependency failed to load; load abandoned");
                return;
            }
        }

        // Claim the item. If another thread claimed it first, wait for that
        // load instead of running the loader twice.
        let loader = {
            let mut items = self.lock_items();
            let state = match items.get(key) {
                Some(item) => item.state,
                None => return,
            };
            match state {
                LoadState::Loaded if !force => return,
                LoadState::Loading => {
                    let _items = self.wait_while_loading(items, key);
                    return;
                }
                _ => {
                    let Some(item) = items.get_mut(key) else { return };
                    item.state = LoadState::Loading;
                    Arc::clone(&item.loader)
                }
            }
        };

        {
            let callbacks = self.lock_callbacks();
            if let Some(callback) = &callbacks.on_load_start {
                callback(key);
            }
        }

        let started = Instant::now();
        let result = loader();
        let elapsed = started.elapsed();

        let outcome = {
            let mut items = self.lock_items();
            let Some(item) = items.get_mut(key) else { return };
            match result {
                Ok(value) => {
                    item.value = Some(value.clone());
                    item.error = None;
                    item.state = LoadState::Loaded;
                    item.load_time = Some(elapsed);
                    Ok(value)
                }
                Err(e) => {
                    let message = e.to_string();
                    item.value = None;
                    item.error = Some(message.clone());
                    item.state = LoadState::Error;
                    Err(message)
                }
            }
        };
        self.shared.load_done.notify_all();

        let callbacks = self.lock_callbacks();
        match &outcome {
            Ok(value) => {
                debug!(key, ?elapsed, "lazy item loaded");
                if let Some(callback) = &callbacks.on_load_complete {
                    callback(key, value);
                }
            }
            Err(message) => {
                warn!(key, error = %message, "lazy item failed to load");
                if let Some(callback) = &callbacks.on_load_error {
                    callback(key, message);
                }
            }
        }
    }

    /// Block until `key` leaves the `Loading` state or the timeout elapses.
    fn wait_while_loading<'a>(
        &'a self,
        guard: MutexGuard<'a, HashMap<String, Item<T>>>,
        key: &str,
    ) -> MutexGuard<'a, HashMap<String, Item<T>>> {
        let (guard, timeout) = self
            .shared
            .load_done
            .wait_timeout_while(guard, WAIT_TIMEOUT, |items| {
                items
                    .get(key)
                    .is_some_and(|item| item.state == LoadState::Loading)
            })
            .unwrap_or_else(|e| e.into_inner());
        if timeout.timed_out() {
            warn!(key, "timed out waiting for in-flight load");
        }
        guard
    }

    fn lock_items(&self) -> MutexGuard<'_, HashMap<String, Item<T>>> {
        self.shared.items.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_callbacks(&self) -> MutexGuard<'_, Callbacks<T>> {
        self.shared
            .callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

fn loaded_value<T: Clone>(items: &HashMap<String, Item<T>>, key: &str) -> Option<T> {
    items.get(key).and_then(|item| {
        if item.state == LoadState::Loaded {
            item.value.clone()
        } else {
            None
        }
    })
}

/// Minimal counting semaphore bounding concurrent background loads (std has
/// none, and nothing else here needs an async runtime).
struct Semaphore {
    permits: Mutex<usize>,
    available: Condvar,
}

struct SemaphorePermit<'a> {
    semaphore: &'a Semaphore,
}

impl Semaphore {
    fn new(permits: usize) -> Self {
        Self {
            permits: Mutex::new(permits),
            available: Condvar::new(),
        }
    }

    fn acquire(&self) -> SemaphorePermit<'_> {
        let mut permits = self.permits.lock().unwrap_or_else(|e| e.into_inner());
        while *permits == 0 {
            permits = self
                .available
                .wait(permits)
                .unwrap_or_else(|e| e.into_inner());
        }
        *permits -= 1;
        SemaphorePermit { semaphore: self }
    }
}

impl Drop for SemaphorePermit<'_> {
    fn drop(&mut self) {
        let mut permits = self
            .semaphore
            .permits
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        *permits += 1;
        self.semaphore.available.notify_one();
    }
}
