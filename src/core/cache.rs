//! # Response Cache
//!
//! Process-wide cache of finished responses keyed by a canonical request key.
//!
//! ## Overview
//!
//! - **Bounded**: at most `capacity` entries; inserting a new key into a full
//!   cache evicts the oldest-inserted entry first
//! - **FIFO, not LRU**: hits never reorder entries
//! - **One entry per key**: re-inserting a key replaces its value in place
//! - **Atomic compute**: [`ResponseCache::get_or_compute`] runs the compute
//!   function at most once per key at a time; concurrent callers for the same
//!   key wait for that result instead of computing their own
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   miss    ┌──────────────────┐   Ok    ┌────────────────┐
//! │ get_or_compute│─────────▶│ in_flight[key]   │────────▶│ entries + order│
//! └──────────────┘           │ (leader computes)│         │ (FIFO VecDeque)│
//!        │ in flight         └──────────────────┘         └────────────────┘
//!        ▼                          │ Err
//!   wait on Condvar ◀───────────────┘ waiters wake and retry
//! ```
//!
//! All bookkeeping (lookup, in-flight marker, insert, evict) happens under a
//! single mutex. The compute function itself runs outside the lock.
//!
//! ## Example
//!
//! ```rust
//! use adaptok::core::cache::ResponseCache;
//!
//! let cache = ResponseCache::new(2);
//! cache.insert("a", 1);
//! cache.insert("b", 2);
//! assert_eq!(cache.get("a"), Some(1));
//!
//! // "a" was inserted first; the hit above does not protect it.
//! cache.insert("c", 3);
//! assert_eq!(cache.get("a"), None);
//! assert_eq!(cache.keys(), vec!["b".to_string(), "c".to_string()]);
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// A cached value plus timing metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    /// Time spent computing the value, when it came from `get_or_compute`
    pub compute_time: Option<Duration>,
}

/// Where a `get_or_compute` result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    /// Found in the cache
    Hit,
    /// Computed by this caller
    Computed,
    /// Computed by a concurrent caller this one waited on
    Joined,
}

/// Value returned by [`ResponseCache::get_or_compute`].
#[derive(Debug, Clone)]
pub struct Cached<V> {
    pub value: V,
    pub source: CacheSource,
}

/// Point-in-time cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
    pub len: usize,
    pub capacity: usize,
}

enum Outcome<V> {
    Ready(V),
    Failed,
}

struct Pending<V> {
    outcome: Mutex<Option<Outcome<V>>>,
    ready: Condvar,
}

impl<V: Clone> Pending<V> {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            ready: Condvar::new(),
        }
    }

    fn complete(&self, outcome: Outcome<V>) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(outcome);
        self.ready.notify_all();
    }

    /// Block until the leader finishes; `None` means it failed.
    fn wait(&self) -> Option<V> {
        let mut guard = self.outcome.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match guard.as_ref() {
                Some(Outcome::Ready(value)) => return Some(value.clone()),
                Some(Outcome::Failed) => return None,
                None => {
                    guard = self
                        .ready
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }
}

struct State<V> {
    entries: HashMap<String, CacheEntry<V>>,
    order: VecDeque<String>,
    in_flight: HashMap<String, Arc<Pending<V>>>,
    hits: u64,
    misses: u64,
    insertions: u64,
    evictions: u64,
}

/// Bounded FIFO cache with atomic get-or-compute.
pub struct ResponseCache<V> {
    state: Mutex<State<V>>,
    capacity: usize,
}

impl<V: Clone> ResponseCache<V> {
    /// Cache holding at most `capacity` entries (at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(State {
                entries: HashMap::with_capacity(capacity),
                order: VecDeque::with_capacity(capacity),
                in_flight: HashMap::new(),
                hits: 0,
                misses: 0,
                insertions: 0,
                evictions: 0,
            }),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Cached value for `key`, counting a hit or a miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        match state.entries.get(key).map(|e| e.value.clone()) {
            Some(value) => {
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Cached value for `key`, counting a hit when present.
    ///
    /// A miss is not counted; callers follow up with
    /// [`get_or_compute`](Self::get_or_compute), which counts it.
    pub fn lookup(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        let value = state.entries.get(key).map(|e| e.value.clone())?;
        state.hits += 1;
        Some(value)
    }

    /// Entry for `key` with its timing metadata. Does not touch counters.
    pub fn entry(&self, key: &str) -> Option<CacheEntry<V>> {
        self.lock().entries.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().entries.contains_key(key)
    }

    /// Insert or replace `key`.
    ///
    /// A replaced key keeps its original position. A new key evicts the
    /// oldest entry first when the cache is full.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let mut state = self.lock();
        Self::insert_locked(&mut state, self.capacity, key.into(), value, None);
    }

    fn insert_locked(
        state: &mut State<V>,
        capacity: usize,
        key: String,
        value: V,
        compute_time: Option<Duration>,
    ) {
        let entry = CacheEntry {
            value,
            inserted_at: Instant::now(),
            compute_time,
        };
        state.insertions += 1;
        if let Some(existing) = state.entries.get_mut(&key) {
            *existing = entry;
            return;
        }
        while state.order.len() >= capacity {
            let Some(oldest) = state.order.pop_front() else {
                break;
            };
            state.entries.remove(&oldest);
            state.evictions += 1;
        }
        state.order.push_back(key.clone());
        state.entries.insert(key, entry);
    }

    /// Return the cached value for `key`, or compute and cache it.
    ///
    /// At most one caller computes a given key at a time. Callers arriving
    /// while it runs wait and share its result. If the computation fails
    /// nothing is cached, the error goes to the computing caller only, and
    /// each waiter retries (one of them becomes the next computing caller).
    pub fn get_or_compute<F, E>(&self, key: &str, compute: F) -> Result<Cached<V>, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let pending = loop {
            let mut state = self.lock();
            if let Some(value) = state.entries.get(key).map(|e| e.value.clone()) {
                state.hits += 1;
                return Ok(Cached {
                    value,
                    source: CacheSource::Hit,
                });
            }
            match state.in_flight.get(key).cloned() {
                Some(pending) => {
                    drop(state);
                    if let Some(value) = pending.wait() {
                        self.lock().hits += 1;
                        return Ok(Cached {
                            value,
                            source: CacheSource::Joined,
                        });
                    }
                }
                None => {
                    state.misses += 1;
                    let pending = Arc::new(Pending::new());
                    state.in_flight.insert(key.to_string(), Arc::clone(&pending));
                    break pending;
                }
            }
        };

        let mut guard = InFlight {
            cache: self,
            key,
            pending,
            done: false,
        };
        let started = Instant::now();
        let result = compute();
        match result {
            Ok(value) => {
                guard.finish(Some((value.clone(), started.elapsed())));
                Ok(Cached {
                    value,
                    source: CacheSource::Computed,
                })
            }
            Err(error) => {
                guard.finish(None);
                Err(error)
            }
        }
    }

    /// Drop `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<V> {
        let mut state = self.lock();
        let entry = state.entries.remove(key)?;
        state.order.retain(|k| k != key);
        Some(entry.value)
    }

    /// Drop every entry. Counters and in-flight computations are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<String> {
        self.lock().order.iter().cloned().collect()
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            insertions: state.insertions,
            evictions: state.evictions,
            len: state.entries.len(),
            capacity: self.capacity,
        }
    }
}

/// Clears the in-flight marker even if the compute function panics.
struct InFlight<'a, V: Clone> {
    cache: &'a ResponseCache<V>,
    key: &'a str,
    pending: Arc<Pending<V>>,
    done: bool,
}

impl<V: Clone> InFlight<'_, V> {
    fn finish(&mut self, result: Option<(V, Duration)>) {
        self.done = true;
        let mut state = self.cache.lock();
        state.in_flight.remove(self.key);
        match result {
            Some((value, elapsed)) => {
                ResponseCache::<V>::insert_locked(
                    &mut state,
                    self.cache.capacity,
                    self.key.to_string(),
                    value.clone(),
                    Some(elapsed),
                );
                drop(state);
                self.pending.complete(Outcome::Ready(value));
            }
            None => {
                drop(state);
                self.pending.complete(Outcome::Failed);
            }
        }
    }
}

impl<V: Clone> Drop for InFlight<'_, V> {
    fn drop(&mut self) {
        if !self.done {
            self.finish(None);
        }
    }
}
