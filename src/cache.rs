//! Content-addressed result cache with lazy TTL expiry and bulk eviction.
//!
//! Keys are MD5 fingerprints of (a prefix of) the input text. Lookups and
//! inserts are serialised by one mutex; a per-key pending marker makes
//! concurrent callers for the same fingerprint wait for the single in-flight
//! computation instead of repeating it.

use crate::config::CacheConfig;
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub value: V,
    pub created_at: Instant,
    sequence: u64,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() >= ttl
    }
}

/// Read-only snapshot of cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub computations: u64,
    pub failures: u64,
    pub hit_rate: f64,
    pub average_compute_ms: f64,
    pub size: usize,
    pub capacity: usize,
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    computations: u64,
    failures: u64,
    total_compute_time: Duration,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, CacheEntry<V>>,
    pending: HashSet<String>,
    next_sequence: u64,
    counters: Counters,
}

pub struct ResultCache<V> {
    capacity: usize,
    ttl: Duration,
    key_prefix_chars: usize,
    eviction_fraction: f64,
    state: Mutex<CacheState<V>>,
    ready: Condvar,
}

impl<V: Clone> ResultCache<V> {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let defaults = CacheConfig::default();
        Self {
            capacity: capacity.max(1),
            ttl,
            key_prefix_chars: defaults.key_prefix_chars,
            eviction_fraction: defaults.eviction_fraction,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                pending: HashSet::new(),
                next_sequence: 0,
                counters: Counters::default(),
            }),
            ready: Condvar::new(),
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        let mut cache = Self::new(config.capacity, config.ttl());
        cache.key_prefix_chars = config.key_prefix_chars;
        cache.eviction_fraction = config.eviction_fraction;
        cache
    }

    /// Hex MD5 of at most the first `key_prefix_chars` characters. Inputs that
    /// differ only after that prefix share a fingerprint.
    pub fn fingerprint(&self, key_source: &str) -> String {
        let end = key_source
            .char_indices()
            .nth(self.key_prefix_chars)
            .map_or(key_source.len(), |(idx, _)| idx);
        hex::encode(md5::compute(&key_source.as_bytes()[..end]).0)
    }

    /// Cached value for `key_source`, if present and not expired
    pub fn get(&self, key_source: &str) -> Option<V> {
        let key = self.fingerprint(key_source);
        let mut state = self.state.lock();
        let value = self.lookup(&mut state, &key);
        if value.is_none() {
            state.counters.misses += 1;
        }
        value
    }

    pub fn get_or_compute<F>(&self, key_source: &str, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        match self.try_get_or_compute(key_source, || {
            Ok::<V, std::convert::Infallible>(compute())
        }) {
            Ok(value) => value,
            Err(never) => match never {},
        }
    }

    /// Return the cached value or run `compute` once for this fingerprint.
    /// A failed computation is not cached; its error reaches the caller as is.
    pub fn try_get_or_compute<F, E>(&self, key_source: &str, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let key = self.fingerprint(key_source);

        {
            let mut state = self.state.lock();
            loop {
                if let Some(value) = self.lookup(&mut state, &key) {
                    return Ok(value);
                }
                if state.pending.contains(&key) {
                    log::debug!("Waiting on in-flight computation for {}", &key[..16]);
                    self.ready.wait(&mut state);
                    continue;
                }
                state.pending.insert(key.clone());
                state.counters.misses += 1;
                log::debug!("Cache miss for key: {}...", &key[..16]);
                break;
            }
        }

        let _pending = PendingGuard { cache: self, key: &key };

        let started = Instant::now();
        let result = compute();
        let elapsed = started.elapsed();

        let mut state = self.state.lock();
        state.counters.computations += 1;
        state.counters.total_compute_time += elapsed;
        let outcome = match result {
            Ok(value) => {
                self.evict_if_full(&mut state);
                let sequence = state.next_sequence;
                state.next_sequence += 1;
                state.entries.insert(
                    key.clone(),
                    CacheEntry {
                        value: value.clone(),
                        created_at: Instant::now(),
                        sequence,
                    },
                );
                log::debug!("Cached {} after {:?}", &key[..16], elapsed);
                Ok(value)
            }
            Err(e) => {
                state.counters.failures += 1;
                log::warn!("Computation for {} failed; result not cached", &key[..16]);
                Err(e)
            }
        };
        drop(state);
        outcome
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        let counters = &state.counters;
        let lookups = counters.hits + counters.misses;
        CacheStats {
            hits: counters.hits,
            misses: counters.misses,
            computations: counters.computations,
            failures: counters.failures,
            hit_rate: if lookups > 0 {
                counters.hits as f64 / lookups as f64
            } else {
                0.0
            },
            average_compute_ms: if counters.computations > 0 {
                counters.total_compute_time.as_secs_f64() * 1000.0 / counters.computations as f64
            } else {
                0.0
            },
            size: state.entries.len(),
            capacity: self.capacity,
        }
    }

    /// Entries physically held, expired or not
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }

    fn lookup(&self, state: &mut CacheState<V>, key: &str) -> Option<V> {
        let expired = match state.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => {
                let value = entry.value.clone();
                state.counters.hits += 1;
                log::debug!("Cache hit for key: {}...", &key[..16]);
                return Some(value);
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            state.entries.remove(key);
            log::debug!("Cache entry expired: {}...", &key[..16]);
        }
        None
    }

    /// Drop the oldest share of entries in one pass once the cache is full
    fn evict_if_full(&self, state: &mut CacheState<V>) {
        let len = state.entries.len();
        if len < self.capacity {
            return;
        }

        let count = ((len as f64 * self.eviction_fraction).floor() as usize).clamp(1, len);
        let mut by_age: Vec<(Instant, u64, String)> = state
            .entries
            .iter()
            .map(|(key, entry)| (entry.created_at, entry.sequence, key.clone()))
            .collect();
        by_age.sort();

        for (_, _, key) in by_age.into_iter().take(count) {
            state.entries.remove(&key);
        }
        log::debug!("Evicted {count} of {len} cache entries");
    }
}

/// Clears the pending marker and wakes waiters, also when `compute` panics
struct PendingGuard<'a, V> {
    cache: &'a ResultCache<V>,
    key: &'a str,
}

impl<V> Drop for PendingGuard<'_, V> {
    fn drop(&mut self) {
        let mut state = self.cache.state.lock();
        state.pending.remove(self.key);
        drop(state);
        self.cache.ready.notify_all();
    }
}
