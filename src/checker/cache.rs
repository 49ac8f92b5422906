use crate::error::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Cache key: (dependent repo identity, target version).
pub type CacheKey = (String, String);

#[derive(Clone)]
enum Slot {
    /// A fetch for this key is running; waiters block on the condvar.
    InFlight,
    Ready {
        declared: Option<String>,
        at: Instant,
    },
}

/// Time-bounded cache for remote freshness lookups, shared by all workers
/// of one planning pass.
///
/// A miss installs a per-key in-flight slot so concurrent requesters for
/// the same key wait for the single running fetch instead of issuing
/// duplicates; unrelated keys are never serialized against each other
/// (the map lock is held only around slot bookkeeping, not the fetch).
/// Fetch errors are handed to the caller and never cached.
pub struct CheckCache {
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
    ready: Condvar,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CheckCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Returns the cached declared version for `key`, or runs `fetch` to
    /// populate it. The second element is true when the value came from
    /// the cache (including piggybacking on another worker's fetch).
    pub fn get_or_fetch<F>(&self, key: CacheKey, fetch: F) -> (Result<Option<String>>, bool)
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);

        loop {
            match slots.get(&key) {
                Some(Slot::Ready { declared, at }) if at.elapsed() < self.ttl => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    return (Ok(declared.clone()), true);
                }
                Some(Slot::Ready { .. }) => {
                    // Expired; this requester becomes the next fetcher.
                    slots.remove(&key);
                }
                Some(Slot::InFlight) => {
                    slots = self
                        .ready
                        .wait(slots)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                None => {
                    slots.insert(key.clone(), Slot::InFlight);
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    drop(slots);

                    let outcome = fetch();

                    let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
                    match &outcome {
                        Ok(declared) => {
                            slots.insert(
                                key,
                                Slot::Ready {
                                    declared: declared.clone(),
                                    at: Instant::now(),
                                },
                            );
                        }
                        Err(_) => {
                            slots.remove(&key);
                        }
                    }
                    drop(slots);
                    self.ready.notify_all();
                    return (outcome, false);
                }
            }
        }
    }
}
