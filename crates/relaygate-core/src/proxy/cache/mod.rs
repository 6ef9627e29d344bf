//! Single-flight cache with an adaptive TTL.
//!
//! Concurrent lookups of a missing key share one in-flight load. Keys asked
//! for often inside `hot_window_ms` are considered actively viewed and get a
//! TTL close to `min_ttl_ms`; rarely requested keys keep values up to
//! `max_ttl_ms`:
//!
//! ```text
//! ttl = max - (max - min) * min(hits, threshold) / threshold
//! ```
//!
//! Failed loads are never stored. Entries past their expiry are treated as
//! absent whether or not they have been purged yet.

#[cfg(test)]
mod tests;

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::Mutex;
use relaygate_types::{CacheConfig, ProxyResult};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::proxy::prometheus;

type SharedLoad<V> = Shared<BoxFuture<'static, ProxyResult<V>>>;

enum Slot<V: Clone> {
    Ready { value: V, expires_at: Instant },
    /// `hits` is the heat seen by the caller that started the load
    Pending { id: u64, hits: usize, load: SharedLoad<V> },
}

pub struct CacheLayer<V: Clone> {
    name: &'static str,
    config: CacheConfig,
    slots: Mutex<HashMap<String, Slot<V>>>,
    /// Request timestamps per key, pruned to the hot window
    heat: DashMap<String, VecDeque<Instant>>,
    next_load_id: AtomicU64,
}

impl<V: Clone + Send + Sync + 'static> std::fmt::Debug for CacheLayer<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheLayer").field("name", &self.name).field("entries", &self.len()).finish()
    }
}

impl<V> CacheLayer<V>
where
    V: Clone + Send + Sync + 'static,
{
    /// `name` labels the cache in metrics and logs.
    pub fn new(name: &'static str, config: CacheConfig) -> Self {
        Self {
            name,
            config,
            slots: Mutex::new(HashMap::new()),
            heat: DashMap::new(),
            next_load_id: AtomicU64::new(1),
        }
    }

    pub fn ttl_for_hits(&self, hits: usize) -> Duration {
        let min = self.config.min_ttl_ms.min(self.config.max_ttl_ms);
        let max = self.config.max_ttl_ms;
        let threshold = u64::from(self.config.hot_threshold.max(1));
        let hits = (hits as u64).min(threshold);
        Duration::from_millis(max - (max - min) * hits / threshold)
    }

    /// Record one request for `key` and return how many fell inside the hot
    /// window, this one included.
    fn touch(&self, key: &str, now: Instant) -> usize {
        let window = Duration::from_millis(self.config.hot_window_ms);
        let mut times = self.heat.entry(key.to_string()).or_default();
        while times.front().is_some_and(|t| now.saturating_duration_since(*t) > window) {
            times.pop_front();
        }
        times.push_back(now);
        times.len()
    }

    /// Fresh cached value, or the result of `load`, shared with every
    /// concurrent caller asking for the same key.
    pub async fn get_or_load<F, Fut>(&self, key: &str, load: F) -> ProxyResult<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ProxyResult<V>> + Send + 'static,
    {
        let now = Instant::now();
        let hits = self.touch(key, now);

        let (id, shared) = {
            let mut slots = self.slots.lock();
            match slots.get(key) {
                Some(Slot::Ready { value, expires_at }) if *expires_at > now => {
                    prometheus::record_cache_lookup(self.name, "hit");
                    return Ok(value.clone());
                },
                Some(Slot::Pending { id, load, .. }) => {
                    prometheus::record_cache_lookup(self.name, "shared");
                    (*id, load.clone())
                },
                _ => {
                    prometheus::record_cache_lookup(self.name, "miss");
                    let id = self.next_load_id.fetch_add(1, Ordering::Relaxed);
                    let shared = load().boxed().shared();
                    slots.insert(key.to_string(), Slot::Pending { id, hits, load: shared.clone() });
                    (id, shared)
                },
            }
        };

        let result = shared.await;
        self.settle(key, id, &result);
        result
    }

    /// Replace the pending slot of load `id` with its outcome. Whichever
    /// awaiter gets here first does it; later ones find the slot settled.
    /// The TTL follows the heat recorded when the load started.
    fn settle(&self, key: &str, id: u64, result: &ProxyResult<V>) {
        let mut slots = self.slots.lock();
        let hits = match slots.get(key) {
            Some(Slot::Pending { id: pending, hits, .. }) if *pending == id => *hits,
            _ => return,
        };

        match result {
            Ok(value) => {
                let ttl = self.ttl_for_hits(hits);
                slots.insert(key.to_string(), Slot::Ready { value: value.clone(), expires_at: Instant::now() + ttl });
                debug!("[cache:{}] stored {} for {}ms (hits in window: {})", self.name, key, ttl.as_millis(), hits);
                Self::evict_over_capacity(&mut slots, self.config.max_entries);
            },
            Err(err) => {
                slots.remove(key);
                debug!("[cache:{}] load for {} failed, not cached: {}", self.name, key, err.kind());
            },
        }
    }

    /// Drop ready entries, soonest-expiring first, until within capacity.
    fn evict_over_capacity(slots: &mut HashMap<String, Slot<V>>, max_entries: usize) {
        let mut ready = slots
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready { expires_at, .. } => Some((*expires_at, key.clone())),
                Slot::Pending { .. } => None,
            })
            .collect::<Vec<_>>();
        let Some(excess) = slots.len().checked_sub(max_entries.max(1)).filter(|n| *n > 0) else {
            return;
        };
        ready.sort();
        for (_, key) in ready.into_iter().take(excess) {
            slots.remove(&key);
        }
    }

    pub fn invalidate(&self, key: &str) -> bool {
        self.slots.lock().remove(key).is_some()
    }

    /// Remove every entry whose key starts with `prefix`. In-flight loads are
    /// dropped too, so their results will not be stored.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut slots = self.slots.lock();
        let before = slots.len();
        slots.retain(|key, _| !key.starts_with(prefix));
        before - slots.len()
    }

    /// Purge expired entries and stale heat records.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let removed = {
            let mut slots = self.slots.lock();
            let before = slots.len();
            slots.retain(|_, slot| match slot {
                Slot::Ready { expires_at, .. } => *expires_at > now,
                Slot::Pending { .. } => true,
            });
            before - slots.len()
        };

        let window = Duration::from_millis(self.config.hot_window_ms);
        self.heat
            .retain(|_, times| times.back().is_some_and(|t| now.saturating_duration_since(*t) <= window));
        removed
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
