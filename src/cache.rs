//! Fingerprint-keyed computation cache with single-flight semantics
//!
//! [`ScoreCache`] memoizes scorer output keyed by (record fingerprint, metric
//! name, scorer version). It is the engine's only mutable shared structure;
//! all cross-worker coordination happens through its reserve-then-fill
//! protocol:
//!
//! 1. The first claimant of a key installs a pending slot holding a watch
//!    channel and runs the computation.
//! 2. Concurrent claimants await the channel; nobody polls.
//! 3. The claimant fills the slot and signals; every caller observes the same
//!    result instance.
//!
//! Successful results live until evicted by the bounded LRU policy. Failed
//! results are cached with a short TTL so a transient failure neither poisons
//! the key nor triggers a recompute storm. A pending slot is never evicted.

use crate::metrics::MetricResult;
use crate::record::Fingerprint;
use core::time::Duration;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::watch;

const LOG_TARGET: &str = "     cache";

/// Identity of one cached computation.
///
/// The scorer version is part of the key, so bumping a metric's version
/// invalidates every previously cached result for that name without touching
/// the entries themselves.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub fingerprint: Fingerprint,
    pub metric: String,
    pub version: u32,
}

/// Counter snapshot for telemetry.
///
/// A hit is any request served without invoking the compute function,
/// including callers that joined an in-flight computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Hits over total requests; 0 when the cache has seen no traffic.
    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 { 0.0 } else { self.hits as f64 / total as f64 }
    }
}

enum Slot {
    Ready {
        result: Arc<MetricResult>,
        /// Set for failure results; expired entries are recomputed.
        expires_at: Option<Instant>,
        last_used: u64,
    },
    Pending {
        rx: watch::Receiver<Option<Arc<MetricResult>>>,
    },
}

struct State {
    slots: HashMap<CacheKey, Slot>,
    tick: u64,
}

/// Bounded, LRU-evicting computation cache.
pub struct ScoreCache {
    state: Mutex<State>,
    capacity: usize,
    failure_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl core::fmt::Debug for ScoreCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScoreCache")
            .field("capacity", &self.capacity)
            .field("failure_ttl", &self.failure_ttl)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

enum Claim {
    Hit(Arc<MetricResult>),
    Wait(watch::Receiver<Option<Arc<MetricResult>>>),
    Reserve(watch::Sender<Option<Arc<MetricResult>>>),
}

impl ScoreCache {
    /// Create a cache holding at most `capacity` completed entries, with
    /// failed results kept for `failure_ttl`.
    #[must_use]
    pub fn new(capacity: usize, failure_ttl: Duration) -> Self {
        Self {
            state: Mutex::new(State {
                slots: HashMap::new(),
                tick: 0,
            }),
            capacity: capacity.max(1),
            failure_ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        }
    }

    /// Returns the cached result for `key`, computing it via `compute` on a
    /// miss.
    ///
    /// For a fixed key, `compute` runs at most once across all concurrent
    /// callers; late callers await the in-flight computation and observe the
    /// same result instance.
    pub async fn get_or_compute<F, Fut>(&self, key: CacheKey, compute: F) -> Arc<MetricResult>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = MetricResult>,
    {
        let mut compute = Some(compute);
        loop {
            let claim = self.claim(&key);
            match claim {
                Claim::Hit(result) => {
                    let _ = self.hits.fetch_add(1, Ordering::Relaxed);
                    return result;
                }
                Claim::Wait(mut rx) => {
                    if let Ok(filled) = rx.wait_for(Option::is_some).await
                        && let Some(result) = filled.as_ref()
                    {
                        let _ = self.hits.fetch_add(1, Ordering::Relaxed);
                        return Arc::clone(result);
                    }
                    // The computing claimant went away without filling the
                    // slot; take over.
                    log::debug!(target: LOG_TARGET, "pending computation for '{}' abandoned, retrying", key.metric);
                }
                Claim::Reserve(tx) => {
                    let Some(compute) = compute.take() else {
                        // A key can only be reserved once per call.
                        continue;
                    };
                    let _ = self.misses.fetch_add(1, Ordering::Relaxed);

                    let mut guard = FillGuard { cache: self, key: Some(&key) };
                    let result = Arc::new(compute().await);
                    self.fill(&key, &result);
                    guard.key = None;

                    let _ = tx.send(Some(Arc::clone(&result)));
                    return result;
                }
            }
        }
    }

    /// Looks up `key` and decides between hit, wait, and reserve while the
    /// lock is held. Expired failure entries count as vacant.
    fn claim(&self, key: &CacheKey) -> Claim {
        let mut state = self.state.lock().expect("cache lock not poisoned");
        state.tick += 1;
        let tick = state.tick;

        match state.slots.get_mut(key) {
            Some(Slot::Ready { result, expires_at, last_used }) => {
                if expires_at.is_some_and(|at| Instant::now() >= at) {
                    log::debug!(target: LOG_TARGET, "failure entry for '{}' expired", key.metric);
                    let _ = state.slots.remove(key);
                } else {
                    *last_used = tick;
                    return Claim::Hit(Arc::clone(result));
                }
            }
            Some(Slot::Pending { rx }) => return Claim::Wait(rx.clone()),
            None => {}
        }

        let (tx, rx) = watch::channel(None);
        let _ = state.slots.insert(key.clone(), Slot::Pending { rx });
        Claim::Reserve(tx)
    }

    /// Replaces the pending slot with a ready entry and applies eviction.
    fn fill(&self, key: &CacheKey, result: &Arc<MetricResult>) {
        let mut state = self.state.lock().expect("cache lock not poisoned");
        state.tick += 1;
        let tick = state.tick;

        let expires_at = if result.is_success() {
            None
        } else {
            Some(Instant::now() + self.failure_ttl)
        };
        let _ = state.slots.insert(
            key.clone(),
            Slot::Ready {
                result: Arc::clone(result),
                expires_at,
                last_used: tick,
            },
        );

        // LRU eviction over completed entries only; in-flight computations
        // are never evicted.
        loop {
            let ready_count = state
                .slots
                .values()
                .filter(|slot| matches!(slot, Slot::Ready { .. }))
                .count();
            if ready_count <= self.capacity {
                break;
            }

            let victim = state
                .slots
                .iter()
                .filter_map(|(k, slot)| match slot {
                    Slot::Ready { last_used, .. } => Some((*last_used, k.clone())),
                    Slot::Pending { .. } => None,
                })
                .min_by_key(|(last_used, _)| *last_used)
                .map(|(_, k)| k);
            let Some(victim) = victim else { break };

            log::debug!(target: LOG_TARGET, "evicting '{}' for {}", victim.metric, victim.fingerprint);
            let _ = state.slots.remove(&victim);
            let _ = self.evictions.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Number of completed entries currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("cache lock not poisoned")
            .slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the hit/miss/eviction counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Removes an unfilled pending slot if the computing claimant is dropped
/// mid-flight, so waiters can take over instead of hanging.
struct FillGuard<'a> {
    cache: &'a ScoreCache,
    key: Option<&'a CacheKey>,
}

impl Drop for FillGuard<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            let mut state = self.cache.state.lock().expect("cache lock not poisoned");
            if matches!(state.slots.get(key), Some(Slot::Pending { .. })) {
                let _ = state.slots.remove(key);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{ScoreFailure, Scored};
    use crate::record::{FieldValue, Record};
    use std::sync::atomic::AtomicUsize;

    fn key(metric: &str, version: u32) -> CacheKey {
        let record = Record::new(vec![("x".to_string(), FieldValue::Number(1.0))]);
        CacheKey {
            fingerprint: *record.fingerprint(),
            metric: metric.to_string(),
            version,
        }
    }

    fn success(score: f64) -> MetricResult {
        MetricResult::success(Scored::value(score), 1)
    }

    #[tokio::test]
    async fn second_lookup_is_a_hit() {
        let cache = ScoreCache::new(16, Duration::from_secs(30));

        let first = cache.get_or_compute(key("m", 1), || async { success(1.0) }).await;
        let second = cache.get_or_compute(key("m", 1), || async { success(2.0) }).await;

        // Compute ran once; the second call observed the first result.
        assert_eq!(first.score(), Some(1.0));
        assert_eq!(second.score(), Some(1.0));
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn version_bump_invalidates() {
        let cache = ScoreCache::new(16, Duration::from_secs(30));

        let _ = cache.get_or_compute(key("m", 1), || async { success(1.0) }).await;
        let bumped = cache.get_or_compute(key("m", 2), || async { success(2.0) }).await;

        assert_eq!(bumped.score(), Some(2.0));
        assert_eq!(cache.stats().misses, 2);
    }

    #[tokio::test]
    async fn concurrent_callers_compute_exactly_once() {
        let cache = Arc::new(ScoreCache::new(16, Duration::from_secs(30)));
        let invocations = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..32)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let invocations = Arc::clone(&invocations);
                tokio::spawn(async move {
                    cache
                        .get_or_compute(key("m", 1), || async move {
                            let _ = invocations.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(20)).await;
                            success(42.0)
                        })
                        .await
                })
            })
            .collect();

        let results = futures_util::future::join_all(tasks).await;
        for handle in results {
            let result = handle.unwrap();
            assert_eq!(result.score(), Some(42.0));
        }
        assert_eq!(invocations.load(Ordering::SeqCst), 1);
        assert_eq!(cache.stats().misses, 1);
        assert_eq!(cache.stats().hits, 31);
    }

    #[tokio::test]
    async fn failures_are_cached_until_ttl() {
        let cache = ScoreCache::new(16, Duration::from_millis(40));
        let invocations = AtomicUsize::new(0);

        let compute = || {
            let _ = invocations.fetch_add(1, Ordering::SeqCst);
            async { MetricResult::failed(ScoreFailure::DeadlineExceeded, 1) }
        };

        let first = cache.get_or_compute(key("m", 1), compute).await;
        assert!(!first.is_success());

        // Within the TTL the failure is served from cache.
        let second = cache.get_or_compute(key("m", 1), compute).await;
        assert!(!second.is_success());
        assert_eq!(invocations.load(Ordering::SeqCst), 1);

        // After the TTL the key is recomputed.
        tokio::time::sleep(Duration::from_millis(60)).await;
        let _ = cache.get_or_compute(key("m", 1), compute).await;
        assert_eq!(invocations.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn successes_do_not_expire() {
        let cache = ScoreCache::new(16, Duration::from_millis(10));
        let _ = cache.get_or_compute(key("m", 1), || async { success(1.0) }).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        let again = cache.get_or_compute(key("m", 1), || async { success(2.0) }).await;
        assert_eq!(again.score(), Some(1.0));
    }

    #[tokio::test]
    async fn lru_eviction_bounds_the_cache() {
        let cache = ScoreCache::new(2, Duration::from_secs(30));

        let _ = cache.get_or_compute(key("a", 1), || async { success(1.0) }).await;
        let _ = cache.get_or_compute(key("b", 1), || async { success(2.0) }).await;
        // Touch `a` so `b` becomes the LRU victim.
        let _ = cache.get_or_compute(key("a", 1), || async { success(9.0) }).await;
        let _ = cache.get_or_compute(key("c", 1), || async { success(3.0) }).await;

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions, 1);

        // `a` survived, `b` was evicted and recomputes.
        let a = cache.get_or_compute(key("a", 1), || async { success(99.0) }).await;
        assert_eq!(a.score(), Some(1.0));
        let b = cache.get_or_compute(key("b", 1), || async { success(20.0) }).await;
        assert_eq!(b.score(), Some(20.0));
    }

    #[tokio::test]
    async fn pending_slots_are_not_evicted() {
        let cache = Arc::new(ScoreCache::new(1, Duration::from_secs(30)));

        let slow = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                cache
                    .get_or_compute(key("slow", 1), || async {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        success(1.0)
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        // These fills churn the (capacity 1) cache while `slow` is in flight.
        let _ = cache.get_or_compute(key("x", 1), || async { success(2.0) }).await;
        let _ = cache.get_or_compute(key("y", 1), || async { success(3.0) }).await;

        let slow_result = slow.await.unwrap();
        assert_eq!(slow_result.score(), Some(1.0));

        // And the slow entry is now served from cache.
        let again = cache.get_or_compute(key("slow", 1), || async { success(8.0) }).await;
        assert_eq!(again.score(), Some(1.0));
    }

    #[test]
    fn hit_ratio_handles_zero_traffic() {
        let stats = CacheStats::default();
        assert!(stats.hit_ratio().abs() < f64::EPSILON);

        let stats = CacheStats {
            hits: 3,
            misses: 1,
            evictions: 0,
        };
        assert!((stats.hit_ratio() - 0.75).abs() < f64::EPSILON);
    }
}
