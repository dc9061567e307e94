//! Memoized connection cache
//!
//! [`DbaasCache`] maps a logical-database identity to the single result of an
//! expensive provision-and-connect computation. Concurrent first requests for
//! the same key share one in-flight computation: the factory runs exactly
//! once, and every caller that raced on it observes the same success value or
//! the same error. Errors are never stored, so a later call retries.
//!
//! The cache is process-wide state. It is injected as an explicit `Arc`
//! dependency so tests can construct isolated instances; nothing in here is a
//! hidden singleton.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use parking_lot::Mutex;

use crate::classifier::Classifier;

/// Identity of one cache slot: the database-kind discriminator plus the
/// classifier. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    db_kind: String,
    classifier: Classifier,
}

impl CacheKey {
    #[must_use]
    pub fn new(db_kind: impl Into<String>, classifier: Classifier) -> Self {
        Self {
            db_kind: db_kind.into(),
            classifier,
        }
    }

    #[must_use]
    pub fn db_kind(&self) -> &str {
        &self.db_kind
    }

    #[must_use]
    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.db_kind, self.classifier)
    }
}

type SharedCompute<V, E> = Shared<BoxFuture<'static, Result<V, Arc<E>>>>;

enum Slot<V, E> {
    /// Last successful computation.
    Ready(V),
    /// A computation is in flight; latecomers await the same shared future.
    /// The generation tells a finishing waiter whether the slot still belongs
    /// to its computation or has been vacated and restarted since.
    Pending {
        generation: u64,
        shared: SharedCompute<V, E>,
    },
}

struct Inner<V, E> {
    slots: HashMap<CacheKey, Slot<V, E>>,
    next_generation: u64,
}

/// Compute-once cache from [`CacheKey`] to a connection-holder value.
///
/// Mutual exclusion is scoped per key: unrelated keys never serialize
/// against each other, and the map lock is only held for slot bookkeeping,
/// never across an `.await`.
pub struct DbaasCache<V, E> {
    inner: Mutex<Inner<V, E>>,
}

impl<V, E> fmt::Debug for DbaasCache<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbaasCache")
            .field("entries", &self.inner.lock().slots.len())
            .finish_non_exhaustive()
    }
}

impl<V, E> Default for DbaasCache<V, E> {
    fn default() -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: HashMap::new(),
                next_generation: 0,
            }),
        }
    }
}

impl<V, E> DbaasCache<V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the stored value for `key`, or run `factory` to produce one.
    ///
    /// If another caller is already computing the value for this key, the
    /// factory is not invoked; the call awaits the in-flight computation and
    /// receives its result, error included. A factory error vacates the slot
    /// before it is returned, so the next non-concurrent call retries.
    pub async fn get_or_compute<F, Fut>(&self, key: &CacheKey, factory: F) -> Result<V, Arc<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>> + Send + 'static,
    {
        let (generation, computation) = {
            let mut inner = self.inner.lock();
            match inner.slots.get(key) {
                Some(Slot::Ready(value)) => return Ok(value.clone()),
                Some(Slot::Pending { generation, shared }) => (*generation, shared.clone()),
                None => {
                    let generation = inner.next_generation;
                    inner.next_generation += 1;
                    let shared = factory()
                        .map(|result| result.map_err(Arc::new))
                        .boxed()
                        .shared();
                    inner.slots.insert(
                        key.clone(),
                        Slot::Pending {
                            generation,
                            shared: shared.clone(),
                        },
                    );
                    tracing::debug!(key = %key, "cache miss, computation started");
                    (generation, shared)
                }
            }
        };

        let result = computation.await;

        // Promote or vacate the slot exactly once per computation. A waiter
        // finishing late must not touch a slot that has been restarted.
        let mut inner = self.inner.lock();
        let current = matches!(
            inner.slots.get(key),
            Some(Slot::Pending { generation: stored, .. }) if *stored == generation
        );
        if current {
            match &result {
                Ok(value) => {
                    inner.slots.insert(key.clone(), Slot::Ready(value.clone()));
                }
                Err(_) => {
                    inner.slots.remove(key);
                    tracing::debug!(key = %key, "computation failed, slot vacated");
                }
            }
        }
        result
    }

    /// Stored value for `key`, if a computation has completed successfully.
    /// Never observes an in-flight computation.
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        match self.inner.lock().slots.get(key) {
            Some(Slot::Ready(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// Unconditionally install `value` for `key`, replacing whatever was
    /// there. Atomic with respect to concurrent readers of the same key.
    pub fn replace(&self, key: CacheKey, value: V) {
        tracing::debug!(key = %key, "cache entry replaced");
        self.inner.lock().slots.insert(key, Slot::Ready(value));
    }

    /// Evict `key`, returning the stored value if one had been installed.
    pub fn remove(&self, key: &CacheKey) -> Option<V> {
        match self.inner.lock().slots.remove(key) {
            Some(Slot::Ready(value)) => Some(value),
            _ => None,
        }
    }

    /// Number of slots, in-flight computations included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::sync::{Barrier, Notify};

    use super::*;

    fn key(kind: &str) -> CacheKey {
        CacheKey::new(
            kind,
            Classifier::new()
                .with("microserviceName", "orders")
                .with("scope", "service"),
        )
    }

    #[tokio::test]
    async fn test_computes_once_and_caches() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let calls = AtomicUsize::new(0);
        let key = key("mongodb");

        for _ in 0..3 {
            let value = cache
                .get_or_compute(&key, || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Ok("conn".to_string()) }
                })
                .await
                .unwrap();
            assert_eq!(value, "conn");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache: Arc<DbaasCache<usize, String>> = Arc::new(DbaasCache::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let barrier = Arc::new(Barrier::new(16));
        let key = key("mongodb");

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            let barrier = Arc::clone(&barrier);
            let key = key.clone();
            tasks.push(tokio::spawn(async move {
                barrier.wait().await;
                cache
                    .get_or_compute(&key, || {
                        let call = calls.fetch_add(1, Ordering::SeqCst);
                        async move { Ok(call) }
                    })
                    .await
                    .unwrap()
            }));
        }

        let mut values = Vec::new();
        for task in tasks {
            values.push(task.await.unwrap());
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(values.iter().all(|value| *value == values[0]));
    }

    #[tokio::test]
    async fn test_error_is_not_cached() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let calls = AtomicUsize::new(0);
        let key = key("mongodb");

        let error = cache
            .get_or_compute(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("control plane down".to_string()) }
            })
            .await
            .unwrap_err();
        assert_eq!(*error, "control plane down");
        assert!(cache.is_empty());

        let value = cache
            .get_or_compute(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("conn".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(value, "conn");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_observe_same_error() {
        let cache: Arc<DbaasCache<String, String>> = Arc::new(DbaasCache::new());
        let key = key("mongodb");
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());

        let first = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let started = Arc::clone(&started);
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&key, move || async move {
                        started.notify_one();
                        gate.notified().await;
                        Err("boom".to_string())
                    })
                    .await
            })
        };

        started.notified().await;

        let late_calls = Arc::new(AtomicUsize::new(0));
        let second = {
            let cache = Arc::clone(&cache);
            let key = key.clone();
            let late_calls = Arc::clone(&late_calls);
            tokio::spawn(async move {
                cache
                    .get_or_compute(&key, move || {
                        late_calls.fetch_add(1, Ordering::SeqCst);
                        async { Ok("unreachable".to_string()) }
                    })
                    .await
            })
        };

        // Give the second caller a chance to attach to the pending slot
        // before the computation is released.
        tokio::task::yield_now().await;
        gate.notify_one();

        let first_error = first.await.unwrap().unwrap_err();
        let second_result = second.await.unwrap();

        match second_result {
            Err(second_error) => {
                assert!(Arc::ptr_eq(&first_error, &second_error));
                assert_eq!(late_calls.load(Ordering::SeqCst), 0);
            }
            // The second task lost the race and ran after the slot was
            // vacated; it then computed fresh, which is the retry contract.
            Ok(value) => {
                assert_eq!(value, "unreachable");
                assert_eq!(late_calls.load(Ordering::SeqCst), 1);
            }
        }
        assert_eq!(*first_error, "boom");
    }

    #[tokio::test]
    async fn test_replace_and_get() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let key = key("mongodb");
        assert_eq!(cache.get(&key), None);

        cache
            .get_or_compute(&key, || async { Ok("old".to_string()) })
            .await
            .unwrap();
        assert_eq!(cache.get(&key), Some("old".to_string()));

        cache.replace(key.clone(), "rotated".to_string());
        assert_eq!(cache.get(&key), Some("rotated".to_string()));

        let value = cache
            .get_or_compute(&key, || async { Ok("never".to_string()) })
            .await
            .unwrap();
        assert_eq!(value, "rotated");
    }

    #[tokio::test]
    async fn test_remove_vacates_slot() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let calls = AtomicUsize::new(0);
        let key = key("mongodb");

        cache
            .get_or_compute(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("conn".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(cache.remove(&key), Some("conn".to_string()));
        assert!(cache.is_empty());

        cache
            .get_or_compute(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("conn".to_string()) }
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_keys_equivalent_across_classifier_order() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let calls = AtomicUsize::new(0);

        let first = CacheKey::new(
            "mongodb",
            Classifier::new().with("service", "orders").with("scope", "default"),
        );
        let second = CacheKey::new(
            "mongodb",
            Classifier::new().with("scope", "default").with("service", "orders"),
        );

        cache
            .get_or_compute(&first, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("conn".to_string()) }
            })
            .await
            .unwrap();
        let value = cache
            .get_or_compute(&second, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok("other".to_string()) }
            })
            .await
            .unwrap();

        assert_eq!(value, "conn");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_share_slots() {
        let cache: DbaasCache<String, String> = DbaasCache::new();
        let service = key("mongodb");
        let other = CacheKey::new("mongodb", Classifier::new().with("scope", "tenant"));

        cache
            .get_or_compute(&service, || async { Ok("a".to_string()) })
            .await
            .unwrap();
        cache
            .get_or_compute(&other, || async { Ok("b".to_string()) })
            .await
            .unwrap();

        assert_eq!(cache.get(&service), Some("a".to_string()));
        assert_eq!(cache.get(&other), Some("b".to_string()));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_key_display() {
        let key = CacheKey::new("mongodb", Classifier::new().with("scope", "service"));
        assert_eq!(key.to_string(), "mongodb:{scope=service}");
        assert_eq!(key.db_kind(), "mongodb");
    }
}
