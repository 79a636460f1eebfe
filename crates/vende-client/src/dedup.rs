//! In-flight request deduplication.
//!
//! Identical reads issued while an earlier one is still pending share its
//! outcome instead of hitting the network again. An entry lives until its
//! request settles; it is not a response cache. A pending entry older than
//! the dedup window is no longer joined and is replaced by a fresh request.
//!
//! The request runs on its own task, so dropping a caller does not cancel it.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Default dedup window.
pub const DEFAULT_DEDUP_WINDOW: Duration = Duration::from_millis(5000);

/// Build the dedup key for a request.
///
/// Parameters are sorted so logically identical parameter sets produce the
/// same key regardless of insertion order. Keys and values are quoted to keep
/// the encoding unambiguous.
#[must_use]
pub fn request_key(method: &str, endpoint: &str, params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut key = format!("{method} {endpoint}");
    for (i, (name, value)) in sorted.into_iter().enumerate() {
        key.push(if i == 0 { '?' } else { '&' });
        key.push_str(&format!("{name:?}={value:?}"));
    }
    key
}

struct PendingEntry<T> {
    id: u64,
    created_at: Instant,
    outcome: watch::Receiver<Option<T>>,
}

type Entries<T> = Arc<Mutex<HashMap<String, PendingEntry<T>>>>;

/// Shares the outcome of in-flight requests between identical callers.
pub struct DedupCache<T> {
    window: Duration,
    entries: Entries<T>,
    next_id: Arc<AtomicU64>,
}

impl<T> Clone for DedupCache<T> {
    fn clone(&self) -> Self {
        Self {
            window: self.window,
            entries: Arc::clone(&self.entries),
            next_id: Arc::clone(&self.next_id),
        }
    }
}

impl<T> std::fmt::Debug for DedupCache<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupCache")
            .field("window", &self.window)
            .field("pending", &self.len())
            .finish()
    }
}

impl<T> Default for DedupCache<T> {
    fn default() -> Self {
        Self::new(DEFAULT_DEDUP_WINDOW)
    }
}

impl<T> DedupCache<T> {
    /// Create a cache with the given dedup window.
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(0)),
        }
    }

    /// The dedup window.
    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Number of pending entries.
    #[must_use]
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Whether no request is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget all pending entries. Their requests keep running.
    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

impl<T> DedupCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Run `request` under `key`, or join a pending request with the same key.
    ///
    /// `request` is only polled if no fresh entry exists for `key`. Returns
    /// `None` if the request task died without producing an outcome.
    pub async fn run<F>(&self, key: String, request: F) -> Option<T>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut outcome = self.join_or_spawn(key, request);
        let settled = outcome.wait_for(Option::is_some).await;
        settled.ok().and_then(|value| value.clone())
    }

    fn join_or_spawn<F>(&self, key: String, request: F) -> watch::Receiver<Option<T>>
    where
        F: Future<Output = T> + Send + 'static,
    {
        let mut entries = lock(&self.entries);

        if let Some(entry) = entries.get(&key) {
            if entry.created_at.elapsed() < self.window {
                tracing::debug!(key = %key, "joining in-flight request");
                return entry.outcome.clone();
            }
            tracing::debug!(key = %key, "in-flight request outlived dedup window, issuing a new one");
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = watch::channel(None);
        entries.insert(
            key.clone(),
            PendingEntry {
                id,
                created_at: Instant::now(),
                outcome: receiver.clone(),
            },
        );
        drop(entries);

        let guard = EntryGuard {
            entries: Arc::clone(&self.entries),
            key,
            id,
        };
        tokio::spawn(async move {
            let outcome = request.await;
            drop(guard);
            sender.send_replace(Some(outcome));
        });

        receiver
    }
}

/// Removes its entry when the request settles or its task unwinds.
struct EntryGuard<T> {
    entries: Entries<T>,
    key: String,
    id: u64,
}

impl<T> Drop for EntryGuard<T> {
    fn drop(&mut self) {
        let mut entries = lock(&self.entries);
        // A newer request may have replaced this entry.
        if entries.get(&self.key).is_some_and(|entry| entry.id == self.id) {
            entries.remove(&self.key);
        }
    }
}

fn lock<T>(entries: &Mutex<HashMap<String, PendingEntry<T>>>) -> MutexGuard<'_, HashMap<String, PendingEntry<T>>> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counted(calls: &Arc<AtomicUsize>, value: u32, delay: Duration) -> impl Future<Output = u32> + Send + 'static {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            value
        }
    }

    #[test]
    fn key_ignores_parameter_order() {
        let a = request_key(
            "GET",
            "/products",
            &[("status".into(), "ACTIVE".into()), ("limit".into(), "20".into())],
        );
        let b = request_key(
            "GET",
            "/products",
            &[("limit".into(), "20".into()), ("status".into(), "ACTIVE".into())],
        );
        assert_eq!(a, b);
        assert_eq!(request_key("GET", "/companies", &[]), "GET /companies");
    }

    #[test]
    fn key_distinguishes_method_endpoint_and_values() {
        let params = [("q".to_string(), "a&b=c".to_string())];
        let other = [("q".to_string(), "a".to_string()), ("b".to_string(), "c".to_string())];
        assert_ne!(request_key("GET", "/x", &params), request_key("GET", "/x", &other));
        assert_ne!(request_key("GET", "/x", &[]), request_key("DELETE", "/x", &[]));
        assert_ne!(request_key("GET", "/x", &[]), request_key("GET", "/y", &[]));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_requests_share_one_call() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.run("k".into(), counted(&calls, 1, Duration::from_millis(100))),
            cache.run("k".into(), counted(&calls, 2, Duration::from_millis(100))),
        );

        assert_eq!(a, Some(1));
        assert_eq!(b, Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn settled_requests_are_not_cached() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        assert_eq!(cache.run("k".into(), counted(&calls, 1, Duration::ZERO)).await, Some(1));
        assert_eq!(cache.run("k".into(), counted(&calls, 2, Duration::ZERO)).await, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn requests_after_the_window_issue_a_new_call() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        cache.run("k".into(), counted(&calls, 1, Duration::from_millis(10))).await;
        tokio::time::sleep(Duration::from_millis(5000)).await;
        cache.run("k".into(), counted(&calls, 2, Duration::from_millis(10))).await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn different_keys_do_not_share() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            cache.run("a".into(), counted(&calls, 1, Duration::from_millis(100))),
            cache.run("b".into(), counted(&calls, 2, Duration::from_millis(100))),
        );

        assert_eq!((a, b), (Some(1), Some(2)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_pending_entry_is_replaced_and_not_evicted_by_old_request() {
        let cache = DedupCache::new(Duration::from_millis(5000));
        let calls = Arc::new(AtomicUsize::new(0));

        let old = tokio::spawn({
            let cache = cache.clone();
            let request = counted(&calls, 1, Duration::from_millis(8000));
            async move { cache.run("k".into(), request).await }
        });
        tokio::time::sleep(Duration::from_millis(6000)).await;

        let new = tokio::spawn({
            let cache = cache.clone();
            let request = counted(&calls, 2, Duration::from_millis(8000));
            async move { cache.run("k".into(), request).await }
        });

        assert_eq!(old.await.unwrap(), Some(1));
        // The replacement is still pending and joinable.
        assert_eq!(cache.len(), 1);
        let joined = cache.run("k".into(), counted(&calls, 3, Duration::ZERO)).await;
        assert_eq!(joined, Some(2));
        assert_eq!(new.await.unwrap(), Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn failures_are_shared_too() {
        let cache: DedupCache<Result<u32, String>> = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = |calls: &Arc<AtomicUsize>| {
            let calls = Arc::clone(calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err::<u32, String>("boom".into())
            }
        };

        let (a, b) = tokio::join!(
            cache.run("k".into(), failing(&calls)),
            cache.run("k".into(), failing(&calls)),
        );
        assert_eq!(a, Some(Err("boom".to_string())));
        assert_eq!(a, b);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_caller_does_not_cancel_the_request() {
        let cache = DedupCache::default();
        let finished = Arc::new(AtomicUsize::new(0));

        let done = Arc::clone(&finished);
        let request = async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            done.fetch_add(1, Ordering::SeqCst);
            7u32
        };
        let timed_out = tokio::time::timeout(Duration::from_millis(10), cache.run("k".into(), request)).await;
        assert!(timed_out.is_err());

        tokio::time::sleep(Duration::from_millis(1000)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_request_releases_its_entry() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let explode = true;
        let failed = cache
            .run("k".into(), async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                if explode {
                    panic!("request task panicked");
                }
                0u32
            })
            .await;
        assert_eq!(failed, None);
        assert!(cache.is_empty());

        let retried = cache.run("k".into(), counted(&calls, 5, Duration::ZERO)).await;
        assert_eq!(retried, Some(5));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_window_disables_sharing() {
        let cache = DedupCache::new(Duration::ZERO);
        let calls = Arc::new(AtomicUsize::new(0));

        tokio::join!(
            cache.run("k".into(), counted(&calls, 1, Duration::from_millis(100))),
            cache.run("k".into(), counted(&calls, 2, Duration::from_millis(100))),
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_forgets_pending_entries() {
        let cache = DedupCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        let pending = tokio::spawn({
            let cache = cache.clone();
            let request = counted(&calls, 1, Duration::from_millis(100));
            async move { cache.run("k".into(), request).await }
        });
        tokio::task::yield_now().await;
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(pending.await.unwrap(), Some(1));
    }
}
