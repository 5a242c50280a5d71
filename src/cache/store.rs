use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use crate::config::ClientConfig;
use crate::errors::ClientError;
use super::key::{QueryKey, Resource};

/// Type-erased cached value. Each key always holds the same concrete type.
pub type Payload = Arc<dyn Any + Send + Sync>;

type SharedRead = Shared<BoxFuture<'static, Result<Payload, ClientError>>>;

enum Pending {
    Cached(Payload),
    Waiting(SharedRead),
}

/// What a subscriber sees for one key.
#[derive(Clone, Default)]
pub struct Snapshot {
    pub data: Option<Payload>,
    pub updated_at: Option<Instant>,
    pub is_fetching: bool,
    pub is_invalidated: bool,
    /// Failure of the most recent applied read. Cleared by the next success.
    pub error: Option<ClientError>,
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("has_data", &self.data.is_some())
            .field("updated_at", &self.updated_at)
            .field("is_fetching", &self.is_fetching)
            .field("is_invalidated", &self.is_invalidated)
            .field("error", &self.error)
            .finish()
    }
}

struct InFlight {
    seq: u64,
    read: SharedRead,
}

struct Entry {
    data: Option<Payload>,
    updated_at: Option<Instant>,
    invalidated: bool,
    error: Option<ClientError>,
    inflight: Option<InFlight>,
    /// Sequence number of the newest request issued for this key.
    issued_seq: u64,
    subscribers: usize,
    released_at: Instant,
    tx: watch::Sender<Snapshot>,
}

impl Entry {
    fn new(now: Instant) -> Self {
        let (tx, _) = watch::channel(Snapshot::default());
        Self {
            data: None,
            updated_at: None,
            invalidated: false,
            error: None,
            inflight: None,
            issued_seq: 0,
            subscribers: 0,
            released_at: now,
            tx,
        }
    }

    fn is_fresh(&self, now: Instant, stale_time: Duration) -> bool {
        !self.invalidated
            && self
                .updated_at
                .is_some_and(|at| now.saturating_duration_since(at) < stale_time)
    }

    fn is_collectable(&self, now: Instant, gc_time: Duration) -> bool {
        self.subscribers == 0
            && self.inflight.is_none()
            && now.saturating_duration_since(self.released_at) >= gc_time
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            data: self.data.clone(),
            updated_at: self.updated_at,
            is_fetching: self.inflight.is_some(),
            is_invalidated: self.invalidated,
            error: self.error.clone(),
        }
    }

    fn publish(&self) {
        self.tx.send_replace(self.snapshot());
    }
}

struct Inner {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    stale_time: Duration,
    gc_time: Duration,
}

impl Inner {
    /// Apply a finished read unless a newer request for the key was issued
    /// after it.
    fn complete(&self, key: &QueryKey, seq: u64, result: &Result<Payload, ClientError>) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(key) else {
            debug!(key = %key, seq, "Read completed after its entry was evicted");
            return;
        };

        if entry.inflight.as_ref().is_some_and(|f| f.seq == seq) {
            entry.inflight = None;
        }

        if seq < entry.issued_seq {
            debug!(key = %key, seq, latest = entry.issued_seq, "Discarding superseded read");
            entry.publish();
            return;
        }

        match result {
            Ok(payload) => {
                entry.data = Some(Arc::clone(payload));
                entry.updated_at = Some(Instant::now());
                entry.invalidated = false;
                entry.error = None;
            }
            Err(e) => {
                entry.error = Some(e.clone());
            }
        }
        entry.publish();
    }

    fn release(&self, key: &QueryKey) {
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(key) {
            entry.subscribers = entry.subscribers.saturating_sub(1);
            if entry.subscribers == 0 {
                entry.released_at = Instant::now();
            }
        }
    }
}

/// Keyed store of server entities.
///
/// Concurrent reads of one key share a single request. Reads run on spawned
/// tasks, so a consumer that stops waiting never cancels the network call.
/// All bookkeeping sits behind one lock, which is what makes
/// [`QueryCache::invalidate_many`] atomic for observers.
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("stale_time", &self.inner.stale_time)
            .field("gc_time", &self.inner.gc_time)
            .finish()
    }
}

impl QueryCache {
    pub fn new(stale_time: Duration, gc_time: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                stale_time,
                gc_time,
            }),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.stale_time(), config.gc_time())
    }

    pub fn stale_time(&self) -> Duration {
        self.inner.stale_time
    }

    pub fn gc_time(&self) -> Duration {
        self.inner.gc_time
    }

    /// Serve `key` from the cache while fresh; otherwise join the in-flight
    /// read or issue a new one with `fetcher`.
    ///
    /// `fetcher` is called with the cache locked and must only build the
    /// request future.
    pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.read(key, fetcher, false).await
    }

    /// Like [`fetch`](Self::fetch) but ignores freshness. Still joins a read
    /// that is already in flight.
    pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        self.read(key, fetcher, true).await
    }

    async fn read<T, F, Fut>(&self, key: &QueryKey, fetcher: F, force: bool) -> Result<Arc<T>, ClientError>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let pending = {
            let mut entries = self.inner.entries.lock();
            let now = Instant::now();
            let entry = entries.entry(key.clone()).or_insert_with(|| Entry::new(now));

            let cached = if !force && entry.is_fresh(now, self.inner.stale_time) {
                entry.data.clone()
            } else {
                None
            };

            let joined = entry.inflight.as_ref().map(|f| (f.seq, f.read.clone()));
            match (cached, joined) {
                (Some(data), _) => {
                    trace!(key = %key, "Cache hit");
                    Pending::Cached(data)
                }
                (None, Some((seq, read))) => {
                    trace!(key = %key, seq, "Joining in-flight read");
                    Pending::Waiting(read)
                }
                (None, None) => Pending::Waiting(self.issue(key, entry, fetcher)),
            }
        };

        let payload = match pending {
            Pending::Cached(data) => data,
            Pending::Waiting(read) => read.await?,
        };
        downcast(key, payload)
    }

    fn issue<T, F, Fut>(&self, key: &QueryKey, entry: &mut Entry, fetcher: F) -> SharedRead
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        entry.issued_seq += 1;
        let seq = entry.issued_seq;

        let request = fetcher();
        let inner = Arc::clone(&self.inner);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            let result = request.await.map(|value| Arc::new(value) as Payload);
            inner.complete(&task_key, seq, &result);
            result
        });

        let label = key.to_string();
        let read: SharedRead = async move {
            handle.await.unwrap_or_else(|e| {
                Err(ClientError::Internal(format!("Read of {} did not finish: {}", label, e)))
            })
        }
        .boxed()
        .shared();

        entry.inflight = Some(InFlight { seq, read: read.clone() });
        entry.publish();
        debug!(key = %key, seq, "Issued read");
        read
    }

    /// Mark `key` stale so the next read refetches it.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.invalidate_many(std::slice::from_ref(key)) > 0
    }

    /// Mark every key stale under a single lock acquisition, then wake their
    /// subscribers. A read already in flight for one of the keys is detached:
    /// its waiters still get its value, but the cache will not store it.
    pub fn invalidate_many(&self, keys: &[QueryKey]) -> usize {
        let mut entries = self.inner.entries.lock();
        let mut touched = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(entry) = entries.get_mut(key) {
                entry.invalidated = true;
                if entry.inflight.take().is_some() {
                    entry.issued_seq += 1;
                }
                touched.push(key);
            }
        }
        for key in &touched {
            if let Some(entry) = entries.get(*key) {
                entry.publish();
            }
        }
        debug!(requested = keys.len(), invalidated = touched.len(), "Invalidated query keys");
        touched.len()
    }

    /// Invalidate every cached key of one resource, whatever its scope.
    pub fn invalidate_resource(&self, resource: Resource) -> usize {
        let keys: Vec<QueryKey> = {
            let entries = self.inner.entries.lock();
            entries.keys().filter(|k| k.resource() == resource).cloned().collect()
        };
        self.invalidate_many(&keys)
    }

    /// Store a value as if a read had just returned it.
    pub fn set_data<T: Send + Sync + 'static>(&self, key: &QueryKey, value: T) {
        let mut entries = self.inner.entries.lock();
        let now = Instant::now();
        let entry = entries.entry(key.clone()).or_insert_with(|| Entry::new(now));
        entry.issued_seq += 1;
        entry.inflight = None;
        entry.data = Some(Arc::new(value));
        entry.updated_at = Some(now);
        entry.invalidated = false;
        entry.error = None;
        entry.publish();
    }

    /// Last known value for `key`, fresh or not.
    pub fn get<T: Send + Sync + 'static>(&self, key: &QueryKey) -> Option<Arc<T>> {
        let data = self.inner.entries.lock().get(key).and_then(|e| e.data.clone())?;
        data.downcast::<T>().ok()
    }

    pub fn snapshot(&self, key: &QueryKey) -> Option<Snapshot> {
        self.inner.entries.lock().get(key).map(Entry::snapshot)
    }

    pub fn is_fresh(&self, key: &QueryKey) -> bool {
        self.inner
            .entries
            .lock()
            .get(key)
            .is_some_and(|e| e.is_fresh(Instant::now(), self.inner.stale_time))
    }

    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.lock().contains_key(key)
    }

    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner.entries.lock().get(key).map_or(0, |e| e.subscribers)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.lock().is_empty()
    }

    /// Register a consumer of `key`. The entry cannot be evicted while the
    /// returned guard is alive.
    pub fn subscribe(&self, key: &QueryKey) -> Subscription {
        let mut entries = self.inner.entries.lock();
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(Instant::now()));
        entry.subscribers += 1;
        let rx = entry.tx.subscribe();
        Subscription {
            cache: self.clone(),
            key: key.clone(),
            rx,
        }
    }

    /// Evict entries nobody references once `gc_time` has passed since their
    /// last consumer let go. Returns the number evicted.
    pub fn collect_garbage(&self) -> usize {
        let now = Instant::now();
        let gc_time = self.inner.gc_time;
        let mut entries = self.inner.entries.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let evict = entry.is_collectable(now, gc_time);
            if evict {
                trace!(key = %key, "Evicting cache entry");
            }
            !evict
        });
        before - entries.len()
    }

    /// Sweep on an interval until `token` is cancelled.
    pub fn spawn_gc(&self, every: Duration, token: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = cache.collect_garbage();
                        if evicted > 0 {
                            debug!(evicted, "Evicted unreferenced cache entries");
                        }
                    }
                }
            }
        })
    }
}

fn downcast<T: Send + Sync + 'static>(key: &QueryKey, payload: Payload) -> Result<Arc<T>, ClientError> {
    payload
        .downcast::<T>()
        .map_err(|_| ClientError::Internal(format!("Cached value for {} has an unexpected type", key)))
}

/// A consumer's reference to one key. Dropping it releases the reference.
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    rx: watch::Receiver<Snapshot>,
}

impl Subscription {
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn current(&self) -> Snapshot {
        self.rx.borrow().clone()
    }

    /// Wait for the next change to the key's snapshot.
    pub async fn changed(&mut self) -> Snapshot {
        // The sender lives in the entry, which cannot be evicted while this
        // subscription exists.
        let _ = self.rx.changed().await;
        self.rx.borrow_and_update().clone()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("key", &self.key).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cache.inner.release(&self.key);
    }
}
