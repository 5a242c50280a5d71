use std::future::Future;
use std::sync::Arc;
use futures::future::{BoxFuture, FutureExt};
use tokio::time::Instant;
use crate::errors::ClientError;
use super::key::QueryKey;
use super::store::{QueryCache, Snapshot, Subscription};

type Fetcher<T> = Arc<dyn Fn() -> BoxFuture<'static, Result<T, ClientError>> + Send + Sync>;

/// Typed view of one key's snapshot.
#[derive(Debug)]
pub struct QueryState<T> {
    pub data: Option<Arc<T>>,
    pub updated_at: Option<Instant>,
    pub is_fetching: bool,
    pub is_invalidated: bool,
    pub error: Option<ClientError>,
}

impl<T: Send + Sync + 'static> QueryState<T> {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: snapshot.data.and_then(|d| d.downcast::<T>().ok()),
            updated_at: snapshot.updated_at,
            is_fetching: snapshot.is_fetching,
            is_invalidated: snapshot.is_invalidated,
            error: snapshot.error,
        }
    }

    fn empty() -> Self {
        Self {
            data: None,
            updated_at: None,
            is_fetching: false,
            is_invalidated: false,
            error: None,
        }
    }
}

/// A consumer's handle on one cached read.
///
/// Holds a subscription for as long as it lives, so the key is kept out of
/// garbage collection. A query whose scope id is missing is disabled: it
/// never subscribes and never touches the network.
pub struct Query<T> {
    cache: QueryCache,
    key: QueryKey,
    fetcher: Fetcher<T>,
    subscription: Option<Subscription>,
}

impl<T> std::fmt::Debug for Query<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("key", &self.key)
            .field("subscribed", &self.subscription.is_some())
            .finish()
    }
}

impl<T: Send + Sync + 'static> Query<T> {
    pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ClientError>> + Send + 'static,
    {
        let subscription = key.is_enabled().then(|| cache.subscribe(&key));
        Self {
            cache,
            key,
            fetcher: Arc::new(move || fetcher().boxed()),
            subscription,
        }
    }

    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_enabled()
    }

    /// Cache-aware read. `Ok(None)` means the query is disabled.
    pub async fn read(&self) -> Result<Option<Arc<T>>, ClientError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.fetch(&self.key, move || fetcher()).await.map(Some)
    }

    /// Read that ignores freshness but still joins a read already in flight.
    pub async fn refetch(&self) -> Result<Option<Arc<T>>, ClientError> {
        if !self.is_enabled() {
            return Ok(None);
        }
        let fetcher = Arc::clone(&self.fetcher);
        self.cache.refetch(&self.key, move || fetcher()).await.map(Some)
    }

    /// Last known value without issuing a request.
    pub fn data(&self) -> Option<Arc<T>> {
        if !self.is_enabled() {
            return None;
        }
        self.cache.get(&self.key)
    }

    pub fn state(&self) -> QueryState<T> {
        match &self.subscription {
            Some(subscription) => QueryState::from_snapshot(subscription.current()),
            None => QueryState::empty(),
        }
    }

    /// Wait for the key to change. Returns `None` straight away for a
    /// disabled query.
    pub async fn changed(&mut self) -> Option<QueryState<T>> {
        let subscription = self.subscription.as_mut()?;
        Some(QueryState::from_snapshot(subscription.changed().await))
    }
}
