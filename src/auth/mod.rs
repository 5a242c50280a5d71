//! Seam to the external identity provider.
//!
//! The executor asks the provider for a bearer credential before every
//! request; the provider is free to refresh it transparently.

use std::sync::Arc;
use async_trait::async_trait;
use parking_lot::RwLock;

#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current short-lived bearer token, or `None` when signed out. A signed
    /// out session still sends requests; the server decides rejection.
    async fn token(&self) -> anyhow::Result<Option<String>>;
}

pub type SharedTokenProvider = Arc<dyn TokenProvider>;

/// Never supplies a token.
#[derive(Debug, Default, Clone)]
pub struct Anonymous;

#[async_trait]
impl TokenProvider for Anonymous {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        Ok(None)
    }
}

/// Token held in memory and swapped by whoever owns the session.
#[derive(Debug, Default)]
pub struct StaticToken {
    token: RwLock<Option<String>>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: RwLock::new(Some(token.into())) }
    }

    pub fn set(&self, token: Option<String>) {
        *self.token.write() = token;
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.token.read().clone())
    }
}

/// Adapts an async closure, typically a call into the identity provider's SDK.
pub struct FnTokenProvider<F> {
    fetch: F,
}

impl<F, Fut> FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Option<String>>> + Send,
{
    pub fn new(fetch: F) -> Self {
        Self { fetch }
    }
}

#[async_trait]
impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: std::future::Future<Output = anyhow::Result<Option<String>>> + Send,
{
    async fn token(&self) -> anyhow::Result<Option<String>> {
        (self.fetch)().await
    }
}
