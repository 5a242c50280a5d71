use std::sync::Arc;
use std::time::Duration;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::auth::SharedTokenProvider;
use crate::cache::{Query, QueryCache, QueryKey, Resource};
use crate::client::{endpoints, ApiClient};
use crate::config::{self, ClientConfig};
use crate::errors::ClientError;
use crate::models::{Finding, Project, Report, Scan, Target};
use crate::mutations::MutationDispatcher;
use crate::notify::SharedNotifier;
use crate::poller::LivePoller;

const MIN_GC_SWEEP: Duration = Duration::from_secs(1);

/// Entry point for a dashboard session: one executor, one cache, one
/// mutation dispatcher, and a typed query per endpoint.
#[derive(Debug, Clone)]
pub struct ScanboardClient {
    config: Arc<ClientConfig>,
    api: ApiClient,
    cache: QueryCache,
    mutations: MutationDispatcher,
}

impl ScanboardClient {
    pub fn new(
        config: ClientConfig,
        tokens: SharedTokenProvider,
        notifier: SharedNotifier,
    ) -> Result<Self, ClientError> {
        config::validate_config(&config)?;
        let api = ApiClient::new(&config, tokens, notifier)?;
        let cache = QueryCache::from_config(&config);
        let mutations = MutationDispatcher::new(api.clone(), cache.clone());
        info!(
            base_url = %api.base_url(),
            stale_time_ms = config.stale_time_ms,
            gc_time_ms = config.gc_time_ms,
            poll_interval_ms = config.poll_interval_ms,
            "Dashboard client ready"
        );
        Ok(Self {
            config: Arc::new(config),
            api,
            cache,
            mutations,
        })
    }

    /// Build from defaults overridden by `SCANBOARD_*` environment variables.
    pub fn from_env(tokens: SharedTokenProvider, notifier: SharedNotifier) -> Result<Self, ClientError> {
        Self::new(config::config_from_env()?, tokens, notifier)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn mutations(&self) -> &MutationDispatcher {
        &self.mutations
    }

    pub fn projects(&self) -> Query<Vec<Project>> {
        self.query(QueryKey::projects(), endpoints::projects())
    }

    pub fn targets(&self, project_id: Option<&str>) -> Query<Vec<Target>> {
        let id = project_id.unwrap_or_default();
        self.query(QueryKey::new(Resource::Targets, project_id), endpoints::project_targets(id))
    }

    pub fn scans(&self, project_id: Option<&str>) -> Query<Vec<Scan>> {
        let id = project_id.unwrap_or_default();
        self.query(QueryKey::new(Resource::Scans, project_id), endpoints::project_scans(id))
    }

    pub fn scan(&self, scan_id: Option<&str>) -> Query<Scan> {
        let id = scan_id.unwrap_or_default();
        self.query(QueryKey::new(Resource::Scan, scan_id), endpoints::scan(id))
    }

    pub fn findings(&self, scan_id: Option<&str>) -> Query<Vec<Finding>> {
        let id = scan_id.unwrap_or_default();
        self.query(QueryKey::new(Resource::Findings, scan_id), endpoints::scan_findings(id))
    }

    pub fn reports(&self, scan_id: Option<&str>) -> Query<Vec<Report>> {
        let id = scan_id.unwrap_or_default();
        self.query(QueryKey::new(Resource::Reports, scan_id), endpoints::scan_reports(id))
    }

    /// A poller for one scan at the configured interval. Call
    /// [`LivePoller::start`] once the view is showing it.
    pub fn watch_scan(&self, scan_id: &str) -> LivePoller {
        LivePoller::new(self.scan(Some(scan_id)), self.config.poll_interval())
    }

    /// Sweep unreferenced cache entries until `token` is cancelled.
    pub fn spawn_gc(&self, token: CancellationToken) -> JoinHandle<()> {
        let every = (self.config.gc_time() / 2).max(MIN_GC_SWEEP);
        self.cache.spawn_gc(every, token)
    }

    fn query<T>(&self, key: QueryKey, path: String) -> Query<T>
    where
        T: DeserializeOwned + Send + Sync + 'static,
    {
        let api = self.api.clone();
        Query::new(self.cache.clone(), key, move || {
            let api = api.clone();
            let path = path.clone();
            async move { api.get::<T>(&path).await.map(|response| response.data) }
        })
    }
}
