//! Create requests and the cache keys each one makes stale.

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::Mutex;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use crate::cache::{QueryCache, QueryKey};
use crate::client::{endpoints, ApiClient};
use crate::errors::ClientError;
use crate::models::{
    GenerateReport, NewProject, NewScan, NewTarget, Project, Report, Scan, ScanSchedule, Target,
    Validate,
};
use crate::notify::Notification;

/// A write against the API.
///
/// Declares its request, the keys a success invalidates, and the message
/// shown once it succeeds.
pub trait Mutation: Validate + Serialize + Send + Sync {
    type Output: DeserializeOwned + Send + 'static;

    const NAME: &'static str;

    fn method(&self) -> Method {
        Method::POST
    }

    fn path(&self) -> String;

    fn invalidates(&self) -> Vec<QueryKey>;

    fn success_message(&self) -> &'static str;
}

impl Mutation for NewProject {
    type Output = Project;
    const NAME: &'static str = "create_project";

    fn path(&self) -> String {
        endpoints::projects()
    }

    fn invalidates(&self) -> Vec<QueryKey> {
        vec![QueryKey::projects()]
    }

    fn success_message(&self) -> &'static str {
        "Project created successfully"
    }
}

impl Mutation for NewTarget {
    type Output = Target;
    const NAME: &'static str = "create_target";

    fn path(&self) -> String {
        endpoints::project_targets(&self.project_id)
    }

    fn invalidates(&self) -> Vec<QueryKey> {
        vec![QueryKey::targets(&self.project_id)]
    }

    fn success_message(&self) -> &'static str {
        "Target added successfully"
    }
}

impl Mutation for NewScan {
    type Output = Scan;
    const NAME: &'static str = "create_scan";

    fn path(&self) -> String {
        endpoints::scans()
    }

    fn invalidates(&self) -> Vec<QueryKey> {
        vec![QueryKey::scans(&self.project_id)]
    }

    fn success_message(&self) -> &'static str {
        "Scan started successfully"
    }
}

impl Mutation for GenerateReport {
    type Output = Report;
    const NAME: &'static str = "generate_report";

    fn path(&self) -> String {
        endpoints::scan_reports(&self.scan_id)
    }

    fn invalidates(&self) -> Vec<QueryKey> {
        vec![QueryKey::reports(&self.scan_id)]
    }

    fn success_message(&self) -> &'static str {
        "Report generated successfully"
    }
}

/// Result of [`MutationDispatcher::schedule_scan`].
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduleOutcome {
    /// The scan was created and is starting now.
    Started(Scan),
    /// A recurring schedule. Nothing was sent; the cron expression is handed
    /// back for whoever owns scheduling.
    Deferred { cron: String },
}

type PendingCounts = Arc<Mutex<HashMap<&'static str, usize>>>;

/// Counts in-flight dispatches of one mutation kind. Decrements on drop, so
/// the flag clears whether the request succeeded, failed, or was abandoned.
struct PendingGuard {
    pending: PendingCounts,
    name: &'static str,
}

impl PendingGuard {
    fn enter(pending: &PendingCounts, name: &'static str) -> Self {
        *pending.lock().entry(name).or_insert(0) += 1;
        Self { pending: Arc::clone(pending), name }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if let Some(count) = pending.get_mut(self.name) {
            *count -= 1;
            if *count == 0 {
                pending.remove(self.name);
            }
        }
    }
}

/// Issues mutations and invalidates their dependent keys on success.
///
/// Mutations are not idempotent and are never retried. On failure nothing
/// is invalidated and the executor's error notification is the only one.
#[derive(Debug, Clone)]
pub struct MutationDispatcher {
    client: ApiClient,
    cache: QueryCache,
    pending: PendingCounts,
}

impl MutationDispatcher {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self {
            client,
            cache,
            pending: Arc::default(),
        }
    }

    /// True while any mutation from this dispatcher is awaiting its response.
    pub fn is_pending(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    /// True while a mutation of kind `M` is awaiting its response.
    pub fn is_pending_for<M: Mutation>(&self) -> bool {
        self.pending.lock().contains_key(M::NAME)
    }

    pub async fn dispatch<M: Mutation>(&self, mutation: &M) -> Result<M::Output, ClientError> {
        if let Err(e) = mutation.validate() {
            debug!(mutation = M::NAME, error = %e, "Mutation rejected by validation");
            return Err(e);
        }

        let response = {
            let _pending = PendingGuard::enter(&self.pending, M::NAME);
            self.client
                .request::<M::Output, M>(mutation.method(), &mutation.path(), Some(mutation))
                .await?
        };

        let keys = mutation.invalidates();
        self.cache.invalidate_many(&keys);
        info!(mutation = M::NAME, invalidated = keys.len(), "Mutation succeeded");
        self.client
            .notifier()
            .notify(Notification::success(mutation.success_message()));
        Ok(response.data)
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project, ClientError> {
        self.dispatch(project).await
    }

    pub async fn create_target(&self, target: &NewTarget) -> Result<Target, ClientError> {
        self.dispatch(target).await
    }

    pub async fn create_scan(&self, scan: &NewScan) -> Result<Scan, ClientError> {
        self.dispatch(scan).await
    }

    pub async fn generate_report(&self, report: &GenerateReport) -> Result<Report, ClientError> {
        self.dispatch(report).await
    }

    /// Start a scan now, or validate a recurring schedule and return its cron
    /// expression without contacting the API.
    pub async fn schedule_scan(
        &self,
        scan: &NewScan,
        schedule: &ScanSchedule,
    ) -> Result<ScheduleOutcome, ClientError> {
        schedule.validate()?;
        scan.validate()?;
        if schedule.runs_immediately() {
            return self.create_scan(scan).await.map(ScheduleOutcome::Started);
        }
        let cron = schedule.cron_expression()?;
        info!(
            project_id = %scan.project_id,
            target_id = %scan.target_id,
            cron = %cron,
            "Scan scheduled"
        );
        Ok(ScheduleOutcome::Deferred { cron })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use crate::auth::Anonymous;
    use crate::config::ClientConfig;
    use crate::models::ReportFormat;
    use crate::notify::MemoryNotifier;
    use tokio::net::TcpListener;

    // Nothing listens on the discard port, so any request that slips through
    // would fail with a network error and a notification.
    fn dispatcher() -> (MutationDispatcher, Arc<MemoryNotifier>, QueryCache) {
        let notifier = Arc::new(MemoryNotifier::new());
        let config = ClientConfig::with_base_url("http://127.0.0.1:9");
        let client = ApiClient::new(&config, Arc::new(Anonymous), notifier.clone()).unwrap();
        let cache = QueryCache::new(Duration::from_secs(30), Duration::from_secs(300));
        (MutationDispatcher::new(client, cache.clone()), notifier, cache)
    }

    #[test]
    fn test_declared_requests() {
        let target = NewTarget::new("p1", "site", "https://example.com");
        assert_eq!(target.path(), "/api/projects/p1/targets");
        assert_eq!(target.invalidates(), vec![QueryKey::targets("p1")]);

        let scan = NewScan::new("p1", "t1");
        assert_eq!(scan.path(), "/api/scans");
        assert_eq!(scan.invalidates(), vec![QueryKey::scans("p1")]);

        let report = GenerateReport::new("s1", ReportFormat::Pdf);
        assert_eq!(report.path(), "/api/scans/s1/reports");
        assert_eq!(report.invalidates(), vec![QueryKey::reports("s1")]);
        assert_eq!(report.method(), Method::POST);

        assert_eq!(NewProject::new("x").invalidates(), vec![QueryKey::projects()]);
        assert_eq!(NewProject::new("x").success_message(), "Project created successfully");
    }

    #[tokio::test]
    async fn test_validation_failure_never_reaches_network() {
        let (dispatcher, notifier, cache) = dispatcher();
        cache.set_data(&QueryKey::targets("p1"), 1u8);

        let err = dispatcher
            .create_target(&NewTarget::new("p1", "", "https://example.com"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Validation("Target name is required".into()));

        let err = dispatcher
            .create_target(&NewTarget::new("p1", "site", "not a url"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Validation("Must be a valid URL".into()));

        assert!(notifier.is_empty());
        assert!(!dispatcher.is_pending());
        assert!(cache.is_fresh(&QueryKey::targets("p1")));
    }

    #[tokio::test]
    async fn test_recurring_schedule_is_deferred() {
        let (dispatcher, notifier, _) = dispatcher();
        let outcome = dispatcher
            .schedule_scan(&NewScan::new("p1", "t1"), &ScanSchedule::weekly("14:30", 3))
            .await
            .unwrap();
        assert_eq!(outcome, ScheduleOutcome::Deferred { cron: "30 14 * * 3".into() });
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_schedule_rejected() {
        let (dispatcher, notifier, _) = dispatcher();
        let err = dispatcher
            .schedule_scan(&NewScan::new("p1", "t1"), &ScanSchedule::daily("25:00"))
            .await
            .unwrap_err();
        assert_eq!(err, ClientError::Validation("Time must be in HH:MM format".into()));
        assert!(notifier.is_empty());
    }

    #[tokio::test]
    async fn test_failed_request_clears_pending_and_keeps_cache() {
        let (dispatcher, notifier, cache) = dispatcher();
        cache.set_data(&QueryKey::projects(), 1u8);

        let err = dispatcher.create_project(&NewProject::new("Acme")).await.unwrap_err();
        assert!(matches!(err, ClientError::Network(_)));
        assert!(!dispatcher.is_pending());
        assert!(cache.is_fresh(&QueryKey::projects()));
        assert_eq!(notifier.error_count(), 1);
        assert_eq!(notifier.len(), 1);
    }

    #[tokio::test]
    async fn test_pending_is_tracked_per_mutation_kind() {
        // Accepts connections and never answers, so the request stays in flight.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let notifier = Arc::new(MemoryNotifier::new());
        let config = ClientConfig::with_base_url(format!("http://{}", addr));
        let client = ApiClient::new(&config, Arc::new(Anonymous), notifier).unwrap();
        let cache = QueryCache::new(Duration::from_secs(30), Duration::from_secs(300));
        let dispatcher = MutationDispatcher::new(client, cache);

        let inflight = {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .generate_report(&GenerateReport::new("s1", ReportFormat::Pdf))
                    .await
            })
        };
        tokio::time::timeout(Duration::from_secs(5), async {
            while !dispatcher.is_pending_for::<GenerateReport>() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("report request should be in flight");

        assert!(dispatcher.is_pending());
        assert!(!dispatcher.is_pending_for::<NewTarget>());
        assert!(!dispatcher.is_pending_for::<NewScan>());

        inflight.abort();
        assert!(inflight.await.unwrap_err().is_cancelled());
        assert!(!dispatcher.is_pending_for::<GenerateReport>());
        assert!(!dispatcher.is_pending());
        server.abort();
    }
}
