//! Keeps one in-progress scan live by re-reading it on a fixed interval.

use std::sync::Arc;
use std::time::Duration;
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use crate::cache::Query;
use crate::errors::ClientError;
use crate::models::Scan;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
}

impl PollState {
    /// State implied by a fetched scan. Only pending and running keep the
    /// poller going; an unrecognised status is treated as finished.
    fn after(scan: Option<&Scan>) -> Self {
        match scan {
            Some(scan) if scan.status.is_in_progress() => PollState::Polling,
            _ => PollState::Idle,
        }
    }
}

struct PollTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Polling state machine for a single scan, owned by the view showing it.
///
/// At most one timer runs per poller. Dropping the poller stops it.
pub struct LivePoller {
    query: Arc<Query<Scan>>,
    interval: Duration,
    state: Arc<watch::Sender<PollState>>,
    task: Mutex<Option<PollTask>>,
}

impl std::fmt::Debug for LivePoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LivePoller")
            .field("key", self.query.key())
            .field("interval", &self.interval)
            .field("state", &self.state())
            .finish()
    }
}

impl LivePoller {
    pub fn new(query: Query<Scan>, interval: Duration) -> Self {
        let (state, _) = watch::channel(PollState::Idle);
        Self {
            query: Arc::new(query),
            interval,
            state: Arc::new(state),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollState {
        *self.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<PollState> {
        self.state.subscribe()
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The query being polled, for reading the latest scan.
    pub fn query(&self) -> &Query<Scan> {
        &self.query
    }

    /// Begin polling.
    ///
    /// With a cached in-progress scan the first re-read waits one interval;
    /// with nothing cached the scan is read straight away; a cached scan that
    /// already finished leaves the poller idle. No-op while already polling.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            debug!(key = %self.query.key(), "Poller already running");
            return;
        }
        if !self.query.is_enabled() {
            debug!(key = %self.query.key(), "Poller has no scan id, staying idle");
            return;
        }

        let wait_first = match self.query.data() {
            None => false,
            Some(scan) if scan.status.is_in_progress() => true,
            Some(scan) => {
                debug!(scan_id = %scan.id, status = %scan.status, "Scan already finished, not polling");
                self.state.send_replace(PollState::Idle);
                return;
            }
        };
        if wait_first {
            self.state.send_replace(PollState::Polling);
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&self.query),
            self.interval,
            Arc::clone(&self.state),
            token.clone(),
            wait_first,
        ));
        info!(key = %self.query.key(), interval_ms = self.interval.as_millis() as u64, "Started polling");
        *task = Some(PollTask { token, handle });
    }

    /// Stop scheduling reads. A read already in flight completes normally
    /// but no further read is issued.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.token.cancel();
            debug!(key = %self.query.key(), "Stopped polling");
        }
        self.state.send_replace(PollState::Idle);
    }

    /// Issue one read now and move to the state it implies. A failed read
    /// leaves the state unchanged. Does not touch the timer.
    pub async fn tick(&self) -> Result<PollState, ClientError> {
        let next = poll_once(&self.query).await?;
        self.state.send_replace(next);
        Ok(next)
    }
}

impl Drop for LivePoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.token.cancel();
        }
    }
}

async fn poll_once(query: &Query<Scan>) -> Result<PollState, ClientError> {
    let scan = query.refetch().await?;
    Ok(PollState::after(scan.as_deref()))
}

async fn run(
    query: Arc<Query<Scan>>,
    interval: Duration,
    state: Arc<watch::Sender<PollState>>,
    token: CancellationToken,
    wait_first: bool,
) {
    if wait_first && !sleep_or_cancel(interval, &token).await {
        return;
    }

    // Failures only keep the loop alive once an in-progress status was seen.
    let mut seen_in_progress = wait_first;
    loop {
        let next = match poll_once(&query).await {
            Ok(next) => {
                seen_in_progress |= next == PollState::Polling;
                next
            }
            Err(e) if seen_in_progress => {
                // Already reported by the executor; keep the same cadence.
                warn!(key = %query.key(), error = ?e, "Poll read failed");
                PollState::Polling
            }
            Err(e) => {
                warn!(key = %query.key(), error = ?e, "First poll read failed, not polling");
                PollState::Idle
            }
        };
        if token.is_cancelled() {
            return;
        }
        state.send_replace(next);
        if next == PollState::Idle {
            info!(key = %query.key(), "Scan is not in progress, polling stopped");
            return;
        }
        if !sleep_or_cancel(interval, &token).await {
            return;
        }
    }
}

/// Returns false when cancelled before the interval elapsed.
async fn sleep_or_cancel(interval: Duration, token: &CancellationToken) -> bool {
    tokio::select! {
        _ = token.cancelled() => false,
        _ = tokio::time::sleep(interval) => true,
    }
}
