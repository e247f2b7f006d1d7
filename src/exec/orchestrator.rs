//! Execution job lifecycle
//!
//! One job at a time moves through `Idle -> Submitting -> Polling ->
//! Done | Failed`. The submit call and the status poll loop run as separate
//! tasks; the poll loop only ever updates progress, and it is stopped before
//! the job reaches a terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tokio::time::MissedTickBehavior;

use crate::common::config::{MissingEntryPolicy, PollingConfig};
use crate::common::{Error, Result};
use crate::session::languages::RemoteLanguage;
use crate::session::{CellId, SessionRepository, SessionStore};

use super::client::ExecutionService;
use super::protocol::{ExecutionRequest, ExecutionResult};
use super::request::build_request;

/// Job lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Nothing submitted yet
    Idle,
    /// Request handed to the service
    Submitting,
    /// Waiting for the result while sampling progress
    Polling,
    /// Result received
    Done,
    /// Submission failed or was cancelled
    Failed,
}

impl JobState {
    /// Whether a job is in flight
    pub fn is_active(self) -> bool {
        matches!(self, Self::Submitting | Self::Polling)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Submitting => write!(f, "submitting"),
            Self::Polling => write!(f, "polling"),
            Self::Done => write!(f, "done"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Observable job state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecutionJob {
    pub state: JobState,
    /// Fraction of the batch completed, in `[0, 1]`
    pub progress: f64,
}

impl Default for ExecutionJob {
    fn default() -> Self {
        Self {
            state: JobState::Idle,
            progress: 0.0,
        }
    }
}

/// Cooperative cancellation flag shared between tasks
#[derive(Debug, Clone)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once `cancel` has been called
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives as long as self, so this only returns on cancel
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// Handle to a submitted job
pub struct JobHandle {
    result: oneshot::Receiver<Result<ExecutionResult>>,
    cancel: CancelToken,
}

impl JobHandle {
    /// Wait for the service's answer
    pub async fn wait(self) -> Result<ExecutionResult> {
        match self.result.await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::JobCancelled),
        }
    }

    /// Stop the job; it ends in `Failed`
    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

/// Tokens of the job currently owned by the orchestrator
struct ActiveJob {
    poll_cancel: CancelToken,
}

/// Summary of a completed session run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Cells left out for lack of committed settings
    pub skipped: Vec<CellId>,
}

/// Drives batch execution against an [`ExecutionService`]
pub struct Orchestrator<S: ExecutionService + 'static> {
    service: Arc<S>,
    poll_interval: Duration,
    job: Arc<watch::Sender<ExecutionJob>>,
    active: Option<ActiveJob>,
}

impl<S: ExecutionService + 'static> Orchestrator<S> {
    pub fn new(service: S, polling: &PollingConfig) -> Self {
        let (job, _rx) = watch::channel(ExecutionJob::default());
        Self {
            service: Arc::new(service),
            poll_interval: polling.interval(),
            job: Arc::new(job),
            active: None,
        }
    }

    /// Current job state
    pub fn job(&self) -> ExecutionJob {
        *self.job.borrow()
    }

    /// Receiver that sees every job state and progress change
    pub fn subscribe(&self) -> watch::Receiver<ExecutionJob> {
        self.job.subscribe()
    }

    /// Start a job; rejected while another is in flight
    #[tracing::instrument(skip_all, fields(cells = request.message.options.len()))]
    pub fn submit(&mut self, request: ExecutionRequest) -> Result<JobHandle> {
        if self.job().state.is_active() {
            return Err(Error::JobInFlight);
        }

        self.job.send_replace(ExecutionJob {
            state: JobState::Submitting,
            progress: 0.0,
        });

        let cancel = CancelToken::new();
        let poll_cancel = CancelToken::new();
        let (result_tx, result_rx) = oneshot::channel();

        let poll = tokio::spawn(poll_loop(
            Arc::clone(&self.service),
            self.poll_interval,
            Arc::clone(&self.job),
            poll_cancel.clone(),
        ));

        self.job.send_modify(|job| job.state = JobState::Polling);
        tracing::debug!("Job submitted, polling for progress");

        let service = Arc::clone(&self.service);
        let job = Arc::clone(&self.job);
        let submit_cancel = cancel.clone();
        let submit_poll_cancel = poll_cancel.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = service.execute(&request) => outcome,
                _ = submit_cancel.cancelled() => Err(Error::JobCancelled),
            };

            // No progress tick may land after the terminal state
            submit_poll_cancel.cancel();
            if let Err(e) = poll.await {
                tracing::debug!(error = %e, "Poll task ended abnormally");
            }

            job.send_modify(|job| match &outcome {
                Ok(_) => {
                    job.state = JobState::Done;
                    job.progress = 1.0;
                }
                Err(_) => {
                    job.state = JobState::Failed;
                    job.progress = 0.0;
                }
            });
            match &outcome {
                Ok(result) => tracing::info!(cells = result.cells.len(), "Job finished"),
                Err(e) => tracing::warn!(error = %e, "Job failed"),
            }

            let _ = result_tx.send(outcome);
        });

        self.active = Some(ActiveJob { poll_cancel });
        Ok(JobHandle {
            result: result_rx,
            cancel,
        })
    }

    /// Build a request from the store, run it, and record the result
    #[tracing::instrument(skip_all)]
    pub async fn run_session<R: SessionRepository>(
        &mut self,
        store: &mut SessionStore<R>,
        policy: MissingEntryPolicy,
    ) -> Result<RunReport> {
        let built = build_request(store.session(), policy)?;
        let handle = self.submit(built.request)?;
        let result = handle.wait().await?;
        store.record_result(result)?;
        Ok(RunReport {
            skipped: built.skipped,
        })
    }

    /// Ask the service which versions and compilers it offers
    pub async fn fetch_languages(&self) -> Result<HashMap<String, RemoteLanguage>> {
        let languages = self.service.languages().await?;
        tracing::debug!(languages = languages.len(), "Fetched language catalog");
        Ok(languages)
    }
}

impl<S: ExecutionService + 'static> Drop for Orchestrator<S> {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.poll_cancel.cancel();
        }
    }
}

async fn poll_loop<S: ExecutionService + 'static>(
    service: Arc<S>,
    interval: Duration,
    job: Arc<watch::Sender<ExecutionJob>>,
    cancel: CancelToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let sample = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sample = service.status() => sample,
        };

        match sample {
            Ok(status) => {
                let progress = if status.status.is_finite() {
                    status.status.clamp(0.0, 1.0)
                } else {
                    0.0
                };
                job.send_if_modified(|job| {
                    if job.state == JobState::Polling && job.progress != progress {
                        job.progress = progress;
                        true
                    } else {
                        false
                    }
                });
                tracing::trace!(progress, "Progress sample");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Status polling stopped");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::protocol::{RequestMessage, StatusResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    #[derive(Default)]
    struct Gate {
        release: Notify,
        polls: AtomicUsize,
        fail_submit: bool,
    }

    #[async_trait]
    impl ExecutionService for Gate {
        async fn execute(&self, _request: &ExecutionRequest) -> Result<ExecutionResult> {
            self.release.notified().await;
            if self.fail_submit {
                Err(Error::submission(Some("Options list cannot be empty.")))
            } else {
                Ok(ExecutionResult::default())
            }
        }

        async fn status(&self) -> Result<StatusResponse> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            Ok(StatusResponse { status: 0.5 })
        }

        async fn languages(&self) -> Result<HashMap<String, RemoteLanguage>> {
            Ok(HashMap::new())
        }
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest {
            message: RequestMessage {
                options: Vec::new(),
                input: Vec::new(),
                output: Vec::new(),
                timeout: 60,
                generate_test_cases: false,
                test_cases_signature: String::new(),
                test_cases_count: 25,
            },
        }
    }

    fn polling() -> PollingConfig {
        PollingConfig { interval_ms: 5 }
    }

    #[tokio::test]
    async fn test_second_submit_rejected_while_in_flight() {
        let gate = Arc::new(Gate::default());
        let mut orch = Orchestrator::new(Arc::clone(&gate), &polling());
        let handle = orch.submit(request()).unwrap();
        assert_eq!(orch.job().state, JobState::Polling);
        assert!(matches!(orch.submit(request()), Err(Error::JobInFlight)));

        gate.release.notify_one();
        handle.wait().await.unwrap();
        assert_eq!(orch.job().state, JobState::Done);
        assert_eq!(orch.job().progress, 1.0);

        // A finished job no longer blocks the next one
        let next = orch.submit(request()).unwrap();
        next.cancel();
        assert!(matches!(next.wait().await, Err(Error::JobCancelled)));
        assert_eq!(orch.job().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_submit_failure_reaches_failed() {
        let gate = Arc::new(Gate { fail_submit: true, ..Default::default() });
        let mut orch = Orchestrator::new(Arc::clone(&gate), &polling());
        let handle = orch.submit(request()).unwrap();
        gate.release.notify_one();
        let err = handle.wait().await.unwrap_err();
        assert_eq!(err.to_string(), "Execution failed: Options list cannot be empty.");
        assert_eq!(orch.job().state, JobState::Failed);
    }

    #[tokio::test]
    async fn test_failed_job_resets_progress() {
        let gate = Arc::new(Gate { fail_submit: true, ..Default::default() });
        let mut orch = Orchestrator::new(Arc::clone(&gate), &polling());
        let mut rx = orch.subscribe();
        let handle = orch.submit(request()).unwrap();

        rx.wait_for(|job| job.progress > 0.0).await.unwrap();
        assert_eq!(orch.job().progress, 0.5);

        gate.release.notify_one();
        assert!(handle.wait().await.is_err());
        assert_eq!(orch.job().state, JobState::Failed);
        assert_eq!(orch.job().progress, 0.0);
    }

    #[tokio::test]
    async fn test_cancel_token() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
        token.cancelled().await;
    }

    #[test]
    fn test_state_display() {
        assert_eq!(JobState::Polling.to_string(), "polling");
        assert!(JobState::Submitting.is_active());
        assert!(JobState::Failed.is_terminal());
        assert!(!JobState::Idle.is_active());
    }
}
