//! The job engine: owns the job state machine and drives planned tasks
//! against a fabric controller.
//!
//! `submit` is the creation gate — it validates the configuration, persists
//! the job as `pending`, then spawns one tokio task per job and returns
//! immediately. Jobs run concurrently; one job's retry backoff never stalls
//! another. All store writes go through `spawn_blocking` and are ordered per
//! job because the job's engine task is its sole writer.
//!
//! Failure policy is fail-fast: the first failed task marks the job `failed`
//! and skips the remaining tasks, since a failed prerequisite invalidates
//! anything that depends on it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

use weaver_core::config::{ControllerCredentials, FabricConfig};
use weaver_core::job::{JobStatus, ProvisioningJob};
use weaver_core::plan::plan;
use weaver_core::store::{NewTaskLog, Severity, Store};
use weaver_core::validate::{validate_with, Ruleset, ValidationResult};
use weaver_core::WeaverError;

use weaver_controller::{
    execute_task, ApicClient, Applied, AttemptOutcome, ControllerError, FabricController,
    RetryPolicy,
};

/// Builds a controller for one job's credentials. Injected so tests can
/// substitute scripted controllers for the real APIC client.
pub type ControllerFactory =
    Arc<dyn Fn(&ControllerCredentials) -> Result<Arc<dyn FabricController>, ControllerError> + Send + Sync>;

/// The production factory: an [`ApicClient`] per job.
pub fn apic_factory() -> ControllerFactory {
    Arc::new(|creds| Ok(Arc::new(ApicClient::new(creds)?) as Arc<dyn FabricController>))
}

/// One state-machine transition, broadcast after it is persisted. Events are
/// emitted in store-write order, so an SSE subscriber observes the same
/// sequence a poller would.
#[derive(Debug, Clone, Serialize)]
pub struct JobEvent {
    pub job_id: u64,
    pub status: JobStatus,
    pub progress: u8,
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("configuration validation failed")]
    Invalid(ValidationResult),

    #[error(transparent)]
    Store(#[from] WeaverError),
}

pub struct JobEngine {
    store: Arc<Store>,
    factory: ControllerFactory,
    ruleset: Ruleset,
    retry: RetryPolicy,
    event_tx: broadcast::Sender<JobEvent>,
    /// Cancellation flags for jobs with an engine task in flight.
    active: Mutex<HashMap<u64, Arc<AtomicBool>>>,
}

impl JobEngine {
    pub fn new(
        store: Arc<Store>,
        ruleset: Ruleset,
        factory: ControllerFactory,
        retry: RetryPolicy,
    ) -> Arc<Self> {
        let (event_tx, _) = broadcast::channel(256);
        Arc::new(Self {
            store,
            factory,
            ruleset,
            retry,
            event_tx,
            active: Mutex::new(HashMap::new()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.event_tx.subscribe()
    }

    /// Validate, persist as `pending`, and launch the job's engine task.
    ///
    /// This is the only entrypoint that creates jobs; an invalid
    /// configuration is rejected here regardless of what the caller checked.
    pub async fn submit(
        self: &Arc<Self>,
        name: &str,
        template_id: Option<u64>,
        config: FabricConfig,
    ) -> Result<ProvisioningJob, SubmitError> {
        let result = validate_with(&config, &self.ruleset);
        if !result.valid {
            return Err(SubmitError::Invalid(result));
        }

        let store = Arc::clone(&self.store);
        let job_name = name.to_string();
        let job = tokio::task::spawn_blocking(move || {
            store.create_job(&job_name, template_id, &config)
        })
        .await
        .map_err(|e| WeaverError::Store(e.to_string()))??;

        let flag = Arc::new(AtomicBool::new(false));
        self.active.lock().await.insert(job.id, flag);
        tokio::spawn(Arc::clone(self).run_job(job.clone()));

        Ok(job)
    }

    /// Request cooperative cancellation of a running job.
    ///
    /// Returns false when the job has no engine task in flight. The engine
    /// checks the flag between tasks: the in-flight task finishes, then the
    /// job is marked `failed` with a cancellation log entry.
    pub async fn cancel(&self, id: u64) -> bool {
        match self.active.lock().await.get(&id) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(job_id = id, "cancellation requested");
                true
            }
            None => false,
        }
    }

    async fn run_job(self: Arc<Self>, job: ProvisioningJob) {
        let id = job.id;
        info!(job_id = id, name = %job.name, "starting provisioning job");
        self.drive(&job).await;
        self.active.lock().await.remove(&id);
    }

    async fn drive(&self, job: &ProvisioningJob) {
        let id = job.id;
        let config = &job.fabric_config;

        let tasks = match plan(config) {
            Ok(tasks) => tasks,
            Err(e) => {
                self.log(NewTaskLog::new(
                    id,
                    "planning",
                    Severity::Error,
                    format!("Planning failed: {e}"),
                ))
                .await;
                self.fail(id).await;
                return;
            }
        };

        self.persist("mark_running", move |s| s.mark_running(id)).await;
        self.emit(id, JobStatus::Running, 0);
        self.log(NewTaskLog::new(
            id,
            "provisioning_start",
            Severity::Info,
            "Starting provisioning workflow",
        ))
        .await;

        let controller = match (self.factory)(&config.controller) {
            Ok(controller) => controller,
            Err(e) => {
                self.log(NewTaskLog::new(
                    id,
                    "controller_setup",
                    Severity::Error,
                    format!("Controller setup failed: {e}"),
                ))
                .await;
                self.fail(id).await;
                return;
            }
        };

        self.log(NewTaskLog::new(
            id,
            "controller_auth",
            Severity::Info,
            "Authenticating with fabric controller",
        ))
        .await;
        self.count_api_call().await;
        if let Err(e) = controller.authenticate().await {
            self.log(NewTaskLog::new(
                id,
                "controller_auth",
                Severity::Error,
                format!("Authentication failed: {e}"),
            ))
            .await;
            self.fail(id).await;
            return;
        }

        let total = tasks.len();
        let mut succeeded = 0usize;

        for task in &tasks {
            if self.cancelled(id).await {
                self.log(NewTaskLog::new(
                    id,
                    "job_cancelled",
                    Severity::Warning,
                    format!("Cancellation requested; stopping before task '{}'", task.name),
                ))
                .await;
                self.fail(id).await;
                return;
            }

            self.log(NewTaskLog::new(
                id,
                &task.name,
                Severity::Info,
                format!("Creating {}: {}", task.kind.label(), task.target),
            ))
            .await;

            let outcome = execute_task(controller.as_ref(), task, &self.retry).await;

            let attempt_count = outcome.attempts.len() as u32;
            for attempt in &outcome.attempts {
                self.count_api_call().await;
                match &attempt.outcome {
                    AttemptOutcome::Applied(Applied::Created) => {
                        self.log(NewTaskLog::new(
                            id,
                            &task.name,
                            Severity::Success,
                            format!("{} created successfully", task.kind.label()),
                        ))
                        .await;
                    }
                    AttemptOutcome::Applied(Applied::AlreadyExists) => {
                        self.log(NewTaskLog::new(
                            id,
                            &task.name,
                            Severity::Success,
                            format!(
                                "{} '{}' already exists; treated as success",
                                task.kind.label(),
                                task.target
                            ),
                        ))
                        .await;
                    }
                    AttemptOutcome::Failed { message, transient } => {
                        let terminal = attempt.number == attempt_count && outcome.result.is_err();
                        if terminal {
                            self.log(
                                NewTaskLog::new(
                                    id,
                                    &task.name,
                                    Severity::Error,
                                    format!("Failed: {message}"),
                                )
                                .with_detail(serde_json::json!({
                                    "attempts": attempt_count,
                                    "transient": transient,
                                })),
                            )
                            .await;
                        } else {
                            self.log(NewTaskLog::new(
                                id,
                                &task.name,
                                Severity::Warning,
                                format!("Attempt {} failed ({message}); retrying", attempt.number),
                            ))
                            .await;
                        }
                    }
                }
            }

            match outcome.result {
                Ok(_) => {
                    succeeded += 1;
                    let progress = progress_pct(succeeded, total);
                    self.persist("record_progress", move |s| s.record_progress(id, progress))
                        .await;
                    self.emit(id, JobStatus::Running, progress);
                }
                Err(failure) => {
                    warn!(job_id = id, task = %task.name, error = %failure.message, "task failed; stopping job");
                    self.fail(id).await;
                    return;
                }
            }
        }

        self.persist("mark_completed", move |s| s.mark_completed(id)).await;
        self.log(NewTaskLog::new(
            id,
            "provisioning_complete",
            Severity::Success,
            "Provisioning workflow completed successfully",
        ))
        .await;
        self.emit(id, JobStatus::Completed, 100);
        info!(job_id = id, "provisioning job completed");
    }

    async fn fail(&self, id: u64) {
        let job = self.persist("mark_failed", move |s| s.mark_failed(id)).await;
        let progress = job.map(|j| j.progress).unwrap_or(0);
        self.emit(id, JobStatus::Failed, progress);
        info!(job_id = id, progress, "provisioning job failed");
    }

    async fn cancelled(&self, id: u64) -> bool {
        self.active
            .lock()
            .await
            .get(&id)
            .map(|flag| flag.load(Ordering::SeqCst))
            .unwrap_or(false)
    }

    fn emit(&self, job_id: u64, status: JobStatus, progress: u8) {
        let _ = self.event_tx.send(JobEvent {
            job_id,
            status,
            progress,
        });
    }

    /// Append a log entry. Append failures are reported, never propagated —
    /// they must not change the outcome of the task that produced them.
    async fn log(&self, entry: NewTaskLog) {
        self.persist("append_log", move |s| s.append_log(entry.clone())).await;
    }

    async fn count_api_call(&self) {
        self.persist("record_api_call", |s| s.record_api_call()).await;
    }

    /// Run a store write on the blocking pool, retrying transient store
    /// failures a bounded number of times. A write that cannot be persisted
    /// is surfaced as a degraded-system diagnostic, never swallowed.
    async fn persist<T, F>(&self, what: &'static str, f: F) -> Option<T>
    where
        F: Fn(&Store) -> weaver_core::Result<T> + Clone + Send + 'static,
        T: Send + 'static,
    {
        const ATTEMPTS: u32 = 3;
        for attempt in 1..=ATTEMPTS {
            let store = Arc::clone(&self.store);
            let op = f.clone();
            match tokio::task::spawn_blocking(move || op(&store)).await {
                Ok(Ok(value)) => return Some(value),
                Ok(Err(e)) => {
                    let retriable = matches!(e, WeaverError::Store(_) | WeaverError::Io(_));
                    if !retriable || attempt == ATTEMPTS {
                        error!(op = what, error = %e, "store write failed; persisted state may lag");
                        return None;
                    }
                    warn!(op = what, attempt, error = %e, "store write failed; retrying");
                    tokio::time::sleep(Duration::from_millis(200)).await;
                }
                Err(e) => {
                    error!(op = what, error = %e, "store task panicked");
                    return None;
                }
            }
        }
        None
    }
}

fn progress_pct(succeeded: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((succeeded as f64 / total as f64) * 100.0).round() as u8
}

/// Mark jobs left `pending` or `running` by an interrupted server as
/// `failed`, with a diagnostic log entry. Called once on startup, before
/// the engine accepts new work. Returns the number of jobs recovered.
pub fn recover_interrupted(store: &Store) -> weaver_core::Result<u32> {
    let mut count = 0;
    for job in store.jobs(None)? {
        if !job.status.is_terminal() {
            store.mark_failed(job.id)?;
            store.append_log(NewTaskLog::new(
                job.id,
                "startup_recovery",
                Severity::Error,
                "Job interrupted by server restart",
            ))?;
            count += 1;
        }
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use weaver_controller::mock::ScriptedController;

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            attempt_timeout: Duration::from_secs(1),
        }
    }

    fn engine_with(
        controller: Arc<ScriptedController>,
    ) -> (TempDir, Arc<Store>, Arc<JobEngine>) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(Store::open(&dir.path().join("test.redb")).unwrap());
        let factory: ControllerFactory =
            Arc::new(move |_| Ok(Arc::clone(&controller) as Arc<dyn FabricController>));
        let engine = JobEngine::new(Arc::clone(&store), Ruleset::default(), factory, fast_retry());
        (dir, store, engine)
    }

    fn three_task_config() -> FabricConfig {
        serde_json::from_value(serde_json::json!({
            "site_code": "AUNTH",
            "fabric_type": "it",
            "controller": {"host": "10.0.0.1", "username": "admin", "secret": "s3cret"},
            "tenants": [{"name": "common", "description": "Common tenant"}],
            "vrfs": [{"name": "prod_vrf", "tenant": "common"}],
            "bridge_domains": [{"name": "web_bd", "tenant": "common", "vrf": "prod_vrf"}]
        }))
        .unwrap()
    }

    async fn wait_terminal(store: &Store, id: u64) -> ProvisioningJob {
        for _ in 0..500 {
            let job = store.job(id).unwrap();
            if job.status.is_terminal() {
                return job;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("job {id} never reached a terminal state");
    }

    fn task_logs_by_severity(store: &Store, id: u64, severity: Severity) -> Vec<String> {
        store
            .job_logs(id)
            .unwrap()
            .into_iter()
            .filter(|l| l.severity == severity && l.task_name.starts_with("create_"))
            .map(|l| l.task_name)
            .collect()
    }

    #[tokio::test]
    async fn successful_job_completes_with_full_progress() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, store, engine) = engine_with(Arc::clone(&controller));

        let job = engine
            .submit("lab fabric", None, three_task_config())
            .await
            .unwrap();
        assert_eq!(job.status, JobStatus::Pending);

        let done = wait_terminal(&store, job.id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress, 100);
        assert!(done.started_at.is_some());
        assert!(done.completed_at.is_some());

        let successes = task_logs_by_severity(&store, job.id, Severity::Success);
        assert_eq!(
            successes,
            vec!["create_tenant_common", "create_vrf_prod_vrf", "create_bd_web_bd"]
        );
        // One auth call plus one apply per task.
        assert_eq!(controller.auth_calls(), 1);
        assert_eq!(controller.apply_calls(), 3);
        assert_eq!(store.api_calls().unwrap(), 4);
    }

    #[tokio::test]
    async fn permanent_failure_fails_the_job_at_partial_progress() {
        let controller = Arc::new(ScriptedController::new());
        controller.push_apply(Ok(Applied::Created));
        controller.push_apply(Ok(Applied::Created));
        controller.push_apply(Err(ControllerError::Api {
            status: 400,
            message: "rejected by controller".into(),
        }));
        let (_dir, store, engine) = engine_with(controller);

        let job = engine
            .submit("partial", None, three_task_config())
            .await
            .unwrap();
        let done = wait_terminal(&store, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.progress, 67);
        assert_eq!(task_logs_by_severity(&store, job.id, Severity::Success).len(), 2);
        let errors = task_logs_by_severity(&store, job.id, Severity::Error);
        assert_eq!(errors, vec!["create_bd_web_bd"]);
    }

    #[tokio::test]
    async fn failed_task_skips_dependent_phases() {
        let mut config = three_task_config();
        config.app_profiles = vec![serde_json::from_value(serde_json::json!({
            "name": "web_app", "tenant": "common"
        }))
        .unwrap()];

        let controller = Arc::new(ScriptedController::new());
        controller.push_apply(Ok(Applied::Created));
        controller.push_apply(Ok(Applied::Created));
        controller.push_apply(Err(ControllerError::Api {
            status: 403,
            message: "denied".into(),
        }));
        let (_dir, store, engine) = engine_with(Arc::clone(&controller));

        let job = engine.submit("fail-fast", None, config).await.unwrap();
        let done = wait_terminal(&store, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        // The app-profile task after the failed bridge domain never ran.
        assert_eq!(controller.apply_calls(), 3);
        assert_eq!(done.progress, 50);
    }

    #[tokio::test]
    async fn transient_errors_retry_before_succeeding() {
        let controller = Arc::new(ScriptedController::new());
        controller.push_apply(Err(ControllerError::Timeout));
        let (_dir, store, engine) = engine_with(Arc::clone(&controller));

        let job = engine
            .submit("retried", None, three_task_config())
            .await
            .unwrap();
        let done = wait_terminal(&store, job.id).await;

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(controller.apply_calls(), 4);
        let warnings = task_logs_by_severity(&store, job.id, Severity::Warning);
        assert_eq!(warnings, vec!["create_tenant_common"]);
        // Auth + 4 attempts.
        assert_eq!(store.api_calls().unwrap(), 5);
    }

    #[tokio::test]
    async fn invalid_config_is_rejected_without_creating_a_job() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, store, engine) = engine_with(controller);

        let mut config = three_task_config();
        config.vrfs[0].tenant = "ghost".into();
        let err = engine.submit("bad", None, config).await.unwrap_err();
        match err {
            SubmitError::Invalid(result) => {
                assert!(!result.valid);
                assert!(!result.errors.is_empty());
            }
            other => panic!("expected Invalid, got {other}"),
        }
        assert!(store.jobs(None).unwrap().is_empty());
    }

    #[tokio::test]
    async fn auth_failure_fails_the_job_before_any_task() {
        let controller = Arc::new(ScriptedController::new());
        controller.push_auth(Err(ControllerError::AuthFailed("denied".into())));
        let (_dir, store, engine) = engine_with(Arc::clone(&controller));

        let job = engine
            .submit("no-auth", None, three_task_config())
            .await
            .unwrap();
        let done = wait_terminal(&store, job.id).await;

        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.progress, 0);
        assert_eq!(controller.apply_calls(), 0);
        let logs = store.job_logs(job.id).unwrap();
        assert!(logs
            .iter()
            .any(|l| l.task_name == "controller_auth" && l.severity == Severity::Error));
    }

    #[tokio::test]
    async fn cancellation_stops_between_tasks() {
        let controller =
            Arc::new(ScriptedController::new().with_delay(Duration::from_millis(30)));
        let (_dir, store, engine) = engine_with(controller);

        let job = engine
            .submit("cancel-me", None, three_task_config())
            .await
            .unwrap();
        // Wait for the job to start, then request cancellation.
        for _ in 0..200 {
            if store.job(job.id).unwrap().status == JobStatus::Running {
                break;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        assert!(engine.cancel(job.id).await);

        let done = wait_terminal(&store, job.id).await;
        assert_eq!(done.status, JobStatus::Failed);
        let logs = store.job_logs(job.id).unwrap();
        assert!(logs.iter().any(|l| l.task_name == "job_cancelled"));
        // Terminal job has no engine task left to cancel.
        assert!(!engine.cancel(job.id).await);
    }

    #[tokio::test]
    async fn cancel_returns_false_for_unknown_jobs() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, _store, engine) = engine_with(controller);
        assert!(!engine.cancel(42).await);
    }

    #[tokio::test]
    async fn events_report_monotonic_progress_and_terminal_status() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, _store, engine) = engine_with(controller);
        let mut rx = engine.subscribe();

        engine
            .submit("events", None, three_task_config())
            .await
            .unwrap();

        // Block on the channel rather than polling the store: the terminal
        // store write lands before the terminal event is broadcast.
        let mut last_progress = 0;
        let terminal = loop {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .expect("timed out waiting for a job event")
                .expect("event channel closed");
            assert!(event.progress >= last_progress, "progress decreased");
            last_progress = event.progress;
            if event.status.is_terminal() {
                break event;
            }
        };
        assert_eq!(terminal.status, JobStatus::Completed);
        assert_eq!(terminal.progress, 100);
    }

    #[tokio::test]
    async fn recover_interrupted_fails_leftover_jobs() {
        let dir = TempDir::new().unwrap();
        let store = Store::open(&dir.path().join("test.redb")).unwrap();
        let pending = store.create_job("pending", None, &three_task_config()).unwrap();
        let running = store.create_job("running", None, &three_task_config()).unwrap();
        store.mark_running(running.id).unwrap();
        let finished = store.create_job("finished", None, &three_task_config()).unwrap();
        store.mark_running(finished.id).unwrap();
        store.mark_completed(finished.id).unwrap();

        let recovered = recover_interrupted(&store).unwrap();
        assert_eq!(recovered, 2);
        assert_eq!(store.job(pending.id).unwrap().status, JobStatus::Failed);
        assert_eq!(store.job(running.id).unwrap().status, JobStatus::Failed);
        assert_eq!(store.job(finished.id).unwrap().status, JobStatus::Completed);
        assert!(store
            .job_logs(running.id)
            .unwrap()
            .iter()
            .any(|l| l.task_name == "startup_recovery"));
    }

    #[tokio::test]
    async fn store_write_retries_transient_failures() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, _store, engine) = engine_with(controller);

        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let value = engine
            .persist("flaky_write", move |_| {
                if seen.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(WeaverError::Store("database locked".into()))
                } else {
                    Ok(7u64)
                }
            })
            .await;

        assert_eq!(value, Some(7));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn store_write_gives_up_after_bounded_attempts() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, _store, engine) = engine_with(controller);

        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let value: Option<u64> = engine
            .persist("broken_write", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(WeaverError::Store("database locked".into()))
            })
            .await;

        // Surfaced as None, never a panic; the caller's job task keeps going.
        assert_eq!(value, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn store_write_does_not_retry_domain_errors() {
        let controller = Arc::new(ScriptedController::new());
        let (_dir, _store, engine) = engine_with(controller);

        let attempts = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let seen = Arc::clone(&attempts);
        let value: Option<u64> = engine
            .persist("missing_job_write", move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(WeaverError::JobNotFound(42))
            })
            .await;

        assert_eq!(value, None);
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn progress_rounds_to_nearest_percent() {
        assert_eq!(progress_pct(0, 3), 0);
        assert_eq!(progress_pct(1, 3), 33);
        assert_eq!(progress_pct(2, 3), 67);
        assert_eq!(progress_pct(3, 3), 100);
        assert_eq!(progress_pct(0, 0), 100);
    }
}
