//! Durable job store and append-only log sink, backed by redb.
//!
//! # Table design
//!
//! Four tables, all JSON-valued except the counters:
//! - `jobs`: u64 job id → JSON [`ProvisioningJob`]
//! - `task_logs`: u64 global log sequence → JSON [`TaskLog`]
//! - `templates`: u64 template id → JSON [`Template`]
//! - `counters`: name → u64 (id sequences plus the executor call counter)
//!
//! Ids are allocated from monotonic counters inside the same write
//! transaction as the insert, so key order equals creation order and a
//! plain ascending scan returns records chronologically.
//!
//! Every status transition is a single read-modify-write transaction that
//! validates the transition and stamps the relevant timestamp together with
//! the status — a reader can never observe `running` without `started_at`.
//! redb's single-writer commit protocol serializes concurrent writers, so
//! two workers cannot race a transition on the same job.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, Table, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::config::FabricConfig;
use crate::error::{Result, WeaverError};
use crate::job::{JobStatus, ProvisioningJob};
use crate::template::{default_templates, Template};

// ---------------------------------------------------------------------------
// Table definitions
// ---------------------------------------------------------------------------

const JOBS: TableDefinition<u64, &[u8]> = TableDefinition::new("jobs");
const TASK_LOGS: TableDefinition<u64, &[u8]> = TableDefinition::new("task_logs");
const TEMPLATES: TableDefinition<u64, &[u8]> = TableDefinition::new("templates");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const JOB_SEQ: &str = "job_seq";
const LOG_SEQ: &str = "log_seq";
const TEMPLATE_SEQ: &str = "template_seq";
const API_CALLS: &str = "api_calls";

fn db_err(e: impl std::fmt::Display) -> WeaverError {
    WeaverError::Store(e.to_string())
}

/// Allocate the next value of a named sequence within the current write txn.
fn bump(counters: &mut Table<'_, &str, u64>, key: &str) -> Result<u64> {
    let next = counters
        .get(key)
        .map_err(db_err)?
        .map(|v| v.value())
        .unwrap_or(0)
        + 1;
    counters.insert(key, next).map_err(db_err)?;
    Ok(next)
}

// ---------------------------------------------------------------------------
// Task logs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Error,
    Warning,
}

/// One append-only log entry tied to a job. Never mutated once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskLog {
    pub id: u64,
    pub job_id: u64,
    pub task_name: String,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

/// A log entry before the store assigns its sequence and timestamp.
#[derive(Debug, Clone)]
pub struct NewTaskLog {
    pub job_id: u64,
    pub task_name: String,
    pub severity: Severity,
    pub message: String,
    pub detail: Option<serde_json::Value>,
}

impl NewTaskLog {
    pub fn new(
        job_id: u64,
        task_name: impl Into<String>,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            job_id,
            task_name: task_name.into(),
            severity,
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: serde_json::Value) -> Self {
        self.detail = Some(detail);
        self
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Persistent store for jobs, task logs, and templates.
pub struct Store {
    db: Database,
}

impl Store {
    /// Open or create the database at `path`.
    ///
    /// Ensures all tables exist and seeds the default templates on first open.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(db_err)?;
        let wt = db.begin_write().map_err(db_err)?;
        {
            wt.open_table(JOBS).map_err(db_err)?;
            wt.open_table(TASK_LOGS).map_err(db_err)?;
            let mut templates = wt.open_table(TEMPLATES).map_err(db_err)?;
            let mut counters = wt.open_table(COUNTERS).map_err(db_err)?;
            let seeded = counters
                .get(TEMPLATE_SEQ)
                .map_err(db_err)?
                .map(|v| v.value())
                .unwrap_or(0)
                > 0;
            if !seeded {
                let now = Utc::now();
                for (name, kind, description, config) in default_templates() {
                    let id = bump(&mut counters, TEMPLATE_SEQ)?;
                    let template = Template {
                        id,
                        name: name.into(),
                        kind,
                        description: description.into(),
                        config,
                        created_at: now,
                        updated_at: now,
                    };
                    templates
                        .insert(id, serde_json::to_vec(&template)?.as_slice())
                        .map_err(db_err)?;
                }
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(Self { db })
    }

    // --- jobs ---

    /// Persist a new job: assigns the id and the initial `pending` state
    /// atomically with the config snapshot.
    pub fn create_job(
        &self,
        name: &str,
        template_id: Option<u64>,
        config: &FabricConfig,
    ) -> Result<ProvisioningJob> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let job = {
            let mut counters = wt.open_table(COUNTERS).map_err(db_err)?;
            let id = bump(&mut counters, JOB_SEQ)?;
            drop(counters);
            let job = ProvisioningJob {
                id,
                name: name.to_string(),
                template_id,
                fabric_config: config.clone(),
                status: JobStatus::Pending,
                progress: 0,
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
            };
            let mut jobs = wt.open_table(JOBS).map_err(db_err)?;
            jobs.insert(id, serde_json::to_vec(&job)?.as_slice())
                .map_err(db_err)?;
            job
        };
        wt.commit().map_err(db_err)?;
        Ok(job)
    }

    pub fn job(&self, id: u64) -> Result<ProvisioningJob> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(JOBS).map_err(db_err)?;
        match table.get(id).map_err(db_err)? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Err(WeaverError::JobNotFound(id)),
        }
    }

    /// All jobs in creation order, optionally filtered by status.
    pub fn jobs(&self, status: Option<JobStatus>) -> Result<Vec<ProvisioningJob>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(JOBS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let job: ProvisioningJob = serde_json::from_slice(v.value())?;
            if status.is_none_or(|s| job.status == s) {
                result.push(job);
            }
        }
        Ok(result)
    }

    /// Transition `pending -> running`, stamping `started_at`.
    pub fn mark_running(&self, id: u64) -> Result<ProvisioningJob> {
        self.update_job(id, |job| {
            if job.status != JobStatus::Pending {
                return Err(invalid_transition(
                    job.status,
                    JobStatus::Running,
                    "only a pending job may start",
                ));
            }
            job.status = JobStatus::Running;
            job.started_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Update progress on a running job. Progress may never decrease.
    pub fn record_progress(&self, id: u64, progress: u8) -> Result<ProvisioningJob> {
        self.update_job(id, |job| {
            if job.status != JobStatus::Running {
                return Err(invalid_transition(
                    job.status,
                    job.status,
                    "progress updates require a running job",
                ));
            }
            if progress < job.progress {
                return Err(invalid_transition(
                    job.status,
                    job.status,
                    "progress may not decrease",
                ));
            }
            job.progress = progress.min(100);
            Ok(())
        })
    }

    /// Transition `running -> completed`: progress 100, `completed_at` stamped.
    pub fn mark_completed(&self, id: u64) -> Result<ProvisioningJob> {
        self.update_job(id, |job| {
            if job.status != JobStatus::Running {
                return Err(invalid_transition(
                    job.status,
                    JobStatus::Completed,
                    "only a running job may complete",
                ));
            }
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Transition `pending|running -> failed`, stamping `completed_at`.
    ///
    /// A pending job can fail when planning or controller setup fails before
    /// any task runs, and on startup recovery of interrupted jobs.
    pub fn mark_failed(&self, id: u64) -> Result<ProvisioningJob> {
        self.update_job(id, |job| {
            if job.status.is_terminal() {
                return Err(invalid_transition(
                    job.status,
                    JobStatus::Failed,
                    "terminal states are final",
                ));
            }
            job.status = JobStatus::Failed;
            job.completed_at = Some(Utc::now());
            Ok(())
        })
    }

    /// Delete a job and cascade its logs. Refused while the job is running.
    pub fn delete_job(&self, id: u64) -> Result<()> {
        let wt = self.db.begin_write().map_err(db_err)?;
        {
            let mut jobs = wt.open_table(JOBS).map_err(db_err)?;
            let job: ProvisioningJob = match jobs.get(id).map_err(db_err)? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => return Err(WeaverError::JobNotFound(id)),
            };
            if job.status == JobStatus::Running {
                return Err(WeaverError::JobRunning(id));
            }
            jobs.remove(id).map_err(db_err)?;

            let mut logs = wt.open_table(TASK_LOGS).map_err(db_err)?;
            let mut stale = Vec::new();
            for entry in logs.iter().map_err(db_err)? {
                let (k, v) = entry.map_err(db_err)?;
                let log: TaskLog = serde_json::from_slice(v.value())?;
                if log.job_id == id {
                    stale.push(k.value());
                }
            }
            for key in stale {
                logs.remove(key).map_err(db_err)?;
            }
        }
        wt.commit().map_err(db_err)?;
        Ok(())
    }

    // --- log sink ---

    /// Append one log entry. The job must exist; the store assigns the
    /// global sequence and timestamp.
    pub fn append_log(&self, entry: NewTaskLog) -> Result<TaskLog> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let log = {
            let jobs = wt.open_table(JOBS).map_err(db_err)?;
            if jobs.get(entry.job_id).map_err(db_err)?.is_none() {
                return Err(WeaverError::JobNotFound(entry.job_id));
            }
            drop(jobs);
            let mut counters = wt.open_table(COUNTERS).map_err(db_err)?;
            let id = bump(&mut counters, LOG_SEQ)?;
            drop(counters);
            let log = TaskLog {
                id,
                job_id: entry.job_id,
                task_name: entry.task_name,
                severity: entry.severity,
                message: entry.message,
                detail: entry.detail,
                timestamp: Utc::now(),
            };
            let mut logs = wt.open_table(TASK_LOGS).map_err(db_err)?;
            logs.insert(id, serde_json::to_vec(&log)?.as_slice())
                .map_err(db_err)?;
            log
        };
        wt.commit().map_err(db_err)?;
        Ok(log)
    }

    /// Logs for one job, in chronological (append) order.
    pub fn job_logs(&self, job_id: u64) -> Result<Vec<TaskLog>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let jobs = rt.open_table(JOBS).map_err(db_err)?;
        if jobs.get(job_id).map_err(db_err)?.is_none() {
            return Err(WeaverError::JobNotFound(job_id));
        }
        let table = rt.open_table(TASK_LOGS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            let log: TaskLog = serde_json::from_slice(v.value())?;
            if log.job_id == job_id {
                result.push(log);
            }
        }
        Ok(result)
    }

    /// The most recent `limit` logs across all jobs, newest first.
    pub fn recent_logs(&self, limit: usize) -> Result<Vec<TaskLog>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TASK_LOGS).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)?.rev().take(limit) {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice(v.value())?);
        }
        Ok(result)
    }

    // --- counters ---

    /// Increment the executor call counter. Returns the new total.
    pub fn record_api_call(&self) -> Result<u64> {
        let wt = self.db.begin_write().map_err(db_err)?;
        let total = {
            let mut counters = wt.open_table(COUNTERS).map_err(db_err)?;
            bump(&mut counters, API_CALLS)?
        };
        wt.commit().map_err(db_err)?;
        Ok(total)
    }

    pub fn api_calls(&self) -> Result<u64> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let counters = rt.open_table(COUNTERS).map_err(db_err)?;
        Ok(counters
            .get(API_CALLS)
            .map_err(db_err)?
            .map(|v| v.value())
            .unwrap_or(0))
    }

    // --- templates ---

    /// All templates, sorted by name.
    pub fn templates(&self) -> Result<Vec<Template>> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TEMPLATES).map_err(db_err)?;
        let mut result = Vec::new();
        for entry in table.iter().map_err(db_err)? {
            let (_, v) = entry.map_err(db_err)?;
            result.push(serde_json::from_slice::<Template>(v.value())?);
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    pub fn template(&self, id: u64) -> Result<Template> {
        let rt = self.db.begin_read().map_err(db_err)?;
        let table = rt.open_table(TEMPLATES).map_err(db_err)?;
        match table.get(id).map_err(db_err)? {
            Some(v) => Ok(serde_json::from_slice(v.value())?),
            None => Err(WeaverError::TemplateNotFound(id)),
        }
    }

    // --- internal ---

    /// Read-modify-write a job record in a single transaction.
    fn update_job<F>(&self, id: u64, f: F) -> Result<ProvisioningJob>
    where
        F: FnOnce(&mut ProvisioningJob) -> Result<()>,
    {
        let wt = self.db.begin_write().map_err(db_err)?;
        let job = {
            let mut table = wt.open_table(JOBS).map_err(db_err)?;
            let mut job: ProvisioningJob = match table.get(id).map_err(db_err)? {
                Some(v) => serde_json::from_slice(v.value())?,
                None => return Err(WeaverError::JobNotFound(id)),
            };
            f(&mut job)?;
            table
                .insert(id, serde_json::to_vec(&job)?.as_slice())
                .map_err(db_err)?;
            job
        };
        wt.commit().map_err(db_err)?;
        Ok(job)
    }
}

fn invalid_transition(from: JobStatus, to: JobStatus, reason: &str) -> WeaverError {
    WeaverError::InvalidTransition {
        from: from.to_string(),
        to: to.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
