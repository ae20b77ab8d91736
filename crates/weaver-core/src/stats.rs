//! Dashboard statistics, derived entirely from the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::JobStatus;
use crate::store::Store;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    /// Job counts keyed by status. Statuses with zero jobs are omitted.
    pub job_statistics: BTreeMap<JobStatus, u64>,
    /// Jobs created within the trailing 24 hours.
    pub recent_jobs_24h: u64,
    /// Total executor invocations (one per task attempt, auth included).
    pub total_api_calls: u64,
    /// When this snapshot was computed.
    pub timestamp: DateTime<Utc>,
}

/// Compute the current statistics snapshot.
///
/// Purely derived — no state beyond what the store already holds.
pub fn compute(store: &Store) -> Result<Statistics> {
    let now = Utc::now();
    let jobs = store.jobs(None)?;

    let mut job_statistics: BTreeMap<JobStatus, u64> = BTreeMap::new();
    let mut recent_jobs_24h = 0;
    let cutoff = now - Duration::hours(24);
    for job in &jobs {
        *job_statistics.entry(job.status).or_insert(0) += 1;
        if job.created_at > cutoff {
            recent_jobs_24h += 1;
        }
    }

    Ok(Statistics {
        job_statistics,
        recent_jobs_24h,
        total_api_calls: store.api_calls()?,
        timestamp: now,
    })
}
