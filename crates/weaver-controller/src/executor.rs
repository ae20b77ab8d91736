//! Single-task execution with timeout, retry, and backoff.

use std::time::Duration;

use tracing::debug;

use weaver_core::plan::ProvisioningTask;

use crate::client::{Applied, FabricController};

/// Retry budget for one task.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub base_delay: Duration,
    /// Bound on one attempt's wait. Exceeding it counts as transient.
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            attempt_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

#[derive(Debug, Clone)]
pub enum AttemptOutcome {
    Applied(Applied),
    Failed { message: String, transient: bool },
}

/// Record of one execution attempt, numbered from 1.
#[derive(Debug, Clone)]
pub struct TaskAttempt {
    pub number: u32,
    pub outcome: AttemptOutcome,
}

/// Terminal failure of a task after the retry loop gave up.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    pub message: String,
    /// True when a transient error exhausted the retry budget; false when a
    /// permanent error short-circuited the loop.
    pub retries_exhausted: bool,
}

/// Everything the engine needs to fold a task into job state: one record
/// per attempt plus the terminal result. The executor never touches job
/// status itself.
#[derive(Debug)]
pub struct TaskOutcome {
    pub attempts: Vec<TaskAttempt>,
    pub result: Result<Applied, TaskFailure>,
}

/// Execute one task against the controller under `policy`.
///
/// Transient errors (timeouts, connection failures, 5xx) retry with
/// exponential backoff up to `max_attempts`; permanent errors stop
/// immediately. A duplicate-resource response surfaces as
/// [`Applied::AlreadyExists`] and counts as success.
pub async fn execute_task(
    controller: &dyn FabricController,
    task: &ProvisioningTask,
    policy: &RetryPolicy,
) -> TaskOutcome {
    let mut attempts = Vec::new();

    for number in 1..=policy.max_attempts.max(1) {
        let applied = tokio::time::timeout(policy.attempt_timeout, controller.apply(&task.spec))
            .await
            .map_err(|_| (format!("attempt timed out after {:?}", policy.attempt_timeout), true))
            .and_then(|r| r.map_err(|e| (e.to_string(), e.is_transient())));

        match applied {
            Ok(applied) => {
                attempts.push(TaskAttempt {
                    number,
                    outcome: AttemptOutcome::Applied(applied),
                });
                return TaskOutcome {
                    attempts,
                    result: Ok(applied),
                };
            }
            Err((message, transient)) => {
                debug!(task = %task.name, attempt = number, transient, %message, "task attempt failed");
                attempts.push(TaskAttempt {
                    number,
                    outcome: AttemptOutcome::Failed {
                        message: message.clone(),
                        transient,
                    },
                });
                if !transient {
                    return TaskOutcome {
                        attempts,
                        result: Err(TaskFailure {
                            message,
                            retries_exhausted: false,
                        }),
                    };
                }
                if number == policy.max_attempts {
                    return TaskOutcome {
                        attempts,
                        result: Err(TaskFailure {
                            message,
                            retries_exhausted: true,
                        }),
                    };
                }
                tokio::time::sleep(policy.backoff(number)).await;
            }
        }
    }

    unreachable!("retry loop always returns")
}
