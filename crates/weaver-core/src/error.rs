use thiserror::Error;

#[derive(Debug, Error)]
pub enum WeaverError {
    #[error("job not found: {0}")]
    JobNotFound(u64),

    #[error("template not found: {0}")]
    TemplateNotFound(u64),

    #[error("job {0} is running and cannot be deleted")]
    JobRunning(u64),

    #[error("invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("planning error: {0}")]
    Planning(String),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, WeaverError>;
