use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("request timed out")]
    Timeout,

    #[error("connection error: {0}")]
    Connect(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("controller rejected request: {status} {message}")]
    Api { status: u16, message: String },
}

impl ControllerError {
    /// Whether the error is worth retrying: timeouts, connection failures,
    /// and 5xx-equivalent controller responses. Auth failures and 4xx
    /// rejections are permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            ControllerError::Timeout | ControllerError::Connect(_) => true,
            ControllerError::Api { status, .. } => *status >= 500,
            ControllerError::AuthFailed(_) => false,
        }
    }
}
