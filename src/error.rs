use thiserror::Error;

/// Failures raised locally, before or instead of a remote call.
///
/// Errors coming back from the AWS SDK or `sqlx` are not wrapped; they
/// travel as `anyhow::Error` and can be downcast to the SDK type if needed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RunnerError {
    #[error("{0} is not configured")]
    MissingSetting(&'static str),

    #[error("invalid value for {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("queue '{0}' does not exist")]
    QueueNotFound(String),

    #[error("receipt handle '{0}' is not valid")]
    InvalidReceiptHandle(String),

    #[error("object '{bucket}/{key}' does not exist")]
    ObjectNotFound { bucket: String, key: String },

    #[error("service unavailable during {0}")]
    Unavailable(&'static str),
}

impl RunnerError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidRequest(reason.into())
    }
}
