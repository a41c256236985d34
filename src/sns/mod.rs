//! Pub/sub notifications through SNS.
//!
//! Publishing is fire-and-forget: the only confirmation is the message id
//! the service returns synchronously.

mod client;
mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RunnerError;

pub use client::Sns;
pub use memory::{MemorySns, Published};

/// SNS rejects subjects longer than this.
pub const MAX_SUBJECT_LEN: usize = 100;
/// SNS rejects message bodies larger than this.
pub const MAX_MESSAGE_BYTES: usize = 256 * 1024;

/// A validated publish request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishRequest {
    topic_arn: String,
    subject: String,
    message: String,
}

impl PublishRequest {
    pub fn new(
        topic_arn: impl Into<String>,
        subject: impl Into<String>,
        message: impl Into<String>,
    ) -> Result<Self, RunnerError> {
        let topic_arn = topic_arn.into();
        let subject = subject.into();
        let message = message.into();

        if !topic_arn.starts_with("arn:") {
            return Err(RunnerError::invalid(format!(
                "'{topic_arn}' is not a topic ARN"
            )));
        }
        if subject.is_empty() || subject.chars().count() > MAX_SUBJECT_LEN {
            return Err(RunnerError::invalid(format!(
                "subject must be 1 to {MAX_SUBJECT_LEN} characters"
            )));
        }
        if subject.chars().any(char::is_control) {
            return Err(RunnerError::invalid("subject must not contain control characters"));
        }
        if message.is_empty() || message.len() > MAX_MESSAGE_BYTES {
            return Err(RunnerError::invalid(format!(
                "message must be 1 to {MAX_MESSAGE_BYTES} bytes"
            )));
        }

        Ok(Self {
            topic_arn,
            subject,
            message,
        })
    }

    pub fn topic_arn(&self) -> &str {
        &self.topic_arn
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publishes one message and returns the id the service assigned.
    async fn publish(&self, request: &PublishRequest) -> Result<String>;

    async fn list_topics(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:sns:us-west-2:123456789012:demo-topic";

    #[test]
    fn test_publish_request_validation() {
        assert!(PublishRequest::new(ARN, "Hello from rust", "Congratulations").is_ok());
        assert!(PublishRequest::new("demo-topic", "Hello", "Body").is_err());
        assert!(PublishRequest::new(ARN, "", "Body").is_err());
        assert!(PublishRequest::new(ARN, "line\nbreak", "Body").is_err());
        assert!(PublishRequest::new(ARN, "x".repeat(101), "Body").is_err());
        assert!(PublishRequest::new(ARN, "Hello", "").is_err());
    }
}
