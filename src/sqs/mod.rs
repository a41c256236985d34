//! Point-to-point messaging through SQS.
//!
//! A receive hides the delivered message for the queue's visibility timeout
//! and hands back a one-time receipt handle. The message is gone only once
//! it is deleted with that handle; otherwise it becomes visible again.

mod client;
mod memory;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RunnerError;

pub use client::Sqs;
pub use memory::{Fault, MemorySqs};

/// SQS rejects bodies larger than this.
pub const MAX_BODY_BYTES: usize = 256 * 1024;
/// Messages requested per receive. Only the first is ever read.
pub const RECEIVE_BATCH_SIZE: i32 = 1;

/// A message body that SQS will accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBody(String);

impl MessageBody {
    pub fn new(body: impl Into<String>) -> Result<Self, RunnerError> {
        let body = body.into();
        if body.is_empty() || body.len() > MAX_BODY_BYTES {
            return Err(RunnerError::invalid(format!(
                "message body must be 1 to {MAX_BODY_BYTES} bytes"
            )));
        }
        // #x9 | #xA | #xD | #x20 to #xD7FF | #xE000 to #xFFFD | #x10000 to #x10FFFF
        if let Some(c) = body
            .chars()
            .find(|c| matches!(c, '\u{0}'..='\u{8}' | '\u{b}' | '\u{c}' | '\u{e}'..='\u{1f}' | '\u{fffe}' | '\u{ffff}'))
        {
            return Err(RunnerError::invalid(format!(
                "message body contains disallowed character U+{:04X}",
                c as u32
            )));
        }
        Ok(Self(body))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: Option<String>,
    pub body: String,
    /// Valid for this delivery only.
    pub receipt_handle: String,
    pub attributes: BTreeMap<String, String>,
}

/// A queue and its attributes, keyed by attribute name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueSummary {
    pub name: String,
    pub url: String,
    pub attributes: BTreeMap<String, String>,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn queue_url(&self, queue_name: &str) -> Result<String>;

    /// Enqueues a message and returns its id.
    async fn send_message(&self, queue_url: &str, body: &MessageBody) -> Result<String>;

    /// Long-polls for up to `wait` and returns whatever batch arrives,
    /// possibly empty.
    async fn receive_messages(&self, queue_url: &str, wait: Duration)
        -> Result<Vec<ReceivedMessage>>;

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()>;

    async fn list_queues(&self) -> Result<Vec<QueueSummary>>;
}

#[async_trait]
impl<T: MessageQueue + ?Sized> MessageQueue for Arc<T> {
    async fn queue_url(&self, queue_name: &str) -> Result<String> {
        (**self).queue_url(queue_name).await
    }

    async fn send_message(&self, queue_url: &str, body: &MessageBody) -> Result<String> {
        (**self).send_message(queue_url, body).await
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        (**self).receive_messages(queue_url, wait).await
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        (**self).delete_message(queue_url, receipt_handle).await
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        (**self).list_queues().await
    }
}

/// Queue name from an ARN (`arn:aws:sqs:region:account:name`) or a URL.
pub(crate) fn queue_name_of(arn_or_url: &str) -> &str {
    arn_or_url
        .rsplit([':', '/'])
        .next()
        .unwrap_or(arn_or_url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_body_validation() {
        assert!(MessageBody::new("417 hello from rust").is_ok());
        assert!(MessageBody::new("tab\tand\nnewline").is_ok());
        assert!(MessageBody::new("").is_err());
        assert!(MessageBody::new("bell\u{7}").is_err());
        assert!(MessageBody::new("x".repeat(MAX_BODY_BYTES + 1)).is_err());
    }

    #[test]
    fn test_queue_name_of() {
        assert_eq!(
            queue_name_of("arn:aws:sqs:us-west-2:123456789012:demo-queue"),
            "demo-queue"
        );
        assert_eq!(
            queue_name_of("https://sqs.us-west-2.amazonaws.com/123456789012/demo-queue"),
            "demo-queue"
        );
    }
}
