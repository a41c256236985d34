use std::collections::BTreeSet;
use std::sync::{Mutex, PoisonError};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RunnerError;
use crate::sns::{PublishRequest, Publisher};

/// A message as the in-memory topic recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub message_id: String,
    pub request: PublishRequest,
}

/// An in-memory [`Publisher`] that records every publish to a known topic.
#[derive(Debug, Default)]
pub struct MemorySns {
    topics: BTreeSet<String>,
    published: Mutex<Vec<Published>>,
}

impl MemorySns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(mut self, topic_arn: impl Into<String>) -> Self {
        self.topics.insert(topic_arn.into());
        self
    }

    pub fn published(&self) -> Vec<Published> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Publisher for MemorySns {
    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        if !self.topics.contains(request.topic_arn()) {
            return Err(RunnerError::invalid(format!(
                "topic '{}' does not exist",
                request.topic_arn()
            ))
            .into());
        }
        let message_id = Uuid::new_v4().to_string();
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Published {
                message_id: message_id.clone(),
                request: request.clone(),
            });
        Ok(message_id)
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        Ok(self.topics.iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARN: &str = "arn:aws:sns:us-west-2:123456789012:demo-topic";

    #[tokio::test]
    async fn test_publish_records_message() -> Result<()> {
        let sns = MemorySns::new().with_topic(ARN);
        let request = PublishRequest::new(ARN, "Hello from rust", "Congratulations")?;

        let id = sns.publish(&request).await?;

        let published = sns.published();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].message_id, id);
        assert_eq!(published[0].request.subject(), "Hello from rust");
        assert_eq!(sns.list_topics().await?, vec![ARN.to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_publish_to_unknown_topic_fails() -> Result<()> {
        let sns = MemorySns::new();
        let request = PublishRequest::new(ARN, "Hello", "Body")?;
        assert!(sns.publish(&request).await.is_err());
        assert!(sns.published().is_empty());
        Ok(())
    }
}
