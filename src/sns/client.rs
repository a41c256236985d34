use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_sns::Client;
use tracing::info;

use crate::sns::{PublishRequest, Publisher};

#[derive(Debug, Clone)]
pub struct Sns {
    client: Client,
}

impl Sns {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl Publisher for Sns {
    async fn publish(&self, request: &PublishRequest) -> Result<String> {
        let response = self
            .client
            .publish()
            .topic_arn(request.topic_arn())
            .subject(request.subject())
            .message(request.message())
            .send()
            .await?;

        let message_id = response
            .message_id()
            .ok_or_else(|| anyhow!("publish returned no message id"))?
            .to_string();
        info!("Published {message_id} to '{}'", request.topic_arn());
        Ok(message_id)
    }

    async fn list_topics(&self) -> Result<Vec<String>> {
        let response = self.client.list_topics().send().await?;
        Ok(response
            .topics()
            .iter()
            .filter_map(|topic| topic.topic_arn().map(str::to_string))
            .collect())
    }
}
