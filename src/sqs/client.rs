use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_sqs::types::{MessageSystemAttributeName, QueueAttributeName};
use aws_sdk_sqs::Client;
use tracing::{debug, info};

use crate::sqs::{
    queue_name_of, MessageBody, MessageQueue, QueueSummary, ReceivedMessage, RECEIVE_BATCH_SIZE,
};

#[derive(Debug, Clone)]
pub struct Sqs {
    client: Client,
}

impl Sqs {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl MessageQueue for Sqs {
    async fn queue_url(&self, queue_name: &str) -> Result<String> {
        let response = self
            .client
            .get_queue_url()
            .queue_name(queue_name)
            .send()
            .await?;
        response
            .queue_url()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("get-queue-url returned no URL for '{queue_name}'"))
    }

    async fn send_message(&self, queue_url: &str, body: &MessageBody) -> Result<String> {
        let response = self
            .client
            .send_message()
            .queue_url(queue_url)
            .message_body(body.as_str())
            .send()
            .await?;

        let message_id = response
            .message_id()
            .ok_or_else(|| anyhow!("send-message returned no message id"))?
            .to_string();
        info!("Sent {message_id} to {queue_url}");
        Ok(message_id)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        debug!("Waiting up to {wait:?} for a message on {queue_url}");
        let wait_seconds = i32::try_from(wait.as_secs())?;
        let response = self
            .client
            .receive_message()
            .queue_url(queue_url)
            .message_system_attribute_names(MessageSystemAttributeName::All)
            .max_number_of_messages(RECEIVE_BATCH_SIZE)
            .wait_time_seconds(wait_seconds)
            .send()
            .await?;

        response
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|message| -> Result<ReceivedMessage> {
                let receipt_handle = message
                    .receipt_handle
                    .ok_or_else(|| anyhow!("received a message without a receipt handle"))?;
                Ok(ReceivedMessage {
                    message_id: message.message_id,
                    body: message.body.unwrap_or_default(),
                    receipt_handle,
                    attributes: message
                        .attributes
                        .unwrap_or_default()
                        .into_iter()
                        .map(|(name, value)| (name.as_str().to_string(), value))
                        .collect(),
                })
            })
            .collect()
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        self.client
            .delete_message()
            .queue_url(queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await?;
        info!("Deleted message from {queue_url}");
        Ok(())
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        let response = self.client.list_queues().send().await?;

        let mut queues = Vec::new();
        for url in response.queue_urls() {
            let attributes: BTreeMap<String, String> = self
                .client
                .get_queue_attributes()
                .queue_url(url)
                .attribute_names(QueueAttributeName::All)
                .send()
                .await?
                .attributes
                .unwrap_or_default()
                .into_iter()
                .map(|(name, value)| (name.as_str().to_string(), value))
                .collect();

            let name = attributes
                .get("QueueArn")
                .map(|arn| queue_name_of(arn))
                .unwrap_or_else(|| queue_name_of(url))
                .to_string();
            queues.push(QueueSummary {
                name,
                url: url.clone(),
                attributes,
            });
        }
        Ok(queues)
    }
}
