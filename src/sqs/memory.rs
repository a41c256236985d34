use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::Result;
use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use uuid::Uuid;

use crate::error::RunnerError;
use crate::sqs::{
    MessageBody, MessageQueue, QueueSummary, ReceivedMessage, RECEIVE_BATCH_SIZE,
};

pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const URL_PREFIX: &str = "https://sqs.memory.local/000000000000/";

/// A call that can be made to fail once with [`MemorySqs::fail_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    Send,
    Receive,
    Delete,
}

impl Fault {
    fn operation(self) -> &'static str {
        match self {
            Self::Send => "send-message",
            Self::Receive => "receive-message",
            Self::Delete => "delete-message",
        }
    }
}

#[derive(Debug)]
struct StoredMessage {
    id: String,
    body: String,
    sent_timestamp: String,
    receive_count: u32,
    invisible_until: Option<Instant>,
    receipt_handle: Option<String>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

#[derive(Debug, Default)]
struct State {
    queues: HashMap<String, Vec<StoredMessage>>,
    faults: HashSet<Fault>,
    deleted: usize,
}

impl State {
    fn trip(&mut self, fault: Fault) -> Result<(), RunnerError> {
        if self.faults.remove(&fault) {
            return Err(RunnerError::Unavailable(fault.operation()));
        }
        Ok(())
    }

    fn queue_mut(&mut self, url: &str) -> Result<&mut Vec<StoredMessage>, RunnerError> {
        self.queues
            .get_mut(url)
            .ok_or_else(|| RunnerError::QueueNotFound(url.to_string()))
    }
}

/// An in-memory [`MessageQueue`] with visibility-timeout semantics.
///
/// Each receive hands out a fresh receipt handle and hides the message
/// until the visibility timeout passes. Only the most recent handle of a
/// delivery can delete it.
#[derive(Debug)]
pub struct MemorySqs {
    state: Mutex<State>,
    visibility_timeout: Duration,
}

impl MemorySqs {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
        }
    }

    pub fn with_queue(self, queue_name: &str) -> Self {
        self.lock()
            .queues
            .insert(format!("{URL_PREFIX}{queue_name}"), Vec::new());
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    /// Makes the next call of the given kind fail without touching any
    /// queue state.
    pub fn fail_next(&self, fault: Fault) {
        self.lock().faults.insert(fault);
    }

    /// Number of successful deletes so far.
    pub fn deleted_count(&self) -> usize {
        self.lock().deleted
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn try_receive(&self, queue_url: &str) -> Result<Vec<ReceivedMessage>, RunnerError> {
        let mut state = self.lock();
        let messages = state.queue_mut(queue_url)?;
        let now = Instant::now();
        let mut batch = Vec::new();

        for message in messages
            .iter_mut()
            .filter(|m| m.is_visible(now))
            .take(RECEIVE_BATCH_SIZE as usize)
        {
            let handle = Uuid::new_v4().to_string();
            message.receive_count += 1;
            message.invisible_until = Some(now + self.visibility_timeout);
            message.receipt_handle = Some(handle.clone());

            let mut attributes = BTreeMap::new();
            attributes.insert(
                "ApproximateReceiveCount".to_string(),
                message.receive_count.to_string(),
            );
            attributes.insert("SentTimestamp".to_string(), message.sent_timestamp.clone());
            batch.push(ReceivedMessage {
                message_id: Some(message.id.clone()),
                body: message.body.clone(),
                receipt_handle: handle,
                attributes,
            });
        }
        Ok(batch)
    }
}

impl Default for MemorySqs {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageQueue for MemorySqs {
    async fn queue_url(&self, queue_name: &str) -> Result<String> {
        let url = format!("{URL_PREFIX}{queue_name}");
        if self.lock().queues.contains_key(&url) {
            Ok(url)
        } else {
            Err(RunnerError::QueueNotFound(queue_name.to_string()).into())
        }
    }

    async fn send_message(&self, queue_url: &str, body: &MessageBody) -> Result<String> {
        let mut state = self.lock();
        state.trip(Fault::Send)?;
        let id = Uuid::new_v4().to_string();
        state.queue_mut(queue_url)?.push(StoredMessage {
            id: id.clone(),
            body: body.as_str().to_string(),
            sent_timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis().to_string())
                .unwrap_or_default(),
            receive_count: 0,
            invisible_until: None,
            receipt_handle: None,
        });
        Ok(id)
    }

    async fn receive_messages(
        &self,
        queue_url: &str,
        wait: Duration,
    ) -> Result<Vec<ReceivedMessage>> {
        self.lock().trip(Fault::Receive)?;
        let deadline = Instant::now() + wait;
        loop {
            let batch = self.try_receive(queue_url)?;
            if !batch.is_empty() || Instant::now() >= deadline {
                return Ok(batch);
            }
            sleep(POLL_INTERVAL.min(deadline.saturating_duration_since(Instant::now()))).await;
        }
    }

    async fn delete_message(&self, queue_url: &str, receipt_handle: &str) -> Result<()> {
        let mut state = self.lock();
        state.trip(Fault::Delete)?;
        let messages = state.queue_mut(queue_url)?;
        let position = messages
            .iter()
            .position(|m| m.receipt_handle.as_deref() == Some(receipt_handle))
            .ok_or_else(|| RunnerError::InvalidReceiptHandle(receipt_handle.to_string()))?;
        messages.remove(position);
        state.deleted += 1;
        Ok(())
    }

    async fn list_queues(&self) -> Result<Vec<QueueSummary>> {
        let state = self.lock();
        let now = Instant::now();
        let mut queues: Vec<QueueSummary> = state
            .queues
            .iter()
            .map(|(url, messages)| {
                let name = url.trim_start_matches(URL_PREFIX).to_string();
                let visible = messages.iter().filter(|m| m.is_visible(now)).count();
                let mut attributes = BTreeMap::new();
                attributes.insert(
                    "ApproximateNumberOfMessages".to_string(),
                    visible.to_string(),
                );
                attributes.insert(
                    "ApproximateNumberOfMessagesNotVisible".to_string(),
                    (messages.len() - visible).to_string(),
                );
                attributes.insert(
                    "QueueArn".to_string(),
                    format!("arn:aws:sqs:memory:000000000000:{name}"),
                );
                attributes.insert(
                    "VisibilityTimeout".to_string(),
                    self.visibility_timeout.as_secs().to_string(),
                );
                QueueSummary {
                    name,
                    url: url.clone(),
                    attributes,
                }
            })
            .collect();
        queues.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(queues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_message_reappears_after_visibility_timeout() -> Result<()> {
        let sqs = MemorySqs::new()
            .with_queue("demo")
            .with_visibility_timeout(Duration::from_millis(20));
        let url = sqs.queue_url("demo").await?;
        sqs.send_message(&url, &MessageBody::new("hello")?).await?;

        let first = sqs.receive_messages(&url, Duration::ZERO).await?;
        assert_eq!(first.len(), 1);
        assert!(sqs.receive_messages(&url, Duration::ZERO).await?.is_empty());

        sleep(Duration::from_millis(30)).await;
        let second = sqs.receive_messages(&url, Duration::ZERO).await?;
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "hello");
        assert_eq!(
            second[0].attributes.get("ApproximateReceiveCount"),
            Some(&"2".to_string())
        );

        // the first delivery's handle is stale now
        assert!(sqs
            .delete_message(&url, &first[0].receipt_handle)
            .await
            .is_err());
        sqs.delete_message(&url, &second[0].receipt_handle).await?;
        assert_eq!(sqs.deleted_count(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_receive_waits_for_empty_queue() -> Result<()> {
        let sqs = MemorySqs::new().with_queue("demo");
        let url = sqs.queue_url("demo").await?;

        let started = Instant::now();
        let batch = sqs.receive_messages(&url, Duration::from_millis(120)).await?;
        assert!(batch.is_empty());
        assert!(started.elapsed() >= Duration::from_millis(120));
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_queue() {
        let sqs = MemorySqs::new();
        let err = sqs.queue_url("missing").await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<RunnerError>(),
            Some(&RunnerError::QueueNotFound("missing".into()))
        );
    }

    #[tokio::test]
    async fn test_list_queues_reports_counts() -> Result<()> {
        let sqs = MemorySqs::new().with_queue("b-queue").with_queue("a-queue");
        let url = sqs.queue_url("a-queue").await?;
        sqs.send_message(&url, &MessageBody::new("one")?).await?;
        sqs.send_message(&url, &MessageBody::new("two")?).await?;
        sqs.receive_messages(&url, Duration::ZERO).await?;

        let queues = sqs.list_queues().await?;
        assert_eq!(queues.len(), 2);
        assert_eq!(queues[0].name, "a-queue");
        assert_eq!(
            queues[0].attributes.get("ApproximateNumberOfMessages"),
            Some(&"1".to_string())
        );
        assert_eq!(
            queues[0].attributes.get("ApproximateNumberOfMessagesNotVisible"),
            Some(&"1".to_string())
        );
        Ok(())
    }
}
