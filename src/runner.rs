//! The resource operation runner.
//!
//! [`Runner::run`] takes one [`Operation`], fills in the configured resource
//! (table, topic, queue, bucket, domain, database), performs the remote
//! call(s) and returns a [`Report`] describing the raw outcome. Errors from
//! the services are returned as-is; nothing is retried.

use std::fmt;

use anyhow::Result;
use aws_sdk_dynamodb::types::AttributeValue;
use tracing::{info, warn};

use crate::config::Config;
use crate::dynamodb::{
    DynamoDb, Item, KeyCondition, KeyValueStore, MemoryDynamoDb, Page, ScanFilter, TableInfo,
};
use crate::rds::{
    InstanceDirectory, InstanceInfo, MemoryInstances, MemoryRelationalDb, PostgresDb,
    QueryResult, RdsInstances, RelationalDb,
};
use crate::s3::{BucketListing, MemoryS3, ObjectStore, PutAck, PutObjectRequest, S3};
use crate::simpledb::{
    AttributeItem, AttributeStore, AttributeUpdate, MemorySimpleDb, SelectQuery, SimpleDb,
};
use crate::sns::{MemorySns, PublishRequest, Publisher, Sns};
use crate::sqs::{MemorySqs, MessageBody, MessageQueue, QueueSummary, ReceivedMessage, Sqs};

/// One implementation per service.
pub struct Services {
    pub key_value: Box<dyn KeyValueStore>,
    pub publisher: Box<dyn Publisher>,
    pub queue: Box<dyn MessageQueue>,
    pub objects: Box<dyn ObjectStore>,
    pub attributes: Box<dyn AttributeStore>,
    pub database: Box<dyn RelationalDb>,
    pub instances: Box<dyn InstanceDirectory>,
}

impl Services {
    /// AWS-backed services sharing one SDK configuration.
    ///
    /// The PostgreSQL connection is not opened here; without database
    /// settings, SQL operations fail with the missing setting instead.
    pub fn aws(sdk_config: &aws_config::SdkConfig, config: &Config) -> Result<Self> {
        let database: Box<dyn RelationalDb> = match config.database() {
            Ok(database) => Box::new(PostgresDb::new(&database)),
            Err(missing) => Box::new(Unconfigured(missing.to_string())),
        };
        Ok(Self {
            key_value: Box::new(DynamoDb::new(sdk_config)),
            publisher: Box::new(Sns::new(sdk_config)),
            queue: Box::new(Sqs::new(sdk_config)),
            objects: Box::new(S3::new(sdk_config)),
            attributes: Box::new(SimpleDb::new(sdk_config)?),
            database,
            instances: Box::new(RdsInstances::new(sdk_config)),
        })
    }

    /// In-memory services with every configured resource created empty.
    pub fn in_memory(config: &Config) -> Self {
        let mut key_value = MemoryDynamoDb::new();
        if let Ok(table) = config.table() {
            key_value = key_value.with_table(table.clone());
        }
        let mut publisher = MemorySns::new();
        if let Ok(topic_arn) = config.topic_arn() {
            publisher = publisher.with_topic(topic_arn);
        }
        let mut queue = MemorySqs::new();
        if let Ok(queue_name) = config.queue_name() {
            queue = queue.with_queue(queue_name);
        }
        let mut objects = MemoryS3::new();
        if let Ok(bucket) = config.bucket() {
            objects = objects.with_bucket(bucket);
        }
        let mut attributes = MemorySimpleDb::new();
        if let Ok(domain) = config.simpledb_domain() {
            attributes = attributes.with_domain(domain);
        }
        Self {
            key_value: Box::new(key_value),
            publisher: Box::new(publisher),
            queue: Box::new(queue),
            objects: Box::new(objects),
            attributes: Box::new(attributes),
            database: Box::new(MemoryRelationalDb::new()),
            instances: Box::new(MemoryInstances::new()),
        }
    }
}

/// Stands in for PostgreSQL when its settings are incomplete.
struct Unconfigured(String);

#[async_trait::async_trait]
impl RelationalDb for Unconfigured {
    async fn query(&self, _sql: &str) -> Result<QueryResult> {
        Err(anyhow::anyhow!("database unavailable: {}", self.0))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    ListTables,
    /// Describes every table, like list-tables followed by describe-table.
    DescribeTables,
    Scan(Option<ScanFilter>),
    Query(KeyCondition),
    PutItem(Item),
    Publish { subject: String, message: String },
    ListTopics,
    Send(String),
    /// Receive one message, report it, then delete it.
    Receive,
    ListQueues,
    ListBuckets,
    Upload,
    ListDomains,
    Select { attribute: String, value: String },
    PutAttributes { item_name: String, updates: Vec<AttributeUpdate> },
    Sql(String),
    DescribeInstance,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Report {
    Tables(Vec<String>),
    TableDescriptions(Vec<TableInfo>),
    Items(Page),
    ItemWritten { table: String },
    Published { message_id: String },
    Topics(Vec<String>),
    Sent { message_id: String },
    Received(ReceivedMessage),
    QueueEmpty,
    Queues(Vec<QueueSummary>),
    Buckets(BucketListing),
    Uploaded { bucket: String, key: String, bytes: usize, ack: PutAck },
    Domains(Vec<String>),
    Selected(Vec<AttributeItem>),
    AttributesWritten { item_name: String },
    Rows(QueryResult),
    Instance(InstanceInfo),
}

pub struct Runner<'a> {
    config: &'a Config,
    services: &'a Services,
}

impl<'a> Runner<'a> {
    pub fn new(config: &'a Config, services: &'a Services) -> Self {
        Self { config, services }
    }

    pub async fn run(&self, operation: Operation) -> Result<Report> {
        let services = self.services;
        let report = match operation {
            Operation::ListTables => Report::Tables(services.key_value.list_tables().await?),
            Operation::DescribeTables => {
                let mut descriptions = Vec::new();
                for table in services.key_value.list_tables().await? {
                    info!("getting description of {table}");
                    descriptions.push(services.key_value.describe_table(&table).await?);
                }
                Report::TableDescriptions(descriptions)
            }
            Operation::Scan(filter) => {
                let table = self.config.table()?;
                Report::Items(services.key_value.scan(table.name(), filter.as_ref()).await?)
            }
            Operation::Query(condition) => {
                let table = self.config.table()?;
                Report::Items(services.key_value.query(table.name(), &condition).await?)
            }
            Operation::PutItem(item) => {
                let table = self.config.table()?;
                services.key_value.put_item(table.name(), item).await?;
                Report::ItemWritten {
                    table: table.name().to_string(),
                }
            }
            Operation::Publish { subject, message } => {
                let request = PublishRequest::new(self.config.topic_arn()?, subject, message)?;
                Report::Published {
                    message_id: services.publisher.publish(&request).await?,
                }
            }
            Operation::ListTopics => Report::Topics(services.publisher.list_topics().await?),
            Operation::Send(body) => {
                let body = MessageBody::new(body)?;
                let url = services.queue.queue_url(self.config.queue_name()?).await?;
                Report::Sent {
                    message_id: services.queue.send_message(&url, &body).await?,
                }
            }
            Operation::Receive => self.receive_one().await?,
            Operation::ListQueues => Report::Queues(services.queue.list_queues().await?),
            Operation::ListBuckets => {
                let listing = services.objects.list_buckets().await?;
                if !listing.is_success() {
                    warn!("Error in response: list-buckets returned {}", listing.status);
                }
                Report::Buckets(listing)
            }
            Operation::Upload => {
                let bucket = self.config.bucket()?;
                let request = PutObjectRequest::from_upload(bucket, self.config.upload()?).await?;
                let ack = services.objects.put_object(&request).await?;
                Report::Uploaded {
                    bucket: request.bucket().to_string(),
                    key: request.key().to_string(),
                    bytes: request.body().len(),
                    ack,
                }
            }
            Operation::ListDomains => Report::Domains(services.attributes.list_domains().await?),
            Operation::Select { attribute, value } => {
                let query = SelectQuery::new(self.config.simpledb_domain()?, attribute, value)?;
                Report::Selected(services.attributes.select(&query).await?)
            }
            Operation::PutAttributes { item_name, updates } => {
                services
                    .attributes
                    .put_attributes(self.config.simpledb_domain()?, &item_name, &updates)
                    .await?;
                Report::AttributesWritten { item_name }
            }
            Operation::Sql(sql) => Report::Rows(services.database.query(&sql).await?),
            Operation::DescribeInstance => Report::Instance(
                services
                    .instances
                    .describe_instance(self.config.db_instance()?)
                    .await?,
            ),
        };
        Ok(report)
    }

    /// Reads the first message of one batch and deletes it by its receipt
    /// handle. A failed receive deletes nothing; a failed delete leaves the
    /// message to reappear after its visibility timeout.
    async fn receive_one(&self) -> Result<Report> {
        let queue = &self.services.queue;
        let url = queue.queue_url(self.config.queue_name()?).await?;
        let batch = queue.receive_messages(&url, self.config.receive_wait).await?;

        let Some(message) = batch.into_iter().next() else {
            info!("No message arrived within {:?}", self.config.receive_wait);
            return Ok(Report::QueueEmpty);
        };
        info!("Received: {}", message.body);
        queue.delete_message(&url, &message.receipt_handle).await?;
        Ok(Report::Received(message))
    }
}

fn render_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::S(s) => format!("{s:?}"),
        AttributeValue::N(n) => n.clone(),
        AttributeValue::Bool(b) => b.to_string(),
        AttributeValue::Null(_) => "null".to_string(),
        other => format!("{other:?}"),
    }
}

fn render_item(item: &Item) -> String {
    let mut pairs: Vec<_> = item.attributes().iter().collect();
    pairs.sort_by(|a, b| a.0.cmp(b.0));
    let fields: Vec<String> = pairs
        .into_iter()
        .map(|(name, value)| format!("{name}: {}", render_value(value)))
        .collect();
    format!("{{ {} }}", fields.join(", "))
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Tables(names) | Report::Topics(names) | Report::Domains(names) => {
                for name in names {
                    writeln!(f, "{name}")?;
                }
                Ok(())
            }
            Report::TableDescriptions(tables) => {
                for table in tables {
                    writeln!(f, "--- {} ---", table.name)?;
                    writeln!(f, "  status: {}", table.status.as_deref().unwrap_or("-"))?;
                    if let Some(count) = table.item_count {
                        writeln!(f, "  items: {count}")?;
                    }
                    for (attribute, key_type) in &table.key_schema {
                        writeln!(f, "  key: {attribute} ({key_type})")?;
                    }
                }
                Ok(())
            }
            Report::Items(page) => {
                for item in &page.items {
                    writeln!(f, "{}", render_item(item))?;
                }
                write!(f, "{} item(s)", page.items.len())?;
                if page.has_more {
                    write!(f, ", more data not read")?;
                }
                Ok(())
            }
            Report::ItemWritten { table } => write!(f, "item written to '{table}'"),
            Report::Published { message_id } => write!(f, "published, MessageId: {message_id}"),
            Report::Sent { message_id } => write!(f, "sent, MessageId: {message_id}"),
            Report::Received(message) => {
                writeln!(f, "Received: {}", message.body)?;
                for (name, value) in &message.attributes {
                    writeln!(f, "  {name}: {value}")?;
                }
                write!(f, "deleted")
            }
            Report::QueueEmpty => write!(f, "no message received"),
            Report::Queues(queues) => {
                for queue in queues {
                    writeln!(f, "--- {} ---", queue.name)?;
                    writeln!(f, "  Url: {}", queue.url)?;
                    for (name, value) in &queue.attributes {
                        writeln!(f, "  {name}: {value}")?;
                    }
                }
                Ok(())
            }
            Report::Buckets(listing) => {
                if !listing.is_success() {
                    writeln!(f, "Error in response: HTTP {}", listing.status)?;
                }
                for bucket in &listing.buckets {
                    writeln!(f, "{bucket}")?;
                }
                Ok(())
            }
            Report::Uploaded {
                bucket,
                key,
                bytes,
                ack,
            } => {
                write!(f, "uploaded {bytes} bytes to s3://{bucket}/{key}")?;
                if let Some(e_tag) = &ack.e_tag {
                    write!(f, ", ETag: {e_tag}")?;
                }
                Ok(())
            }
            Report::Selected(items) => {
                for item in items {
                    let attributes: Vec<String> = item
                        .attributes
                        .iter()
                        .map(|(name, value)| format!("{name}={value}"))
                        .collect();
                    writeln!(f, "{}: {}", item.name, attributes.join(", "))?;
                }
                Ok(())
            }
            Report::AttributesWritten { item_name } => {
                write!(f, "attributes written to '{item_name}'")
            }
            Report::Rows(result) => {
                writeln!(f, "{}", result.columns.join(" | "))?;
                for row in &result.rows {
                    let values: Vec<&str> = row
                        .iter()
                        .map(|value| value.as_deref().unwrap_or("NULL"))
                        .collect();
                    writeln!(f, "{}", values.join(" | "))?;
                }
                write!(f, "{} row(s)", result.rows.len())
            }
            Report::Instance(instance) => {
                writeln!(f, "{}", instance.identifier)?;
                writeln!(f, "  status: {}", instance.status.as_deref().unwrap_or("-"))?;
                writeln!(f, "  engine: {}", instance.engine.as_deref().unwrap_or("-"))?;
                writeln!(f, "  endpoint: {}", instance.endpoint.as_deref().unwrap_or("-"))?;
                write!(
                    f,
                    "  maintenance window: {}",
                    instance.maintenance_window.as_deref().unwrap_or("-")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_item_sorts_attributes() {
        let item = Item::new()
            .set_string("Id", "1003")
            .set_string("Course", "Biztalk-o-rama")
            .set_number("Seats", 12.0);
        assert_eq!(
            render_item(&item),
            r#"{ Course: "Biztalk-o-rama", Id: "1003", Seats: 12 }"#
        );
    }

    #[test]
    fn test_render_rows() {
        let report = Report::Rows(QueryResult {
            columns: vec!["table_schema".into(), "table_name".into()],
            rows: vec![
                vec![Some("public".into()), Some("courses".into())],
                vec![Some("public".into()), None],
            ],
        });
        assert_eq!(
            report.to_string(),
            "table_schema | table_name\npublic | courses\npublic | NULL\n2 row(s)"
        );
    }

    #[test]
    fn test_render_failed_bucket_listing() {
        let report = Report::Buckets(BucketListing {
            status: 403,
            buckets: Vec::new(),
        });
        assert_eq!(report.to_string(), "Error in response: HTTP 403\n");
    }
}
