use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_dynamodb::Client;
use tracing::{debug, error, info};

use crate::dynamodb::{Item, KeyCondition, KeyValueStore, Page, ScanFilter, TableInfo};

/// DynamoDB client wrapper.
///
/// Every method issues exactly one request. Nothing is retried beyond what
/// the SDK's default retry configuration does, and list/scan/query calls
/// never follow `LastEvaluatedKey`.
///
/// # Example
///
/// ```no_run
/// use resource_runner::dynamodb::{DynamoDb, Item, KeyValueStore};
///
/// # async fn demo() -> anyhow::Result<()> {
/// let config = aws_config::load_from_env().await;
/// let client = DynamoDb::new(&config);
///
/// for table in client.list_tables().await? {
///     println!("{:?}", client.describe_table(&table).await?);
/// }
///
/// let item = Item::new()
///     .set_string("Id", "1003")
///     .set_string("Course", "Biztalk-o-rama");
/// client.put_item("activity", item).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DynamoDb {
    client: Client,
}

impl DynamoDb {
    /// Creates a new `DynamoDb` instance.
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Verifies authentication by attempting to list tables.
    pub async fn check_auth(&self) -> Result<()> {
        self.client.list_tables().send().await.map_err(|e| {
            error!("Authentication failed: {}", e);
            anyhow!("Authentication failed")
        })?;
        info!("Authentication successful");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for DynamoDb {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let response = self.client.list_tables().send().await?;
        Ok(response.table_names.unwrap_or_default())
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableInfo> {
        let response = self
            .client
            .describe_table()
            .table_name(table_name)
            .send()
            .await?;

        let table = response
            .table()
            .ok_or_else(|| anyhow!("describe-table returned no description for '{table_name}'"))?;

        Ok(TableInfo {
            name: table.table_name().unwrap_or(table_name).to_string(),
            status: table.table_status().map(|s| s.as_str().to_string()),
            item_count: table.item_count(),
            key_schema: table
                .key_schema()
                .iter()
                .map(|k| (k.attribute_name().to_string(), k.key_type().as_str().to_string()))
                .collect(),
        })
    }

    async fn put_item(&self, table_name: &str, item: Item) -> Result<()> {
        self.client
            .put_item()
            .table_name(table_name)
            .set_item(Some(item.attributes))
            .send()
            .await?;

        info!("Item added to '{table_name}'");
        Ok(())
    }

    async fn scan(&self, table_name: &str, filter: Option<&ScanFilter>) -> Result<Page> {
        let mut scan = self.client.scan().table_name(table_name);

        if let Some(filter) = filter.filter(|f| !f.is_empty()) {
            let expression = filter.to_expression();
            debug!("Scanning '{table_name}' with filter '{}'", expression.text);
            scan = scan
                .filter_expression(expression.text)
                .set_expression_attribute_names(Some(expression.names))
                .set_expression_attribute_values(Some(expression.values));
        }

        let response = scan.send().await?;
        Ok(Page {
            has_more: response.last_evaluated_key.is_some(),
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from_attributes)
                .collect(),
        })
    }

    async fn query(&self, table_name: &str, condition: &KeyCondition) -> Result<Page> {
        let expression = condition.to_expression();
        debug!("Querying '{table_name}' with '{}'", expression.text);

        let response = self
            .client
            .query()
            .table_name(table_name)
            .key_condition_expression(expression.text)
            .set_expression_attribute_names(Some(expression.names))
            .set_expression_attribute_values(Some(expression.values))
            .send()
            .await?;

        Ok(Page {
            has_more: response.last_evaluated_key.is_some(),
            items: response
                .items
                .unwrap_or_default()
                .into_iter()
                .map(Item::from_attributes)
                .collect(),
        })
    }
}
