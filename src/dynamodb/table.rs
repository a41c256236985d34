/// DynamoDB table configuration.
///
/// Names a table and its primary key attributes. Each DynamoDB table is a
/// collection of items identified by their primary key.
///
/// - **Partition Key**: determines the partition where the item is stored.
/// - **Sort Key**: optional; orders items that share a partition key.
///
/// # Example
///
/// ```
/// use resource_runner::dynamodb::Table;
///
/// let table = Table::new("activity", "Id", Some("ActivityStamp".to_string()));
/// assert_eq!(table.sort_key(), Some("ActivityStamp"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    name: String,
    partition_key: String,
    sort_key: Option<String>,
}

impl Table {
    /// Creates a new `Table` instance.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the DynamoDB table.
    /// * `partition_key` - The name of the partition key attribute.
    /// * `sort_key` - The name of the sort key attribute, if any.
    pub fn new(
        name: impl Into<String>,
        partition_key: impl Into<String>,
        sort_key: Option<String>,
    ) -> Self {
        Self {
            name: name.into(),
            partition_key: partition_key.into(),
            sort_key,
        }
    }

    /// Returns the name of the table.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the partition key of the table.
    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    /// Returns the sort key of the table, if any.
    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }
}
