//! # DynamoDB Module
//!
//! Key-value table operations behind the [`KeyValueStore`] trait.
//!
//! ## Components
//!
//! - `DynamoDb`: the AWS SDK backed store.
//! - `MemoryDynamoDb`: an in-process store with the same contract.
//! - `Item`: a DynamoDB item with various attribute types.
//! - `ScanFilter` / `KeyCondition`: typed predicates rendered into filter
//!   and key-condition expressions.
//! - `Table`: a table name and its key attributes.
//!
//! Scans and queries return only the first page the service hands back.
//! [`Page::has_more`] says whether more data was left unread.
//!
//! ## Example
//!
//! ```no_run
//! use resource_runner::dynamodb::{Condition, DynamoDb, Item, KeyValueStore, ScanFilter};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let config = aws_config::load_from_env().await;
//! let ddb = DynamoDb::new(&config);
//!
//! ddb.put_item("activity", Item::new().set_string("Id", "1219")).await?;
//!
//! let filter = ScanFilter::new().with(Condition::contains("Activity", "Search")?);
//! let page = ddb.scan("activity", Some(&filter)).await?;
//! println!("{} matching items", page.items.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod filter;
mod item;
mod memory;
mod table;

use anyhow::Result;
use async_trait::async_trait;

pub use client::DynamoDb;
pub use filter::{Comparison, Condition, Expression, KeyCondition, ScanFilter};
pub use item::Item;
pub use memory::MemoryDynamoDb;
pub use table::Table;

/// Summary of a table as reported by describe-table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub status: Option<String>,
    pub item_count: Option<i64>,
    /// `(attribute, key type)` pairs, e.g. `("Id", "HASH")`.
    pub key_schema: Vec<(String, String)>,
}

/// The first page of a scan or query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub items: Vec<Item>,
    pub has_more: bool,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Table names visible to the caller (first page only).
    async fn list_tables(&self) -> Result<Vec<String>>;

    async fn describe_table(&self, table_name: &str) -> Result<TableInfo>;

    /// Writes a full item. An existing item with the same key is replaced.
    async fn put_item(&self, table_name: &str, item: Item) -> Result<()>;

    async fn scan(&self, table_name: &str, filter: Option<&ScanFilter>) -> Result<Page>;

    async fn query(&self, table_name: &str, condition: &KeyCondition) -> Result<Page>;
}
