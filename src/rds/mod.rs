//! Relational database access and RDS instance lookup.
//!
//! SQL goes straight to PostgreSQL over one short-lived connection per
//! query; the RDS control-plane API is only used to describe the instance.

mod instance;
mod memory;
mod postgres;

use anyhow::Result;
use async_trait::async_trait;

pub use instance::RdsInstances;
pub use memory::{MemoryInstances, MemoryRelationalDb};
pub use postgres::PostgresDb;

/// Lists every table the connected user can see. Columns are cast to text
/// so they decode regardless of the catalog's domain types.
pub const DEFAULT_QUERY: &str = "select table_catalog::text, table_schema::text, table_name::text \
     from information_schema.tables";

/// Rows of a query, every column decoded as nullable text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl QueryResult {
    /// Values of one named column, in row order.
    pub fn column(&self, name: &str) -> Option<Vec<Option<&str>>> {
        let index = self.columns.iter().position(|c| c == name)?;
        Some(
            self.rows
                .iter()
                .map(|row| row.get(index).and_then(|v| v.as_deref()))
                .collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceInfo {
    pub identifier: String,
    pub status: Option<String>,
    pub engine: Option<String>,
    /// `host:port`
    pub endpoint: Option<String>,
    pub maintenance_window: Option<String>,
}

#[async_trait]
pub trait RelationalDb: Send + Sync {
    /// Runs one statement and returns all of its rows.
    async fn query(&self, sql: &str) -> Result<QueryResult>;
}

#[async_trait]
pub trait InstanceDirectory: Send + Sync {
    async fn describe_instance(&self, identifier: &str) -> Result<InstanceInfo>;
}
