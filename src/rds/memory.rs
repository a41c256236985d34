use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::rds::{InstanceDirectory, InstanceInfo, QueryResult, RelationalDb};

/// A [`RelationalDb`] that answers known statements with canned results.
#[derive(Debug, Default)]
pub struct MemoryRelationalDb {
    results: HashMap<String, QueryResult>,
}

impl MemoryRelationalDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_result(mut self, sql: impl Into<String>, result: QueryResult) -> Self {
        self.results.insert(normalize(&sql.into()), result);
        self
    }
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl RelationalDb for MemoryRelationalDb {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        self.results
            .get(&normalize(sql))
            .cloned()
            .ok_or_else(|| anyhow!("syntax error or unknown relation in '{sql}'"))
    }
}

#[derive(Debug, Default)]
pub struct MemoryInstances {
    instances: HashMap<String, InstanceInfo>,
}

impl MemoryInstances {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instance(mut self, info: InstanceInfo) -> Self {
        self.instances.insert(info.identifier.clone(), info);
        self
    }
}

#[async_trait]
impl InstanceDirectory for MemoryInstances {
    async fn describe_instance(&self, identifier: &str) -> Result<InstanceInfo> {
        self.instances
            .get(identifier)
            .cloned()
            .ok_or_else(|| anyhow!("no DB instance named '{identifier}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rds::DEFAULT_QUERY;

    #[tokio::test]
    async fn test_canned_query_ignores_whitespace() -> Result<()> {
        let db = MemoryRelationalDb::new().with_result(
            DEFAULT_QUERY,
            QueryResult {
                columns: vec!["table_catalog".into(), "table_schema".into(), "table_name".into()],
                rows: vec![vec![
                    Some("demo".into()),
                    Some("public".into()),
                    Some("courses".into()),
                ]],
            },
        );

        let result = db
            .query("select table_catalog::text,  table_schema::text, table_name::text\n from information_schema.tables")
            .await?;
        assert_eq!(result.column("table_name"), Some(vec![Some("courses")]));
        assert!(db.query("select 1").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_canned_count_reports_text() -> Result<()> {
        let db = MemoryRelationalDb::new().with_result(
            "select count(*) from courses",
            QueryResult {
                columns: vec!["count".into()],
                rows: vec![vec![Some("4".into())]],
            },
        );
        let result = db.query("select count(*)\nfrom courses").await?;
        assert_eq!(result.column("count"), Some(vec![Some("4")]));
        Ok(())
    }
}
