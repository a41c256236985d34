use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgRow};
use sqlx::{Column, Connection, Executor, Row};
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::rds::{QueryResult, RelationalDb};

/// PostgreSQL over a fresh connection per query. No pool, no reconnect.
///
/// Statements go over the simple-query protocol, which returns every value
/// in its text form, so any column type decodes as `Option<String>`.
#[derive(Debug, Clone)]
pub struct PostgresDb {
    options: PgConnectOptions,
    label: String,
}

impl PostgresDb {
    pub fn new(config: &DatabaseConfig) -> Self {
        Self {
            options: PgConnectOptions::new()
                .host(&config.host)
                .port(config.port)
                .database(&config.name)
                .username(&config.user)
                .password(&config.password),
            label: format!("{} on {}:{}", config.name, config.host, config.port),
        }
    }
}

#[async_trait]
impl RelationalDb for PostgresDb {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        info!("Connecting to {}", self.label);
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .with_context(|| format!("connecting to {}", self.label))?;

        debug!("Executing '{sql}'");
        let rows = (&mut conn).fetch_all(sql).await?;
        let result = rows_to_text(&rows)?;

        conn.close().await?;
        Ok(result)
    }
}

fn rows_to_text(rows: &[PgRow]) -> Result<QueryResult> {
    let mut result = QueryResult::default();
    if let Some(first) = rows.first() {
        result.columns = first
            .columns()
            .iter()
            .map(|column| column.name().to_string())
            .collect();
    }
    for row in rows {
        let values = (0..row.len())
            .map(|i| row.try_get_unchecked::<Option<String>, _>(i))
            .collect::<Result<Vec<_>, _>>()?;
        result.rows.push(values);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    #[ignore = "needs a PostgreSQL server configured through RUNNER_DB_*"]
    async fn test_non_text_columns_decode_as_text() -> Result<()> {
        dotenv::dotenv().ok();
        let db = PostgresDb::new(&Config::from_env()?.database()?);

        let result = db
            .query("select 1 as one, 2::int8 as big, true as flag, null::int4 as nothing, 1.50::numeric as price")
            .await?;
        assert_eq!(result.columns, vec!["one", "big", "flag", "nothing", "price"]);
        assert_eq!(
            result.rows,
            vec![vec![
                Some("1".to_string()),
                Some("2".to_string()),
                Some("t".to_string()),
                None,
                Some("1.50".to_string()),
            ]]
        );
        Ok(())
    }
}
