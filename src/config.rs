//! Runtime configuration.
//!
//! A [`Config`] is built once per invocation from a key lookup. `main` backs
//! the lookup with the process environment (after `dotenv` has loaded any
//! `.env` file); tests pass a map. Nothing here holds credentials as
//! literals: the database password only ever comes from the lookup.
//!
//! Settings that only some operations need stay optional and are checked by
//! the accessor the operation calls, so a missing topic ARN does not stop a
//! table scan from running.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::Level;

use crate::dynamodb::Table;
use crate::error::RunnerError;

pub const DEFAULT_PARTITION_KEY: &str = "Id";
pub const DEFAULT_RECEIVE_WAIT_SECONDS: u64 = 20;
pub const MAX_RECEIVE_WAIT_SECONDS: u64 = 20;
pub const DEFAULT_DB_PORT: u16 = 5432;

/// Which implementation the runner talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Aws,
    Memory,
}

impl FromStr for Backend {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "aws" => Ok(Self::Aws),
            "memory" => Ok(Self::Memory),
            other => Err(RunnerError::InvalidSetting {
                name: "RUNNER_BACKEND",
                reason: format!("expected 'aws' or 'memory', got '{other}'"),
            }),
        }
    }
}

/// Local file pushed by the upload operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSource {
    pub path: PathBuf,
    pub key: String,
    pub content_type: Option<String>,
}

/// Connection settings for the relational database.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
struct DatabaseSettings {
    host: Option<String>,
    port: u16,
    name: Option<String>,
    user: Option<String>,
    password: Option<String>,
}

impl fmt::Debug for DatabaseSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,
    pub log_level: Level,
    pub receive_wait: Duration,
    table: Option<Table>,
    topic_arn: Option<String>,
    queue_name: Option<String>,
    bucket: Option<String>,
    upload: Option<UploadSource>,
    simpledb_domain: Option<String>,
    db_instance: Option<String>,
    database: DatabaseSettings,
}

impl Config {
    /// Builds the configuration from the process environment.
    pub fn from_env() -> Result<Self, RunnerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Empty values
    /// count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RunnerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let backend = get("RUNNER_BACKEND")
            .map(|value| value.parse())
            .transpose()?
            .unwrap_or_default();

        let log_level = get("RUNNER_LOG_LEVEL")
            .map(|value| {
                value.parse::<Level>().map_err(|e| RunnerError::InvalidSetting {
                    name: "RUNNER_LOG_LEVEL",
                    reason: e.to_string(),
                })
            })
            .transpose()?
            .unwrap_or(Level::INFO);

        let receive_wait_seconds = get("RUNNER_RECEIVE_WAIT_SECONDS")
            .map(|value| parse_number::<u64>("RUNNER_RECEIVE_WAIT_SECONDS", &value))
            .transpose()?
            .unwrap_or(DEFAULT_RECEIVE_WAIT_SECONDS);
        if receive_wait_seconds > MAX_RECEIVE_WAIT_SECONDS {
            return Err(RunnerError::InvalidSetting {
                name: "RUNNER_RECEIVE_WAIT_SECONDS",
                reason: format!("must be at most {MAX_RECEIVE_WAIT_SECONDS}"),
            });
        }

        let table = get("RUNNER_TABLE_NAME").map(|name| {
            Table::new(
                name,
                get("RUNNER_TABLE_PARTITION_KEY").unwrap_or_else(|| DEFAULT_PARTITION_KEY.into()),
                get("RUNNER_TABLE_SORT_KEY"),
            )
        });

        let upload = get("RUNNER_UPLOAD_PATH")
            .map(|path| -> Result<UploadSource, RunnerError> {
                let path = PathBuf::from(path);
                let key = match get("RUNNER_UPLOAD_KEY") {
                    Some(key) => key,
                    None => path
                        .file_name()
                        .and_then(|name| name.to_str())
                        .map(str::to_string)
                        .ok_or_else(|| RunnerError::InvalidSetting {
                            name: "RUNNER_UPLOAD_PATH",
                            reason: "path has no file name to use as the object key".into(),
                        })?,
                };
                Ok(UploadSource {
                    path,
                    key,
                    content_type: get("RUNNER_UPLOAD_CONTENT_TYPE"),
                })
            })
            .transpose()?;

        let port = get("RUNNER_DB_PORT")
            .map(|value| parse_number::<u16>("RUNNER_DB_PORT", &value))
            .transpose()?
            .unwrap_or(DEFAULT_DB_PORT);

        Ok(Self {
            backend,
            log_level,
            receive_wait: Duration::from_secs(receive_wait_seconds),
            table,
            topic_arn: get("RUNNER_TOPIC_ARN"),
            queue_name: get("RUNNER_QUEUE_NAME"),
            bucket: get("RUNNER_BUCKET"),
            upload,
            simpledb_domain: get("RUNNER_SDB_DOMAIN"),
            db_instance: get("RUNNER_DB_INSTANCE"),
            database: DatabaseSettings {
                host: get("RUNNER_DB_HOST"),
                port,
                name: get("RUNNER_DB_NAME"),
                user: get("RUNNER_DB_USER"),
                password: get("RUNNER_DB_PASSWORD"),
            },
        })
    }

    pub fn table(&self) -> Result<&Table, RunnerError> {
        self.table
            .as_ref()
            .ok_or(RunnerError::MissingSetting("RUNNER_TABLE_NAME"))
    }

    pub fn topic_arn(&self) -> Result<&str, RunnerError> {
        required(&self.topic_arn, "RUNNER_TOPIC_ARN")
    }

    pub fn queue_name(&self) -> Result<&str, RunnerError> {
        required(&self.queue_name, "RUNNER_QUEUE_NAME")
    }

    pub fn bucket(&self) -> Result<&str, RunnerError> {
        required(&self.bucket, "RUNNER_BUCKET")
    }

    pub fn upload(&self) -> Result<&UploadSource, RunnerError> {
        self.upload
            .as_ref()
            .ok_or(RunnerError::MissingSetting("RUNNER_UPLOAD_PATH"))
    }

    pub fn simpledb_domain(&self) -> Result<&str, RunnerError> {
        required(&self.simpledb_domain, "RUNNER_SDB_DOMAIN")
    }

    pub fn db_instance(&self) -> Result<&str, RunnerError> {
        required(&self.db_instance, "RUNNER_DB_INSTANCE")
    }

    pub fn database(&self) -> Result<DatabaseConfig, RunnerError> {
        let settings = &self.database;
        Ok(DatabaseConfig {
            host: required(&settings.host, "RUNNER_DB_HOST")?.to_string(),
            port: settings.port,
            name: required(&settings.name, "RUNNER_DB_NAME")?.to_string(),
            user: required(&settings.user, "RUNNER_DB_USER")?.to_string(),
            password: required(&settings.password, "RUNNER_DB_PASSWORD")?.to_string(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, RunnerError> {
    value.as_deref().ok_or(RunnerError::MissingSetting(name))
}

fn parse_number<T: FromStr>(name: &'static str, value: &str) -> Result<T, RunnerError>
where
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| RunnerError::InvalidSetting {
        name,
        reason: e.to_string(),
    })
}
