use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_sdk_rds::Client;

use crate::rds::{InstanceDirectory, InstanceInfo};

#[derive(Debug, Clone)]
pub struct RdsInstances {
    client: Client,
}

impl RdsInstances {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl InstanceDirectory for RdsInstances {
    async fn describe_instance(&self, identifier: &str) -> Result<InstanceInfo> {
        let response = self
            .client
            .describe_db_instances()
            .db_instance_identifier(identifier)
            .send()
            .await?;

        let instance = response
            .db_instances()
            .first()
            .ok_or_else(|| anyhow!("no DB instance named '{identifier}'"))?;

        Ok(InstanceInfo {
            identifier: instance
                .db_instance_identifier()
                .unwrap_or(identifier)
                .to_string(),
            status: instance.db_instance_status().map(str::to_string),
            engine: instance.engine().map(str::to_string),
            endpoint: instance.endpoint().and_then(|endpoint| {
                let address = endpoint.address()?;
                Some(match endpoint.port() {
                    Some(port) => format!("{address}:{port}"),
                    None => address.to_string(),
                })
            }),
            maintenance_window: instance.preferred_maintenance_window().map(str::to_string),
        })
    }
}
