use std::str::FromStr;

use anyhow::Result;
use async_trait::async_trait;
use rusoto_core::Region;
use rusoto_sdb::{
    ListDomainsRequest, PutAttributesRequest, ReplaceableAttribute, SelectRequest,
    SimpleDb as _, SimpleDbClient,
};
use tracing::{debug, info};

use crate::simpledb::{validate_domain, AttributeItem, AttributeStore, AttributeUpdate, SelectQuery};

/// SimpleDB over rusoto. The current AWS SDK ships no SimpleDB client, so
/// only the region is taken from the shared `SdkConfig`; credentials come
/// from rusoto's default chain (environment, profile, instance role).
pub struct SimpleDb {
    client: SimpleDbClient,
}

impl SimpleDb {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Result<Self> {
        let region = match sdk_config.region() {
            Some(region) => Region::from_str(region.as_ref())?,
            None => Region::default(),
        };
        Ok(Self {
            client: SimpleDbClient::new(region),
        })
    }
}

fn to_replaceable(update: &AttributeUpdate) -> ReplaceableAttribute {
    ReplaceableAttribute {
        name: update.name.clone(),
        value: update.value.clone(),
        replace: Some(update.replace),
    }
}

#[async_trait]
impl AttributeStore for SimpleDb {
    async fn list_domains(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .list_domains(ListDomainsRequest::default())
            .await?;
        Ok(response.domain_names.unwrap_or_default())
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<AttributeItem>> {
        let expression = query.expression();
        debug!("Selecting with '{expression}'");
        let response = self
            .client
            .select(SelectRequest {
                select_expression: expression,
                ..Default::default()
            })
            .await?;

        Ok(response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(|item| AttributeItem {
                name: item.name,
                attributes: item
                    .attributes
                    .into_iter()
                    .map(|a| (a.name, a.value))
                    .collect(),
            })
            .collect())
    }

    async fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        updates: &[AttributeUpdate],
    ) -> Result<()> {
        validate_domain(domain)?;
        self.client
            .put_attributes(PutAttributesRequest {
                domain_name: domain.to_string(),
                item_name: item_name.to_string(),
                attributes: updates.iter().map(to_replaceable).collect(),
                ..Default::default()
            })
            .await?;
        info!("Updated {} attribute(s) on '{item_name}' in '{domain}'", updates.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_replaceable_keeps_replace_flag() {
        let keep = AttributeUpdate {
            name: "fat".into(),
            value: "False".into(),
            replace: false,
        };
        let attribute = to_replaceable(&keep);
        assert_eq!(attribute.name, "fat");
        assert_eq!(attribute.value, "False");
        assert_eq!(attribute.replace, Some(false));
        assert_eq!(
            to_replaceable(&AttributeUpdate::replace("lady", "True")).replace,
            Some(true)
        );
    }
}
