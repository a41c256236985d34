use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RunnerError;
use crate::simpledb::{validate_domain, AttributeItem, AttributeStore, AttributeUpdate, SelectQuery};

type Domain = BTreeMap<String, Vec<(String, String)>>;

/// An in-memory [`AttributeStore`]. Items come back in name order.
#[derive(Debug, Default)]
pub struct MemorySimpleDb {
    domains: RwLock<BTreeMap<String, Domain>>,
}

impl MemorySimpleDb {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_domain(self, domain: impl Into<String>) -> Self {
        self.domains
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(domain.into(), Domain::new());
        self
    }
}

#[async_trait]
impl AttributeStore for MemorySimpleDb {
    async fn list_domains(&self) -> Result<Vec<String>> {
        Ok(self
            .domains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect())
    }

    async fn select(&self, query: &SelectQuery) -> Result<Vec<AttributeItem>> {
        let domains = self.domains.read().unwrap_or_else(PoisonError::into_inner);
        let domain = domains.get(query.domain()).ok_or_else(|| {
            RunnerError::invalid(format!("domain '{}' does not exist", query.domain()))
        })?;
        Ok(domain
            .iter()
            .map(|(name, attributes)| AttributeItem {
                name: name.clone(),
                attributes: attributes.clone(),
            })
            .filter(|item| query.matches(item))
            .collect())
    }

    async fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        updates: &[AttributeUpdate],
    ) -> Result<()> {
        validate_domain(domain)?;
        let mut domains = self.domains.write().unwrap_or_else(PoisonError::into_inner);
        let items = domains
            .get_mut(domain)
            .ok_or_else(|| RunnerError::invalid(format!("domain '{domain}' does not exist")))?;
        let attributes = items.entry(item_name.to_string()).or_default();

        for update in updates {
            if update.replace {
                attributes.retain(|(name, _)| name != &update.name);
            }
            let pair = (update.name.clone(), update.value.clone());
            if !attributes.contains(&pair) {
                attributes.push(pair);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: &str = "Demo_150216";

    async fn flintstones() -> Result<MemorySimpleDb> {
        let sdb = MemorySimpleDb::new().with_domain(DOMAIN);
        for (name, fat, lady) in [
            ("Fred", "True", "False"),
            ("Barney", "False", "False"),
            ("Wilma", "False", "True"),
            ("Betty", "False", "True"),
        ] {
            sdb.put_attributes(
                DOMAIN,
                name,
                &[
                    AttributeUpdate::replace("fat", fat),
                    AttributeUpdate::replace("lady", lady),
                ],
            )
            .await?;
        }
        Ok(sdb)
    }

    #[tokio::test]
    async fn test_select_by_attribute() -> Result<()> {
        let sdb = flintstones().await?;
        let query = SelectQuery::new(DOMAIN, "fat", "False")?;

        let names: Vec<String> = sdb.select(&query).await?.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["Barney", "Betty", "Wilma"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_replace_and_add() -> Result<()> {
        let sdb = flintstones().await?;
        sdb.put_attributes(DOMAIN, "Fred", &[AttributeUpdate::replace("fat", "False")])
            .await?;
        sdb.put_attributes(
            DOMAIN,
            "Fred",
            &[AttributeUpdate {
                name: "hat".into(),
                value: "none".into(),
                replace: false,
            }],
        )
        .await?;

        let query = SelectQuery::new(DOMAIN, "fat", "False")?;
        let items = sdb.select(&query).await?;
        assert_eq!(items.len(), 4);
        let fred = items.iter().find(|i| i.name == "Fred").unwrap();
        assert_eq!(fred.value_of("fat"), Some("False"));
        assert_eq!(fred.value_of("hat"), Some("none"));
        Ok(())
    }
}
