//! Attribute storage through SimpleDB.

mod client;
mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::RunnerError;

pub use client::SimpleDb;
pub use memory::MemorySimpleDb;

/// An item as returned by select: its name plus `(attribute, value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeItem {
    pub name: String,
    pub attributes: Vec<(String, String)>,
}

impl AttributeItem {
    pub fn value_of(&self, attribute: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value.as_str())
    }
}

/// One attribute to write. With `replace`, existing values of the
/// attribute are dropped first; otherwise the value is added alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeUpdate {
    pub name: String,
    pub value: String,
    pub replace: bool,
}

impl AttributeUpdate {
    pub fn replace(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            replace: true,
        }
    }
}

/// `select * from <domain> where <attribute> = '<value>'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectQuery {
    domain: String,
    attribute: String,
    value: String,
}

impl SelectQuery {
    pub fn new(
        domain: impl Into<String>,
        attribute: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<Self, RunnerError> {
        let domain = domain.into();
        let attribute = attribute.into();
        validate_domain(&domain)?;
        if attribute.is_empty() {
            return Err(RunnerError::invalid("select attribute is empty"));
        }
        Ok(Self {
            domain,
            attribute,
            value: value.into(),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// Renders the select expression with names in backticks and the value
    /// in single quotes, doubling any embedded quote characters.
    pub fn expression(&self) -> String {
        format!(
            "select * from `{}` where `{}` = '{}'",
            self.domain.replace('`', "``"),
            self.attribute.replace('`', "``"),
            self.value.replace('\'', "''"),
        )
    }

    pub fn matches(&self, item: &AttributeItem) -> bool {
        item.attributes
            .iter()
            .any(|(name, value)| name == &self.attribute && value == &self.value)
    }
}

/// Domain names are 3 to 255 characters of `a-z A-Z 0-9 _ - .`
pub(crate) fn validate_domain(domain: &str) -> Result<(), RunnerError> {
    let valid = (3..=255).contains(&domain.len())
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RunnerError::invalid(format!(
            "'{domain}' is not a valid domain name"
        )))
    }
}

#[async_trait]
pub trait AttributeStore: Send + Sync {
    async fn list_domains(&self) -> Result<Vec<String>>;

    async fn select(&self, query: &SelectQuery) -> Result<Vec<AttributeItem>>;

    async fn put_attributes(
        &self,
        domain: &str,
        item_name: &str,
        updates: &[AttributeUpdate],
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_expression_quoting() {
        let query = SelectQuery::new("Demo_150216", "fat", "False").unwrap();
        assert_eq!(
            query.expression(),
            "select * from `Demo_150216` where `fat` = 'False'"
        );

        let query = SelectQuery::new("Demo_150216", "odd`name", "it's").unwrap();
        assert_eq!(
            query.expression(),
            "select * from `Demo_150216` where `odd``name` = 'it''s'"
        );
    }

    #[test]
    fn test_domain_validation() {
        assert!(SelectQuery::new("ab", "fat", "False").is_err());
        assert!(SelectQuery::new("bad domain", "fat", "False").is_err());
        assert!(SelectQuery::new("Demo_150216", "", "False").is_err());
    }
}
