use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_dynamodb::types::AttributeValue;

use crate::dynamodb::{Item, KeyCondition, KeyValueStore, Page, ScanFilter, Table, TableInfo};
use crate::error::RunnerError;

/// Items read per scan or query before the page is cut, mirroring the
/// service's per-request read limit.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// An in-memory [`KeyValueStore`].
///
/// Tables must be registered up front with [`MemoryDynamoDb::with_table`].
/// Items are kept in primary-key order. Filters are applied after the page
/// is read, as the service does, so a filtered page can come back short or
/// empty while `has_more` is still set.
#[derive(Debug)]
pub struct MemoryDynamoDb {
    tables: RwLock<HashMap<String, MemoryTable>>,
    page_size: usize,
}

#[derive(Debug)]
struct MemoryTable {
    table: Table,
    items: BTreeMap<(String, String), Item>,
}

impl MemoryTable {
    fn key_of(&self, item: &Item) -> Result<(String, String), RunnerError> {
        let partition = key_part(item, self.table.partition_key())?;
        let sort = match self.table.sort_key() {
            Some(sort_key) => key_part(item, sort_key)?,
            None => String::new(),
        };
        Ok((partition, sort))
    }

    /// The service only accepts conditions on the table's own key
    /// attributes.
    fn check_key_condition(&self, condition: &KeyCondition) -> Result<(), RunnerError> {
        let partition = condition.partition().attribute();
        if partition != self.table.partition_key() {
            return Err(RunnerError::invalid(format!(
                "query condition on '{partition}' missed key schema element '{}'",
                self.table.partition_key()
            )));
        }
        if let Some(sort) = condition.sort() {
            if self.table.sort_key() != Some(sort.attribute()) {
                return Err(RunnerError::invalid(format!(
                    "'{}' is not the sort key of '{}'",
                    sort.attribute(),
                    self.table.name()
                )));
            }
        }
        Ok(())
    }

    fn first_page(&self, page_size: usize) -> (impl Iterator<Item = &Item>, bool) {
        (self.items.values().take(page_size), self.items.len() > page_size)
    }
}

/// Key text for one key attribute. Numbers are canonicalized so that `1`,
/// `1.0` and `1e0` address the same item.
fn key_part(item: &Item, attribute: &str) -> Result<String, RunnerError> {
    match item.get(attribute) {
        Some(AttributeValue::S(s)) => Ok(format!("S:{s}")),
        Some(AttributeValue::N(n)) => canonical_number(n)
            .map(|n| format!("N:{n}"))
            .ok_or_else(|| {
                RunnerError::invalid(format!("key attribute '{attribute}' is not a number: '{n}'"))
            }),
        Some(_) => Err(RunnerError::invalid(format!(
            "key attribute '{attribute}' must be a string or number"
        ))),
        None => Err(RunnerError::invalid(format!(
            "item is missing key attribute '{attribute}'"
        ))),
    }
}

/// Renders a decimal number as `0.<significant digits>e<exponent>`, or `0`.
fn canonical_number(text: &str) -> Option<String> {
    let text = text.trim();
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text.strip_prefix('+').unwrap_or(text)),
    };
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(i) => (&unsigned[..i], unsigned[i + 1..].parse::<i64>().ok()?),
        None => (unsigned, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part
        .chars()
        .chain(frac_part.chars())
        .all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let digits = format!("{int_part}{frac_part}");
    let significant = digits.trim_matches('0');
    if significant.is_empty() {
        return Some("0".to_string());
    }
    let leading_zeros = digits.len() - digits.trim_start_matches('0').len();
    let exponent = exponent + int_part.len() as i64 - leading_zeros as i64;
    let sign = if negative { "-" } else { "" };
    Some(format!("{sign}0.{significant}e{exponent}"))
}

impl MemoryDynamoDb {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Registers an empty table.
    pub fn with_table(self, table: Table) -> Self {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                table.name().to_string(),
                MemoryTable {
                    table,
                    items: BTreeMap::new(),
                },
            );
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn with_table_ref<T>(
        &self,
        table_name: &str,
        f: impl FnOnce(&MemoryTable) -> T,
    ) -> Result<T, RunnerError> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .get(table_name)
            .map(f)
            .ok_or_else(|| RunnerError::TableNotFound(table_name.to_string()))
    }
}

impl Default for MemoryDynamoDb {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryDynamoDb {
    async fn list_tables(&self) -> Result<Vec<String>> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn describe_table(&self, table_name: &str) -> Result<TableInfo> {
        Ok(self.with_table_ref(table_name, |t| {
            let mut key_schema = vec![(t.table.partition_key().to_string(), "HASH".to_string())];
            if let Some(sort_key) = t.table.sort_key() {
                key_schema.push((sort_key.to_string(), "RANGE".to_string()));
            }
            TableInfo {
                name: t.table.name().to_string(),
                status: Some("ACTIVE".to_string()),
                item_count: Some(t.items.len() as i64),
                key_schema,
            }
        })?)
    }

    async fn put_item(&self, table_name: &str, item: Item) -> Result<()> {
        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        let table = tables
            .get_mut(table_name)
            .ok_or_else(|| RunnerError::TableNotFound(table_name.to_string()))?;
        let key = table.key_of(&item)?;
        table.items.insert(key, item);
        Ok(())
    }

    async fn scan(&self, table_name: &str, filter: Option<&ScanFilter>) -> Result<Page> {
        Ok(self.with_table_ref(table_name, |t| {
            let (items, has_more) = t.first_page(self.page_size);
            Page {
                items: items
                    .filter(|item| filter.map_or(true, |f| f.matches(item)))
                    .cloned()
                    .collect(),
                has_more,
            }
        })?)
    }

    async fn query(&self, table_name: &str, condition: &KeyCondition) -> Result<Page> {
        let page = self.with_table_ref(table_name, |t| {
            t.check_key_condition(condition)?;
            let mut matching = t.items.values().filter(|item| condition.matches(item));
            let items: Vec<Item> = matching.by_ref().take(self.page_size).cloned().collect();
            Ok::<_, RunnerError>(Page {
                items,
                has_more: matching.next().is_some(),
            })
        })??;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dynamodb::{Comparison, Condition};

    fn activity_table() -> Table {
        Table::new("activity", "Id", Some("ActivityStamp".to_string()))
    }

    #[tokio::test]
    async fn test_put_replaces_item_with_same_key() -> Result<()> {
        let ddb = MemoryDynamoDb::new().with_table(activity_table());
        let key = Item::new()
            .set_string("Id", "100")
            .set_number("ActivityStamp", 200102.0);

        ddb.put_item("activity", key.clone().set_string("Activity", "Search"))
            .await?;
        ddb.put_item("activity", key.set_string("Activity", "Browse"))
            .await?;

        let page = ddb.scan("activity", None).await?;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].get_string("Activity"), Some(&"Browse".to_string()));
        Ok(())
    }

    #[tokio::test]
    async fn test_put_rejects_missing_key() {
        let ddb = MemoryDynamoDb::new().with_table(activity_table());
        let err = ddb
            .put_item("activity", Item::new().set_string("Id", "100"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let ddb = MemoryDynamoDb::new();
        let err = ddb.scan("nope", None).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<RunnerError>(),
            Some(&RunnerError::TableNotFound("nope".into()))
        );
    }

    #[tokio::test]
    async fn test_scan_returns_first_page_only() -> Result<()> {
        let ddb = MemoryDynamoDb::new()
            .with_table(Table::new("t", "Id", None))
            .with_page_size(3);
        for i in 0..5 {
            ddb.put_item("t", Item::new().set_string("Id", format!("{i}")))
                .await?;
        }

        let page = ddb.scan("t", None).await?;
        assert_eq!(page.items.len(), 3);
        assert!(page.has_more);
        Ok(())
    }

    #[tokio::test]
    async fn test_query_with_sort_key_condition() -> Result<()> {
        let ddb = MemoryDynamoDb::new().with_table(activity_table());
        for (id, stamp) in [("100", 200100.0), ("100", 200105.0), ("101", 200110.0)] {
            ddb.put_item(
                "activity",
                Item::new().set_string("Id", id).set_number("ActivityStamp", stamp),
            )
            .await?;
        }

        let condition = KeyCondition::new("Id", AttributeValue::S("100".into()))?.with_sort(
            Condition::new(
                "ActivityStamp",
                Comparison::Gt,
                AttributeValue::N("200101".into()),
            )?,
        )?;
        let page = ddb.query("activity", &condition).await?;
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].get_number("ActivityStamp"), Some(200105.0));
        assert!(!page.has_more);

        let info = ddb.describe_table("activity").await?;
        assert_eq!(info.item_count, Some(3));
        assert_eq!(info.key_schema[1], ("ActivityStamp".into(), "RANGE".into()));
        Ok(())
    }

    #[tokio::test]
    async fn test_equal_numbers_address_one_item() -> Result<()> {
        let ddb = MemoryDynamoDb::new().with_table(Table::new("t", "Id", None));
        for (id, label) in [("1", "first"), ("1.0", "second"), ("10e-1", "third")] {
            ddb.put_item(
                "t",
                Item::new()
                    .set("Id", AttributeValue::N(id.into()))
                    .set_string("Label", label),
            )
            .await?;
        }
        ddb.put_item("t", Item::new().set("Id", AttributeValue::N("2".into())))
            .await?;
        ddb.put_item("t", Item::new().set_string("Id", "1")).await?;

        let page = ddb.scan("t", None).await?;
        assert_eq!(page.items.len(), 3);
        let numeric_one: Vec<_> = page
            .items
            .iter()
            .filter_map(|item| item.get_string("Label"))
            .collect();
        assert_eq!(numeric_one, vec!["third"]);
        Ok(())
    }

    #[test]
    fn test_canonical_number() {
        assert_eq!(canonical_number("1"), canonical_number("1.0"));
        assert_eq!(canonical_number("100"), canonical_number("1e2"));
        assert_eq!(canonical_number("0.050"), Some("0.5e-1".to_string()));
        assert_eq!(canonical_number("-0.0"), Some("0".to_string()));
        assert_eq!(canonical_number("-12.5"), Some("-0.125e2".to_string()));
        assert_ne!(canonical_number("12"), canonical_number("-12"));
        assert_eq!(canonical_number("abc"), None);
        assert_eq!(canonical_number("."), None);
    }

    #[tokio::test]
    async fn test_query_must_use_key_attributes() -> Result<()> {
        let ddb = MemoryDynamoDb::new().with_table(activity_table());
        ddb.put_item(
            "activity",
            Item::new()
                .set_string("Id", "100")
                .set_number("ActivityStamp", 200100.0)
                .set_string("Activity", "Search"),
        )
        .await?;

        let on_attribute = KeyCondition::new("Activity", AttributeValue::S("Search".into()))?;
        let err = ddb.query("activity", &on_attribute).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::InvalidRequest(_))
        ));

        let on_activity = Condition::new(
            "Activity",
            Comparison::Eq,
            AttributeValue::S("Search".into()),
        )?;
        let wrong_sort =
            KeyCondition::new("Id", AttributeValue::S("100".into()))?.with_sort(on_activity)?;
        assert!(ddb.query("activity", &wrong_sort).await.is_err());
        Ok(())
    }
}
