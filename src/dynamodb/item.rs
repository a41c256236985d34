use anyhow::Result;
use aws_sdk_dynamodb::types::AttributeValue;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;

/// Represents a DynamoDB item with various attribute types.
///
/// An item is a collection of named attribute values, similar to a row in
/// other database systems. Every item is identified by its primary key,
/// which is either a partition key alone or a partition key plus a sort key.
///
/// Items can be built attribute by attribute or converted from any
/// `serde` record with [`Item::from_record`].
///
/// # Example
///
/// ```
/// use resource_runner::dynamodb::Item;
///
/// let item = Item::new()
///     .set_string("Id", "1003")
///     .set_string("Course", "Biztalk-o-rama")
///     .set_number("ActivityStamp", 200102.0);
/// assert_eq!(item.get_string("Id"), Some(&"1003".to_string()));
/// ```
#[derive(Default, Debug, Clone, PartialEq)]
pub struct Item {
    pub(crate) attributes: HashMap<String, AttributeValue>,
}

impl Item {
    /// Creates a new empty `Item`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps an attribute map returned by the service.
    pub fn from_attributes(attributes: HashMap<String, AttributeValue>) -> Self {
        Self { attributes }
    }

    /// Converts a serializable record into an item.
    pub fn from_record<T: Serialize>(record: &T) -> Result<Self> {
        let attributes: HashMap<String, AttributeValue> = serde_dynamo::to_item(record)?;
        Ok(Self { attributes })
    }

    /// Converts the item back into a typed record.
    pub fn to_record<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_dynamo::from_item(self.attributes.clone())?)
    }

    /// Sets a string attribute.
    pub fn set_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::S(value.into()));
        self
    }

    /// Sets a number attribute.
    ///
    /// DynamoDB carries numbers as strings on the wire, so the value is
    /// stored in its decimal form.
    pub fn set_number(mut self, key: impl Into<String>, value: impl Into<f64>) -> Self {
        self.attributes
            .insert(key.into(), AttributeValue::N(value.into().to_string()));
        self
    }

    /// Sets an attribute to an arbitrary value.
    pub fn set(mut self, key: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Gets the value of an attribute as a string.
    ///
    /// Returns `None` if the attribute doesn't exist or is not a string.
    pub fn get_string(&self, key: &str) -> Option<&String> {
        self.attributes.get(key).and_then(|av| av.as_s().ok())
    }

    /// Gets the value of an attribute as a number (f64).
    ///
    /// Returns `None` if the attribute doesn't exist, is not a number, or can't be parsed as f64.
    pub fn get_number(&self, key: &str) -> Option<f64> {
        self.attributes
            .get(key)
            .and_then(|av| av.as_n().ok())
            .and_then(|n| n.parse().ok())
    }

    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.attributes.get(key)
    }

    pub fn attributes(&self) -> &HashMap<String, AttributeValue> {
        &self.attributes
    }

    pub fn into_attributes(self) -> HashMap<String, AttributeValue> {
        self.attributes
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Enrollment {
        #[serde(rename = "Id")]
        id: String,
        #[serde(rename = "Course")]
        course: String,
    }

    #[test]
    fn test_item_operations() {
        let item = Item::new()
            .set_string("key1", "value1")
            .set_number("key2", 42.0);

        assert_eq!(item.get_string("key1"), Some(&"value1".to_string()));
        assert_eq!(item.get_number("key2"), Some(42.0));
        assert_eq!(item.get_string("key2"), None);
        assert_eq!(item.get_string("non_existent"), None);
        assert_eq!(item.get_number("non_existent"), None);
    }

    #[test]
    fn test_record_conversion() -> Result<()> {
        let record = Enrollment {
            id: "1003".into(),
            course: "Biztalk-o-rama".into(),
        };

        let item = Item::from_record(&record)?;
        assert_eq!(item.get_string("Id"), Some(&"1003".to_string()));
        assert_eq!(item.get_string("Course"), Some(&"Biztalk-o-rama".to_string()));

        let back: Enrollment = item.to_record()?;
        assert_eq!(back, record);
        Ok(())
    }
}
