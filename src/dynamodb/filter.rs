//! Typed scan filters and key conditions.
//!
//! Conditions are rendered into DynamoDB expression syntax with generated
//! placeholders, so attribute names never need escaping and values never
//! appear inline. The same conditions can be evaluated locally against an
//! [`Item`], which is what the in-memory table does.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use aws_sdk_dynamodb::types::AttributeValue;

use crate::dynamodb::Item;
use crate::error::RunnerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Contains,
    BeginsWith,
}

impl Comparison {
    fn is_function(self) -> bool {
        matches!(self, Self::Contains | Self::BeginsWith)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Contains => "contains",
            Self::BeginsWith => "begins_with",
        };
        f.write_str(token)
    }
}

impl std::str::FromStr for Comparison {
    type Err = RunnerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "=" | "eq" => Ok(Self::Eq),
            "<>" | "ne" => Ok(Self::Ne),
            "<" | "lt" => Ok(Self::Lt),
            "<=" | "le" => Ok(Self::Le),
            ">" | "gt" => Ok(Self::Gt),
            ">=" | "ge" => Ok(Self::Ge),
            "contains" => Ok(Self::Contains),
            "begins_with" => Ok(Self::BeginsWith),
            other => Err(RunnerError::invalid(format!(
                "unknown comparison operator '{other}'"
            ))),
        }
    }
}

/// One predicate: `attribute <comparison> value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    attribute: String,
    comparison: Comparison,
    value: AttributeValue,
}

impl Condition {
    pub fn new(
        attribute: impl Into<String>,
        comparison: Comparison,
        value: AttributeValue,
    ) -> Result<Self, RunnerError> {
        let attribute = attribute.into();
        if attribute.trim().is_empty() {
            return Err(RunnerError::invalid("condition attribute name is empty"));
        }
        if comparison.is_function() && !value.is_s() {
            return Err(RunnerError::invalid(format!(
                "{comparison} on '{attribute}' needs a string operand"
            )));
        }
        Ok(Self {
            attribute,
            comparison,
            value,
        })
    }

    /// Shorthand for `contains(attribute, substring)`.
    pub fn contains(
        attribute: impl Into<String>,
        substring: impl Into<String>,
    ) -> Result<Self, RunnerError> {
        Self::new(
            attribute,
            Comparison::Contains,
            AttributeValue::S(substring.into()),
        )
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn comparison(&self) -> Comparison {
        self.comparison
    }

    pub fn value(&self) -> &AttributeValue {
        &self.value
    }

    fn render(&self, index: usize, expression: &mut Expression) -> String {
        let name = format!("#a{index}");
        let value = format!(":v{index}");
        let clause = if self.comparison.is_function() {
            format!("{}({name}, {value})", self.comparison)
        } else {
            format!("{name} {} {value}", self.comparison)
        };
        expression.names.insert(name, self.attribute.clone());
        expression.values.insert(value, self.value.clone());
        clause
    }

    /// Evaluates the condition against an item the way the service would.
    /// A missing attribute never matches.
    pub fn matches(&self, item: &Item) -> bool {
        let Some(actual) = item.get(&self.attribute) else {
            return false;
        };
        match self.comparison {
            Comparison::Contains => contains(actual, &self.value),
            Comparison::BeginsWith => match (actual, &self.value) {
                (AttributeValue::S(a), AttributeValue::S(prefix)) => a.starts_with(prefix.as_str()),
                _ => false,
            },
            Comparison::Ne => compare(actual, &self.value) != Some(Ordering::Equal),
            Comparison::Eq => compare(actual, &self.value) == Some(Ordering::Equal),
            Comparison::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Comparison::Le => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Comparison::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Comparison::Ge => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

fn compare(a: &AttributeValue, b: &AttributeValue) -> Option<Ordering> {
    match (a, b) {
        (AttributeValue::S(a), AttributeValue::S(b)) => Some(a.cmp(b)),
        (AttributeValue::N(a), AttributeValue::N(b)) => {
            let a: f64 = a.parse().ok()?;
            let b: f64 = b.parse().ok()?;
            a.partial_cmp(&b)
        }
        (AttributeValue::B(a), AttributeValue::B(b)) => Some(a.as_ref().cmp(b.as_ref())),
        (AttributeValue::Bool(a), AttributeValue::Bool(b)) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

fn contains(actual: &AttributeValue, operand: &AttributeValue) -> bool {
    let AttributeValue::S(needle) = operand else {
        return false;
    };
    match actual {
        AttributeValue::S(haystack) => haystack.contains(needle.as_str()),
        AttributeValue::Ss(set) => set.iter().any(|member| member == needle),
        AttributeValue::L(list) => list
            .iter()
            .any(|member| matches!(member, AttributeValue::S(s) if s == needle)),
        _ => false,
    }
}

/// A rendered expression plus its placeholder maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Expression {
    pub text: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Conditions joined with `AND`, applied server-side after items are read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanFilter {
    conditions: Vec<Condition>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn to_expression(&self) -> Expression {
        let mut expression = Expression::default();
        let clauses: Vec<String> = self
            .conditions
            .iter()
            .enumerate()
            .map(|(i, condition)| condition.render(i, &mut expression))
            .collect();
        expression.text = clauses.join(" AND ");
        expression
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.conditions.iter().all(|condition| condition.matches(item))
    }
}

/// Key condition for a query: partition key equality plus an optional
/// condition on the sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    partition: Condition,
    sort: Option<Condition>,
}

impl KeyCondition {
    pub fn new(
        partition_key: impl Into<String>,
        value: AttributeValue,
    ) -> Result<Self, RunnerError> {
        Ok(Self {
            partition: Condition::new(partition_key, Comparison::Eq, value)?,
            sort: None,
        })
    }

    pub fn with_sort(mut self, condition: Condition) -> Result<Self, RunnerError> {
        match condition.comparison() {
            Comparison::Ne | Comparison::Contains => Err(RunnerError::invalid(format!(
                "{} is not allowed on sort key '{}'",
                condition.comparison(),
                condition.attribute()
            ))),
            _ => {
                self.sort = Some(condition);
                Ok(self)
            }
        }
    }

    pub fn partition(&self) -> &Condition {
        &self.partition
    }

    pub fn sort(&self) -> Option<&Condition> {
        self.sort.as_ref()
    }

    pub fn to_expression(&self) -> Expression {
        let mut expression = Expression::default();
        let mut text = self.partition.render(0, &mut expression);
        if let Some(sort) = &self.sort {
            text.push_str(" AND ");
            text.push_str(&sort.render(1, &mut expression));
        }
        expression.text = text;
        expression
    }

    pub fn matches(&self, item: &Item) -> bool {
        self.partition.matches(item) && self.sort.as_ref().map_or(true, |c| c.matches(item))
    }
}
