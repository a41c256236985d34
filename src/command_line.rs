use crate::dynamodb::{Comparison, Condition, Item, KeyCondition, ScanFilter};
use crate::rds::DEFAULT_QUERY;
use crate::runner::{Operation, Runner};
use crate::simpledb::AttributeUpdate;
use anyhow::{anyhow, Result};
use aws_sdk_dynamodb::types::AttributeValue;
use std::io::{self, BufRead, Write};
use thiserror::Error;
use tracing::{error, info};

/// Standard input reached end of file.
#[derive(Debug, Error)]
#[error("input closed")]
pub struct InputClosed;

const VALUE_TYPE_PROMPT: &str = "Enter value type (S for string, N for number)";

const COMMANDS: &str = "tables/describe/scan/query/put/publish/topics/send/receive/queues/buckets/upload/domains/select/put_attributes/sql/instance/exit";

/// Runs the command-line interface.
///
/// This function enters a loop that prompts the user for commands, turns
/// each one into a single [`Operation`] and prints the resulting report.
/// The supported commands are:
/// - tables: List table names
/// - describe: Describe every table
/// - scan: Scan the configured table, optionally filtered
/// - query: Query the configured table by key
/// - put: Put an item into the configured table
/// - publish: Publish a message to the configured topic
/// - topics: List topics
/// - send: Send a message to the configured queue
/// - receive: Receive one message from the configured queue and delete it
/// - queues: List queues and their attributes
/// - buckets: List buckets
/// - upload: Upload the configured file to the configured bucket
/// - domains: List SimpleDB domains
/// - select: Select SimpleDB items by attribute value
/// - put_attributes: Write attributes to a SimpleDB item
/// - sql: Run a SQL statement against the configured database
/// - instance: Describe the configured RDS instance
/// - exit: Exit the program
///
/// A failing operation is reported and the loop continues. End of input
/// exits like `exit`, including in the middle of a command's prompts.
pub async fn run(runner: &Runner<'_>) -> Result<()> {
    loop {
        let command = prompt(
            &mut io::stdin().lock(),
            &format!("Enter command ({COMMANDS})"),
            None,
        );
        let command = match command {
            Err(e) if e.is::<InputClosed>() => break,
            other => other?,
        };
        let operation = match command.as_str() {
            "exit" => break,
            "" => continue,
            other => match read_operation(&mut io::stdin().lock(), other) {
                Ok(Some(operation)) => operation,
                Ok(None) => {
                    println!("Unknown command. Please try again.");
                    continue;
                }
                Err(e) if e.is::<InputClosed>() => break,
                Err(e) => {
                    println!("Invalid input: {e}");
                    continue;
                }
            },
        };

        match runner.run(operation).await {
            Ok(report) => println!("\n{report}\n"),
            Err(e) => {
                error!("Operation failed: {e:#}");
                println!("Operation failed: {e:#}");
            }
        }
    }
    info!("Exiting");
    Ok(())
}

/// Prompts for whatever the command needs and builds its operation.
fn read_operation(input: &mut impl BufRead, command: &str) -> Result<Option<Operation>> {
    let operation = match command {
        "tables" => Operation::ListTables,
        "describe" => Operation::DescribeTables,
        "scan" => {
            let filter = read_conditions(input)?
                .into_iter()
                .fold(ScanFilter::new(), ScanFilter::with);
            Operation::Scan(Some(filter).filter(|f| !f.is_empty()))
        }
        "query" => {
            let partition_key = prompt(input, "Enter partition key attribute", Some("Id"))?;
            let value_type = prompt(input, VALUE_TYPE_PROMPT, Some("S"))?;
            let value = prompt(input, "Enter partition key value", Some("100"))?;
            let mut condition =
                KeyCondition::new(partition_key, parse_attribute_value(&value_type, value)?)?;
            if let Some(sort) = read_conditions(input)?.into_iter().next() {
                condition = condition.with_sort(sort)?;
            }
            Operation::Query(condition)
        }
        "put" => Operation::PutItem(read_item(input)?),
        "publish" => Operation::Publish {
            subject: prompt(input, "Enter subject", Some("Hello from rust"))?,
            message: prompt(input, "Enter message", Some("Congratulations"))?,
        },
        "topics" => Operation::ListTopics,
        "send" => {
            let body = prompt(input, "Enter message body", Some("hello from rust"))?;
            Operation::Send(body)
        }
        "receive" => Operation::Receive,
        "queues" => Operation::ListQueues,
        "buckets" => Operation::ListBuckets,
        "upload" => Operation::Upload,
        "domains" => Operation::ListDomains,
        "select" => Operation::Select {
            attribute: prompt(input, "Enter attribute name", Some("fat"))?,
            value: prompt(input, "Enter attribute value", Some("False"))?,
        },
        "put_attributes" => {
            let item_name = prompt(input, "Enter item name", Some("Fred"))?;
            let mut updates = Vec::new();
            loop {
                let name = prompt(
                    input,
                    "Enter attribute name (or press Enter to finish)",
                    Some("fat"),
                )?;
                if name.is_empty() {
                    break;
                }
                let value = prompt(input, "Enter value", Some("False"))?;
                let replace = prompt_bool(input, "Replace existing values?", true)?;
                updates.push(AttributeUpdate {
                    name,
                    value,
                    replace,
                });
            }
            Operation::PutAttributes { item_name, updates }
        }
        "sql" => {
            let sql = prompt_optional(
                input,
                "Enter SQL (or press Enter for the table listing)",
                None,
            )?;
            Operation::Sql(sql.unwrap_or_else(|| DEFAULT_QUERY.to_string()))
        }
        "instance" => Operation::DescribeInstance,
        _ => return Ok(None),
    };
    Ok(Some(operation))
}

fn read_conditions(input: &mut impl BufRead) -> Result<Vec<Condition>> {
    let mut conditions = Vec::new();
    loop {
        let attribute = prompt(
            input,
            "Enter condition attribute (or press Enter to finish)",
            Some("Activity"),
        )?;
        if attribute.is_empty() {
            break;
        }
        let comparison: Comparison = prompt(
            input,
            "Enter operator (=, <>, <, <=, >, >=, contains, begins_with)",
            Some("contains"),
        )?
        .parse()?;
        let value_type = prompt(input, VALUE_TYPE_PROMPT, Some("S"))?;
        let value = prompt(input, "Enter value", Some("Search"))?;
        conditions.push(Condition::new(
            attribute,
            comparison,
            parse_attribute_value(&value_type, value)?,
        )?);
    }
    Ok(conditions)
}

fn read_item(input: &mut impl BufRead) -> Result<Item> {
    let mut item = Item::new();
    loop {
        let name = prompt(
            input,
            "Enter attribute name (or press Enter to finish)",
            Some("Id"),
        )?;
        if name.is_empty() {
            break;
        }
        let value_type = prompt(input, VALUE_TYPE_PROMPT, Some("S"))?;
        let value = prompt(input, "Enter value", Some("1219"))?;
        item = item.set(name, parse_attribute_value(&value_type, value)?);
    }
    if item.is_empty() {
        return Err(anyhow!("an item needs at least its key attributes"));
    }
    Ok(item)
}

pub(crate) fn parse_attribute_value(value_type: &str, value: String) -> Result<AttributeValue> {
    match value_type.trim().to_ascii_uppercase().as_str() {
        "S" | "" => Ok(AttributeValue::S(value)),
        "N" => {
            value
                .trim()
                .parse::<f64>()
                .map_err(|_| anyhow!("'{value}' is not a number"))?;
            Ok(AttributeValue::N(value.trim().to_string()))
        }
        "BOOL" => Ok(AttributeValue::Bool(value.trim().parse()?)),
        _ => Err(anyhow!("Unsupported value type")),
    }
}

/// Prompts the user for input and returns the entered string.
///
/// # Arguments
///
/// * `message` - The message to display to the user
/// * `example` - An optional example value shown after the message
///
/// Fails with [`InputClosed`] once standard input is exhausted.
fn prompt(input: &mut impl BufRead, message: &str, example: Option<&str>) -> Result<String> {
    let full_message = if let Some(ex) = example {
        format!("{} (e.g., {}): ", message, ex)
    } else {
        format!("{}: ", message)
    };
    print!("{}", full_message);
    io::stdout().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(InputClosed.into());
    }
    Ok(line.trim().to_string())
}

fn prompt_optional(
    input: &mut impl BufRead,
    message: &str,
    example: Option<&str>,
) -> Result<Option<String>> {
    let answer = prompt(input, message, example)?;
    Ok(if answer.is_empty() { None } else { Some(answer) })
}

fn prompt_bool(input: &mut impl BufRead, message: &str, default: bool) -> Result<bool> {
    let answer = prompt(
        input,
        &format!("{} (y/n)", message),
        Some(if default { "y" } else { "n" }),
    )?;
    Ok(answer.to_lowercase().starts_with('y') || (answer.is_empty() && default))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_attribute_value() {
        assert_eq!(
            parse_attribute_value("S", "Search".into()).unwrap(),
            AttributeValue::S("Search".into())
        );
        assert_eq!(
            parse_attribute_value("n", " 200101 ".into()).unwrap(),
            AttributeValue::N("200101".into())
        );
        assert_eq!(
            parse_attribute_value("BOOL", "true".into()).unwrap(),
            AttributeValue::Bool(true)
        );
        assert!(parse_attribute_value("N", "two".into()).is_err());
        assert!(parse_attribute_value("SS", "a".into()).is_err());
    }

    #[test]
    fn test_commands_without_prompts() {
        let read = |command: &str| read_operation(&mut io::empty(), command).unwrap();
        assert_eq!(read("tables"), Some(Operation::ListTables));
        assert_eq!(read("receive"), Some(Operation::Receive));
        assert_eq!(read("upload"), Some(Operation::Upload));
        assert_eq!(read("bogus"), None);
    }

    #[test]
    fn test_prompt_reports_closed_input() {
        let mut input = io::Cursor::new("fat\n");
        assert_eq!(prompt(&mut input, "Enter attribute name", None).unwrap(), "fat");
        let err = prompt(&mut input, "Enter attribute name", None).unwrap_err();
        assert!(err.is::<InputClosed>());
    }

    #[test]
    fn test_attribute_loop_stops_at_end_of_input() {
        let mut input = io::Cursor::new("Fred\nfat\nTrue\ny\n");
        let err = read_operation(&mut input, "put_attributes").unwrap_err();
        assert!(err.is::<InputClosed>());

        let mut input = io::Cursor::new("Fred\nfat\nTrue\nn\n\n");
        assert_eq!(
            read_operation(&mut input, "put_attributes").unwrap(),
            Some(Operation::PutAttributes {
                item_name: "Fred".into(),
                updates: vec![AttributeUpdate {
                    name: "fat".into(),
                    value: "True".into(),
                    replace: false,
                }],
            })
        );
    }

    #[test]
    fn test_condition_and_item_loops_stop_at_end_of_input() {
        let err = read_operation(&mut io::Cursor::new("Activity\n"), "scan").unwrap_err();
        assert!(err.is::<InputClosed>());
        let err = read_operation(&mut io::Cursor::new("Id\nS\n1219\n"), "put").unwrap_err();
        assert!(err.is::<InputClosed>());

        let item = read_operation(&mut io::Cursor::new("Id\nS\n1219\n\n"), "put").unwrap();
        assert_eq!(
            item,
            Some(Operation::PutItem(Item::new().set_string("Id", "1219")))
        );
    }
}
