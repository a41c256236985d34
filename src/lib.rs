//! Single operations against managed AWS services.
//!
//! Each service sits behind a small trait with an AWS-backed implementation
//! and an in-memory one. The [`runner`] module turns an [`runner::Operation`]
//! into one remote call against the configured resource.

pub mod command_line;
pub mod config;
pub mod dynamodb;
pub mod error;
pub mod logging;
pub mod rds;
pub mod runner;
pub mod s3;
pub mod simpledb;
pub mod sns;
pub mod sqs;
