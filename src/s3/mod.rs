//! Object storage through S3.
//!
//! Uploads are a single put-object of the whole body: no multipart, no
//! chunking, no retry on partial failure.

mod client;
mod memory;

use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::UploadSource;
use crate::error::RunnerError;

pub use client::S3;
pub use memory::MemoryS3;

/// Result of list-buckets. A non-success `status` is reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketListing {
    pub status: u16,
    pub buckets: Vec<String>,
}

impl BucketListing {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutAck {
    pub e_tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// A validated put-object request carrying the full body.
#[derive(Clone, PartialEq, Eq)]
pub struct PutObjectRequest {
    bucket: String,
    key: String,
    content_type: String,
    body: Vec<u8>,
}

impl std::fmt::Debug for PutObjectRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PutObjectRequest")
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .finish()
    }
}

impl PutObjectRequest {
    pub fn new(
        bucket: impl Into<String>,
        key: impl Into<String>,
        content_type: impl Into<String>,
        body: Vec<u8>,
    ) -> Result<Self, RunnerError> {
        let bucket = bucket.into();
        let key = key.into();
        let content_type = content_type.into();

        validate_bucket_name(&bucket)?;
        if key.is_empty() || key.len() > 1024 {
            return Err(RunnerError::invalid("object key must be 1 to 1024 bytes"));
        }
        match content_type.split_once('/') {
            Some((kind, subtype)) if !kind.trim().is_empty() && !subtype.trim().is_empty() => {}
            _ => {
                return Err(RunnerError::invalid(format!(
                    "'{content_type}' is not a content type"
                )))
            }
        }

        Ok(Self {
            bucket,
            key,
            content_type,
            body,
        })
    }

    /// Reads the local file named by `upload` and builds the request. The
    /// content type falls back to a guess from the object key's extension.
    pub async fn from_upload(bucket: &str, upload: &UploadSource) -> Result<Self> {
        let body = tokio::fs::read(&upload.path)
            .await
            .with_context(|| format!("reading {}", upload.path.display()))?;
        let content_type = upload
            .content_type
            .clone()
            .unwrap_or_else(|| guess_content_type(&upload.key));
        Ok(Self::new(bucket, upload.key.clone(), content_type, body)?)
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

pub fn guess_content_type(key: &str) -> String {
    mime_guess::from_path(Path::new(key))
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

fn validate_bucket_name(bucket: &str) -> Result<(), RunnerError> {
    let valid_chars = bucket
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = bucket
        .chars()
        .next()
        .zip(bucket.chars().last())
        .map_or(false, |(first, last)| {
            first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric()
        });
    if (3..=63).contains(&bucket.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(RunnerError::invalid(format!(
            "'{bucket}' is not a valid bucket name"
        )))
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn list_buckets(&self) -> Result<BucketListing>;

    /// Stores the object, overwriting any object already at the key.
    async fn put_object(&self, request: &PutObjectRequest) -> Result<PutAck>;

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_put_request_validation() {
        assert!(PutObjectRequest::new("walrus150207", "seahawks.jpg", "image/jpeg", vec![1]).is_ok());
        assert!(PutObjectRequest::new("Walrus", "a", "image/jpeg", vec![]).is_err());
        assert!(PutObjectRequest::new("ab", "a", "image/jpeg", vec![]).is_err());
        assert!(PutObjectRequest::new("-walrus", "a", "image/jpeg", vec![]).is_err());
        assert!(PutObjectRequest::new("walrus", "", "image/jpeg", vec![]).is_err());
        assert!(PutObjectRequest::new("walrus", "a", "jpeg", vec![]).is_err());
        assert!(PutObjectRequest::new("walrus", "a", "image/", vec![]).is_err());
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type("seahawks.jpg"), "image/jpeg");
        assert_eq!(guess_content_type("notes.txt"), "text/plain");
        assert_eq!(guess_content_type("blob"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_from_upload_reads_file() -> Result<()> {
        let path = std::env::temp_dir().join(format!("runner-upload-{}.png", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"\x89PNG fake").await?;

        let upload = UploadSource {
            path: path.clone(),
            key: "logo.png".into(),
            content_type: None,
        };
        let request = PutObjectRequest::from_upload("walrus150207", &upload).await;
        tokio::fs::remove_file(&path).await?;

        let request = request?;
        assert_eq!(request.content_type(), "image/png");
        assert_eq!(request.body(), b"\x89PNG fake");
        Ok(())
    }

    #[tokio::test]
    async fn test_from_upload_missing_file() {
        let upload = UploadSource {
            path: PathBuf::from("/definitely/not/here.jpg"),
            key: "here.jpg".into(),
            content_type: Some("image/jpeg".into()),
        };
        assert!(PutObjectRequest::from_upload("walrus150207", &upload)
            .await
            .is_err());
    }
}
