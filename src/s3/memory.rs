use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::error::RunnerError;
use crate::s3::{BucketListing, ObjectStore, PutAck, PutObjectRequest, StoredObject};

/// An in-memory [`ObjectStore`]. Buckets must be created up front.
#[derive(Debug)]
pub struct MemoryS3 {
    buckets: RwLock<BTreeMap<String, HashMap<String, StoredObject>>>,
    listing_status: u16,
}

impl MemoryS3 {
    pub fn new() -> Self {
        Self {
            buckets: RwLock::new(BTreeMap::new()),
            listing_status: 200,
        }
    }

    pub fn with_bucket(self, bucket: impl Into<String>) -> Self {
        self.buckets
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.into(), HashMap::new());
        self
    }

    /// Makes list-buckets answer with the given HTTP status.
    pub fn with_listing_status(mut self, status: u16) -> Self {
        self.listing_status = status;
        self
    }
}

impl Default for MemoryS3 {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryS3 {
    async fn list_buckets(&self) -> Result<BucketListing> {
        let buckets = if (200..300).contains(&self.listing_status) {
            self.buckets
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .keys()
                .cloned()
                .collect()
        } else {
            Vec::new()
        };
        Ok(BucketListing {
            status: self.listing_status,
            buckets,
        })
    }

    async fn put_object(&self, request: &PutObjectRequest) -> Result<PutAck> {
        let mut buckets = self.buckets.write().unwrap_or_else(PoisonError::into_inner);
        let objects = buckets.get_mut(request.bucket()).ok_or_else(|| {
            RunnerError::invalid(format!("bucket '{}' does not exist", request.bucket()))
        })?;
        objects.insert(
            request.key().to_string(),
            StoredObject {
                content_type: Some(request.content_type().to_string()),
                body: request.body().to_vec(),
            },
        );
        Ok(PutAck {
            e_tag: Some(format!("\"{}\"", Uuid::new_v4().simple())),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let buckets = self.buckets.read().unwrap_or_else(PoisonError::into_inner);
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .cloned()
            .ok_or_else(|| {
                RunnerError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_into_missing_bucket_fails() -> Result<()> {
        let s3 = MemoryS3::new();
        let request = PutObjectRequest::new("walrus150207", "a.txt", "text/plain", b"a".to_vec())?;
        assert!(s3.put_object(&request).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_status() -> Result<()> {
        let s3 = MemoryS3::new().with_bucket("walrus150207");
        let listing = s3.list_buckets().await?;
        assert!(listing.is_success());
        assert_eq!(listing.buckets, vec!["walrus150207".to_string()]);

        let s3 = MemoryS3::new().with_listing_status(503);
        let listing = s3.list_buckets().await?;
        assert!(!listing.is_success());
        assert!(listing.buckets.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_get_missing_object() {
        let s3 = MemoryS3::new().with_bucket("walrus150207");
        let err = s3.get_object("walrus150207", "nope").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RunnerError>(),
            Some(RunnerError::ObjectNotFound { .. })
        ));
    }
}
