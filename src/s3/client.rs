use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::info;

use crate::s3::{BucketListing, ObjectStore, PutAck, PutObjectRequest, StoredObject};

#[derive(Debug, Clone)]
pub struct S3 {
    client: Client,
}

impl S3 {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }
}

#[async_trait]
impl ObjectStore for S3 {
    async fn list_buckets(&self) -> Result<BucketListing> {
        match self.client.list_buckets().send().await {
            Ok(response) => Ok(BucketListing {
                status: 200,
                buckets: response
                    .buckets()
                    .iter()
                    .filter_map(|bucket| bucket.name().map(str::to_string))
                    .collect(),
            }),
            // the service answered, just not with success
            Err(SdkError::ServiceError(err)) => Ok(BucketListing {
                status: err.raw().status().as_u16(),
                buckets: Vec::new(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(&self, request: &PutObjectRequest) -> Result<PutAck> {
        let response = self
            .client
            .put_object()
            .bucket(request.bucket())
            .key(request.key())
            .content_type(request.content_type())
            .body(ByteStream::from(request.body().to_vec()))
            .send()
            .await?;

        info!(
            "Uploaded {} bytes to s3://{}/{}",
            request.body().len(),
            request.bucket(),
            request.key()
        );
        Ok(PutAck {
            e_tag: response.e_tag().map(str::to_string),
        })
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<StoredObject> {
        let response = self.client.get_object().bucket(bucket).key(key).send().await?;
        let content_type = response.content_type().map(str::to_string);
        let body = response.body.collect().await?.into_bytes().to_vec();
        Ok(StoredObject { content_type, body })
    }
}
