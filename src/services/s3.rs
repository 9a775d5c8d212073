use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::config::S3Config;
use crate::services::storage::{validate_name, StorageBackend, StorageError, StorageResult};
use crate::utils::mime::IMAGE_MIMES;

pub const PROVIDER_NAME: &str = "s3";

/// Stores media as public-read objects in an S3 (or S3-compatible) bucket.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket_name: String,
    region: String,
    endpoint: Option<Url>,
}

impl S3Storage {
    /// Builds a client from explicit keys when configured, otherwise from the
    /// default AWS credential chain.
    pub async fn new(config: &S3Config) -> StorageResult<Self> {
        let endpoint = config
            .s3_endpoint
            .as_deref()
            .map(Url::parse)
            .transpose()
            .map_err(|e| StorageError::Backend(format!("invalid S3 endpoint: {}", e)))?;

        let region = Region::new(config.aws_region.clone());

        let mut s3_config_builder = match (&config.aws_access_key_id, &config.aws_secret_access_key) {
            (Some(key_id), Some(secret)) => {
                let credentials = Credentials::new(key_id, secret, None, None, "manual_config");
                aws_sdk_s3::config::Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(region)
                    .credentials_provider(credentials)
            }
            _ => {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(region)
                    .load()
                    .await;
                aws_sdk_s3::config::Builder::from(&sdk_config)
            }
        };

        if let Some(endpoint) = &endpoint {
            s3_config_builder = s3_config_builder
                .endpoint_url(endpoint.as_str().trim_end_matches('/'))
                .force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(s3_config_builder.build()),
            bucket_name: config.bucket_name.clone(),
            region: config.aws_region.clone(),
            endpoint,
        })
    }

    pub async fn ensure_bucket_exists(&self) -> StorageResult<()> {
        if self.client.head_bucket().bucket(&self.bucket_name).send().await.is_ok() {
            return Ok(());
        }

        info!(bucket = %self.bucket_name, "bucket does not exist, attempting to create");
        self.client
            .create_bucket()
            .bucket(&self.bucket_name)
            .send()
            .await
            .map_err(|e| {
                error!(bucket = %self.bucket_name, error = ?e, "failed to create bucket");
                StorageError::Backend(format!("Failed to create S3 bucket: {}", e))
            })?;

        // Some S3-compatible providers reject bucket policies; objects are
        // still uploaded with a public-read ACL.
        if let Err(e) = self.set_public_policy().await {
            warn!(bucket = %self.bucket_name, error = %e, "could not set public bucket policy");
        }
        Ok(())
    }

    async fn set_public_policy(&self) -> StorageResult<()> {
        let policy = format!(
            r#"{{
                "Version": "2012-10-17",
                "Statement": [
                    {{
                        "Sid": "PublicReadGetObject",
                        "Effect": "Allow",
                        "Principal": "*",
                        "Action": "s3:GetObject",
                        "Resource": "arn:aws:s3:::{}/*"
                    }}
                ]
            }}"#,
            self.bucket_name
        );

        self.client
            .put_bucket_policy()
            .bucket(&self.bucket_name)
            .policy(policy)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("Failed to set bucket policy: {}", e)))?;

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => format!(
                "{}/{}/{}",
                endpoint.as_str().trim_end_matches('/'),
                self.bucket_name,
                key
            ),
            None => format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                self.bucket_name, self.region, key
            ),
        }
    }
}

#[async_trait]
impl StorageBackend for S3Storage {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn put(&self, name: &str, mime_type: &str, content: Bytes) -> StorageResult<String> {
        validate_name(name)?;
        debug!(key = name, mime_type, size = content.len(), "s3: put");

        self.client
            .put_object()
            .bucket(&self.bucket_name)
            .key(name)
            .body(ByteStream::from(content))
            .content_type(mime_type)
            .acl(aws_sdk_s3::types::ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                error!(key = name, error = ?e, "s3 upload error");
                StorageError::Backend(format!("Failed to upload file to S3: {}", e))
            })?;

        Ok(name.to_string())
    }

    fn get(&self, name: &str) -> String {
        self.public_url(name)
    }

    /// Objects are served by S3 itself, never proxied.
    async fn get_data(&self, _name: &str) -> Option<Bytes> {
        None
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        validate_name(name)?;
        debug!(key = name, "s3: delete");

        // DeleteObject succeeds for keys that do not exist.
        self.client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(name)
            .send()
            .await
            .map_err(|e| {
                error!(key = name, error = %e, "s3 delete error");
                StorageError::Backend("Failed to delete file from S3".to_string())
            })?;

        Ok(())
    }

    fn supported_mime_types(&self) -> Vec<String> {
        IMAGE_MIMES.iter().map(|m| m.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: Option<&str>) -> S3Config {
        S3Config {
            bucket_name: "media".to_string(),
            aws_region: "eu-west-1".to_string(),
            aws_access_key_id: Some("key".to_string()),
            aws_secret_access_key: Some("secret".to_string()),
            s3_endpoint: endpoint.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn aws_public_url() {
        let storage = S3Storage::new(&config(None)).await.unwrap();
        assert_eq!(
            storage.get("abc.png"),
            "https://media.s3.eu-west-1.amazonaws.com/abc.png"
        );
        assert!(storage.get_data("abc.png").await.is_none());
    }

    #[tokio::test]
    async fn custom_endpoint_public_url() {
        let storage = S3Storage::new(&config(Some("http://localhost:9000/"))).await.unwrap();
        assert_eq!(
            storage.get("thumb_abc.png"),
            "http://localhost:9000/media/thumb_abc.png"
        );
    }

    #[tokio::test]
    async fn rejects_invalid_endpoint() {
        let err = S3Storage::new(&config(Some("not a url"))).await.err().unwrap();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
