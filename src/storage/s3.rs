// schema-vault/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use s3::config::Region;
use s3::primitives::ByteStream;
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use super::{BackupKey, ObjectStore};
use crate::config::S3Config;
use crate::errors::{AppError, Result};

/// S3-compatible object storage (AWS S3, DigitalOcean Spaces, MinIO).
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: s3::Client,
    bucket: String,
}

impl S3ObjectStore {
    pub async fn connect(config: &S3Config) -> Self {
        let mut loader = aws_config::defaults(s3::config::BehaviorVersion::latest());
        if let Some(endpoint) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint);
        }
        if let Some(region) = &config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let (Some(key_id), Some(secret)) = (&config.access_key_id, &config.secret_access_key) {
            loader = loader.credentials_provider(s3::config::Credentials::new(
                key_id,
                secret,
                None, // session_token
                None, // expiry
                "Static",
            ));
        }
        let sdk_config = loader.load().await;

        let s3_config = s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Self {
            client: s3::Client::from_conf(s3_config),
            bucket: config.bucket_name.clone(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, file_path: &Path, key: &BackupKey) -> Result<()> {
        log::info!(
            "Uploading {} to s3://{}/{}",
            file_path.display(),
            self.bucket,
            key
        );

        let body = ByteStream::from_path(file_path)
            .await
            .map_err(|e| AppError::storage(key.as_str(), format!("reading {}: {}", file_path.display(), e)))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::storage(key.as_str(), s3::error::DisplayErrorContext(e)))?;

        Ok(())
    }

    async fn download(&self, key: &BackupKey, destination: &Path) -> Result<u64> {
        log::info!(
            "Downloading s3://{}/{} to {}",
            self.bucket,
            key,
            destination.display()
        );

        let mut object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
            .map_err(|e| AppError::storage(key.as_str(), s3::error::DisplayErrorContext(e)))?;

        let mut output_file = File::create(destination).await?;
        let mut total_bytes_downloaded: u64 = 0;
        while let Some(bytes_chunk) = object
            .body
            .try_next()
            .await
            .map_err(|e| AppError::storage(key.as_str(), e))?
        {
            output_file.write_all(&bytes_chunk).await?;
            total_bytes_downloaded += bytes_chunk.len() as u64;
        }
        output_file.flush().await?;

        Ok(total_bytes_downloaded)
    }

    async fn exists(&self, key: &BackupKey) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key.as_str())
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) => {
                if err.as_service_error().is_some_and(|e| e.is_not_found()) {
                    Ok(false)
                } else {
                    Err(AppError::storage(key.as_str(), s3::error::DisplayErrorContext(err)))
                }
            }
        }
    }
}
