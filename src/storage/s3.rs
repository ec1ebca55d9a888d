use bytes::Bytes;
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};

use super::{ObjectStore, ObjectStoreError, StorageResult};
use crate::config::S3Config;

/// S3-compatible backend (AWS S3, MinIO, Cloudflare R2, ...).
///
/// Requests are path-style so that generated bucket names work against
/// endpoints without wildcard DNS.
pub struct S3ObjectStore {
    region: Region,
    credentials: Credentials,
}

impl S3ObjectStore {
    pub fn new(config: &S3Config) -> anyhow::Result<Self> {
        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.endpoint.clone(),
        };

        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )?;

        Ok(Self {
            region,
            credentials,
        })
    }

    fn bucket(&self, name: &str) -> StorageResult<Box<Bucket>> {
        let bucket = Bucket::new(name, self.region.clone(), self.credentials.clone())
            .map_err(backend)?
            .with_path_style();
        Ok(bucket)
    }
}

fn backend(e: impl std::fmt::Display) -> ObjectStoreError {
    ObjectStoreError::Backend(e.to_string())
}

/// Translates a non-2xx S3 response into a storage error.
fn status_error(status: u16, body: &[u8], bucket: &str, key: Option<&str>) -> ObjectStoreError {
    let body = String::from_utf8_lossy(body);
    match status {
        404 if body.contains("NoSuchBucket") => ObjectStoreError::NoSuchBucket(bucket.to_string()),
        404 => match key {
            Some(key) => ObjectStoreError::NoSuchKey(key.to_string()),
            None => ObjectStoreError::NoSuchBucket(bucket.to_string()),
        },
        409 if body.contains("BucketNotEmpty") => {
            ObjectStoreError::BucketNotEmpty(bucket.to_string())
        }
        409 => ObjectStoreError::BucketAlreadyExists(bucket.to_string()),
        _ => ObjectStoreError::Backend(format!("unexpected status {status}: {body}")),
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let response = Bucket::create_with_path_style(
            bucket,
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await
        .map_err(backend)?;

        if response.success() {
            Ok(())
        } else {
            Err(status_error(
                response.response_code,
                response.response_text.as_bytes(),
                bucket,
                None,
            ))
        }
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let results = self
            .bucket(bucket)?
            .list(String::new(), None)
            .await
            .map_err(backend)?;

        Ok(results
            .into_iter()
            .flat_map(|page| page.contents)
            .map(|object| object.key)
            .collect())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let response = self
            .bucket(bucket)?
            .get_object(key)
            .await
            .map_err(backend)?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(status_error(status, response.as_slice(), bucket, Some(key)));
        }
        Ok(Bytes::copy_from_slice(response.as_slice()))
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()> {
        let response = self
            .bucket(bucket)?
            .put_object(key, &data)
            .await
            .map_err(backend)?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(status_error(status, response.as_slice(), bucket, Some(key)));
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let response = self
            .bucket(bucket)?
            .delete_object(key)
            .await
            .map_err(backend)?;

        let status = response.status_code();
        if !is_success(status) {
            return Err(status_error(status, response.as_slice(), bucket, Some(key)));
        }
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        let status = self.bucket(bucket)?.delete().await.map_err(backend)?;

        match status {
            s if is_success(s) => Ok(()),
            409 => Err(ObjectStoreError::BucketNotEmpty(bucket.to_string())),
            s => Err(status_error(s, &[], bucket, None)),
        }
    }
}
