use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use super::{ObjectStore, ObjectStoreError, StorageResult};

/// Buckets as directories under `<root>/buckets`, objects as files.
///
/// Object keys are percent-encoded into a single path component, so keys
/// containing `/` never escape their bucket directory.
pub struct FsObjectStore {
    buckets_path: PathBuf,
    tmp_path: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: &Path) -> Self {
        Self {
            buckets_path: root.join("buckets"),
            tmp_path: root.join("tmp"),
        }
    }

    fn bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        if bucket.is_empty() || bucket.contains(['/', '\\']) || bucket.starts_with('.') {
            return Err(ObjectStoreError::Backend(format!(
                "invalid bucket name: {bucket}"
            )));
        }
        Ok(self.buckets_path.join(bucket))
    }

    async fn existing_bucket_path(&self, bucket: &str) -> StorageResult<PathBuf> {
        let path = self.bucket_path(bucket)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(path),
            Ok(_) => Err(ObjectStoreError::NoSuchBucket(bucket.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NoSuchBucket(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn object_path(&self, bucket: &str, key: &str) -> StorageResult<PathBuf> {
        let file_name = encode_key(key)?;
        Ok(self.existing_bucket_path(bucket).await?.join(file_name))
    }
}

fn encode_key(key: &str) -> StorageResult<String> {
    let encoded = urlencoding::encode(key).into_owned();
    if encoded.is_empty() || encoded == "." || encoded == ".." {
        return Err(ObjectStoreError::InvalidKey(key.to_string()));
    }
    Ok(encoded)
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let path = self.bucket_path(bucket)?;
        fs::create_dir_all(&self.buckets_path).await?;

        match fs::create_dir(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                Err(ObjectStoreError::BucketAlreadyExists(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_objects(&self, bucket: &str) -> StorageResult<Vec<String>> {
        let path = self.existing_bucket_path(bucket).await?;
        let mut entries = fs::read_dir(&path).await?;
        let mut keys = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                tracing::warn!("Skipping non UTF-8 entry in bucket {bucket}");
                continue;
            };
            match urlencoding::decode(name) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => tracing::warn!("Skipping undecodable entry {name} in bucket {bucket}: {e}"),
            }
        }

        keys.sort();
        Ok(keys)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> StorageResult<Bytes> {
        let path = self.object_path(bucket, key).await?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NoSuchKey(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn put_object(&self, bucket: &str, key: &str, data: Bytes) -> StorageResult<()> {
        let final_path = self.object_path(bucket, key).await?;

        fs::create_dir_all(&self.tmp_path).await?;
        let temp_path = self.tmp_path.join(Uuid::new_v4().to_string());

        let mut temp_file = File::create(&temp_path).await?;
        temp_file.write_all(&data).await?;
        temp_file.sync_all().await?;

        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let path = self.object_path(bucket, key).await?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(ObjectStoreError::NoSuchKey(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> StorageResult<()> {
        let path = self.existing_bucket_path(bucket).await?;
        match fs::remove_dir(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::DirectoryNotEmpty => {
                Err(ObjectStoreError::BucketNotEmpty(bucket.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_and_get() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsObjectStore::new(temp_dir.path());

        storage.create_bucket("bucket").await.unwrap();
        storage
            .put_object("bucket", "a.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        let data = storage.get_object("bucket", "a.txt").await.unwrap();
        assert_eq!(&data[..], b"hi");
    }

    #[tokio::test]
    async fn test_create_bucket_twice() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsObjectStore::new(temp_dir.path());

        storage.create_bucket("bucket").await.unwrap();
        assert!(matches!(
            storage.create_bucket("bucket").await,
            Err(ObjectStoreError::BucketAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_keys_with_separators_stay_in_bucket() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsObjectStore::new(temp_dir.path());

        storage.create_bucket("bucket").await.unwrap();
        storage
            .put_object("bucket", "../escape/x.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();

        let keys = storage.list_objects("bucket").await.unwrap();
        assert_eq!(keys, vec!["../escape/x.txt".to_string()]);
        assert!(!temp_dir.path().join("escape").exists());

        assert!(matches!(
            storage.put_object("bucket", "..", Bytes::new()).await,
            Err(ObjectStoreError::InvalidKey(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_bucket_and_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsObjectStore::new(temp_dir.path());

        assert!(matches!(
            storage.list_objects("nope").await,
            Err(ObjectStoreError::NoSuchBucket(_))
        ));

        storage.create_bucket("bucket").await.unwrap();
        assert!(matches!(
            storage.get_object("bucket", "missing").await,
            Err(ObjectStoreError::NoSuchKey(_))
        ));
        assert!(matches!(
            storage.delete_object("bucket", "missing").await,
            Err(ObjectStoreError::NoSuchKey(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_bucket_requires_empty() {
        let temp_dir = TempDir::new().unwrap();
        let storage = FsObjectStore::new(temp_dir.path());

        storage.create_bucket("bucket").await.unwrap();
        storage
            .put_object("bucket", "a.txt", Bytes::from_static(b"hi"))
            .await
            .unwrap();

        assert!(matches!(
            storage.delete_bucket("bucket").await,
            Err(ObjectStoreError::BucketNotEmpty(_))
        ));

        storage.delete_object("bucket", "a.txt").await.unwrap();
        storage.delete_bucket("bucket").await.unwrap();
        assert!(matches!(
            storage.delete_bucket("bucket").await,
            Err(ObjectStoreError::NoSuchBucket(_))
        ));
    }
}
