use bytes::Bytes;
use chrono::Utc;
use uuid::Uuid;

use super::{FileHost, missing_object_as_not_found};
use crate::error::{Error, Result};
use crate::naming::{bucket_name, slugify};
use crate::storage::ObjectStoreError;
use crate::types::{FileRecord, Repository};
use crate::validation::validate_filename;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// File contents plus what a caller needs to serve them as an attachment.
#[derive(Debug, Clone)]
pub struct Download {
    pub data: Bytes,
    /// Suggested attachment filename.
    pub filename: String,
    pub content_type: &'static str,
}

impl FileHost {
    /// Uploads `data` under the original `filename` and records it.
    pub async fn add_file(
        &self,
        api_key: &str,
        link: &str,
        data: Bytes,
        filename: &str,
    ) -> Result<FileRecord> {
        let repo = self.repository_by_link(link)?;

        if repo.owner_api_key != api_key {
            return Err(Error::Forbidden);
        }

        validate_filename(filename)?;
        let slug = slugify(filename);
        if slug.is_empty() {
            return Err(Error::bad_request(
                "Filename must contain at least one alphanumeric character",
            ));
        }

        // Checked before the upload so an existing object is never overwritten.
        if self
            .store
            .get_file_by_display_name(&repo.id, filename)?
            .is_some()
            || self.store.get_file_by_name(&repo.id, &slug)?.is_some()
        {
            return Err(Error::conflict("file is already uploaded"));
        }

        let size_bytes = data.len() as i64;
        self.objects
            .put_object(&repo.name, filename, data)
            .await
            .map_err(|e| match e {
                ObjectStoreError::InvalidKey(key) => {
                    Error::bad_request(format!("Invalid filename: {key}"))
                }
                e => Error::Storage(e),
            })?;

        let record = FileRecord {
            id: Uuid::new_v4().to_string(),
            repository_id: repo.id.clone(),
            display_name: filename.to_string(),
            download_url: self.download_url(&repo.link, &slug),
            name: slug,
            size_bytes,
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.create_file(&record) {
            tracing::warn!(bucket = %repo.name, file = filename, "failed to persist file record: {e}");
            if let Err(cleanup) = self.objects.delete_object(&repo.name, filename).await {
                tracing::error!(
                    bucket = %repo.name,
                    file = filename,
                    "failed to remove unrecorded object: {cleanup}"
                );
            }
            return Err(e);
        }

        tracing::info!(bucket = %repo.name, file = filename, size_bytes, "uploaded file");
        Ok(record)
    }

    /// Removes a file from the caller's repository named `repository_name`.
    ///
    /// The object is deleted before the record; if the object cannot be
    /// deleted the record stays in place.
    pub async fn remove_file(
        &self,
        api_key: &str,
        repository_name: &str,
        filename: &str,
    ) -> Result<()> {
        let user = self.require_user(api_key)?;

        let bucket = bucket_name(&user.name, repository_name)
            .map_err(|_| Error::not_found("repository does not exist"))?;
        let repo = self
            .store
            .get_repository_by_name(&bucket)?
            .ok_or_else(|| Error::not_found("repository does not exist"))?;

        // Bucket names of different owners can collide after slugging.
        if repo.owner_api_key != api_key {
            return Err(Error::Forbidden);
        }

        let file = self
            .store
            .get_file_by_display_name(&repo.id, filename)?
            .ok_or_else(|| Error::not_found("file does not exist"))?;

        match self.objects.delete_object(&repo.name, &file.display_name).await {
            Ok(()) => {}
            Err(ObjectStoreError::NoSuchKey(_) | ObjectStoreError::NoSuchBucket(_)) => {
                tracing::warn!(bucket = %repo.name, file = filename, "object already missing");
            }
            Err(e) => return Err(Error::Storage(e)),
        }

        self.store.delete_file(&file.id)?;

        tracing::info!(bucket = %repo.name, file = filename, "removed file");
        Ok(())
    }

    /// Fetches a file by its original filename or its slug.
    pub async fn download(&self, link: &str, filename: &str) -> Result<Download> {
        let repo = self.repository_by_link(link)?;

        let file = match self.store.get_file_by_display_name(&repo.id, filename)? {
            Some(file) => file,
            None => self
                .store
                .get_file_by_name(&repo.id, filename)?
                .ok_or_else(|| Error::not_found("file does not exist"))?,
        };

        let data = self
            .objects
            .get_object(&repo.name, &file.display_name)
            .await
            .map_err(missing_object_as_not_found)?;

        Ok(Download {
            data,
            filename: attachment_filename(&file),
            content_type: OCTET_STREAM,
        })
    }

    fn repository_by_link(&self, link: &str) -> Result<Repository> {
        self.store
            .get_repository_by_link(link)?
            .ok_or_else(|| Error::not_found("repository does not exist"))
    }

    fn download_url(&self, link: &str, slug: &str) -> Option<String> {
        self.public_base_url.as_ref().map(|base| {
            format!(
                "{base}/file/download?link={}&name={}",
                urlencoding::encode(link),
                urlencoding::encode(slug)
            )
        })
    }
}

/// The original filename reduced to header-safe characters, or the slug if
/// nothing survives.
fn attachment_filename(file: &FileRecord) -> String {
    let safe: String = file
        .display_name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .collect();

    if safe.is_empty() || safe.chars().all(|c| c == '.') {
        file.name.clone()
    } else {
        safe
    }
}
