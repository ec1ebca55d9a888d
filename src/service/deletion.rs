//! Repository deletion and orphaned bucket reconciliation.
//!
//! Deleting a repository runs in two phases:
//!
//! 1. Metadata: all file records and the repository record are removed in a
//!    single transaction.
//! 2. Storage: every object in the bucket is deleted, then the bucket.
//!
//! Metadata goes first so that a storage failure never leaves records that
//! point at missing data. A bucket that cannot be removed is queued in the
//! `orphaned_buckets` table and retried by [`FileHost::reconcile`].

use serde::Serialize;

use super::FileHost;
use crate::error::{Error, Result};
use crate::storage::{ObjectStoreError, StorageResult};
use crate::types::{OrphanedBucket, Repository};

#[derive(Debug, Clone, Serialize)]
pub struct DeletionReport {
    pub files_removed: usize,
    pub objects_removed: usize,
    pub bucket_removed: bool,
    /// The bucket is queued for out-of-band cleanup.
    pub cleanup_pending: bool,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub cleaned: Vec<String>,
    pub pending: Vec<String>,
    /// Queued names that a live repository owns again.
    pub skipped: Vec<String>,
}

enum Reconciled {
    Cleaned,
    Pending,
    InUse,
}

struct BucketPurge {
    objects_removed: usize,
    result: StorageResult<()>,
}

impl FileHost {
    pub(super) async fn delete_repository_records_and_bucket(
        &self,
        repo: &Repository,
    ) -> Result<DeletionReport> {
        let files_removed = self.store.delete_repository_cascade(&repo.id)?;
        tracing::info!(
            bucket = %repo.name,
            files_removed,
            "deleted repository metadata"
        );

        let purge = self.purge_bucket(&repo.name).await;

        let mut report = DeletionReport {
            files_removed,
            objects_removed: purge.objects_removed,
            bucket_removed: purge.result.is_ok(),
            cleanup_pending: false,
        };

        if let Err(e) = purge.result {
            let reason = format!("bucket deletion failed: {e}");
            tracing::error!(bucket = %repo.name, "{reason}; queueing for reconciliation");

            self.store
                .queue_orphaned_bucket(&repo.name, &reason)
                .map_err(|queue_err| {
                    Error::Inconsistent(format!(
                        "repository {} deleted but bucket {} remains ({reason}) and could not be queued: {queue_err}",
                        repo.link, repo.name
                    ))
                })?;
            report.cleanup_pending = true;
        }

        Ok(report)
    }

    /// Empties and removes a bucket. A bucket that is already gone counts
    /// as removed.
    async fn purge_bucket(&self, bucket: &str) -> BucketPurge {
        let mut objects_removed = 0;

        match self.objects.list_objects(bucket).await {
            Ok(keys) => {
                for key in keys {
                    match self.objects.delete_object(bucket, &key).await {
                        Ok(()) => objects_removed += 1,
                        Err(e) => {
                            tracing::warn!(bucket, key = %key, "failed to delete object: {e}");
                        }
                    }
                }
            }
            Err(e) => {
                tracing::warn!(
                    bucket,
                    "failed to list objects, falling back to bucket deletion: {e}"
                );
            }
        }

        let result = match self.objects.delete_bucket(bucket).await {
            Ok(()) => Ok(()),
            Err(ObjectStoreError::NoSuchBucket(_)) => {
                tracing::warn!(bucket, "bucket already gone");
                Ok(())
            }
            Err(e) => Err(e),
        };

        BucketPurge {
            objects_removed,
            result,
        }
    }

    /// Removes a bucket that has no repository record, queueing it for
    /// reconciliation if that fails.
    pub(super) async fn discard_bucket(&self, bucket: &str, reason: &str) {
        let purge = self.purge_bucket(bucket).await;
        let Err(e) = purge.result else {
            return;
        };

        let reason = format!("{reason}; bucket deletion failed: {e}");
        tracing::error!(bucket, "{reason}; queueing for reconciliation");
        if let Err(queue_err) = self.store.queue_orphaned_bucket(bucket, &reason) {
            tracing::error!(bucket, "failed to queue orphaned bucket: {queue_err}");
        }
    }

    /// Retries the storage phase for every queued orphaned bucket.
    ///
    /// A bucket whose name now belongs to a live repository is dropped from
    /// the queue untouched. Queue bookkeeping failures leave that entry
    /// pending and the sweep moves on.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::default();

        for orphan in self.store.list_orphaned_buckets()? {
            match self.reconcile_bucket(&orphan).await {
                Ok(Reconciled::Cleaned) => report.cleaned.push(orphan.bucket),
                Ok(Reconciled::InUse) => report.skipped.push(orphan.bucket),
                Ok(Reconciled::Pending) => report.pending.push(orphan.bucket),
                Err(e) => {
                    tracing::error!(
                        bucket = %orphan.bucket,
                        "failed to update reconciliation queue: {e}"
                    );
                    report.pending.push(orphan.bucket);
                }
            }
        }

        Ok(report)
    }

    async fn reconcile_bucket(&self, orphan: &OrphanedBucket) -> Result<Reconciled> {
        if self.store.get_repository_by_name(&orphan.bucket)?.is_some() {
            tracing::warn!(
                bucket = %orphan.bucket,
                "bucket belongs to a live repository; dropping it from the queue"
            );
            self.store.delete_orphaned_bucket(&orphan.bucket)?;
            return Ok(Reconciled::InUse);
        }

        let purge = self.purge_bucket(&orphan.bucket).await;
        match purge.result {
            Ok(()) => {
                self.store.delete_orphaned_bucket(&orphan.bucket)?;
                tracing::info!(
                    bucket = %orphan.bucket,
                    objects_removed = purge.objects_removed,
                    "reconciled orphaned bucket"
                );
                Ok(Reconciled::Cleaned)
            }
            Err(e) => {
                let reason = format!("bucket deletion failed: {e}");
                tracing::warn!(
                    bucket = %orphan.bucket,
                    attempts = orphan.attempts + 1,
                    "{reason}"
                );
                self.store.record_orphan_attempt(&orphan.bucket, &reason)?;
                Ok(Reconciled::Pending)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use crate::error::Error;
    use crate::service::testing::{FlakyObjectStore, Harness};
    use crate::store::Store;

    #[tokio::test]
    async fn test_delete_removes_files_objects_and_bucket() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();

        for name in ["a.txt", "b.txt"] {
            h.host
                .add_file(&key, &repo.link, Bytes::from_static(b"hi"), name)
                .await
                .unwrap();
        }

        let report = h.host.delete_repository(&key, &repo.link).await.unwrap();

        assert_eq!(report.files_removed, 2);
        assert_eq!(report.objects_removed, 2);
        assert!(report.bucket_removed);
        assert!(!report.cleanup_pending);
        assert!(!h.bucket_exists(&repo.name));
        assert!(h.store.list_files(&repo.id).unwrap().is_empty());
        assert!(matches!(
            h.host.get_repository(&repo.link),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_listing_failure_falls_back_to_bucket_deletion() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();
        FlakyObjectStore::fail(&h.objects.fail_list, true);

        let report = h.host.delete_repository(&key, &repo.link).await.unwrap();

        assert!(report.bucket_removed);
        assert!(!h.bucket_exists(&repo.name));
    }

    #[tokio::test]
    async fn test_bucket_failure_is_queued_not_silent() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();
        h.host
            .add_file(&key, &repo.link, Bytes::from_static(b"hi"), "a.txt")
            .await
            .unwrap();
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);

        let report = h.host.delete_repository(&key, &repo.link).await.unwrap();

        assert!(!report.bucket_removed);
        assert!(report.cleanup_pending);
        assert!(matches!(
            h.host.get_repository(&repo.link),
            Err(Error::NotFound(_))
        ));

        let orphans = h.store.list_orphaned_buckets().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].bucket, repo.name);
    }

    #[tokio::test]
    async fn test_unqueueable_failure_is_inconsistent() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);
        h.store
            .connection()
            .execute_batch("DROP TABLE orphaned_buckets")
            .unwrap();

        let result = h.host.delete_repository(&key, &repo.link).await;
        assert!(matches!(result, Err(Error::Inconsistent(_))));
    }

    #[tokio::test]
    async fn test_reconcile_retries_orphans() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();
        h.host
            .add_file(&key, &repo.link, Bytes::from_static(b"hi"), "a.txt")
            .await
            .unwrap();

        FlakyObjectStore::fail(&h.objects.fail_delete_object, true);
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);
        let report = h.host.delete_repository(&key, &repo.link).await.unwrap();
        assert!(report.cleanup_pending);
        assert_eq!(report.objects_removed, 0);

        let first = h.host.reconcile().await.unwrap();
        assert_eq!(first.pending, vec![repo.name.clone()]);
        assert_eq!(h.store.list_orphaned_buckets().unwrap()[0].attempts, 1);

        FlakyObjectStore::fail(&h.objects.fail_delete_object, false);
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, false);

        let second = h.host.reconcile().await.unwrap();
        assert_eq!(second.cleaned, vec![repo.name.clone()]);
        assert!(h.store.list_orphaned_buckets().unwrap().is_empty());
        assert!(!h.bucket_exists(&repo.name));
    }

    #[tokio::test]
    async fn test_reconcile_treats_missing_bucket_as_cleaned() {
        let h = Harness::new();
        h.store
            .queue_orphaned_bucket("filehosting-litix-gone-bucket", "test")
            .unwrap();

        let report = h.host.reconcile().await.unwrap();
        assert_eq!(report.cleaned.len(), 1);
        assert!(h.store.list_orphaned_buckets().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_spares_recreated_repository() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();

        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);
        let report = h.host.delete_repository(&key, &repo.link).await.unwrap();
        assert!(report.cleanup_pending);
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, false);

        // Removed by hand before the sweep ran.
        std::fs::remove_dir_all(h.temp.path().join("buckets").join(&repo.name)).unwrap();
        // The queue entry is cleared once the name is live again, so put it
        // back to exercise the sweep-side check as well.
        let again = h.host.create_repository(&key, "docs").await.unwrap();
        assert_eq!(again.name, repo.name);
        assert!(h.store.list_orphaned_buckets().unwrap().is_empty());
        h.store.queue_orphaned_bucket(&again.name, "stale").unwrap();

        h.host
            .add_file(&key, &again.link, Bytes::from_static(b"precious"), "a.txt")
            .await
            .unwrap();

        let sweep = h.host.reconcile().await.unwrap();
        assert_eq!(sweep.skipped, vec![again.name.clone()]);
        assert!(sweep.cleaned.is_empty());
        assert!(h.store.list_orphaned_buckets().unwrap().is_empty());

        let download = h.host.download(&again.link, "a.txt").await.unwrap();
        assert_eq!(download.data.as_ref(), b"precious");
    }

    #[tokio::test]
    async fn test_reconcile_continues_after_dequeue_failure() {
        let h = Harness::new();
        h.store
            .queue_orphaned_bucket("filehosting-litix-stuck", "test")
            .unwrap();
        h.store
            .queue_orphaned_bucket("filehosting-litix-fine", "test")
            .unwrap();
        h.store
            .connection()
            .execute_batch(
                "CREATE TRIGGER keep_stuck BEFORE DELETE ON orphaned_buckets
                 WHEN OLD.bucket = 'filehosting-litix-stuck'
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .unwrap();

        let report = h.host.reconcile().await.unwrap();

        assert_eq!(report.pending, vec!["filehosting-litix-stuck".to_string()]);
        assert_eq!(report.cleaned, vec!["filehosting-litix-fine".to_string()]);
        let remaining = h.store.list_orphaned_buckets().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].bucket, "filehosting-litix-stuck");
    }

    #[tokio::test]
    async fn test_reconcile_continues_after_attempt_bookkeeping_failure() {
        let h = Harness::new();
        for bucket in ["filehosting-litix-stuck", "filehosting-litix-other"] {
            h.host.objects().create_bucket(bucket).await.unwrap();
            h.store.queue_orphaned_bucket(bucket, "test").unwrap();
        }
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);
        h.store
            .connection()
            .execute_batch(
                "CREATE TRIGGER freeze_stuck BEFORE UPDATE ON orphaned_buckets
                 WHEN OLD.bucket = 'filehosting-litix-stuck'
                 BEGIN SELECT RAISE(ABORT, 'locked'); END;",
            )
            .unwrap();

        let report = h.host.reconcile().await.unwrap();

        assert_eq!(report.pending.len(), 2);
        let attempts: Vec<_> = h
            .store
            .list_orphaned_buckets()
            .unwrap()
            .into_iter()
            .map(|o| (o.bucket, o.attempts))
            .collect();
        assert!(attempts.contains(&("filehosting-litix-stuck".to_string(), 0)));
        assert!(attempts.contains(&("filehosting-litix-other".to_string(), 1)));
    }
}
