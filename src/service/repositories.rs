use chrono::Utc;
use uuid::Uuid;

use super::{DeletionReport, FileHost};
use crate::error::{Error, Result};
use crate::naming::{LINK_TOKEN_LENGTH, bucket_name, new_token};
use crate::storage::ObjectStoreError;
use crate::types::{Repository, RepositoryDetail, RepositorySummary};
use crate::validation::validate_repository_name;

impl FileHost {
    /// Creates a repository and its backing bucket.
    ///
    /// Conflicts are checked before the bucket is created. If the record
    /// cannot be persisted afterwards, the bucket is discarded again.
    pub async fn create_repository(&self, api_key: &str, display_name: &str) -> Result<Repository> {
        let user = self.require_user(api_key)?;

        validate_repository_name(display_name)?;
        let bucket = bucket_name(&user.name, display_name)?;

        if self
            .store
            .get_owner_repository(api_key, display_name)?
            .is_some()
        {
            return Err(Error::conflict("Repository already exists"));
        }

        if self.store.get_repository_by_name(&bucket)?.is_some() {
            return Err(Error::conflict(format!(
                "Storage name {bucket} is already taken"
            )));
        }

        self.objects
            .create_bucket(&bucket)
            .await
            .map_err(|e| match e {
                ObjectStoreError::BucketAlreadyExists(_) => {
                    Error::conflict(format!("Storage name {bucket} is already taken"))
                }
                e => Error::Storage(e),
            })?;

        let repo = Repository {
            id: Uuid::new_v4().to_string(),
            name: bucket,
            display_name: display_name.to_string(),
            link: new_token(LINK_TOKEN_LENGTH),
            owner_api_key: api_key.to_string(),
            created_at: Utc::now(),
        };

        if let Err(e) = self.store.create_repository(&repo) {
            tracing::warn!(bucket = %repo.name, "failed to persist repository, discarding bucket: {e}");
            self.discard_bucket(&repo.name, "repository record could not be persisted")
                .await;
            return Err(e);
        }

        // A queued entry under this name now refers to the live bucket.
        match self.store.delete_orphaned_bucket(&repo.name) {
            Ok(true) => {
                tracing::info!(bucket = %repo.name, "removed stale reconciliation entry");
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(bucket = %repo.name, "failed to clear reconciliation entry: {e}");
            }
        }

        tracing::info!(bucket = %repo.name, user = %user.name, "created repository");
        Ok(repo)
    }

    /// Lists the caller's repositories in insertion order.
    pub fn list_repositories(
        &self,
        api_key: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<RepositorySummary>> {
        self.require_user(api_key)?;

        if limit < 0 {
            return Err(Error::bad_request("limit less than 0"));
        }
        if skip < 0 {
            return Err(Error::bad_request("skip less than 0"));
        }

        let repos = self.store.list_repositories(api_key, skip, limit)?;
        Ok(repos.into_iter().map(RepositorySummary::from).collect())
    }

    pub fn get_repository(&self, link: &str) -> Result<RepositoryDetail> {
        let repo = self
            .store
            .get_repository_by_link(link)?
            .ok_or_else(|| Error::not_found("repository does not exist"))?;

        let files = self.store.list_files(&repo.id)?;

        Ok(RepositoryDetail {
            display_name: repo.display_name,
            link: repo.link,
            files,
        })
    }

    pub async fn delete_repository(&self, api_key: &str, link: &str) -> Result<DeletionReport> {
        let repo = self
            .store
            .get_repository_by_link(link)?
            .ok_or_else(|| Error::not_found("repository does not exist"))?;

        if repo.owner_api_key != api_key {
            return Err(Error::Forbidden);
        }

        self.delete_repository_records_and_bucket(&repo).await
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::service::testing::{FlakyObjectStore, Harness};
    use crate::store::Store;

    #[tokio::test]
    async fn test_create_repository() {
        let h = Harness::new();
        let key = h.user("alice");

        let repo = h.host.create_repository(&key, "My Docs").await.unwrap();

        assert_eq!(repo.name, "filehosting-litix-alice-my-docs");
        assert_eq!(repo.display_name, "My Docs");
        assert_eq!(repo.link.len(), 30);
        assert!(h.bucket_exists(&repo.name));
    }

    #[tokio::test]
    async fn test_create_with_unknown_key_is_forbidden() {
        let h = Harness::new();
        h.user("alice");

        let result = h.host.create_repository("bogus", "docs").await;
        assert!(matches!(result, Err(Error::Forbidden)));
        assert!(!h.temp.path().join("buckets").exists());
        assert!(h.store.list_repositories("bogus", 0, 100).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_display_name_conflicts() {
        let h = Harness::new();
        let key = h.user("alice");

        h.host.create_repository(&key, "docs").await.unwrap();
        let result = h.host.create_repository(&key, "docs").await;

        assert!(matches!(result, Err(Error::Conflict(_))));
        assert_eq!(h.host.list_repositories(&key, 0, 100).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_same_display_name_for_different_users() {
        let h = Harness::new();
        let alice = h.user("alice");
        let bob = h.user("bob");

        let a = h.host.create_repository(&alice, "docs").await.unwrap();
        let b = h.host.create_repository(&bob, "docs").await.unwrap();
        assert_ne!(a.name, b.name);
    }

    #[tokio::test]
    async fn test_bucket_name_collision_across_users_conflicts() {
        let h = Harness::new();
        let first = h.user("a-b");
        let second = h.user("a");

        h.host.create_repository(&first, "c").await.unwrap();
        let result = h.host.create_repository(&second, "b c").await;
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_preexisting_bucket_conflicts() {
        let h = Harness::new();
        let key = h.user("alice");

        h.host
            .objects()
            .create_bucket("filehosting-litix-alice-docs")
            .await
            .unwrap();

        let result = h.host.create_repository(&key, "docs").await;
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(h.store.list_repositories(&key, 0, 100).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_persist_discards_bucket() {
        let h = Harness::new();
        let key = h.user("alice");

        h.store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_repos BEFORE INSERT ON repositories
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let result = h.host.create_repository(&key, "docs").await;
        assert!(result.is_err());
        assert!(!h.bucket_exists("filehosting-litix-alice-docs"));
    }

    #[tokio::test]
    async fn test_failed_persist_queues_bucket_when_discard_fails() {
        let h = Harness::new();
        let key = h.user("alice");
        FlakyObjectStore::fail(&h.objects.fail_delete_bucket, true);

        h.store
            .connection()
            .execute_batch(
                "CREATE TRIGGER reject_repos BEFORE INSERT ON repositories
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        assert!(h.host.create_repository(&key, "docs").await.is_err());

        let orphans = h.store.list_orphaned_buckets().unwrap();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].bucket, "filehosting-litix-alice-docs");
    }

    #[tokio::test]
    async fn test_list_repositories() {
        let h = Harness::new();
        let alice = h.user("alice");
        let bob = h.user("bob");

        for name in ["one", "two", "three"] {
            h.host.create_repository(&alice, name).await.unwrap();
        }
        h.host.create_repository(&bob, "other").await.unwrap();

        let all = h.host.list_repositories(&alice, 0, 100).unwrap();
        let names: Vec<_> = all.iter().map(|r| r.display_name.as_str()).collect();
        assert_eq!(names, ["one", "two", "three"]);

        let page = h.host.list_repositories(&alice, 1, 1).unwrap();
        assert_eq!(page[0].display_name, "two");
    }

    #[tokio::test]
    async fn test_list_repositories_errors() {
        let h = Harness::new();
        let key = h.user("alice");

        assert!(matches!(
            h.host.list_repositories(&key, 0, -1),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            h.host.list_repositories(&key, -1, 10),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            h.host.list_repositories("bogus", 0, 10),
            Err(Error::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_get_repository() {
        let h = Harness::new();
        let key = h.user("alice");
        let repo = h.host.create_repository(&key, "docs").await.unwrap();

        let detail = h.host.get_repository(&repo.link).unwrap();
        assert_eq!(detail.display_name, "docs");
        assert!(detail.files.is_empty());

        assert!(matches!(
            h.host.get_repository("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_repository_checks() {
        let h = Harness::new();
        let alice = h.user("alice");
        let bob = h.user("bob");
        let repo = h.host.create_repository(&alice, "docs").await.unwrap();

        assert!(matches!(
            h.host.delete_repository(&alice, "missing").await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            h.host.delete_repository(&bob, &repo.link).await,
            Err(Error::Forbidden)
        ));
        assert!(h.host.get_repository(&repo.link).is_ok());
    }

    #[tokio::test]
    async fn test_create_clears_stale_reconciliation_entry() {
        let h = Harness::new();
        let key = h.user("alice");
        h.store
            .queue_orphaned_bucket("filehosting-litix-alice-docs", "left behind")
            .unwrap();

        h.host.create_repository(&key, "docs").await.unwrap();

        assert!(h.store.list_orphaned_buckets().unwrap().is_empty());
    }
}
