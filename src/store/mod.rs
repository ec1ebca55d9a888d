mod schema;
mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::types::*;

/// Store defines the metadata persistence interface.
///
/// Unique constraints are the final arbiter for names, emails, API keys,
/// bucket names and link tokens: a violating insert returns
/// [`Error::Conflict`](crate::error::Error::Conflict).
pub trait Store: Send + Sync {
    fn initialize(&self) -> Result<()>;

    // User operations
    fn create_user(&self, user: &User) -> Result<()>;
    fn get_user_by_name(&self, name: &str) -> Result<Option<User>>;
    fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    fn get_user_by_api_key(&self, api_key: &str) -> Result<Option<User>>;

    // Repository operations
    fn create_repository(&self, repo: &Repository) -> Result<()>;
    fn get_repository_by_link(&self, link: &str) -> Result<Option<Repository>>;
    fn get_repository_by_name(&self, name: &str) -> Result<Option<Repository>>;
    fn get_owner_repository(
        &self,
        owner_api_key: &str,
        display_name: &str,
    ) -> Result<Option<Repository>>;
    fn list_repositories(&self, owner_api_key: &str, skip: i64, limit: i64)
    -> Result<Vec<Repository>>;
    /// Deletes every file record of the repository and then the repository
    /// itself in one transaction. Returns the number of file records removed.
    fn delete_repository_cascade(&self, id: &str) -> Result<usize>;

    // File operations
    fn create_file(&self, file: &FileRecord) -> Result<()>;
    fn get_file_by_display_name(
        &self,
        repository_id: &str,
        display_name: &str,
    ) -> Result<Option<FileRecord>>;
    fn get_file_by_name(&self, repository_id: &str, name: &str) -> Result<Option<FileRecord>>;
    fn list_files(&self, repository_id: &str) -> Result<Vec<FileRecord>>;
    fn delete_file(&self, id: &str) -> Result<bool>;

    // Reconciliation queue
    fn queue_orphaned_bucket(&self, bucket: &str, reason: &str) -> Result<()>;
    fn list_orphaned_buckets(&self) -> Result<Vec<OrphanedBucket>>;
    fn record_orphan_attempt(&self, bucket: &str, reason: &str) -> Result<()>;
    fn delete_orphaned_bucket(&self, bucket: &str) -> Result<bool>;
}
