use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    #[serde(skip)]
    pub api_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A logical container backed by exactly one bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: String,
    /// Internal storage name; also the bucket name.
    pub name: String,
    pub display_name: String,
    pub link: String,
    #[serde(skip)]
    pub owner_api_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositorySummary {
    pub id: String,
    pub link: String,
    pub display_name: String,
}

impl From<Repository> for RepositorySummary {
    fn from(repo: Repository) -> Self {
        Self {
            id: repo.id,
            link: repo.link,
            display_name: repo.display_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDetail {
    pub display_name: String,
    pub link: String,
    pub files: Vec<FileRecord>,
}

/// File metadata. The object key in the bucket is `display_name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub repository_id: String,
    pub display_name: String,
    /// Storage-safe slug of `display_name`.
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
}

/// A bucket left behind after its repository record was removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrphanedBucket {
    pub bucket: String,
    pub reason: String,
    pub attempts: i64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_attempt_at: Option<DateTime<Utc>>,
}
