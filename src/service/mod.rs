//! The repository/file lifecycle and authorization core.
//!
//! Every operation is a method on [`FileHost`]. The HTTP layer in
//! [`crate::server`] only parses requests and maps errors to status codes.

mod deletion;
mod files;
mod identity;
mod repositories;

pub use deletion::{DeletionReport, ReconcileReport};
pub use files::Download;

use std::sync::Arc;

use crate::auth::CredentialHasher;
use crate::error::{Error, Result};
use crate::storage::{ObjectStore, ObjectStoreError};
use crate::store::Store;
use crate::types::User;

pub struct FileHost {
    store: Arc<dyn Store>,
    objects: Arc<dyn ObjectStore>,
    hasher: CredentialHasher,
    /// Public base URL used to precompute file download URLs.
    public_base_url: Option<String>,
}

impl FileHost {
    pub fn new(store: Arc<dyn Store>, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            objects,
            hasher: CredentialHasher::new(),
            public_base_url: None,
        }
    }

    #[must_use]
    pub fn with_public_base_url(mut self, public_base_url: Option<String>) -> Self {
        self.public_base_url =
            public_base_url.map(|url| url.trim_end_matches('/').to_string());
        self
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    pub fn objects(&self) -> &dyn ObjectStore {
        self.objects.as_ref()
    }

    /// Resolves an API key to its user, failing with `Forbidden` otherwise.
    fn require_user(&self, api_key: &str) -> Result<User> {
        self.resolve(api_key)?.ok_or(Error::Forbidden)
    }
}

/// Maps a failed object lookup to `NotFound`, everything else to `Storage`.
fn missing_object_as_not_found(e: ObjectStoreError) -> Error {
    match e {
        ObjectStoreError::NoSuchKey(_) | ObjectStoreError::NoSuchBucket(_) => {
            Error::not_found("file does not exist")
        }
        e => Error::Storage(e),
    }
}
