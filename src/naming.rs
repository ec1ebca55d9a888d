//! Derivation of bucket names, slugs and random tokens.

use rand::Rng;
use rand::distributions::Alphanumeric;

use crate::error::{Error, Result};

pub const BUCKET_PREFIX: &str = "filehosting-litix";

/// Length of the public link token of a repository.
pub const LINK_TOKEN_LENGTH: usize = 30;

/// Length of an issued API key.
pub const API_KEY_LENGTH: usize = 50;

// S3 bucket names are limited to 3..=63 characters.
const MAX_BUCKET_NAME_LEN: usize = 63;

/// Lower-cases `text`, keeps ASCII alphanumerics and collapses every run of
/// anything else into a single hyphen. Leading and trailing hyphens are
/// dropped, so the result may be empty.
#[must_use]
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_hyphen = false;

    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Builds the bucket name `filehosting-litix-<owner>-<display>` from the
/// slugs of both inputs.
pub fn bucket_name(owner_name: &str, display_name: &str) -> Result<String> {
    let owner = slugify(owner_name);
    if owner.is_empty() {
        return Err(Error::bad_request(
            "user name must contain at least one alphanumeric character",
        ));
    }

    let display = slugify(display_name);
    if display.is_empty() {
        return Err(Error::bad_request(
            "repository name must contain at least one alphanumeric character",
        ));
    }

    let name = format!("{BUCKET_PREFIX}-{owner}-{display}");
    if name.len() > MAX_BUCKET_NAME_LEN {
        return Err(Error::bad_request(format!(
            "repository name is too long: storage name cannot exceed {MAX_BUCKET_NAME_LEN} characters"
        )));
    }

    Ok(name)
}

/// Generates a cryptographically random token over `[A-Za-z0-9]`.
#[must_use]
pub fn new_token(length: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}
