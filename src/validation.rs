use crate::error::{Error, Result};

const MAX_USER_NAME_LEN: usize = 64;
const MAX_EMAIL_LEN: usize = 254;
const MAX_REPOSITORY_NAME_LEN: usize = 100;
const MAX_FILENAME_LEN: usize = 255;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn validate_display_text(text: &str, entity: &str, max_len: usize) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::bad_request(format!("{entity} cannot be empty")));
    }
    if text.chars().count() > max_len {
        return Err(Error::bad_request(format!(
            "{entity} cannot exceed {max_len} characters"
        )));
    }
    if text.chars().any(char::is_control) {
        return Err(Error::bad_request(format!(
            "{entity} cannot contain control characters"
        )));
    }
    Ok(())
}

pub fn validate_user_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::bad_request("User name cannot be empty"));
    }
    if name.len() > MAX_USER_NAME_LEN {
        return Err(Error::bad_request(format!(
            "User name cannot exceed {MAX_USER_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(Error::bad_request(
            "User name can only contain alphanumeric characters, hyphens, and underscores",
        ));
    }
    if name.starts_with('-') || name.starts_with('_') {
        return Err(Error::bad_request(
            "User name cannot start with a hyphen or underscore",
        ));
    }
    Ok(())
}

/// Accepts `local@domain.tld` shaped addresses; deliverability is not checked.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || Error::bad_request("Invalid email address");

    if email.len() > MAX_EMAIL_LEN || email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') {
        return Err(invalid());
    }

    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 || labels.iter().any(|label| label.is_empty()) {
        return Err(invalid());
    }

    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.is_empty() {
        return Err(Error::bad_request("Password cannot be empty"));
    }
    Ok(())
}

pub fn validate_repository_name(name: &str) -> Result<()> {
    validate_display_text(name, "Repository name", MAX_REPOSITORY_NAME_LEN)
}

pub fn validate_filename(filename: &str) -> Result<()> {
    validate_display_text(filename, "Filename", MAX_FILENAME_LEN)?;
    if filename == "." || filename == ".." {
        return Err(Error::bad_request("Filename cannot be '.' or '..'"));
    }
    Ok(())
}
