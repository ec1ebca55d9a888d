use chrono::Utc;
use uuid::Uuid;

use super::FileHost;
use crate::error::{Error, Result};
use crate::naming::{API_KEY_LENGTH, new_token};
use crate::types::User;
use crate::validation::{validate_email, validate_password, validate_user_name};

impl FileHost {
    /// Registers a user and returns the freshly issued API key.
    pub fn register(&self, name: &str, email: &str, password: &str) -> Result<String> {
        validate_user_name(name)?;
        validate_email(email)?;
        validate_password(password)?;

        if self.store.get_user_by_name(name)?.is_some()
            || self.store.get_user_by_email(email)?.is_some()
        {
            return Err(Error::conflict(
                "User with this email or username already exists",
            ));
        }

        let api_key = new_token(API_KEY_LENGTH);
        let user = User {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            email: email.to_string(),
            password_hash: self.hasher.hash(password)?,
            api_key: Some(api_key.clone()),
            created_at: Utc::now(),
        };

        // A race with another registration, or an API key collision, is
        // caught by the unique indexes and surfaces as Conflict.
        self.store.create_user(&user)?;

        tracing::info!(user = %user.name, "registered user");
        Ok(api_key)
    }

    /// Exchanges a name and password for the user's API key.
    pub fn authenticate(&self, name: &str, password: &str) -> Result<String> {
        let user = self
            .store
            .get_user_by_name(name)?
            .ok_or(Error::Unauthorized)?;

        if !self.hasher.verify(password, &user.password_hash)? {
            return Err(Error::Forbidden);
        }

        user.api_key.ok_or(Error::Forbidden)
    }

    pub fn resolve(&self, api_key: &str) -> Result<Option<User>> {
        if api_key.is_empty() {
            return Ok(None);
        }
        self.store.get_user_by_api_key(api_key)
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::naming::API_KEY_LENGTH;
    use crate::service::testing::Harness;

    #[test]
    fn test_register_returns_usable_key() {
        let h = Harness::new();
        let key = h.host.register("alice", "alice@example.com", "pw").unwrap();

        assert_eq!(key.len(), API_KEY_LENGTH);
        let user = h.host.resolve(&key).unwrap().unwrap();
        assert_eq!(user.name, "alice");
        assert_ne!(user.password_hash, "pw");
    }

    #[test]
    fn test_register_duplicate_name_conflicts() {
        let h = Harness::new();
        h.host.register("alice", "alice@example.com", "pw").unwrap();

        let result = h.host.register("alice", "other@example.com", "pw");
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_register_duplicate_email_conflicts() {
        let h = Harness::new();
        h.host.register("alice", "alice@example.com", "pw").unwrap();

        let result = h.host.register("bob", "alice@example.com", "pw");
        assert!(matches!(result, Err(Error::Conflict(_))));
    }

    #[test]
    fn test_register_rejects_invalid_input() {
        let h = Harness::new();
        assert!(matches!(
            h.host.register("bad name", "a@example.com", "pw"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            h.host.register("alice", "not-an-email", "pw"),
            Err(Error::BadRequest(_))
        ));
        assert!(matches!(
            h.host.register("alice", "a@example.com", ""),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_authenticate() {
        let h = Harness::new();
        let key = h.host.register("alice", "alice@example.com", "pw").unwrap();

        assert_eq!(h.host.authenticate("alice", "pw").unwrap(), key);
        assert!(matches!(
            h.host.authenticate("alice", "wrong"),
            Err(Error::Forbidden)
        ));
        assert!(matches!(
            h.host.authenticate("nobody", "pw"),
            Err(Error::Unauthorized)
        ));
    }

    #[test]
    fn test_resolve_unknown_key() {
        let h = Harness::new();
        h.user("alice");
        assert!(h.host.resolve("unknown").unwrap().is_none());
        assert!(h.host.resolve("").unwrap().is_none());
    }
}
