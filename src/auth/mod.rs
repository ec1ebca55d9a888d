mod middleware;
mod password;

pub use middleware::{ApiKey, AuthError, extract_bearer_token};
pub use password::CredentialHasher;
