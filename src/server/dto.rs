use serde::{Deserialize, Serialize};

pub const DEFAULT_LIST_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_LIST_LIMIT
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub api_key: String,
}

#[derive(Debug, Deserialize)]
pub struct GetApiKeyParams {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateRepositoryParams {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct ListRepositoriesParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct LinkParams {
    pub link: String,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFileParams {
    /// Display name of the caller's repository.
    pub bucket_name: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct DownloadParams {
    pub link: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

impl MessageResponse {
    pub const SUCCESS: Self = Self { message: "success" };
}
