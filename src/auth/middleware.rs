use axum::{
    Json,
    extract::{FromRequestParts, Query},
    http::{StatusCode, header::AUTHORIZATION, request::Parts},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;

/// The caller's raw API key.
///
/// Read from `Authorization: Bearer <key>` or, failing that, the `api_key`
/// query parameter. The key is only resolved to a user by the operation
/// itself, since ownership checks compare the key directly.
pub struct ApiKey(pub String);

#[derive(Debug)]
pub enum AuthError {
    MissingKey,
    InvalidScheme,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingKey => "incorrect api key",
            AuthError::InvalidScheme => "Invalid authorization scheme",
        };

        let body = json!({ "data": null, "error": message });
        (StatusCode::FORBIDDEN, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct ApiKeyQuery {
    api_key: Option<String>,
}

/// Extracts the token from a Bearer authorization header.
/// Returns None if no header is present.
pub fn extract_bearer_token(auth_header: Option<&str>) -> Result<Option<String>, AuthError> {
    match auth_header {
        Some(header) => header
            .strip_prefix("Bearer ")
            .map(|token| Some(token.trim().to_string()))
            .ok_or(AuthError::InvalidScheme),
        None => Ok(None),
    }
}

impl<S> FromRequestParts<S> for ApiKey
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok());

        if let Some(key) = extract_bearer_token(auth_header)? {
            if !key.is_empty() {
                return Ok(ApiKey(key));
            }
        }

        let query = Query::<ApiKeyQuery>::try_from_uri(&parts.uri)
            .map(|Query(q)| q.api_key)
            .unwrap_or_default();

        match query {
            Some(key) if !key.is_empty() => Ok(ApiKey(key)),
            _ => Err(AuthError::MissingKey),
        }
    }
}
