use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::error::Error;
use crate::server::AppState;
use crate::server::dto::{ApiKeyResponse, GetApiKeyParams, RegisterRequest};
use crate::server::response::{ApiError, ApiResponse};

pub fn accounts_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/get-api-key", get(get_api_key))
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> impl IntoResponse {
    let api_key = state.host.register(&req.name, &req.email, &req.password)?;

    Ok::<_, ApiError>((
        StatusCode::CREATED,
        Json(ApiResponse::success(ApiKeyResponse { api_key })),
    ))
}

async fn get_api_key(
    State(state): State<Arc<AppState>>,
    Query(params): Query<GetApiKeyParams>,
) -> impl IntoResponse {
    let api_key = state
        .host
        .authenticate(&params.username, &params.password)
        .map_err(|e| match e {
            Error::Unauthorized => ApiError::unauthorized("user does not exist"),
            Error::Forbidden => ApiError::forbidden("incorrect password or username"),
            e => ApiError::from(e),
        })?;

    Ok::<_, ApiError>(Json(ApiResponse::success(ApiKeyResponse { api_key })))
}
