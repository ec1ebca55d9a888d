use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::auth::ApiKey;
use crate::server::AppState;
use crate::server::dto::{CreateRepositoryParams, LinkParams, ListRepositoriesParams};
use crate::server::response::{ApiError, ApiResponse};

pub fn repositories_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/create", post(create_repository))
        .route("/all", get(list_repositories))
        .route("/delete", delete(delete_repository))
        .route("/{link}", get(get_repository))
}

async fn create_repository(
    ApiKey(api_key): ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<CreateRepositoryParams>,
) -> impl IntoResponse {
    let repo = state.host.create_repository(&api_key, &params.name).await?;

    Ok::<_, ApiError>((StatusCode::CREATED, Json(ApiResponse::success(repo))))
}

async fn list_repositories(
    ApiKey(api_key): ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListRepositoriesParams>,
) -> impl IntoResponse {
    let repos = state
        .host
        .list_repositories(&api_key, params.skip, params.limit)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(repos)))
}

async fn get_repository(
    State(state): State<Arc<AppState>>,
    Path(link): Path<String>,
) -> impl IntoResponse {
    let detail = state.host.get_repository(&link)?;

    Ok::<_, ApiError>(Json(ApiResponse::success(detail)))
}

/// Responds 202 when the bucket is left for reconciliation.
async fn delete_repository(
    ApiKey(api_key): ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LinkParams>,
) -> impl IntoResponse {
    let report = state.host.delete_repository(&api_key, &params.link).await?;

    let status = if report.cleanup_pending {
        StatusCode::ACCEPTED
    } else {
        StatusCode::OK
    };

    Ok::<_, ApiError>((status, Json(ApiResponse::success(report))))
}
