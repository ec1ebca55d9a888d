use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::IntoResponse,
    routing::{delete, get, post},
};

use crate::auth::ApiKey;
use crate::server::AppState;
use crate::server::dto::{DownloadParams, LinkParams, MessageResponse, RemoveFileParams};
use crate::server::response::{ApiError, ApiResponse};

pub const MAX_UPLOAD_SIZE: usize = 100 * 1024 * 1024;

/// Room for multipart boundaries and part headers on top of the file itself.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

pub fn files_router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/add",
            post(add_file).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE + MULTIPART_OVERHEAD)),
        )
        .route("/remove", delete(remove_file))
        .route("/download", get(download_file))
}

struct Upload {
    data: Bytes,
    filename: String,
}

async fn parse_multipart_upload(multipart: &mut Multipart) -> Result<Upload, ApiError> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| ApiError::bad_request("File field has no filename"))?;
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read file: {e}")))?;
        if data.len() > MAX_UPLOAD_SIZE {
            return Err(ApiError::payload_too_large(format!(
                "File size ({} bytes) exceeds maximum allowed size ({MAX_UPLOAD_SIZE} bytes)",
                data.len()
            )));
        }

        upload = Some(Upload { data, filename });
    }

    upload.ok_or_else(|| ApiError::bad_request("File field is required"))
}

async fn add_file(
    ApiKey(api_key): ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<LinkParams>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let upload = parse_multipart_upload(&mut multipart).await?;

    let file = state
        .host
        .add_file(&api_key, &params.link, upload.data, &upload.filename)
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::success(file))))
}

async fn remove_file(
    ApiKey(api_key): ApiKey,
    State(state): State<Arc<AppState>>,
    Query(params): Query<RemoveFileParams>,
) -> impl IntoResponse {
    state
        .host
        .remove_file(&api_key, &params.bucket_name, &params.name)
        .await?;

    Ok::<_, ApiError>(Json(ApiResponse::success(MessageResponse::SUCCESS)))
}

async fn download_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<DownloadParams>,
) -> impl IntoResponse {
    let download = state.host.download(&params.link, &params.name).await?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(download.content_type),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition"),
    );

    if let Ok(value) =
        HeaderValue::from_str(&format!("attachment; filename=\"{}\"", download.filename))
    {
        headers.insert(header::CONTENT_DISPOSITION, value);
    } else {
        headers.insert(
            header::CONTENT_DISPOSITION,
            HeaderValue::from_static("attachment"),
        );
    }

    Ok::<_, ApiError>((StatusCode::OK, headers, download.data))
}
