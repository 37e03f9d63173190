//! HTTP handlers for file upload, download and deletion.
//! Storage concerns are delegated to `FileService`; these handlers only
//! translate between HTTP and service calls.

use crate::{
    errors::AppError,
    handlers::AppState,
    models::file::{CallerIdentity, FetchedFile, IncomingFile, UploadRequest},
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

const UPLOAD_FIELD: &str = "file";
const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: &'static str,
    pub file_key: String,
    pub file_url: String,
    pub file_name: String,
}

/// `POST /files` — multipart upload, the file travels in the `file` field.
pub async fn upload_file(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, AppError> {
    let mut file = None;
    while let Some(field) = multipart.next_field().await.map_err(|err| {
        debug!("rejecting malformed multipart body: {}", err);
        AppError::new(err.status(), "Invalid upload body")
    })? {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .filter(|ct| !ct.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();
        let content = field.bytes().await.map_err(|err| {
            debug!("failed to read upload field: {}", err);
            AppError::new(err.status(), "Invalid upload body")
        })?;

        file = Some(IncomingFile {
            original_name,
            content,
            content_type,
        });
        break;
    }

    let request = UploadRequest {
        file,
        caller: CallerIdentity::from_headers(&headers, &state.owner_header),
    };

    let uploaded = state
        .files
        .upload(request)
        .await
        .map_err(|err| AppError::from_file_error(err, "Failed to upload file"))?;

    Ok(Json(UploadResponse {
        message: "File uploaded successfully",
        file_key: uploaded.key,
        file_url: uploaded.public_url,
        file_name: uploaded.original_name,
    }))
}

/// `GET /files/{name}` — raw bytes with the stored content type.
pub async fn get_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response, AppError> {
    fetch_file(&state, &name).await
}

/// `GET /files/` — a name is required.
pub async fn get_file_without_name(State(state): State<AppState>) -> Result<Response, AppError> {
    fetch_file(&state, "").await
}

/// `DELETE /files/{name}`
pub async fn delete_file(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    remove_file(&state, &name).await
}

/// `DELETE /files/` — a name is required.
pub async fn delete_file_without_name(
    State(state): State<AppState>,
) -> Result<Json<Value>, AppError> {
    remove_file(&state, "").await
}

async fn fetch_file(state: &AppState, name: &str) -> Result<Response, AppError> {
    let file = state
        .files
        .fetch(name)
        .await
        .map_err(|err| AppError::from_file_error(err, "Failed to get file"))?;

    let mut headers = HeaderMap::new();
    set_file_headers(&mut headers, &file);

    let mut response = Response::new(Body::from(file.content));
    *response.status_mut() = StatusCode::OK;
    *response.headers_mut() = headers;
    Ok(response)
}

async fn remove_file(state: &AppState, name: &str) -> Result<Json<Value>, AppError> {
    state
        .files
        .remove(name)
        .await
        .map_err(|err| AppError::from_file_error(err, "Failed to delete file"))?;

    Ok(Json(json!({ "message": "File deleted successfully" })))
}

fn set_file_headers(headers: &mut HeaderMap, file: &FetchedFile) {
    let content_type = file.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_CONTENT_TYPE)),
    );

    if let Some(size) = file.size {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    }
}
