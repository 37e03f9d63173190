//! Health & readiness handlers.
//!
//! - GET /         -> service banner
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks bucket configuration and storage reachability

use crate::{
    handlers::AppState,
    services::file_service::{ConfigurationIssue, FileError},
};
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// `GET /`
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Hello, World!" }))
}

/// `GET /healthz`
///
/// Very small liveness probe — always returns 200 OK with a plain JSON body.
/// This endpoint should be cheap and never perform I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// Readiness probe that:
/// 1. Verifies a bucket is configured.
/// 2. Runs an existence check against the backend; "not found" still counts
///    as reachable.
///
/// Returns JSON describing each check. HTTP 200 when all checks pass,
/// HTTP 503 when any check fails.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let (bucket_check, storage_check) = match state.files.check_ready().await {
        Ok(()) => (CheckStatus::ok(), CheckStatus::ok()),
        Err(FileError::Configuration(ConfigurationIssue::MissingBucket)) => (
            CheckStatus::failed("bucket is not configured"),
            CheckStatus::failed("skipped: no bucket"),
        ),
        Err(FileError::Configuration(ConfigurationIssue::InvalidBucket(_))) => (
            CheckStatus::failed("bucket rejected by storage backend"),
            CheckStatus::ok(),
        ),
        Err(_) => (
            CheckStatus::ok(),
            CheckStatus::failed("storage backend unreachable"),
        ),
    };

    let overall_ok = bucket_check.ok && storage_check.ok;

    let mut checks = HashMap::new();
    checks.insert("bucket", bucket_check);
    checks.insert("storage", storage_check);

    let body = ReadyResponse {
        status: if overall_ok {
            "ok".into()
        } else {
            "error".into()
        },
        backend: state.files.backend_name(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    backend: &'static str,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(reason: &str) -> Self {
        Self {
            ok: false,
            error: Some(reason.to_string()),
        }
    }
}
