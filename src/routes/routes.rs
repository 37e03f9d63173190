//! Defines routes for the file gateway.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /`        — banner
//!   - `GET    /healthz` — liveness
//!   - `GET    /readyz`  — readiness (bucket + storage)
//!
//! - **File endpoints**
//!   - `POST   /files`        — multipart upload (field `file`)
//!   - `GET    /files/{name}` — download file
//!   - `DELETE /files/{name}` — delete file
//!
//! `/files/` without a name answers 400 for GET and DELETE.

use crate::handlers::{
    AppState,
    file_handlers::{
        delete_file, delete_file_without_name, get_file, get_file_without_name, upload_file,
    },
    health_handlers::{healthz, readyz, root},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router, ready to serve.
///
/// `max_upload_bytes` caps request bodies on the upload route.
pub fn routes(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        // health endpoints (mounted at root)
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // File routes
        .route(
            "/files",
            post(upload_file).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route(
            "/files/",
            get(get_file_without_name).delete(delete_file_without_name),
        )
        .route("/files/{name}", get(get_file).delete(delete_file))
        .with_state(state)
}
