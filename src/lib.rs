//! HTTP gateway for uploading, fetching and deleting files held in an
//! object-storage bucket.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod storage;

use axum::Router;
use config::{AppConfig, BackendKind};
use handlers::AppState;
use services::file_service::{FileService, FileServiceSettings};
use std::sync::Arc;
use storage::{InMemoryObjectStore, LocalObjectStore, ObjectStore, S3ObjectStore};

/// Construct the object store selected by `cfg.backend`.
pub async fn object_store(cfg: &AppConfig) -> Arc<dyn ObjectStore> {
    match cfg.backend {
        BackendKind::S3 => Arc::new(S3ObjectStore::connect(&cfg.s3).await),
        BackendKind::Local => Arc::new(LocalObjectStore::new(&cfg.storage_dir)),
        BackendKind::Memory => Arc::new(InMemoryObjectStore::new()),
    }
}

/// Build the full router on top of `store`.
pub fn app(cfg: &AppConfig, store: Arc<dyn ObjectStore>) -> Router {
    let files = FileService::new(
        store,
        FileServiceSettings {
            bucket: cfg.bucket.clone(),
            public_base_url: cfg.public_base_url.clone(),
            naming: cfg.naming,
        },
    );
    let state = AppState::new(files, cfg.owner_header.as_str());
    routes::routes::routes(state, cfg.max_upload_bytes)
}
