//! HTTP handlers and the state they share.

pub mod file_handlers;
pub mod health_handlers;

use crate::services::file_service::FileService;
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    /// Lowercase header name carrying the caller's owner id.
    pub owner_header: Arc<str>,
}

impl AppState {
    pub fn new(files: FileService, owner_header: impl Into<Arc<str>>) -> Self {
        Self {
            files,
            owner_header: owner_header.into(),
        }
    }
}
