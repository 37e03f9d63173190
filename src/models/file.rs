//! Request and response shapes exchanged with the file service.

use axum::http::HeaderMap;
use bytes::Bytes;
use serde::Serialize;

/// A file part received from the client.
#[derive(Clone, Debug)]
pub struct IncomingFile {
    /// Filename as sent by the client, may contain an extension.
    pub original_name: String,

    pub content: Bytes,

    /// Declared content type of the part.
    pub content_type: String,
}

/// Transient input for a single upload call.
#[derive(Clone, Debug, Default)]
pub struct UploadRequest {
    /// `None` when the client sent no `file` part.
    pub file: Option<IncomingFile>,

    pub caller: Option<CallerIdentity>,
}

/// Identity of the caller, as asserted by a fronting auth proxy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    pub owner_id: String,
}

impl CallerIdentity {
    pub fn new(owner_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
        }
    }

    /// Read the owner id from `header`. Blank values count as absent.
    pub fn from_headers(headers: &HeaderMap, header: &str) -> Option<Self> {
        headers
            .get(header)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Self::new)
    }
}

/// Successful upload result.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct UploadedFile {
    pub key: String,
    pub public_url: String,
    pub original_name: String,
}

/// Successful fetch result.
#[derive(Clone, Debug, PartialEq)]
pub struct FetchedFile {
    pub content: Bytes,
    pub content_type: Option<String>,
    pub size: Option<u64>,
}
