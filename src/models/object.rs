//! Represents an object (file) stored in a bucket.

use bytes::Bytes;

/// A single object read back from the bucket.
///
/// The bucket is the only persistent store, so this is a transient view of
/// whatever the backend returned for `key`.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredObject {
    /// Object key within the bucket.
    pub key: String,

    /// Raw payload bytes.
    pub content: Bytes,

    /// Content type (MIME type) recorded at upload, if the backend kept one.
    pub content_type: Option<String>,

    /// Size in bytes, if the backend reported it.
    pub size: Option<u64>,
}
