//! src/storage/local.rs
//!
//! LocalObjectStore — keeps object payloads on local disk, sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/`. Each object is a payload file plus a
//! JSON sidecar holding its key, content type and size. File names are derived
//! from the MD5 of `bucket/key`, so arbitrary keys never touch the path.

use super::{Existence, ObjectStore, StoreError, StoreResult};
use crate::models::object::StoredObject;
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

/// Sidecar metadata written next to every payload.
#[derive(Debug, Serialize, Deserialize)]
struct ObjectMeta {
    key: String,
    content_type: String,
    size_bytes: u64,
}

struct ObjectPaths {
    data: PathBuf,
    meta: PathBuf,
}

#[derive(Clone, Debug)]
pub struct LocalObjectStore {
    /// Base directory on disk where buckets live.
    base_path: PathBuf,
}

impl LocalObjectStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Reject keys no backend would accept: empty, oversized, or carrying
    /// control characters.
    fn ensure_key_safe(key: &str) -> StoreResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StoreError::InvalidKey);
        }
        if key.bytes().any(|b| b.is_ascii_control()) {
            return Err(StoreError::InvalidKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// Enforces S3-like naming rules:
    /// - 3–63 characters
    /// - lowercase letters, digits, dots, hyphens only
    /// - cannot start/end with dot or hyphen
    /// - cannot contain consecutive dots or dot-hyphen patterns
    /// - cannot look like an IPv4 address
    fn ensure_bucket_name_safe(name: &str) -> StoreResult<()> {
        let misconfigured = |reason: &str| {
            Err(StoreError::BucketMisconfigured(format!(
                "bucket `{}` invalid: {}",
                name, reason
            )))
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return misconfigured("must be between 3 and 63 characters");
        }

        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return misconfigured(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            );
        }

        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return misconfigured("must start and end with a lowercase letter or digit");
        }

        if name.contains("..") || name.contains("-.") || name.contains(".-") {
            return misconfigured("cannot contain consecutive dots or dot-hyphen combinations");
        }

        if is_ipv4_like(name) {
            return misconfigured("must not be formatted like an IP address");
        }

        Ok(())
    }

    fn bucket_root(&self, bucket: &str) -> PathBuf {
        self.base_path.join(bucket)
    }

    /// Payload and sidecar paths for `bucket/key`.
    ///
    /// The first two bytes of MD5(bucket/key) pick the shard directories
    /// (00–ff each), the full digest names the files.
    fn object_paths(&self, bucket: &str, key: &str) -> ObjectPaths {
        let digest = format!("{:x}", md5::compute(format!("{}/{}", bucket, key)));
        let dir = self
            .bucket_root(bucket)
            .join(&digest[0..2])
            .join(&digest[2..4]);
        ObjectPaths {
            data: dir.join(format!("{}.bin", digest)),
            meta: dir.join(format!("{}.json", digest)),
        }
    }

    fn checked_paths(&self, bucket: &str, key: &str) -> StoreResult<ObjectPaths> {
        Self::ensure_bucket_name_safe(bucket)?;
        Self::ensure_key_safe(key)?;
        Ok(self.object_paths(bucket, key))
    }

    async fn read_meta(path: &Path) -> StoreResult<ObjectMeta> {
        let raw = fs::read(path).await.map_err(not_found_or_io)?;
        serde_json::from_slice(&raw).map_err(|err| StoreError::Upstream {
            code: Some("CorruptMetadata".into()),
            message: format!("{}: {}", path.display(), err),
        })
    }

    /// Write `bytes` to a temporary sibling, fsync, then rename into place.
    async fn write_atomically(path: &Path, bytes: &[u8]) -> StoreResult<()> {
        let parent = path.parent().ok_or_else(|| {
            StoreError::from(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let written = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(bytes).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, path).await
        }
        .await;

        if let Err(err) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.into());
        }
        Ok(())
    }

    /// Remove empty directories from `start` up to, but excluding, `stop`.
    async fn prune_empty_dirs(start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => match current.parent() {
                    Some(parent) => current = parent.to_path_buf(),
                    None => break,
                },
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    fn backend_name(&self) -> &'static str {
        "local"
    }

    async fn head(&self, bucket: &str, key: &str) -> Existence {
        let paths = match self.checked_paths(bucket, key) {
            Ok(paths) => paths,
            Err(err) => return Existence::CheckFailed(err),
        };
        match fs::try_exists(&paths.meta).await {
            Ok(true) => Existence::Found,
            Ok(false) => Existence::NotFound,
            Err(err) => Existence::CheckFailed(err.into()),
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let paths = self.checked_paths(bucket, key)?;
        let meta = Self::read_meta(&paths.meta).await?;
        let content = fs::read(&paths.data).await.map_err(not_found_or_io)?;
        if content.len() as u64 != meta.size_bytes {
            return Err(StoreError::Upstream {
                code: Some("CorruptObject".into()),
                message: format!(
                    "{}: expected {} bytes, found {}",
                    paths.data.display(),
                    meta.size_bytes,
                    content.len()
                ),
            });
        }

        Ok(StoredObject {
            key: meta.key,
            size: Some(meta.size_bytes),
            content: Bytes::from(content),
            content_type: Some(meta.content_type),
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        let paths = self.checked_paths(bucket, key)?;

        Self::write_atomically(&paths.data, &content).await?;

        let meta = ObjectMeta {
            key: key.to_string(),
            content_type: content_type.to_string(),
            size_bytes: content.len() as u64,
        };
        let encoded =
            serde_json::to_vec(&meta).map_err(|err| StoreError::upstream(err.to_string()))?;
        if let Err(err) = Self::write_atomically(&paths.meta, &encoded).await {
            let _ = fs::remove_file(&paths.data).await;
            return Err(err);
        }

        debug!(
            "stored {} bytes for {}/{} at {}",
            meta.size_bytes,
            bucket,
            key,
            paths.data.display()
        );
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let paths = self.checked_paths(bucket, key)?;

        // Sidecar first so a concurrent head stops reporting the object.
        for path in [&paths.meta, &paths.data] {
            match fs::remove_file(path).await {
                Ok(_) => debug!("removed {}", path.display()),
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    debug!("file {} already missing", path.display());
                }
                Err(err) => return Err(err.into()),
            }
        }

        if let Some(parent) = paths.data.parent() {
            Self::prune_empty_dirs(parent, &self.bucket_root(bucket)).await;
        }
        Ok(())
    }
}

fn not_found_or_io(err: io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        err.into()
    }
}

/// Check if a string matches IPv4-like dotted decimal form.
/// Rejects names formatted like `1.2.3.4`.
fn is_ipv4_like(name: &str) -> bool {
    let parts: Vec<&str> = name.split('.').collect();
    parts.len() == 4
        && parts.iter().all(|segment| {
            !segment.is_empty()
                && segment.len() <= 3
                && segment.chars().all(|c| c.is_ascii_digit())
                && segment.parse::<u8>().is_ok()
        })
}
