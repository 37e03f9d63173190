//! src/services/file_service.rs
//!
//! FileService — upload, fetch and remove files in a single bucket.
//!
//! Every operation resolves to an [`OperationOutcome`]: the value on success,
//! or one of the closed [`FileError`] cases. Backend errors are translated in
//! exactly one place (`From<StoreError> for FileError`) so raw storage codes
//! never reach the HTTP layer.
//!
//! Existence-check-then-write (upload) and existence-check-then-delete
//! (remove) are two independent round trips. Nothing makes them atomic: two
//! concurrent uploads of the same name can both see the key as free and the
//! later write wins, and a delete can race another delete.

use crate::{
    models::file::{FetchedFile, UploadRequest, UploadedFile},
    services::naming::{NamingStrategy, RandomToken, TokenGenerator},
    storage::{Existence, ObjectStore, StoreError},
};
use chrono::Utc;
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Key probed by the readiness check. Its presence is irrelevant, only
/// whether the backend answers.
pub const READINESS_PROBE_KEY: &str = ".file-gateway-readiness-probe";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BadRequestReason {
    MissingFile,
    MissingName,
    Unauthorized,
}

impl fmt::Display for BadRequestReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadRequestReason::MissingFile => f.write_str("no file uploaded"),
            BadRequestReason::MissingName => f.write_str("file name is required"),
            BadRequestReason::Unauthorized => f.write_str("caller identity is required"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationIssue {
    MissingBucket,
    InvalidBucket(String),
}

impl fmt::Display for ConfigurationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigurationIssue::MissingBucket => f.write_str("bucket is not configured"),
            ConfigurationIssue::InvalidBucket(detail) => write!(f, "invalid bucket: {}", detail),
        }
    }
}

#[derive(Debug, Error)]
pub enum FileError {
    #[error("bad request: {0}")]
    BadRequest(BadRequestReason),
    #[error("file not found")]
    NotFound,
    #[error("configuration error: {0}")]
    Configuration(ConfigurationIssue),
    #[error("upstream storage error: {0}")]
    Upstream(StoreError),
}

impl From<StoreError> for FileError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => FileError::NotFound,
            StoreError::BucketMisconfigured(detail) => {
                FileError::Configuration(ConfigurationIssue::InvalidBucket(detail))
            }
            other @ (StoreError::InvalidKey | StoreError::Upstream { .. }) => {
                FileError::Upstream(other)
            }
        }
    }
}

pub type OperationOutcome<T> = Result<T, FileError>;

/// Milliseconds since the epoch, used by owner-scoped keys.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Static settings for [`FileService`].
#[derive(Clone, Debug)]
pub struct FileServiceSettings {
    /// Target bucket; empty means unset.
    pub bucket: String,
    /// Public base URL; objects are published at `{public_base_url}/{key}`.
    pub public_base_url: String,
    pub naming: NamingStrategy,
}

#[derive(Clone)]
pub struct FileService {
    store: Arc<dyn ObjectStore>,
    tokens: Arc<dyn TokenGenerator>,
    clock: Clock,
    bucket: String,
    public_base_url: String,
    naming: NamingStrategy,
}

impl FileService {
    pub fn new(store: Arc<dyn ObjectStore>, settings: FileServiceSettings) -> Self {
        Self {
            store,
            tokens: Arc::new(RandomToken),
            clock: Arc::new(|| Utc::now().timestamp_millis()),
            bucket: settings.bucket.trim().to_string(),
            public_base_url: settings.public_base_url.trim_end_matches('/').to_string(),
            naming: settings.naming,
        }
    }

    /// Replace the random disambiguation token source.
    pub fn with_token_generator(mut self, tokens: Arc<dyn TokenGenerator>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Replace the wall clock used for owner-scoped keys.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key)
    }

    fn bucket(&self) -> OperationOutcome<&str> {
        if self.bucket.is_empty() {
            Err(FileError::Configuration(ConfigurationIssue::MissingBucket))
        } else {
            Ok(&self.bucket)
        }
    }

    /// Store a new file under a key derived from its original name.
    pub async fn upload(&self, request: UploadRequest) -> OperationOutcome<UploadedFile> {
        let file = request.file.ok_or_else(|| {
            rejected(
                "upload",
                "",
                FileError::BadRequest(BadRequestReason::MissingFile),
            )
        })?;
        if file.original_name.trim().is_empty() {
            return Err(rejected(
                "upload",
                "",
                FileError::BadRequest(BadRequestReason::MissingName),
            ));
        }
        let bucket = self
            .bucket()
            .map_err(|err| rejected("upload", &file.original_name, err))?;
        if self.naming.requires_owner() && request.caller.is_none() {
            return Err(rejected(
                "upload",
                &file.original_name,
                FileError::BadRequest(BadRequestReason::Unauthorized),
            ));
        }

        let timestamp = (self.clock)();
        let base_key = self
            .naming
            .base_key(&file.original_name, request.caller.as_ref(), timestamp);

        let key = match self.store.head(bucket, &base_key).await {
            Existence::NotFound => base_key,
            Existence::Found => {
                // Not re-checked: a collision on the token is accepted.
                let key = self.naming.collision_key(
                    &file.original_name,
                    request.caller.as_ref(),
                    timestamp,
                    &self.tokens.token(),
                );
                debug!(
                    operation = "upload",
                    taken = %base_key,
                    key = %key,
                    "key already taken, using disambiguated key"
                );
                key
            }
            Existence::CheckFailed(err) => return Err(failed("upload", &base_key, err)),
        };

        let size = file.content.len();
        self.store
            .put(bucket, &key, file.content, &file.content_type)
            .await
            .map_err(|err| failed("upload", &key, err))?;

        info!(
            operation = "upload",
            key = %key,
            size,
            content_type = %file.content_type,
            "file uploaded"
        );

        Ok(UploadedFile {
            public_url: self.public_url(&key),
            key,
            original_name: file.original_name,
        })
    }

    /// Read a file by key.
    pub async fn fetch(&self, name: &str) -> OperationOutcome<FetchedFile> {
        if name.is_empty() {
            return Err(rejected(
                "fetch",
                name,
                FileError::BadRequest(BadRequestReason::MissingName),
            ));
        }
        let bucket = self.bucket().map_err(|err| rejected("fetch", name, err))?;

        let object = self
            .store
            .get(bucket, name)
            .await
            .map_err(|err| failed("fetch", name, err))?;

        Ok(FetchedFile {
            size: object.size.or(Some(object.content.len() as u64)),
            content: object.content,
            content_type: object.content_type,
        })
    }

    /// Delete a file by key, reporting `NotFound` when it does not exist.
    pub async fn remove(&self, name: &str) -> OperationOutcome<()> {
        if name.is_empty() {
            return Err(rejected(
                "remove",
                name,
                FileError::BadRequest(BadRequestReason::MissingName),
            ));
        }
        let bucket = self.bucket().map_err(|err| rejected("remove", name, err))?;

        match self.store.head(bucket, name).await {
            Existence::Found => {}
            Existence::NotFound => return Err(failed("remove", name, StoreError::NotFound)),
            Existence::CheckFailed(err) => return Err(failed("remove", name, err)),
        }

        self.store
            .delete(bucket, name)
            .await
            .map_err(|err| failed("remove", name, err))?;

        info!(operation = "remove", key = %name, "file deleted");
        Ok(())
    }

    /// Confirm a bucket is configured and the backend answers an existence
    /// check.
    pub async fn check_ready(&self) -> OperationOutcome<()> {
        let bucket = self.bucket()?;
        match self.store.head(bucket, READINESS_PROBE_KEY).await {
            Existence::Found | Existence::NotFound => Ok(()),
            Existence::CheckFailed(err) => Err(failed("readiness", READINESS_PROBE_KEY, err)),
        }
    }
}

/// Log a request rejected before any storage call.
fn rejected(operation: &'static str, key: &str, err: FileError) -> FileError {
    match &err {
        FileError::Configuration(issue) => {
            error!(operation, key = %key, issue = %issue, "bucket configuration problem")
        }
        other => debug!(operation, key = %key, reason = %other, "request rejected"),
    }
    err
}

/// Log a storage failure and translate it.
fn failed(operation: &'static str, key: &str, err: StoreError) -> FileError {
    match &err {
        StoreError::NotFound => debug!(operation, key = %key, "object not found"),
        StoreError::BucketMisconfigured(detail) => error!(
            operation,
            key = %key,
            code = err.code(),
            detail = %detail,
            "storage rejected bucket configuration"
        ),
        StoreError::InvalidKey => {
            warn!(operation, key = %key, code = err.code(), "storage rejected key")
        }
        StoreError::Upstream { message, .. } => error!(
            operation,
            key = %key,
            code = err.code(),
            message = %message,
            "storage backend call failed"
        ),
    }
    FileError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            file::{CallerIdentity, IncomingFile},
            object::StoredObject,
        },
        storage::{InMemoryObjectStore, StoreResult},
    };
    use async_trait::async_trait;
    use bytes::Bytes;
    use std::sync::Mutex;

    /// Memory store that records calls and can be told to fail.
    #[derive(Default)]
    struct ScriptedStore {
        inner: InMemoryObjectStore,
        calls: Mutex<Vec<String>>,
        fail_head: Option<fn() -> StoreError>,
        fail_get: Option<fn() -> StoreError>,
        fail_put: Option<fn() -> StoreError>,
    }

    impl ScriptedStore {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl ObjectStore for ScriptedStore {
        fn backend_name(&self) -> &'static str {
            "scripted"
        }

        async fn head(&self, bucket: &str, key: &str) -> Existence {
            self.record(format!("head {bucket}/{key}"));
            match self.fail_head {
                Some(make) => Existence::CheckFailed(make()),
                None => self.inner.head(bucket, key).await,
            }
        }

        async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
            self.record(format!("get {bucket}/{key}"));
            match self.fail_get {
                Some(make) => Err(make()),
                None => self.inner.get(bucket, key).await,
            }
        }

        async fn put(
            &self,
            bucket: &str,
            key: &str,
            content: Bytes,
            content_type: &str,
        ) -> StoreResult<()> {
            self.record(format!("put {bucket}/{key}"));
            match self.fail_put {
                Some(make) => Err(make()),
                None => self.inner.put(bucket, key, content, content_type).await,
            }
        }

        async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
            self.record(format!("delete {bucket}/{key}"));
            self.inner.delete(bucket, key).await
        }
    }

    struct FixedToken(&'static str);

    impl TokenGenerator for FixedToken {
        fn token(&self) -> String {
            self.0.to_string()
        }
    }

    fn settings(bucket: &str, naming: NamingStrategy) -> FileServiceSettings {
        FileServiceSettings {
            bucket: bucket.into(),
            public_base_url: "https://cdn.example.com/".into(),
            naming,
        }
    }

    fn service_with(
        store: Arc<ScriptedStore>,
        bucket: &str,
        naming: NamingStrategy,
    ) -> FileService {
        FileService::new(store, settings(bucket, naming))
            .with_token_generator(Arc::new(FixedToken("Zx9_")))
    }

    fn upload_of(name: &str, content: &'static [u8], content_type: &str) -> UploadRequest {
        UploadRequest {
            file: Some(IncomingFile {
                original_name: name.into(),
                content: Bytes::from_static(content),
                content_type: content_type.into(),
            }),
            caller: None,
        }
    }

    #[tokio::test]
    async fn first_upload_uses_original_name() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        let uploaded = service
            .upload(upload_of("report.pdf", b"%PDF-1.4...", "application/pdf"))
            .await
            .unwrap();

        assert_eq!(uploaded.key, "report.pdf");
        assert_eq!(uploaded.public_url, "https://cdn.example.com/report.pdf");
        assert_eq!(uploaded.original_name, "report.pdf");
        assert_eq!(
            store.calls(),
            vec!["head files/report.pdf", "put files/report.pdf"]
        );
    }

    #[tokio::test]
    async fn second_upload_of_same_name_is_disambiguated() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        service
            .upload(upload_of("a.txt", b"first", "text/plain"))
            .await
            .unwrap();
        let second = service
            .upload(upload_of("a.txt", b"second", "text/plain"))
            .await
            .unwrap();

        assert_eq!(second.key, "a-Zx9_.txt");
        assert_eq!(second.public_url, "https://cdn.example.com/a-Zx9_.txt");
        // The disambiguated key is written without a second check.
        assert_eq!(
            store.calls(),
            vec![
                "head files/a.txt",
                "put files/a.txt",
                "head files/a.txt",
                "put files/a-Zx9_.txt"
            ]
        );

        let first = service.fetch("a.txt").await.unwrap();
        let again = service.fetch("a-Zx9_.txt").await.unwrap();
        assert_eq!(first.content, Bytes::from_static(b"first"));
        assert_eq!(again.content, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn random_tokens_produce_four_char_suffix() {
        let store = Arc::new(InMemoryObjectStore::new());
        let service = FileService::new(store, settings("files", NamingStrategy::CollisionAvoiding));

        service
            .upload(upload_of("a.txt", b"1", "text/plain"))
            .await
            .unwrap();
        let second = service
            .upload(upload_of("a.txt", b"2", "text/plain"))
            .await
            .unwrap();

        let token = second
            .key
            .strip_prefix("a-")
            .and_then(|rest| rest.strip_suffix(".txt"))
            .unwrap();
        assert_eq!(token.len(), 4);
    }

    #[tokio::test]
    async fn upload_then_fetch_returns_content_and_type() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store, "files", NamingStrategy::CollisionAvoiding);

        let uploaded = service
            .upload(upload_of("pic.png", b"\x89PNG", "image/png"))
            .await
            .unwrap();
        let fetched = service.fetch(&uploaded.key).await.unwrap();
        let fetched_again = service.fetch(&uploaded.key).await.unwrap();

        assert_eq!(fetched.content, Bytes::from_static(b"\x89PNG"));
        assert_eq!(fetched.content_type.as_deref(), Some("image/png"));
        assert_eq!(fetched.size, Some(4));
        assert_eq!(fetched, fetched_again);
    }

    #[tokio::test]
    async fn missing_file_is_bad_request() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        let err = service.upload(UploadRequest::default()).await.unwrap_err();
        assert!(matches!(
            err,
            FileError::BadRequest(BadRequestReason::MissingFile)
        ));

        let err = service
            .upload(upload_of("", b"x", "text/plain"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FileError::BadRequest(BadRequestReason::MissingName)
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn missing_bucket_fails_every_operation_without_storage_calls() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "  ", NamingStrategy::CollisionAvoiding);

        let missing = |err: FileError| {
            matches!(
                err,
                FileError::Configuration(ConfigurationIssue::MissingBucket)
            )
        };
        assert!(missing(
            service
                .upload(upload_of("a.txt", b"x", "text/plain"))
                .await
                .unwrap_err()
        ));
        assert!(missing(service.fetch("a.txt").await.unwrap_err()));
        assert!(missing(service.remove("a.txt").await.unwrap_err()));
        assert!(missing(service.check_ready().await.unwrap_err()));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn owner_scoped_upload_requires_caller() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::OwnerScoped);

        let err = service
            .upload(upload_of("a.txt", b"x", "text/plain"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FileError::BadRequest(BadRequestReason::Unauthorized)
        ));
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn owner_scoped_key_carries_owner_and_timestamp() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store, "files", NamingStrategy::OwnerScoped);

        let mut request = upload_of("a.txt", b"x", "text/plain");
        request.caller = Some(CallerIdentity::new("user-7"));
        let before = Utc::now().timestamp_millis();
        let uploaded = service.upload(request).await.unwrap();
        let after = Utc::now().timestamp_millis();

        let stamp: i64 = uploaded
            .key
            .strip_prefix("a.txt-user-7-")
            .unwrap()
            .parse()
            .unwrap();
        assert!((before..=after).contains(&stamp));
        assert_eq!(uploaded.original_name, "a.txt");
    }

    #[tokio::test]
    async fn owner_scoped_collision_keeps_token_in_file_name() {
        let store = Arc::new(ScriptedStore::default());
        store
            .inner
            .put(
                "files",
                "report.pdf-john.doe-1700000000000",
                Bytes::from_static(b"old"),
                "application/pdf",
            )
            .await
            .unwrap();
        let service = FileService::new(
            store.clone(),
            settings("files", NamingStrategy::OwnerScoped),
        )
        .with_token_generator(Arc::new(FixedToken("TTTT")))
            .with_clock(Arc::new(|| 1_700_000_000_000));

        let mut request = upload_of("report.pdf", b"new", "application/pdf");
        request.caller = Some(CallerIdentity::new("john.doe"));
        let uploaded = service.upload(request).await.unwrap();

        assert_eq!(uploaded.key, "report-TTTT.pdf-john.doe-1700000000000");
        assert_eq!(uploaded.original_name, "report.pdf");
        assert_eq!(
            store.calls(),
            vec![
                "head files/report.pdf-john.doe-1700000000000",
                "put files/report-TTTT.pdf-john.doe-1700000000000",
            ]
        );
        let kept = store
            .inner
            .get("files", "report.pdf-john.doe-1700000000000")
            .await
            .unwrap();
        assert_eq!(kept.content, Bytes::from_static(b"old"));
    }

    #[tokio::test]
    async fn failed_existence_check_aborts_upload() {
        let store = Arc::new(ScriptedStore {
            fail_head: Some(|| StoreError::upstream("connection reset")),
            ..Default::default()
        });
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        let err = service
            .upload(upload_of("a.txt", b"x", "text/plain"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Upstream(_)));
        assert_eq!(store.calls(), vec!["head files/a.txt"]);
    }

    #[tokio::test]
    async fn malformed_bucket_maps_to_configuration_for_all_operations() {
        let store = Arc::new(ScriptedStore {
            fail_head: Some(|| StoreError::BucketMisconfigured("bad name".into())),
            fail_get: Some(|| StoreError::BucketMisconfigured("bad name".into())),
            ..Default::default()
        });
        let service = service_with(store, "files", NamingStrategy::CollisionAvoiding);

        let invalid = |err: FileError| {
            matches!(
                err,
                FileError::Configuration(ConfigurationIssue::InvalidBucket(_))
            )
        };
        assert!(invalid(
            service
                .upload(upload_of("a.txt", b"x", "text/plain"))
                .await
                .unwrap_err()
        ));
        assert!(invalid(service.fetch("a.txt").await.unwrap_err()));
        assert!(invalid(service.remove("a.txt").await.unwrap_err()));
    }

    #[tokio::test]
    async fn failed_write_is_upstream_error() {
        let store = Arc::new(ScriptedStore {
            fail_put: Some(|| StoreError::Upstream {
                code: Some("SlowDown".into()),
                message: "please reduce your request rate".into(),
            }),
            ..Default::default()
        });
        let service = service_with(store, "files", NamingStrategy::CollisionAvoiding);

        let err = service
            .upload(upload_of("a.txt", b"x", "text/plain"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::Upstream(_)));
    }

    #[tokio::test]
    async fn fetch_errors_are_translated() {
        let service = service_with(
            Arc::new(ScriptedStore::default()),
            "files",
            NamingStrategy::CollisionAvoiding,
        );
        assert!(matches!(
            service.fetch("").await.unwrap_err(),
            FileError::BadRequest(BadRequestReason::MissingName)
        ));
        assert!(matches!(
            service.fetch("missing.txt").await.unwrap_err(),
            FileError::NotFound
        ));

        let failing = service_with(
            Arc::new(ScriptedStore {
                fail_get: Some(|| StoreError::InvalidKey),
                ..Default::default()
            }),
            "files",
            NamingStrategy::CollisionAvoiding,
        );
        assert!(matches!(
            failing.fetch("a.txt").await.unwrap_err(),
            FileError::Upstream(StoreError::InvalidKey)
        ));
    }

    #[tokio::test]
    async fn delete_then_fetch_is_not_found() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        service
            .upload(upload_of("gone.txt", b"bye", "text/plain"))
            .await
            .unwrap();
        service.remove("gone.txt").await.unwrap();

        assert!(matches!(
            service.fetch("gone.txt").await.unwrap_err(),
            FileError::NotFound
        ));
        assert!(store.calls().contains(&"delete files/gone.txt".to_string()));
    }

    #[tokio::test]
    async fn remove_missing_file_skips_delete() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        assert!(matches!(
            service.remove("nope.txt").await.unwrap_err(),
            FileError::NotFound
        ));
        assert_eq!(store.calls(), vec!["head files/nope.txt"]);
    }

    #[tokio::test]
    async fn remove_check_failure_is_upstream() {
        let store = Arc::new(ScriptedStore {
            fail_head: Some(|| StoreError::upstream("timeout")),
            ..Default::default()
        });
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        assert!(matches!(
            service.remove("a.txt").await.unwrap_err(),
            FileError::Upstream(_)
        ));
        assert_eq!(store.calls(), vec!["head files/a.txt"]);
    }

    #[tokio::test]
    async fn readiness_accepts_absent_probe_key() {
        let store = Arc::new(ScriptedStore::default());
        let service = service_with(store.clone(), "files", NamingStrategy::CollisionAvoiding);

        service.check_ready().await.unwrap();
        assert_eq!(
            store.calls(),
            vec![format!("head files/{}", READINESS_PROBE_KEY)]
        );
    }

    #[test]
    fn public_url_trims_trailing_slash_once() {
        let service = FileService::new(
            Arc::new(InMemoryObjectStore::new()),
            settings("files", NamingStrategy::CollisionAvoiding),
        );
        assert_eq!(service.public_url("k"), "https://cdn.example.com/k");
    }
}
