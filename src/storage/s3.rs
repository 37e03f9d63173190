//! S3-compatible object store (AWS S3, Cloudflare R2, MinIO).

use super::{Existence, ObjectStore, StoreError, StoreResult};
use crate::models::object::StoredObject;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    Client,
    config::{Credentials, Region, retry::RetryConfig, timeout::TimeoutConfig},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    primitives::ByteStream,
};
use bytes::Bytes;
use std::{fmt, time::Duration};
use tracing::debug;

/// Connection settings for [`S3ObjectStore::connect`].
#[derive(Clone)]
pub struct S3Options {
    /// Custom endpoint; enables path-style addressing when set.
    pub endpoint: Option<String>,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    /// Upper bound for a single storage call, retries are disabled.
    pub operation_timeout: Duration,
}

impl fmt::Debug for S3Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Options")
            .field("endpoint", &self.endpoint)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field(
                "secret_access_key",
                &self.secret_access_key.as_ref().map(|_| "<redacted>"),
            )
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from `options`. Static credentials are used only when
    /// both halves are present, otherwise the SDK default chain applies.
    pub async fn connect(options: &S3Options) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(options.region.clone()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config)
            .retry_config(RetryConfig::disabled())
            .timeout_config(
                TimeoutConfig::builder()
                    .operation_timeout(options.operation_timeout)
                    .build(),
            );

        if let Some(endpoint) = &options.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        if let (Some(access_key), Some(secret_key)) =
            (&options.access_key_id, &options.secret_access_key)
        {
            builder = builder.credentials_provider(Credentials::new(
                access_key,
                secret_key,
                None,
                None,
                "file-gateway-static",
            ));
        }

        Self::new(Client::from_conf(builder.build()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn head(&self, bucket: &str, key: &str) -> Existence {
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => Existence::Found,
            Err(SdkError::ServiceError(ref err)) if err.err().is_not_found() => {
                Existence::NotFound
            }
            Err(err) => match classify(err) {
                StoreError::NotFound => Existence::NotFound,
                other => Existence::CheckFailed(other),
            },
        }
    }

    async fn get(&self, bucket: &str, key: &str) -> StoreResult<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| match err {
                SdkError::ServiceError(ref service) if service.err().is_no_such_key() => {
                    StoreError::NotFound
                }
                other => classify(other),
            })?;

        let content_type = output.content_type().map(str::to_string);
        let size = output
            .content_length()
            .and_then(|len| u64::try_from(len).ok());
        let content = output
            .body
            .collect()
            .await
            .map_err(|err| StoreError::Upstream {
                code: Some("BodyReadFailed".into()),
                message: err.to_string(),
            })?
            .into_bytes();

        debug!("fetched {} bytes for s3://{}/{}", content.len(), bucket, key);

        Ok(StoredObject {
            key: key.to_string(),
            content,
            content_type,
            size,
        })
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> StoreResult<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}

/// Map an SDK failure onto [`StoreError`].
///
/// Requests the SDK refuses to build (empty or malformed bucket) and the
/// bucket-level service codes are configuration problems.
fn classify<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: fmt::Debug,
{
    let message = DisplayErrorContext(&err).to_string();
    if matches!(err, SdkError::ConstructionFailure(_)) {
        return StoreError::BucketMisconfigured(message);
    }
    classify_code(err.code(), message)
}

fn classify_code(code: Option<&str>, message: String) -> StoreError {
    match code {
        Some("NoSuchKey" | "NotFound") => StoreError::NotFound,
        Some("InvalidBucketName" | "NoSuchBucket") => StoreError::BucketMisconfigured(message),
        other => StoreError::Upstream {
            code: other.map(str::to_string),
            message,
        },
    }
}
