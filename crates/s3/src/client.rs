//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the `Backend` trait from bf-core over a
//! single physical bucket.

use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::primitives::ByteStream;
use bf_core::{
    Backend, BackendError, BackendResult, Entry, Resource, ResourceId, RetryConfig, S3Config,
    retry_with_backoff,
};
use bytes::Bytes;

use crate::handle::{S3Bucket, S3Object, key_of};

/// Content type recorded on bucket marker objects
const MARKER_CONTENT_TYPE: &str = "application/x-directory";

/// Backend storing the tree in one S3 bucket
pub struct S3Backend {
    inner: aws_sdk_s3::Client,
    bucket: String,
    retry: RetryConfig,
}

impl S3Backend {
    /// Create a backend from connection settings
    pub async fn new(config: &S3Config, retry: RetryConfig) -> BackendResult<Self> {
        if config.bucket.is_empty() {
            return Err(BackendError::Other("S3 bucket name cannot be empty".into()));
        }

        // Build credentials provider
        let credentials = aws_credential_types::Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None, // session token
            None, // expiry
            "bf-static-credentials",
        );

        // Build SDK config
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(aws_config::Region::new(config.region.clone()))
            .endpoint_url(&config.endpoint)
            .load()
            .await;

        // Path-style addressing unless DNS lookup is requested
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.bucket_lookup == "path" || config.bucket_lookup == "auto")
            .build();

        tracing::debug!(
            endpoint = %config.endpoint,
            bucket = %config.bucket,
            "Configured S3 backend"
        );

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            retry,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }

    /// Name of the physical bucket
    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Create the physical bucket if it does not exist yet
    pub async fn ensure_bucket(&self) -> BackendResult<()> {
        let (client, bucket) = (&self.inner, self.bucket.as_str());

        let exists = retry_with_backoff(
            &self.retry,
            || async move {
                match client.head_bucket().bucket(bucket).send().await {
                    Ok(_) => Ok(true),
                    Err(e) => match map_sdk_error(&e, bucket) {
                        BackendError::NotFound(_) => Ok(false),
                        other => Err(other),
                    },
                }
            },
            BackendError::is_retryable,
        )
        .await?;

        if exists {
            return Ok(());
        }

        tracing::info!(bucket = %bucket, "Creating S3 bucket");
        retry_with_backoff(
            &self.retry,
            || async move {
                client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| map_sdk_error(&e, bucket))
            },
            BackendError::is_retryable,
        )
        .await
    }

    /// Whether an object exists at exactly `key`
    async fn key_exists(&self, key: &str) -> BackendResult<bool> {
        let (client, bucket) = (&self.inner, self.bucket.as_str());
        retry_with_backoff(
            &self.retry,
            || async move {
                match client.head_object().bucket(bucket).key(key).send().await {
                    Ok(_) => Ok(true),
                    Err(e) => match map_sdk_error(&e, key) {
                        BackendError::NotFound(_) => Ok(false),
                        other => Err(other),
                    },
                }
            },
            BackendError::is_retryable,
        )
        .await
    }

    /// Up to `max` keys under `prefix`, without a delimiter
    async fn keys_under(&self, prefix: &str, max: i32) -> BackendResult<Vec<String>> {
        let (client, bucket) = (&self.inner, self.bucket.as_str());
        retry_with_backoff(
            &self.retry,
            || async move {
                let response = client
                    .list_objects_v2()
                    .bucket(bucket)
                    .prefix(prefix)
                    .max_keys(max)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(&e, prefix))?;
                Ok(response
                    .contents()
                    .iter()
                    .filter_map(|o| o.key().map(str::to_string))
                    .collect())
            },
            BackendError::is_retryable,
        )
        .await
    }

    /// A bucket exists if its marker does, or if any key sits below it
    async fn bucket_exists(&self, bucket: &S3Bucket) -> BackendResult<bool> {
        let Some(marker) = bucket.marker() else {
            return Ok(true);
        };
        if self.key_exists(marker).await? {
            return Ok(true);
        }
        Ok(!self.keys_under(marker, 1).await?.is_empty())
    }

    async fn put(&self, key: &str, body: Bytes, content_type: &str) -> BackendResult<()> {
        let (client, bucket) = (&self.inner, self.bucket.as_str());
        retry_with_backoff(
            &self.retry,
            || {
                let body = ByteStream::from(body.clone());
                async move {
                    client
                        .put_object()
                        .bucket(bucket)
                        .key(key)
                        .content_type(content_type)
                        .body(body)
                        .send()
                        .await
                        .map(|_| ())
                        .map_err(|e| map_sdk_error(&e, key))
                }
            },
            BackendError::is_retryable,
        )
        .await
    }

    async fn remove(&self, key: &str) -> BackendResult<()> {
        let (client, bucket) = (&self.inner, self.bucket.as_str());
        retry_with_backoff(
            &self.retry,
            || async move {
                client
                    .delete_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map(|_| ())
                    .map_err(|e| map_sdk_error(&e, key))
            },
            BackendError::is_retryable,
        )
        .await
    }

    /// Fail with a conflict if `id` or any of its ancestors is an object
    async fn check_lineage(&self, id: &ResourceId) -> BackendResult<()> {
        let mut current = id.clone();
        while !current.is_top() {
            if self.key_exists(&key_of(&current)).await? {
                return Err(BackendError::Conflict(format!(
                    "{current} already exists as an object"
                )));
            }
            current = current.parent();
        }
        Ok(())
    }
}

impl std::fmt::Debug for S3Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Backend")
            .field("bucket", &self.bucket)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

/// Format AWS SDK error into a detailed error message
fn format_sdk_error<E: std::fmt::Display>(error: &SdkError<E>) -> String {
    match error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let meta = service_err.raw();
            let mut msg = format!("Service error: {} (status: {})", err, meta.status().as_u16());
            if let Some(code) = meta.headers().get("x-amz-error-code")
                && let Ok(code_str) = std::str::from_utf8(code.as_bytes())
            {
                msg.push_str(&format!(" (code: {})", code_str));
            }
            msg
        }
        SdkError::ConstructionFailure(err) => {
            format!("Request construction failed: {:?}", err)
        }
        SdkError::TimeoutError(_) => "Request timeout".to_string(),
        SdkError::DispatchFailure(err) => {
            format!("Network dispatch error: {:?}", err)
        }
        SdkError::ResponseError(err) => {
            format!("Response error: {:?}", err)
        }
        _ => error.to_string(),
    }
}

/// Map an SDK failure on `subject` to a backend error
fn map_sdk_error<E: std::fmt::Display>(error: &SdkError<E>, subject: &str) -> BackendError {
    if let SdkError::ServiceError(service_err) = error
        && service_err.raw().status().as_u16() == 404
    {
        return BackendError::NotFound(subject.to_string());
    }

    let msg = format_sdk_error(error);
    if msg.contains("NoSuchKey") || msg.contains("NotFound") || msg.contains("NoSuchBucket") {
        BackendError::NotFound(subject.to_string())
    } else {
        BackendError::Network(msg)
    }
}

#[async_trait]
impl Backend for S3Backend {
    type Bucket = S3Bucket;
    type Object = S3Object;

    fn is_local(&self) -> bool {
        false
    }

    async fn is_bucket(&self, id: &ResourceId) -> bool {
        match self.bucket_exists(&S3Bucket::from(id.clone())).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Bucket probe failed");
                false
            }
        }
    }

    async fn is_object(&self, id: &ResourceId) -> bool {
        if id.is_top() {
            return false;
        }
        match self.key_exists(&key_of(id)).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "Object probe failed");
                false
            }
        }
    }

    async fn create_bucket(&self, bucket: &S3Bucket) -> BackendResult<()> {
        let Some(marker) = bucket.marker() else {
            return Ok(());
        };
        self.check_lineage(bucket.id()).await?;
        if self.key_exists(marker).await? {
            return Ok(());
        }
        self.put(marker, Bytes::new(), MARKER_CONTENT_TYPE).await
    }

    async fn read_bucket(&self, bucket: &S3Bucket) -> BackendResult<Vec<Entry>> {
        if !self.bucket_exists(bucket).await? {
            return Err(BackendError::NotFound(bucket.id().to_string()));
        }

        let (client, name, prefix) = (&self.inner, self.bucket.as_str(), bucket.prefix());
        let mut entries = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let token = continuation_token.as_deref();
            let response = retry_with_backoff(
                &self.retry,
                || async move {
                    let mut request = client
                        .list_objects_v2()
                        .bucket(name)
                        .prefix(prefix)
                        .delimiter("/");
                    if let Some(token) = token {
                        request = request.continuation_token(token);
                    }
                    request
                        .send()
                        .await
                        .map_err(|e| map_sdk_error(&e, prefix))
                },
                BackendError::is_retryable,
            )
            .await?;

            // Common prefixes are child buckets
            for common in response.common_prefixes() {
                if let Some(id) = common.prefix().and_then(|p| bucket.child_id(p)) {
                    entries.push(Entry::bucket(id));
                }
            }

            // Contents are child objects; the bucket's own marker is skipped
            for object in response.contents() {
                let Some(key) = object.key() else { continue };
                if key == prefix || key.ends_with('/') {
                    continue;
                }
                if let Some(id) = bucket.child_id(key) {
                    let size = object.size().unwrap_or(0).max(0) as u64;
                    entries.push(Entry::object(id, size));
                }
            }

            continuation_token = match response.next_continuation_token() {
                Some(next) if response.is_truncated().unwrap_or(false) => Some(next.to_string()),
                _ => break,
            };
        }

        entries.sort_by(|a, b| a.id.cmp(&b.id));
        entries.dedup_by(|a, b| a.id == b.id);
        Ok(entries)
    }

    async fn delete_bucket(&self, bucket: &S3Bucket) -> BackendResult<()> {
        let id = bucket.id();
        let Some(marker) = bucket.marker() else {
            return Err(BackendError::Conflict(format!(
                "cannot delete top-level bucket {id}"
            )));
        };
        if !self.bucket_exists(bucket).await? {
            return Err(BackendError::NotFound(id.to_string()));
        }

        let keys = self.keys_under(marker, 2).await?;
        if keys.iter().any(|key| key != marker) {
            return Err(BackendError::Conflict(format!("bucket {id} is not empty")));
        }

        self.remove(marker).await
    }

    async fn create_object(&self, object: &S3Object, value: Bytes) -> BackendResult<()> {
        let id = object.id();
        if id.is_top() || self.bucket_exists(&S3Bucket::from(id.clone())).await? {
            return Err(BackendError::Conflict(format!("{id} is a bucket")));
        }
        let parent = S3Bucket::from(id.parent());
        if !self.bucket_exists(&parent).await? {
            return Err(BackendError::NotFound(parent.id().to_string()));
        }

        let content_type = object.content_type();
        tracing::debug!(key = %object.key(), content_type = %content_type, "put_object");
        self.put(object.key(), value, &content_type).await
    }

    async fn read_object(&self, object: &S3Object) -> BackendResult<Bytes> {
        let id = object.id();
        if id.is_top() {
            return Err(BackendError::NotFound(id.to_string()));
        }

        let (client, bucket, key) = (&self.inner, self.bucket.as_str(), object.key());
        retry_with_backoff(
            &self.retry,
            || async move {
                let response = client
                    .get_object()
                    .bucket(bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| match map_sdk_error(&e, key) {
                        BackendError::NotFound(_) => BackendError::NotFound(id.to_string()),
                        other => other,
                    })?;

                let data = response
                    .body
                    .collect()
                    .await
                    .map_err(|e| BackendError::Network(e.to_string()))?
                    .into_bytes();
                Ok(data)
            },
            BackendError::is_retryable,
        )
        .await
    }

    async fn delete_object(&self, object: &S3Object) -> BackendResult<()> {
        let id = object.id();
        // S3 deletes are idempotent, so absence has to be checked first
        if id.is_top() || !self.key_exists(object.key()).await? {
            return Err(BackendError::NotFound(id.to_string()));
        }
        self.remove(object.key()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> S3Config {
        S3Config::new("http://localhost:9000", "access", "secret", "bf-test")
    }

    #[tokio::test]
    async fn test_backend_is_remote() {
        let backend = S3Backend::new(&config(), RetryConfig::default())
            .await
            .unwrap();
        assert!(!backend.is_local());
        assert_eq!(backend.bucket(), "bf-test");
    }

    #[tokio::test]
    async fn test_empty_bucket_name_is_rejected() {
        let mut config = config();
        config.bucket.clear();
        let result = S3Backend::new(&config, RetryConfig::default()).await;
        assert!(matches!(result, Err(BackendError::Other(_))));
    }

    #[tokio::test]
    async fn test_top_level_probes_need_no_requests() {
        let backend = S3Backend::new(&config(), RetryConfig::default())
            .await
            .unwrap();
        assert!(backend.is_bucket(&ResourceId::new("/")).await);
        assert!(!backend.is_object(&ResourceId::new("/")).await);
        assert!(matches!(
            backend.delete_bucket(&S3Bucket::from(ResourceId::new("/"))).await,
            Err(BackendError::Conflict(_))
        ));
        backend
            .create_bucket(&S3Bucket::from(ResourceId::new("/")))
            .await
            .unwrap();
    }
}
