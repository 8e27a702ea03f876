//! S3-backed content store

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};

use super::{ContentStore, StoreError};

#[derive(Clone)]
pub struct S3ContentStore {
    client: Client,
    bucket: String,
}

impl S3ContentStore {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Build a client from the default AWS credential chain
    pub async fn from_env(bucket: impl Into<String>) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&aws_config), bucket)
    }

    fn copy_source(&self, key: &str) -> String {
        format!("{}/{}", self.bucket, encode_key(key))
    }
}

#[async_trait]
impl ContentStore for S3ContentStore {
    fn location(&self) -> &str {
        &self.bucket
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => match classify(path, e) {
                StoreError::NotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        self.client
            .copy_object()
            .bucket(&self.bucket)
            .copy_source(self.copy_source(from))
            .key(to)
            .send()
            .await
            .map_err(|e| classify(from, e))?;
        tracing::debug!(bucket = %self.bucket, from, to, "S3 object copied");
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| classify(path, e))?;
        Ok(())
    }

    async fn list(&self, folder: &str) -> Result<Vec<String>, StoreError> {
        let folder = folder.trim_end_matches('/');
        let prefix = if folder.is_empty() {
            String::new()
        } else {
            format!("{folder}/")
        };

        let mut keys = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .delimiter("/")
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(|e| classify(folder, e))?;

            keys.extend(
                output
                    .contents()
                    .iter()
                    .filter_map(|obj| obj.key().map(str::to_owned)),
            );

            match output.next_continuation_token() {
                Some(next) if output.is_truncated().unwrap_or(false) => {
                    token = Some(next.to_owned())
                }
                _ => break,
            }
        }

        Ok(keys)
    }

    async fn get(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| classify(path, e))?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Unavailable(format!("read body of {path}: {e}")))?;
        Ok(bytes.into_bytes().to_vec())
    }
}

/// Map an SDK failure onto the store taxonomy
fn classify<E>(path: &str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.code().map(str::to_owned);
    let message = DisplayErrorContext(&err).to_string();

    match &err {
        SdkError::TimeoutError(_) => return StoreError::Timeout(message),
        SdkError::DispatchFailure(_) => return StoreError::Unavailable(message),
        _ => {}
    }

    match (code.as_deref(), status) {
        (Some("NoSuchKey" | "NotFound"), _) | (_, Some(404)) => StoreError::NotFound {
            path: path.to_string(),
        },
        (
            Some(
                "SlowDown"
                | "Throttling"
                | "ThrottlingException"
                | "RequestLimitExceeded"
                | "TooManyRequestsException",
            ),
            _,
        )
        | (_, Some(429)) => StoreError::Throttled(message),
        (Some("InternalError" | "ServiceUnavailable" | "RequestTimeout"), _)
        | (_, Some(500 | 502 | 503 | 504)) => StoreError::Unavailable(message),
        _ => StoreError::Fatal(message),
    }
}

/// Percent-encode a key for the `x-amz-copy-source` header, keeping `/`
fn encode_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_key() {
        assert_eq!(
            encode_key("approved/blue/2024/03/02/IMG_0001.jpg"),
            "approved/blue/2024/03/02/IMG_0001.jpg"
        );
        assert_eq!(encode_key("new/my photo+1.jpg"), "new/my%20photo%2B1.jpg");
        assert_eq!(encode_key("new/été.jpg"), "new/%C3%A9t%C3%A9.jpg");
    }
}
