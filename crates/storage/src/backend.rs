//! Backend object stores.

use crate::error::BackendError;
use crate::gateway::StorageObject;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

/// Header carrying the access key on gateway requests.
const ACCESS_KEY_HEADER: &str = "X-Access-Key";
/// Header carrying the access secret on gateway requests.
const ACCESS_SECRET_HEADER: &str = "X-Access-Secret";

/// The backend seam behind the storage gateway.
///
/// Implementations retrieve raw object bytes by key. Timeouts,
/// concurrency limits, and circuit breaking are the gateway's job;
/// stores only translate backend responses into [`BackendError`]s.
pub trait ObjectStore: Send + Sync {
    /// Fetch the object stored under `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<StorageObject, BackendError>> + Send;
}

/// Object store over an S3-style HTTP gateway.
///
/// Objects live at `{endpoint}/{bucket}/{key}`; credentials, when
/// configured, travel as request headers.
pub struct HttpObjectStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    access_key: Option<String>,
    secret_key: Option<String>,
    timeout: Duration,
}

impl HttpObjectStore {
    /// Build a store for `bucket` behind `endpoint`.
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        access_key: Option<String>,
        secret_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Unknown(format!("http client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            bucket: bucket.into(),
            access_key,
            secret_key,
            timeout,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.endpoint.trim_end_matches('/'),
            self.bucket,
            key.trim_start_matches('/')
        )
    }
}

impl ObjectStore for HttpObjectStore {
    async fn get(&self, key: &str) -> Result<StorageObject, BackendError> {
        let url = self.object_url(key);
        let mut request = self.client.get(&url);
        if let Some(access_key) = &self.access_key {
            request = request.header(ACCESS_KEY_HEADER, access_key);
        }
        if let Some(secret_key) = &self.secret_key {
            request = request.header(ACCESS_SECRET_HEADER, secret_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::Timeout { after: self.timeout }
            } else {
                BackendError::Unknown(format!("request failed: {e}"))
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(BackendError::NotFound {
                key: key.to_string(),
            }),
            status if !status.is_success() => Err(BackendError::Unknown(format!(
                "backend returned status {status}"
            ))),
            _ => {
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let data = response.bytes().await.map_err(|e| {
                    if e.is_timeout() {
                        BackendError::Timeout { after: self.timeout }
                    } else {
                        BackendError::Unknown(format!("reading body: {e}"))
                    }
                })?;
                debug!(key, bytes = data.len(), "object fetched");
                Ok(StorageObject { data, content_type })
            }
        }
    }
}
