//! Storage gateway: breaker-guarded fetches with telemetry.

use crate::backend::{HttpObjectStore, ObjectStore};
use crate::breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::error::{BackendError, ConfigError};
use bytes::Bytes;
use prism_telemetry::{noop_sink, MetricUpdate, TelemetrySink};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use uuid::Uuid;

/// Metric scope for gateway telemetry.
const STORAGE_SCOPE: &str = "storage";

/// A fetched object: raw bytes plus the backend's content type, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    /// Raw object bytes
    pub data: Bytes,
    /// Content type reported by the backend
    pub content_type: Option<String>,
}

/// Ordered-options builder for [`StorageGateway`].
///
/// Later options win over earlier ones for the same field. `build`
/// validates the accumulated options and freezes them; the resulting
/// gateway is immutable and shared read-only across fetches.
#[derive(Debug, Clone, Default)]
pub struct GatewayBuilder {
    bucket_name: Option<String>,
    bucket_region: Option<String>,
    endpoint: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    breaker: Option<CircuitBreakerConfig>,
}

impl GatewayBuilder {
    /// Start with no options set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket holding the objects. Required.
    #[must_use]
    pub fn with_bucket_name(mut self, name: impl Into<String>) -> Self {
        self.bucket_name = Some(name.into());
        self
    }

    /// Bucket region; used to derive the endpoint when none is given.
    #[must_use]
    pub fn with_bucket_region(mut self, region: impl Into<String>) -> Self {
        self.bucket_region = Some(region.into());
        self
    }

    /// Explicit backend endpoint, overriding region derivation.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Access key sent on every backend request.
    #[must_use]
    pub fn with_access_key(mut self, key: impl Into<String>) -> Self {
        self.access_key = Some(key.into());
        self
    }

    /// Access secret sent on every backend request.
    #[must_use]
    pub fn with_secret_key(mut self, key: impl Into<String>) -> Self {
        self.secret_key = Some(key.into());
        self
    }

    /// Circuit breaker configuration for the fetch command.
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = Some(config);
        self
    }

    /// Validate the options and build a gateway over an HTTP store.
    pub fn build(self) -> Result<StorageGateway<HttpObjectStore>, ConfigError> {
        let bucket = match self.bucket_name.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => return Err(ConfigError::MissingField("bucket_name")),
        };
        let endpoint = match (self.endpoint.clone(), self.bucket_region.as_deref()) {
            (Some(endpoint), _) if !endpoint.is_empty() => endpoint,
            (_, Some(region)) if !region.is_empty() => {
                format!("https://s3.{region}.amazonaws.com")
            }
            _ => return Err(ConfigError::MissingField("endpoint")),
        };

        let breaker = self.breaker.clone().unwrap_or_default();
        validate_breaker(&breaker)?;

        let store = HttpObjectStore::new(
            endpoint,
            bucket,
            self.access_key.clone(),
            self.secret_key.clone(),
            breaker.timeout,
        )
        .map_err(|e| ConfigError::InvalidValue {
            field: "endpoint",
            reason: e.to_string(),
        })?;

        self.build_with_store(store)
    }

    /// Validate the options and build a gateway over a caller-supplied
    /// store. Backend addressing options are ignored; the store already
    /// knows where its objects live.
    pub fn build_with_store<S: ObjectStore>(
        self,
        store: S,
    ) -> Result<StorageGateway<S>, ConfigError> {
        let breaker = self.breaker.unwrap_or_default();
        validate_breaker(&breaker)?;
        Ok(StorageGateway {
            store,
            breaker: Arc::new(CircuitBreaker::new(breaker)),
            sink: noop_sink(),
        })
    }
}

fn validate_breaker(config: &CircuitBreakerConfig) -> Result<(), ConfigError> {
    if config.command.is_empty() {
        return Err(ConfigError::MissingField("breaker.command"));
    }
    if config.timeout.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: "breaker.timeout",
            reason: "must be non-zero".to_string(),
        });
    }
    if config.max_concurrent == 0 {
        return Err(ConfigError::InvalidValue {
            field: "breaker.max_concurrent",
            reason: "must be at least 1".to_string(),
        });
    }
    if !(1..=100).contains(&config.error_threshold_percentage) {
        return Err(ConfigError::InvalidValue {
            field: "breaker.error_threshold_percentage",
            reason: format!(
                "must be between 1 and 100, got {}",
                config.error_threshold_percentage
            ),
        });
    }
    if config.request_volume_threshold == 0 {
        return Err(ConfigError::InvalidValue {
            field: "breaker.request_volume_threshold",
            reason: "must be at least 1".to_string(),
        });
    }
    // The breaker buckets outcomes by whole seconds
    if config.rolling_window < Duration::from_secs(1) {
        return Err(ConfigError::InvalidValue {
            field: "breaker.rolling_window",
            reason: format!(
                "must be at least 1s, got {:?}",
                config.rolling_window
            ),
        });
    }
    if config.sleep_window.is_zero() {
        return Err(ConfigError::InvalidValue {
            field: "breaker.sleep_window",
            reason: "must be non-zero".to_string(),
        });
    }
    Ok(())
}

/// Breaker-guarded object fetches against one backend.
pub struct StorageGateway<S = HttpObjectStore> {
    store: S,
    breaker: Arc<CircuitBreaker>,
    sink: Arc<dyn TelemetrySink>,
}

impl<S: ObjectStore> StorageGateway<S> {
    /// Attach a telemetry sink for fetch counters and durations.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Fetch the object stored under `key` through the circuit breaker.
    pub async fn fetch(&self, key: &str) -> Result<StorageObject, BackendError> {
        let request_id = Uuid::new_v4();
        debug!(%request_id, key, command = self.breaker.command(), "fetching object");

        self.sink
            .update(MetricUpdate::count(STORAGE_SCOPE, "fetch.requests", 1));
        let start = Instant::now();
        let result = self.breaker.call(|| self.store.get(key)).await;
        self.sink.update(MetricUpdate::duration(
            STORAGE_SCOPE,
            "fetch.duration",
            start.elapsed(),
        ));

        match &result {
            Ok(object) => {
                self.sink
                    .update(MetricUpdate::count(STORAGE_SCOPE, "fetch.success", 1));
                debug!(%request_id, key, bytes = object.data.len(), "fetch succeeded");
            }
            Err(e) => {
                self.sink.update(MetricUpdate::count(
                    STORAGE_SCOPE,
                    format!("fetch.error.{}", e.kind()),
                    1,
                ));
                warn!(%request_id, key, error = %e, "fetch failed");
            }
        }
        result
    }

    /// Fetch, abandoning the request when `cancel` resolves first.
    ///
    /// Cancellation surfaces as [`BackendError::Cancelled`] and is not
    /// recorded against the breaker's failure ratio.
    pub async fn fetch_cancellable(
        &self,
        key: &str,
        cancel: impl Future<Output = ()>,
    ) -> Result<StorageObject, BackendError> {
        tokio::select! {
            result = self.fetch(key) => result,
            () = cancel => {
                self.sink.update(MetricUpdate::count(
                    STORAGE_SCOPE,
                    "fetch.error.cancelled",
                    1,
                ));
                debug!(key, "fetch cancelled by caller");
                Err(BackendError::Cancelled)
            }
        }
    }

    /// Current state of the guarding circuit.
    #[must_use]
    pub fn circuit_state(&self) -> CircuitState {
        self.breaker.state()
    }

    /// The breaker guarding this gateway's fetches.
    #[must_use]
    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }
}
