//! Rolling-window circuit breaker.
//!
//! State machine per named command:
//! - Closed: requests pass through; outcomes land in a rolling window.
//! - Open: entered when the failure percentage over the window crosses
//!   the configured threshold (once the window holds the minimum request
//!   volume); every call short-circuits until the sleep window elapses.
//! - Half-Open: exactly one probe is let through; its outcome decides
//!   whether the circuit closes (counters reset) or re-opens (sleep
//!   window restarts).
//!
//! Critical sections cover counter updates and state transitions only;
//! the guarded operation itself runs outside every lock.

use crate::BackendError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Circuit breaker configuration, scoped to one command name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Command name; breakers with different names never share counters
    pub command: String,
    /// Per-call timeout for the guarded operation
    pub timeout: Duration,
    /// Maximum simultaneously running guarded calls
    pub max_concurrent: u32,
    /// Failure percentage (1-100) that trips the circuit
    pub error_threshold_percentage: u8,
    /// Minimum requests in the window before the threshold is evaluated
    pub request_volume_threshold: u32,
    /// Width of the rolling outcome window
    pub rolling_window: Duration,
    /// How long an open circuit rejects before probing
    pub sleep_window: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            command: "storage.fetch".to_string(),
            timeout: Duration::from_secs(5),
            max_concurrent: 100,
            error_threshold_percentage: 50,
            request_volume_threshold: 20,
            rolling_window: Duration::from_secs(10),
            sleep_window: Duration::from_secs(5),
        }
    }
}

impl CircuitBreakerConfig {
    /// Config for a differently named command, other fields defaulted.
    #[must_use]
    pub fn named(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests pass through
    Closed,
    /// Requests short-circuit to `CircuitOpen`
    Open,
    /// One probe request is in flight
    HalfOpen,
}

/// Per-second outcome bucket inside the rolling window.
struct Bucket {
    at: u64,
    successes: u32,
    failures: u32,
}

/// Rolling window of request outcomes, bucketed by second.
#[derive(Default)]
struct Window {
    buckets: VecDeque<Bucket>,
}

impl Window {
    fn record(&mut self, now: u64, ok: bool) {
        match self.buckets.back_mut() {
            Some(bucket) if bucket.at == now => {
                if ok {
                    bucket.successes += 1;
                } else {
                    bucket.failures += 1;
                }
            }
            _ => self.buckets.push_back(Bucket {
                at: now,
                successes: u32::from(ok),
                failures: u32::from(!ok),
            }),
        }
    }

    fn prune(&mut self, now: u64, width_secs: u64) {
        while let Some(front) = self.buckets.front() {
            if front.at + width_secs <= now {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    /// Total and failed request counts within the window.
    fn totals(&mut self, now: u64, width_secs: u64) -> (u64, u64) {
        self.prune(now, width_secs);
        let mut total = 0u64;
        let mut failures = 0u64;
        for bucket in &self.buckets {
            total += u64::from(bucket.successes) + u64::from(bucket.failures);
            failures += u64::from(bucket.failures);
        }
        (total, failures)
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }
}

/// Circuit breaker guarding one named command.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    /// Rolling window width in whole seconds, at least 1
    window_secs: u64,
    state: RwLock<CircuitState>,
    window: Mutex<Window>,
    /// Milliseconds since `started` when the circuit last opened
    opened_at: AtomicU64,
    in_flight: AtomicU32,
    probe_in_flight: AtomicBool,
    started: Instant,
}

/// Outcome of admission control for one call.
enum Admission {
    /// Circuit closed; the request passes through
    Pass,
    /// This caller carries the half-open probe
    Probe,
    /// Short-circuit without touching the backend
    Rejected,
}

/// Releases one in-flight slot on drop, including when the guarded
/// future is cancelled mid-flight.
struct InFlightGuard<'a> {
    breaker: &'a CircuitBreaker,
    entered: u32,
}

impl<'a> InFlightGuard<'a> {
    fn enter(breaker: &'a CircuitBreaker) -> Self {
        let entered = breaker.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        Self { breaker, entered }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.breaker.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Releases the probe slot on drop unless the probe's outcome was
/// recorded first; a cancelled probe must not wedge the half-open state.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl<'a> ProbeGuard<'a> {
    fn new(breaker: &'a CircuitBreaker) -> Self {
        Self {
            breaker,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.probe_in_flight.store(false, Ordering::SeqCst);
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker for `config`.
    ///
    /// The rolling window is bucketed by whole seconds; a sub-second
    /// `rolling_window` rounds up to one second.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        let window_secs = config.rolling_window.as_secs().max(1);
        Self {
            config,
            window_secs,
            state: RwLock::new(CircuitState::Closed),
            window: Mutex::new(Window::default()),
            opened_at: AtomicU64::new(0),
            in_flight: AtomicU32::new(0),
            probe_in_flight: AtomicBool::new(false),
            started: Instant::now(),
        }
    }

    /// The command name this breaker guards.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.config.command
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap()
    }

    /// Run a guarded operation through the breaker.
    ///
    /// Short-circuits to [`BackendError::CircuitOpen`] while the circuit
    /// is open (or when a half-open probe is already in flight), bounds
    /// the operation with the configured timeout, enforces the
    /// concurrency ceiling, and records the outcome in the rolling
    /// window. `NotFound` and `Cancelled` outcomes are not backend
    /// health signals and record as successes.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, BackendError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, BackendError>>,
    {
        // Slots are released by guard drops, so a caller that abandons
        // this future mid-flight cannot leak capacity or the probe.
        let mut probe = match self.admit() {
            Admission::Rejected => {
                return Err(BackendError::CircuitOpen {
                    command: self.config.command.clone(),
                })
            }
            Admission::Pass => None,
            Admission::Probe => Some(ProbeGuard::new(self)),
        };

        let in_flight = InFlightGuard::enter(self);
        if in_flight.entered > self.config.max_concurrent {
            self.record_failure();
            if let Some(probe) = probe.as_mut() {
                probe.disarm();
            }
            return Err(BackendError::Unknown(
                "too many in-flight requests".to_string(),
            ));
        }

        let result = match tokio::time::timeout(self.config.timeout, f()).await {
            Ok(result) => result,
            Err(_) => Err(BackendError::Timeout {
                after: self.config.timeout,
            }),
        };
        drop(in_flight);

        match &result {
            Err(e) if e.counts_as_failure() => self.record_failure(),
            _ => self.record_success(),
        }
        // The recording above resolved the probe's outcome
        if let Some(probe) = probe.as_mut() {
            probe.disarm();
        }

        result
    }

    /// Record a successful (or health-neutral) outcome.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                let now = self.elapsed_secs();
                let mut window = self.window.lock().unwrap();
                window.record(now, true);
                window.prune(now, self.window_secs);
            }
            CircuitState::HalfOpen => {
                let mut state = self.state.write().unwrap();
                if *state == CircuitState::HalfOpen {
                    *state = CircuitState::Closed;
                    self.window.lock().unwrap().clear();
                    self.probe_in_flight.store(false, Ordering::SeqCst);
                    debug!(command = %self.config.command, "probe succeeded, circuit closed");
                }
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed outcome.
    pub fn record_failure(&self) {
        match self.state() {
            CircuitState::Closed => {
                let now = self.elapsed_secs();
                let (total, failures) = {
                    let mut window = self.window.lock().unwrap();
                    window.record(now, false);
                    window.totals(now, self.window_secs)
                };
                if total >= u64::from(self.config.request_volume_threshold)
                    && failures * 100 >= u64::from(self.config.error_threshold_percentage) * total
                {
                    self.trip();
                }
            }
            CircuitState::HalfOpen => self.trip(),
            CircuitState::Open => {}
        }
    }

    /// Force the breaker back to closed with empty counters.
    pub fn reset(&self) {
        let mut state = self.state.write().unwrap();
        *state = CircuitState::Closed;
        self.window.lock().unwrap().clear();
        self.probe_in_flight.store(false, Ordering::SeqCst);
    }

    fn trip(&self) {
        let mut state = self.state.write().unwrap();
        if *state != CircuitState::Open {
            *state = CircuitState::Open;
            self.opened_at
                .store(self.started.elapsed().as_millis() as u64, Ordering::SeqCst);
            self.probe_in_flight.store(false, Ordering::SeqCst);
            warn!(
                command = %self.config.command,
                sleep_window_ms = self.config.sleep_window.as_millis() as u64,
                "circuit opened"
            );
        }
    }

    fn admit(&self) -> Admission {
        match self.state() {
            CircuitState::Closed => Admission::Pass,
            CircuitState::Open => {
                if self.since_opened() < self.config.sleep_window {
                    return Admission::Rejected;
                }
                let mut state = self.state.write().unwrap();
                if *state == CircuitState::Open {
                    // This caller becomes the probe
                    *state = CircuitState::HalfOpen;
                    self.probe_in_flight.store(true, Ordering::SeqCst);
                    warn!(command = %self.config.command, "circuit half-open, probing");
                    Admission::Probe
                } else {
                    drop(state);
                    self.try_probe()
                }
            }
            CircuitState::HalfOpen => self.try_probe(),
        }
    }

    fn try_probe(&self) -> Admission {
        let taken = self.state() == CircuitState::HalfOpen
            && self
                .probe_in_flight
                .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok();
        if taken {
            Admission::Probe
        } else {
            Admission::Rejected
        }
    }

    fn since_opened(&self) -> Duration {
        let opened_ms = self.opened_at.load(Ordering::SeqCst);
        self.started
            .elapsed()
            .saturating_sub(Duration::from_millis(opened_ms))
    }

    fn elapsed_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Breakers keyed by command name.
///
/// Independent commands never share failure counters; the registry hands
/// out one breaker per name, creating it from the supplied config on
/// first use.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The breaker for `config.command`, created on first use.
    #[must_use]
    pub fn breaker(&self, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().unwrap().get(&config.command) {
            return breaker.clone();
        }
        let mut breakers = self.breakers.write().unwrap();
        breakers
            .entry(config.command.clone())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(config.clone())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            command: "test.fetch".to_string(),
            timeout: Duration::from_millis(200),
            max_concurrent: 10,
            error_threshold_percentage: 50,
            request_volume_threshold: 4,
            rolling_window: Duration::from_secs(10),
            sleep_window: Duration::from_millis(50),
        }
    }

    async fn ok_op() -> Result<u8, BackendError> {
        Ok(1)
    }

    async fn fail_op() -> Result<u8, BackendError> {
        Err(BackendError::Unknown("backend down".to_string()))
    }

    #[tokio::test]
    async fn test_starts_closed_and_passes_calls() {
        let breaker = CircuitBreaker::new(test_config());
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_opens_once_threshold_and_volume_met() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..2 {
            let _ = breaker.call(ok_op).await;
        }
        for _ in 0..2 {
            let _ = breaker.call(fail_op).await;
        }
        // 2 failures / 4 requests = 50% >= threshold
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_stays_closed_below_request_volume() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..3 {
            let _ = breaker.call(fail_op).await;
        }
        // 100% failures but only 3 requests < volume threshold of 4
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_not_found_does_not_count_as_failure() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..8 {
            let result = breaker
                .call(|| async {
                    Err::<u8, _>(BackendError::NotFound {
                        key: "missing".to_string(),
                    })
                })
                .await;
            assert!(matches!(result, Err(BackendError::NotFound { .. })));
        }
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_open_short_circuits_without_touching_backend() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        let calls = AtomicUsize::new(0);
        let result = breaker
            .call(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1u8)
            })
            .await;
        assert!(matches!(result, Err(BackendError::CircuitOpen { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_probe_success_closes_circuit() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);

        // Counters were reset: old failures no longer poison the window
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_probe_failure_reopens_circuit() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let result = breaker.call(fail_op).await;
        assert!(matches!(result, Err(BackendError::Unknown(_))));
        assert_eq!(breaker.state(), CircuitState::Open);

        // Sleep window restarted: immediate retry short-circuits
        let result = breaker.call(ok_op).await;
        assert!(matches!(result, Err(BackendError::CircuitOpen { .. })));
    }

    #[tokio::test]
    async fn test_exactly_one_probe_after_sleep_window() {
        let breaker = Arc::new(CircuitBreaker::new(test_config()));
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        let slow_probe = breaker.call(|| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(1u8)
        });
        let rejected = breaker.call(ok_op);

        let (probe_result, rejected_result) = tokio::join!(slow_probe, rejected);
        assert_eq!(probe_result.unwrap(), 1);
        assert!(matches!(
            rejected_result,
            Err(BackendError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_maps_and_counts_as_failure() {
        let config = CircuitBreakerConfig {
            timeout: Duration::from_millis(20),
            ..test_config()
        };
        let breaker = CircuitBreaker::new(config);

        let result = breaker
            .call(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(1u8)
            })
            .await;
        assert!(matches!(result, Err(BackendError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_concurrency_ceiling_rejects_excess_calls() {
        let config = CircuitBreakerConfig {
            max_concurrent: 1,
            ..test_config()
        };
        let breaker = Arc::new(CircuitBreaker::new(config));

        let slow = breaker.call(|| async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            Ok(1u8)
        });
        let crowded = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            breaker.call(ok_op).await
        };

        let (slow_result, crowded_result) = tokio::join!(slow, crowded);
        assert_eq!(slow_result.unwrap(), 1);
        assert!(matches!(crowded_result, Err(BackendError::Unknown(_))));
    }

    #[tokio::test]
    async fn test_abandoned_call_releases_in_flight_slot() {
        let config = CircuitBreakerConfig {
            max_concurrent: 1,
            ..test_config()
        };
        let breaker = CircuitBreaker::new(config);

        // Caller walks away mid-flight, dropping the guarded future
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            breaker.call(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(1u8)
            }),
        )
        .await;
        assert!(abandoned.is_err());

        // The slot came back; a fresh call is not load-shed
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_abandoned_probe_releases_probe_slot() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        tokio::time::sleep(Duration::from_millis(60)).await;

        // The probe is dropped before the backend answers
        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            breaker.call(|| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(1u8)
            }),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);

        // The next call takes over as the probe and closes the circuit
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
        assert_eq!(breaker.state(), CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_sub_second_window_rounds_up_and_still_trips() {
        let config = CircuitBreakerConfig {
            rolling_window: Duration::from_millis(500),
            ..test_config()
        };
        let breaker = CircuitBreaker::new(config);
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);
    }

    #[tokio::test]
    async fn test_reset_closes_circuit() {
        let breaker = CircuitBreaker::new(test_config());
        for _ in 0..4 {
            let _ = breaker.call(fail_op).await;
        }
        assert_eq!(breaker.state(), CircuitState::Open);

        breaker.reset();
        assert_eq!(breaker.state(), CircuitState::Closed);
        assert_eq!(breaker.call(ok_op).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_registry_scopes_breakers_by_command() {
        let registry = BreakerRegistry::new();
        let fetch = registry.breaker(&CircuitBreakerConfig {
            command: "fetch".to_string(),
            ..test_config()
        });
        let probe = registry.breaker(&CircuitBreakerConfig {
            command: "health".to_string(),
            ..test_config()
        });

        for _ in 0..4 {
            let _ = fetch.call(fail_op).await;
        }
        assert_eq!(fetch.state(), CircuitState::Open);
        assert_eq!(probe.state(), CircuitState::Closed);

        // Same name yields the same breaker
        let fetch_again = registry.breaker(&CircuitBreakerConfig {
            command: "fetch".to_string(),
            ..test_config()
        });
        assert_eq!(fetch_again.state(), CircuitState::Open);
    }
}
