//! Telemetry sink abstraction for the Prism image proxy.
//!
//! This crate provides:
//! - The [`TelemetrySink`] contract consumed around fetch and transform
//!   boundaries (duration, count, and gauge updates)
//! - A no-op sink so the core never branches on "is telemetry configured"
//! - An in-memory [`RegistrySink`] with JSON export for tests and tooling
//! - Structured-logging initialization with tracing
//!
//! Sink failures never propagate into the request path: [`TelemetrySink::update`]
//! is infallible from the caller's perspective, and implementations log
//! or swallow their own errors.

#![warn(missing_docs)]

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Scope applied when an update carries none.
pub const DEFAULT_SCOPE: &str = "prism";

/// A shared no-op sink, handed out by [`noop_sink`].
static NOOP: Lazy<Arc<NoopSink>> = Lazy::new(|| Arc::new(NoopSink));

/// Initialize the tracing subscriber with defaults.
pub fn init() -> anyhow::Result<()> {
    init_with_config(TelemetryConfig::default())
}

/// Initialize the tracing subscriber with custom configuration.
///
/// `RUST_LOG` wins over the configured level when set.
pub fn init_with_config(config: TelemetryConfig) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter).with(
        fmt::layer()
            .with_target(config.show_target)
            .with_file(config.show_file)
            .with_line_number(config.show_line_number)
            .compact(),
    );

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))?;

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Telemetry initialized");

    Ok(())
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Include the event's module target in log lines
    pub show_target: bool,
    /// Include source file names in log lines
    pub show_file: bool,
    /// Include source line numbers in log lines
    pub show_line_number: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_target: false,
            show_file: false,
            show_line_number: false,
        }
    }
}

/// Kind of metric carried by a [`MetricUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Elapsed-time measurement (milliseconds)
    Duration,
    /// Monotonic counter increment
    Count,
    /// Point-in-time value
    Gauge,
}

/// A single fire-and-forget metric update.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricUpdate {
    /// What the numeric value means
    pub kind: MetricKind,
    /// Dotted scope prefix; empty means [`DEFAULT_SCOPE`]
    pub scope: String,
    /// Metric name within the scope
    pub name: String,
    /// Numeric payload (milliseconds for durations)
    pub value: f64,
    /// Statsd-style sample rate, 1.0 = every event
    pub sample_rate: f32,
}

impl MetricUpdate {
    /// A duration update, recorded in milliseconds.
    pub fn duration(scope: impl Into<String>, name: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            kind: MetricKind::Duration,
            scope: scope.into(),
            name: name.into(),
            value: elapsed.as_secs_f64() * 1000.0,
            sample_rate: 1.0,
        }
    }

    /// A counter increment of `n`.
    pub fn count(scope: impl Into<String>, name: impl Into<String>, n: u64) -> Self {
        Self {
            kind: MetricKind::Count,
            scope: scope.into(),
            name: name.into(),
            value: n as f64,
            sample_rate: 1.0,
        }
    }

    /// A gauge set to `value`.
    pub fn gauge(scope: impl Into<String>, name: impl Into<String>, value: i64) -> Self {
        Self {
            kind: MetricKind::Gauge,
            scope: scope.into(),
            name: name.into(),
            value: value as f64,
            sample_rate: 1.0,
        }
    }

    /// Override the sample rate.
    #[must_use]
    pub fn with_sample_rate(mut self, rate: f32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// The dotted metric path this update is recorded under.
    #[must_use]
    pub fn path(&self) -> String {
        metric_path(&self.scope, &self.name)
    }
}

/// Joins scope and name into a dotted metric path.
///
/// Leading/trailing dots are trimmed from both parts and an empty scope
/// falls back to [`DEFAULT_SCOPE`]:
/// `metric_path(".fetch.", "duration")` is `"fetch.duration"`.
#[must_use]
pub fn metric_path(scope: &str, name: &str) -> String {
    let scope = scope.trim_matches('.');
    let name = name.trim_matches('.');
    let scope = if scope.is_empty() { DEFAULT_SCOPE } else { scope };
    format!("{scope}.{name}")
}

/// Receiver for metric updates emitted by the core.
///
/// Implementations must be cheap and must never fail the caller; expensive
/// or fallible delivery belongs behind the implementation's own buffering.
pub trait TelemetrySink: Send + Sync {
    /// Record one update. Fire-and-forget.
    fn update(&self, update: MetricUpdate);
}

/// Sink that drops every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TelemetrySink for NoopSink {
    fn update(&self, _update: MetricUpdate) {}
}

/// The shared default sink.
#[must_use]
pub fn noop_sink() -> Arc<dyn TelemetrySink> {
    NOOP.clone() as Arc<dyn TelemetrySink>
}

/// In-memory sink collecting counters, gauges, and duration samples.
///
/// Used by tests and by tooling that wants a JSON dump at the end of a
/// run; a statsd or Prometheus forwarder would implement [`TelemetrySink`]
/// the same way.
#[derive(Default)]
pub struct RegistrySink {
    counters: RwLock<HashMap<String, AtomicU64>>,
    gauges: RwLock<HashMap<String, AtomicI64>>,
    durations: RwLock<HashMap<String, Vec<f64>>>,
}

impl RegistrySink {
    /// Create an empty registry sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if never incremented.
    #[must_use]
    pub fn counter(&self, path: &str) -> u64 {
        self.counters
            .read()
            .unwrap()
            .get(path)
            .map_or(0, |c| c.load(Ordering::Relaxed))
    }

    /// Last value of a gauge, if ever set.
    #[must_use]
    pub fn gauge_value(&self, path: &str) -> Option<i64> {
        self.gauges
            .read()
            .unwrap()
            .get(path)
            .map(|g| g.load(Ordering::Relaxed))
    }

    /// Recorded duration samples (milliseconds) for a path.
    #[must_use]
    pub fn durations(&self, path: &str) -> Vec<f64> {
        self.durations
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    /// Export all recorded metrics as JSON.
    #[must_use]
    pub fn export_json(&self) -> serde_json::Value {
        let counters = self.counters.read().unwrap();
        let gauges = self.gauges.read().unwrap();
        let durations = self.durations.read().unwrap();

        let counter_values: HashMap<String, u64> = counters
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let gauge_values: HashMap<String, i64> = gauges
            .iter()
            .map(|(k, v)| (k.clone(), v.load(Ordering::Relaxed)))
            .collect();

        let duration_stats: HashMap<String, DurationStats> = durations
            .iter()
            .map(|(k, v)| (k.clone(), DurationStats::from_samples(v)))
            .collect();

        serde_json::json!({
            "counters": counter_values,
            "gauges": gauge_values,
            "durations_ms": duration_stats,
        })
    }
}

impl TelemetrySink for RegistrySink {
    fn update(&self, update: MetricUpdate) {
        let path = update.path();
        match update.kind {
            MetricKind::Count => {
                let counters = self.counters.read().unwrap();
                if let Some(counter) = counters.get(&path) {
                    counter.fetch_add(update.value as u64, Ordering::Relaxed);
                } else {
                    drop(counters);
                    self.counters
                        .write()
                        .unwrap()
                        .entry(path)
                        .or_insert_with(|| AtomicU64::new(0))
                        .fetch_add(update.value as u64, Ordering::Relaxed);
                }
            }
            MetricKind::Gauge => {
                self.gauges
                    .write()
                    .unwrap()
                    .entry(path)
                    .or_insert_with(|| AtomicI64::new(0))
                    .store(update.value as i64, Ordering::Relaxed);
            }
            MetricKind::Duration => {
                self.durations
                    .write()
                    .unwrap()
                    .entry(path)
                    .or_default()
                    .push(update.value);
            }
        }
    }
}

/// Summary statistics over duration samples.
#[derive(Debug, Serialize)]
pub struct DurationStats {
    /// Number of samples recorded
    pub count: usize,
    /// Smallest sample, in milliseconds
    pub min: f64,
    /// Largest sample, in milliseconds
    pub max: f64,
    /// Arithmetic mean, in milliseconds
    pub mean: f64,
}

impl DurationStats {
    fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                mean: 0.0,
            };
        }
        let count = samples.len();
        let sum: f64 = samples.iter().sum();
        let min = samples.iter().copied().fold(f64::INFINITY, f64::min);
        let max = samples.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Self {
            count,
            min,
            max,
            mean: sum / count as f64,
        }
    }
}
