//! Circuit-breaker-guarded object store gateway for Prism.
//!
//! This crate provides:
//! - [`StorageGateway`]: fetch raw object bytes by key, every call
//!   guarded by a named circuit breaker
//! - [`CircuitBreaker`]: rolling-window error-percentage breaker with
//!   sleep window and single half-open probe
//! - [`ObjectStore`]: the backend seam; [`HttpObjectStore`] talks to an
//!   S3-style HTTP gateway, test doubles implement the same trait
//!
//! The gateway is built once from ordered options, validated, and frozen;
//! afterwards it is shared read-only across all concurrent fetches. The
//! breaker is the only shared mutable state, and its critical sections
//! cover counter updates and state transitions only, never backend I/O.

#![warn(missing_docs)]

mod backend;
mod breaker;
mod error;
mod gateway;

pub use backend::{HttpObjectStore, ObjectStore};
pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use error::{BackendError, ConfigError, Result};
pub use gateway::{GatewayBuilder, StorageGateway, StorageObject};
