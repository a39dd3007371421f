//! Re-exports common types for convenient usage.
//!
//! # Example
//! ```rust,no_run
//! use fusebox_rs::prelude::*;
//! ```

pub use crate::breaker::{CircuitBreaker, CircuitBreakerDescription};
pub use crate::cache::{FallbackCache, InMemoryCache};
pub use crate::config::{BreakerBuilder, BucketConfig};
pub use crate::monitor::{AdmissionMonitor, CallContext, ServiceResponse};
pub use crate::process::{BucketHandle, BucketProcess};
pub use crate::registry::BreakerRegistry;
pub use crate::state::State;
