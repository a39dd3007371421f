//! # fusebox-rs
//!
//! A message-driven Circuit Breaker backed by a shared leaky-bucket
//! failure counter, with stale-response fallback for refused calls.
//!
//! Unlike breakers that count failures inside the breaker itself, this
//! library splits the work in two:
//!
//! - a single [`BucketProcess`] worker owns a [`LeakyBucket`] of decaying
//!   failure counts, one subscription per breaker, and announces
//!   threshold crossings on a broadcast event stream;
//! - each [`CircuitBreaker`] reports failures to the bucket and reacts
//!   to the bucket's verdicts, so the "how broken is this dependency"
//!   arithmetic lives in one place even when many breakers (or many
//!   processes behind a gateway) share it.
//!
//! ## States
//!
//! - **Closed**: normal operation. Calls pass through; failures are
//!   reported to the bucket.
//! - **Open**: calls are refused without reaching the resource. Entered
//!   when the bucket reports the failure threshold violated.
//! - **Half-Open**: entered when decay brings the count back to the
//!   threshold; the next call is a live probe. Success closes the
//!   circuit, failure re-opens it.
//!
//! Recovery is driven by the bucket's decay tick rather than a cooldown
//! timer: the circuit half-opens exactly when the failure count has
//! leaked back to the threshold boundary.
//!
//! ## Basic Usage
//!
//! ```rust
//! use fusebox_rs::{
//!     AdmissionMonitor, BucketConfig, BucketProcess, CallContext, CircuitBreaker,
//!     ServiceResponse,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fusebox_rs::ProtocolError> {
//!     // One bucket process serves every breaker in the application
//!     let bucket = BucketProcess::spawn(BucketConfig::default());
//!
//!     let breaker = CircuitBreaker::builder("transaction-history")
//!         .threshold(10)
//!         .build(&bucket)?;
//!
//!     // The monitor guards the downstream call and feeds the outcome back
//!     let monitor = AdmissionMonitor::new(breaker);
//!     let response = monitor
//!         .admit(CallContext::caller("alice"), || async {
//!             ServiceResponse::ok(json!([{ "amount": 42 }]))
//!         })
//!         .await;
//!
//!     assert_eq!(response.status, 200);
//!     Ok(())
//! }
//! ```
//!
//! ## Fallbacks
//!
//! With an [`InMemoryCache`] attached, the monitor remembers each
//! caller's last successful response and serves it (marked
//! `fromCache: true`) instead of refusing while the circuit is open.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod breaker;
mod bucket;
mod cache;
mod config;
mod error;
mod hook;
mod message;
mod monitor;
pub mod prelude;
mod process;
mod registry;
mod state;

// Re-exports
pub use breaker::{CircuitBreaker, CircuitBreakerDescription};
pub use bucket::{LeakyBucket, DEFAULT_THRESHOLD};
pub use cache::{FallbackCache, InMemoryCache};
pub use config::{BreakerBuilder, BucketConfig};
pub use error::{BucketError, ProtocolError, RegistryError, RejectionReason};
pub use hook::{HookRegistry, StateUpdated};
pub use message::{BucketMessage, SubscriptionId};
pub use monitor::{AdmissionMonitor, CallContext, ServiceResponse};
pub use process::{BucketHandle, BucketProcess};
pub use registry::BreakerRegistry;
pub use state::{transition, Event, State, Step};
