//! Admission control in front of a guarded downstream call.
//!
//! [`AdmissionMonitor`] is the piece that sits on the request path. It
//! consults the breaker before the downstream call is made, refuses or
//! serves from cache while the circuit is open, and feeds the call's
//! outcome back into the breaker exactly once when it completes.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::cache::FallbackCache;
use crate::error::RejectionReason;
use crate::state::State;

/// An HTTP-shaped response from a guarded downstream call.
///
/// The monitor classifies outcomes by status: 200 is a success, 500 is
/// a failure, anything else leaves the breaker untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResponse {
    /// HTTP-like status code.
    pub status: u16,

    /// Response body as a JSON document.
    pub body: Value,
}

impl ServiceResponse {
    /// A success response (status 200).
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    /// A failure response (status 500).
    pub fn internal_error(body: Value) -> Self {
        Self { status: 500, body }
    }

    /// Whether the status counts as a success outcome.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Whether the status counts as a failure outcome.
    pub fn is_failure(&self) -> bool {
        self.status == 500
    }
}

/// Identity of the inbound call being admitted.
///
/// The caller id keys the fallback cache; anonymous calls are admitted
/// normally but never read from or write to the cache.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext<'a> {
    /// Stable identifier of the caller, when known.
    pub caller_id: Option<&'a str>,
}

impl<'a> CallContext<'a> {
    /// A context with no caller identity.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// A context for an identified caller.
    pub fn caller(id: &'a str) -> Self {
        Self { caller_id: Some(id) }
    }
}

/// Admission control for one guarded resource.
///
/// Clones share the breaker and cache.
#[derive(Clone)]
pub struct AdmissionMonitor {
    breaker: CircuitBreaker,
    cache: Option<Arc<dyn FallbackCache>>,
}

impl AdmissionMonitor {
    /// Creates a monitor over the given breaker, without a fallback
    /// cache.
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self {
            breaker,
            cache: None,
        }
    }

    /// Attaches a fallback cache serving stale responses while the
    /// circuit is open.
    pub fn with_cache(mut self, cache: Arc<dyn FallbackCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// The breaker this monitor consults.
    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Admits one call against the guarded resource.
    ///
    /// While the breaker is open the downstream future is never created:
    /// the call resolves synchronously to a cached response or a
    /// refusal. Otherwise the downstream runs and its outcome is
    /// observed exactly once on completion, without blocking the
    /// response path.
    pub async fn admit<F, Fut>(&self, ctx: CallContext<'_>, call: F) -> ServiceResponse
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ServiceResponse>,
    {
        if self.breaker.current_state() == State::Open {
            return self.resolve_while_open(ctx);
        }

        let response = call().await;
        self.observe(ctx, &response);
        response
    }

    fn resolve_while_open(&self, ctx: CallContext<'_>) -> ServiceResponse {
        if let (Some(cache), Some(caller)) = (&self.cache, ctx.caller_id) {
            let key = self.cache_key(caller);
            if let Some(cached) = cache.get(&key) {
                match serde_json::from_str::<Value>(&cached) {
                    Ok(body) => {
                        info!(
                            circuit_breaker = %self.breaker.identifier(),
                            caller,
                            "Resolving request using cached data while in OPEN state"
                        );
                        return ServiceResponse::ok(mark_from_cache(body));
                    }
                    Err(error) => {
                        // An unreadable entry is a miss, not a serve
                        warn!(key, %error, "Discarding unparseable cache entry");
                    }
                }
            }
        }

        info!(
            circuit_breaker = %self.breaker.identifier(),
            "Call refused by circuit breaker"
        );
        ServiceResponse::internal_error(json!({
            "msg": RejectionReason::CallRefused.to_string(),
        }))
    }

    fn observe(&self, ctx: CallContext<'_>, response: &ServiceResponse) {
        if response.is_success() {
            self.breaker.handle_success();

            if let (Some(cache), Some(caller)) = (&self.cache, ctx.caller_id) {
                if let Ok(serialized) = serde_json::to_string(&response.body) {
                    cache.set(&self.cache_key(caller), serialized);
                }
            }
        } else if response.is_failure() {
            self.breaker.handle_failure();
        }
    }

    fn cache_key(&self, caller: &str) -> String {
        format!("{}:{}", self.breaker.resource(), caller)
    }
}

/// Marks a cached body as stale before serving it.
///
/// Objects get a `fromCache` field added in place; any other JSON shape
/// is wrapped so the marker has somewhere to live.
fn mark_from_cache(mut body: Value) -> Value {
    match body.as_object_mut() {
        Some(map) => {
            map.insert("fromCache".to_string(), Value::Bool(true));
            body
        }
        None => json!({ "payload": body, "fromCache": true }),
    }
}
