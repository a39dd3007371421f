//! A tiny gateway in front of a flaky transaction-history service:
//! admission control, stale-response fallback for a known caller, and
//! central registry reporting.
//!
//! The downstream fails every fourth call it actually receives, so the
//! breaker trips periodically; while it is open, alice keeps getting her
//! last good response from the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fusebox_rs::{
    AdmissionMonitor, BreakerRegistry, BucketConfig, BucketProcess, CallContext, CircuitBreaker,
    InMemoryCache, ServiceResponse,
};
use serde_json::json;

/// Stand-in for a downstream service that falls over every fourth call.
struct FlakyTransactionHistory {
    calls: AtomicU64,
}

impl FlakyTransactionHistory {
    fn new() -> Self {
        Self {
            calls: AtomicU64::new(0),
        }
    }

    async fn fetch(&self, caller: &str) -> ServiceResponse {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call % 4 == 0 {
            ServiceResponse::internal_error(json!({ "msg": "transaction history unavailable" }))
        } else {
            ServiceResponse::ok(json!({
                "caller": caller,
                "transactions": [{ "amount": 42, "sequence": call }],
            }))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Slow decay relative to the request rate, so a burst of failures
    // keeps the circuit open across several requests
    let bucket = BucketProcess::spawn(BucketConfig {
        tick_interval: Duration::from_secs(3),
        ..BucketConfig::default()
    });

    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)?;

    let registry = BreakerRegistry::new();
    registry.register(&breaker);

    let monitor = AdmissionMonitor::new(breaker).with_cache(Arc::new(InMemoryCache::new()));
    let service = Arc::new(FlakyTransactionHistory::new());

    for request in 1..=25u32 {
        let downstream = Arc::clone(&service);
        let response = monitor
            .admit(CallContext::caller("alice"), move || async move {
                downstream.fetch("alice").await
            })
            .await;

        let note = if response.body.get("fromCache").is_some() {
            " (served from cache)"
        } else {
            ""
        };
        println!(
            "request {request:>2}: status {} while {}{note}",
            response.status,
            monitor.breaker().current_state(),
        );

        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    println!("\nFinal registry view:");
    println!("{}", serde_json::to_string_pretty(&registry.describe())?);

    Ok(())
}
