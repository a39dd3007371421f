use fusebox_rs::{
    AdmissionMonitor, BreakerRegistry, BucketConfig, BucketHandle, BucketProcess, CallContext,
    CircuitBreaker, FallbackCache, InMemoryCache, ServiceResponse, State,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// All tests run on a paused clock: the decay tick fires through
// auto-advanced virtual time, so nothing here depends on wall-clock
// timing.

fn spawn_bucket(tick_interval: Duration) -> BucketHandle {
    BucketProcess::spawn(BucketConfig {
        tick_interval,
        ..BucketConfig::default()
    })
}

async fn wait_for_state(breaker: &CircuitBreaker, target: State) {
    let reached = tokio::time::timeout(Duration::from_secs(5), async {
        while breaker.current_state() != target {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;

    assert!(
        reached.is_ok(),
        "breaker {} never reached {}, still {}",
        breaker.identifier(),
        target,
        breaker.current_state()
    );
}

// Lets the bucket worker drain everything already queued.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

#[tokio::test(start_paused = true)]
async fn test_full_lifecycle_from_failures_to_recovery() {
    let bucket = spawn_bucket(Duration::from_millis(100));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    assert_eq!(breaker.current_state(), State::Closed);

    // Two failures raise the count to 2, strictly above threshold 1
    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;

    // Decay brings the count back to the threshold and half-opens
    wait_for_state(&breaker, State::HalfOpen).await;

    // The probe call succeeds and closes the circuit
    let monitor = AdmissionMonitor::new(breaker.clone());
    let response = monitor
        .admit(CallContext::anonymous(), || async {
            ServiceResponse::ok(json!([{ "amount": 42 }]))
        })
        .await;

    assert_eq!(response.status, 200);
    assert_eq!(breaker.current_state(), State::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_failure_reopens() {
    let bucket = spawn_bucket(Duration::from_millis(100));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();
    let monitor = AdmissionMonitor::new(breaker.clone());

    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;
    wait_for_state(&breaker, State::HalfOpen).await;

    // The probe fails: straight back to open
    let response = monitor
        .admit(CallContext::anonymous(), || async {
            ServiceResponse::internal_error(json!({ "msg": "still broken" }))
        })
        .await;

    assert_eq!(response.status, 500);
    assert_eq!(breaker.current_state(), State::Open);
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_serves_the_cached_response() {
    // Decay slow enough that the circuit stays open for the whole test
    let bucket = spawn_bucket(Duration::from_secs(3600));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    let cache = InMemoryCache::new();
    let monitor =
        AdmissionMonitor::new(breaker.clone()).with_cache(Arc::new(cache.clone()));

    // A successful call while closed populates the cache for alice
    let response = monitor
        .admit(CallContext::caller("alice"), || async {
            ServiceResponse::ok(json!([{ "amount": 42 }]))
        })
        .await;
    assert_eq!(response.status, 200);
    assert!(cache.has("transaction-history:alice"));

    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;

    // While open, alice gets her stale data and the downstream is not called
    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let response = monitor
        .admit(CallContext::caller("alice"), move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            ServiceResponse::ok(json!("unreachable"))
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body,
        json!({ "payload": [{ "amount": 42 }], "fromCache": true })
    );
}

#[tokio::test(start_paused = true)]
async fn test_open_circuit_without_cache_refuses_immediately() {
    let bucket = spawn_bucket(Duration::from_secs(3600));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();
    let monitor = AdmissionMonitor::new(breaker.clone());

    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;

    let calls = Arc::new(AtomicUsize::new(0));
    let counted = Arc::clone(&calls);
    let response = monitor
        .admit(CallContext::caller("alice"), move || async move {
            counted.fetch_add(1, Ordering::SeqCst);
            ServiceResponse::ok(json!("unreachable"))
        })
        .await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(response.status, 500);
    assert_eq!(
        response.body,
        json!({ "msg": "Call refused by circuit breaker" })
    );
}

#[tokio::test(start_paused = true)]
async fn test_breakers_share_the_bucket_but_trip_independently() {
    let bucket = spawn_bucket(Duration::from_secs(3600));
    let history = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();
    let payments = CircuitBreaker::builder("payments")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    history.register_failure();
    history.register_failure();
    wait_for_state(&history, State::Open).await;

    // The payments breaker saw the same event stream and ignored it
    settle().await;
    assert_eq!(payments.current_state(), State::Closed);
}

#[tokio::test(start_paused = true)]
async fn test_reset_failures_clears_the_shared_count() {
    let bucket = spawn_bucket(Duration::from_secs(3600));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    // One failure, a reset, one more failure: the count never exceeds 1
    breaker.register_failure();
    breaker.reset_failures();
    breaker.register_failure();

    settle().await;
    assert_eq!(breaker.current_state(), State::Closed);

    // Without the reset the same number of failures trips the breaker
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;
}

#[tokio::test(start_paused = true)]
async fn test_registry_observes_and_overrides_breakers() {
    let bucket = spawn_bucket(Duration::from_secs(3600));
    let history = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();
    let payments = CircuitBreaker::builder("payments")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    let registry = BreakerRegistry::new();
    registry.register(&history);
    registry.register(&payments);

    // The registry's view follows the breaker's own transitions
    history.register_failure();
    history.register_failure();
    wait_for_state(&history, State::Open).await;
    assert_eq!(
        registry.state_of("transaction-history-circuit-breaker"),
        Ok(State::Open)
    );
    assert_eq!(
        registry.state_of("payments-circuit-breaker"),
        Ok(State::Closed)
    );

    // Operator override closes the tripped breaker centrally
    let changed = registry
        .set_state("transaction-history-circuit-breaker", State::Closed)
        .unwrap();
    assert!(changed);
    assert_eq!(history.current_state(), State::Closed);
    assert_eq!(
        registry.state_of("transaction-history-circuit-breaker"),
        Ok(State::Closed)
    );

    let descriptions = registry.describe();
    assert_eq!(descriptions.len(), 2);
    assert!(descriptions
        .iter()
        .all(|description| description.state == State::Closed));
}

#[tokio::test(start_paused = true)]
async fn test_each_crossing_emits_one_recovery() {
    let bucket = spawn_bucket(Duration::from_millis(100));
    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(1)
        .build(&bucket)
        .unwrap();

    // First trip and recovery
    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;
    wait_for_state(&breaker, State::HalfOpen).await;
    breaker.handle_success();
    assert_eq!(breaker.current_state(), State::Closed);

    // The count decayed to zero; the same sequence trips and recovers again
    tokio::time::sleep(Duration::from_millis(500)).await;
    breaker.register_failure();
    breaker.register_failure();
    wait_for_state(&breaker, State::Open).await;
    wait_for_state(&breaker, State::HalfOpen).await;
}
