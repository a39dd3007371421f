//! Minimal lifecycle walkthrough: trip a breaker with failures, watch
//! the bucket decay half-open it, and close it with a successful probe.

use std::time::Duration;

use fusebox_rs::{BucketConfig, BucketProcess, CircuitBreaker, HookRegistry, State};

async fn wait_for(breaker: &CircuitBreaker, target: State) {
    while breaker.current_state() != target {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    // Fast decay so the walkthrough stays snappy
    let bucket = BucketProcess::spawn(BucketConfig {
        tick_interval: Duration::from_millis(500),
        ..BucketConfig::default()
    });

    let hooks = HookRegistry::new();
    hooks.on_state_updated(|event| {
        println!("-> {} moved to {}", event.circuit_breaker_id, event.new_state);
    });

    let breaker = CircuitBreaker::builder("transaction-history")
        .threshold(2)
        .hooks(hooks)
        .build(&bucket)?;

    println!("Initial state: {}", breaker.current_state());

    println!("\nReporting three failures (threshold is 2)...");
    for _ in 0..3 {
        breaker.register_failure();
    }
    wait_for(&breaker, State::Open).await;
    println!("Calls would now be refused without reaching the downstream");

    println!("\nWaiting for the failure count to decay...");
    wait_for(&breaker, State::HalfOpen).await;
    println!("The next call is a live probe");

    breaker.handle_success();
    println!("\nProbe succeeded, final state: {}", breaker.current_state());

    Ok(())
}
