//! Configuration for circuit breakers and the bucket process.

use std::sync::Arc;
use std::time::Duration;

use crate::breaker::CircuitBreaker;
use crate::bucket::DEFAULT_THRESHOLD;
use crate::error::ProtocolError;
use crate::hook::HookRegistry;
use crate::message::BucketMessage;
use crate::process::BucketHandle;

/// Builder for creating circuit breakers with custom configurations.
pub struct BreakerBuilder {
    resource: String,
    threshold: u64,
    hooks: Arc<HookRegistry>,
}

impl BreakerBuilder {
    /// Creates a new builder for a breaker guarding the given resource.
    pub fn new(resource: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            threshold: DEFAULT_THRESHOLD,
            hooks: Arc::new(HookRegistry::new()),
        }
    }

    /// Sets the failure threshold registered with the bucket.
    pub fn threshold(mut self, threshold: u64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Sets a hook registry for the circuit breaker.
    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = Arc::new(hooks);
        self
    }

    /// Builds the breaker against a bucket process.
    ///
    /// Subscribes to the bucket's event stream, registers the breaker's
    /// subscription, and spawns the event listener task; must be called
    /// from within a tokio runtime. Registration is the one place a
    /// full or closed command queue surfaces as an error.
    pub fn build(self, bucket: &BucketHandle) -> Result<CircuitBreaker, ProtocolError> {
        let events = bucket.subscribe();
        let breaker = CircuitBreaker::new(self.resource, bucket.clone(), self.hooks);

        bucket.send(BucketMessage::Register {
            subscription_id: breaker.identifier().to_string(),
            threshold: Some(self.threshold),
        })?;

        breaker.spawn_listener(events);
        Ok(breaker)
    }
}

/// Configuration for a [`BucketProcess`](crate::process::BucketProcess).
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// Period of the decay tick.
    pub tick_interval: Duration,

    /// Capacity of the bounded breaker-to-bucket command channel.
    pub command_capacity: usize,

    /// Capacity of the bucket-to-breaker broadcast event channel.
    pub event_capacity: usize,
}

impl Default for BucketConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(1000),
            command_capacity: 64,
            event_capacity: 64,
        }
    }
}
