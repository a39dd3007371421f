//! Core circuit breaker implementation.

use std::sync::{Arc, Weak};

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::hook::{HookRegistry, StateUpdated};
use crate::message::{BucketMessage, SubscriptionId};
use crate::process::BucketHandle;
use crate::state::{transition, Event, State, StateCell};

/// Inner state of the circuit breaker, shared between clones and the
/// event listener task.
struct BreakerInner {
    subscription_id: SubscriptionId,
    resource: String,
    state: StateCell,
    bucket: BucketHandle,
    hooks: Arc<HookRegistry>,
}

/// A circuit breaker guarding one downstream resource.
///
/// The breaker itself never invokes the resource; it is fed call
/// outcomes by an [`AdmissionMonitor`](crate::AdmissionMonitor) (or
/// directly via [`handle_success`](Self::handle_success) /
/// [`handle_failure`](Self::handle_failure)) and counter verdicts by the
/// bucket's event stream. State transitions follow the pure
/// [`transition`] table; each actual change fires exactly one
/// [`StateUpdated`] notification through the hook registry.
///
/// Clones are cheap and share the same state.
#[derive(Clone)]
pub struct CircuitBreaker {
    inner: Arc<BreakerInner>,
}

/// A read-only projection of a breaker, for operational reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CircuitBreakerDescription {
    /// The breaker's identifier, also its bucket subscription id.
    pub circuit_breaker_id: String,

    /// The downstream resource the breaker guards.
    pub resource: String,

    /// The breaker's state at the time of the snapshot.
    pub state: State,
}

impl CircuitBreaker {
    /// Derives the bucket subscription id for a resource name.
    pub fn subscription_id_for(resource: &str) -> SubscriptionId {
        format!("{resource}-circuit-breaker")
    }

    /// Creates a new builder for a breaker guarding the given resource.
    pub fn builder(resource: impl Into<String>) -> crate::config::BreakerBuilder {
        crate::config::BreakerBuilder::new(resource)
    }

    pub(crate) fn new(resource: String, bucket: BucketHandle, hooks: Arc<HookRegistry>) -> Self {
        let inner = BreakerInner {
            subscription_id: Self::subscription_id_for(&resource),
            resource,
            state: StateCell::new(),
            bucket,
            hooks,
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// The breaker's identifier, used as its bucket subscription id and
    /// in every notification it emits.
    pub fn identifier(&self) -> &str {
        &self.inner.subscription_id
    }

    /// The downstream resource this breaker guards.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    /// Gets the current state of the circuit breaker.
    pub fn current_state(&self) -> State {
        self.inner.state.current()
    }

    /// The hook registry observing this breaker's state changes.
    pub fn hooks(&self) -> &HookRegistry {
        &self.inner.hooks
    }

    /// Snapshots the breaker for reporting.
    pub fn describe(&self) -> CircuitBreakerDescription {
        CircuitBreakerDescription {
            circuit_breaker_id: self.inner.subscription_id.clone(),
            resource: self.inner.resource.clone(),
            state: self.current_state(),
        }
    }

    /// Records a successful call outcome.
    pub fn handle_success(&self) {
        self.apply(Event::CallSucceeded);
    }

    /// Records a failed call outcome.
    pub fn handle_failure(&self) {
        self.apply(Event::CallFailed);
    }

    /// Reports one failure to the shared counter, regardless of the
    /// breaker's current state.
    pub fn register_failure(&self) {
        let msg = BucketMessage::NewFailure {
            subscription_id: self.inner.subscription_id.clone(),
        };
        if let Err(error) = self.inner.bucket.send(msg) {
            warn!(
                circuit_breaker = %self.inner.subscription_id,
                %error,
                "Dropping failure report"
            );
        }
    }

    /// Zeroes this breaker's failure count in the shared counter.
    pub fn reset_failures(&self) {
        let msg = BucketMessage::Reset {
            subscription_id: self.inner.subscription_id.clone(),
        };
        if let Err(error) = self.inner.bucket.send(msg) {
            warn!(
                circuit_breaker = %self.inner.subscription_id,
                %error,
                "Dropping failure count reset"
            );
        }
    }

    /// Forces the breaker into the given state.
    ///
    /// Operational override; it bypasses the transition table but still
    /// fires the state-updated notification. Returns false when the
    /// breaker is already in the target state (no notification fires).
    pub fn force_state(&self, target: State) -> bool {
        let current = self.inner.state.current();
        if current == target {
            return false;
        }

        let moved = self.inner.state.transition(current, target);
        if moved {
            info!(
                circuit_breaker = %self.inner.subscription_id,
                from = %current,
                to = %target,
                "State forced"
            );
            self.notify(target);
        }

        moved
    }

    /// Feeds one event through the transition table and carries out the
    /// resulting effects.
    fn apply(&self, event: Event) {
        let current = self.inner.state.current();
        let step = transition(current, event);

        if let Some(next) = step.next {
            // A lost CAS means a concurrent transition already moved the
            // state; the event was decided against a stale state and its
            // transition is abandoned.
            if self.inner.state.transition(current, next) {
                self.log_transition(current, event);
                self.notify(next);
            }
        } else if current == State::Closed && event == Event::CallSucceeded {
            debug!(circuit_breaker = %self.inner.subscription_id, "Successful response");
        }

        if step.report_failure {
            self.register_failure();
        }
    }

    fn log_transition(&self, from: State, event: Event) {
        let id = &self.inner.subscription_id;
        match (from, event) {
            (_, Event::ThresholdViolated) => {
                info!(circuit_breaker = %id, "Threshold violated. Opening circuit.");
            }
            (_, Event::ThresholdRestored) => {
                info!(circuit_breaker = %id, "Threshold restored. Moving circuit to half-open.");
            }
            (State::HalfOpen, Event::CallSucceeded) => {
                info!(
                    circuit_breaker = %id,
                    "Successful response while in a HALF_OPEN state. Closing the circuit."
                );
            }
            (State::HalfOpen, Event::CallFailed) => {
                info!(
                    circuit_breaker = %id,
                    "Failure response while in a HALF_OPEN state. Opening circuit."
                );
            }
            (from, event) => {
                debug!(circuit_breaker = %id, ?from, ?event, "State changed");
            }
        }
    }

    fn notify(&self, new_state: State) {
        let event = StateUpdated {
            circuit_breaker_id: self.inner.subscription_id.clone(),
            new_state,
        };
        self.inner.hooks.notify(&event);
    }

    /// Spawns the task that applies this breaker's share of the bucket's
    /// event stream.
    ///
    /// The task holds only a weak handle, so dropping every breaker
    /// clone ends it; it also ends when the bucket process is gone.
    pub(crate) fn spawn_listener(&self, mut events: broadcast::Receiver<BucketMessage>) {
        let weak: Weak<BreakerInner> = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(msg) => {
                        let Some(inner) = weak.upgrade() else { break };

                        // The stream carries every subscription
                        if msg.subscription_id() != inner.subscription_id {
                            continue;
                        }

                        let breaker = CircuitBreaker { inner };
                        match msg {
                            BucketMessage::ThresholdViolation { .. } => {
                                breaker.apply(Event::ThresholdViolated);
                            }
                            BucketMessage::ThresholdRestored { .. } => {
                                breaker.apply(Event::ThresholdRestored);
                            }
                            _ => {}
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Breaker lagged behind the bucket event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("subscription_id", &self.inner.subscription_id)
            .field("resource", &self.inner.resource)
            .field("state", &self.current_state())
            .finish()
    }
}
