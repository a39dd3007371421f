//! Application-wide registry of circuit breakers.
//!
//! The registry tracks every breaker in the process by identifier. It
//! keeps its own view of each breaker's state, fed by the breaker's
//! state-updated hook, and holds a handle to each breaker so operators
//! can force transitions centrally.

use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::breaker::{CircuitBreaker, CircuitBreakerDescription};
use crate::error::RegistryError;
use crate::state::State;

/// A registry of circuit breakers keyed by their identifiers.
#[derive(Default)]
pub struct BreakerRegistry {
    breakers: RwLock<Vec<CircuitBreaker>>,
    states: Arc<RwLock<AHashMap<String, State>>>,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a breaker.
    ///
    /// Snapshots the breaker's current state and installs a hook that
    /// keeps the registry's view current on every subsequent change.
    /// Registering the same identifier again is a no-op.
    pub fn register(&self, breaker: &CircuitBreaker) {
        let mut breakers = self.breakers.write();
        if breakers
            .iter()
            .any(|known| known.identifier() == breaker.identifier())
        {
            return;
        }

        self.states
            .write()
            .insert(breaker.identifier().to_string(), breaker.current_state());

        let states = Arc::clone(&self.states);
        breaker.hooks().on_state_updated(move |event| {
            states
                .write()
                .insert(event.circuit_breaker_id.clone(), event.new_state);
        });

        debug!(circuit_breaker = %breaker.identifier(), "Circuit breaker registered");
        breakers.push(breaker.clone());
    }

    /// The registry's view of a breaker's state.
    pub fn state_of(&self, circuit_breaker_id: &str) -> Result<State, RegistryError> {
        self.states
            .read()
            .get(circuit_breaker_id)
            .copied()
            .ok_or(RegistryError::UnknownCircuitBreaker)
    }

    /// Forces a tracked breaker into the given state.
    ///
    /// Returns whether the breaker actually changed state.
    pub fn set_state(
        &self,
        circuit_breaker_id: &str,
        state: State,
    ) -> Result<bool, RegistryError> {
        let breakers = self.breakers.read();
        let breaker = breakers
            .iter()
            .find(|known| known.identifier() == circuit_breaker_id)
            .ok_or(RegistryError::UnknownCircuitBreaker)?;

        Ok(breaker.force_state(state))
    }

    /// Snapshots every tracked breaker for operational reporting.
    pub fn describe(&self) -> Vec<CircuitBreakerDescription> {
        self.breakers
            .read()
            .iter()
            .map(CircuitBreaker::describe)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BucketConfig;
    use crate::hook::HookRegistry;
    use crate::process::BucketProcess;

    fn test_breaker(resource: &str) -> CircuitBreaker {
        let (_process, handle) = BucketProcess::new(BucketConfig::default());
        CircuitBreaker::new(resource.to_string(), handle, Arc::new(HookRegistry::new()))
    }

    #[test]
    fn test_register_snapshots_the_current_state() {
        let registry = BreakerRegistry::new();
        let breaker = test_breaker("transaction-history");
        breaker.force_state(State::Open);

        registry.register(&breaker);

        assert_eq!(
            registry.state_of("transaction-history-circuit-breaker"),
            Ok(State::Open)
        );
    }

    #[test]
    fn test_notifications_keep_the_view_current() {
        let registry = BreakerRegistry::new();
        let breaker = test_breaker("transaction-history");
        registry.register(&breaker);

        breaker.force_state(State::Open);
        assert_eq!(
            registry.state_of("transaction-history-circuit-breaker"),
            Ok(State::Open)
        );

        breaker.force_state(State::HalfOpen);
        assert_eq!(
            registry.state_of("transaction-history-circuit-breaker"),
            Ok(State::HalfOpen)
        );
    }

    #[test]
    fn test_unknown_identifiers_fail_lookups() {
        let registry = BreakerRegistry::new();

        assert_eq!(
            registry.state_of("never-registered"),
            Err(RegistryError::UnknownCircuitBreaker)
        );
        assert_eq!(
            registry.set_state("never-registered", State::Open),
            Err(RegistryError::UnknownCircuitBreaker)
        );
    }

    #[test]
    fn test_set_state_drives_the_breaker() {
        let registry = BreakerRegistry::new();
        let breaker = test_breaker("transaction-history");
        registry.register(&breaker);

        let changed = registry
            .set_state("transaction-history-circuit-breaker", State::Open)
            .unwrap();

        assert!(changed);
        assert_eq!(breaker.current_state(), State::Open);
        assert_eq!(
            registry.state_of("transaction-history-circuit-breaker"),
            Ok(State::Open)
        );

        // Forcing the state it is already in changes nothing
        let changed = registry
            .set_state("transaction-history-circuit-breaker", State::Open)
            .unwrap();
        assert!(!changed);
    }

    #[test]
    fn test_describe_lists_every_tracked_breaker() {
        let registry = BreakerRegistry::new();
        let history = test_breaker("transaction-history");
        let payments = test_breaker("payments");
        payments.force_state(State::Open);

        registry.register(&history);
        registry.register(&payments);

        let mut descriptions = registry.describe();
        descriptions.sort_by(|a, b| a.resource.cmp(&b.resource));

        assert_eq!(descriptions.len(), 2);
        assert_eq!(descriptions[0].resource, "payments");
        assert_eq!(descriptions[0].state, State::Open);
        assert_eq!(descriptions[1].resource, "transaction-history");
        assert_eq!(descriptions[1].state, State::Closed);
        assert_eq!(
            descriptions[1].circuit_breaker_id,
            "transaction-history-circuit-breaker"
        );
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let registry = BreakerRegistry::new();
        let breaker = test_breaker("transaction-history");

        registry.register(&breaker);
        registry.register(&breaker);

        assert_eq!(registry.describe().len(), 1);
    }
}
