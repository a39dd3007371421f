//! Hook registry for circuit breaker state change notifications.

use parking_lot::RwLock;
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

use crate::state::State;

/// Notification emitted every time a circuit breaker changes state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateUpdated {
    /// Identifier of the breaker that changed state.
    pub circuit_breaker_id: String,

    /// The state the breaker moved to.
    pub new_state: State,
}

type HookFn = Arc<dyn Fn(&StateUpdated) + Send + Sync + 'static>;

/// A registry of callbacks observing a circuit breaker's state changes.
///
/// Hooks fire synchronously on the task that drove the transition, after
/// the state has already changed, so a hook that reads the breaker sees
/// the new state. Keep hooks short; slow work belongs on a channel.
pub struct HookRegistry {
    on_state_updated: RwLock<SmallVec<[HookFn; 2]>>,
}

impl Default for HookRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HookRegistry {
    /// Creates a new empty hook registry.
    pub fn new() -> Self {
        Self {
            on_state_updated: RwLock::new(SmallVec::new()),
        }
    }

    /// Adds a hook to call on every state change.
    pub fn on_state_updated<F>(&self, f: F)
    where
        F: Fn(&StateUpdated) + Send + Sync + 'static,
    {
        self.on_state_updated.write().push(Arc::new(f));
    }

    /// Executes every registered hook for a state change.
    pub fn notify(&self, event: &StateUpdated) {
        let hooks: SmallVec<[HookFn; 2]> = self.on_state_updated.read().clone();
        for hook in hooks {
            hook(event);
        }
    }
}
