//! Circuit breaker state machine.
//!
//! The machine is expressed as a single pure function, [`transition`],
//! from a state and an observed event to a [`Step`]. Side effects
//! (logging, hook notification, failure reporting) are carried out by
//! the caller from the returned step, which keeps every transition rule
//! in one table and directly testable.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// The possible states of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum State {
    /// Circuit is closed and calls flow to the downstream service.
    Closed = 0,

    /// Circuit is open and calls are refused without reaching the
    /// downstream service.
    Open = 1,

    /// Circuit lets calls through to probe whether the downstream
    /// service has recovered.
    HalfOpen = 2,
}

impl From<u8> for State {
    fn from(value: u8) -> Self {
        match value {
            0 => State::Closed,
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed, // Default to closed for invalid values
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Closed => "CLOSED",
            State::Open => "OPEN",
            State::HalfOpen => "HALF_OPEN",
        };
        f.write_str(name)
    }
}

/// An event observed by a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The guarded call returned a success response.
    CallSucceeded,

    /// The guarded call returned a failure response.
    CallFailed,

    /// The failure counter reported the threshold violated.
    ThresholdViolated,

    /// The failure counter reported the threshold restored.
    ThresholdRestored,
}

/// The outcome of feeding one event to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    /// State to move to, or `None` to stay put.
    pub next: Option<State>,

    /// Whether the event adds a failure to the shared counter.
    pub report_failure: bool,
}

impl Step {
    const fn stay() -> Self {
        Step {
            next: None,
            report_failure: false,
        }
    }

    const fn move_to(state: State) -> Self {
        Step {
            next: Some(state),
            report_failure: false,
        }
    }

    const fn report(mut self) -> Self {
        self.report_failure = true;
        self
    }
}

/// The complete transition table of the circuit breaker.
///
/// Failures are reported to the counter from every state, so the decay
/// window always reflects real downstream behavior. Counter events only
/// move the machine along the recovery path: a violation opens the
/// circuit, a restore moves an open circuit to half-open, and the first
/// probe outcome in half-open settles it.
pub fn transition(state: State, event: Event) -> Step {
    match (state, event) {
        (State::Closed, Event::CallSucceeded) => Step::stay(),
        (State::Closed, Event::CallFailed) => Step::stay().report(),
        (State::Closed, Event::ThresholdViolated) => Step::move_to(State::Open),
        (State::Closed, Event::ThresholdRestored) => Step::stay(),

        (State::Open, Event::CallSucceeded) => Step::stay(),
        (State::Open, Event::CallFailed) => Step::stay().report(),
        (State::Open, Event::ThresholdViolated) => Step::stay(),
        (State::Open, Event::ThresholdRestored) => Step::move_to(State::HalfOpen),

        (State::HalfOpen, Event::CallSucceeded) => Step::move_to(State::Closed),
        (State::HalfOpen, Event::CallFailed) => Step::move_to(State::Open).report(),
        (State::HalfOpen, Event::ThresholdViolated) => Step::move_to(State::Open),
        (State::HalfOpen, Event::ThresholdRestored) => Step::stay(),
    }
}

/// Lock-free holder for a breaker's current state.
pub(crate) struct StateCell {
    state: AtomicU8,
}

impl StateCell {
    /// Creates a cell in the default closed state.
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(State::Closed as u8),
        }
    }

    /// Gets the current state.
    pub(crate) fn current(&self) -> State {
        let value = self.state.load(Ordering::Acquire);
        State::from(value)
    }

    /// Attempts to transition from one state to another.
    /// Returns true if the transition succeeded.
    pub(crate) fn transition(&self, from: State, to: State) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}
