//! Error types for the breaker/bucket pair.

use thiserror::Error;

/// Errors raised by [`LeakyBucket`](crate::LeakyBucket) operations.
///
/// Both variants fail the single operation that caused them, never the
/// bucket process: the worker logs them and keeps serving other
/// subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BucketError {
    /// The subscription id was empty. Subscription ids must be non-empty
    /// strings.
    #[error("invalid subscription id, expected a non-empty string")]
    InvalidIdentifier,

    /// The operation referenced a subscription id that was never
    /// registered. This points at a protocol ordering bug upstream (a
    /// breaker reporting failures before its REGISTER was processed) and
    /// is not worth retrying.
    #[error("subscription id is not registered, register it first")]
    UnknownSubscription,
}

/// Errors raised when sending a message to the bucket process.
///
/// Sends never block; a full queue or a gone worker surfaces here
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The bucket command queue is full. The message was dropped.
    #[error("bucket command queue is full")]
    QueueFull,

    /// The bucket process has shut down and no longer receives commands.
    #[error("bucket process is gone")]
    Disconnected,
}

/// Errors raised by [`BreakerRegistry`](crate::BreakerRegistry) lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// No circuit breaker was registered under the given identifier.
    #[error("no registered circuit breaker for the given identifier")]
    UnknownCircuitBreaker,
}

/// Why the admission monitor rejected a call without invoking the
/// downstream resource.
///
/// Expected and user-visible; the monitor maps it onto a server-error
/// response with the reason as the diagnostic body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// The breaker is open and no cached fallback was available.
    #[error("Call refused by circuit breaker")]
    CallRefused,
}
