//! Message contract between circuit breakers and the bucket process.
//!
//! A single tagged enum carries both directions of the protocol over one
//! multiplexed channel pair: [`Register`](BucketMessage::Register),
//! [`NewFailure`](BucketMessage::NewFailure) and
//! [`Reset`](BucketMessage::Reset) flow breaker → bucket;
//! [`ThresholdViolation`](BucketMessage::ThresholdViolation) and
//! [`ThresholdRestored`](BucketMessage::ThresholdRestored) flow
//! bucket → breaker. Each side ignores message types it does not handle,
//! so unknown traffic on either channel is forward-compatible noise.
//!
//! The serde representation matches the wire schema used by deployments
//! where the counter runs out of process:
//!
//! ```json
//! { "type": "NEW_FAILURE", "payload": { "subscriptionId": "transaction-history-circuit-breaker" } }
//! ```

use serde::{Deserialize, Serialize};

/// Correlation key shared between a circuit breaker and its failure-count
/// subscription in the bucket.
pub type SubscriptionId = String;

/// A protocol message exchanged between a breaker and the bucket process.
///
/// Messages are stateless and never persisted; delivery is asynchronous
/// with per-channel FIFO ordering and no ordering guarantee across the
/// command and event channels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum BucketMessage {
    /// Create (or reset) the failure-count subscription for a breaker.
    /// Sent once by each breaker on construction.
    #[serde(rename = "REGISTER", rename_all = "camelCase")]
    Register {
        /// Subscription to create. Re-registering an existing id resets
        /// its count.
        subscription_id: SubscriptionId,
        /// Failure threshold for this subscription; the bucket default
        /// applies when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<u64>,
    },

    /// One observed downstream failure to add to the subscription's
    /// count.
    #[serde(rename = "NEW_FAILURE", rename_all = "camelCase")]
    NewFailure {
        /// Subscription to increment.
        subscription_id: SubscriptionId,
    },

    /// Zero the subscription's failure count.
    #[serde(rename = "RESET", rename_all = "camelCase")]
    Reset {
        /// Subscription to reset.
        subscription_id: SubscriptionId,
    },

    /// The subscription's count strictly exceeds its threshold. Emitted
    /// on every failure recorded above the threshold; receivers are
    /// expected to deduplicate.
    #[serde(rename = "THRESHOLD_VIOLATION", rename_all = "camelCase")]
    ThresholdViolation {
        /// Subscription whose threshold was violated.
        subscription_id: SubscriptionId,
    },

    /// The subscription's count decayed back to the threshold boundary
    /// after having exceeded it. Emitted exactly once per crossing, by
    /// the decay tick.
    #[serde(rename = "THRESHOLD_RESTORED", rename_all = "camelCase")]
    ThresholdRestored {
        /// Subscription whose count was restored.
        subscription_id: SubscriptionId,
    },
}

impl BucketMessage {
    /// The subscription id this message refers to.
    pub fn subscription_id(&self) -> &str {
        match self {
            BucketMessage::Register {
                subscription_id, ..
            }
            | BucketMessage::NewFailure { subscription_id }
            | BucketMessage::Reset { subscription_id }
            | BucketMessage::ThresholdViolation { subscription_id }
            | BucketMessage::ThresholdRestored { subscription_id } => subscription_id,
        }
    }
}
