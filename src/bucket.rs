//! Leaky-bucket failure counting.
//!
//! [`LeakyBucket`] keeps one failure count per subscription and leaks
//! every count by one on each decay tick. Counts are raised by observed
//! failures and drained by time, so a subscription only stays above its
//! threshold while failures arrive faster than the leak rate.
//!
//! The bucket itself is plain single-threaded state. Concurrent use goes
//! through [`BucketProcess`](crate::process::BucketProcess), which owns a
//! bucket and serializes all access through its message loop.

use ahash::AHashMap;
use smallvec::SmallVec;

use crate::error::BucketError;
use crate::message::SubscriptionId;

/// Failure threshold applied when a subscription does not specify one.
pub const DEFAULT_THRESHOLD: u64 = 100;

/// Per-subscription counter state.
#[derive(Debug, Clone, Copy)]
struct Slot {
    current: u64,
    threshold: u64,
}

/// A set of leaky failure counters keyed by subscription id.
///
/// Counts saturate at zero on decay and never go negative. Threshold
/// checks are strict: a count equal to the threshold is still within
/// bounds.
#[derive(Debug, Default)]
pub struct LeakyBucket {
    slots: AHashMap<SubscriptionId, Slot>,
}

impl LeakyBucket {
    /// Creates an empty bucket with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates (or recreates) a subscription with the given threshold.
    ///
    /// Re-subscribing an existing id resets its count to zero and
    /// replaces its threshold. Returns [`BucketError::InvalidIdentifier`]
    /// for an empty id.
    pub fn subscribe(&mut self, id: &str, threshold: Option<u64>) -> Result<(), BucketError> {
        if id.is_empty() {
            return Err(BucketError::InvalidIdentifier);
        }

        self.slots.insert(
            id.to_string(),
            Slot {
                current: 0,
                threshold: threshold.unwrap_or(DEFAULT_THRESHOLD),
            },
        );

        Ok(())
    }

    /// Adds one to the subscription's failure count.
    pub fn increment(&mut self, id: &str) -> Result<(), BucketError> {
        let slot = self.slot_mut(id)?;
        slot.current += 1;
        Ok(())
    }

    /// Subtracts one from the subscription's failure count, saturating
    /// at zero.
    pub fn decrement(&mut self, id: &str) -> Result<(), BucketError> {
        let slot = self.slot_mut(id)?;
        slot.current = slot.current.saturating_sub(1);
        Ok(())
    }

    /// Resets the subscription's failure count to zero, keeping its
    /// threshold.
    pub fn reset_count(&mut self, id: &str) -> Result<(), BucketError> {
        let slot = self.slot_mut(id)?;
        slot.current = 0;
        Ok(())
    }

    /// Whether the subscription's count strictly exceeds its threshold.
    pub fn is_above_threshold(&self, id: &str) -> Result<bool, BucketError> {
        let slot = self.slot(id)?;
        Ok(slot.current > slot.threshold)
    }

    /// The subscription's current failure count.
    pub fn fetch_count(&self, id: &str) -> Result<u64, BucketError> {
        Ok(self.slot(id)?.current)
    }

    /// The subscription's configured threshold.
    pub fn fetch_threshold(&self, id: &str) -> Result<u64, BucketError> {
        Ok(self.slot(id)?.threshold)
    }

    /// Ids of all registered subscriptions, in no particular order.
    pub fn subscription_ids(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// Number of registered subscriptions.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the bucket has no subscriptions.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Applies one decay step to every subscription and reports which
    /// ones crossed back down to their threshold.
    ///
    /// Each slot leaks one count, saturating at zero. A subscription is
    /// reported when this step moves it from one-above-threshold to
    /// exactly at threshold; that is the only decrement that crosses the
    /// boundary, so each violation produces at most one restore.
    pub fn tick(&mut self) -> SmallVec<[SubscriptionId; 4]> {
        let mut restored = SmallVec::new();

        for (id, slot) in &mut self.slots {
            if slot.current.checked_sub(slot.threshold) == Some(1) {
                restored.push(id.clone());
            }
            slot.current = slot.current.saturating_sub(1);
        }

        restored
    }

    fn slot(&self, id: &str) -> Result<&Slot, BucketError> {
        self.slots.get(id).ok_or(BucketError::UnknownSubscription)
    }

    fn slot_mut(&mut self, id: &str) -> Result<&mut Slot, BucketError> {
        self.slots.get_mut(id).ok_or(BucketError::UnknownSubscription)
    }
}
