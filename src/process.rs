//! The bucket worker task and the handle breakers talk to it through.
//!
//! [`BucketProcess`] owns a [`LeakyBucket`] and serializes every access
//! to it on a single task: commands from breakers and the periodic decay
//! tick are multiplexed with `select!`, so the subscription map needs no
//! locks. Breakers hold a [`BucketHandle`], which sends commands over a
//! bounded channel and subscribes to the worker's broadcast event
//! stream.
//!
//! Senders never block. A full command queue fails the send and the
//! caller drops the message; a slow event subscriber lags and skips.

use std::time::Duration;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::bucket::LeakyBucket;
use crate::config::BucketConfig;
use crate::error::ProtocolError;
use crate::message::BucketMessage;

/// The worker that owns the shared failure counter.
pub struct BucketProcess {
    bucket: LeakyBucket,
    commands: mpsc::Receiver<BucketMessage>,
    events: broadcast::Sender<BucketMessage>,
    tick_interval: Duration,
}

impl BucketProcess {
    /// Creates a worker and the handle paired with it.
    ///
    /// The worker does nothing until [`run`](Self::run) is awaited;
    /// [`spawn`](Self::spawn) does both in one step. Holding the worker
    /// un-run is useful in tests, where [`handle_message`](Self::handle_message)
    /// and [`handle_tick`](Self::handle_tick) can be driven directly.
    pub fn new(config: BucketConfig) -> (Self, BucketHandle) {
        let (commands_tx, commands_rx) = mpsc::channel(config.command_capacity);
        let (events_tx, _) = broadcast::channel(config.event_capacity);

        let process = Self {
            bucket: LeakyBucket::new(),
            commands: commands_rx,
            events: events_tx.clone(),
            tick_interval: config.tick_interval,
        };
        let handle = BucketHandle {
            commands: commands_tx,
            events: events_tx,
        };

        (process, handle)
    }

    /// Creates a worker, spawns it on the current runtime, and returns
    /// its handle.
    pub fn spawn(config: BucketConfig) -> BucketHandle {
        let (process, handle) = Self::new(config);
        tokio::spawn(process.run());
        handle
    }

    /// Runs the worker until every command sender is dropped.
    ///
    /// The first decay tick fires one full period after start, not
    /// immediately. Ticks missed while the worker is stalled are
    /// skipped, not bursted.
    pub async fn run(mut self) {
        let start = time::Instant::now() + self.tick_interval;
        let mut ticks = time::interval_at(start, self.tick_interval);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticks.tick() => self.handle_tick(),
                command = self.commands.recv() => match command {
                    Some(msg) => self.handle_message(msg),
                    None => break,
                },
            }
        }

        debug!("Bucket process stopped, all command senders dropped");
    }

    /// Handles one command from a breaker.
    ///
    /// Per-subscription errors fail only the command that caused them;
    /// the worker logs and keeps going. Event-direction messages
    /// arriving here are silently ignored.
    pub fn handle_message(&mut self, msg: BucketMessage) {
        match msg {
            BucketMessage::Register {
                subscription_id,
                threshold,
            } => {
                if let Err(error) = self.bucket.subscribe(&subscription_id, threshold) {
                    warn!(%subscription_id, %error, "Dropping registration");
                }
            }
            BucketMessage::NewFailure { subscription_id } => {
                let above = self
                    .bucket
                    .increment(&subscription_id)
                    .and_then(|()| self.bucket.is_above_threshold(&subscription_id));
                match above {
                    Ok(true) => {
                        // Every failure above the threshold re-emits;
                        // the breaker side deduplicates
                        debug!(%subscription_id, "Threshold violated");
                        self.emit(BucketMessage::ThresholdViolation { subscription_id });
                    }
                    Ok(false) => {}
                    Err(error) => {
                        warn!(%subscription_id, %error, "Dropping failure report");
                    }
                }
            }
            BucketMessage::Reset { subscription_id } => {
                if let Err(error) = self.bucket.reset_count(&subscription_id) {
                    warn!(%subscription_id, %error, "Dropping failure count reset");
                }
            }
            _ => {}
        }
    }

    /// Applies one decay tick and emits a restore for every
    /// subscription that crossed back down to its threshold.
    pub fn handle_tick(&mut self) {
        for subscription_id in self.bucket.tick() {
            debug!(%subscription_id, "Threshold restored");
            self.emit(BucketMessage::ThresholdRestored { subscription_id });
        }
    }

    /// The counter owned by this worker.
    pub fn bucket(&self) -> &LeakyBucket {
        &self.bucket
    }

    fn emit(&self, msg: BucketMessage) {
        // Err only means nobody is subscribed right now; events are
        // fire-and-forget
        let _ = self.events.send(msg);
    }
}

/// A cheap, cloneable handle to a [`BucketProcess`].
#[derive(Debug, Clone)]
pub struct BucketHandle {
    commands: mpsc::Sender<BucketMessage>,
    events: broadcast::Sender<BucketMessage>,
}

impl BucketHandle {
    /// Sends one command to the worker without blocking.
    pub fn send(&self, msg: BucketMessage) -> Result<(), ProtocolError> {
        self.commands.try_send(msg).map_err(|error| match error {
            TrySendError::Full(_) => ProtocolError::QueueFull,
            TrySendError::Closed(_) => ProtocolError::Disconnected,
        })
    }

    /// Subscribes to the worker's event stream.
    ///
    /// The stream is shared by every subscription; receivers filter by
    /// subscription id.
    pub fn subscribe(&self) -> broadcast::Receiver<BucketMessage> {
        self.events.subscribe()
    }
}
