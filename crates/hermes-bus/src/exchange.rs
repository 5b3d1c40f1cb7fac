//! In-process fanout exchange backed by `tokio::sync::broadcast` channels.
//!
//! One [`InProcessExchange`] hosts any number of named logical channels.
//! Every [`Subscription`] to a channel receives every frame published on it,
//! which matches the fanout contract the coordination layer assumes from a
//! real broker. Suitable for single-process deployments, simulations, and
//! integration tests; a networked broker client implements the same two
//! traits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;

use hermes_core::error::AppError;
use hermes_core::traits::{RequestChannel, ResponseChannel};

/// Default buffer capacity per logical channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Named fanout channels over in-process broadcast queues.
#[derive(Clone)]
pub struct InProcessExchange {
    channels: Arc<Mutex<HashMap<String, broadcast::Sender<String>>>>,
    capacity: usize,
}

impl InProcessExchange {
    /// Create an exchange with a specific per-channel buffer capacity.
    ///
    /// When a buffer is full the oldest un-consumed frames are dropped and
    /// slow subscribers observe a lag error on their next `recv`.
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity,
        }
    }

    /// Publishing endpoint for a named channel, creating it if needed.
    pub fn publisher(&self, channel: &str) -> Publisher {
        Publisher {
            sender: self.sender_for(channel),
        }
    }

    /// Subscribing endpoint for a named channel, creating it if needed.
    ///
    /// Only frames published after this call are delivered.
    pub fn subscribe(&self, channel: &str) -> Subscription {
        Subscription {
            receiver: self.sender_for(channel).subscribe(),
        }
    }

    /// Drop the exchange's handle on a channel.
    ///
    /// Existing publishers keep the channel alive; once the last one is
    /// dropped, subscribers observe end-of-channel.
    pub fn close(&self, channel: &str) {
        self.lock().remove(channel);
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.lock();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, broadcast::Sender<String>>> {
        self.channels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for InProcessExchange {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// Publishing side of one logical channel.
#[derive(Clone)]
pub struct Publisher {
    sender: broadcast::Sender<String>,
}

impl ResponseChannel for Publisher {
    async fn publish(&self, frame: String) -> Result<(), AppError> {
        // A send error only means there are zero subscribers right now;
        // fanout delivery is to *current* subscribers, so that is not a
        // transport failure.
        let _ = self.sender.send(frame);
        Ok(())
    }
}

/// Consuming side of one logical channel.
pub struct Subscription {
    receiver: broadcast::Receiver<String>,
}

impl RequestChannel for Subscription {
    async fn recv(&mut self) -> Result<Option<String>, AppError> {
        match self.receiver.recv().await {
            Ok(frame) => Ok(Some(frame)),
            Err(broadcast::error::RecvError::Closed) => Ok(None),
            Err(broadcast::error::RecvError::Lagged(n)) => Err(AppError::Transport(format!(
                "subscriber lagged by {n} frames"
            ))),
        }
    }
}
