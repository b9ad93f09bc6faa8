//! Broadcast bus carrying the joint-state stream.
//!
//! Built on [`tokio::sync::broadcast`]: every subscriber receives every batch
//! and no subscriber blocks another.  A subscriber that falls behind loses
//! the oldest batches and resumes with the newest.

use chainmove_types::{JointStateBatch, MotionError};
use tokio::sync::broadcast;
use tracing::warn;

/// Default channel capacity (number of buffered batches before old ones are
/// dropped for slow subscribers).
const DEFAULT_CAPACITY: usize = 256;

/// Shared joint-state bus. Clone it cheaply – all clones share the same
/// underlying broadcast channel.
#[derive(Clone, Debug)]
pub struct StateBus {
    sender: broadcast::Sender<JointStateBatch>,
}

impl StateBus {
    /// Create a new bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish a batch to every current subscriber.
    ///
    /// Returns the number of receivers that were handed the batch, or
    /// [`MotionError::Channel`] when nobody is listening.
    pub fn publish(&self, batch: JointStateBatch) -> Result<usize, MotionError> {
        self.sender
            .send(batch)
            .map_err(|_| MotionError::Channel("no subscribers for joint states".to_string()))
    }

    /// Subscribe to all batches published from now on.
    pub fn subscribe(&self) -> StateReceiver {
        StateReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StateBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

/// A receiver that skips over lag instead of surfacing it.
pub struct StateReceiver {
    receiver: broadcast::Receiver<JointStateBatch>,
}

impl StateReceiver {
    /// Wait for the next batch.
    ///
    /// Returns `None` when the bus is closed and no further batches will
    /// arrive.
    pub async fn recv(&mut self) -> Option<JointStateBatch> {
        loop {
            match self.receiver.recv().await {
                Ok(batch) => return Some(batch),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(lagged_by = n, "joint state receiver lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
