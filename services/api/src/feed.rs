//! Live usage feed
//!
//! Every recorded session publishes the user's new window on a broadcast
//! channel. `/usage/stream` subscribers receive only their own updates;
//! a subscriber that falls behind skips the messages it missed.

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::usage::WindowView;

const DEFAULT_CAPACITY: usize = 256;

/// A window change for one user
#[derive(Debug, Clone, Serialize)]
pub struct UsageUpdate {
    pub user_id: Uuid,
    pub window: WindowView,
}

/// Fan-out of usage updates
pub struct UsageFeed {
    sender: broadcast::Sender<UsageUpdate>,
}

impl UsageFeed {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an update; dropped when nobody listens
    pub fn publish(&self, update: UsageUpdate) {
        let _ = self.sender.send(update);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<UsageUpdate> {
        self.sender.subscribe()
    }
}

impl Default for UsageFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
