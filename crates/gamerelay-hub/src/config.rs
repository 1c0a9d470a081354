//! Hub configuration.

use serde::{Deserialize, Serialize};

/// Default capacity of the hub's dispatch queue.
pub const DEFAULT_DISPATCH_BUFFER_SIZE: usize = 500;

/// Default capacity of each player's outbound mailbox.
pub const DEFAULT_MAILBOX_CAPACITY: usize = 50;

// ---------------------------------------------------------------------------
// OverflowPolicy
// ---------------------------------------------------------------------------

/// What the routing loop does when a receiver's mailbox is full.
///
/// The routing loop is a single task shared by every game on the hub, so
/// it never waits on a mailbox. A full mailbox means the player's writer
/// is not keeping up with its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the payload for that receiver and keep going.
    #[default]
    Drop,
    /// Drop the payload and kick the receiver. Its client is expected to
    /// reconnect and resync through `on_player_joined`.
    Kick,
}

// ---------------------------------------------------------------------------
// HubConfig
// ---------------------------------------------------------------------------

/// Tuning knobs for a [`Hub`](crate::Hub).
///
/// `#[serde(default)]` lets a config file set only the fields it cares
/// about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    /// How many routing requests can wait in the dispatch queue before
    /// `Hub::dispatch` starts applying backpressure. Zero means default.
    pub dispatch_buffer_size: usize,

    /// Capacity of each player's outbound mailbox. Zero means default.
    pub mailbox_capacity: usize,

    /// Behavior when a mailbox is full.
    pub overflow: OverflowPolicy,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            dispatch_buffer_size: DEFAULT_DISPATCH_BUFFER_SIZE,
            mailbox_capacity: DEFAULT_MAILBOX_CAPACITY,
            overflow: OverflowPolicy::Drop,
        }
    }
}

impl HubConfig {
    /// Replaces zero sizes with the defaults. Tokio channels panic on a
    /// zero capacity.
    pub fn normalized(mut self) -> Self {
        if self.dispatch_buffer_size == 0 {
            self.dispatch_buffer_size = DEFAULT_DISPATCH_BUFFER_SIZE;
        }
        if self.mailbox_capacity == 0 {
            self.mailbox_capacity = DEFAULT_MAILBOX_CAPACITY;
        }
        self
    }
}
