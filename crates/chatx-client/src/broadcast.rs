//! Sending one message to several rooms, paced by a throttle.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use chatx_core::{MessageId, Result, RoomId};

/// Delivers a message to one room.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Post `text` to `room`.
    async fn send_to(&self, room: RoomId, text: &str) -> Result<MessageId>;
}

/// Per-room outcome of one broadcast, in send order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BroadcastRun {
    results: Vec<(RoomId, bool)>,
}

impl BroadcastRun {
    /// Whether the send to `room` succeeded. `None` if the room was not part
    /// of the run.
    pub fn get(&self, room: RoomId) -> Option<bool> {
        self.results
            .iter()
            .find(|(id, _)| *id == room)
            .map(|(_, ok)| *ok)
    }

    /// Outcomes keyed by room.
    pub fn to_map(&self) -> HashMap<RoomId, bool> {
        self.results.iter().copied().collect()
    }

    /// Outcomes in send order.
    pub fn iter(&self) -> impl Iterator<Item = (RoomId, bool)> + '_ {
        self.results.iter().copied()
    }

    /// Number of rooms in the run.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the run had no rooms.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Whether every send succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(|(_, ok)| *ok)
    }
}

/// Paces multi-room sends.
///
/// Before each send the run's throttle flag is checked: when set, the
/// coordinator sleeps for the delay and clears it; otherwise it sets it.
/// Rooms A, B, C therefore see no delay before A, one before B and none
/// before C. Every run starts unthrottled.
#[derive(Debug)]
pub struct BroadcastCoordinator {
    delay: Duration,
    running: Mutex<()>,
}

impl BroadcastCoordinator {
    /// Coordinator sleeping `delay` on throttled sends.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            running: Mutex::new(()),
        }
    }

    /// Throttle delay.
    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Send `text` to each of `rooms` in order. A failed room is logged and
    /// recorded as `false`; the run continues.
    #[tracing::instrument(skip_all, fields(rooms = rooms.len()))]
    pub async fn run(
        &self,
        sender: &dyn MessageSender,
        rooms: &[RoomId],
        text: &str,
    ) -> BroadcastRun {
        // Held for the whole run so concurrent broadcasts do not interleave.
        let _running = self.running.lock().await;
        let mut throttled = false;
        let mut results = Vec::with_capacity(rooms.len());

        for &room in rooms {
            if throttled {
                debug!(room_id = %room, delay_ms = self.delay.as_millis(), "throttling");
                tokio::time::sleep(self.delay).await;
            }
            throttled = !throttled;

            match sender.send_to(room, text).await {
                Ok(id) => {
                    debug!(room_id = %room, message_id = %id, "broadcast sent");
                    results.push((room, true));
                }
                Err(e) => {
                    warn!(room_id = %room, error = %e, "broadcast send failed");
                    results.push((room, false));
                }
            }
        }

        let run = BroadcastRun { results };
        info!(ok = run.all_succeeded(), "broadcast finished");
        run
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
