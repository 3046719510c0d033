//! Per-room event suppression: ignored kinds and blocked users.

use std::collections::{HashMap, HashSet};

use tokio::time::Instant;

use chatx_core::{ChatEvent, EventKind, UserId};

/// When a user block lapses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockExpiry {
    /// Blocked until explicitly unblocked.
    Never,
    /// Blocked until this instant.
    At(Instant),
}

impl BlockExpiry {
    fn is_active(self, now: Instant) -> bool {
        match self {
            Self::Never => true,
            Self::At(deadline) => now < deadline,
        }
    }
}

/// Ignored event kinds plus blocked users for one room.
#[derive(Debug, Default)]
pub struct EventFilter {
    ignored: HashSet<EventKind>,
    blocked: HashMap<UserId, BlockExpiry>,
}

impl EventFilter {
    /// Filter that lets everything through.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop emitting `kinds`.
    pub fn ignore(&mut self, kinds: &[EventKind]) {
        self.ignored.extend(kinds.iter().copied());
    }

    /// Emit `kinds` again.
    pub fn unignore(&mut self, kinds: &[EventKind]) {
        for kind in kinds {
            let _ = self.ignored.remove(kind);
        }
    }

    /// Ignore every known kind except `kinds`.
    pub fn only(&mut self, kinds: &[EventKind]) {
        self.ignored = EventKind::ALL
            .iter()
            .copied()
            .filter(|k| !kinds.contains(k))
            .collect();
    }

    /// Whether `kind` is currently ignored.
    pub fn is_ignored(&self, kind: EventKind) -> bool {
        self.ignored.contains(&kind)
    }

    /// Block `user` until `expiry`, replacing any earlier block.
    pub fn block(&mut self, user: UserId, expiry: BlockExpiry) {
        let _ = self.blocked.insert(user, expiry);
    }

    /// Lift the block on `user`.
    pub fn unblock(&mut self, user: UserId) {
        let _ = self.blocked.remove(&user);
    }

    /// Lift the block on `user` only if it still ends at `deadline`.
    ///
    /// Returns whether an entry was removed.
    pub fn expire_block(&mut self, user: UserId, deadline: Instant) -> bool {
        if self.blocked.get(&user) == Some(&BlockExpiry::At(deadline)) {
            let _ = self.blocked.remove(&user);
            return true;
        }
        false
    }

    /// Whether `user` is blocked at `now`.
    pub fn is_blocked(&self, user: UserId, now: Instant) -> bool {
        self.blocked.get(&user).is_some_and(|e| e.is_active(now))
    }

    /// Drop blocks that have lapsed by `now`.
    pub fn prune(&mut self, now: Instant) {
        self.blocked.retain(|_, expiry| expiry.is_active(now));
    }

    /// Number of blocks on record, lapsed or not.
    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    /// Whether `event` should reach subscribers at `now`.
    pub fn allows(&mut self, event: &ChatEvent, now: Instant) -> bool {
        if self.ignored.contains(&event.kind) {
            return false;
        }
        self.prune(now);
        !event.user_id.is_some_and(|user| self.blocked.contains_key(&user))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
