//! Per-user state store.
//!
//! Every user gets one [`UserState`] guarded by its own mutex. Handlers lock
//! the entry for the whole duration of an inbound event, which serializes
//! events from the same user while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use janbot_models::UserId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::debug;

use crate::conversation::ConversationState;
use crate::pagination::PaginationState;

/// Everything the bot remembers about one user.
#[derive(Debug)]
pub struct UserState {
    /// The dialogue in progress, if any.
    pub conversation: Option<ConversationState>,
    /// The most recent list render, if any.
    pub pagination: Option<PaginationState>,
    /// When the entry was last locked.
    pub last_activity: Instant,
}

impl UserState {
    fn new() -> Self {
        Self {
            conversation: None,
            pagination: None,
            last_activity: Instant::now(),
        }
    }

    /// Returns true if the user is in the middle of a conversation.
    pub fn in_conversation(&self) -> bool {
        self.conversation.is_some()
    }
}

/// Outcome of one expiry sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepStats {
    /// Conversations dropped for inactivity.
    pub expired_conversations: usize,
    /// User entries removed entirely.
    pub evicted_users: usize,
}

/// Shared map of per-user state.
#[derive(Default)]
pub struct UserStateStore {
    users: RwLock<HashMap<UserId, Arc<Mutex<UserState>>>>,
}

impl UserStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state of `user`, creating it on first use.
    ///
    /// The guard must be held for the whole event so that a second event from
    /// the same user waits instead of interleaving.
    pub async fn lock(&self, user: &UserId) -> OwnedMutexGuard<UserState> {
        let existing = self.users.read().await.get(user).cloned();
        let entry = match existing {
            Some(entry) => entry,
            None => {
                let mut users = self.users.write().await;
                Arc::clone(
                    users
                        .entry(user.clone())
                        .or_insert_with(|| Arc::new(Mutex::new(UserState::new()))),
                )
            }
        };

        let mut guard = entry.lock_owned().await;
        guard.last_activity = Instant::now();
        guard
    }

    /// Drops abandoned conversations and idle users.
    ///
    /// A conversation idle for longer than `conversation_ttl` is cleared; an
    /// entry untouched for longer than `idle_ttl` is removed. Entries that are
    /// locked or about to be locked are left alone.
    pub async fn sweep(&self, conversation_ttl: Duration, idle_ttl: Duration) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut users = self.users.write().await;

        users.retain(|user, entry| {
            // The map owns one reference; any other is an in-flight `lock`.
            if Arc::strong_count(entry) > 1 {
                return true;
            }
            let Ok(mut state) = entry.try_lock() else {
                return true;
            };

            if state.last_activity.elapsed() > idle_ttl {
                debug!(user = %user, "Evicting idle user state");
                stats.evicted_users += 1;
                return false;
            }

            let expired = state
                .conversation
                .as_ref()
                .is_some_and(|c| c.last_activity.elapsed() > conversation_ttl);
            if expired {
                debug!(user = %user, "Dropping abandoned conversation");
                state.conversation = None;
                stats.expired_conversations += 1;
            }
            true
        });

        stats
    }

    /// Number of users with state.
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    /// Returns true if no user has state.
    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}
