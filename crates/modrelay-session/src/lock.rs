// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user session locks.
//!
//! Makes check-then-create atomic per user without serializing unrelated
//! users: two near-simultaneous first messages from one user result in
//! exactly one ticket, while other users' traffic proceeds untouched.
//!
//! Lock entries are created lazily and reclaimed as soon as no holder or
//! waiter references them, so the table does not grow with the lifetime of
//! the process. Reclamation is atomic against the map shard: a concurrent
//! acquirer either observes the live entry or inserts a fresh one, never a
//! stale clone.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::trace;

use modrelay_core::{RelayError, UserId};

/// Lazily populated table of per-user mutexes.
#[derive(Debug)]
pub struct UserLockManager {
    slots: DashMap<UserId, Arc<Mutex<()>>>,
    max_wait: Duration,
}

impl UserLockManager {
    /// `max_wait` bounds every acquisition; exceeding it yields
    /// [`RelayError::LockTimeout`] instead of hanging the caller.
    pub fn new(max_wait: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            max_wait,
        }
    }

    /// Run `f` inside the user's critical section.
    ///
    /// The lock is released on every exit path: success, error, and
    /// cancellation of the returned future (RAII guard).
    pub async fn with_user_lock<F, Fut, T>(&self, user: &UserId, f: F) -> Result<T, RelayError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let slot = self.slot(user);
        let guard = match tokio::time::timeout(self.max_wait, Arc::clone(&slot).lock_owned()).await {
            Ok(guard) => guard,
            Err(_) => {
                drop(slot);
                self.reclaim(user);
                return Err(RelayError::LockTimeout {
                    user: user.clone(),
                    waited: self.max_wait,
                });
            }
        };

        let result = f().await;

        drop(guard);
        drop(slot);
        self.reclaim(user);
        result
    }

    /// Non-blocking variant: runs `f` only if the lock is free right now.
    ///
    /// Used by the sweeper so a busy user's ticket is skipped for the tick
    /// instead of stalling the scan behind inbound traffic.
    pub async fn try_with_user_lock<F, Fut, T>(&self, user: &UserId, f: F) -> Option<Result<T, RelayError>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, RelayError>>,
    {
        let slot = self.slot(user);
        let guard = match slot.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                trace!(user = %user, "session lock busy");
                return None;
            }
        };

        let result = f().await;

        drop(guard);
        drop(slot);
        self.reclaim(user);
        Some(result)
    }

    /// Number of live lock entries; the table is expected to hover near
    /// the number of in-flight operations, not the number of users seen.
    pub fn table_len(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, user: &UserId) -> Arc<Mutex<()>> {
        self.slots
            .entry(user.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn reclaim(&self, user: &UserId) {
        // strong_count == 1 means only the map references the mutex: no
        // holder, no waiter. The predicate runs under the shard write
        // lock, so no acquirer can clone the Arc mid-removal.
        self.slots
            .remove_if(user, |_, slot| Arc::strong_count(slot) == 1);
    }
}
