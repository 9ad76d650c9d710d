// SPDX-FileCopyrightText: 2026 Modrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The authoritative user-to-ticket mapping.
//!
//! The store owns every `Ticket` exclusively and hands out cloned
//! snapshots; other components address tickets by id only. Two sharded
//! indexes back it: `user_id -> active ticket id` and `ticket_id ->
//! ticket`, so reads across different users never contend.
//!
//! Mutating entry points assume the caller holds the per-user session lock
//! (see `lock.rs`); the store still keeps its own operations atomic so a
//! bypassed lock surfaces as `DuplicateTicket` instead of corruption.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info};

use modrelay_core::{ChannelId, RelayError, Ticket, TicketId, TicketState, UserId};

/// In-memory ticket store indexed by user id and ticket id.
#[derive(Debug, Default)]
pub struct TicketStore {
    /// All known tickets, including recently closed ones kept around so a
    /// post-close message is recognized as a reopen.
    tickets: DashMap<TicketId, Ticket>,
    /// Active (open or closing) ticket per user. At most one entry per
    /// user; this map carries the one-active-ticket invariant.
    active: DashMap<UserId, TicketId>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The user's active ticket (open or closing), if any.
    pub fn open_ticket_for(&self, user: &UserId) -> Option<Ticket> {
        let id = self.active.get(user)?.value().clone();
        self.tickets.get(&id).map(|entry| entry.value().clone())
    }

    /// Look up any ticket by id, regardless of state.
    pub fn ticket(&self, id: &TicketId) -> Option<Ticket> {
        self.tickets.get(id).map(|entry| entry.value().clone())
    }

    /// Create a fresh ticket for the user.
    ///
    /// Callers must hold the user's session lock. An existing active
    /// ticket means the lock was bypassed and yields
    /// [`RelayError::DuplicateTicket`].
    pub fn create(
        &self,
        user: &UserId,
        channel: Option<ChannelId>,
        at: DateTime<Utc>,
    ) -> Result<Ticket, RelayError> {
        match self.active.entry(user.clone()) {
            Entry::Occupied(_) => Err(RelayError::DuplicateTicket { user: user.clone() }),
            Entry::Vacant(slot) => {
                let ticket = Ticket {
                    id: TicketId::generate(),
                    user_id: user.clone(),
                    channel,
                    created_at: at,
                    last_activity_at: at,
                    state: TicketState::Open,
                    close_attempts: 0,
                };
                self.tickets.insert(ticket.id.clone(), ticket.clone());
                slot.insert(ticket.id.clone());
                info!(ticket = %ticket.id, user = %user, "ticket created");
                Ok(ticket)
            }
        }
    }

    /// Record activity on a ticket.
    ///
    /// A touch on a `Closing` ticket revives it: the state reverts to
    /// `Open` and the archive attempt counter resets, cancelling the
    /// pending closure. Absent or `Closed` tickets yield
    /// [`RelayError::TicketNotFound`].
    pub fn touch(&self, id: &TicketId, at: DateTime<Utc>) -> Result<TicketState, RelayError> {
        let mut entry = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| RelayError::TicketNotFound { ticket: id.clone() })?;

        match entry.state {
            TicketState::Closed => Err(RelayError::TicketNotFound { ticket: id.clone() }),
            TicketState::Open => {
                entry.last_activity_at = at;
                Ok(TicketState::Open)
            }
            TicketState::Closing => {
                entry.state = TicketState::Open;
                entry.close_attempts = 0;
                entry.last_activity_at = at;
                info!(ticket = %id, "closing ticket revived by activity");
                Ok(TicketState::Open)
            }
        }
    }

    /// Transition `Open -> Closing`. No-op on `Closing` and `Closed`
    /// (idempotent close path).
    pub fn mark_closing(&self, id: &TicketId) -> Result<TicketState, RelayError> {
        let mut entry = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| RelayError::TicketNotFound { ticket: id.clone() })?;

        if entry.state == TicketState::Open {
            entry.state = TicketState::Closing;
            debug!(ticket = %id, "ticket marked closing");
        }
        Ok(entry.state)
    }

    /// Transition `Closing -> Closed` and release the user's active slot.
    ///
    /// Idempotent on `Closed`; closing an `Open` ticket directly is an
    /// out-of-order transition and is rejected.
    pub fn mark_closed(&self, id: &TicketId) -> Result<TicketState, RelayError> {
        let user = {
            let mut entry = self
                .tickets
                .get_mut(id)
                .ok_or_else(|| RelayError::TicketNotFound { ticket: id.clone() })?;

            match entry.state {
                TicketState::Closed => return Ok(TicketState::Closed),
                TicketState::Open => {
                    return Err(RelayError::InvalidState {
                        ticket: id.clone(),
                        from: TicketState::Open,
                        to: TicketState::Closed,
                    });
                }
                TicketState::Closing => {
                    entry.state = TicketState::Closed;
                    entry.user_id.clone()
                }
            }
        };

        // Release the active slot only if it still points at this ticket.
        self.active.remove_if(&user, |_, active_id| active_id == id);
        info!(ticket = %id, user = %user, "ticket closed");
        Ok(TicketState::Closed)
    }

    /// Count an archive attempt on a `Closing` ticket and return the new
    /// total. Any other state is out-of-order.
    pub fn record_close_attempt(&self, id: &TicketId) -> Result<u32, RelayError> {
        let mut entry = self
            .tickets
            .get_mut(id)
            .ok_or_else(|| RelayError::TicketNotFound { ticket: id.clone() })?;

        if entry.state != TicketState::Closing {
            return Err(RelayError::InvalidState {
                ticket: id.clone(),
                from: entry.state,
                to: TicketState::Closing,
            });
        }
        entry.close_attempts += 1;
        Ok(entry.close_attempts)
    }

    /// All `Open` tickets idle since before `threshold`, oldest first, so
    /// the sweeper processes the longest-idle tickets first and can bound
    /// its per-tick workload.
    pub fn list_idle(&self, threshold: DateTime<Utc>) -> Vec<Ticket> {
        let mut idle: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| {
                entry.state == TicketState::Open && entry.last_activity_at < threshold
            })
            .map(|entry| entry.value().clone())
            .collect();
        idle.sort_by_key(|ticket| ticket.last_activity_at);
        idle
    }

    /// All `Closing` tickets (archive pending), oldest first.
    pub fn list_closing(&self) -> Vec<Ticket> {
        let mut closing: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| entry.state == TicketState::Closing)
            .map(|entry| entry.value().clone())
            .collect();
        closing.sort_by_key(|ticket| ticket.last_activity_at);
        closing
    }

    /// Drop `Closed` tickets whose last activity predates `before`.
    /// Returns the number of pruned tickets.
    pub fn prune_closed(&self, before: DateTime<Utc>) -> usize {
        let before_len = self.tickets.len();
        self.tickets.retain(|_, ticket| {
            !(ticket.state == TicketState::Closed && ticket.last_activity_at < before)
        });
        before_len - self.tickets.len()
    }

    /// Number of users with an active ticket.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Number of retained tickets, closed ones included.
    pub fn total_count(&self) -> usize {
        self.tickets.len()
    }
}
